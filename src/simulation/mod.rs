pub mod collision;
pub mod color_map;
pub mod concurrency;
pub mod constraint_solver;
pub mod neighborhood_search;
pub mod particles;
pub mod render_state;
pub mod scene;
pub mod simulation_parameters;
pub mod sph_kernels;
pub mod statistics;
pub mod vorticity;
pub mod simulation;

pub type IT = i32;

#[cfg(feature = "double-precision")]
pub mod floating_type_mod {
    pub type FT = f64;
    pub use std::f64::consts::{FRAC_1_PI, PI, TAU};
}

#[cfg(not(feature = "double-precision"))]
pub mod floating_type_mod {
    pub type FT = f32;
    pub use std::f32::consts::{FRAC_1_PI, PI, TAU};
}

use floating_type_mod::FT;

use nalgebra::SVector;
use num_traits::Float;
use std::fmt::Display;

#[allow(dead_code)]
pub type V<FT, const D: usize> = SVector<FT, D>;

pub type V3 = V<FT, 3>;
pub type VI3 = V<IT, 3>;

pub fn vec3f(x: FT, y: FT, z: FT) -> V3 {
    [x, y, z].into()
}

pub use simulation::*;
pub use simulation_parameters::{FluidConfig, FrameParams};

pub fn is_ft_approx_eq<FT: Float>(a: FT, b: FT, tolerance: FT) -> bool {
    assert!(!a.is_nan());
    assert!(!b.is_nan());
    b <= a + tolerance && b >= a - tolerance
}

pub fn assert_ft_approx_eq<FT: Float + Display>(a: FT, b: FT, tolerance: FT, s: impl FnOnce() -> String) {
    if !is_ft_approx_eq(a, b, tolerance) {
        panic!(
            "{} value not equal with a tolerance of {}:\n\ta={}\n\tb={}\n",
            s(),
            tolerance,
            a,
            b
        );
    }
}

pub fn assert_v3_approx_eq(a: V3, b: V3, tolerance: FT, s: impl Fn() -> String) {
    for d in 0..3 {
        assert_ft_approx_eq(a[d], b[d], tolerance, || format!("{}[{}]", s(), d));
    }
}
