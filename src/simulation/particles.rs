use nalgebra::zero;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    floating_type_mod::FT,
    simulation_parameters::{FluidConfig, RestDensity},
    vec3f, V3,
};

macro_rules! decl_particle_vec {
    (pub struct $struct_name:ident { $(pub $field_name:ident: Vec<$field_type:ty> | $default_value:expr),*$(,)?  }) => {
        #[derive(Debug, Clone, PartialEq)]
        pub struct $struct_name {
            $(
                pub $field_name : Vec<$field_type>,
            )*
        }

        impl $struct_name {
            pub fn default(len: usize) -> Self {
                Self {
                    $(
                        $field_name: (0..len).map(|_| $default_value).collect::<Vec<$field_type>>(),
                    )*
                }
            }

            /// Overwrite every field with its default value without reallocating.
            pub fn fill_default(&mut self) {
                $(
                    for v in self.$field_name.iter_mut() {
                        *v = $default_value;
                    }
                )*
            }
        }
    }
}

decl_particle_vec! {
    pub struct ParticleVec {
        pub position: Vec<V3> | zero(),
        // tentative position during the solver loop, becomes `position` at the end of a step
        pub predicted_position: Vec<V3> | zero(),
        pub previous_position: Vec<V3> | zero(),
        pub velocity: Vec<V3> | zero(),
        pub velocity_temp: Vec<V3> | zero(),

        pub rest_density: Vec<FT> | 0.,
        pub density: Vec<FT> | 0.,
        pub lambda: Vec<FT> | 0.,
        pub correction: Vec<V3> | zero(),

        pub vorticity: Vec<V3> | zero(),
    }
}

/**
 * Owns all per-particle state. The particle count is fixed at construction, so an index is a
 * stable particle id for the whole lifetime of the store.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleStore {
    pub state: ParticleVec,

    // static per-particle data
    pub spawn_position: Vec<V3>,
    pub radius: Vec<FT>,
    pub friction: Vec<FT>,

    rest_density_mode: RestDensity,
    rest_density_captured: bool,
}

impl ParticleStore {
    pub fn new(spawn_position: Vec<V3>, radius: FT, friction: FT, rest_density_mode: RestDensity) -> ParticleStore {
        let num_particles = spawn_position.len();
        let mut store = ParticleStore {
            state: ParticleVec::default(num_particles),
            spawn_position,
            radius: vec![radius; num_particles],
            friction: vec![friction; num_particles],
            rest_density_mode,
            rest_density_captured: false,
        };
        store.reset();
        store
    }

    pub fn from_config(config: &FluidConfig) -> ParticleStore {
        ParticleStore::new(
            build_grid(config),
            config.particle_radius,
            config.friction,
            config.rest_density,
        )
    }

    pub fn len(&self) -> usize {
        self.spawn_position.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spawn_position.is_empty()
    }

    /// Back to the post-construction state: spawn positions, zero velocity and derived values.
    pub fn reset(&mut self) {
        let state = &mut self.state;
        state.fill_default();
        state.position.copy_from_slice(&self.spawn_position);
        state.predicted_position.copy_from_slice(&self.spawn_position);
        state.previous_position.copy_from_slice(&self.spawn_position);

        match self.rest_density_mode {
            RestDensity::Fixed(rest_density) => {
                state.rest_density.iter_mut().for_each(|x| *x = rest_density);
            }
            RestDensity::FromInitialState => {}
        }
        self.rest_density_captured = false;
    }

    /// True if the rest density still has to be captured from the current configuration.
    pub fn needs_rest_density(&self) -> bool {
        self.rest_density_mode == RestDensity::FromInitialState && !self.rest_density_captured
    }

    pub fn capture_rest_density(&mut self) {
        self.state.rest_density.copy_from_slice(&self.state.density);
        self.rest_density_captured = true;
    }
}

/// Seed particles on a regular lattice spanning `width x height x length` (x, y, z).
pub fn build_grid(config: &FluidConfig) -> Vec<V3> {
    let spacing = config.grid_spacing();
    let mut rng = StdRng::seed_from_u64(config.seed);
    // non-finite jitter is ignored
    let jitter = if config.position_jitter.is_finite() { config.position_jitter } else { 0. };

    let mut positions = Vec::with_capacity(config.particle_count());
    for i in 0..config.num_width_points {
        for j in 0..config.num_height_points {
            for k in 0..config.num_length_points {
                let mut p = vec3f(i as FT * spacing.x, j as FT * spacing.y, k as FT * spacing.z);
                if jitter > 0. {
                    p += vec3f(
                        rng.gen_range(-jitter..=jitter),
                        rng.gen_range(-jitter..=jitter),
                        rng.gen_range(-jitter..=jitter),
                    );
                }
                positions.push(p);
            }
        }
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_has_configured_resolution() {
        let config = FluidConfig {
            width: 1.,
            height: 2.,
            length: 3.,
            num_width_points: 2,
            num_height_points: 4,
            num_length_points: 3,
            ..FluidConfig::default()
        };
        let grid = build_grid(&config);
        assert_eq!(grid.len(), 24);
        assert_eq!(grid[0], vec3f(0., 0., 0.));
        assert!(grid.contains(&vec3f(0.5, 1.5, 2.)));
    }

    #[test]
    fn degenerate_grid_is_empty() {
        let config = FluidConfig {
            num_length_points: 0,
            ..FluidConfig::default()
        };
        assert!(build_grid(&config).is_empty());
        let store = ParticleStore::from_config(&config);
        assert!(store.is_empty());
    }

    #[test]
    fn jitter_is_bounded_and_reproducible() {
        let config = FluidConfig {
            position_jitter: 0.01,
            seed: 7,
            ..FluidConfig::default()
        };
        let a = build_grid(&config);
        let b = build_grid(&config);
        assert_eq!(a, b);

        let regular = build_grid(&FluidConfig::default());
        for (p, q) in a.iter().zip(regular.iter()) {
            assert!((p - q).amax() <= 0.01 + 1e-6);
        }
    }

    #[test]
    fn non_finite_jitter_is_ignored() {
        let regular = build_grid(&FluidConfig::default());
        for jitter in [FT::INFINITY, FT::NEG_INFINITY, FT::NAN] {
            let config = FluidConfig {
                position_jitter: jitter,
                ..FluidConfig::default()
            };
            assert_eq!(build_grid(&config), regular, "jitter {}", jitter);
        }
    }

    #[test]
    fn reset_restores_construction_state() {
        let positions = vec![vec3f(0., 0., 0.), vec3f(1., 0., 0.)];
        let fresh = ParticleStore::new(positions.clone(), 0.1, 0.3, RestDensity::Fixed(10.));
        let mut store = fresh.clone();

        store.state.position[0] = vec3f(5., 5., 5.);
        store.state.velocity[1] = vec3f(1., 2., 3.);
        store.state.vorticity[0] = vec3f(1., 0., 0.);
        store.state.correction[1] = vec3f(0., 1., 0.);
        store.state.rest_density[0] = 3.;

        store.reset();
        assert_eq!(store, fresh);
        store.reset();
        assert_eq!(store, fresh);
        assert_eq!(store.state.rest_density, vec![10., 10.]);
        assert!(!store.needs_rest_density());
    }

    #[test]
    fn reset_forgets_captured_rest_density() {
        let mut store = ParticleStore::new(vec![vec3f(0., 0., 0.)], 0.1, 0.3, RestDensity::FromInitialState);
        assert!(store.needs_rest_density());
        store.state.density[0] = 42.;
        store.capture_rest_density();
        assert!(!store.needs_rest_density());
        assert_eq!(store.state.rest_density[0], 42.);

        store.reset();
        assert!(store.needs_rest_density());
        assert_eq!(store.state.rest_density[0], 0.);
    }
}
