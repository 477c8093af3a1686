use crate::{floating_type_mod::{FT, PI}, V3};

/// Below this distance two particles count as coincident and the gradient is zero.
pub const GRADIENT_MIN_DISTANCE: FT = 1e-5;

/**
 * Smoothing kernels with a fixed support radius R.
 *
 * `density` is the poly6 kernel `(R² - |r|²)³ * 315 / (64 PI R⁹)`.
 *
 * `gradient` has the magnitude of the spiky kernel derivative `(R - |r|)² * 45 / (PI R⁶)`
 * and points along `r`, away from the kernel center. The analytic gradient of a radially
 * decreasing kernel points the other way, so every caller that needs `∇W` uses `-gradient(r)`.
 *
 * Both normalization constants are derived once from R. A radius that is not a positive finite
 * number (or whose constants do not fit into `FT`) gives a kernel without support: both kernels
 * are zero everywhere and particles do not interact.
 */
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphKernels {
    radius: FT,
    radius_sq: FT,
    density_coefficient: FT,
    gradient_coefficient: FT,
}

impl SphKernels {
    pub fn new(radius: FT) -> SphKernels {
        let kernels = SphKernels {
            radius,
            radius_sq: radius * radius,
            density_coefficient: 315. / (64. * PI * radius.powi(9)),
            gradient_coefficient: 45. / (PI * radius.powi(6)),
        };

        let valid = radius.is_finite()
            && radius > 0.
            && kernels.radius_sq.is_finite()
            && kernels.density_coefficient.is_finite()
            && kernels.gradient_coefficient.is_finite();
        if valid {
            kernels
        } else {
            Self::without_support()
        }
    }

    fn without_support() -> SphKernels {
        SphKernels {
            radius: 0.,
            radius_sq: 0.,
            density_coefficient: 0.,
            gradient_coefficient: 0.,
        }
    }

    /// False for the kernel without support.
    pub fn has_support(&self) -> bool {
        self.radius > 0.
    }

    pub fn radius(&self) -> FT {
        self.radius
    }

    #[inline(always)]
    pub fn density(&self, r: V3) -> FT {
        self.density_from_distance_sq(r.norm_squared())
    }

    /// The poly6 kernel evaluated from a squared distance. Zero outside `[0, R)` and for NaN input.
    #[inline(always)]
    pub fn density_from_distance_sq(&self, r_sq: FT) -> FT {
        if !(r_sq >= 0. && r_sq < self.radius_sq) {
            return 0.;
        }
        let diff = self.radius_sq - r_sq;
        self.density_coefficient * diff * diff * diff
    }

    #[inline(always)]
    pub fn gradient(&self, r: V3) -> V3 {
        let r_len = r.norm();
        if !(r_len >= GRADIENT_MIN_DISTANCE && r_len < self.radius) {
            return V3::zeros();
        }
        let diff = self.radius - r_len;
        r * (self.gradient_coefficient * diff * diff / r_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{assert_ft_approx_eq, vec3f};

    #[test]
    fn density_kernel_has_compact_support() {
        let kernels = SphKernels::new(0.1);
        let steps = 300;
        let mut last = kernels.density(V3::zeros());
        assert!(last > 0.);

        for i in 1..=steps {
            let r = 0.15 * i as FT / steps as FT;
            let w = kernels.density(vec3f(r, 0., 0.));
            assert!(w >= 0., "negative kernel value {} at r={}", w, r);
            if r >= 0.1 {
                assert_eq!(w, 0., "kernel must vanish at r={}", r);
            } else {
                assert!(w <= last, "kernel is not decreasing at r={}", r);
            }
            last = w;
        }

        // continuous towards the support boundary
        let w_near = kernels.density(vec3f(0.0999, 0., 0.));
        assert!(w_near < 1e-3 * kernels.density(V3::zeros()));
    }

    #[test]
    fn density_kernel_rejects_invalid_distances() {
        let kernels = SphKernels::new(0.1);
        assert_eq!(kernels.density_from_distance_sq(FT::NAN), 0.);
        assert_eq!(kernels.density_from_distance_sq(-1.), 0.);
        assert_eq!(kernels.density(vec3f(FT::INFINITY, 0., 0.)), 0.);
    }

    #[test]
    fn density_kernel_integration_test() {
        let kernels = SphKernels::new(1.0);
        let grid_size = 60;
        let cell_len = 2. / grid_size as f64;
        let cell_volume = cell_len * cell_len * cell_len;

        let mut integral: f64 = 0.;
        for z in 0..grid_size {
            for y in 0..grid_size {
                for x in 0..grid_size {
                    let p = vec3f(
                        ((x as f64 + 0.5) * cell_len - 1.) as FT,
                        ((y as f64 + 0.5) * cell_len - 1.) as FT,
                        ((z as f64 + 0.5) * cell_len - 1.) as FT,
                    );
                    integral += kernels.density(p) as f64 * cell_volume;
                }
            }
        }

        println!("Integration of poly6 kernel with R=1: {}", integral);
        assert_ft_approx_eq(integral, 1.0, 0.01, || "poly6 integral".to_string());
    }

    #[test]
    fn gradient_is_zero_at_origin_and_outside_support() {
        let kernels = SphKernels::new(0.1);
        assert_eq!(kernels.gradient(V3::zeros()), V3::zeros());
        assert_eq!(kernels.gradient(vec3f(1e-7, 0., 0.)), V3::zeros());
        assert_eq!(kernels.gradient(vec3f(0.1, 0., 0.)), V3::zeros());
        assert_eq!(kernels.gradient(vec3f(0., 0.2, 0.)), V3::zeros());
        assert_eq!(kernels.gradient(vec3f(FT::NAN, 0., 0.)), V3::zeros());
    }

    #[test]
    fn gradient_points_away_from_center() {
        let kernels = SphKernels::new(0.1);
        let r = vec3f(0.03, -0.02, 0.01);
        let g = kernels.gradient(r);
        assert!(g.dot(&r) > 0.);
        assert_ft_approx_eq(g.normalize().dot(&r.normalize()), 1., 1e-5, || "direction".to_string());
    }

    /// The gradient is the negated derivative of the spiky kernel `15 / (PI R⁶) (R - r)³`.
    #[test]
    fn gradient_derivative_test() {
        let radius: FT = 1.;
        let kernels = SphKernels::new(radius);
        let spiky = |r: V3| -> FT {
            let r_len = r.norm();
            if r_len >= radius {
                return 0.;
            }
            15. / (PI * radius.powi(6)) * (radius - r_len).powi(3)
        };

        let diff: FT = 1e-3;
        let test_grid_size = 8;
        for z in 0..test_grid_size {
            for y in 0..test_grid_size {
                for x in 0..test_grid_size {
                    let sample = vec3f(
                        (x as FT + 0.5) / test_grid_size as FT * 1.2 - 0.6,
                        (y as FT + 0.5) / test_grid_size as FT * 1.2 - 0.6,
                        (z as FT + 0.5) / test_grid_size as FT * 1.2 - 0.6,
                    );
                    if sample.norm() < 0.05 || sample.norm() > 0.95 {
                        continue;
                    }

                    let analytical = kernels.gradient(sample);
                    for d in 0..3 {
                        let mut pos = sample;
                        let mut neg = sample;
                        pos[d] += diff * 0.5;
                        neg[d] -= diff * 0.5;
                        let approx = (spiky(pos) - spiky(neg)) / diff;
                        assert_ft_approx_eq(analytical[d], -approx, 0.01, || {
                            format!("gradient at {:?} axis {}", sample, d)
                        });
                    }
                }
            }
        }
    }

    #[test]
    fn degenerate_radius_has_no_support() {
        for radius in [0., -0.1, FT::NAN, FT::INFINITY, FT::NEG_INFINITY] {
            let kernels = SphKernels::new(radius);
            assert!(!kernels.has_support(), "radius {}", radius);
            assert_eq!(kernels.radius(), 0.);
            for r in [V3::zeros(), vec3f(0.05, 0., 0.), vec3f(-0.01, 0.02, 0.)] {
                assert_eq!(kernels.density(r), 0., "density for radius {} at {:?}", radius, r);
                assert_eq!(kernels.gradient(r), V3::zeros(), "gradient for radius {} at {:?}", radius, r);
            }
        }
        assert!(SphKernels::new(0.1).has_support());
    }
}
