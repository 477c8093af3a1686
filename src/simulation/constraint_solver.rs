use crate::{
    collision::{CollisionObject, CollisionParticle},
    concurrency::{par_iter_mut1, par_iter_mut2, par_iter_mut3, par_iter_reduce0},
    floating_type_mod::FT,
    neighborhood_search::NeighborhoodCache,
    particles::{ParticleStore, ParticleVec},
    simulation_parameters::{FluidConfig, TensileCorrection},
    sph_kernels::SphKernels,
    V3,
};

/// Floor for every density that ends up in a denominator.
pub const DENSITY_EPSILON: FT = 1e-6;

/// Density error of one solver iteration, `C_i = density_i / rest_density_i - 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DensityErrorStatistics {
    pub particle_count: usize,
    error_sum: FT,
    /// largest positive error, zero if no particle is compressed
    pub max_error: FT,
}

impl DensityErrorStatistics {
    fn zero() -> DensityErrorStatistics {
        DensityErrorStatistics {
            particle_count: 0,
            error_sum: 0.,
            max_error: 0.,
        }
    }

    fn for_particle(error: FT) -> DensityErrorStatistics {
        DensityErrorStatistics {
            particle_count: 1,
            error_sum: error.abs(),
            max_error: FT::max(error, 0.),
        }
    }

    fn combine(self, other: DensityErrorStatistics) -> DensityErrorStatistics {
        DensityErrorStatistics {
            particle_count: self.particle_count + other.particle_count,
            error_sum: self.error_sum + other.error_sum,
            max_error: FT::max(self.max_error, other.max_error),
        }
    }

    /// Average of `|C_i|`.
    pub fn avg_error(&self) -> FT {
        if self.particle_count > 0 {
            self.error_sum / self.particle_count as FT
        } else {
            0.
        }
    }
}

/**
 * Projects predicted positions towards the density constraint `C_i = density_i / rest_density_i - 1 = 0`.
 *
 * Every pass reads the fields written by the previous pass and writes exactly one field, so the
 * per-particle loops run in parallel without locking.
 */
#[derive(Debug, Clone, Copy)]
pub struct ConstraintSolver {
    kernels: SphKernels,
    particle_mass: FT,
    relaxation_epsilon: FT,
    tensile_correction: Option<TensileCorrection>,
    // W(delta_q * R)
    tensile_reference_density: FT,
}

impl ConstraintSolver {
    pub fn new(kernels: SphKernels, config: &FluidConfig) -> ConstraintSolver {
        let tensile_reference_density = match config.tensile_correction {
            Some(tc) => {
                let reference_distance = tc.delta_q * kernels.radius();
                kernels.density_from_distance_sq(reference_distance * reference_distance)
            }
            None => 0.,
        };

        ConstraintSolver {
            kernels,
            particle_mass: config.particle_mass,
            relaxation_epsilon: config.relaxation_epsilon,
            tensile_correction: config.tensile_correction.filter(|_| tensile_reference_density > 0.),
            tensile_reference_density,
        }
    }

    pub fn kernels(&self) -> &SphKernels {
        &self.kernels
    }

    /// Integrate the external accelerations and move every particle along its new velocity.
    pub fn predict(state: &mut ParticleVec, external_accelerations: &[V3], dt: FT) {
        let acceleration: V3 = external_accelerations.iter().sum();
        let position = &state.position;

        par_iter_mut2(
            &mut state.velocity,
            &mut state.predicted_position,
            |i, p_velocity, p_predicted_position| {
                *p_velocity += acceleration * dt;
                *p_predicted_position = position[i] + *p_velocity * dt;
            },
        );
    }

    pub fn calculate_particle_density(&self, i: usize, position: &[V3], neighs: &NeighborhoodCache) -> FT {
        let mut density_acc = 0.;
        for j in neighs.iter(i) {
            density_acc += self.kernels.density(position[i] - position[j]);
        }
        self.particle_mass * density_acc
    }

    pub fn calculate_all_particle_densities(&self, density: &mut [FT], position: &[V3], neighs: &NeighborhoodCache) {
        par_iter_mut1(density, |i, p_density| {
            *p_density = self.calculate_particle_density(i, position, neighs);
            debug_assert!(*p_density >= 0.);
        });
    }

    fn calculate_particle_lambda(
        &self,
        i: usize,
        position: &[V3],
        density: &[FT],
        rest_density: &[FT],
        neighs: &NeighborhoodCache,
    ) -> FT {
        let rest_density_i = FT::max(rest_density[i], DENSITY_EPSILON);
        let constraint = density[i] / rest_density_i - 1.;
        let scale = self.particle_mass / rest_density_i;

        // gradient of C_i with respect to the neighbor positions and to the particle itself
        let mut grad_self = V3::zeros();
        let mut grad_neighbors_sq = 0.;
        for j in neighs.iter_others(i) {
            let grad_j = self.kernels.gradient(position[i] - position[j]) * scale;
            grad_self += grad_j;
            grad_neighbors_sq += grad_j.norm_squared();
        }

        let denominator = grad_neighbors_sq + grad_self.norm_squared() + self.relaxation_epsilon;
        if !(denominator > 0.) {
            return 0.;
        }
        -constraint / denominator
    }

    pub fn calculate_all_lambdas(&self, state: &mut ParticleVec, neighs: &NeighborhoodCache) {
        par_iter_mut1(&mut state.lambda, |i, p_lambda| {
            *p_lambda = self.calculate_particle_lambda(
                i,
                &state.predicted_position,
                &state.density,
                &state.rest_density,
                neighs,
            );
            debug_assert!(p_lambda.is_finite());
        });
    }

    /// `s_corr = -k (W(r) / W(delta_q R))^n`
    #[inline(always)]
    fn tensile_term(&self, r: V3) -> FT {
        match self.tensile_correction {
            Some(tc) => -tc.k * (self.kernels.density(r) / self.tensile_reference_density).powi(tc.n),
            None => 0.,
        }
    }

    fn calculate_particle_correction(
        &self,
        i: usize,
        position: &[V3],
        rest_density: &[FT],
        lambda: &[FT],
        neighs: &NeighborhoodCache,
    ) -> V3 {
        let mut correction_acc = V3::zeros();
        for j in neighs.iter_others(i) {
            let x_ij = position[i] - position[j];
            correction_acc += self.kernels.gradient(x_ij) * (lambda[i] + lambda[j] + self.tensile_term(x_ij));
        }

        // `gradient` points away from the neighbor, the constraint gradient towards it
        -correction_acc * (self.particle_mass / FT::max(rest_density[i], DENSITY_EPSILON))
    }

    pub fn calculate_all_corrections(&self, state: &mut ParticleVec, neighs: &NeighborhoodCache) {
        par_iter_mut1(&mut state.correction, |i, p_correction| {
            *p_correction = self.calculate_particle_correction(
                i,
                &state.predicted_position,
                &state.rest_density,
                &state.lambda,
                neighs,
            );
        });
    }

    pub fn apply_corrections(state: &mut ParticleVec, stiffness: FT) {
        let correction = &state.correction;
        par_iter_mut1(&mut state.predicted_position, |i, p_predicted_position| {
            *p_predicted_position += correction[i] * stiffness;
        });
    }

    /// Pass every predicted position through all collision objects. The sweep starts at the committed position.
    pub fn resolve_collisions(particles: &mut ParticleStore, collision_objects: &[&dyn CollisionObject]) {
        if collision_objects.is_empty() {
            return;
        }

        let position = &particles.state.position;
        let radius = &particles.radius;
        let friction = &particles.friction;

        par_iter_mut1(&mut particles.state.predicted_position, |i, p_predicted_position| {
            let mut particle = CollisionParticle {
                position: *p_predicted_position,
                last_position: position[i],
                radius: radius[i],
                friction: friction[i],
            };
            for collision_object in collision_objects {
                collision_object.collide(&mut particle);
            }
            *p_predicted_position = particle.position;
        });
    }

    pub fn density_error(state: &ParticleVec) -> DensityErrorStatistics {
        par_iter_reduce0(
            state.density.len(),
            DensityErrorStatistics::zero,
            DensityErrorStatistics::combine,
            |i| {
                let rest_density = FT::max(state.rest_density[i], DENSITY_EPSILON);
                DensityErrorStatistics::for_particle(state.density[i] / rest_density - 1.)
            },
        )
    }

    /// Density, lambda and correction for the current neighborhood, then apply the scaled correction.
    pub fn solve_iteration(
        &self,
        state: &mut ParticleVec,
        neighs: &NeighborhoodCache,
        stiffness: FT,
    ) -> DensityErrorStatistics {
        self.calculate_all_particle_densities(&mut state.density, &state.predicted_position, neighs);
        let statistics = Self::density_error(state);

        self.calculate_all_lambdas(state, neighs);
        self.calculate_all_corrections(state, neighs);
        Self::apply_corrections(state, stiffness);

        statistics
    }

    /// Derive velocities from the displacement of this step and commit the predicted positions.
    pub fn finalize(state: &mut ParticleVec, dt: FT, damping: FT) {
        let predicted_position = &state.predicted_position;
        let velocity_scale = 1. - damping;

        par_iter_mut3(
            &mut state.velocity,
            &mut state.previous_position,
            &mut state.position,
            |i, p_velocity, p_previous_position, p_position| {
                *p_velocity = (predicted_position[i] - *p_position) / dt * velocity_scale;
                *p_previous_position = *p_position;
                *p_position = predicted_position[i];
            },
        );
    }
}
