use std::mem;

use crate::{
    concurrency::par_iter_mut1,
    constraint_solver::DENSITY_EPSILON,
    floating_type_mod::FT,
    neighborhood_search::NeighborhoodCache,
    particles::ParticleVec,
    simulation_parameters::{FluidConfig, ViscosityWeighting, VorticityWeighting},
    sph_kernels::SphKernels,
    V3,
};

/// Vorticities and confinement directions below this length are treated as zero.
pub const VORTICITY_THRESHOLD: FT = 1e-6;

/// Velocity post-processing after the position solve: vorticity confinement and XSPH viscosity.
#[derive(Debug, Clone, Copy)]
pub struct VorticityViscosity {
    kernels: SphKernels,
    particle_mass: FT,
    vorticity_epsilon: FT,
    weighting: VorticityWeighting,
    viscosity: FT,
    viscosity_weighting: ViscosityWeighting,
}

impl VorticityViscosity {
    pub fn new(kernels: SphKernels, config: &FluidConfig) -> VorticityViscosity {
        VorticityViscosity {
            kernels,
            particle_mass: config.particle_mass,
            vorticity_epsilon: config.vorticity_epsilon,
            weighting: config.vorticity_weighting,
            viscosity: config.viscosity,
            viscosity_weighting: config.viscosity_weighting,
        }
    }

    /// Nothing to do for the current configuration.
    pub fn is_disabled(&self) -> bool {
        self.vorticity_epsilon <= 0. && self.viscosity <= 0.
    }

    /// `omega_i = sum_j (v_j - v_i) x grad_ij`, the SPH estimate of the velocity curl.
    fn calculate_particle_vorticity(&self, i: usize, position: &[V3], velocity: &[V3], neighs: &NeighborhoodCache) -> V3 {
        let mut vorticity_acc = V3::zeros();
        for j in neighs.iter_others(i) {
            let v_ji = velocity[j] - velocity[i];
            vorticity_acc += v_ji.cross(&self.kernels.gradient(position[i] - position[j]));
        }
        vorticity_acc
    }

    pub fn update_vorticity(&self, state: &mut ParticleVec, neighs: &NeighborhoodCache) {
        par_iter_mut1(&mut state.vorticity, |i, p_vorticity| {
            *p_vorticity = self.calculate_particle_vorticity(i, &state.position, &state.velocity, neighs);
        });
    }

    /// Normalized direction towards neighbors with stronger vorticity. `None` if that direction is undefined.
    fn confinement_direction(
        &self,
        i: usize,
        position: &[V3],
        density: &[FT],
        vorticity: &[V3],
        neighs: &NeighborhoodCache,
    ) -> Option<V3> {
        let mut eta = V3::zeros();
        for j in neighs.iter_others(i) {
            let weight = match self.weighting {
                VorticityWeighting::Unscaled => 1.,
                VorticityWeighting::NeighborDensity => self.particle_mass / FT::max(density[j], DENSITY_EPSILON),
            };
            // the kernel gradient with respect to `position[i]` is `-gradient`
            eta -= self.kernels.gradient(position[i] - position[j]) * (weight * vorticity[j].norm());
        }

        let eta_len = eta.norm();
        if eta_len > VORTICITY_THRESHOLD {
            Some(eta / eta_len)
        } else {
            None
        }
    }

    /// Add `dt / m * epsilon (N x omega)` to every velocity.
    pub fn apply_vorticity_confinement(&self, state: &mut ParticleVec, neighs: &NeighborhoodCache, dt: FT) {
        if self.vorticity_epsilon <= 0. {
            return;
        }

        let velocity_factor = dt / self.particle_mass * self.vorticity_epsilon;
        par_iter_mut1(&mut state.velocity_temp, |i, p_velocity_temp| {
            let velocity = state.velocity[i];
            let omega = state.vorticity[i];
            *p_velocity_temp = velocity;

            if !(omega.norm() > VORTICITY_THRESHOLD) {
                return;
            }
            if let Some(n) =
                self.confinement_direction(i, &state.position, &state.density, &state.vorticity, neighs)
            {
                *p_velocity_temp = velocity + n.cross(&omega) * velocity_factor;
            }
        });

        mem::swap(&mut state.velocity, &mut state.velocity_temp);
    }

    fn calculate_particle_viscosity_delta(
        &self,
        i: usize,
        position: &[V3],
        velocity: &[V3],
        density: &[FT],
        neighs: &NeighborhoodCache,
    ) -> V3 {
        let mut delta_acc = V3::zeros();
        for j in neighs.iter_others(i) {
            let kernel = self.kernels.density(position[i] - position[j]);
            let weight = match self.viscosity_weighting {
                ViscosityWeighting::Unscaled => kernel,
                ViscosityWeighting::NeighborDensity => kernel * self.particle_mass / FT::max(density[j], DENSITY_EPSILON),
            };
            delta_acc += (velocity[j] - velocity[i]) * weight;
        }
        delta_acc * self.viscosity
    }

    /// XSPH: blend every velocity towards the kernel weighted velocity of its neighbors.
    pub fn apply_viscosity(&self, state: &mut ParticleVec, neighs: &NeighborhoodCache) {
        if self.viscosity <= 0. {
            return;
        }

        par_iter_mut1(&mut state.velocity_temp, |i, p_velocity_temp| {
            *p_velocity_temp = state.velocity[i]
                + self.calculate_particle_viscosity_delta(i, &state.position, &state.velocity, &state.density, neighs);
        });

        mem::swap(&mut state.velocity, &mut state.velocity_temp);
    }
}
