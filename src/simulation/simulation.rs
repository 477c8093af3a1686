use log::{debug, info, trace, warn};

use crate::{
    collision::CollisionObject,
    constraint_solver::{ConstraintSolver, DensityErrorStatistics},
    floating_type_mod::FT,
    neighborhood_search::{NeighborhoodCache, SpatialIndex},
    particles::{build_grid, ParticleStore},
    simulation_parameters::{FluidConfig, FrameParams},
    sph_kernels::SphKernels,
    statistics::{PerformanceCounters, ValueCounters},
    vorticity::VorticityViscosity,
    V3,
};

/**
 * A position based fluid: a fixed set of particles and the solver state needed to advance it.
 *
 * One call to `simulate` performs a single step of `1 / (frames_per_second * substeps)`
 * seconds. Callers that want a whole frame call it `substeps` times.
 */
pub struct Fluid {
    config: FluidConfig,
    kernels: SphKernels,
    solver: ConstraintSolver,
    vorticity_viscosity: VorticityViscosity,

    particles: ParticleStore,
    neighs: NeighborhoodCache,
    index: SpatialIndex,

    pcounters: PerformanceCounters,
    vcounters: ValueCounters,

    step_number: usize,
    time: FT,
}

impl Fluid {
    /// Seed the configured particle lattice.
    pub fn new(config: FluidConfig, counters_enabled: bool) -> Fluid {
        let spawn_positions = build_grid(&config);
        Self::with_positions(config, spawn_positions, counters_enabled)
    }

    /// Use an explicit set of spawn positions instead of the configured lattice.
    pub fn with_positions(config: FluidConfig, spawn_positions: Vec<V3>, counters_enabled: bool) -> Fluid {
        let kernels = SphKernels::new(config.kernel_radius);
        let particles = ParticleStore::new(
            spawn_positions,
            config.particle_radius,
            config.friction,
            config.rest_density,
        );
        let num_particles = particles.len();

        if num_particles == 0 {
            warn!("fluid has no particles, simulate will do nothing");
        }
        if !kernels.has_support() {
            warn!(
                "kernel radius {} is not a usable positive number, particles will not interact",
                config.kernel_radius
            );
        }
        info!(
            "created fluid with {} particles (kernel radius {}, {} solver iterations)",
            num_particles, config.kernel_radius, config.solver_iterations
        );

        Fluid {
            solver: ConstraintSolver::new(kernels, &config),
            vorticity_viscosity: VorticityViscosity::new(kernels, &config),
            index: SpatialIndex::new(config.neighborhood_search_algorithm, config.kernel_radius),
            neighs: NeighborhoodCache::new(num_particles),
            particles,
            kernels,
            config,
            pcounters: PerformanceCounters::new(counters_enabled),
            vcounters: ValueCounters::new(counters_enabled),
            step_number: 0,
            time: 0.,
        }
    }

    pub fn num_particles(&self) -> usize {
        self.particles.len()
    }

    pub fn config(&self) -> &FluidConfig {
        &self.config
    }

    pub fn kernels(&self) -> &SphKernels {
        &self.kernels
    }

    pub fn particles(&self) -> &ParticleStore {
        &self.particles
    }

    pub fn positions(&self) -> &[V3] {
        &self.particles.state.position
    }

    /// Neighbor lists of the last neighborhood search.
    pub fn neighbors(&self) -> &NeighborhoodCache {
        &self.neighs
    }

    pub fn step_number(&self) -> usize {
        self.step_number
    }

    /// Simulated seconds since construction or the last reset.
    pub fn time(&self) -> FT {
        self.time
    }

    pub fn performance_counters(&self) -> &PerformanceCounters {
        &self.pcounters
    }

    pub fn value_counters(&self) -> &ValueCounters {
        &self.vcounters
    }

    /// Neighbor lists and densities for the given positions.
    fn update_neighborhood(&mut self, use_predicted: bool) {
        let positions = if use_predicted {
            &self.particles.state.predicted_position
        } else {
            &self.particles.state.position
        };
        let radius = self.kernels.radius();
        self.neighs.build(&mut self.index, positions, radius);

        if self.config.check_neighborhood {
            self.neighs.check_neighborhood(positions, radius);
        }
    }

    fn update_committed_densities(&mut self) {
        self.update_neighborhood(false);
        let state = &mut self.particles.state;
        self.solver
            .calculate_all_particle_densities(&mut state.density, &state.position, &self.neighs);
    }

    fn capture_rest_density(&mut self) {
        self.update_committed_densities();
        self.particles.capture_rest_density();

        let rest_density = &self.particles.state.rest_density;
        info!(
            "captured rest density of {} particles: avg {} min {} max {}",
            rest_density.len(),
            rest_density.iter().sum::<FT>() / rest_density.len() as FT,
            rest_density.iter().cloned().fold(FT::MAX, FT::min),
            rest_density.iter().cloned().fold(FT::MIN, FT::max),
        );
    }

    /**
     * Advance the fluid by `1 / (frames_per_second * substeps)` seconds.
     *
     * Predicts positions from the summed `external_accelerations`, projects them towards rest
     * density in `solver_iterations` iterations, resolves `collision_objects` after every
     * iteration and commits the result. Vorticity confinement and viscosity act on the
     * committed velocities.
     */
    pub fn simulate(
        &mut self,
        frames_per_second: FT,
        substeps: usize,
        params: &FrameParams,
        external_accelerations: &[V3],
        collision_objects: &[&dyn CollisionObject],
    ) {
        if self.particles.is_empty() {
            return;
        }

        let dt = 1. / (frames_per_second * substeps as FT);
        if !(dt.is_finite() && dt > 0.) {
            warn!(
                "skipping step with invalid time step (fps: {}, substeps: {})",
                frames_per_second, substeps
            );
            return;
        }

        self.pcounters.begin("simulation-step");

        if self.particles.needs_rest_density() {
            self.capture_rest_density();
        }

        ConstraintSolver::predict(&mut self.particles.state, external_accelerations, dt);

        let mut statistics: Option<DensityErrorStatistics> = None;
        for iter in 0..self.config.solver_iterations {
            let first = iter == 0;

            self.pcounters.begin("neighborhood");
            self.update_neighborhood(true);
            end_phase(&mut self.pcounters, "neighborhood", first);

            self.pcounters.begin("density-solve");
            let iter_statistics = self
                .solver
                .solve_iteration(&mut self.particles.state, &self.neighs, params.stiffness);
            end_phase(&mut self.pcounters, "density-solve", first);

            trace!(
                "Iter {}: avg density error {:.4}% [max {:.4}%] avg neighbors {:.1}",
                iter,
                iter_statistics.avg_error() * 100.,
                iter_statistics.max_error * 100.,
                self.neighs.average_neighbor_count()
            );
            statistics = Some(iter_statistics);

            self.pcounters.begin("collision");
            ConstraintSolver::resolve_collisions(&mut self.particles, collision_objects);
            end_phase(&mut self.pcounters, "collision", first);
        }

        ConstraintSolver::finalize(&mut self.particles.state, dt, params.damping);

        if !self.vorticity_viscosity.is_disabled() {
            self.pcounters.begin("vorticity-viscosity");
            self.update_committed_densities();
            let state = &mut self.particles.state;
            self.vorticity_viscosity.update_vorticity(state, &self.neighs);
            self.vorticity_viscosity
                .apply_vorticity_confinement(state, &self.neighs, dt);
            self.vorticity_viscosity.apply_viscosity(state, &self.neighs);
            self.pcounters.end("vorticity-viscosity");
        }

        self.step_number += 1;
        self.time += dt;

        self.vcounters.add_value("particle-count", self.num_particles() as FT);
        self.vcounters
            .add_value("avg-neighbor-count", self.neighs.average_neighbor_count());
        if let Some(statistics) = statistics {
            self.vcounters.add_value("avg-density-error", statistics.avg_error());
            self.vcounters.add_value("max-density-error", statistics.max_error);
            debug!(
                "step {} (t={:.4}s): {} particles, avg density error {:.4}% [max {:.4}%]",
                self.step_number,
                self.time,
                self.num_particles(),
                statistics.avg_error() * 100.,
                statistics.max_error * 100.
            );
        }

        self.pcounters.end("simulation-step");
    }

    /// Put every particle back to its spawn position with zero velocity. Counters are kept.
    pub fn reset(&mut self) {
        self.particles.reset();
        self.neighs.clear();
        self.step_number = 0;
        self.time = 0.;
        debug!("reset fluid with {} particles", self.num_particles());
    }

    /// Largest density of the last density evaluation.
    pub fn max_density(&self) -> FT {
        self.particles.state.density.iter().cloned().fold(0., FT::max)
    }
}

fn end_phase(pcounters: &mut PerformanceCounters, id: &str, first: bool) {
    if first {
        pcounters.end(id);
    } else {
        pcounters.end_add_to_last(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        collision::Plane, simulation_parameters::RestDensity, statistics::write_statistics, vec3f,
    };

    #[test]
    fn empty_fluid_does_nothing() {
        let config = FluidConfig {
            num_width_points: 0,
            ..FluidConfig::default()
        };
        let mut fluid = Fluid::new(config, true);
        assert_eq!(fluid.num_particles(), 0);
        fluid.simulate(60., 1, &FrameParams::default(), &[vec3f(0., -9.8, 0.)], &[]);
        assert_eq!(fluid.step_number(), 0);
        fluid.reset();
    }

    #[test]
    fn invalid_time_step_is_skipped() {
        let mut fluid = Fluid::new(FluidConfig::default(), false);
        let before = fluid.positions().to_vec();
        fluid.simulate(60., 0, &FrameParams::default(), &[vec3f(0., -9.8, 0.)], &[]);
        fluid.simulate(0., 1, &FrameParams::default(), &[vec3f(0., -9.8, 0.)], &[]);
        assert_eq!(fluid.positions(), &before[..]);
        assert_eq!(fluid.step_number(), 0);
    }

    #[test]
    fn first_step_captures_rest_density() {
        let config = FluidConfig {
            num_width_points: 3,
            num_height_points: 3,
            num_length_points: 3,
            width: 0.15,
            height: 0.15,
            length: 0.15,
            ..FluidConfig::default()
        };
        let mut fluid = Fluid::new(config, false);
        assert!(fluid.particles().needs_rest_density());
        fluid.simulate(60., 1, &FrameParams::default(), &[], &[]);
        assert!(!fluid.particles().needs_rest_density());
        assert!(fluid.particles().state.rest_density.iter().all(|&r| r > 0.));

        fluid.reset();
        assert!(fluid.particles().needs_rest_density());
    }

    #[test]
    fn fixed_rest_density_is_never_captured() {
        let config = FluidConfig {
            rest_density: RestDensity::Fixed(1e9),
            num_width_points: 2,
            num_height_points: 2,
            num_length_points: 2,
            ..FluidConfig::default()
        };
        let mut fluid = Fluid::new(config, false);
        fluid.simulate(60., 1, &FrameParams::default(), &[], &[]);
        assert!(fluid.particles().state.rest_density.iter().all(|&r| r == 1e9));
    }

    #[test]
    fn floor_stops_falling_particles() {
        let config = FluidConfig {
            num_width_points: 3,
            num_height_points: 3,
            num_length_points: 3,
            width: 0.15,
            height: 0.15,
            length: 0.15,
            ..FluidConfig::default()
        };
        let mut fluid = Fluid::new(config, true);
        let floor = Plane::new(vec3f(0., -0.05, 0.), vec3f(0., 1., 0.));
        for _ in 0..120 {
            fluid.simulate(60., 1, &FrameParams::default(), &[vec3f(0., -9.8, 0.)], &[&floor]);
        }
        assert_eq!(fluid.step_number(), 120);
        for p in fluid.positions() {
            assert!(p.iter().all(|x| x.is_finite()));
            assert!(p.y > -0.05, "particle fell through the floor: {:?}", p);
        }

        let statistics = write_statistics(&fluid);
        assert!(statistics.contains("simulation-step"));
        assert!(statistics.contains("avg-density-error"));
    }
}
