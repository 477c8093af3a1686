use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    collision::{Collider, CollisionObject, Plane},
    floating_type_mod::FT,
    render_state::ColorSource,
    simulation_parameters::{load_yaml_config, ConfigError, FrameParams},
    vec3f, Fluid, V3,
};

/// Everything around the fluid: time stepping, external accelerations and solids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub frames_per_second: FT,
    pub substeps: usize,
    pub frames: usize,
    pub accelerations: Vec<V3>,
    pub collision_objects: Vec<Collider>,
    pub frame_params: FrameParams,
    pub color_source: ColorSource,
}

impl Default for SceneConfig {
    /// Gravity and an open box around the default fluid block.
    fn default() -> Self {
        SceneConfig {
            frames_per_second: 60.,
            substeps: 1,
            frames: 120,
            accelerations: vec![vec3f(0., -9.8, 0.)],
            collision_objects: vec![
                Collider::Plane(Plane::new(vec3f(0., -0.05, 0.), vec3f(0., 1., 0.))),
                Collider::Plane(Plane::new(vec3f(-0.05, 0., 0.), vec3f(1., 0., 0.))),
                Collider::Plane(Plane::new(vec3f(1., 0., 0.), vec3f(-1., 0., 0.))),
                Collider::Plane(Plane::new(vec3f(0., 0., -0.05), vec3f(0., 0., 1.))),
                Collider::Plane(Plane::new(vec3f(0., 0., 1.), vec3f(0., 0., -1.))),
            ],
            frame_params: FrameParams::default(),
            color_source: ColorSource::Height,
        }
    }
}

impl SceneConfig {
    pub fn load(path: &Path) -> Result<SceneConfig, ConfigError> {
        load_yaml_config(path, None)
    }

    pub fn collision_object_refs(&self) -> Vec<&dyn CollisionObject> {
        self.collision_objects
            .iter()
            .map(|c| c as &dyn CollisionObject)
            .collect()
    }

    /// Run all substeps of one frame.
    pub fn step_frame(&self, fluid: &mut Fluid) {
        let collision_objects = self.collision_object_refs();
        for _ in 0..self.substeps {
            fluid.simulate(
                self.frames_per_second,
                self.substeps,
                &self.frame_params,
                &self.accelerations,
                &collision_objects,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{assert_ft_approx_eq, collision::Sphere, simulation_parameters::FluidConfig};

    #[test]
    fn scene_yaml_with_colliders() {
        let yaml = r#"
frames_per_second: 30.0
substeps: 2
accelerations:
  - [0.0, -9.8, 0.0]
  - [1.0, 0.0, 0.0]
collision_objects:
  - Plane:
      point: [0.0, 0.0, 0.0]
      normal: [0.0, 1.0, 0.0]
  - Sphere:
      origin: [0.5, 0.5, 0.5]
      radius: 0.1
frame_params:
  damping: 0.01
"#;
        let scene: SceneConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(scene.substeps, 2);
        assert_eq!(scene.frames, SceneConfig::default().frames);
        assert_eq!(scene.accelerations.len(), 2);
        assert_eq!(
            scene.collision_objects[1],
            Collider::Sphere(Sphere::new(vec3f(0.5, 0.5, 0.5), 0.1))
        );
        assert_eq!(scene.frame_params.damping, 0.01);
        assert_eq!(scene.frame_params.stiffness, 1.);
        assert_eq!(scene.collision_object_refs().len(), 2);
    }

    #[test]
    fn step_frame_runs_every_substep() {
        let scene = SceneConfig {
            frames_per_second: 50.,
            substeps: 4,
            collision_objects: vec![],
            ..SceneConfig::default()
        };
        let config = FluidConfig {
            num_width_points: 1,
            num_height_points: 1,
            num_length_points: 1,
            ..FluidConfig::default()
        };
        let mut fluid = Fluid::new(config, false);
        scene.step_frame(&mut fluid);
        assert_eq!(fluid.step_number(), 4);
        assert_ft_approx_eq(fluid.time(), 0.02, 1e-6, || "frame duration".to_string());
    }
}
