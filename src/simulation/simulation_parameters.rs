use std::path::{Path, PathBuf};

use ahash::HashMap;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{floating_type_mod::FT, vec3f, V3};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed reading `{}`: {source}", .path.display())]
    Io { path: PathBuf, source: std::io::Error },

    #[error("failed parsing {what}: {source}")]
    Yaml { what: String, source: serde_yaml::Error },

    #[error("not able to find attribute `{0}`")]
    UnknownAttribute(String),

    #[error("config is not a mapping")]
    NotAMapping,

    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Where the per-particle rest density comes from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RestDensity {
    /// Captured per particle from the committed positions on the first `simulate` call.
    FromInitialState,
    Fixed(FT),
}

/// Artificial pressure term `s_corr = -k * (W(r) / W(delta_q * R))^n` against particle clumping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TensileCorrection {
    pub k: FT,
    /// fraction of the kernel radius
    pub delta_q: FT,
    pub n: i32,
}

impl Default for TensileCorrection {
    fn default() -> Self {
        TensileCorrection { k: 0.1, delta_q: 0.2, n: 4 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VorticityWeighting {
    /// `N ~ sum_j |omega_j| grad W_ij`
    Unscaled,
    /// `N ~ sum_j m / rho_j |omega_j| grad W_ij`
    NeighborDensity,
}

/// Weight of a neighbor in the XSPH velocity blend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViscosityWeighting {
    /// `dv_i = c * sum_j W_ij (v_j - v_i)`
    Unscaled,
    /// `dv_i = c * sum_j m / rho_j W_ij (v_j - v_i)`
    NeighborDensity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NeighborhoodSearchAlgorithm {
    /// hash map from integer cell coordinates to particle indices
    HashGrid,
    RStar,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluidConfig {
    // fluid block that is seeded with particles
    pub width: FT,
    pub length: FT,
    pub height: FT,
    pub num_width_points: usize,
    pub num_length_points: usize,
    pub num_height_points: usize,
    /// every seeded position is shifted by a uniform random offset in [-jitter, jitter] per axis
    pub position_jitter: FT,
    pub seed: u64,

    pub particle_radius: FT,
    pub friction: FT,
    pub particle_mass: FT,

    /// kernel support radius R
    pub kernel_radius: FT,
    pub solver_iterations: usize,
    pub rest_density: RestDensity,
    /// added to the denominator of every lambda
    pub relaxation_epsilon: FT,
    pub tensile_correction: Option<TensileCorrection>,

    pub vorticity_epsilon: FT,
    pub vorticity_weighting: VorticityWeighting,
    pub viscosity: FT,
    pub viscosity_weighting: ViscosityWeighting,

    pub neighborhood_search_algorithm: NeighborhoodSearchAlgorithm,
    /// slow: brute force verification of every neighborhood
    pub check_neighborhood: bool,
}

impl Default for FluidConfig {
    fn default() -> Self {
        FluidConfig {
            width: 0.5,
            length: 0.5,
            height: 0.5,
            num_width_points: 10,
            num_length_points: 10,
            num_height_points: 10,
            position_jitter: 0.,
            seed: 0,
            particle_radius: 0.02,
            friction: 0.2,
            particle_mass: 1.,
            kernel_radius: 0.1,
            solver_iterations: 4,
            rest_density: RestDensity::FromInitialState,
            relaxation_epsilon: 100.,
            tensile_correction: None,
            vorticity_epsilon: 1e-4,
            vorticity_weighting: VorticityWeighting::Unscaled,
            viscosity: 0.01,
            viscosity_weighting: ViscosityWeighting::NeighborDensity,
            neighborhood_search_algorithm: NeighborhoodSearchAlgorithm::HashGrid,
            check_neighborhood: false,
        }
    }
}

impl FluidConfig {
    pub fn particle_count(&self) -> usize {
        self.num_width_points * self.num_length_points * self.num_height_points
    }

    /// Distance between seeded particles along each axis (width, height, length).
    pub fn grid_spacing(&self) -> V3 {
        fn spacing(extent: FT, points: usize) -> FT {
            if points == 0 {
                0.
            } else {
                extent / points as FT
            }
        }
        vec3f(
            spacing(self.width, self.num_width_points),
            spacing(self.height, self.num_height_points),
            spacing(self.length, self.num_length_points),
        )
    }

    /// Construction accepts any configuration. Use this for a strict contract.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(field: &'static str, v: FT) -> Result<(), ConfigError> {
            if v.is_finite() && v > 0. {
                Ok(())
            } else {
                Err(ConfigError::Invalid {
                    field,
                    reason: format!("expected a positive number, got {}", v),
                })
            }
        }
        fn non_negative(field: &'static str, v: FT) -> Result<(), ConfigError> {
            if v.is_finite() && v >= 0. {
                Ok(())
            } else {
                Err(ConfigError::Invalid {
                    field,
                    reason: format!("expected a non-negative number, got {}", v),
                })
            }
        }

        positive("width", self.width)?;
        positive("length", self.length)?;
        positive("height", self.height)?;
        for (field, points) in [
            ("num_width_points", self.num_width_points),
            ("num_length_points", self.num_length_points),
            ("num_height_points", self.num_height_points),
        ] {
            if points == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "at least one point per axis is needed".to_string(),
                });
            }
        }
        non_negative("position_jitter", self.position_jitter)?;
        positive("particle_radius", self.particle_radius)?;
        non_negative("friction", self.friction)?;
        if self.friction > 1. {
            return Err(ConfigError::Invalid {
                field: "friction",
                reason: format!("expected a value in [0, 1], got {}", self.friction),
            });
        }
        positive("particle_mass", self.particle_mass)?;
        positive("kernel_radius", self.kernel_radius)?;
        if self.solver_iterations == 0 {
            return Err(ConfigError::Invalid {
                field: "solver_iterations",
                reason: "at least one solver iteration is needed".to_string(),
            });
        }
        if let RestDensity::Fixed(rest_density) = self.rest_density {
            positive("rest_density", rest_density)?;
        }
        positive("relaxation_epsilon", self.relaxation_epsilon)?;
        if let Some(tensile_correction) = self.tensile_correction {
            non_negative("tensile_correction.k", tensile_correction.k)?;
            positive("tensile_correction.delta_q", tensile_correction.delta_q)?;
            if tensile_correction.delta_q >= 1. {
                return Err(ConfigError::Invalid {
                    field: "tensile_correction.delta_q",
                    reason: "reference distance must lie inside the kernel support".to_string(),
                });
            }
        }
        non_negative("vorticity_epsilon", self.vorticity_epsilon)?;
        non_negative("viscosity", self.viscosity)?;
        Ok(())
    }
}

/// Tunables that may change from one `simulate` call to the next.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameParams {
    /// finalized velocities are scaled by `1 - damping`
    pub damping: FT,
    /// scale factor for the position correction of every solver iteration
    pub stiffness: FT,
}

impl Default for FrameParams {
    fn default() -> Self {
        FrameParams {
            damping: 0.,
            stiffness: 1.,
        }
    }
}

fn read_yaml_value(path: &Path) -> Result<serde_yaml::Value, ConfigError> {
    let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&yaml).map_err(|source| ConfigError::Yaml {
        what: path.display().to_string(),
        source,
    })
}

/// Replace top-level attributes of `base` by the ones found in `overwrite`.
pub fn apply_overwrite(
    base: &mut serde_yaml::Value,
    overwrite: HashMap<String, serde_yaml::Value>,
) -> Result<(), ConfigError> {
    let mapping = base.as_mapping_mut().ok_or(ConfigError::NotAMapping)?;
    for (k, v) in overwrite.into_iter() {
        let entry = mapping
            .get_mut(&serde_yaml::Value::String(k.clone()))
            .ok_or(ConfigError::UnknownAttribute(k))?;
        *entry = v;
    }
    Ok(())
}

/// Load a YAML config, optionally patched by a second YAML file with top-level overrides.
pub fn load_yaml_config<T: DeserializeOwned>(path: &Path, overwrite: Option<&Path>) -> Result<T, ConfigError> {
    let mut value = read_yaml_value(path)?;

    if let Some(overwrite_path) = overwrite {
        let overwrite_value = read_yaml_value(overwrite_path)?;
        let overwrite_map: HashMap<String, serde_yaml::Value> =
            serde_yaml::from_value(overwrite_value).map_err(|source| ConfigError::Yaml {
                what: overwrite_path.display().to_string(),
                source,
            })?;
        apply_overwrite(&mut value, overwrite_map)?;
    }

    serde_yaml::from_value(value).map_err(|source| ConfigError::Yaml {
        what: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = FluidConfig::default();
        config.validate().unwrap();
        assert_eq!(config.particle_count(), 1000);
        assert_eq!(config.grid_spacing(), vec3f(0.05, 0.05, 0.05));
    }

    #[test]
    fn validation_names_the_offending_field() {
        let config = FluidConfig {
            kernel_radius: -1.,
            ..FluidConfig::default()
        };
        match config.validate() {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "kernel_radius"),
            other => panic!("unexpected validation result {:?}", other),
        }

        let config = FluidConfig {
            num_height_points: 0,
            ..FluidConfig::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(config.particle_count(), 0);
    }

    #[test]
    fn partial_yaml_uses_defaults() {
        let config: FluidConfig = serde_yaml::from_str(
            "kernel_radius: 0.2\nsolver_iterations: 5\nrest_density:\n  Fixed: 1000.0\n",
        )
        .unwrap();
        assert_eq!(config.kernel_radius, 0.2);
        assert_eq!(config.solver_iterations, 5);
        assert_eq!(config.rest_density, RestDensity::Fixed(1000.));
        assert_eq!(config.num_width_points, FluidConfig::default().num_width_points);
    }

    #[test]
    fn overwrite_replaces_known_attributes_only() {
        let mut base = serde_yaml::to_value(FluidConfig::default()).unwrap();

        let mut overwrite = HashMap::default();
        overwrite.insert("viscosity".to_string(), serde_yaml::from_str("0.5").unwrap());
        apply_overwrite(&mut base, overwrite).unwrap();
        let config: FluidConfig = serde_yaml::from_value(base.clone()).unwrap();
        assert_eq!(config.viscosity, 0.5);

        let mut overwrite = HashMap::default();
        overwrite.insert("no_such_field".to_string(), serde_yaml::from_str("1").unwrap());
        assert!(matches!(
            apply_overwrite(&mut base, overwrite),
            Err(ConfigError::UnknownAttribute(_))
        ));
    }
}
