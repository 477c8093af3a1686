use serde::{Deserialize, Serialize};

use crate::{
    color_map::{color_map_viridis, color_map_water, ColorMap},
    floating_type_mod::FT,
    Fluid,
};

/// Number of `f32` per particle in `Fluid::render_buffer_flat`.
pub const RENDER_VERTEX_STRIDE: usize = 7;

/// One particle as seen by an external renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderVertex {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

/// What the particle color encodes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ColorSource {
    /// vertical position, from the lowest to the highest particle
    Height,
    /// density of the last density evaluation
    Density,
    Uniform([f32; 3]),
}

fn min_max(values: impl Iterator<Item = FT>) -> (FT, FT) {
    values.fold((FT::MAX, FT::MIN), |(min, max), v| (FT::min(min, v), FT::max(max, v)))
}

impl Fluid {
    /// Positions with derived colors, in particle order.
    pub fn render_buffer(&self, color_source: ColorSource) -> Vec<RenderVertex> {
        let state = &self.particles().state;

        let scalar_color = |values: &[FT], color_map: fn(FT, FT) -> ColorMap| {
            let (min, max) = min_max(values.iter().cloned());
            let color_map = color_map(min, max);
            values
                .iter()
                .map(|&v| {
                    let c = color_map.get_f32(v);
                    [c.x, c.y, c.z]
                })
                .collect::<Vec<_>>()
        };

        let colors = match color_source {
            ColorSource::Height => {
                let heights: Vec<FT> = state.position.iter().map(|p| p.y).collect();
                scalar_color(&heights[..], color_map_water)
            }
            ColorSource::Density => scalar_color(&state.density[..], color_map_viridis),
            ColorSource::Uniform(color) => vec![color; state.position.len()],
        };

        state
            .position
            .iter()
            .zip(colors)
            .map(|(p, [r, g, b])| RenderVertex {
                x: p.x as f32,
                y: p.y as f32,
                z: p.z as f32,
                r,
                g,
                b,
                a: 1.,
            })
            .collect()
    }

    /// `render_buffer` flattened to `x y z r g b a` per particle.
    pub fn render_buffer_flat(&self, color_source: ColorSource) -> Vec<f32> {
        let mut flat = Vec::with_capacity(self.num_particles() * RENDER_VERTEX_STRIDE);
        for v in self.render_buffer(color_source) {
            flat.extend_from_slice(&[v.x, v.y, v.z, v.r, v.g, v.b, v.a]);
        }
        flat
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation_parameters::FluidConfig;

    #[test]
    fn buffer_mirrors_positions() {
        let config = FluidConfig {
            num_width_points: 2,
            num_height_points: 3,
            num_length_points: 1,
            ..FluidConfig::default()
        };
        let fluid = Fluid::new(config, false);
        let buffer = fluid.render_buffer(ColorSource::Height);
        assert_eq!(buffer.len(), 6);
        for (v, p) in buffer.iter().zip(fluid.positions()) {
            assert_eq!([v.x, v.y, v.z], [p.x as f32, p.y as f32, p.z as f32]);
            assert_eq!(v.a, 1.);
            assert!([v.r, v.g, v.b].iter().all(|c| (0. ..=1.).contains(c)));
        }

        // the highest particle gets the last color stop
        let top = buffer.iter().cloned().fold(buffer[0], |a, b| if b.y > a.y { b } else { a });
        let foam = color_map_water(0., 1.).get_f32(1.);
        assert_eq!([top.r, top.g, top.b], [foam.x, foam.y, foam.z]);

        let flat = fluid.render_buffer_flat(ColorSource::Uniform([0.1, 0.2, 0.3]));
        assert_eq!(flat.len(), 6 * RENDER_VERTEX_STRIDE);
        assert_eq!(&flat[3..7], &[0.1f32, 0.2, 0.3, 1.]);
    }

    #[test]
    fn empty_fluid_has_empty_buffer() {
        let config = FluidConfig {
            num_height_points: 0,
            ..FluidConfig::default()
        };
        let fluid = Fluid::new(config, false);
        assert!(fluid.render_buffer(ColorSource::Density).is_empty());
    }
}
