use crate::{floating_type_mod::FT, vec3f, V};

pub type Color = V<FT, 3>;

/// Piecewise linear map from a scalar to an RGB color in `[0, 1]³`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorMap {
    insertions: Vec<(FT, Color)>,
}

impl ColorMap {
    pub fn new(mut insertions: Vec<(FT, Color)>) -> Self {
        insertions.retain(|(x, _)| !x.is_nan());
        insertions.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { insertions }
    }

    /// Values outside the color stops are clamped. NaN maps to the first stop.
    pub fn get(&self, x: FT) -> Color {
        let (first, last) = match (self.insertions.first(), self.insertions.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Color::zeros(),
        };
        if !(x > first.0) {
            return first.1;
        }
        if x >= last.0 {
            return last.1;
        }

        for stops in self.insertions.windows(2) {
            let (x0, c0) = stops[0];
            let (x1, c1) = stops[1];
            if x >= x0 && x <= x1 {
                if x1 <= x0 {
                    return c1;
                }
                let interp = (x - x0) / (x1 - x0);
                return c0 + interp * (c1 - c0);
            }
        }

        last.1
    }

    pub fn get_u8(&self, x: FT) -> V<u8, 3> {
        self.get(x).map(|f| (f * 255.) as u8)
    }

    pub fn get_f32(&self, x: FT) -> V<f32, 3> {
        self.get(x).map(|f| f as f32)
    }

    pub fn color_stops(&self) -> &[(FT, Color)] {
        &self.insertions
    }
}

pub fn color_map_viridis(min: FT, max: FT) -> ColorMap {
    ColorMap::new(vec![
        (
            min + (max - min) * 0.0,
            vec3f(0.2670039853213788, 0.0048725657145795975, 0.32941506855247793),
        ),
        (
            min + (max - min) * 0.3333333333333333,
            vec3f(0.19063051802725675, 0.4070603881536437, 0.5560891205440711),
        ),
        (
            min + (max - min) * 0.6666666666666666,
            vec3f(0.2080291781284243, 0.7186993731402823, 0.47287333975819085),
        ),
        (
            min + (max - min) * 1.0,
            vec3f(0.9932481489335602, 0.9061547634208059, 0.14393594366968385),
        ),
    ])
}

/// Deep blue at `min` to foam white at `max`.
pub fn color_map_water(min: FT, max: FT) -> ColorMap {
    ColorMap::new(vec![
        (min + (max - min) * 0.0, vec3f(0.02, 0.09, 0.35)),
        (min + (max - min) * 0.5, vec3f(0.11, 0.42, 0.78)),
        (min + (max - min) * 1.0, vec3f(0.85, 0.95, 1.0)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_v3_approx_eq;

    #[test]
    fn interpolates_between_stops() {
        let map = ColorMap::new(vec![(1., vec3f(1., 1., 1.)), (0., vec3f(0., 0., 0.))]);
        assert_v3_approx_eq(map.get(0.25), vec3f(0.25, 0.25, 0.25), 1e-6, || "color".to_string());
        assert_eq!(map.get(-3.), vec3f(0., 0., 0.));
        assert_eq!(map.get(7.), vec3f(1., 1., 1.));
        assert_eq!(map.get(FT::NAN), vec3f(0., 0., 0.));
        assert_eq!(map.get_u8(1.), [255, 255, 255].into());
    }

    #[test]
    fn degenerate_maps_do_not_panic() {
        assert_eq!(ColorMap::new(vec![]).get(0.5), Color::zeros());

        // min == max, as for a fluid where every particle has the same height
        let flat = color_map_water(2., 2.);
        assert_eq!(flat.get(2.), flat.color_stops()[0].1);
        assert_eq!(flat.get(3.), flat.color_stops()[2].1);
    }
}
