use serde::{Deserialize, Serialize};

use super::{apply_friction, CollisionObject, CollisionParticle, SURFACE_OFFSET};
use crate::{floating_type_mod::FT, V3};

/// An infinite plane through `point`. Particles cannot cross it in either direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub point: V3,
    pub normal: V3,
}

impl Plane {
    pub fn new(point: V3, normal: V3) -> Plane {
        Plane {
            point,
            normal: normal.normalize(),
        }
    }

    /// Signed distance, positive on the side `normal` points to.
    pub fn probe(&self, x: V3) -> FT {
        self.normal.dot(&(x - self.point)) / self.normal.norm()
    }
}

impl CollisionObject for Plane {
    fn collide(&self, particle: &mut CollisionParticle) {
        let normal_len = self.normal.norm();
        if !(normal_len > 0.) {
            return;
        }
        let normal = self.normal / normal_len;

        let dist_now = normal.dot(&(particle.position - self.point));
        let dist_last = normal.dot(&(particle.last_position - self.point));
        let side: FT = if dist_last >= 0. { 1. } else { -1. };

        // still strictly on the side the particle came from
        if dist_now * side > 0. {
            return;
        }

        let tangent_point = particle.position - normal * dist_now;
        let target = tangent_point + normal * (SURFACE_OFFSET * side);
        particle.position = apply_friction(particle.last_position, target, particle.friction);
    }
}
