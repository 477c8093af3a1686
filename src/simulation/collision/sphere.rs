use serde::{Deserialize, Serialize};

use super::{apply_friction, CollisionObject, CollisionParticle, SURFACE_OFFSET};
use crate::{floating_type_mod::FT, V3};

/// A solid ball.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    pub origin: V3,
    pub radius: FT,
}

impl Sphere {
    pub fn new(origin: V3, radius: FT) -> Sphere {
        Sphere { origin, radius }
    }

    fn surface_point(&self, direction_hint: V3, fallback: V3) -> V3 {
        let len = direction_hint.norm();
        let dir = if len > 1e-9 {
            direction_hint / len
        } else {
            let fallback_len = fallback.norm();
            if fallback_len > 1e-9 {
                fallback / fallback_len
            } else {
                V3::y()
            }
        };
        self.origin + dir * (self.radius + SURFACE_OFFSET)
    }
}

impl CollisionObject for Sphere {
    fn collide(&self, particle: &mut CollisionParticle) {
        let offset = particle.position - self.origin;
        if !(offset.norm() < self.radius) {
            return;
        }

        let last_offset = particle.last_position - self.origin;
        let target = self.surface_point(offset, last_offset);
        let resolved = apply_friction(particle.last_position, target, particle.friction);

        // the chord between two outside points can still cut through the ball
        particle.position = if (resolved - self.origin).norm() < self.radius {
            self.surface_point(resolved - self.origin, last_offset)
        } else {
            resolved
        };
    }
}
