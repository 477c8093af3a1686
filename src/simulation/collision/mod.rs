use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};

use crate::{floating_type_mod::FT, V3};

mod plane;
mod sphere;

pub use plane::Plane;
pub use sphere::Sphere;

/// Resolved particles are kept this far away from collider surfaces.
pub const SURFACE_OFFSET: FT = 1e-4;

/// The view of a single particle that a collision object may inspect and move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionParticle {
    /// predicted position of the current step, moved out of solids by `collide`
    pub position: V3,
    /// committed position at the end of the previous step
    pub last_position: V3,
    pub radius: FT,
    pub friction: FT,
}

/**
 * A solid the fluid cannot enter.
 *
 * `collide` is called once per particle and solver iteration, possibly from several threads at
 * once. It must only modify the particle it is given and must be idempotent: calling it again
 * on an already resolved particle leaves the particle unchanged.
 */
#[enum_dispatch]
pub trait CollisionObject: Sync {
    fn collide(&self, particle: &mut CollisionParticle);
}

#[enum_dispatch(CollisionObject)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Collider {
    Plane(Plane),
    Sphere(Sphere),
}

/// Blend between staying at the last position (`friction = 1`) and moving to `target` (`friction = 0`).
fn apply_friction(last_position: V3, target: V3, friction: FT) -> V3 {
    last_position + (target - last_position) * (1. - friction)
}
