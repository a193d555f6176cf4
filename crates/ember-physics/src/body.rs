// SPDX-License-Identifier: Apache-2.0
//! Rigid bodies and the per-entity rotation cache.

use ember_core::Component;
use ember_math::{Angle16, Fx, Vec2Fx};
use serde::{Deserialize, Serialize};

/// 2D rigid body state, all fixed point.
///
/// `inv_mass` / `inv_inertia` of zero mean immovable along that degree of
/// freedom. A body is integrated iff `awake`; sleeping bodies still
/// participate in narrowphase but the solver treats them as immovable and
/// never writes their velocities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Body2D {
    /// World position.
    pub position: Vec2Fx,
    /// Linear velocity, units per second.
    pub velocity: Vec2Fx,
    /// Orientation as a 16-bit turn fraction.
    pub angle: Angle16,
    /// Angular velocity, radians per second.
    pub angular_velocity: Fx,
    /// Inverse mass; zero for immovable bodies.
    pub inv_mass: Fx,
    /// Inverse rotational inertia; zero locks rotation.
    pub inv_inertia: Fx,
    /// Whether the body is integrated this frame.
    pub awake: bool,
    /// Restitution used when no material component overrides it.
    pub restitution: Fx,
    /// Friction used when no material component overrides it.
    pub friction: Fx,
    /// Seconds spent below the sleep thresholds.
    pub sleep_timer: Fx,
}

impl Body2D {
    /// A dynamic body at `position` with the given mass (must be positive).
    #[must_use]
    pub fn dynamic(position: Vec2Fx, mass: Fx) -> Self {
        Self {
            position,
            velocity: Vec2Fx::ZERO,
            angle: Angle16::ZERO,
            angular_velocity: Fx::ZERO,
            inv_mass: Fx::ONE / mass,
            inv_inertia: Fx::ONE / mass,
            awake: true,
            restitution: Fx::ZERO,
            friction: Fx::HALF,
            sleep_timer: Fx::ZERO,
        }
    }

    /// An immovable body (infinite mass and inertia).
    #[must_use]
    pub fn immovable(position: Vec2Fx) -> Self {
        Self {
            position,
            velocity: Vec2Fx::ZERO,
            angle: Angle16::ZERO,
            angular_velocity: Fx::ZERO,
            inv_mass: Fx::ZERO,
            inv_inertia: Fx::ZERO,
            awake: true,
            restitution: Fx::ZERO,
            friction: Fx::HALF,
            sleep_timer: Fx::ZERO,
        }
    }

    /// Returns a copy with the given linear velocity.
    #[must_use]
    pub fn with_velocity(mut self, velocity: Vec2Fx) -> Self {
        self.velocity = velocity;
        self
    }

    /// Returns a copy with the given restitution.
    #[must_use]
    pub fn with_restitution(mut self, restitution: Fx) -> Self {
        self.restitution = restitution;
        self
    }

    /// Returns a copy with the given friction.
    #[must_use]
    pub fn with_friction(mut self, friction: Fx) -> Self {
        self.friction = friction;
        self
    }

    /// Returns a copy with the given inverse inertia.
    #[must_use]
    pub fn with_inv_inertia(mut self, inv_inertia: Fx) -> Self {
        self.inv_inertia = inv_inertia;
        self
    }

    /// Whether the body can move at all.
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.inv_mass != Fx::ZERO || self.inv_inertia != Fx::ZERO
    }

    /// Applies a linear impulse at the center of mass, waking the body when
    /// the impulse magnitude exceeds `wake_threshold`.
    pub fn apply_impulse(&mut self, impulse: Vec2Fx, wake_threshold: Fx) {
        if !self.awake && impulse.length() > wake_threshold {
            self.awake = true;
            self.sleep_timer = Fx::ZERO;
        }
        if self.awake {
            self.velocity += impulse * self.inv_mass;
        }
    }
}

impl Component for Body2D {
    const NAME: &'static str = "Body2D";
}

/// Cached sine/cosine of a body's angle.
///
/// Recomputed by the shape-sync pass whenever the cached angle falls out of
/// step with the body, so narrowphase never calls trigonometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationCache2D {
    /// Angle the cache was computed for.
    pub angle: Angle16,
    /// Cosine of the angle.
    pub cos: Fx,
    /// Sine of the angle.
    pub sin: Fx,
}

impl RotationCache2D {
    /// Computes the cache for an angle.
    #[must_use]
    pub fn compute(angle: Angle16) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self { angle, cos, sin }
    }
}

impl Default for RotationCache2D {
    fn default() -> Self {
        Self::compute(Angle16::ZERO)
    }
}

impl Component for RotationCache2D {
    const NAME: &'static str = "RotationCache2D";
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::float_cmp)]

    use super::*;

    #[test]
    fn immovable_bodies_have_zero_inverse_mass() {
        let body = Body2D::immovable(Vec2Fx::ZERO);
        assert_eq!(body.inv_mass, Fx::ZERO);
        assert_eq!(body.inv_inertia, Fx::ZERO);
        assert!(!body.is_dynamic());
    }

    #[test]
    fn impulse_wakes_a_sleeping_body_past_threshold() {
        let mut body = Body2D::dynamic(Vec2Fx::ZERO, Fx::ONE);
        body.awake = false;
        let small = Vec2Fx::new(Fx::from_f32(0.005), Fx::ZERO);
        body.apply_impulse(small, Fx::from_f32(0.01));
        assert!(!body.awake, "sub-threshold impulse must not wake");

        let big = Vec2Fx::new(Fx::from_f32(0.02), Fx::ZERO);
        body.apply_impulse(big, Fx::from_f32(0.01));
        assert!(body.awake);
        assert_eq!(body.velocity, big);
    }

    #[test]
    fn rotation_cache_tracks_its_angle() {
        let cache = RotationCache2D::compute(Angle16::QUARTER);
        assert_eq!(cache.cos, Fx::ZERO);
        assert_eq!(cache.sin, Fx::ONE);
        assert_eq!(cache.angle, Angle16::QUARTER);
    }
}
