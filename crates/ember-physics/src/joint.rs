// SPDX-License-Identifier: Apache-2.0
//! Joint components and per-frame solver batches.
//!
//! Joints are entities carrying one of the joint components below; the
//! referenced bodies are entity handles (id + generation) validated on use,
//! never owning references. Accumulated impulses live on the components and
//! persist across frames for warm-starting; a joint whose accumulated
//! impulse magnitude exceeds its break threshold sets `broken` and is
//! skipped from then on.
//!
//! Each frame the build pass validates handles, applies sleep coupling
//! (an awake body wakes its sleeping joint partner; joints with both ends
//! asleep are skipped), and precomputes effective masses and biases into
//! batch resources the iterative solver consumes.

use ember_core::{Component, Entity};
use ember_math::{Fx, Vec2Fx};
use serde::{Deserialize, Serialize};

/// Keeps two anchor points at a fixed distance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistanceJoint2D {
    /// First body.
    pub body_a: Entity,
    /// Second body.
    pub body_b: Entity,
    /// Anchor in A's local space.
    pub local_anchor_a: Vec2Fx,
    /// Anchor in B's local space.
    pub local_anchor_b: Vec2Fx,
    /// Rest length.
    pub rest_length: Fx,
    /// Baumgarte positional-correction coefficient.
    pub beta: Fx,
    /// Constraint softness added to the effective-mass denominator.
    pub gamma: Fx,
    /// Accumulated impulse (warm start).
    pub impulse: Fx,
    /// Break threshold; zero disables breaking.
    pub break_impulse: Fx,
    /// Set once the accumulated impulse exceeded the threshold.
    pub broken: bool,
}

impl DistanceJoint2D {
    /// Joint between body origins with rest length taken from `rest`.
    #[must_use]
    pub fn between(body_a: Entity, body_b: Entity, rest: Fx) -> Self {
        Self {
            body_a,
            body_b,
            local_anchor_a: Vec2Fx::ZERO,
            local_anchor_b: Vec2Fx::ZERO,
            rest_length: rest,
            beta: Fx::from_raw(13_107), // 0.2
            gamma: Fx::ZERO,
            impulse: Fx::ZERO,
            break_impulse: Fx::ZERO,
            broken: false,
        }
    }
}

impl Component for DistanceJoint2D {
    const NAME: &'static str = "DistanceJoint2D";
}

/// Pins two anchor points together, leaving relative rotation free.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevoluteJoint2D {
    /// First body.
    pub body_a: Entity,
    /// Second body.
    pub body_b: Entity,
    /// Anchor in A's local space.
    pub local_anchor_a: Vec2Fx,
    /// Anchor in B's local space.
    pub local_anchor_b: Vec2Fx,
    /// Baumgarte positional-correction coefficient.
    pub beta: Fx,
    /// Constraint softness added to the effective-mass diagonal.
    pub gamma: Fx,
    /// Accumulated impulse (warm start).
    pub impulse: Vec2Fx,
    /// Break threshold; zero disables breaking.
    pub break_impulse: Fx,
    /// Set once the accumulated impulse exceeded the threshold.
    pub broken: bool,
}

impl RevoluteJoint2D {
    /// Pin joint at the world-space point `anchor`, given both body poses.
    #[must_use]
    pub fn at_world_point(
        body_a: Entity,
        body_b: Entity,
        anchor_local_a: Vec2Fx,
        anchor_local_b: Vec2Fx,
    ) -> Self {
        Self {
            body_a,
            body_b,
            local_anchor_a: anchor_local_a,
            local_anchor_b: anchor_local_b,
            beta: Fx::from_raw(13_107),
            gamma: Fx::ZERO,
            impulse: Vec2Fx::ZERO,
            break_impulse: Fx::ZERO,
            broken: false,
        }
    }
}

impl Component for RevoluteJoint2D {
    const NAME: &'static str = "RevoluteJoint2D";
}

/// Constrains motion to a sliding axis with optional limits and a motor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrismaticJoint2D {
    /// First body.
    pub body_a: Entity,
    /// Second body.
    pub body_b: Entity,
    /// Anchor in A's local space.
    pub local_anchor_a: Vec2Fx,
    /// Anchor in B's local space.
    pub local_anchor_b: Vec2Fx,
    /// Sliding axis in A's local space (unit).
    pub local_axis: Vec2Fx,
    /// Baumgarte positional-correction coefficient.
    pub beta: Fx,
    /// Constraint softness added to the effective-mass denominators.
    pub gamma: Fx,
    /// Accumulated perpendicular impulse.
    pub impulse: Fx,
    /// Accumulated angular-lock impulse.
    pub angular_impulse: Fx,
    /// Accumulated motor impulse.
    pub motor_impulse: Fx,
    /// Accumulated limit impulse.
    pub limit_impulse: Fx,
    /// Whether the translation limit range is enforced.
    pub enable_limit: bool,
    /// Lower translation limit along the axis.
    pub lower: Fx,
    /// Upper translation limit along the axis.
    pub upper: Fx,
    /// Whether the motor drives along the axis.
    pub enable_motor: bool,
    /// Motor target speed, units per second.
    pub motor_speed: Fx,
    /// Per-step clamp on the accumulated motor impulse.
    pub max_motor_impulse: Fx,
    /// Break threshold; zero disables breaking.
    pub break_impulse: Fx,
    /// Set once the accumulated impulse exceeded the threshold.
    pub broken: bool,
}

impl PrismaticJoint2D {
    /// Slider between body origins along `axis` (A-local, unit).
    #[must_use]
    pub fn along(body_a: Entity, body_b: Entity, axis: Vec2Fx) -> Self {
        Self {
            body_a,
            body_b,
            local_anchor_a: Vec2Fx::ZERO,
            local_anchor_b: Vec2Fx::ZERO,
            local_axis: axis,
            beta: Fx::from_raw(13_107),
            gamma: Fx::ZERO,
            impulse: Fx::ZERO,
            angular_impulse: Fx::ZERO,
            motor_impulse: Fx::ZERO,
            limit_impulse: Fx::ZERO,
            enable_limit: false,
            lower: Fx::ZERO,
            upper: Fx::ZERO,
            enable_motor: false,
            motor_speed: Fx::ZERO,
            max_motor_impulse: Fx::ZERO,
            break_impulse: Fx::ZERO,
            broken: false,
        }
    }
}

impl Component for PrismaticJoint2D {
    const NAME: &'static str = "PrismaticJoint2D";
}

// ----------------------------------------------------------------------
// Per-frame solver rows
// ----------------------------------------------------------------------

/// Precomputed distance-joint row.
#[derive(Clone, Copy, Debug)]
pub struct DistanceRow {
    /// Joint entity (commit target).
    pub joint: Entity,
    /// Body indices into the solver body table.
    pub a: usize,
    /// Second body index.
    pub b: usize,
    /// World anchor offset from A's center.
    pub ra: Vec2Fx,
    /// World anchor offset from B's center.
    pub rb: Vec2Fx,
    /// Unit axis from anchor A to anchor B.
    pub axis: Vec2Fx,
    /// Effective mass along the axis.
    pub mass: Fx,
    /// Velocity bias (Baumgarte).
    pub bias: Fx,
    /// Accumulated impulse.
    pub impulse: Fx,
    /// Break threshold.
    pub break_impulse: Fx,
    /// Whether the joint broke during this solve.
    pub broke: bool,
}

/// Precomputed revolute-joint row with a 2x2 inverse effective mass.
#[derive(Clone, Copy, Debug)]
pub struct RevoluteRow {
    /// Joint entity (commit target).
    pub joint: Entity,
    /// Body indices into the solver body table.
    pub a: usize,
    /// Second body index.
    pub b: usize,
    /// World anchor offset from A's center.
    pub ra: Vec2Fx,
    /// World anchor offset from B's center.
    pub rb: Vec2Fx,
    /// Inverse effective mass, row-major `[[m00, m01], [m10, m11]]`.
    pub inv_mass: [[Fx; 2]; 2],
    /// Velocity bias (Baumgarte), per component.
    pub bias: Vec2Fx,
    /// Accumulated impulse.
    pub impulse: Vec2Fx,
    /// Break threshold.
    pub break_impulse: Fx,
    /// Whether the joint broke during this solve.
    pub broke: bool,
}

/// Precomputed prismatic-joint row.
#[derive(Clone, Copy, Debug)]
pub struct PrismaticRow {
    /// Joint entity (commit target).
    pub joint: Entity,
    /// Body indices into the solver body table.
    pub a: usize,
    /// Second body index.
    pub b: usize,
    /// World anchor offset from A's center.
    pub ra: Vec2Fx,
    /// World anchor offset from B's center.
    pub rb: Vec2Fx,
    /// World sliding axis (unit).
    pub axis: Vec2Fx,
    /// World perpendicular to the axis (unit).
    pub perp: Vec2Fx,
    /// Effective mass for the perpendicular constraint.
    pub mass_perp: Fx,
    /// Effective mass for the angular lock.
    pub mass_angular: Fx,
    /// Effective mass along the axis (motor/limit).
    pub mass_axial: Fx,
    /// Angular lever of A for the perpendicular constraint.
    pub s1: Fx,
    /// Angular lever of B for the perpendicular constraint.
    pub s2: Fx,
    /// Angular lever of A along the axis.
    pub a1: Fx,
    /// Angular lever of B along the axis.
    pub a2: Fx,
    /// Perpendicular-position bias.
    pub bias_perp: Fx,
    /// Current translation along the axis.
    pub translation: Fx,
    /// Accumulated perpendicular impulse.
    pub impulse: Fx,
    /// Accumulated angular impulse.
    pub angular_impulse: Fx,
    /// Accumulated motor impulse.
    pub motor_impulse: Fx,
    /// Accumulated limit impulse.
    pub limit_impulse: Fx,
    /// Limit enabled flag.
    pub enable_limit: bool,
    /// Lower translation limit.
    pub lower: Fx,
    /// Upper translation limit.
    pub upper: Fx,
    /// Motor enabled flag.
    pub enable_motor: bool,
    /// Motor target speed.
    pub motor_speed: Fx,
    /// Motor impulse clamp.
    pub max_motor_impulse: Fx,
    /// Break threshold.
    pub break_impulse: Fx,
    /// Whether the joint broke during this solve.
    pub broke: bool,
}

/// Distance rows for this frame.
#[derive(Debug, Default)]
pub struct DistanceBatch {
    /// Rows in joint query order.
    pub rows: Vec<DistanceRow>,
}

/// Revolute rows for this frame.
#[derive(Debug, Default)]
pub struct RevoluteBatch {
    /// Rows in joint query order.
    pub rows: Vec<RevoluteRow>,
}

/// Prismatic rows for this frame.
#[derive(Debug, Default)]
pub struct PrismaticBatch {
    /// Rows in joint query order.
    pub rows: Vec<PrismaticRow>,
}
