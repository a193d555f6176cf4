// SPDX-License-Identifier: Apache-2.0
//! Physics resources: frame-scoped collections and tunables.
//!
//! All of these are world resources introduced by the startup system. The
//! TOI mini-solve swaps [`Contacts2D`] and [`SolverTimeScale`] with
//! temporaries and restores the originals exactly afterwards, which is why
//! both are plain values rather than anything self-referential.

use ember_core::Entity;
use ember_geom::{Contact, SweepAndPrune};
use ember_math::{Fx, Vec2Fx};
use rustc_hash::FxHashMap;

/// Contacts generated for the current frame, in narrowphase order.
#[derive(Debug, Default)]
pub struct Contacts2D {
    /// Contact list; solver iteration order.
    pub contacts: Vec<Contact>,
}

/// Warm-start cache: accumulated impulses from last frame's solve, keyed by
/// (canonical pair, feature id). A feature change drops the entry.
#[derive(Debug, Default)]
pub struct ContactCache {
    /// `(min_bits, max_bits, feature) -> (jn, jt)`.
    pub impulses: FxHashMap<(u64, u64, u32), (Fx, Fx)>,
}

/// Scale applied to `dt` during solving and integration. Default one; the
/// TOI mini-solve substitutes the remaining sub-step fraction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SolverTimeScale(pub Fx);

impl Default for SolverTimeScale {
    fn default() -> Self {
        Self(Fx::ONE)
    }
}

/// Broadphase persistent state.
#[derive(Default)]
pub struct Broadphase2D {
    /// Sweep-and-prune proxies keyed by entity bits.
    pub sap: SweepAndPrune,
}

/// Candidate pairs from the broadphase, canonical order.
#[derive(Debug, Default)]
pub struct BroadphasePairs {
    /// `(a_bits, b_bits)` with `a < b`, sorted ascending.
    pub pairs: Vec<(u64, u64)>,
}

/// Time-of-impact event produced by CCD.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ToiEvent {
    /// First entity.
    pub a: Entity,
    /// Second entity.
    pub b: Entity,
    /// Impact time in `(0, 1]` as a fraction of the step.
    pub t: Fx,
    /// World-space contact normal at impact, from `a` to `b`.
    pub normal: Vec2Fx,
    /// World-space contact point at impact.
    pub point: Vec2Fx,
}

/// Queue of TOI events for the current frame.
#[derive(Debug, Default)]
pub struct ToiQueue {
    /// Events; sorted and deduplicated before the mini-solve.
    pub events: Vec<ToiEvent>,
}

/// Sleep management tunables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SleepConfig {
    /// Linear speed below which a body is a sleep candidate.
    pub linear_threshold: Fx,
    /// Angular speed below which a body is a sleep candidate.
    pub angular_threshold: Fx,
    /// Seconds below both thresholds before falling asleep.
    pub time_to_sleep: Fx,
    /// Impulse magnitude that wakes a sleeping body.
    pub impulse_wake: Fx,
    /// Multiplier on the thresholds for wake-by-velocity.
    pub wake_bias: Fx,
}

impl Default for SleepConfig {
    fn default() -> Self {
        Self {
            linear_threshold: Fx::from_raw(3277),  // 0.05 units/s
            angular_threshold: Fx::from_raw(3277), // 0.05 rad/s
            time_to_sleep: Fx::HALF,
            impulse_wake: Fx::from_raw(655), // 0.01
            wake_bias: Fx::from_int(2),
        }
    }
}

/// Solver and CCD tunables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhysicsConfig {
    /// Gauss-Seidel iteration count.
    pub iterations: u32,
    /// Baumgarte positional-correction coefficient.
    pub baumgarte: Fx,
    /// Penetration slop ignored by the positional bias.
    pub slop: Fx,
    /// Linear speed (units/s) above which a body is CCD-eligible.
    pub ccd_velocity_threshold: Fx,
    /// Sleep tunables.
    pub sleep: SleepConfig,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            iterations: 8,
            baumgarte: Fx::from_raw(13_107), // 0.2
            slop: Fx::from_raw(328),         // 0.005
            ccd_velocity_threshold: Fx::from_int(50),
            sleep: SleepConfig::default(),
        }
    }
}
