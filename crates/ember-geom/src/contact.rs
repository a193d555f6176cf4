// SPDX-License-Identifier: Apache-2.0
//! Contact points produced by the narrowphase.

use ember_math::{Fx, Vec2Fx};
use serde::{Deserialize, Serialize};

/// One contact point between two proxies.
///
/// `normal` is unit length and points from proxy `a` toward proxy `b`.
/// `penetration` is positive when the shapes overlap. `jn`/`jt` accumulate
/// solver impulses and persist across frames keyed by (pair, `feature`): a
/// feature-id change resets them, which is what makes warm-starting safe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// First proxy id (opaque entity bits).
    pub a: u64,
    /// Second proxy id.
    pub b: u64,
    /// Unit contact normal, from `a` to `b`.
    pub normal: Vec2Fx,
    /// World-space contact point.
    pub point: Vec2Fx,
    /// Overlap depth, positive when penetrating.
    pub penetration: Fx,
    /// Accumulated normal impulse (warm-start cache).
    pub jn: Fx,
    /// Accumulated tangent impulse (warm-start cache).
    pub jt: Fx,
    /// Geometric feature tag for warm-start coherence.
    pub feature: u32,
    /// Contact created ahead of actual overlap (CCD path).
    pub speculative: bool,
    /// Effective restitution after material composition.
    pub eff_rest: Fx,
    /// Static friction coefficient after material composition.
    pub mu_s: Fx,
    /// Dynamic friction coefficient after material composition.
    pub mu_d: Fx,
}

impl Contact {
    /// Creates a contact with zeroed impulses and materials.
    #[must_use]
    pub fn new(
        a: u64,
        b: u64,
        normal: Vec2Fx,
        point: Vec2Fx,
        penetration: Fx,
        feature: u32,
    ) -> Self {
        Self {
            a,
            b,
            normal,
            point,
            penetration,
            jn: Fx::ZERO,
            jt: Fx::ZERO,
            feature,
            speculative: false,
            eff_rest: Fx::ZERO,
            mu_s: Fx::ZERO,
            mu_d: Fx::ZERO,
        }
    }

    /// Canonical unordered pair key for this contact.
    #[must_use]
    pub fn pair(&self) -> (u64, u64) {
        if self.a <= self.b {
            (self.a, self.b)
        } else {
            (self.b, self.a)
        }
    }
}
