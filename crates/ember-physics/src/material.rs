// SPDX-License-Identifier: Apache-2.0
//! Contact materials and the mixing table.
//!
//! Material resolution per contact side: the entity's [`Material2D`]
//! component, else the world-default [`DefaultMaterial2D`] resource, else a
//! material derived from the body's own restitution/friction fields (the
//! built-in default when there is no body either). The [`MaterialTable2D`]
//! resource maps unordered material id pairs to a mixing rule; absent an
//! entry, friction mixes by geometric mean and restitution and bounce
//! threshold by max.

use ember_core::Component;
use ember_math::Fx;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Surface material parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material2D {
    /// Material identity for table lookups.
    pub id: u32,
    /// Static friction coefficient.
    pub mu_s: Fx,
    /// Dynamic friction coefficient.
    pub mu_d: Fx,
    /// Restitution in `[0, 1]`.
    pub restitution: Fx,
    /// Relative normal speed below which restitution is suppressed.
    pub bounce_threshold: Fx,
}

impl Material2D {
    /// The built-in default: moderate friction, no bounce.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            id: 0,
            mu_s: Fx::from_raw(39_322), // 0.6
            mu_d: Fx::HALF,
            restitution: Fx::ZERO,
            bounce_threshold: Fx::from_raw(65_536 / 2), // 0.5 units/s
        }
    }
}

impl Default for Material2D {
    fn default() -> Self {
        Self::standard()
    }
}

impl Component for Material2D {
    const NAME: &'static str = "Material2D";
}

/// World-default material resource, consulted when an entity carries no
/// [`Material2D`] component.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DefaultMaterial2D(pub Material2D);

/// How two scalar material properties combine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MixMode {
    /// Smaller of the two.
    Min,
    /// Larger of the two.
    Max,
    /// Arithmetic mean.
    Average,
    /// Geometric mean (`sqrt(a * b)`).
    #[default]
    GeometricMean,
}

impl MixMode {
    /// Combines two values under this mode.
    #[must_use]
    pub fn mix(self, a: Fx, b: Fx) -> Fx {
        match self {
            Self::Min => a.min(b),
            Self::Max => a.max(b),
            Self::Average => (a + b) * Fx::HALF,
            Self::GeometricMean => (a * b).sqrt(),
        }
    }
}

/// Mixing rule for one material pair.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct MixRule {
    /// Rule for `mu_s` and `mu_d`.
    pub friction: MixMode,
    /// Rule for restitution.
    pub restitution: MixMode,
    /// Rule for the bounce threshold.
    pub bounce_threshold: MixMode,
}

impl Default for MixRule {
    fn default() -> Self {
        Self {
            friction: MixMode::GeometricMean,
            restitution: MixMode::Max,
            bounce_threshold: MixMode::Max,
        }
    }
}

/// Symmetric material-pair rule table, stored as a world resource.
#[derive(Debug, Default)]
pub struct MaterialTable2D {
    rules: FxHashMap<(u32, u32), MixRule>,
}

impl MaterialTable2D {
    /// Creates an empty table (every pair uses the default rule).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the rule for an unordered id pair; `(a, b)` defines `(b, a)`.
    pub fn set_rule(&mut self, a: u32, b: u32, rule: MixRule) {
        self.rules.insert(Self::key(a, b), rule);
    }

    /// Rule for an unordered pair, falling back to the default.
    #[must_use]
    pub fn rule(&self, a: u32, b: u32) -> MixRule {
        self.rules
            .get(&Self::key(a, b))
            .copied()
            .unwrap_or_default()
    }

    fn key(a: u32, b: u32) -> (u32, u32) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }
}

/// Composed contact material values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComposedMaterial {
    /// Mixed static friction.
    pub mu_s: Fx,
    /// Mixed dynamic friction.
    pub mu_d: Fx,
    /// Mixed restitution (before the bounce-threshold gate).
    pub restitution: Fx,
    /// Mixed bounce threshold.
    pub bounce_threshold: Fx,
}

/// Composes two materials under the table's rule for their id pair.
#[must_use]
pub fn compose(table: &MaterialTable2D, a: &Material2D, b: &Material2D) -> ComposedMaterial {
    let rule = table.rule(a.id, b.id);
    ComposedMaterial {
        mu_s: rule.friction.mix(a.mu_s, b.mu_s),
        mu_d: rule.friction.mix(a.mu_d, b.mu_d),
        restitution: rule.restitution.mix(a.restitution, b.restitution),
        bounce_threshold: rule.bounce_threshold.mix(a.bounce_threshold, b.bounce_threshold),
    }
}
