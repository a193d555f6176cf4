// SPDX-License-Identifier: Apache-2.0
//! Axis-aligned bounding boxes in fixed point.

use ember_core::Component;
use ember_math::{Fx, Vec2Fx};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in world coordinates, 16.16 fixed point.
///
/// Invariant: `min` components are less than or equal to `max` components.
/// Overlap is inclusive on faces so touching boxes pair in the broadphase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aabb2 {
    min: Vec2Fx,
    max: Vec2Fx,
}

impl Aabb2 {
    /// Constructs an AABB from its corners.
    ///
    /// Debug builds assert `min <= max` component-wise.
    #[must_use]
    pub fn new(min: Vec2Fx, max: Vec2Fx) -> Self {
        debug_assert!(
            min.x <= max.x && min.y <= max.y,
            "invalid AABB: min > max"
        );
        Self { min, max }
    }

    /// Builds an AABB centered at `center` with half-extents `hx, hy`.
    #[must_use]
    pub fn from_center_half_extents(center: Vec2Fx, hx: Fx, hy: Fx) -> Self {
        let he = Vec2Fx::new(hx, hy);
        Self::new(center - he, center + he)
    }

    /// Minimum corner.
    #[must_use]
    pub fn min(&self) -> Vec2Fx {
        self.min
    }

    /// Maximum corner.
    #[must_use]
    pub fn max(&self) -> Vec2Fx {
        self.max
    }

    /// Returns `true` when this box overlaps `other` (inclusive on faces).
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        !(self.max.x < other.min.x
            || self.min.x > other.max.x
            || self.max.y < other.min.y
            || self.min.y > other.max.y)
    }

    /// Returns `true` when `point` lies inside or on the boundary.
    #[must_use]
    pub fn contains(&self, point: Vec2Fx) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    /// Union of two boxes.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: Vec2Fx::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Vec2Fx::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    /// Inflates by a uniform margin `m` in all directions.
    #[must_use]
    pub fn inflate(&self, m: Fx) -> Self {
        let delta = Vec2Fx::new(m, m);
        Self {
            min: self.min - delta,
            max: self.max + delta,
        }
    }

    /// The minimal box containing all `points`. `None` when empty.
    #[must_use]
    pub fn from_points(points: &[Vec2Fx]) -> Option<Self> {
        let (&first, rest) = points.split_first()?;
        let mut min = first;
        let mut max = first;
        for p in rest {
            min = Vec2Fx::new(min.x.min(p.x), min.y.min(p.y));
            max = Vec2Fx::new(max.x.max(p.x), max.y.max(p.y));
        }
        Some(Self { min, max })
    }
}

impl Component for Aabb2 {
    const NAME: &'static str = "AABB2D";
}
