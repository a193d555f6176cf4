// SPDX-License-Identifier: Apache-2.0
//! Collision shapes and their world-space caches.
//!
//! A [`Shape2D`] is authored in body-local space. Narrowphase never touches
//! local shapes directly: a sync pass rotates and translates them into the
//! world-space caches ([`CircleWorld2D`], [`HullWorld2D`]) whose `epoch` is
//! compared against the world frame to detect staleness after integration.

use ember_core::Component;
use ember_math::{Fx, Vec2Fx};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum vertex count for a convex hull shape.
pub const MAX_HULL_VERTICES: usize = 8;

/// Shape construction errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShapeError {
    /// More vertices than [`MAX_HULL_VERTICES`].
    #[error("hull has {0} vertices, maximum is {MAX_HULL_VERTICES}")]
    TooManyVertices(usize),
    /// Fewer than three vertices.
    #[error("hull needs at least 3 vertices, got {0}")]
    TooFewVertices(usize),
}

/// Collision shape in body-local space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shape2D {
    /// Circle with a local-space center offset.
    Circle {
        /// Center offset from the body origin.
        offset: Vec2Fx,
        /// Radius.
        radius: Fx,
        /// Collision skin added around the radius.
        skin: Fx,
    },
    /// Convex polygon, counter-clockwise winding, at most
    /// [`MAX_HULL_VERTICES`] vertices.
    ConvexHull {
        /// Number of used vertices.
        count: u8,
        /// Local-space vertices; entries past `count` are zero.
        vertices: [Vec2Fx; MAX_HULL_VERTICES],
        /// Collision skin added around the hull.
        skin: Fx,
    },
}

impl Shape2D {
    /// Circle centered on the body origin.
    #[must_use]
    pub fn circle(radius: Fx) -> Self {
        Self::Circle {
            offset: Vec2Fx::ZERO,
            radius,
            skin: Fx::ZERO,
        }
    }

    /// Convex hull from counter-clockwise vertices.
    pub fn hull(points: &[Vec2Fx]) -> Result<Self, ShapeError> {
        if points.len() > MAX_HULL_VERTICES {
            return Err(ShapeError::TooManyVertices(points.len()));
        }
        if points.len() < 3 {
            return Err(ShapeError::TooFewVertices(points.len()));
        }
        let mut vertices = [Vec2Fx::ZERO; MAX_HULL_VERTICES];
        vertices[..points.len()].copy_from_slice(points);
        #[allow(clippy::cast_possible_truncation)]
        let count = points.len() as u8;
        Ok(Self::ConvexHull {
            count,
            vertices,
            skin: Fx::ZERO,
        })
    }

    /// Axis-aligned box as a hull, centered at the local origin.
    pub fn rect(half_width: Fx, half_height: Fx) -> Result<Self, ShapeError> {
        Self::hull(&[
            Vec2Fx::new(-half_width, -half_height),
            Vec2Fx::new(half_width, -half_height),
            Vec2Fx::new(half_width, half_height),
            Vec2Fx::new(-half_width, half_height),
        ])
    }

    /// Returns a copy with the given collision skin.
    #[must_use]
    pub fn with_skin(mut self, new_skin: Fx) -> Self {
        match &mut self {
            Self::Circle { skin, .. } | Self::ConvexHull { skin, .. } => *skin = new_skin,
        }
        self
    }

    /// Returns a copy with the given local offset (circles only; hulls bake
    /// offsets into their vertices).
    #[must_use]
    pub fn with_offset(mut self, new_offset: Vec2Fx) -> Self {
        if let Self::Circle { offset, .. } = &mut self {
            *offset = new_offset;
        }
        self
    }

    /// The shape's collision skin.
    #[must_use]
    pub fn skin(&self) -> Fx {
        match self {
            Self::Circle { skin, .. } | Self::ConvexHull { skin, .. } => *skin,
        }
    }
}

impl Component for Shape2D {
    const NAME: &'static str = "Shape2D";
}

/// World-space circle cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircleWorld2D {
    /// World-space center.
    pub center: Vec2Fx,
    /// Radius including skin.
    pub radius: Fx,
    /// World frame this cache was computed for.
    pub epoch: u64,
}

impl CircleWorld2D {
    /// Rotates and translates a local circle into world space.
    #[must_use]
    pub fn compute(
        offset: Vec2Fx,
        radius: Fx,
        skin: Fx,
        position: Vec2Fx,
        cos: Fx,
        sin: Fx,
        epoch: u64,
    ) -> Self {
        Self {
            center: position + offset.rotate(cos, sin),
            radius: radius + skin,
            epoch,
        }
    }

    /// Conservative bounds for the broadphase.
    #[must_use]
    pub fn aabb(&self) -> crate::aabb::Aabb2 {
        crate::aabb::Aabb2::from_center_half_extents(self.center, self.radius, self.radius)
    }
}

impl Component for CircleWorld2D {
    const NAME: &'static str = "CircleWorld2D";
}

/// World-space hull cache: rotated vertices plus outward face normals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HullWorld2D {
    /// Number of used vertices.
    pub count: u8,
    /// World-space vertices, counter-clockwise.
    pub vertices: [Vec2Fx; MAX_HULL_VERTICES],
    /// Outward unit normal of edge `i -> i+1`.
    pub normals: [Vec2Fx; MAX_HULL_VERTICES],
    /// Collision skin.
    pub skin: Fx,
    /// World frame this cache was computed for.
    pub epoch: u64,
}

impl HullWorld2D {
    /// Rotates and translates local hull vertices into world space and
    /// recomputes edge normals.
    #[must_use]
    pub fn compute(
        count: u8,
        local: &[Vec2Fx; MAX_HULL_VERTICES],
        skin: Fx,
        position: Vec2Fx,
        cos: Fx,
        sin: Fx,
        epoch: u64,
    ) -> Self {
        let n = usize::from(count);
        let mut vertices = [Vec2Fx::ZERO; MAX_HULL_VERTICES];
        for i in 0..n {
            vertices[i] = position + local[i].rotate(cos, sin);
        }
        let mut normals = [Vec2Fx::ZERO; MAX_HULL_VERTICES];
        for i in 0..n {
            let edge = vertices[(i + 1) % n] - vertices[i];
            // CCW winding: outward normal is the clockwise perpendicular.
            normals[i] = Vec2Fx::new(edge.y, -edge.x).normalized();
        }
        Self {
            count,
            vertices,
            normals,
            skin,
            epoch,
        }
    }

    /// Used vertices as a slice.
    #[must_use]
    pub fn verts(&self) -> &[Vec2Fx] {
        &self.vertices[..usize::from(self.count)]
    }

    /// Conservative bounds for the broadphase (skin included).
    #[must_use]
    pub fn aabb(&self) -> Option<crate::aabb::Aabb2> {
        crate::aabb::Aabb2::from_points(self.verts()).map(|bb| bb.inflate(self.skin))
    }
}

impl Component for HullWorld2D {
    const NAME: &'static str = "HullWorld2D";
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::float_cmp)]

    use super::*;
    use ember_math::Angle16;

    fn fx(v: f32) -> Fx {
        Fx::from_f32(v)
    }

    #[test]
    fn hull_vertex_limits_are_enforced() {
        let too_few = Shape2D::hull(&[Vec2Fx::ZERO, Vec2Fx::ZERO]);
        assert_eq!(too_few, Err(ShapeError::TooFewVertices(2)));
        let many = vec![Vec2Fx::ZERO; 9];
        assert_eq!(Shape2D::hull(&many), Err(ShapeError::TooManyVertices(9)));
    }

    #[test]
    fn world_hull_normals_point_outward() {
        let Ok(Shape2D::ConvexHull { count, vertices, skin }) = Shape2D::rect(fx(1.0), fx(1.0))
        else {
            panic!("rect should build a hull");
        };
        let world = HullWorld2D::compute(
            count,
            &vertices,
            skin,
            Vec2Fx::ZERO,
            Fx::ONE,
            Fx::ZERO,
            0,
        );
        // Bottom edge normal points down.
        assert!(world.normals[0].y < Fx::ZERO);
        // Right edge normal points right.
        assert!(world.normals[1].x > Fx::ZERO);
    }

    #[test]
    fn rotated_circle_offset_follows_the_body() {
        let (sin, cos) = Angle16::QUARTER.sin_cos();
        let world = CircleWorld2D::compute(
            Vec2Fx::new(fx(1.0), fx(0.0)),
            fx(0.5),
            fx(0.1),
            Vec2Fx::new(fx(10.0), fx(0.0)),
            cos,
            sin,
            7,
        );
        // Quarter turn moves the +x offset to +y.
        assert!((world.center.x - fx(10.0)).abs() <= Fx::from_raw(8));
        assert!((world.center.y - fx(1.0)).abs() <= Fx::from_raw(8));
        assert_eq!(world.radius, fx(0.6));
        assert_eq!(world.epoch, 7);
    }
}
