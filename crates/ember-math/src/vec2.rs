// SPDX-License-Identifier: Apache-2.0
//! 2D fixed-point vector.

use core::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use crate::fx::Fx;

/// 2D vector with 16.16 fixed-point components.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vec2Fx {
    /// Horizontal component.
    pub x: Fx,
    /// Vertical component.
    pub y: Fx,
}

impl Vec2Fx {
    /// The zero vector.
    pub const ZERO: Self = Self {
        x: Fx::ZERO,
        y: Fx::ZERO,
    };

    /// Constructs a vector from components.
    #[must_use]
    pub const fn new(x: Fx, y: Fx) -> Self {
        Self { x, y }
    }

    /// Constructs from integer components.
    #[must_use]
    pub const fn from_ints(x: i32, y: i32) -> Self {
        Self {
            x: Fx::from_int(x),
            y: Fx::from_int(y),
        }
    }

    /// Dot product.
    #[must_use]
    pub fn dot(self, other: Self) -> Fx {
        self.x * other.x + self.y * other.y
    }

    /// Scalar (z) component of the 2D cross product `self × other`.
    #[must_use]
    pub fn cross(self, other: Self) -> Fx {
        self.x * other.y - self.y * other.x
    }

    /// Cross product of a scalar angular velocity with this vector, `w × r`.
    ///
    /// In 2D this is the perpendicular of `r` scaled by `w`:
    /// `(-w·ry, w·rx)`.
    #[must_use]
    pub fn cross_scalar(w: Fx, r: Self) -> Self {
        Self {
            x: -(w * r.y),
            y: w * r.x,
        }
    }

    /// Squared length.
    #[must_use]
    pub fn length_sq(self) -> Fx {
        self.dot(self)
    }

    /// Length via the fixed-point square root.
    #[must_use]
    pub fn length(self) -> Fx {
        self.length_sq().sqrt()
    }

    /// Unit vector in the same direction, or zero when the length is zero.
    #[must_use]
    pub fn normalized(self) -> Self {
        let len = self.length();
        if len == Fx::ZERO {
            Self::ZERO
        } else {
            Self {
                x: self.x / len,
                y: self.y / len,
            }
        }
    }

    /// Counter-clockwise perpendicular `(-y, x)`.
    #[must_use]
    pub fn perp(self) -> Self {
        Self {
            x: -self.y,
            y: self.x,
        }
    }

    /// Component-wise scale by a scalar.
    #[must_use]
    pub fn scale(self, s: Fx) -> Self {
        Self {
            x: self.x * s,
            y: self.y * s,
        }
    }

    /// Rotates by a precomputed `(cos, sin)` pair.
    #[must_use]
    pub fn rotate(self, cos: Fx, sin: Fx) -> Self {
        Self {
            x: self.x * cos - self.y * sin,
            y: self.x * sin + self.y * cos,
        }
    }
}

impl Add for Vec2Fx {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl AddAssign for Vec2Fx {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Vec2Fx {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl SubAssign for Vec2Fx {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Neg for Vec2Fx {
    type Output = Self;
    fn neg(self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
        }
    }
}

impl Mul<Fx> for Vec2Fx {
    type Output = Self;
    fn mul(self, rhs: Fx) -> Self {
        self.scale(rhs)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::float_cmp)]

    use super::*;

    fn v(x: f32, y: f32) -> Vec2Fx {
        Vec2Fx::new(Fx::from_f32(x), Fx::from_f32(y))
    }

    #[test]
    fn dot_and_cross() {
        let a = v(1.0, 2.0);
        let b = v(3.0, 4.0);
        assert_eq!(a.dot(b), Fx::from_f32(11.0));
        assert_eq!(a.cross(b), Fx::from_f32(-2.0));
    }

    #[test]
    fn scalar_cross_is_perpendicular() {
        let r = v(2.0, 0.0);
        let out = Vec2Fx::cross_scalar(Fx::from_f32(1.5), r);
        assert_eq!(out, v(0.0, 3.0));
        assert_eq!(out.dot(r), Fx::ZERO);
    }

    #[test]
    fn normalize_unit_length() {
        let n = v(3.0, 4.0).normalized();
        let err = (n.length() - Fx::ONE).abs();
        assert!(err.raw() <= 2, "unit length off by {} lsb", err.raw());
        assert_eq!(Vec2Fx::ZERO.normalized(), Vec2Fx::ZERO);
    }

    #[test]
    fn rotate_quarter_turn() {
        let p = v(1.0, 0.0).rotate(Fx::ZERO, Fx::ONE);
        assert_eq!(p, v(0.0, 1.0));
    }
}
