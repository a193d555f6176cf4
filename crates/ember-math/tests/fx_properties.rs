// SPDX-License-Identifier: Apache-2.0
#![allow(missing_docs, clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Algebraic properties of the fixed-point kernel, checked exhaustively
//! enough to trust the solver's arithmetic.

use ember_math::{Angle16, Fx};
use proptest::prelude::*;

proptest! {
    /// Addition is commutative and associative modulo 2^32 over the whole
    /// raw range.
    #[test]
    fn add_is_commutative_and_associative(a in any::<i32>(), b in any::<i32>(), c in any::<i32>()) {
        let (a, b, c) = (Fx::from_raw(a), Fx::from_raw(b), Fx::from_raw(c));
        prop_assert_eq!(a + b, b + a);
        prop_assert_eq!((a + b) + c, a + (b + c));
    }

    /// Multiplication distributes over addition to within one lsb: each
    /// product truncates independently, so the split side may round down
    /// once more than the combined side.
    #[test]
    fn mul_distributes_within_one_lsb(
        a in -(1_i32 << 24)..(1_i32 << 24),
        b in -(1_i32 << 24)..(1_i32 << 24),
        c in -(1_i32 << 24)..(1_i32 << 24),
    ) {
        let (a, b, c) = (Fx::from_raw(a), Fx::from_raw(b), Fx::from_raw(c));
        let combined = a * (b + c);
        let split = a * b + a * c;
        let diff = (combined - split).abs();
        prop_assert!(diff.raw() <= 1, "diff {} lsb", diff.raw());
    }

    /// Negation and subtraction agree.
    #[test]
    fn sub_is_add_of_negation(a in any::<i32>(), b in any::<i32>()) {
        let (a, b) = (Fx::from_raw(a), Fx::from_raw(b));
        prop_assert_eq!(a - b, a + (-b));
    }

    /// `sqrt(x)^2` tracks `x`: within 2 lsb for small values and within the
    /// quantization bound `2 * sqrt_raw >> 16` lsb in general (the square of
    /// a half-lsb error in the root grows with the root itself).
    #[test]
    fn sqrt_square_tracks_input(raw in 0_i32..i32::MAX) {
        let x = Fx::from_raw(raw);
        let root = x.sqrt();
        let squared = root * root;
        let error = i64::from((squared - x).raw().abs());
        let quantization = (2 * i64::from(root.raw())) >> 16;
        prop_assert!(
            error <= quantization + 2,
            "x raw {raw}: error {error} lsb, bound {quantization}"
        );
    }

    /// Division by zero behaves as division by one lsb, never trapping.
    #[test]
    fn division_by_zero_never_traps(a in any::<i32>()) {
        let a = Fx::from_raw(a);
        let _ = a / Fx::ZERO;
        let _ = a % Fx::ZERO;
    }

    /// lerp stays within the segment for t in [0, 1].
    #[test]
    fn lerp_is_bounded(a in -(1_i32 << 28)..(1_i32 << 28), b in -(1_i32 << 28)..(1_i32 << 28), t in 0_i32..=65536) {
        let (a, b) = (Fx::from_raw(a), Fx::from_raw(b));
        let out = a.lerp(b, Fx::from_raw(t));
        let (lo, hi) = (a.min(b), a.max(b));
        prop_assert!(out >= lo - Fx::EPSILON && out <= hi + Fx::EPSILON, "lerp left the segment");
    }

    /// Sine stays in [-1, 1] and cosine matches the quarter-turn shift.
    #[test]
    fn trig_range_and_phase(raw in any::<u16>()) {
        let angle = Angle16::from_raw(raw);
        let (sin, cos) = angle.sin_cos();
        prop_assert!(sin >= Fx::NEG_ONE && sin <= Fx::ONE);
        prop_assert!(cos >= Fx::NEG_ONE && cos <= Fx::ONE);
        prop_assert_eq!(cos, angle.wrapping_add(1 << 14).sin());
    }
}

#[test]
fn clamp_and_rounding_edges() {
    assert_eq!(Fx::from_int(-3).abs(), Fx::from_int(3));
    assert_eq!(Fx::MIN.abs(), Fx::MIN, "two's-complement truncation holds");
    assert_eq!(Fx::from_int(7).signum(), Fx::ONE);
    assert_eq!(Fx::ZERO.signum(), Fx::ZERO);
}
