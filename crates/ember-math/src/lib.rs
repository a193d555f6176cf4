// SPDX-License-Identifier: Apache-2.0
//! ember-math: deterministic numeric kernel for the Ember runtime.
//!
//! Every physics computation in Ember runs on the 16.16 signed fixed-point
//! scalar [`Fx`] so that identical inputs produce bit-identical results on
//! every platform. Floating point exists only at the boundary with rendering
//! and authoring code, via the explicit `from_f32`/`to_f32` conversions.
//!
//! Determinism contract:
//! - All operations are pure functions of their inputs; no global state.
//! - Overflow is two's-complement truncation (wrapping), identically on all
//!   targets.
//! - Trigonometry never touches platform transcendentals: angles are 16-bit
//!   turn fractions and sine/cosine come from a checked-in quarter-wave
//!   lookup table with linear interpolation.

/// 16-bit angle type and LUT-backed trigonometry.
pub mod angle;
/// The 16.16 fixed-point scalar.
pub mod fx;
/// 2D fixed-point vector and the cross-product helpers physics needs.
pub mod vec2;

pub use angle::Angle16;
pub use fx::Fx;
pub use vec2::Vec2Fx;
