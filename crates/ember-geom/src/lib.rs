// SPDX-License-Identifier: Apache-2.0
//! ember-geom: collision geometry for the Ember runtime.
//!
//! This crate provides:
//! - Fixed-point axis-aligned bounding boxes ([`Aabb2`]).
//! - Collision shapes and their world-space caches ([`Shape2D`],
//!   [`CircleWorld2D`], [`HullWorld2D`]).
//! - A sweep-and-prune broadphase behind the [`BroadPhase`] trait.
//! - Narrowphase manifold generation (circle/circle, hull/circle, hull/hull
//!   SAT with reference-face clipping).
//!
//! Design notes:
//! - Deterministic: all arithmetic is 16.16 fixed point; pair and contact
//!   ordering is canonical and tie-broken by proxy id, never by address.
//! - Proxy ids are opaque `u64`s; the physics layer maps entities onto them.

/// Fixed-point AABBs.
pub mod aabb;
/// Sweep-and-prune broadphase.
pub mod broadphase;
/// Contact points.
pub mod contact;
/// Narrowphase dispatch and SAT.
pub mod narrow;
/// Shapes and world-space caches.
pub mod shape;

pub use aabb::Aabb2;
pub use broadphase::{BroadPhase, SweepAndPrune};
pub use contact::Contact;
pub use narrow::{collide, WorldShape};
pub use shape::{CircleWorld2D, HullWorld2D, Shape2D, ShapeError, MAX_HULL_VERTICES};
