// SPDX-License-Identifier: Apache-2.0
//! ember-physics: the deterministic 2D physics pipeline.
//!
//! Bodies, materials, and joints are plain components; per-frame state
//! (contacts, TOI queue, broadphase proxies, solver batches) lives in world
//! resources; every pass is a scheduler system registered by
//! [`pipeline::install_physics`]. All arithmetic is 16.16 fixed point, so a
//! world ticked twice from the same setup produces bit-identical
//! [`digest::frame_digest`] values. That property is load-bearing and
//! tested, not aspirational.

/// Rigid bodies and rotation caches.
pub mod body;
/// Continuous collision detection and the TOI mini-solve.
pub mod ccd;
/// Frame digests and the pair-determinism harness.
pub mod digest;
/// Joint components and solver batches.
pub mod joint;
/// Materials and mixing rules.
pub mod material;
/// Pipeline registration.
pub mod pipeline;
/// Physics resources and tunables.
pub mod resources;
/// Warm-started Gauss-Seidel solver passes.
pub mod solver;
/// Shape sync, broadphase, narrowphase, integration, sleep.
pub mod step;

pub use body::{Body2D, RotationCache2D};
pub use digest::{digest_hex, frame_digest, run_pair_determinism, DeterminismError, FrameDigest};
pub use joint::{DistanceJoint2D, PrismaticJoint2D, RevoluteJoint2D};
pub use material::{compose, DefaultMaterial2D, Material2D, MaterialTable2D, MixMode, MixRule};
pub use pipeline::{install_physics, install_resources, names, PHYSICS_SET};
pub use resources::{
    Broadphase2D, BroadphasePairs, ContactCache, Contacts2D, PhysicsConfig, SleepConfig,
    SolverTimeScale, ToiEvent, ToiQueue,
};
