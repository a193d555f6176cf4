// SPDX-License-Identifier: Apache-2.0
//! Frame digest and lockstep determinism checking.
//!
//! The digest is a BLAKE3 hash over a canonical byte stream of the physics
//! state: live bodies in ascending entity order, each contributing its raw
//! fixed-point fields in little-endian. Two worlds that replay identically
//! produce identical digests every frame; the first divergent frame is the
//! bug report.

use blake3::Hasher;
use ember_core::{Query, Schedule, TickError, World};
use ember_math::Fx;
use thiserror::Error;

use crate::body::Body2D;

/// 32-byte frame digest.
pub type FrameDigest = [u8; 32];

/// Computes the canonical digest of all physics body state.
#[must_use]
pub fn frame_digest(world: &World) -> FrameDigest {
    let mut hasher = Hasher::new();
    hasher.update(b"ember-frame-v1");
    hasher.update(&world.frame().to_le_bytes());

    let mut entities = world.query_entities(&Query::new().require::<Body2D>());
    entities.sort_unstable();
    for entity in entities {
        let Some(body) = world.get::<Body2D>(entity) else {
            continue;
        };
        hasher.update(&entity.to_bits().to_le_bytes());
        hasher.update(&body.position.x.raw().to_le_bytes());
        hasher.update(&body.position.y.raw().to_le_bytes());
        hasher.update(&body.velocity.x.raw().to_le_bytes());
        hasher.update(&body.velocity.y.raw().to_le_bytes());
        hasher.update(&u32::from(body.angle.raw()).to_le_bytes());
        hasher.update(&body.angular_velocity.raw().to_le_bytes());
        hasher.update(&[u8::from(body.awake)]);
    }
    *hasher.finalize().as_bytes()
}

/// Hex rendering of a digest for reports and logs.
#[must_use]
pub fn digest_hex(digest: &FrameDigest) -> String {
    hex::encode(digest)
}

/// Determinism check failure.
#[derive(Debug, Error)]
pub enum DeterminismError {
    /// The two runs diverged.
    #[error("divergence at frame {frame}: {left} != {right}")]
    Diverged {
        /// Frame of first divergence.
        frame: u64,
        /// Digest of the first run.
        left: String,
        /// Digest of the second run.
        right: String,
    },
    /// A tick failed while driving one of the runs.
    #[error("tick failed during determinism run: {0}")]
    Tick(#[from] TickError),
}

/// Builds two worlds with the same setup, ticks both in lockstep, and
/// compares frame digests after every tick.
///
/// # Errors
/// [`DeterminismError::Diverged`] naming the first divergent frame, or
/// [`DeterminismError::Tick`] if a run fails to tick.
pub fn run_pair_determinism(
    setup: impl Fn(&mut World, &mut Schedule),
    ticks: u32,
    dt: Fx,
) -> Result<(), DeterminismError> {
    let mut world_a = World::new();
    let mut schedule_a = Schedule::new();
    setup(&mut world_a, &mut schedule_a);

    let mut world_b = World::new();
    let mut schedule_b = Schedule::new();
    setup(&mut world_b, &mut schedule_b);

    for _ in 0..ticks {
        schedule_a.tick(&mut world_a, dt)?;
        schedule_b.tick(&mut world_b, dt)?;
        let left = frame_digest(&world_a);
        let right = frame_digest(&world_b);
        if left != right {
            return Err(DeterminismError::Diverged {
                frame: world_a.frame(),
                left: digest_hex(&left),
                right: digest_hex(&right),
            });
        }
    }
    Ok(())
}
