// SPDX-License-Identifier: Apache-2.0
//! Scene codec errors.
//!
//! A failed deserialization returns an error, never a partially restored
//! world; messages preserve the underlying cause.

use ember_core::{CodecError, WorldError};
use thiserror::Error;

use crate::version::Version;

/// Errors from snapshot encoding, decoding, and world restore.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The payload's major version differs from the current format.
    #[error("incompatible snapshot: payload {payload} vs current {current} (major mismatch)")]
    MajorMismatch {
        /// Version found in the payload.
        payload: Version,
        /// Version this build writes.
        current: Version,
    },
    /// The payload is newer than this build (strict mode only).
    #[error("snapshot {payload} is newer than current {current}")]
    NewerThanCurrent {
        /// Version found in the payload.
        payload: Version,
        /// Version this build writes.
        current: Version,
    },
    /// Text-form (JSON) encoding or parsing failed.
    #[error("text form error: {0}")]
    Text(String),
    /// Binary-form (CBOR) encoding or parsing failed.
    #[error("binary form error: {0}")]
    Binary(String),
    /// A value could not be represented in the target form.
    #[error("unrepresentable value: {0}")]
    Unrepresentable(String),
    /// A serialized component names a type the registry does not know.
    #[error("unknown component type in snapshot: {0}")]
    UnknownComponent(String),
    /// A component type has no codec registered.
    #[error("component {0} is not serializable (no codec registered)")]
    NotSerializable(String),
    /// Serialized properties do not satisfy the component's schema.
    #[error("schema violation in {component}.{field}: {message}")]
    SchemaViolation {
        /// Component name.
        component: String,
        /// Offending field.
        field: String,
        /// What failed.
        message: String,
    },
    /// A component codec failed.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// A world operation failed during restore.
    #[error(transparent)]
    World(#[from] WorldError),
}
