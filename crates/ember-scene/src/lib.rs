// SPDX-License-Identifier: Apache-2.0
//! ember-scene: versioned world serialization.
//!
//! This crate provides:
//! - The scene document layout and world save/restore through the
//!   component codec registry.
//! - A `{version, timestamp, data}` envelope with strict/lax compatibility
//!   checking on load.
//! - Two payload forms: type-tagged, key-sorted JSON text (byte-identical
//!   for identical input) and compact CBOR binary.
//!
//! Serialization is deliberately separated from the runtime: the
//! deterministic core never touches JSON, and codecs are registered per
//! component type at the boundary.

/// CBOR/JSON value-tree conversion with type tags.
pub mod convert;
/// Error types.
pub mod error;
/// Scene document layout and world save/restore.
pub mod scene;
/// Envelopes and the text/binary forms.
pub mod snapshot;
/// Format versioning and compatibility rules.
pub mod version;

pub use error::SnapshotError;
pub use scene::{load_scene, save_scene, ComponentRecord, EntityRecord, SceneDoc, SystemRecord};
pub use snapshot::{from_binary, from_text, to_binary, to_text, Envelope};
pub use version::{check_version, LoadMode, LoadReport, Version, FORMAT_VERSION};
