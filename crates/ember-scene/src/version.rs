// SPDX-License-Identifier: Apache-2.0
//! Snapshot format versioning.
//!
//! Compatibility rule on load: the major version must match; a minor
//! exceeding the current build, or a newer patch within the same minor,
//! fails in strict mode and degrades to a warning in lax mode.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;

/// Semantic format version carried in every snapshot envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Version {
    /// Incompatible format changes.
    pub major: u32,
    /// Backward-compatible additions.
    pub minor: u32,
    /// Fixes within a minor.
    pub patch: u32,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Version written by this build.
pub const FORMAT_VERSION: Version = Version {
    major: 1,
    minor: 0,
    patch: 0,
};

/// How strictly load treats newer payloads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoadMode {
    /// Newer-than-current payloads are rejected.
    #[default]
    Strict,
    /// Newer-than-current payloads load with a warning attached.
    Lax,
}

/// Warnings attached to a successful (lax) load.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Human-readable warnings.
    pub warnings: Vec<String>,
}

/// Applies the compatibility rule.
///
/// # Errors
/// [`SnapshotError::MajorMismatch`] always on a major difference;
/// [`SnapshotError::NewerThanCurrent`] in strict mode when the payload is
/// newer than `current`.
pub fn check_version(
    payload: Version,
    current: Version,
    mode: LoadMode,
) -> Result<LoadReport, SnapshotError> {
    if payload.major != current.major {
        return Err(SnapshotError::MajorMismatch { payload, current });
    }
    let newer = payload.minor > current.minor
        || (payload.minor == current.minor && payload.patch > current.patch);
    let mut report = LoadReport::default();
    if newer {
        match mode {
            LoadMode::Strict => {
                return Err(SnapshotError::NewerThanCurrent { payload, current });
            }
            LoadMode::Lax => {
                report
                    .warnings
                    .push(format!("snapshot {payload} is newer than current {current}"));
            }
        }
    }
    Ok(report)
}
