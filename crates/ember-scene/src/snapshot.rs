// SPDX-License-Identifier: Apache-2.0
//! Snapshot envelopes and the two payload forms.
//!
//! Every payload wraps as `{version: {major, minor, patch}, timestamp,
//! data}`. The text form is type-tagged JSON with sorted object keys, so
//! serializing the same document twice yields byte-identical text; the
//! binary form is CBOR. The caller supplies the timestamp; sampling a
//! clock here would break text-form reproducibility.

use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;
use crate::scene::SceneDoc;
use crate::version::{check_version, LoadMode, LoadReport, Version, FORMAT_VERSION};

/// Versioned wrapper around a scene document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Format version of the payload.
    pub version: Version,
    /// Caller-supplied capture time, milliseconds since the epoch.
    pub timestamp: u64,
    /// The scene document.
    pub data: SceneDoc,
}

impl Envelope {
    /// Wraps a document under the current format version.
    #[must_use]
    pub fn new(data: SceneDoc, timestamp: u64) -> Self {
        Self {
            version: FORMAT_VERSION,
            timestamp,
            data,
        }
    }
}

/// Serializes to the human-readable text form.
pub fn to_text(doc: &SceneDoc, timestamp: u64) -> Result<String, SnapshotError> {
    let envelope = Envelope::new(doc.clone(), timestamp);
    serde_json::to_string_pretty(&envelope).map_err(|e| SnapshotError::Text(e.to_string()))
}

/// Parses the text form, applying the version compatibility rule.
pub fn from_text(text: &str, mode: LoadMode) -> Result<(SceneDoc, LoadReport), SnapshotError> {
    let envelope: Envelope =
        serde_json::from_str(text).map_err(|e| SnapshotError::Text(e.to_string()))?;
    let report = check_version(envelope.version, FORMAT_VERSION, mode)?;
    Ok((envelope.data, report))
}

/// Serializes to the compact binary (CBOR) form.
pub fn to_binary(doc: &SceneDoc, timestamp: u64) -> Result<Vec<u8>, SnapshotError> {
    let envelope = Envelope::new(doc.clone(), timestamp);
    let mut out = Vec::new();
    ciborium::into_writer(&envelope, &mut out)
        .map_err(|e| SnapshotError::Binary(e.to_string()))?;
    Ok(out)
}

/// Parses the binary form, applying the version compatibility rule.
pub fn from_binary(bytes: &[u8], mode: LoadMode) -> Result<(SceneDoc, LoadReport), SnapshotError> {
    let envelope: Envelope =
        ciborium::from_reader(bytes).map_err(|e| SnapshotError::Binary(e.to_string()))?;
    let report = check_version(envelope.version, FORMAT_VERSION, mode)?;
    Ok((envelope.data, report))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::float_cmp)]

    use super::*;
    use crate::scene::{ComponentRecord, EntityRecord};
    use serde_json::json;

    fn sample_doc() -> SceneDoc {
        SceneDoc {
            entity_id_counter: 2,
            paused: false,
            entities: vec![EntityRecord {
                id: 0,
                active: true,
                components: vec![ComponentRecord {
                    component_type: "Position".to_owned(),
                    enabled: true,
                    properties: json!({"x": 1, "y": -2}),
                }],
            }],
            systems: Vec::new(),
        }
    }

    #[test]
    fn text_round_trip_preserves_the_document() {
        let doc = sample_doc();
        let text = to_text(&doc, 1234).unwrap();
        let (restored, report) = from_text(&text, LoadMode::Strict).unwrap();
        assert_eq!(restored, doc);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn text_form_is_byte_identical_across_runs() {
        let doc = sample_doc();
        assert_eq!(to_text(&doc, 99).unwrap(), to_text(&doc, 99).unwrap());
    }

    #[test]
    fn binary_round_trip_preserves_the_document() {
        let doc = sample_doc();
        let bytes = to_binary(&doc, 1234).unwrap();
        let (restored, _) = from_binary(&bytes, LoadMode::Strict).unwrap();
        assert_eq!(restored, doc);
    }

    #[test]
    fn version_gate_applies_to_both_forms() {
        let doc = sample_doc();
        let mut text = to_text(&doc, 0).unwrap();
        text = text.replace(r#""major": 1"#, r#""major": 2"#);
        assert!(matches!(
            from_text(&text, LoadMode::Lax),
            Err(SnapshotError::MajorMismatch { .. })
        ));
    }

    #[test]
    fn envelope_carries_version_and_timestamp() {
        let text = to_text(&sample_doc(), 777).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["version"]["major"], 1);
        assert_eq!(parsed["timestamp"], 777);
    }
}
