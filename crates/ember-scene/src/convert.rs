// SPDX-License-Identifier: Apache-2.0
//! Conversion between the codec's CBOR value tree and the type-tagged JSON
//! used by the text form.
//!
//! JSON cannot represent CBOR byte strings, tags, or non-string map keys
//! directly; those become tagged objects:
//!
//! - bytes:             `{"$bytes": "<hex>"}`
//! - tagged value:      `{"$tag": <n>, "value": <v>}`
//! - non-string-key map: `{"$map": [[<k>, <v>], ...]}`
//!
//! String-keyed maps become plain JSON objects. Objects are rendered with
//! sorted keys (the default `serde_json` map), so the same input produces
//! byte-identical text on every run.

use ciborium::value::Value as Cbor;
use serde_json::{Map, Number, Value as Json};

use crate::error::SnapshotError;

/// Converts a CBOR value tree into tagged JSON.
pub fn cbor_to_json(value: &Cbor) -> Result<Json, SnapshotError> {
    match value {
        Cbor::Null => Ok(Json::Null),
        Cbor::Bool(b) => Ok(Json::Bool(*b)),
        Cbor::Integer(i) => {
            let wide = i128::from(*i);
            if let Ok(signed) = i64::try_from(wide) {
                Ok(Json::Number(signed.into()))
            } else if let Ok(unsigned) = u64::try_from(wide) {
                Ok(Json::Number(unsigned.into()))
            } else {
                Err(SnapshotError::Unrepresentable(format!(
                    "integer {wide} exceeds 64 bits"
                )))
            }
        }
        Cbor::Float(f) => Number::from_f64(*f)
            .map(Json::Number)
            .ok_or_else(|| SnapshotError::Unrepresentable("non-finite float".to_owned())),
        Cbor::Text(s) => Ok(Json::String(s.clone())),
        Cbor::Bytes(bytes) => {
            let mut object = Map::new();
            object.insert("$bytes".to_owned(), Json::String(hex::encode(bytes)));
            Ok(Json::Object(object))
        }
        Cbor::Tag(tag, inner) => {
            let mut object = Map::new();
            object.insert("$tag".to_owned(), Json::Number((*tag).into()));
            object.insert("value".to_owned(), cbor_to_json(inner)?);
            Ok(Json::Object(object))
        }
        Cbor::Array(items) => items
            .iter()
            .map(cbor_to_json)
            .collect::<Result<Vec<_>, _>>()
            .map(Json::Array),
        Cbor::Map(entries) => {
            let all_text_keys = entries.iter().all(|(k, _)| matches!(k, Cbor::Text(_)));
            if all_text_keys {
                let mut object = Map::new();
                for (key, item) in entries {
                    let Cbor::Text(key) = key else {
                        continue;
                    };
                    object.insert(key.clone(), cbor_to_json(item)?);
                }
                Ok(Json::Object(object))
            } else {
                let pairs = entries
                    .iter()
                    .map(|(k, v)| Ok(Json::Array(vec![cbor_to_json(k)?, cbor_to_json(v)?])))
                    .collect::<Result<Vec<_>, SnapshotError>>()?;
                let mut object = Map::new();
                object.insert("$map".to_owned(), Json::Array(pairs));
                Ok(Json::Object(object))
            }
        }
        other => Err(SnapshotError::Unrepresentable(format!(
            "unsupported CBOR value: {other:?}"
        ))),
    }
}

/// Converts tagged JSON back into the CBOR value tree.
pub fn json_to_cbor(value: &Json) -> Result<Cbor, SnapshotError> {
    match value {
        Json::Null => Ok(Cbor::Null),
        Json::Bool(b) => Ok(Cbor::Bool(*b)),
        Json::Number(n) => {
            if let Some(signed) = n.as_i64() {
                Ok(Cbor::Integer(signed.into()))
            } else if let Some(unsigned) = n.as_u64() {
                Ok(Cbor::Integer(unsigned.into()))
            } else if let Some(float) = n.as_f64() {
                Ok(Cbor::Float(float))
            } else {
                Err(SnapshotError::Unrepresentable(format!(
                    "unrepresentable number: {n}"
                )))
            }
        }
        Json::String(s) => Ok(Cbor::Text(s.clone())),
        Json::Array(items) => items
            .iter()
            .map(json_to_cbor)
            .collect::<Result<Vec<_>, _>>()
            .map(Cbor::Array),
        Json::Object(object) => {
            if let Some(Json::String(encoded)) = object.get("$bytes") {
                let bytes = hex::decode(encoded)
                    .map_err(|e| SnapshotError::Text(format!("bad $bytes: {e}")))?;
                return Ok(Cbor::Bytes(bytes));
            }
            if let Some(tag) = object.get("$tag").and_then(Json::as_u64) {
                let inner = object.get("value").unwrap_or(&Json::Null);
                return Ok(Cbor::Tag(tag, Box::new(json_to_cbor(inner)?)));
            }
            if let Some(Json::Array(pairs)) = object.get("$map") {
                let mut entries = Vec::with_capacity(pairs.len());
                for pair in pairs {
                    let Json::Array(kv) = pair else {
                        return Err(SnapshotError::Text("$map entry is not a pair".to_owned()));
                    };
                    let (Some(k), Some(v)) = (kv.first(), kv.get(1)) else {
                        return Err(SnapshotError::Text("$map entry is not a pair".to_owned()));
                    };
                    entries.push((json_to_cbor(k)?, json_to_cbor(v)?));
                }
                return Ok(Cbor::Map(entries));
            }
            let mut entries = Vec::with_capacity(object.len());
            for (key, item) in object {
                entries.push((Cbor::Text(key.clone()), json_to_cbor(item)?));
            }
            Ok(Cbor::Map(entries))
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::float_cmp)]

    use super::*;

    #[test]
    fn scalars_round_trip() {
        for value in [
            Cbor::Null,
            Cbor::Bool(true),
            Cbor::Integer(42.into()),
            Cbor::Integer((-7).into()),
            Cbor::Float(1.5),
            Cbor::Text("hello".to_owned()),
        ] {
            let json = cbor_to_json(&value).unwrap();
            assert_eq!(json_to_cbor(&json).unwrap(), value);
        }
    }

    #[test]
    fn bytes_and_tags_use_dollar_markers() {
        let value = Cbor::Tag(1, Box::new(Cbor::Bytes(vec![0xde, 0xad])));
        let json = cbor_to_json(&value).unwrap();
        assert_eq!(
            serde_json::to_string(&json).unwrap(),
            r#"{"$tag":1,"value":{"$bytes":"dead"}}"#
        );
        assert_eq!(json_to_cbor(&json).unwrap(), value);
    }

    #[test]
    fn non_string_keyed_maps_round_trip_through_dollar_map() {
        let value = Cbor::Map(vec![
            (Cbor::Integer(1.into()), Cbor::Text("one".to_owned())),
            (Cbor::Integer(2.into()), Cbor::Text("two".to_owned())),
        ]);
        let json = cbor_to_json(&value).unwrap();
        assert!(json.get("$map").is_some());
        assert_eq!(json_to_cbor(&json).unwrap(), value);
    }

    #[test]
    fn text_form_is_key_sorted_and_stable() {
        let value = Cbor::Map(vec![
            (Cbor::Text("zeta".to_owned()), Cbor::Integer(1.into())),
            (Cbor::Text("alpha".to_owned()), Cbor::Integer(2.into())),
        ]);
        let a = serde_json::to_string(&cbor_to_json(&value).unwrap()).unwrap();
        let b = serde_json::to_string(&cbor_to_json(&value).unwrap()).unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with(r#"{"alpha"#), "keys must sort: {a}");
    }
}
