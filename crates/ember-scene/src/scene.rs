// SPDX-License-Identifier: Apache-2.0
//! Scene document: the serialized shape of a world.
//!
//! Layout: `{entityIdCounter, paused, entities: [{id, active, components:
//! [{componentType, enabled, properties}]}], systems: [{type, enabled,
//! priority, config?}]}`. Component identity is the stable component NAME,
//! never a dense type id, so archetype signatures restore through the
//! registry on load regardless of registration order.

use ember_core::{Entity, World};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::convert::{cbor_to_json, json_to_cbor};
use crate::error::SnapshotError;

/// One serialized component on an entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRecord {
    /// Stable component type name.
    pub component_type: String,
    /// Authoring enablement flag.
    pub enabled: bool,
    /// Encoded component fields (tagged JSON tree).
    pub properties: Json,
}

/// One serialized entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    /// Packed entity handle (index + generation), so cross-entity
    /// references in components stay valid after restore.
    pub id: u64,
    /// Entity enablement flag.
    pub active: bool,
    /// Components in ascending type-registration order.
    pub components: Vec<ComponentRecord>,
}

/// One serialized system configuration (authoring metadata; the host maps
/// these onto registered systems).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemRecord {
    /// System type name.
    #[serde(rename = "type")]
    pub system_type: String,
    /// Whether the system is enabled.
    pub enabled: bool,
    /// Host-defined ordering priority.
    pub priority: i32,
    /// Optional system configuration payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<Json>,
}

/// The serialized world.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDoc {
    /// Number of entity slots ever allocated.
    pub entity_id_counter: u64,
    /// Host pause flag.
    pub paused: bool,
    /// Entities in ascending id order.
    pub entities: Vec<EntityRecord>,
    /// System configurations (host-maintained).
    pub systems: Vec<SystemRecord>,
}

/// Serializes a world into a scene document.
///
/// Every component with a registered codec is encoded; components without a
/// codec are skipped (they are runtime caches by convention). Entities are
/// emitted in ascending id order so the output is canonical.
pub fn save_scene(world: &World) -> Result<SceneDoc, SnapshotError> {
    let mut entities = Vec::new();
    for entity in world.live_entities() {
        let mut components = Vec::new();
        for type_id in world.component_ids_of(entity) {
            let Some(info) = world.registry().info(type_id) else {
                continue;
            };
            let Some(result) = world.encode_component(entity, type_id) else {
                continue;
            };
            let cbor = result?;
            components.push(ComponentRecord {
                component_type: info.name.to_owned(),
                enabled: true,
                properties: cbor_to_json(&cbor)?,
            });
        }
        entities.push(EntityRecord {
            id: entity.to_bits(),
            active: world.is_enabled(entity),
            components,
        });
    }
    Ok(SceneDoc {
        entity_id_counter: u64::try_from(world.entity_slot_count()).unwrap_or(u64::MAX),
        paused: world.is_paused(),
        entities,
        systems: Vec::new(),
    })
}

/// Checks serialized properties against a component's structural schema:
/// every declared field must be present with a compatible value. Booleans
/// coerce from 0/1 numbers, matching the typed-slot storage convention.
fn validate_schema(
    name: &str,
    schema: &ember_core::Schema,
    properties: &Json,
) -> Result<(), SnapshotError> {
    let violation = |field: &str, message: &str| SnapshotError::SchemaViolation {
        component: name.to_owned(),
        field: field.to_owned(),
        message: message.to_owned(),
    };
    let Some(object) = properties.as_object() else {
        return Err(violation("<root>", "properties must be an object"));
    };
    for field in &schema.fields {
        let Some(value) = object.get(field.name) else {
            return Err(violation(field.name, "missing field"));
        };
        let ok = match field.kind {
            ember_core::FieldKind::I32 => value.as_i64().is_some_and(|n| i32::try_from(n).is_ok()),
            ember_core::FieldKind::U32 => value.as_u64().is_some_and(|n| u32::try_from(n).is_ok()),
            ember_core::FieldKind::F32 => value.as_f64().is_some(),
            ember_core::FieldKind::Bool => {
                value.is_boolean() || matches!(value.as_u64(), Some(0 | 1))
            }
        };
        if !ok {
            return Err(violation(field.name, "value does not fit the slot type"));
        }
    }
    Ok(())
}

/// Restores a world from a scene document.
///
/// The registry (and its codecs) must already be populated; unknown
/// component names fail the load, leaving no partially restored entities
/// visible to the caller's error path. Components carrying a structural
/// schema are validated against it before decoding.
pub fn load_scene(world: &mut World, doc: &SceneDoc) -> Result<(), SnapshotError> {
    let slot_count = usize::try_from(doc.entity_id_counter).unwrap_or(usize::MAX);
    world.reset_entities(slot_count);
    world.set_paused(doc.paused);

    for record in &doc.entities {
        let entity = Entity::from_bits(record.id);
        world.spawn_at(entity);
        world.set_enabled(entity, record.active)?;
        for component in &record.components {
            let type_id = world
                .registry()
                .id_by_name(&component.component_type)
                .ok_or_else(|| {
                    SnapshotError::UnknownComponent(component.component_type.clone())
                })?;
            let info = world
                .registry()
                .info(type_id)
                .ok_or_else(|| SnapshotError::UnknownComponent(component.component_type.clone()))?;
            if let Some(schema) = &info.schema {
                validate_schema(info.name, schema, &component.properties)?;
            }
            let codec = info.codec().ok_or_else(|| {
                SnapshotError::NotSerializable(component.component_type.clone())
            })?;
            let cbor = json_to_cbor(&component.properties)?;
            let value = (codec.decode)(&cbor)?;
            world.add_component_boxed(entity, type_id, value)?;
        }
    }
    Ok(())
}
