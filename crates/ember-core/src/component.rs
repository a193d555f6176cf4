// SPDX-License-Identifier: Apache-2.0
//! Component types, the registry, lifecycle hooks, and the codec vtable.
//!
//! Every component type registers once and receives a dense
//! [`ComponentTypeId`] used for signature bitsets. The registry also retains
//! what the rest of the runtime needs to handle the type without generics:
//! a column constructor, optional lifecycle callbacks, an optional structural
//! schema (serialization metadata), and an optional encode/decode vtable for
//! the snapshot codec.

use std::any::{Any, TypeId};

use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::column::{AnyColumn, VecColumn};
use crate::entity::Entity;
use crate::error::WorldError;
use crate::signature::MAX_COMPONENT_TYPES;

/// Marker trait for component data.
///
/// Components are plain data; behavior lives in systems. The `NAME` is the
/// stable identity used by snapshots (signatures serialize as names, never as
/// dense ids).
pub trait Component: Any + Send + Sync + Sized + 'static {
    /// Stable, human-readable component name.
    const NAME: &'static str;
}

/// Dense component type id; doubles as the signature bit index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentTypeId(u16);

impl ComponentTypeId {
    /// Constructs from a raw dense index.
    #[must_use]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Raw dense index.
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }
}

/// Field type in a structural schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// 32-bit signed integer (also carries 16.16 fixed-point raw bits).
    I32,
    /// 32-bit float (boundary-only data).
    F32,
    /// 32-bit unsigned integer.
    U32,
    /// Boolean, stored as 0/1.
    Bool,
}

/// One named, typed slot in a structural schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaField {
    /// Field name.
    pub name: &'static str,
    /// Slot type.
    pub kind: FieldKind,
}

/// Optional structural schema describing a component's typed slots.
///
/// Carried as metadata for codecs and shared-memory layouts; native columns
/// do not consult it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Schema {
    /// Ordered fields.
    pub fields: Vec<SchemaField>,
}

/// Lifecycle callback invoked with the entity and the (type-erased) value.
pub type LifecycleHook = Box<dyn Fn(Entity, &mut dyn Any) + Send + Sync>;

/// Lifecycle hooks for a component type.
#[derive(Default)]
pub struct ComponentHooks {
    /// Called after the component is inserted on an entity.
    pub on_added: Option<LifecycleHook>,
    /// Called just before the component is removed (value still intact).
    pub on_removed: Option<LifecycleHook>,
    /// Called when an insert overwrites an existing component in place.
    pub reset: Option<LifecycleHook>,
}

/// Errors from the component codec vtable.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Value could not be encoded to the intermediate representation.
    #[error("encode failed for {name}: {message}")]
    Encode {
        /// Component name.
        name: &'static str,
        /// Underlying cause, stringified.
        message: String,
    },
    /// Value could not be decoded from the intermediate representation.
    #[error("decode failed for {name}: {message}")]
    Decode {
        /// Component name.
        name: &'static str,
        /// Underlying cause, stringified.
        message: String,
    },
    /// The boxed value was not of the component's concrete type.
    #[error("type mismatch while encoding {name}")]
    TypeMismatch {
        /// Component name.
        name: &'static str,
    },
}

/// Encode/decode vtable bridging a component type to the snapshot codec.
///
/// The intermediate representation is a CBOR value tree; the scene crate
/// renders it to the text or binary form.
pub struct ComponentCodec {
    /// Encodes a type-erased component value.
    pub encode: fn(&dyn Any) -> Result<ciborium::value::Value, CodecError>,
    /// Decodes a component value from the intermediate representation.
    pub decode: fn(&ciborium::value::Value) -> Result<Box<dyn Any + Send + Sync>, CodecError>,
}

/// Everything the runtime knows about a registered component type.
pub struct ComponentInfo {
    /// Stable name (snapshot identity).
    pub name: &'static str,
    /// Dense type id (signature bit).
    pub id: ComponentTypeId,
    /// Optional structural schema.
    pub schema: Option<Schema>,
    pub(crate) new_column: fn() -> Box<dyn AnyColumn>,
    pub(crate) hooks: ComponentHooks,
    pub(crate) codec: Option<ComponentCodec>,
}

impl ComponentInfo {
    /// Returns the codec vtable if this type registered one.
    #[must_use]
    pub fn codec(&self) -> Option<&ComponentCodec> {
        self.codec.as_ref()
    }
}

/// Registry assigning dense ids and retaining per-type metadata.
#[derive(Default)]
pub struct ComponentRegistry {
    infos: Vec<ComponentInfo>,
    by_type: FxHashMap<TypeId, ComponentTypeId>,
    by_name: FxHashMap<&'static str, ComponentTypeId>,
}

impl ComponentRegistry {
    /// Registers `T`, returning its dense id. Idempotent.
    ///
    /// # Errors
    /// [`WorldError::TypeCapacityExhausted`] once the fixed signature width
    /// is full.
    pub fn register<T: Component>(&mut self) -> Result<ComponentTypeId, WorldError> {
        if let Some(&id) = self.by_type.get(&TypeId::of::<T>()) {
            return Ok(id);
        }
        if self.infos.len() >= MAX_COMPONENT_TYPES {
            return Err(WorldError::TypeCapacityExhausted(MAX_COMPONENT_TYPES));
        }
        #[allow(clippy::cast_possible_truncation)]
        let id = ComponentTypeId::new(self.infos.len() as u16);
        self.infos.push(ComponentInfo {
            name: T::NAME,
            id,
            schema: None,
            new_column: || Box::new(VecColumn::<T>::default()),
            hooks: ComponentHooks::default(),
            codec: None,
        });
        self.by_type.insert(TypeId::of::<T>(), id);
        self.by_name.insert(T::NAME, id);
        Ok(id)
    }

    /// Registers `T` together with a snapshot codec derived from serde.
    ///
    /// # Errors
    /// Same as [`ComponentRegistry::register`].
    pub fn register_serializable<T>(&mut self) -> Result<ComponentTypeId, WorldError>
    where
        T: Component + Serialize + DeserializeOwned,
    {
        let id = self.register::<T>()?;
        self.infos[usize::from(id.raw())].codec = Some(ComponentCodec {
            encode: |any| {
                let value = any
                    .downcast_ref::<T>()
                    .ok_or(CodecError::TypeMismatch { name: T::NAME })?;
                ciborium::value::Value::serialized(value).map_err(|e| CodecError::Encode {
                    name: T::NAME,
                    message: e.to_string(),
                })
            },
            decode: |value| {
                let decoded: T = value.deserialized().map_err(|e| CodecError::Decode {
                    name: T::NAME,
                    message: e.to_string(),
                })?;
                Ok(Box::new(decoded))
            },
        });
        Ok(id)
    }

    /// Attaches a structural schema to a registered type.
    pub fn set_schema<T: Component>(&mut self, schema: Schema) -> Result<(), WorldError> {
        let id = self.require_id::<T>()?;
        self.infos[usize::from(id.raw())].schema = Some(schema);
        Ok(())
    }

    /// Installs lifecycle hooks for a registered type.
    pub fn set_hooks<T: Component>(&mut self, hooks: ComponentHooks) -> Result<(), WorldError> {
        let id = self.require_id::<T>()?;
        self.infos[usize::from(id.raw())].hooks = hooks;
        Ok(())
    }

    /// Dense id for `T`, if registered.
    #[must_use]
    pub fn id_of<T: Component>(&self) -> Option<ComponentTypeId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Dense id for `T`, failing upward when unregistered.
    pub fn require_id<T: Component>(&self) -> Result<ComponentTypeId, WorldError> {
        self.id_of::<T>()
            .ok_or(WorldError::UnregisteredComponent(T::NAME))
    }

    /// Dense id for a stable component name (snapshot restore path).
    #[must_use]
    pub fn id_by_name(&self, name: &str) -> Option<ComponentTypeId> {
        self.by_name.get(name).copied()
    }

    /// Metadata for a dense id.
    #[must_use]
    pub fn info(&self, id: ComponentTypeId) -> Option<&ComponentInfo> {
        self.infos.get(usize::from(id.raw()))
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// Returns `true` when no types are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// Iterates all registered infos in dense-id order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentInfo> {
        self.infos.iter()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::float_cmp)]

    use super::*;

    struct Health(#[allow(dead_code)] i32);
    impl Component for Health {
        const NAME: &'static str = "Health";
    }

    struct Armor;
    impl Component for Armor {
        const NAME: &'static str = "Armor";
    }

    #[test]
    fn registration_is_dense_and_idempotent() {
        let mut reg = ComponentRegistry::default();
        let a = reg.register::<Health>().unwrap();
        let b = reg.register::<Armor>().unwrap();
        assert_eq!(a.raw(), 0);
        assert_eq!(b.raw(), 1);
        assert_eq!(reg.register::<Health>().unwrap(), a);
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.id_by_name("Armor"), Some(b));
    }

    #[test]
    fn unregistered_lookup_fails_upward() {
        let reg = ComponentRegistry::default();
        assert_eq!(
            reg.require_id::<Health>(),
            Err(WorldError::UnregisteredComponent("Health"))
        );
    }
}
