// SPDX-License-Identifier: Apache-2.0
//! The world: entity table, archetype storage, resources, and channels.
//!
//! Ownership model: the world owns all components, resources, channels, and
//! entity metadata. Only the currently executing system (or a flush caller)
//! may mutate it, and the tick is single-threaded, so none of this needs a
//! lock. Structural changes while a query is iterating are rejected with
//! [`WorldError::IterationActive`]; deferred edits go through a
//! [`crate::command::CommandBuffer`] instead.
//!
//! Determinism: archetypes are stored in creation order and iterated in that
//! order; the entity-to-row map may change across frames (swap-remove) but is
//! stable within a frame once all flushes have run.

use std::any::{Any, TypeId};
use std::cell::Cell;

use ember_math::Fx;
use rustc_hash::FxHashMap;

use crate::archetype::{Archetype, ArchetypeId};
use crate::column::VecColumn;
use crate::component::{
    CodecError, Component, ComponentRegistry, ComponentTypeId, Schema,
};
use crate::entity::{Entity, EntityAllocator};
use crate::error::WorldError;
use crate::event::{AddedEvent, EventChannel, RemovedEvent};
use crate::signature::Signature;

/// Location of a live entity in archetype storage.
#[derive(Clone, Copy, Debug, Default)]
struct EntityMeta {
    archetype: u32,
    row: u32,
    enabled: bool,
}

/// The owning aggregate for one simulation.
pub struct World {
    registry: ComponentRegistry,
    allocator: EntityAllocator,
    meta: Vec<EntityMeta>,
    archetypes: Vec<Archetype>,
    archetype_index: FxHashMap<Signature, ArchetypeId>,
    resources: FxHashMap<TypeId, Box<dyn Any + Send + Sync>>,
    frame: u64,
    fixed_dt: Fx,
    paused: bool,
    added: EventChannel<AddedEvent>,
    removed: EventChannel<RemovedEvent>,
    iteration_depth: Cell<u32>,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Creates an empty world with the default 1/60 s fixed timestep.
    #[must_use]
    pub fn new() -> Self {
        let empty = Archetype::new(Signature::EMPTY, Vec::new());
        let mut archetype_index = FxHashMap::default();
        archetype_index.insert(Signature::EMPTY, ArchetypeId(0));
        Self {
            registry: ComponentRegistry::default(),
            allocator: EntityAllocator::default(),
            meta: Vec::new(),
            archetypes: vec![empty],
            archetype_index,
            resources: FxHashMap::default(),
            frame: 0,
            fixed_dt: Fx::from_ratio(1, 60),
            paused: false,
            added: EventChannel::default(),
            removed: EventChannel::default(),
            iteration_depth: Cell::new(0),
        }
    }

    // ------------------------------------------------------------------
    // Registry and frame state
    // ------------------------------------------------------------------

    /// The component registry.
    #[must_use]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Mutable access to the component registry.
    pub fn registry_mut(&mut self) -> &mut ComponentRegistry {
        &mut self.registry
    }

    /// Registers a component type (idempotent convenience).
    pub fn register<T: Component>(&mut self) -> Result<ComponentTypeId, WorldError> {
        self.registry.register::<T>()
    }

    /// Current frame counter. Monotonically non-decreasing across ticks.
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// The configured fixed timestep in fixed-point seconds.
    #[must_use]
    pub fn fixed_dt(&self) -> Fx {
        self.fixed_dt
    }

    /// Overrides the fixed timestep.
    pub fn set_fixed_dt(&mut self, dt: Fx) {
        self.fixed_dt = dt;
    }

    /// Whether the simulation is paused (host-level flag, serialized).
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Sets the paused flag.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Advances the frame counter. Called by the scheduler at tick start.
    pub fn begin_frame(&mut self) {
        self.frame += 1;
    }

    /// Restores the frame counter (snapshot load).
    pub fn set_frame(&mut self, frame: u64) {
        self.frame = frame;
    }

    // ------------------------------------------------------------------
    // Entities
    // ------------------------------------------------------------------

    /// Creates a new, empty, enabled entity.
    pub fn spawn(&mut self) -> Entity {
        let entity = self.allocator.allocate();
        let index = entity.index() as usize;
        if index >= self.meta.len() {
            self.meta.resize(index + 1, EntityMeta::default());
        }
        let row = self.archetypes[0].push_entity(entity);
        self.meta[index] = EntityMeta {
            archetype: 0,
            row: truncate_row(row),
            enabled: true,
        };
        entity
    }

    /// Destroys an entity: removes every component (emitting `Removed` with
    /// the prior values), then returns the id to the free list with a bumped
    /// generation.
    pub fn despawn(&mut self, entity: Entity) -> Result<(), WorldError> {
        self.guard_structural()?;
        self.check_live(entity)?;
        let meta = self.meta[entity.index() as usize];
        let arch_id = meta.archetype as usize;
        let row = meta.row as usize;

        let ids: Vec<ComponentTypeId> = self.archetypes[arch_id].column_ids().collect();
        for id in ids {
            let info = self
                .registry
                .info(id)
                .ok_or(WorldError::InvariantViolation("column without registry info"))?;
            let name = info.name;
            let column = self.archetypes[arch_id]
                .column_mut(id)
                .ok_or(WorldError::InvariantViolation("missing column during despawn"))?;
            let mut value = column.swap_remove_boxed(row);
            if let Some(hook) = self.registry.info(id).and_then(|i| i.hooks.on_removed.as_ref()) {
                hook(entity, value.as_mut());
            }
            self.removed.push(RemovedEvent {
                entity,
                type_id: id,
                name,
                value,
            });
        }
        if let Some(moved) = self.archetypes[arch_id].swap_remove_entity(row) {
            self.meta[moved.index() as usize].row = meta.row;
        }
        self.allocator.free(entity);
        Ok(())
    }

    /// Returns `true` when the handle is live and current.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.allocator.is_live(entity)
    }

    /// Returns `true` when the entity is live and enabled.
    #[must_use]
    pub fn is_enabled(&self, entity: Entity) -> bool {
        self.allocator.is_live(entity) && self.meta[entity.index() as usize].enabled
    }

    /// Sets the enablement flag. Disabled entities are skipped by queries
    /// that filter on enablement.
    pub fn set_enabled(&mut self, entity: Entity, enabled: bool) -> Result<(), WorldError> {
        self.check_live(entity)?;
        self.meta[entity.index() as usize].enabled = enabled;
        Ok(())
    }

    /// All live entities in ascending index order.
    #[must_use]
    pub fn live_entities(&self) -> Vec<Entity> {
        let mut out: Vec<Entity> = self
            .archetypes
            .iter()
            .flat_map(|a| a.entities().iter().copied())
            .collect();
        out.sort_unstable();
        out
    }

    /// Number of entity slots ever allocated (snapshot `entityIdCounter`).
    #[must_use]
    pub fn entity_slot_count(&self) -> usize {
        self.allocator.slot_count()
    }

    // ------------------------------------------------------------------
    // Components
    // ------------------------------------------------------------------

    /// Adds (or overwrites) a component on a live entity.
    ///
    /// A net-new component migrates the entity to the adjacent archetype and
    /// emits an `Added` event; overwriting an existing component of the same
    /// type replaces the value in place, runs the `reset` hook, and emits
    /// nothing.
    pub fn add_component<T: Component>(
        &mut self,
        entity: Entity,
        value: T,
    ) -> Result<(), WorldError> {
        let id = self.registry.register::<T>()?;
        self.add_component_boxed(entity, id, Box::new(value))
    }

    /// Type-erased insert used by command buffers and snapshot load.
    pub fn add_component_boxed(
        &mut self,
        entity: Entity,
        id: ComponentTypeId,
        value: Box<dyn Any + Send + Sync>,
    ) -> Result<(), WorldError> {
        self.guard_structural()?;
        self.check_live(entity)?;
        if self.registry.info(id).is_none() {
            return Err(WorldError::UnknownTypeId(id));
        }

        let meta = self.meta[entity.index() as usize];
        let src_id = meta.archetype as usize;
        let row = meta.row as usize;

        if self.archetypes[src_id].signature().contains(id) {
            // Overwrite in place: reset hook, no event, no migration.
            let column = self.archetypes[src_id]
                .column_mut(id)
                .ok_or(WorldError::InvariantViolation("signature/column mismatch"))?;
            column.replace_boxed(row, value)?;
            let Self {
                registry,
                archetypes,
                ..
            } = self;
            if let Some(hook) = registry.info(id).and_then(|i| i.hooks.reset.as_ref()) {
                let column = archetypes[src_id]
                    .column_mut(id)
                    .ok_or(WorldError::InvariantViolation("signature/column mismatch"))?;
                if let Some(slot) = column.row_any_mut(row) {
                    hook(entity, slot);
                }
            }
            return Ok(());
        }

        // Migrate to the archetype whose signature adds exactly this bit.
        let dst = self.adjacent_add(ArchetypeId(meta.archetype), id)?;
        self.migrate(entity, dst, Some((id, value)), None)?;

        let name = self
            .registry
            .info(id)
            .ok_or(WorldError::UnknownTypeId(id))?
            .name;
        self.added.push(AddedEvent {
            entity,
            type_id: id,
            name,
        });
        if let Some(hook) = self
            .registry
            .info(id)
            .and_then(|i| i.hooks.on_added.as_ref())
        {
            let meta = self.meta[entity.index() as usize];
            let column = self.archetypes[meta.archetype as usize]
                .column_mut(id)
                .ok_or(WorldError::InvariantViolation("missing column after insert"))?;
            if let Some(slot) = column.row_any_mut(meta.row as usize) {
                hook(entity, slot);
            }
        }
        Ok(())
    }

    /// Removes a component. Removing a type the entity does not have is a
    /// no-op (`Ok(false)`, no event). On removal the prior value travels in
    /// the `Removed` event.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Result<bool, WorldError> {
        let Some(id) = self.registry.id_of::<T>() else {
            return Ok(false);
        };
        self.remove_component_by_id(entity, id)
    }

    /// Type-erased removal used by command buffers.
    pub fn remove_component_by_id(
        &mut self,
        entity: Entity,
        id: ComponentTypeId,
    ) -> Result<bool, WorldError> {
        self.guard_structural()?;
        self.check_live(entity)?;
        let meta = self.meta[entity.index() as usize];
        if !self.archetypes[meta.archetype as usize].signature().contains(id) {
            return Ok(false);
        }
        let dst = self.adjacent_remove(ArchetypeId(meta.archetype), id)?;
        let removed = self.migrate(entity, dst, None, Some(id))?;
        let name = self
            .registry
            .info(id)
            .ok_or(WorldError::UnknownTypeId(id))?
            .name;
        if let Some(mut value) = removed {
            if let Some(hook) = self
                .registry
                .info(id)
                .and_then(|i| i.hooks.on_removed.as_ref())
            {
                hook(entity, value.as_mut());
            }
            self.removed.push(RemovedEvent {
                entity,
                type_id: id,
                name,
                value,
            });
        }
        Ok(true)
    }

    /// Borrows a component.
    #[must_use]
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        if !self.allocator.is_live(entity) {
            return None;
        }
        let id = self.registry.id_of::<T>()?;
        let meta = self.meta[entity.index() as usize];
        let column = self.archetypes[meta.archetype as usize].column(id)?;
        column
            .as_any()
            .downcast_ref::<VecColumn<T>>()?
            .data
            .get(meta.row as usize)
    }

    /// Mutably borrows a component.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        if !self.allocator.is_live(entity) {
            return None;
        }
        let id = self.registry.id_of::<T>()?;
        let meta = self.meta[entity.index() as usize];
        let column = self.archetypes[meta.archetype as usize].column_mut(id)?;
        column
            .as_any_mut()
            .downcast_mut::<VecColumn<T>>()?
            .data
            .get_mut(meta.row as usize)
    }

    /// Borrows a component, failing upward when absent.
    pub fn get_required<T: Component>(&self, entity: Entity) -> Result<&T, WorldError> {
        self.get::<T>(entity)
            .ok_or(WorldError::ComponentNotFound {
                entity,
                name: T::NAME,
            })
    }

    /// Returns `true` when the live entity has the component.
    #[must_use]
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.get::<T>(entity).is_some()
    }

    /// Dense ids of every component on the entity, ascending.
    #[must_use]
    pub fn component_ids_of(&self, entity: Entity) -> Vec<ComponentTypeId> {
        if !self.allocator.is_live(entity) {
            return Vec::new();
        }
        let meta = self.meta[entity.index() as usize];
        self.archetypes[meta.archetype as usize]
            .signature()
            .iter()
            .collect()
    }

    // ------------------------------------------------------------------
    // Resources
    // ------------------------------------------------------------------

    /// Inserts or atomically replaces a singleton resource.
    pub fn insert_resource<R: Send + Sync + 'static>(&mut self, resource: R) {
        self.resources.insert(TypeId::of::<R>(), Box::new(resource));
    }

    /// Borrows a resource.
    #[must_use]
    pub fn resource<R: Send + Sync + 'static>(&self) -> Option<&R> {
        self.resources
            .get(&TypeId::of::<R>())
            .and_then(|b| b.downcast_ref::<R>())
    }

    /// Mutably borrows a resource.
    pub fn resource_mut<R: Send + Sync + 'static>(&mut self) -> Option<&mut R> {
        self.resources
            .get_mut(&TypeId::of::<R>())
            .and_then(|b| b.downcast_mut::<R>())
    }

    /// Removes a resource, returning it.
    pub fn remove_resource<R: Send + Sync + 'static>(&mut self) -> Option<R> {
        self.resources
            .remove(&TypeId::of::<R>())
            .and_then(|b| b.downcast::<R>().ok())
            .map(|b| *b)
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// The `Added` structural-change channel.
    pub fn added_events_mut(&mut self) -> &mut EventChannel<AddedEvent> {
        &mut self.added
    }

    /// The `Removed` structural-change channel.
    pub fn removed_events_mut(&mut self) -> &mut EventChannel<RemovedEvent> {
        &mut self.removed
    }

    /// Read-only view of the `Added` channel.
    #[must_use]
    pub fn added_events(&self) -> &EventChannel<AddedEvent> {
        &self.added
    }

    /// Read-only view of the `Removed` channel.
    #[must_use]
    pub fn removed_events(&self) -> &EventChannel<RemovedEvent> {
        &self.removed
    }

    // ------------------------------------------------------------------
    // Archetype access (query engine)
    // ------------------------------------------------------------------

    /// Archetypes in stable creation order.
    #[must_use]
    pub fn archetypes(&self) -> &[Archetype] {
        &self.archetypes
    }

    /// Marks the start of a query iteration (structural guard).
    pub(crate) fn enter_iteration(&self) {
        self.iteration_depth.set(self.iteration_depth.get() + 1);
    }

    /// Marks the end of a query iteration.
    pub(crate) fn exit_iteration(&self) {
        self.iteration_depth
            .set(self.iteration_depth.get().saturating_sub(1));
    }

    // ------------------------------------------------------------------
    // Snapshot support
    // ------------------------------------------------------------------

    /// Encodes one component on one entity through its registered codec.
    ///
    /// `None` when the entity lacks the component or no codec is registered.
    pub fn encode_component(
        &self,
        entity: Entity,
        id: ComponentTypeId,
    ) -> Option<Result<ciborium::value::Value, CodecError>> {
        if !self.allocator.is_live(entity) {
            return None;
        }
        let codec = self.registry.info(id)?.codec()?;
        let meta = self.meta[entity.index() as usize];
        let column = self.archetypes[meta.archetype as usize].column(id)?;
        let value = column.row_any(meta.row as usize)?;
        Some((codec.encode)(value))
    }

    /// Clears all entities and archetype rows, keeping registered types and
    /// resources. Used by snapshot load before restoring serialized state.
    pub fn reset_entities(&mut self, slot_count: usize) {
        self.allocator.reset_to(slot_count);
        self.meta.clear();
        self.meta.resize(slot_count, EntityMeta::default());
        let empty = Archetype::new(Signature::EMPTY, Vec::new());
        self.archetypes = vec![empty];
        self.archetype_index.clear();
        self.archetype_index.insert(Signature::EMPTY, ArchetypeId(0));
        self.added.clear();
        self.removed.clear();
    }

    /// Revives a specific handle (index + generation) as a live, empty,
    /// enabled entity. Snapshot load only.
    pub fn spawn_at(&mut self, entity: Entity) {
        self.allocator.revive_at(entity);
        let index = entity.index() as usize;
        if index >= self.meta.len() {
            self.meta.resize(index + 1, EntityMeta::default());
        }
        let row = self.archetypes[0].push_entity(entity);
        self.meta[index] = EntityMeta {
            archetype: 0,
            row: truncate_row(row),
            enabled: true,
        };
    }

    /// Registers a schema by component name (snapshot tooling convenience).
    pub fn schema_of(&self, id: ComponentTypeId) -> Option<&Schema> {
        self.registry.info(id)?.schema.as_ref()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn guard_structural(&self) -> Result<(), WorldError> {
        if self.iteration_depth.get() > 0 {
            return Err(WorldError::IterationActive);
        }
        Ok(())
    }

    fn check_live(&self, entity: Entity) -> Result<(), WorldError> {
        if self.allocator.is_live(entity) {
            return Ok(());
        }
        if (entity.index() as usize) < self.allocator.slot_count() {
            Err(WorldError::DeadEntity(entity))
        } else {
            Err(WorldError::EntityNotFound(entity))
        }
    }

    /// Destination archetype when adding `id`, through the edge cache.
    fn adjacent_add(
        &mut self,
        from: ArchetypeId,
        id: ComponentTypeId,
    ) -> Result<ArchetypeId, WorldError> {
        if let Some(&dst) = self.archetypes[from.0 as usize].edges_add.get(&id) {
            return Ok(dst);
        }
        let signature = self.archetypes[from.0 as usize].signature().with(id);
        let dst = self.archetype_for(signature)?;
        self.archetypes[from.0 as usize].edges_add.insert(id, dst);
        Ok(dst)
    }

    /// Destination archetype when removing `id`, through the edge cache.
    fn adjacent_remove(
        &mut self,
        from: ArchetypeId,
        id: ComponentTypeId,
    ) -> Result<ArchetypeId, WorldError> {
        if let Some(&dst) = self.archetypes[from.0 as usize].edges_remove.get(&id) {
            return Ok(dst);
        }
        let signature = self.archetypes[from.0 as usize].signature().without(id);
        let dst = self.archetype_for(signature)?;
        self.archetypes[from.0 as usize].edges_remove.insert(id, dst);
        Ok(dst)
    }

    /// Finds or creates the archetype for `signature`.
    fn archetype_for(&mut self, signature: Signature) -> Result<ArchetypeId, WorldError> {
        if let Some(&id) = self.archetype_index.get(&signature) {
            return Ok(id);
        }
        let mut columns = Vec::with_capacity(signature.len());
        for type_id in signature.iter() {
            let info = self
                .registry
                .info(type_id)
                .ok_or(WorldError::UnknownTypeId(type_id))?;
            columns.push((type_id, (info.new_column)()));
        }
        #[allow(clippy::cast_possible_truncation)]
        let id = ArchetypeId(self.archetypes.len() as u32);
        self.archetypes.push(Archetype::new(signature, columns));
        self.archetype_index.insert(signature, id);
        Ok(id)
    }

    /// Moves `entity` to archetype `dst`, optionally inserting one new
    /// component value and/or extracting one removed component value.
    fn migrate(
        &mut self,
        entity: Entity,
        dst: ArchetypeId,
        insert: Option<(ComponentTypeId, Box<dyn Any + Send + Sync>)>,
        extract: Option<ComponentTypeId>,
    ) -> Result<Option<Box<dyn Any + Send + Sync>>, WorldError> {
        let meta = self.meta[entity.index() as usize];
        let src = ArchetypeId(meta.archetype);
        let row = meta.row as usize;
        debug_assert_ne!(src, dst, "migration to the same archetype");

        let (src_arch, dst_arch) = pair_mut(&mut self.archetypes, src.0 as usize, dst.0 as usize);
        let mut extracted = None;

        for (id, column) in src_arch.columns_mut() {
            if extract == Some(id) {
                extracted = Some(column.swap_remove_boxed(row));
            } else if let Some(dst_col) = dst_arch.column_mut(id) {
                column.transfer(row, dst_col.as_mut())?;
            } else {
                // Type not present in destination and not the extract target:
                // structurally impossible for single-bit migrations.
                return Err(WorldError::InvariantViolation("migration dropped a column"));
            }
        }
        if let Some((id, value)) = insert {
            let dst_col = dst_arch
                .column_mut(id)
                .ok_or(WorldError::InvariantViolation("destination missing new column"))?;
            dst_col.push_boxed(value)?;
        }

        let new_row = dst_arch.push_entity(entity);
        if let Some(moved) = src_arch.swap_remove_entity(row) {
            self.meta[moved.index() as usize].row = meta.row;
        }
        src_arch.debug_validate();
        dst_arch.debug_validate();
        self.meta[entity.index() as usize] = EntityMeta {
            archetype: dst.0,
            row: truncate_row(new_row),
            enabled: meta.enabled,
        };
        Ok(extracted)
    }
}

/// Row indices are stored as `u32`; the table cannot exceed that.
#[allow(clippy::cast_possible_truncation)]
fn truncate_row(row: usize) -> u32 {
    row as u32
}

/// Disjoint mutable borrows of two archetypes.
fn pair_mut(v: &mut [Archetype], a: usize, b: usize) -> (&mut Archetype, &mut Archetype) {
    debug_assert_ne!(a, b);
    if a < b {
        let (left, right) = v.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = v.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}
