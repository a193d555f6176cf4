// SPDX-License-Identifier: Apache-2.0
//! Deferred structural edits: the command buffer.
//!
//! Systems never mutate world structure mid-iteration; they record
//! `CreateEntity` / `AddComponent` / `RemoveComponent` / `Destroy` commands
//! here and the scheduler flushes them between systems according to the
//! flush policy. Flush applies commands in submission order; structural
//! events (`Added`, `Removed`) are emitted by the world as each command
//! lands, so consumers later in the frame observe them.
//!
//! Entities created through the buffer are addressable before the flush via
//! the [`PendingEntity`] token returned by [`CommandBuffer::create_entity`].

use std::any::Any;

use crate::component::{Component, ComponentTypeId};
use crate::entity::Entity;
use crate::error::WorldError;
use crate::world::World;

/// Token for an entity scheduled for creation in this buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingEntity(u32);

/// Target of a buffered command: an existing entity or a pending one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandTarget {
    /// An entity that already exists.
    Live(Entity),
    /// An entity this buffer will create on flush.
    Pending(PendingEntity),
}

impl From<Entity> for CommandTarget {
    fn from(entity: Entity) -> Self {
        Self::Live(entity)
    }
}

impl From<PendingEntity> for CommandTarget {
    fn from(pending: PendingEntity) -> Self {
        Self::Pending(pending)
    }
}

enum Command {
    Create,
    Add {
        target: CommandTarget,
        type_id: TypeIdSlot,
        value: Box<dyn Any + Send + Sync>,
    },
    Remove {
        target: CommandTarget,
        type_id: TypeIdSlot,
    },
    Destroy {
        target: CommandTarget,
    },
}

/// Component identity captured at record time.
///
/// Typed recordings resolve lazily (the type may register between record and
/// flush); dynamic recordings carry the dense id directly.
enum TypeIdSlot {
    Resolved(ComponentTypeId),
    Deferred(fn(&mut World) -> Result<ComponentTypeId, WorldError>),
}

/// Accumulates structural edits for ordered application on flush.
#[derive(Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
    pending_count: u32,
}

/// Result of a flush: entities created, in submission order.
#[derive(Debug, Default)]
pub struct FlushReport {
    /// Entities created by `CreateEntity` commands, in order.
    pub created: Vec<Entity>,
}

impl CommandBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when no commands are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Number of queued commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Schedules creation of a new entity; the token is valid as a target
    /// for later commands in this same buffer.
    pub fn create_entity(&mut self) -> PendingEntity {
        let token = PendingEntity(self.pending_count);
        self.pending_count += 1;
        self.commands.push(Command::Create);
        token
    }

    /// Schedules a component insert.
    pub fn add_component<T: Component>(&mut self, target: impl Into<CommandTarget>, value: T) {
        self.commands.push(Command::Add {
            target: target.into(),
            type_id: TypeIdSlot::Deferred(|world| world.registry_mut().register::<T>()),
            value: Box::new(value),
        });
    }

    /// Schedules a type-erased component insert by dense id.
    pub fn add_component_by_id(
        &mut self,
        target: impl Into<CommandTarget>,
        type_id: ComponentTypeId,
        value: Box<dyn Any + Send + Sync>,
    ) {
        self.commands.push(Command::Add {
            target: target.into(),
            type_id: TypeIdSlot::Resolved(type_id),
            value,
        });
    }

    /// Schedules a component removal.
    pub fn remove_component<T: Component>(&mut self, target: impl Into<CommandTarget>) {
        self.commands.push(Command::Remove {
            target: target.into(),
            type_id: TypeIdSlot::Deferred(|world| world.registry_mut().register::<T>()),
        });
    }

    /// Schedules entity destruction.
    pub fn destroy(&mut self, target: impl Into<CommandTarget>) {
        self.commands.push(Command::Destroy {
            target: target.into(),
        });
    }

    /// Discards all queued commands.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.pending_count = 0;
    }

    /// Applies all commands in submission order, then clears the buffer.
    ///
    /// Commands addressing entities that died earlier in this same flush (or
    /// whose handles went stale) are skipped: mutation through a stale handle
    /// is a no-op by contract. Other errors abort the flush and propagate;
    /// commands already applied stay applied.
    pub fn flush(&mut self, world: &mut World) -> Result<FlushReport, WorldError> {
        let mut report = FlushReport::default();
        let commands = std::mem::take(&mut self.commands);
        self.pending_count = 0;

        let result = (|| {
            for command in commands {
                match command {
                    Command::Create => {
                        report.created.push(world.spawn());
                    }
                    Command::Add {
                        target,
                        type_id,
                        value,
                    } => {
                        let Some(entity) = resolve_target(target, &report) else {
                            continue;
                        };
                        let id = resolve_type(type_id, world)?;
                        match world.add_component_boxed(entity, id, value) {
                            Ok(()) | Err(WorldError::DeadEntity(_)) => {}
                            Err(other) => return Err(other),
                        }
                    }
                    Command::Remove { target, type_id } => {
                        let Some(entity) = resolve_target(target, &report) else {
                            continue;
                        };
                        let id = resolve_type(type_id, world)?;
                        match world.remove_component_by_id(entity, id) {
                            Ok(_) | Err(WorldError::DeadEntity(_)) => {}
                            Err(other) => return Err(other),
                        }
                    }
                    Command::Destroy { target } => {
                        let Some(entity) = resolve_target(target, &report) else {
                            continue;
                        };
                        match world.despawn(entity) {
                            Ok(()) | Err(WorldError::DeadEntity(_)) => {}
                            Err(other) => return Err(other),
                        }
                    }
                }
            }
            Ok(())
        })();

        result.map(|()| report)
    }
}

fn resolve_target(target: CommandTarget, report: &FlushReport) -> Option<Entity> {
    match target {
        CommandTarget::Live(entity) => Some(entity),
        CommandTarget::Pending(PendingEntity(index)) => report.created.get(index as usize).copied(),
    }
}

fn resolve_type(slot: TypeIdSlot, world: &mut World) -> Result<ComponentTypeId, WorldError> {
    match slot {
        TypeIdSlot::Resolved(id) => {
            if world.registry().info(id).is_none() {
                return Err(WorldError::UnknownTypeId(id));
            }
            Ok(id)
        }
        TypeIdSlot::Deferred(resolve) => resolve(world),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::float_cmp)]

    use super::*;

    #[derive(Debug, PartialEq)]
    struct Tag(u32);
    impl Component for Tag {
        const NAME: &'static str = "Tag";
    }

    #[test]
    fn commands_apply_in_submission_order() {
        let mut world = World::new();
        let mut buffer = CommandBuffer::new();

        let pending = buffer.create_entity();
        buffer.add_component(pending, Tag(1));
        buffer.add_component(pending, Tag(2)); // overwrite, still ordered
        let report = buffer.flush(&mut world).unwrap();

        assert_eq!(report.created.len(), 1);
        let entity = report.created[0];
        assert_eq!(world.get::<Tag>(entity), Some(&Tag(2)));
        assert!(buffer.is_empty());
    }

    #[test]
    fn destroy_then_add_is_skipped_not_an_error() {
        let mut world = World::new();
        let entity = world.spawn();
        let mut buffer = CommandBuffer::new();
        buffer.destroy(entity);
        buffer.add_component(entity, Tag(9));
        buffer.flush(&mut world).unwrap();
        assert!(!world.is_alive(entity));
    }

    #[test]
    fn pending_tokens_only_address_this_buffer() {
        let mut world = World::new();
        let mut buffer = CommandBuffer::new();
        let pending = buffer.create_entity();
        buffer.clear();
        // Token now dangles; the add silently targets nothing.
        buffer.add_component(pending, Tag(3));
        buffer.flush(&mut world).unwrap();
        assert_eq!(world.live_entities().len(), 0);
    }

    #[test]
    fn flush_emits_added_events_for_net_new_pairs() {
        let mut world = World::new();
        let entity = world.spawn();
        let mut buffer = CommandBuffer::new();
        buffer.add_component(entity, Tag(1));
        buffer.flush(&mut world).unwrap();

        let added = world.added_events_mut().take_all();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].entity, entity);
        assert_eq!(added[0].name, "Tag");
    }
}
