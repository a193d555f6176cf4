// SPDX-License-Identifier: Apache-2.0
//! ember-core: archetype ECS runtime with a deterministic staged scheduler.
//!
//! The world owns entities, archetype column storage, resources, and the
//! structural-change channels; systems run single-threaded in stable
//! topological order and defer structural edits through command buffers.
//! Tick order depends only on system configuration, never on addresses or
//! hash iteration, so two identically configured worlds replay identically.

/// Archetype storage (column layout, swap-remove migration, edge cache).
pub mod archetype;
mod column;
/// Deferred structural edits.
pub mod command;
/// Component registration, hooks, schemas, and codecs.
pub mod component;
/// Entity handles and the generational allocator.
pub mod entity;
/// Error types and the propagation policy.
pub mod error;
/// Bounded event channels and structural-change events.
pub mod event;
/// Per-system wall-time profiling.
pub mod profiler;
/// Query matching and iteration.
pub mod query;
/// Stages, ordering, flush policies, and tick execution.
pub mod schedule;
/// Fixed-width bitset signatures.
pub mod signature;
/// Scheduler diagnostics boundary.
pub mod telemetry;
/// The world aggregate.
pub mod world;

pub use archetype::{Archetype, ArchetypeId};
pub use command::{CommandBuffer, CommandTarget, FlushReport, PendingEntity};
pub use component::{
    CodecError, Component, ComponentCodec, ComponentHooks, ComponentInfo, ComponentRegistry,
    ComponentTypeId, FieldKind, Schema, SchemaField,
};
pub use entity::Entity;
pub use error::{ScheduleError, SystemError, WorldError};
pub use event::{AddedEvent, EventChannel, RemovedEvent};
pub use profiler::{ProfileEntry, SystemProfiler};
pub use query::Query;
pub use schedule::{
    FlushPolicy, Schedule, SetConfig, Stage, SystemAccess, SystemConfig, SystemCtx, SystemOutcome,
    SystemStatus, TickError, TickReport, STAGES,
};
pub use signature::{Signature, MAX_COMPONENT_TYPES};
pub use telemetry::{NullTelemetrySink, TelemetrySink};
pub use world::World;
