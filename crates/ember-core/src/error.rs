// SPDX-License-Identifier: Apache-2.0
//! Error types for the ECS runtime.
//!
//! Propagation policy:
//! - Get-style operations return `Option`; the `*_required` variants fail
//!   upward with [`WorldError::ComponentNotFound`].
//! - Mutation through a stale handle is reported as [`WorldError::DeadEntity`]
//!   (queries simply skip such handles).
//! - A scheduler cycle is fatal at build/first-tick time and names the nodes
//!   still holding in-edges.
//! - A failing system body does not stop the tick; the scheduler reports it
//!   through the telemetry sink and continues.

use thiserror::Error;

use crate::component::ComponentTypeId;
use crate::entity::Entity;

/// Errors produced by world structural and lookup operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorldError {
    /// The entity id was never allocated or has been destroyed.
    #[error("entity not found: {0:?}")]
    EntityNotFound(Entity),
    /// The handle's generation does not match the registry.
    #[error("stale entity handle: {0:?}")]
    DeadEntity(Entity),
    /// A required component was missing on a live entity.
    #[error("component {name} not present on {entity:?}")]
    ComponentNotFound {
        /// Entity that was queried.
        entity: Entity,
        /// Stable component name.
        name: &'static str,
    },
    /// A component type was used before being registered.
    #[error("component type not registered: {0}")]
    UnregisteredComponent(&'static str),
    /// The fixed-width signature cannot hold another component type.
    #[error("component type capacity exhausted ({0} types)")]
    TypeCapacityExhausted(usize),
    /// A structural change was attempted while query iteration is active.
    #[error("structural change during active iteration")]
    IterationActive,
    /// Internal invariant violated (archetype bookkeeping corruption).
    #[error("internal invariant violated: {0}")]
    InvariantViolation(&'static str),
    /// A deferred command referenced a component id unknown to the registry.
    #[error("command referenced unknown component type id {0:?}")]
    UnknownTypeId(ComponentTypeId),
}

/// Errors produced while declaring or building a schedule.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    /// Two systems were registered under the same name.
    #[error("duplicate system name: {0}")]
    DuplicateSystemName(String),
    /// An ordering constraint referenced a system or set that does not exist.
    #[error("unknown ordering target `{target}` on system `{system}`")]
    UnknownOrderingTarget {
        /// System that declared the constraint.
        system: String,
        /// The `before`/`after` name that failed to resolve.
        target: String,
    },
    /// The dependency graph contains a cycle; lists the participating nodes.
    #[error("scheduler cycle among: {}", nodes.join(", "))]
    Cycle {
        /// Names of the nodes that still hold in-edges after Kahn's algorithm.
        nodes: Vec<String>,
    },
}

/// Error returned by a system body or run-condition.
///
/// The scheduler never propagates these: a failing run-condition means "do
/// not run this tick" and a failing body is reported and skipped.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct SystemError {
    /// Human-readable description of the failure.
    pub message: String,
}

impl SystemError {
    /// Constructs a system error from any displayable message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<WorldError> for SystemError {
    fn from(err: WorldError) -> Self {
        Self::new(err.to_string())
    }
}
