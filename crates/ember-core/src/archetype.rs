// SPDX-License-Identifier: Apache-2.0
//! Archetypes: column-oriented storage for entities sharing a signature.
//!
//! Each archetype stores one contiguous column per component type, indexed by
//! row. Row removal is swap-remove; the caller fixes up the entity table for
//! whichever entity got moved into the hole. Adjacency edges cache the
//! destination archetype when a single type is added or removed, so repeated
//! migrations skip the signature lookup.

use rustc_hash::FxHashMap;

use crate::column::AnyColumn;
use crate::component::ComponentTypeId;
use crate::entity::Entity;
use crate::signature::Signature;

/// Index of an archetype in the world's archetype table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArchetypeId(pub(crate) u32);

impl ArchetypeId {
    /// Raw table index.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Storage for all entities sharing one component signature.
pub struct Archetype {
    signature: Signature,
    entities: Vec<Entity>,
    /// Columns sorted by component type id for deterministic iteration.
    columns: Vec<(ComponentTypeId, Box<dyn AnyColumn>)>,
    pub(crate) edges_add: FxHashMap<ComponentTypeId, ArchetypeId>,
    pub(crate) edges_remove: FxHashMap<ComponentTypeId, ArchetypeId>,
}

impl Archetype {
    pub(crate) fn new(
        signature: Signature,
        columns: Vec<(ComponentTypeId, Box<dyn AnyColumn>)>,
    ) -> Self {
        debug_assert!(
            columns.windows(2).all(|w| w[0].0 < w[1].0),
            "columns must be sorted by type id"
        );
        Self {
            signature,
            entities: Vec::new(),
            columns,
            edges_add: FxHashMap::default(),
            edges_remove: FxHashMap::default(),
        }
    }

    /// The signature bitset identifying this archetype.
    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Entities stored here, in row order.
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` when no rows are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub(crate) fn column(&self, id: ComponentTypeId) -> Option<&dyn AnyColumn> {
        self.columns
            .binary_search_by_key(&id, |(cid, _)| *cid)
            .ok()
            .map(|i| self.columns[i].1.as_ref())
    }

    pub(crate) fn column_mut(&mut self, id: ComponentTypeId) -> Option<&mut Box<dyn AnyColumn>> {
        self.columns
            .binary_search_by_key(&id, |(cid, _)| *cid)
            .ok()
            .map(|i| &mut self.columns[i].1)
    }

    pub(crate) fn column_ids(&self) -> impl Iterator<Item = ComponentTypeId> + '_ {
        self.columns.iter().map(|(id, _)| *id)
    }

    /// Registers `entity` as the next row. Columns must be pushed separately
    /// by the caller, keeping every column's length equal to the row count.
    pub(crate) fn push_entity(&mut self, entity: Entity) -> usize {
        self.entities.push(entity);
        self.entities.len() - 1
    }

    /// Swap-removes the entity record at `row`.
    ///
    /// Returns the entity that was moved into `row` (the former last row), if
    /// any; the caller must update its table entry.
    pub(crate) fn swap_remove_entity(&mut self, row: usize) -> Option<Entity> {
        self.entities.swap_remove(row);
        self.entities.get(row).copied()
    }

    /// Splits borrow: all columns mutably plus the entity list.
    pub(crate) fn columns_mut(
        &mut self,
    ) -> impl Iterator<Item = (ComponentTypeId, &mut Box<dyn AnyColumn>)> {
        self.columns.iter_mut().map(|(id, col)| (*id, col))
    }

    /// Debug invariant: every column holds exactly one row per entity.
    pub(crate) fn debug_validate(&self) {
        debug_assert!(
            self.columns.iter().all(|(_, c)| c.len() == self.entities.len()),
            "column/entity row count mismatch in archetype {:?}",
            self.signature
        );
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::float_cmp)]

    use super::*;
    use crate::column::VecColumn;

    fn id(raw: u16) -> ComponentTypeId {
        ComponentTypeId::new(raw)
    }

    fn entity(index: u32) -> Entity {
        Entity::from_parts(index, 0)
    }

    #[test]
    fn swap_remove_reports_moved_entity() {
        let mut arch = Archetype::new(Signature::EMPTY, Vec::new());
        arch.push_entity(entity(0));
        arch.push_entity(entity(1));
        arch.push_entity(entity(2));

        let moved = arch.swap_remove_entity(0);
        assert_eq!(moved, Some(entity(2)), "last row fills the hole");
        assert_eq!(arch.entities(), &[entity(2), entity(1)]);

        let moved = arch.swap_remove_entity(1);
        assert_eq!(moved, None, "removing the last row moves nothing");
    }

    #[test]
    fn column_lookup_is_by_type_id() {
        let columns: Vec<(ComponentTypeId, Box<dyn AnyColumn>)> = vec![
            (id(1), Box::new(VecColumn::<u32>::default())),
            (id(4), Box::new(VecColumn::<i64>::default())),
        ];
        let arch = Archetype::new(Signature::EMPTY.with(id(1)).with(id(4)), columns);
        assert!(arch.column(id(1)).is_some());
        assert!(arch.column(id(4)).is_some());
        assert!(arch.column(id(2)).is_none());
    }
}
