// SPDX-License-Identifier: Apache-2.0
//! Query matching and iteration.
//!
//! A query is a tuple of required types, excluded types, optional types, and
//! tag predicates. Matching runs against the archetype index: an archetype
//! with signature `A` matches required bitset `R` and excluded bitset `X`
//! iff `(A & R) == R` and `(A & X) == 0`. Iteration walks matching
//! archetypes in their stable creation order, then rows in row order, so
//! results are a deterministic function of world history.

use std::fmt;

use crate::component::{Component, ComponentRegistry, ComponentTypeId};
use crate::entity::Entity;
use crate::error::WorldError;
use crate::signature::Signature;
use crate::world::World;

/// Resolves a Rust component type to its dense id at execution time.
type TypeResolver = fn(&ComponentRegistry) -> Option<ComponentTypeId>;

enum Term {
    Require(TypeResolver),
    Exclude(TypeResolver),
    Optional(TypeResolver),
    RequireId(ComponentTypeId),
    ExcludeId(ComponentTypeId),
}

/// Tag predicate evaluated per entity after signature matching.
pub type EntityPredicate = fn(&World, Entity) -> bool;

/// A reusable query description.
///
/// Type terms resolve lazily against the registry, so a query can be built
/// before the types it names are registered; an unregistered required type
/// simply matches nothing.
#[derive(Default)]
pub struct Query {
    terms: Vec<Term>,
    only_enabled: bool,
    predicate: Option<EntityPredicate>,
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("terms", &self.terms.len())
            .field("only_enabled", &self.only_enabled)
            .finish_non_exhaustive()
    }
}

impl Query {
    /// An empty query (matches every entity).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires component `T`.
    #[must_use]
    pub fn require<T: Component>(mut self) -> Self {
        self.terms.push(Term::Require(|reg| reg.id_of::<T>()));
        self
    }

    /// Excludes entities holding component `T`.
    #[must_use]
    pub fn exclude<T: Component>(mut self) -> Self {
        self.terms.push(Term::Exclude(|reg| reg.id_of::<T>()));
        self
    }

    /// Marks component `T` as optional (declarative; does not affect
    /// matching, but records access intent for scheduling metadata).
    #[must_use]
    pub fn optional<T: Component>(mut self) -> Self {
        self.terms.push(Term::Optional(|reg| reg.id_of::<T>()));
        self
    }

    /// Requires a component by dense id (dynamic callers).
    #[must_use]
    pub fn require_id(mut self, id: ComponentTypeId) -> Self {
        self.terms.push(Term::RequireId(id));
        self
    }

    /// Excludes a component by dense id (dynamic callers).
    #[must_use]
    pub fn exclude_id(mut self, id: ComponentTypeId) -> Self {
        self.terms.push(Term::ExcludeId(id));
        self
    }

    /// Restricts matches to enabled entities.
    #[must_use]
    pub fn enabled_only(mut self) -> Self {
        self.only_enabled = true;
        self
    }

    /// Installs a per-entity tag predicate.
    #[must_use]
    pub fn filter(mut self, predicate: EntityPredicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Resolves the bitsets against a registry.
    ///
    /// Returns `None` when a required type is unregistered, in which case
    /// the query matches nothing.
    fn resolve(&self, registry: &ComponentRegistry) -> Option<(Signature, Signature)> {
        let mut required = Signature::EMPTY;
        let mut excluded = Signature::EMPTY;
        for term in &self.terms {
            match term {
                Term::Require(resolver) => required = required.with(resolver(registry)?),
                Term::RequireId(id) => required = required.with(*id),
                Term::Exclude(resolver) => {
                    if let Some(id) = resolver(registry) {
                        excluded = excluded.with(id);
                    }
                }
                Term::ExcludeId(id) => excluded = excluded.with(*id),
                // Optional terms never affect matching.
                Term::Optional(resolver) => {
                    let _ = resolver(registry);
                }
            }
        }
        Some((required, excluded))
    }
}

impl World {
    /// Collects every matching entity in deterministic order: archetypes in
    /// creation order, rows in row order.
    #[must_use]
    pub fn query_entities(&self, query: &Query) -> Vec<Entity> {
        let Some((required, excluded)) = query.resolve(self.registry()) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for archetype in self.archetypes() {
            let signature = archetype.signature();
            if !signature.is_superset_of(&required) || signature.intersects(&excluded) {
                continue;
            }
            for &entity in archetype.entities() {
                if query.only_enabled && !self.is_enabled(entity) {
                    continue;
                }
                if let Some(predicate) = query.predicate {
                    if !predicate(self, entity) {
                        continue;
                    }
                }
                out.push(entity);
            }
        }
        out
    }

    /// Iterates matching entities under the structural-change guard.
    ///
    /// While the closure runs, direct structural mutation through a shared
    /// alias is rejected with [`WorldError::IterationActive`]; deferred edits
    /// belong in a command buffer.
    pub fn for_each_entity(&self, query: &Query, mut f: impl FnMut(Entity)) {
        self.enter_iteration();
        let entities = self.query_entities(query);
        for entity in entities {
            f(entity);
        }
        self.exit_iteration();
    }

    /// Counts matching entities.
    #[must_use]
    pub fn count_entities(&self, query: &Query) -> usize {
        self.query_entities(query).len()
    }

    /// Resolves a query and reports whether a specific entity matches it.
    pub fn entity_matches(&self, query: &Query, entity: Entity) -> Result<bool, WorldError> {
        if !self.is_alive(entity) {
            return Ok(false);
        }
        let Some((required, excluded)) = query.resolve(self.registry()) else {
            return Ok(false);
        };
        let ids = self.component_ids_of(entity);
        let mut signature = Signature::EMPTY;
        for id in ids {
            signature = signature.with(id);
        }
        Ok(signature.is_superset_of(&required) && !signature.intersects(&excluded))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::float_cmp)]

    use super::*;

    struct A;
    impl Component for A {
        const NAME: &'static str = "A";
    }
    struct B;
    impl Component for B {
        const NAME: &'static str = "B";
    }
    struct C;
    impl Component for C {
        const NAME: &'static str = "C";
    }

    fn world_with_mix() -> (World, Vec<Entity>) {
        let mut world = World::new();
        let mut entities = Vec::new();
        for i in 0..6 {
            let e = world.spawn();
            if i % 2 == 0 {
                world.add_component(e, A).unwrap();
            }
            if i % 3 == 0 {
                world.add_component(e, B).unwrap();
            }
            entities.push(e);
        }
        (world, entities)
    }

    #[test]
    fn require_and_exclude_follow_bitset_semantics() {
        let (world, e) = world_with_mix();
        let with_a = world.query_entities(&Query::new().require::<A>());
        assert_eq!(with_a, vec![e[0], e[2], e[4]]);

        let a_not_b = world.query_entities(&Query::new().require::<A>().exclude::<B>());
        assert_eq!(a_not_b, vec![e[2], e[4]]);

        let a_and_b = world.query_entities(&Query::new().require::<A>().require::<B>());
        assert_eq!(a_and_b, vec![e[0]]);
    }

    #[test]
    fn unregistered_required_type_matches_nothing() {
        let (world, _) = world_with_mix();
        assert!(world.query_entities(&Query::new().require::<C>()).is_empty());
    }

    #[test]
    fn disabled_entities_are_filtered_when_requested() {
        let (mut world, e) = world_with_mix();
        world.set_enabled(e[0], false).unwrap();
        let enabled_a = world.query_entities(&Query::new().require::<A>().enabled_only());
        assert_eq!(enabled_a, vec![e[2], e[4]]);
        // Without the flag, disabled entities still match.
        let all_a = world.query_entities(&Query::new().require::<A>());
        assert_eq!(all_a.len(), 3);
    }

    #[test]
    fn order_is_stable_across_identical_worlds() {
        let (w1, _) = world_with_mix();
        let (w2, _) = world_with_mix();
        let q = Query::new().require::<A>();
        assert_eq!(w1.query_entities(&q), w2.query_entities(&q));
    }
}
