// SPDX-License-Identifier: Apache-2.0
//! Fixed-width bitset signatures over component type ids.
//!
//! Bit `k` of a signature is set iff the owner holds component type id `k`.
//! The width is fixed at [`MAX_COMPONENT_TYPES`] bits so signatures are
//! `Copy`, hashable, and comparable without allocation.

use crate::component::ComponentTypeId;

/// Maximum number of distinct component types a world can register.
pub const MAX_COMPONENT_TYPES: usize = 256;

const WORDS: usize = MAX_COMPONENT_TYPES / 64;

/// Fixed-width component-membership bitset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signature([u64; WORDS]);

impl Signature {
    /// The empty signature (no components).
    pub const EMPTY: Self = Self([0; WORDS]);

    /// Returns `true` when bit `id` is set.
    #[must_use]
    pub fn contains(&self, id: ComponentTypeId) -> bool {
        let (word, bit) = split(id);
        self.0[word] & (1 << bit) != 0
    }

    /// Returns a copy with bit `id` set.
    #[must_use]
    pub fn with(mut self, id: ComponentTypeId) -> Self {
        let (word, bit) = split(id);
        self.0[word] |= 1 << bit;
        self
    }

    /// Returns a copy with bit `id` cleared.
    #[must_use]
    pub fn without(mut self, id: ComponentTypeId) -> Self {
        let (word, bit) = split(id);
        self.0[word] &= !(1 << bit);
        self
    }

    /// Returns `true` when every bit of `required` is set in `self`.
    #[must_use]
    pub fn is_superset_of(&self, required: &Self) -> bool {
        self.0
            .iter()
            .zip(required.0.iter())
            .all(|(a, r)| a & r == *r)
    }

    /// Returns `true` when `self` and `other` share any bit.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.0.iter().zip(other.0.iter()).any(|(a, b)| a & b != 0)
    }

    /// Returns `true` when no bit is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|w| *w == 0)
    }

    /// Number of set bits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterates the set type ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = ComponentTypeId> + '_ {
        self.0.iter().enumerate().flat_map(|(word, bits)| {
            (0..64).filter_map(move |bit| {
                if bits & (1 << bit) != 0 {
                    #[allow(clippy::cast_possible_truncation)]
                    let raw = (word * 64 + bit) as u16;
                    Some(ComponentTypeId::new(raw))
                } else {
                    None
                }
            })
        })
    }
}

fn split(id: ComponentTypeId) -> (usize, u32) {
    let raw = usize::from(id.raw());
    debug_assert!(raw < MAX_COMPONENT_TYPES, "type id out of signature range");
    (raw / 64, (raw % 64) as u32)
}
