// SPDX-License-Identifier: Apache-2.0
//! Sweep-and-prune broadphase.
//!
//! Maintains a persistent endpoint list on the X axis. Each query pass
//! refreshes endpoint values from the current boxes and re-sorts with an
//! insertion sort, which is near-linear under temporal coherence (boxes move
//! a little between frames, so the list stays almost sorted). A plane sweep
//! over the sorted endpoints emits candidate pairs, confirmed against the Y
//! axis.
//!
//! Determinism contract:
//! - Proxy ids are opaque `u64`s supplied by the caller (entity bits).
//! - Endpoint ordering ties break on (id, min-before-max), never on memory
//!   addresses.
//! - The pair `(a, b)` is canonicalized with `a < b` and the output list is
//!   sorted ascending by `(a, b)`.

use rustc_hash::FxHashMap;

use crate::aabb::Aabb2;
use ember_math::Fx;

/// Broad-phase interface for inserting proxies and querying overlap pairs.
///
/// Implementations must return pairs deterministically: canonicalized with
/// `a < b` and sorted ascending by `(a, b)`.
pub trait BroadPhase {
    /// Inserts or updates the proxy with the given `id` and `aabb`.
    fn upsert(&mut self, id: u64, aabb: Aabb2);
    /// Removes a proxy if present.
    fn remove(&mut self, id: u64);
    /// Returns the canonical, deterministically-ordered overlap pairs.
    fn pairs(&mut self) -> Vec<(u64, u64)>;
}

#[derive(Clone, Copy, Debug)]
struct Endpoint {
    value: Fx,
    id: u64,
    is_min: bool,
}

/// Sweep-and-prune with persistent insertion-sorted endpoints on X.
#[derive(Default)]
pub struct SweepAndPrune {
    boxes: FxHashMap<u64, Aabb2>,
    endpoints: Vec<Endpoint>,
}

impl SweepAndPrune {
    /// Creates an empty broadphase.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked proxies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    /// Returns `true` when no proxies are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Tracked proxy ids in ascending order.
    #[must_use]
    pub fn tracked_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.boxes.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Refreshes endpoint values from the box table, dropping stale entries
    /// and appending endpoints for newly inserted ids.
    fn refresh_endpoints(&mut self) {
        let boxes = &self.boxes;
        self.endpoints.retain(|e| boxes.contains_key(&e.id));
        for endpoint in &mut self.endpoints {
            let bb = boxes[&endpoint.id];
            endpoint.value = if endpoint.is_min { bb.min().x } else { bb.max().x };
        }
        // Newly inserted ids have no endpoints yet.
        let mut known: FxHashMap<u64, u32> = FxHashMap::default();
        for endpoint in &self.endpoints {
            *known.entry(endpoint.id).or_insert(0) += 1;
        }
        let mut fresh: Vec<u64> = boxes
            .keys()
            .filter(|id| !known.contains_key(*id))
            .copied()
            .collect();
        fresh.sort_unstable();
        for id in fresh {
            let bb = boxes[&id];
            self.endpoints.push(Endpoint {
                value: bb.min().x,
                id,
                is_min: true,
            });
            self.endpoints.push(Endpoint {
                value: bb.max().x,
                id,
                is_min: false,
            });
        }
    }

    /// Insertion sort: near-linear when the list is already almost sorted.
    fn insertion_sort(endpoints: &mut [Endpoint]) {
        for i in 1..endpoints.len() {
            let mut j = i;
            while j > 0 && endpoint_order(&endpoints[j - 1], &endpoints[j]) == core::cmp::Ordering::Greater
            {
                endpoints.swap(j - 1, j);
                j -= 1;
            }
        }
    }
}

/// Total endpoint order: by value, then min-before-max (so touching boxes
/// open before they close and count as overlapping), then id.
fn endpoint_order(a: &Endpoint, b: &Endpoint) -> core::cmp::Ordering {
    a.value
        .cmp(&b.value)
        .then_with(|| b.is_min.cmp(&a.is_min))
        .then_with(|| a.id.cmp(&b.id))
}

impl BroadPhase for SweepAndPrune {
    fn upsert(&mut self, id: u64, aabb: Aabb2) {
        self.boxes.insert(id, aabb);
    }

    fn remove(&mut self, id: u64) {
        self.boxes.remove(&id);
    }

    fn pairs(&mut self) -> Vec<(u64, u64)> {
        self.refresh_endpoints();
        Self::insertion_sort(&mut self.endpoints);

        let mut active: Vec<u64> = Vec::new();
        let mut out: Vec<(u64, u64)> = Vec::new();
        for endpoint in &self.endpoints {
            if endpoint.is_min {
                let bb = self.boxes[&endpoint.id];
                for &other in &active {
                    // X already overlaps by sweep construction; confirm Y.
                    if self.boxes[&other].overlaps(&bb) {
                        let pair = if other < endpoint.id {
                            (other, endpoint.id)
                        } else {
                            (endpoint.id, other)
                        };
                        out.push(pair);
                    }
                }
                active.push(endpoint.id);
            } else {
                active.retain(|&id| id != endpoint.id);
            }
        }
        out.sort_unstable();
        out
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::float_cmp)]

    use super::*;
    use ember_math::Vec2Fx;

    fn fx(v: f32) -> Fx {
        Fx::from_f32(v)
    }

    fn boxed(cx: f32, cy: f32, h: f32) -> Aabb2 {
        Aabb2::from_center_half_extents(Vec2Fx::new(fx(cx), fx(cy)), fx(h), fx(h))
    }

    #[test]
    fn pair_order_is_canonical_regardless_of_insertion_order() {
        let mut bp = SweepAndPrune::new();
        bp.upsert(2, boxed(100.0, 0.0, 1.0));
        bp.upsert(1, boxed(1.0, 0.0, 1.0));
        bp.upsert(0, boxed(0.0, 0.0, 1.0));
        assert_eq!(bp.pairs(), vec![(0, 1)]);

        bp.upsert(3, boxed(0.5, 0.0, 1.0));
        assert_eq!(bp.pairs(), vec![(0, 1), (0, 3), (1, 3)]);
    }

    #[test]
    fn y_axis_separation_rejects_x_overlaps() {
        let mut bp = SweepAndPrune::new();
        bp.upsert(0, boxed(0.0, 0.0, 1.0));
        bp.upsert(1, boxed(0.5, 10.0, 1.0));
        assert!(bp.pairs().is_empty());
    }

    #[test]
    fn removal_drops_pairs_and_endpoints() {
        let mut bp = SweepAndPrune::new();
        bp.upsert(0, boxed(0.0, 0.0, 1.0));
        bp.upsert(1, boxed(1.0, 0.0, 1.0));
        assert_eq!(bp.pairs().len(), 1);
        bp.remove(1);
        assert!(bp.pairs().is_empty());
        assert_eq!(bp.len(), 1);
    }

    #[test]
    fn moving_boxes_keep_results_consistent_across_frames() {
        let mut bp = SweepAndPrune::new();
        bp.upsert(0, boxed(0.0, 0.0, 1.0));
        bp.upsert(1, boxed(5.0, 0.0, 1.0));
        assert!(bp.pairs().is_empty());
        // Slide box 1 toward box 0 over several frames.
        for step in 0..5 {
            #[allow(clippy::cast_precision_loss)]
            let cx = 5.0 - step as f32;
            bp.upsert(1, boxed(cx, 0.0, 1.0));
            let pairs = bp.pairs();
            if cx <= 2.0 {
                assert_eq!(pairs, vec![(0, 1)], "step {step}");
            } else {
                assert!(pairs.is_empty(), "step {step}");
            }
        }
    }

    #[test]
    fn touching_faces_pair_inclusively() {
        let mut bp = SweepAndPrune::new();
        bp.upsert(0, boxed(0.0, 0.0, 1.0));
        bp.upsert(1, boxed(2.0, 0.0, 1.0));
        assert_eq!(bp.pairs(), vec![(0, 1)]);
    }
}
