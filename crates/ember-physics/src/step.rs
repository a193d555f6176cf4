// SPDX-License-Identifier: Apache-2.0
//! Per-frame step passes outside the solver: shape sync, broadphase,
//! narrowphase, integration, and sleep management.

use ember_core::{Entity, Query, World};
use ember_geom::{
    collide, Aabb2, BroadPhase, CircleWorld2D, Contact, HullWorld2D, Shape2D, WorldShape,
};
use ember_math::{Fx, Vec2Fx};
use rustc_hash::FxHashSet;

use ember_core::WorldError;

use crate::body::{Body2D, RotationCache2D};
use crate::resources::{
    Broadphase2D, BroadphasePairs, ContactCache, Contacts2D, PhysicsConfig, SolverTimeScale,
};

/// Rebuilds rotation caches and world-space shape caches for awake bodies,
/// and refreshes the swept AABB used by the broadphase.
///
/// Sleeping bodies keep their caches: their pose cannot have changed, so the
/// stale epoch is harmless and narrowphase still sees valid geometry.
pub fn sync_world_shapes(world: &mut World, dt: Fx) -> Result<(), WorldError> {
    let frame = world.frame();
    let query = Query::new().require::<Body2D>().require::<Shape2D>();
    for entity in world.query_entities(&query) {
        let Some(body) = world.get::<Body2D>(entity).copied() else {
            continue;
        };
        let needs_refresh = body.awake
            || (world.get::<CircleWorld2D>(entity).is_none()
                && world.get::<HullWorld2D>(entity).is_none());
        if !needs_refresh {
            continue;
        }
        let Some(shape) = world.get::<Shape2D>(entity).copied() else {
            continue;
        };

        let cache = world
            .get::<RotationCache2D>(entity)
            .copied()
            .filter(|c| c.angle == body.angle)
            .unwrap_or_else(|| RotationCache2D::compute(body.angle));
        world.add_component(entity, cache)?;

        let aabb = match shape {
            Shape2D::Circle {
                offset,
                radius,
                skin,
            } => {
                let circle = CircleWorld2D::compute(
                    offset,
                    radius,
                    skin,
                    body.position,
                    cache.cos,
                    cache.sin,
                    frame,
                );
                world.add_component(entity, circle)?;
                Some(circle.aabb())
            }
            Shape2D::ConvexHull {
                count,
                vertices,
                skin,
            } => {
                let hull = HullWorld2D::compute(
                    count,
                    &vertices,
                    skin,
                    body.position,
                    cache.cos,
                    cache.sin,
                    frame,
                );
                world.add_component(entity, hull)?;
                hull.aabb()
            }
        };
        if let Some(aabb) = aabb {
            // Fat bounds: cover the pose at both ends of the step so fast
            // movers still pair with what they would tunnel through.
            let swept = aabb.union(&shift(aabb, body.velocity * dt));
            world.add_component(entity, swept)?;
        }
    }
    Ok(())
}

fn shift(aabb: Aabb2, offset: Vec2Fx) -> Aabb2 {
    Aabb2::new(aabb.min() + offset, aabb.max() + offset)
}

/// Upserts every entity with bounds into the sweep-and-prune structure,
/// drops stale proxies, and publishes the canonical candidate pairs.
pub fn update_broadphase(world: &mut World) {
    let query = Query::new().require::<Aabb2>();
    let entities = world.query_entities(&query);
    let mut current: FxHashSet<u64> = FxHashSet::default();

    // Collect the (id, aabb) list first; the resource borrow would block
    // component reads.
    let mut boxes = Vec::with_capacity(entities.len());
    for entity in entities {
        if let Some(aabb) = world.get::<Aabb2>(entity) {
            boxes.push((entity.to_bits(), *aabb));
            current.insert(entity.to_bits());
        }
    }

    let Some(broadphase) = world.resource_mut::<Broadphase2D>() else {
        return;
    };
    for stale in broadphase
        .sap
        .tracked_ids()
        .into_iter()
        .filter(|id| !current.contains(id))
    {
        broadphase.sap.remove(stale);
    }
    for (bits, aabb) in boxes {
        broadphase.sap.upsert(bits, aabb);
    }
    let pairs = broadphase.sap.pairs();

    if let Some(out) = world.resource_mut::<BroadphasePairs>() {
        out.pairs = pairs;
    }
}

/// Runs narrowphase over the candidate pairs, filling `Contacts2D` for the
/// frame and carrying over last frame's accumulated impulses for contacts
/// whose feature id survived.
pub fn run_narrowphase(world: &mut World) {
    let pairs = world
        .resource::<BroadphasePairs>()
        .map(|p| p.pairs.clone())
        .unwrap_or_default();

    let mut contacts: Vec<Contact> = Vec::new();
    for (a_bits, b_bits) in pairs {
        let ea = Entity::from_bits(a_bits);
        let eb = Entity::from_bits(b_bits);
        let circle_a = world.get::<CircleWorld2D>(ea).copied();
        let hull_a = world.get::<HullWorld2D>(ea).copied();
        let circle_b = world.get::<CircleWorld2D>(eb).copied();
        let hull_b = world.get::<HullWorld2D>(eb).copied();

        let shape_a = match (&circle_a, &hull_a) {
            (Some(c), _) => WorldShape::Circle(c),
            (None, Some(h)) => WorldShape::Hull(h),
            (None, None) => continue,
        };
        let shape_b = match (&circle_b, &hull_b) {
            (Some(c), _) => WorldShape::Circle(c),
            (None, Some(h)) => WorldShape::Hull(h),
            (None, None) => continue,
        };
        collide(a_bits, shape_a, b_bits, shape_b, &mut contacts);
    }

    if let Some(cache) = world.resource::<ContactCache>() {
        for contact in &mut contacts {
            let (lo, hi) = contact.pair();
            if let Some(&(jn, jt)) = cache.impulses.get(&(lo, hi, contact.feature)) {
                contact.jn = jn;
                contact.jt = jt;
            }
        }
    }

    if let Some(out) = world.resource_mut::<Contacts2D>() {
        out.contacts = contacts;
    }
}

/// Integrates awake bodies: `p += v * (dt * scale)`, angle advances by
/// `w * (dt * scale)` modulo the 16-bit turn.
pub fn integrate(world: &mut World, dt: Fx) {
    let scale = world
        .resource::<SolverTimeScale>()
        .copied()
        .unwrap_or_default()
        .0;
    let step = dt * scale;
    for entity in world.query_entities(&Query::new().require::<Body2D>()) {
        let Some(body) = world.get_mut::<Body2D>(entity) else {
            continue;
        };
        if !body.awake {
            continue;
        }
        body.position += body.velocity * step;
        body.angle = body.angle.wrapping_add_radians(body.angular_velocity * step);
    }
}

/// Sleep/wake bookkeeping.
///
/// A dynamic body below both velocity thresholds for `time_to_sleep`
/// seconds falls asleep with its velocity zeroed; a sleeping body whose
/// velocity was pushed past `wake_bias` times the thresholds wakes and
/// clears its timer. Impulse wakes are handled inside the solver.
pub fn update_sleep(world: &mut World, dt: Fx) {
    let sleep = world
        .resource::<PhysicsConfig>()
        .copied()
        .unwrap_or_default()
        .sleep;
    for entity in world.query_entities(&Query::new().require::<Body2D>()) {
        let Some(body) = world.get_mut::<Body2D>(entity) else {
            continue;
        };
        if !body.is_dynamic() {
            continue;
        }
        if body.awake {
            let slow = body.velocity.length() < sleep.linear_threshold
                && body.angular_velocity.abs() < sleep.angular_threshold;
            if slow {
                body.sleep_timer += dt;
                if body.sleep_timer >= sleep.time_to_sleep {
                    body.awake = false;
                    body.velocity = Vec2Fx::ZERO;
                    body.angular_velocity = Fx::ZERO;
                }
            } else {
                body.sleep_timer = Fx::ZERO;
            }
        } else {
            let pushed = body.velocity.length() > sleep.wake_bias * sleep.linear_threshold
                || body.angular_velocity.abs() > sleep.wake_bias * sleep.angular_threshold;
            if pushed {
                body.awake = true;
                body.sleep_timer = Fx::ZERO;
            }
        }
    }
}
