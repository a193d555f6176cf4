// SPDX-License-Identifier: Apache-2.0
//! Continuous collision detection and the TOI mini-solve.
//!
//! Pairs with at least one fast-moving body are conservatively advanced
//! along their current velocities over the step: repeatedly measure the
//! separating distance, divide by the closing speed, and step time forward
//! until the shapes touch or the step ends. Each impact yields a
//! [`ToiEvent`]; events are stable-sorted by `t` (ties broken by a
//! frame-salted pair key), deduplicated to the earliest event per pair, and
//! fed to a mini-solve.
//!
//! The mini-solve swaps [`Contacts2D`] and [`SolverTimeScale`] (and the
//! warm-start cache and joint batches, which must not leak into or out of
//! the sub-step) with temporaries, then runs the regular material → warm
//! start → iterate → commit passes over one speculative, zero-penetration
//! contact per event with the remaining-time scale `s = (1 - t_min) + eps`.
//! Afterwards the prior resources are restored exactly (`SolverTimeScale`
//! is removed again if none was present before) and the queue is cleared.
//! The effect is "impact + friction/rebound for the remainder of the step"
//! while the discrete pipeline stays authoritative.
//!
//! Approximations, both conservative: rotation is ignored while advancing,
//! and hull/hull pairs advance as bounding circles.

use ember_core::{Entity, World};
use ember_geom::{CircleWorld2D, Contact, HullWorld2D, MAX_HULL_VERTICES};
use ember_math::{Fx, Vec2Fx};
use rustc_hash::FxHashSet;

use crate::body::Body2D;
use crate::joint::{DistanceBatch, PrismaticBatch, RevoluteBatch};
use crate::resources::{
    BroadphasePairs, ContactCache, Contacts2D, PhysicsConfig, SolverTimeScale, ToiEvent, ToiQueue,
};
use crate::solver;

/// Conservative-advancement iteration cap.
const MAX_ADVANCE_ITERS: u32 = 16;

/// Touch tolerance for the advancement loop.
const TOUCH_TOLERANCE: Fx = Fx::from_raw(328); // 0.005

/// Extra slice added to the remaining-time scale.
const REMAINDER_EPSILON: Fx = Fx::from_raw(655); // 0.01

/// Shape snapshot used while advancing a pair through the step.
#[derive(Clone, Copy, Debug)]
enum SweptShape {
    Circle {
        center: Vec2Fx,
        radius: Fx,
    },
    Hull {
        count: usize,
        vertices: [Vec2Fx; MAX_HULL_VERTICES],
        skin: Fx,
    },
}

impl SweptShape {
    fn of(world: &World, entity: Entity) -> Option<Self> {
        if let Some(circle) = world.get::<CircleWorld2D>(entity) {
            return Some(Self::Circle {
                center: circle.center,
                radius: circle.radius,
            });
        }
        world.get::<HullWorld2D>(entity).map(|hull| Self::Hull {
            count: usize::from(hull.count),
            vertices: hull.vertices,
            skin: hull.skin,
        })
    }

    fn translated(&self, offset: Vec2Fx) -> Self {
        match *self {
            Self::Circle { center, radius } => Self::Circle {
                center: center + offset,
                radius,
            },
            Self::Hull {
                count,
                mut vertices,
                skin,
            } => {
                for vertex in &mut vertices[..count] {
                    *vertex += offset;
                }
                Self::Hull {
                    count,
                    vertices,
                    skin,
                }
            }
        }
    }

    /// Center and conservative bounding radius.
    fn bounding_circle(&self) -> (Vec2Fx, Fx) {
        match *self {
            Self::Circle { center, radius } => (center, radius),
            Self::Hull {
                count,
                vertices,
                skin,
            } => {
                let mut center = Vec2Fx::ZERO;
                let inv = Fx::ONE / Fx::from_int(i32::try_from(count).unwrap_or(1));
                for vertex in &vertices[..count] {
                    center += *vertex * inv;
                }
                let mut radius = Fx::ZERO;
                for vertex in &vertices[..count] {
                    radius = radius.max((*vertex - center).length());
                }
                (center, radius + skin)
            }
        }
    }
}

/// Separating distance between two shapes, with the direction from `a`
/// toward `b` and a representative point on the near surface of `a`.
fn shape_distance(a: &SweptShape, b: &SweptShape) -> (Fx, Vec2Fx, Vec2Fx) {
    match (a, b) {
        (
            SweptShape::Circle {
                center: ca,
                radius: ra,
            },
            SweptShape::Circle {
                center: cb,
                radius: rb,
            },
        ) => circle_circle_distance(*ca, *ra, *cb, *rb),
        (
            SweptShape::Hull { .. },
            SweptShape::Circle {
                center: cb,
                radius: rb,
            },
        ) => {
            let (closest, inside) = closest_on_hull(a, *cb);
            point_circle_distance(closest, inside, *cb, *rb, hull_skin(a))
        }
        (
            SweptShape::Circle {
                center: ca,
                radius: ra,
            },
            SweptShape::Hull { .. },
        ) => {
            let (closest, inside) = closest_on_hull(b, *ca);
            let (d, n, p) = point_circle_distance(closest, inside, *ca, *ra, hull_skin(b));
            // Restate for (a, b): the direction flips, the point moves to
            // the circle surface.
            (d, -n, p + n * d.max(Fx::ZERO))
        }
        (SweptShape::Hull { .. }, SweptShape::Hull { .. }) => {
            let (ca, ra) = a.bounding_circle();
            let (cb, rb) = b.bounding_circle();
            circle_circle_distance(ca, ra, cb, rb)
        }
    }
}

fn hull_skin(shape: &SweptShape) -> Fx {
    match shape {
        SweptShape::Hull { skin, .. } => *skin,
        SweptShape::Circle { .. } => Fx::ZERO,
    }
}

fn circle_circle_distance(ca: Vec2Fx, ra: Fx, cb: Vec2Fx, rb: Fx) -> (Fx, Vec2Fx, Vec2Fx) {
    let delta = cb - ca;
    let dist = delta.length();
    let normal = if dist == Fx::ZERO {
        Vec2Fx::new(Fx::ONE, Fx::ZERO)
    } else {
        Vec2Fx::new(delta.x / dist, delta.y / dist)
    };
    (dist - ra - rb, normal, ca + normal * ra)
}

/// Closest point on a hull's boundary to `point`, and whether the point is
/// inside the hull.
fn closest_on_hull(shape: &SweptShape, point: Vec2Fx) -> (Vec2Fx, bool) {
    let SweptShape::Hull {
        count, vertices, ..
    } = shape
    else {
        return (point, false);
    };
    let n = *count;
    let mut best = vertices[0];
    let mut best_dist_sq = Fx::MAX;
    let mut inside = true;
    for i in 0..n {
        let v1 = vertices[i];
        let v2 = vertices[(i + 1) % n];
        let edge = v2 - v1;
        // CCW winding: a point left of every edge is inside.
        if edge.cross(point - v1) < Fx::ZERO {
            inside = false;
        }
        let len_sq = edge.length_sq();
        let u = (point - v1).dot(edge);
        let candidate = if u <= Fx::ZERO {
            v1
        } else if u >= len_sq {
            v2
        } else {
            v1 + edge * (u / len_sq)
        };
        let dist_sq = (point - candidate).length_sq();
        if dist_sq < best_dist_sq {
            best_dist_sq = dist_sq;
            best = candidate;
        }
    }
    (best, inside)
}

/// Distance from a hull boundary point to a circle, direction hull -> circle.
fn point_circle_distance(
    closest: Vec2Fx,
    inside: bool,
    center: Vec2Fx,
    radius: Fx,
    skin: Fx,
) -> (Fx, Vec2Fx, Vec2Fx) {
    let delta = center - closest;
    let dist = delta.length();
    let normal = if dist == Fx::ZERO {
        Vec2Fx::new(Fx::ONE, Fx::ZERO)
    } else {
        Vec2Fx::new(delta.x / dist, delta.y / dist)
    };
    let separation = if inside { -dist } else { dist };
    (separation - radius - skin, normal, closest)
}

// ----------------------------------------------------------------------
// Detection
// ----------------------------------------------------------------------

/// Scans broadphase pairs for fast movers and appends TOI events.
pub fn detect(world: &mut World, dt: Fx) {
    let threshold = world
        .resource::<PhysicsConfig>()
        .copied()
        .unwrap_or_default()
        .ccd_velocity_threshold;
    let pairs = world
        .resource::<BroadphasePairs>()
        .map(|p| p.pairs.clone())
        .unwrap_or_default();

    let mut events = Vec::new();
    for (a_bits, b_bits) in pairs {
        let ea = Entity::from_bits(a_bits);
        let eb = Entity::from_bits(b_bits);
        let (Some(body_a), Some(body_b)) = (world.get::<Body2D>(ea), world.get::<Body2D>(eb))
        else {
            continue;
        };
        let fast_a = body_a.awake && body_a.velocity.length() > threshold;
        let fast_b = body_b.awake && body_b.velocity.length() > threshold;
        if !fast_a && !fast_b {
            continue;
        }
        let (Some(shape_a), Some(shape_b)) = (SweptShape::of(world, ea), SweptShape::of(world, eb))
        else {
            continue;
        };
        if let Some(event) = advance_pair(
            ea,
            eb,
            &shape_a,
            &shape_b,
            body_a.velocity,
            body_b.velocity,
            dt,
        ) {
            events.push(event);
        }
    }

    if let Some(queue) = world.resource_mut::<ToiQueue>() {
        queue.events.extend(events);
    }
}

/// Conservative advancement over one step; `None` when no impact occurs in
/// `(0, 1]`.
fn advance_pair(
    ea: Entity,
    eb: Entity,
    shape_a: &SweptShape,
    shape_b: &SweptShape,
    va: Vec2Fx,
    vb: Vec2Fx,
    dt: Fx,
) -> Option<ToiEvent> {
    let mut t = Fx::ZERO;
    for _ in 0..MAX_ADVANCE_ITERS {
        let at = shape_a.translated(va * (dt * t));
        let bt = shape_b.translated(vb * (dt * t));
        let (distance, normal, point) = shape_distance(&at, &bt);
        if distance <= TOUCH_TOLERANCE {
            // Already touching at t == 0 is the discrete pipeline's case.
            if t == Fx::ZERO {
                return None;
            }
            return Some(ToiEvent {
                a: ea,
                b: eb,
                t,
                normal,
                point,
            });
        }
        let closing = -((vb - va).dot(normal));
        if closing <= Fx::ZERO {
            return None;
        }
        // Time (as a step fraction) to close the gap at the bound speed.
        let advance = distance / closing / dt;
        t = t + advance.max(Fx::EPSILON);
        if t >= Fx::ONE {
            return None;
        }
    }
    None
}

// ----------------------------------------------------------------------
// Sort and dedup
// ----------------------------------------------------------------------

/// Mixes an unordered pair with the world frame into a deterministic
/// tie-break key.
fn pair_salt(lo: u64, hi: u64, frame: u64) -> u64 {
    let mut x = lo
        ^ hi.rotate_left(32)
        ^ frame.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    // splitmix64 finalizer.
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

/// Stable-sorts the queue by `t` (frame-salted pair key as tie-break) and
/// keeps only the first event per unordered pair.
pub fn sort_dedup(world: &mut World) {
    let frame = world.frame();
    let Some(queue) = world.resource_mut::<ToiQueue>() else {
        return;
    };
    queue.events.sort_by(|x, y| {
        let (xl, xh) = canonical(x);
        let (yl, yh) = canonical(y);
        x.t.cmp(&y.t)
            .then_with(|| pair_salt(xl, xh, frame).cmp(&pair_salt(yl, yh, frame)))
    });
    let mut seen: FxHashSet<(u64, u64)> = FxHashSet::default();
    queue.events.retain(|event| seen.insert(canonical(event)));
}

fn canonical(event: &ToiEvent) -> (u64, u64) {
    let (a, b) = (event.a.to_bits(), event.b.to_bits());
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

// ----------------------------------------------------------------------
// Mini-solve
// ----------------------------------------------------------------------

/// Runs the solver passes over the TOI contacts with the remaining-time
/// scale, then restores the live resources exactly and clears the queue.
pub fn mini_solve(world: &mut World, dt: Fx) {
    let events = match world.resource_mut::<ToiQueue>() {
        Some(queue) if !queue.events.is_empty() => std::mem::take(&mut queue.events),
        _ => return,
    };

    let t_min = events[0].t;
    let scale = (Fx::ONE - t_min) + REMAINDER_EPSILON;

    let toi_contacts: Vec<Contact> = events
        .iter()
        .map(|event| {
            let mut contact = Contact::new(
                event.a.to_bits(),
                event.b.to_bits(),
                event.normal,
                event.point,
                Fx::ZERO,
                0,
            );
            contact.speculative = true;
            contact
        })
        .collect();

    // Swap the live solve state out; the sub-step must not read or write it.
    let prior_contacts = world.remove_resource::<Contacts2D>();
    let prior_scale = world.remove_resource::<SolverTimeScale>();
    let prior_cache = world.remove_resource::<ContactCache>();
    let prior_distance = world.remove_resource::<DistanceBatch>();
    let prior_revolute = world.remove_resource::<RevoluteBatch>();
    let prior_prismatic = world.remove_resource::<PrismaticBatch>();

    world.insert_resource(Contacts2D {
        contacts: toi_contacts,
    });
    world.insert_resource(SolverTimeScale(scale));

    solver::build_contact_materials(world);
    solver::warm_start(world);
    solver::solve_iterations(world, dt);
    solver::commit_impulses(world);

    // Restore exactly what was live before the sub-step.
    world.remove_resource::<Contacts2D>();
    world.remove_resource::<SolverTimeScale>();
    world.remove_resource::<ContactCache>();
    world.remove_resource::<DistanceBatch>();
    world.remove_resource::<RevoluteBatch>();
    world.remove_resource::<PrismaticBatch>();
    if let Some(contacts) = prior_contacts {
        world.insert_resource(contacts);
    }
    if let Some(scale) = prior_scale {
        world.insert_resource(scale);
    }
    if let Some(cache) = prior_cache {
        world.insert_resource(cache);
    }
    if let Some(batch) = prior_distance {
        world.insert_resource(batch);
    }
    if let Some(batch) = prior_revolute {
        world.insert_resource(batch);
    }
    if let Some(batch) = prior_prismatic {
        world.insert_resource(batch);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::float_cmp)]

    use super::*;

    fn fx(v: f32) -> Fx {
        Fx::from_f32(v)
    }

    fn v(x: f32, y: f32) -> Vec2Fx {
        Vec2Fx::new(fx(x), fx(y))
    }

    #[test]
    fn advancement_finds_the_gap_crossing() {
        let a = SweptShape::Circle {
            center: v(0.0, 0.0),
            radius: fx(0.5),
        };
        let b = SweptShape::Circle {
            center: v(4.0, 0.0),
            radius: fx(0.5),
        };
        // A covers 6 units this step; the surfaces are 3 apart.
        let event = advance_pair(
            Entity::from_parts(0, 0),
            Entity::from_parts(1, 0),
            &a,
            &b,
            v(360.0, 0.0),
            Vec2Fx::ZERO,
            Fx::from_ratio(1, 60),
        )
        .unwrap();
        assert!(event.t > Fx::ZERO && event.t < Fx::ONE);
        let expected = fx(0.5);
        assert!(
            (event.t - expected).abs() < fx(0.1),
            "t = {:?}, expected about {:?}",
            event.t,
            expected
        );
        assert!(event.normal.x > Fx::ZERO);
    }

    #[test]
    fn receding_pairs_produce_no_event() {
        let a = SweptShape::Circle {
            center: v(0.0, 0.0),
            radius: fx(0.5),
        };
        let b = SweptShape::Circle {
            center: v(4.0, 0.0),
            radius: fx(0.5),
        };
        assert!(advance_pair(
            Entity::from_parts(0, 0),
            Entity::from_parts(1, 0),
            &a,
            &b,
            v(-100.0, 0.0),
            Vec2Fx::ZERO,
            Fx::from_ratio(1, 60),
        )
        .is_none());
    }

    #[test]
    fn hull_distance_matches_face_gap() {
        let mut vertices = [Vec2Fx::ZERO; MAX_HULL_VERTICES];
        vertices[0] = v(-1.0, -1.0);
        vertices[1] = v(1.0, -1.0);
        vertices[2] = v(1.0, 1.0);
        vertices[3] = v(-1.0, 1.0);
        let hull = SweptShape::Hull {
            count: 4,
            vertices,
            skin: Fx::ZERO,
        };
        let circle = SweptShape::Circle {
            center: v(3.0, 0.0),
            radius: fx(0.5),
        };
        let (d, n, _) = shape_distance(&hull, &circle);
        assert!((d - fx(1.5)).abs() <= Fx::from_raw(64), "distance {d:?}");
        assert!(n.x > Fx::ZERO, "direction hull -> circle");
    }
}
