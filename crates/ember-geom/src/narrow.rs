// SPDX-License-Identifier: Apache-2.0
//! Narrowphase: manifold generation per shape pair.
//!
//! Dispatch is a match over the shape-pair variant (circle/circle,
//! hull/circle, hull/hull), with hull/hull running SAT and reference/incident
//! face clipping for up to two coplanar contact points. Every contact carries
//! a feature id built from the contributing face/vertex indices so the solver
//! can carry accumulated impulses across frames while the same features stay
//! in contact.

use ember_math::{Fx, Vec2Fx};

use crate::contact::Contact;
use crate::shape::{CircleWorld2D, HullWorld2D};

/// World-space shape reference for narrowphase dispatch.
#[derive(Clone, Copy, Debug)]
pub enum WorldShape<'a> {
    /// Circle proxy.
    Circle(&'a CircleWorld2D),
    /// Convex hull proxy.
    Hull(&'a HullWorld2D),
}

/// Feature id for the single circle-circle contact point.
const FEATURE_CIRCLE: u32 = 1;

/// Reference-face preference: B must beat A by `0.98 * sep_a + 0.001` to
/// take over, which keeps the reference side stable frame to frame.
const REL_BIAS: Fx = Fx::from_raw(64_225); // 0.98
const ABS_BIAS: Fx = Fx::from_raw(66); // 0.001

/// Dispatches on the shape pair and appends resulting contacts to `out`.
pub fn collide(a_id: u64, a: WorldShape<'_>, b_id: u64, b: WorldShape<'_>, out: &mut Vec<Contact>) {
    match (a, b) {
        (WorldShape::Circle(ca), WorldShape::Circle(cb)) => {
            if let Some(contact) = collide_circle_circle(a_id, ca, b_id, cb) {
                out.push(contact);
            }
        }
        (WorldShape::Hull(ha), WorldShape::Circle(cb)) => {
            if let Some(contact) = collide_hull_circle(a_id, ha, b_id, cb) {
                out.push(contact);
            }
        }
        (WorldShape::Circle(ca), WorldShape::Hull(hb)) => {
            // Run with the hull as reference, then restate for (a, b) order.
            if let Some(contact) = collide_hull_circle(b_id, hb, a_id, ca) {
                out.push(Contact {
                    a: a_id,
                    b: b_id,
                    normal: -contact.normal,
                    ..contact
                });
            }
        }
        (WorldShape::Hull(ha), WorldShape::Hull(hb)) => {
            collide_hull_hull(a_id, ha, b_id, hb, out);
        }
    }
}

/// Circle-circle: distance test against summed radii (skins included).
#[must_use]
pub fn collide_circle_circle(
    a_id: u64,
    a: &CircleWorld2D,
    b_id: u64,
    b: &CircleWorld2D,
) -> Option<Contact> {
    let delta = b.center - a.center;
    let total = a.radius + b.radius;
    let dist_sq = delta.length_sq();
    if dist_sq > total * total {
        return None;
    }
    let dist = dist_sq.sqrt();
    let normal = if dist == Fx::ZERO {
        // Concentric circles: pick a fixed axis so results stay reproducible.
        Vec2Fx::new(Fx::ONE, Fx::ZERO)
    } else {
        Vec2Fx::new(delta.x / dist, delta.y / dist)
    };
    let penetration = total - dist;
    let point = a.center + normal * a.radius;
    Some(Contact::new(
        a_id,
        b_id,
        normal,
        point,
        penetration,
        FEATURE_CIRCLE,
    ))
}

/// Hull-circle: deepest-face test, then face/vertex region resolution.
///
/// The returned normal points from the hull (`a`) toward the circle (`b`).
#[must_use]
pub fn collide_hull_circle(
    a_id: u64,
    hull: &HullWorld2D,
    b_id: u64,
    circle: &CircleWorld2D,
) -> Option<Contact> {
    let n = usize::from(hull.count);
    if n == 0 {
        return None;
    }
    let total = circle.radius + hull.skin;

    // Face of maximum separation relative to the circle center.
    let mut best_sep = Fx::MIN;
    let mut best_face = 0_usize;
    for i in 0..n {
        let sep = hull.normals[i].dot(circle.center - hull.vertices[i]);
        if sep > best_sep {
            best_sep = sep;
            best_face = i;
        }
    }
    if best_sep > total {
        return None;
    }

    let v1 = hull.vertices[best_face];
    let v2 = hull.vertices[(best_face + 1) % n];

    if best_sep < Fx::ZERO {
        // Center inside the hull: push out along the deepest face normal.
        let normal = hull.normals[best_face];
        let penetration = total - best_sep;
        let point = circle.center - normal * circle.radius;
        #[allow(clippy::cast_possible_truncation)]
        let feature = 0x100 | best_face as u32;
        return Some(Contact::new(a_id, b_id, normal, point, penetration, feature));
    }

    // Face vs. vertex region along the edge.
    let edge = v2 - v1;
    let edge_len_sq = edge.length_sq();
    let u = (circle.center - v1).dot(edge);
    let (closest, region) = if u <= Fx::ZERO {
        (v1, 1_u32)
    } else if u >= edge_len_sq {
        (v2, 2_u32)
    } else {
        let t = u / edge_len_sq;
        (v1 + edge * t, 0_u32)
    };

    let delta = circle.center - closest;
    let dist_sq = delta.length_sq();
    if dist_sq > total * total {
        return None;
    }
    let dist = dist_sq.sqrt();
    let normal = if dist == Fx::ZERO {
        hull.normals[best_face]
    } else {
        Vec2Fx::new(delta.x / dist, delta.y / dist)
    };
    let penetration = total - dist;
    let point = circle.center - normal * circle.radius;
    #[allow(clippy::cast_possible_truncation)]
    let feature = (region << 8) | best_face as u32;
    Some(Contact::new(a_id, b_id, normal, point, penetration, feature))
}

/// Hull-hull SAT with reference/incident clipping; appends up to two
/// contacts to `out`.
pub fn collide_hull_hull(
    a_id: u64,
    a: &HullWorld2D,
    b_id: u64,
    b: &HullWorld2D,
    out: &mut Vec<Contact>,
) {
    let total_skin = a.skin + b.skin;
    let Some((sep_a, face_a)) = max_separation(a, b) else {
        return;
    };
    if sep_a > total_skin {
        return;
    }
    let Some((sep_b, face_b)) = max_separation(b, a) else {
        return;
    };
    if sep_b > total_skin {
        return;
    }

    let (reference, incident, ref_face, flipped) = if sep_b > sep_a * REL_BIAS + ABS_BIAS {
        (b, a, face_b, true)
    } else {
        (a, b, face_a, false)
    };

    let ref_n = usize::from(reference.count);
    let inc_n = usize::from(incident.count);
    let ref_normal = reference.normals[ref_face];

    // Incident face: the one most anti-parallel to the reference normal.
    let mut inc_face = 0_usize;
    let mut min_dot = Fx::MAX;
    for j in 0..inc_n {
        let d = incident.normals[j].dot(ref_normal);
        if d < min_dot {
            min_dot = d;
            inc_face = j;
        }
    }

    let ref_v1 = reference.vertices[ref_face];
    let ref_v2 = reference.vertices[(ref_face + 1) % ref_n];
    let tangent = (ref_v2 - ref_v1).normalized();

    #[allow(clippy::cast_possible_truncation)]
    let mut points = [
        (incident.vertices[inc_face], inc_face as u32),
        (
            incident.vertices[(inc_face + 1) % inc_n],
            ((inc_face + 1) % inc_n) as u32,
        ),
    ];

    // Clip to the side planes of the reference face.
    if !clip_segment(&mut points, -tangent, -tangent.dot(ref_v1)) {
        return;
    }
    if !clip_segment(&mut points, tangent, tangent.dot(ref_v2)) {
        return;
    }

    for (k, &(point, inc_vertex)) in points.iter().enumerate() {
        let sep = ref_normal.dot(point - ref_v1);
        if sep > total_skin {
            continue;
        }
        let normal = if flipped { -ref_normal } else { ref_normal };
        #[allow(clippy::cast_possible_truncation)]
        let feature = (u32::from(flipped) << 24)
            | ((ref_face as u32) << 16)
            | (inc_vertex << 8)
            | k as u32;
        out.push(Contact::new(
            a_id,
            b_id,
            normal,
            point,
            total_skin - sep,
            feature,
        ));
    }
}

/// Maximum separation of `b` over `a`'s face normals.
///
/// Positive means a separating axis exists with that clearance; the most
/// positive axis is the candidate reference face.
fn max_separation(a: &HullWorld2D, b: &HullWorld2D) -> Option<(Fx, usize)> {
    let an = usize::from(a.count);
    let bn = usize::from(b.count);
    if an == 0 || bn == 0 {
        return None;
    }
    let mut best = Fx::MIN;
    let mut best_face = 0_usize;
    for i in 0..an {
        let n = a.normals[i];
        let v = a.vertices[i];
        // Deepest point of b along -n.
        let mut min_proj = Fx::MAX;
        for vb in b.verts() {
            min_proj = min_proj.min(n.dot(*vb - v));
        }
        if min_proj > best {
            best = min_proj;
            best_face = i;
        }
    }
    Some((best, best_face))
}

/// Clips the two-point segment to the half-plane `dot(n, p) <= offset`,
/// keeping interpolated crossings. Returns `false` when fewer than two
/// points survive (degenerate contact; skip the manifold).
fn clip_segment(points: &mut [(Vec2Fx, u32); 2], n: Vec2Fx, offset: Fx) -> bool {
    let d0 = n.dot(points[0].0) - offset;
    let d1 = n.dot(points[1].0) - offset;
    match (d0 <= Fx::ZERO, d1 <= Fx::ZERO) {
        (true, true) => true,
        (false, false) => false,
        (keep0, _) => {
            let t = d0 / (d0 - d1);
            let crossing = points[0].0 + (points[1].0 - points[0].0) * t;
            if keep0 {
                points[1] = (crossing, points[1].1 | 0x8000);
            } else {
                points[0] = (crossing, points[0].1 | 0x8000);
            }
            true
        }
    }
}
