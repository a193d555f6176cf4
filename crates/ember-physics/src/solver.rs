// SPDX-License-Identifier: Apache-2.0
//! Warm-started sequential Gauss-Seidel solver for contacts and joints.
//!
//! The solve is split into the passes the pipeline (and the TOI mini-solve)
//! composes: material build, warm start, iterate, commit. Every pass reads
//! its inputs from world resources so the mini-solve can swap
//! [`Contacts2D`]/[`SolverTimeScale`] and reuse the passes unchanged.
//!
//! Determinism: bodies are gathered in query order, contacts are solved in
//! list order, joints in batch order. Sleeping bodies participate with zero
//! effective inverse mass, so their velocities are never written; an impulse
//! above the wake threshold flags them awake for the next frame.

use ember_core::{Entity, Query, World};
use ember_math::{Fx, Vec2Fx};
use rustc_hash::FxHashMap;

use crate::body::{Body2D, RotationCache2D};
use crate::joint::{
    DistanceBatch, DistanceJoint2D, DistanceRow, PrismaticBatch, PrismaticJoint2D, PrismaticRow,
    RevoluteBatch, RevoluteJoint2D, RevoluteRow,
};
use crate::material::{compose, DefaultMaterial2D, Material2D, MaterialTable2D};
use crate::resources::{ContactCache, Contacts2D, PhysicsConfig, SolverTimeScale};

/// Solver-local copy of one body's state.
#[derive(Clone, Copy, Debug)]
pub struct BodyState {
    /// Owning entity.
    pub entity: Entity,
    /// World position at gather time.
    pub position: Vec2Fx,
    /// Linear velocity (mutated by the solve).
    pub velocity: Vec2Fx,
    /// Angular velocity (mutated by the solve).
    pub w: Fx,
    /// Inverse mass from the component.
    pub inv_mass: Fx,
    /// Inverse inertia from the component.
    pub inv_inertia: Fx,
    /// Awake at gather time.
    pub awake: bool,
    /// Received a wake-worthy impulse during the solve.
    pub woken: bool,
}

impl BodyState {
    /// Effective inverse mass: sleeping bodies solve as immovable.
    #[must_use]
    pub fn eff_inv_mass(&self) -> Fx {
        if self.awake {
            self.inv_mass
        } else {
            Fx::ZERO
        }
    }

    /// Effective inverse inertia: sleeping bodies solve as immovable.
    #[must_use]
    pub fn eff_inv_inertia(&self) -> Fx {
        if self.awake {
            self.inv_inertia
        } else {
            Fx::ZERO
        }
    }
}

/// Dense body table gathered once per pass and scattered back after.
#[derive(Debug, Default)]
pub struct BodyTable {
    /// States in query order.
    pub states: Vec<BodyState>,
    index: FxHashMap<u64, usize>,
}

impl BodyTable {
    /// Gathers every `Body2D` in deterministic query order.
    #[must_use]
    pub fn gather(world: &World) -> Self {
        let mut table = Self::default();
        for entity in world.query_entities(&Query::new().require::<Body2D>()) {
            let Some(body) = world.get::<Body2D>(entity) else {
                continue;
            };
            table.index.insert(entity.to_bits(), table.states.len());
            table.states.push(BodyState {
                entity,
                position: body.position,
                velocity: body.velocity,
                w: body.angular_velocity,
                inv_mass: body.inv_mass,
                inv_inertia: body.inv_inertia,
                awake: body.awake,
                woken: false,
            });
        }
        table
    }

    /// Index for an entity's state, by packed bits.
    #[must_use]
    pub fn lookup(&self, bits: u64) -> Option<usize> {
        self.index.get(&bits).copied()
    }

    /// Writes velocities (awake bodies only) and wake flags back.
    pub fn scatter(&self, world: &mut World) {
        for state in &self.states {
            let Some(body) = world.get_mut::<Body2D>(state.entity) else {
                continue;
            };
            if state.awake {
                body.velocity = state.velocity;
                body.angular_velocity = state.w;
            } else if state.woken {
                body.awake = true;
                body.sleep_timer = Fx::ZERO;
            }
        }
    }

    /// Applies an impulse `p` at offset `r` from body `i`'s center.
    ///
    /// Sleeping bodies absorb nothing, but an impulse whose magnitude
    /// exceeds `wake_threshold` flags them to wake next frame.
    fn apply_impulse(&mut self, i: usize, p: Vec2Fx, r: Vec2Fx, wake_threshold: Fx) {
        let state = &mut self.states[i];
        if state.awake {
            state.velocity += p * state.inv_mass;
            state.w += state.inv_inertia * r.cross(p);
        } else if p.length() > wake_threshold {
            state.woken = true;
        }
    }
}

/// Velocity of the contact point on body `i`: `v + w x r`.
fn point_velocity(state: &BodyState, r: Vec2Fx) -> Vec2Fx {
    state.velocity + Vec2Fx::cross_scalar(state.w, r)
}

// ----------------------------------------------------------------------
// Pass 1: contact materials
// ----------------------------------------------------------------------

/// Resolves materials for both sides of every contact, mixes them, and
/// stores friction plus effective restitution on the contact.
///
/// Effective restitution is the mixed restitution when the approach speed
/// exceeds the mixed bounce threshold, else zero; slow contacts must not
/// jitter.
pub fn build_contact_materials(world: &mut World) {
    let Some(mut contacts) = world.remove_resource::<Contacts2D>() else {
        return;
    };
    let table = BodyTable::gather(world);
    let world_default = world.resource::<DefaultMaterial2D>().map(|d| d.0);
    let empty_table = MaterialTable2D::default();

    for contact in &mut contacts.contacts {
        let ma = resolve_material(world, contact.a, world_default);
        let mb = resolve_material(world, contact.b, world_default);
        let mix_table = world.resource::<MaterialTable2D>().unwrap_or(&empty_table);
        let mixed = compose(mix_table, &ma, &mb);

        contact.mu_s = mixed.mu_s;
        contact.mu_d = mixed.mu_d;

        let vn = relative_normal_velocity(&table, contact.a, contact.b, contact.point, contact.normal);
        contact.eff_rest = if vn < -mixed.bounce_threshold {
            mixed.restitution
        } else {
            Fx::ZERO
        };
    }
    world.insert_resource(contacts);
}

/// Material lookup order: the entity's `Material2D` component, then the
/// world-default resource, then a material derived from the body's own
/// restitution/friction fields (built-in default when no body either).
fn resolve_material(world: &World, bits: u64, world_default: Option<Material2D>) -> Material2D {
    let entity = Entity::from_bits(bits);
    if let Some(material) = world.get::<Material2D>(entity) {
        return *material;
    }
    if let Some(material) = world_default {
        return material;
    }
    world.get::<Body2D>(entity).map_or_else(Material2D::standard, |body| Material2D {
        id: 0,
        mu_s: body.friction,
        mu_d: body.friction,
        restitution: body.restitution,
        bounce_threshold: Material2D::standard().bounce_threshold,
    })
}

fn relative_normal_velocity(
    table: &BodyTable,
    a_bits: u64,
    b_bits: u64,
    point: Vec2Fx,
    normal: Vec2Fx,
) -> Fx {
    let va = table.lookup(a_bits).map_or(Vec2Fx::ZERO, |i| {
        let s = &table.states[i];
        point_velocity(s, point - s.position)
    });
    let vb = table.lookup(b_bits).map_or(Vec2Fx::ZERO, |i| {
        let s = &table.states[i];
        point_velocity(s, point - s.position)
    });
    (vb - va).dot(normal)
}

// ----------------------------------------------------------------------
// Pass 2: warm start
// ----------------------------------------------------------------------

/// Applies each contact's cached `jn`/`jt` as impulses, seeding the solver
/// from the previous frame's converged state.
pub fn warm_start(world: &mut World) {
    let Some(contacts) = world.remove_resource::<Contacts2D>() else {
        return;
    };
    let wake = world
        .resource::<PhysicsConfig>()
        .map_or_else(|| PhysicsConfig::default().sleep.impulse_wake, |c| c.sleep.impulse_wake);
    let mut table = BodyTable::gather(world);

    for contact in &contacts.contacts {
        let (Some(ia), Some(ib)) = (table.lookup(contact.a), table.lookup(contact.b)) else {
            continue;
        };
        let tangent = contact.normal.perp();
        let p = contact.normal * contact.jn + tangent * contact.jt;
        let ra = contact.point - table.states[ia].position;
        let rb = contact.point - table.states[ib].position;
        table.apply_impulse(ia, -p, ra, wake);
        table.apply_impulse(ib, p, rb, wake);
    }

    table.scatter(world);
    world.insert_resource(contacts);
}

// ----------------------------------------------------------------------
// Pass 3: joint batches
// ----------------------------------------------------------------------

fn world_offset(world: &World, entity: Entity, local: Vec2Fx) -> Vec2Fx {
    let (cos, sin) = world.get::<RotationCache2D>(entity).map_or_else(
        || {
            world.get::<Body2D>(entity).map_or((Fx::ONE, Fx::ZERO), |b| {
                let (s, c) = b.angle.sin_cos();
                (c, s)
            })
        },
        |cache| (cache.cos, cache.sin),
    );
    local.rotate(cos, sin)
}

/// Validates joint endpoints and applies sleep coupling.
///
/// Returns `None` when the joint must be skipped this frame (broken, stale
/// handle, missing body, or both endpoints asleep). When exactly one
/// endpoint sleeps, the sleeper is woken.
fn joint_bodies(
    world: &mut World,
    broken: bool,
    body_a: Entity,
    body_b: Entity,
) -> Option<(Entity, Entity)> {
    if broken {
        return None;
    }
    let awake_a = world.get::<Body2D>(body_a)?.awake;
    let awake_b = world.get::<Body2D>(body_b)?.awake;
    match (awake_a, awake_b) {
        (false, false) => return None,
        (true, false) => {
            if let Some(body) = world.get_mut::<Body2D>(body_b) {
                body.awake = true;
                body.sleep_timer = Fx::ZERO;
            }
        }
        (false, true) => {
            if let Some(body) = world.get_mut::<Body2D>(body_a) {
                body.awake = true;
                body.sleep_timer = Fx::ZERO;
            }
        }
        (true, true) => {}
    }
    Some((body_a, body_b))
}

/// Builds the distance/revolute/prismatic batches with precomputed
/// effective masses and biases, applying joint warm-start impulses.
pub fn build_joint_batches(world: &mut World, dt: Fx) {
    let wake = world
        .resource::<PhysicsConfig>()
        .map_or_else(|| PhysicsConfig::default().sleep.impulse_wake, |c| c.sleep.impulse_wake);
    let dt = if dt == Fx::ZERO { Fx::from_ratio(1, 60) } else { dt };

    let mut distance = DistanceBatch::default();
    let mut revolute = RevoluteBatch::default();
    let mut prismatic = PrismaticBatch::default();

    // Distance joints.
    for joint_entity in world.query_entities(&Query::new().require::<DistanceJoint2D>()) {
        let Some(joint) = world.get::<DistanceJoint2D>(joint_entity).copied() else {
            continue;
        };
        let Some((ea, eb)) = joint_bodies(world, joint.broken, joint.body_a, joint.body_b) else {
            continue;
        };
        let ra = world_offset(world, ea, joint.local_anchor_a);
        let rb = world_offset(world, eb, joint.local_anchor_b);
        let table = BodyTable::gather(world);
        let (Some(ia), Some(ib)) = (table.lookup(ea.to_bits()), table.lookup(eb.to_bits())) else {
            continue;
        };
        let (sa, sb) = (&table.states[ia], &table.states[ib]);
        let d = (sb.position + rb) - (sa.position + ra);
        let dist = d.length();
        let axis = if dist == Fx::ZERO {
            Vec2Fx::new(Fx::ONE, Fx::ZERO)
        } else {
            Vec2Fx::new(d.x / dist, d.y / dist)
        };
        let cra = ra.cross(axis);
        let crb = rb.cross(axis);
        let k = sa.eff_inv_mass()
            + sb.eff_inv_mass()
            + sa.eff_inv_inertia() * cra * cra
            + sb.eff_inv_inertia() * crb * crb;
        if k + joint.gamma == Fx::ZERO {
            // Both endpoints immovable; the row could only accumulate noise.
            continue;
        }
        let mass = Fx::ONE / (k + joint.gamma);
        let bias = joint.beta * (dist - joint.rest_length) / dt;
        distance.rows.push(DistanceRow {
            joint: joint_entity,
            a: ia,
            b: ib,
            ra,
            rb,
            axis,
            mass,
            bias,
            impulse: joint.impulse,
            break_impulse: joint.break_impulse,
            broke: false,
        });
    }

    // Revolute joints.
    for joint_entity in world.query_entities(&Query::new().require::<RevoluteJoint2D>()) {
        let Some(joint) = world.get::<RevoluteJoint2D>(joint_entity).copied() else {
            continue;
        };
        let Some((ea, eb)) = joint_bodies(world, joint.broken, joint.body_a, joint.body_b) else {
            continue;
        };
        let ra = world_offset(world, ea, joint.local_anchor_a);
        let rb = world_offset(world, eb, joint.local_anchor_b);
        let table = BodyTable::gather(world);
        let (Some(ia), Some(ib)) = (table.lookup(ea.to_bits()), table.lookup(eb.to_bits())) else {
            continue;
        };
        let (sa, sb) = (&table.states[ia], &table.states[ib]);
        let im = sa.eff_inv_mass() + sb.eff_inv_mass();
        let (iia, iib) = (sa.eff_inv_inertia(), sb.eff_inv_inertia());
        let k11 = im + iia * ra.y * ra.y + iib * rb.y * rb.y + joint.gamma;
        let k12 = -(iia * ra.x * ra.y) - iib * rb.x * rb.y;
        let k22 = im + iia * ra.x * ra.x + iib * rb.x * rb.x + joint.gamma;
        let det = k11 * k22 - k12 * k12;
        if det == Fx::ZERO {
            continue;
        }
        let inv_det = Fx::ONE / det;
        let inv_mass = [
            [k22 * inv_det, -(k12 * inv_det)],
            [-(k12 * inv_det), k11 * inv_det],
        ];
        let error = (sb.position + rb) - (sa.position + ra);
        let bias = error * (joint.beta / dt);
        revolute.rows.push(RevoluteRow {
            joint: joint_entity,
            a: ia,
            b: ib,
            ra,
            rb,
            inv_mass,
            bias,
            impulse: joint.impulse,
            break_impulse: joint.break_impulse,
            broke: false,
        });
    }

    // Prismatic joints.
    for joint_entity in world.query_entities(&Query::new().require::<PrismaticJoint2D>()) {
        let Some(joint) = world.get::<PrismaticJoint2D>(joint_entity).copied() else {
            continue;
        };
        let Some((ea, eb)) = joint_bodies(world, joint.broken, joint.body_a, joint.body_b) else {
            continue;
        };
        let ra = world_offset(world, ea, joint.local_anchor_a);
        let rb = world_offset(world, eb, joint.local_anchor_b);
        let axis = world_offset(world, ea, joint.local_axis).normalized();
        let perp = axis.perp();
        let table = BodyTable::gather(world);
        let (Some(ia), Some(ib)) = (table.lookup(ea.to_bits()), table.lookup(eb.to_bits())) else {
            continue;
        };
        let (sa, sb) = (&table.states[ia], &table.states[ib]);
        let d = (sb.position + rb) - (sa.position + ra);
        let im = sa.eff_inv_mass() + sb.eff_inv_mass();
        let (iia, iib) = (sa.eff_inv_inertia(), sb.eff_inv_inertia());

        if im + iia + iib == Fx::ZERO {
            continue;
        }
        let s1 = (ra + d).cross(perp);
        let s2 = rb.cross(perp);
        let mass_perp = Fx::ONE / (im + iia * s1 * s1 + iib * s2 * s2 + joint.gamma);

        let a1 = (ra + d).cross(axis);
        let a2 = rb.cross(axis);
        let mass_axial = Fx::ONE / (im + iia * a1 * a1 + iib * a2 * a2);

        let mass_angular = if iia + iib == Fx::ZERO {
            Fx::ZERO
        } else {
            Fx::ONE / (iia + iib)
        };

        prismatic.rows.push(PrismaticRow {
            joint: joint_entity,
            a: ia,
            b: ib,
            ra,
            rb,
            axis,
            perp,
            mass_perp,
            mass_angular,
            mass_axial,
            s1,
            s2,
            a1,
            a2,
            bias_perp: joint.beta * perp.dot(d) / dt,
            translation: axis.dot(d),
            impulse: joint.impulse,
            angular_impulse: joint.angular_impulse,
            motor_impulse: joint.motor_impulse,
            limit_impulse: if joint.enable_limit { joint.limit_impulse } else { Fx::ZERO },
            enable_limit: joint.enable_limit,
            lower: joint.lower,
            upper: joint.upper,
            enable_motor: joint.enable_motor,
            motor_speed: joint.motor_speed,
            max_motor_impulse: joint.max_motor_impulse,
            break_impulse: joint.break_impulse,
            broke: false,
        });
    }

    // Joint warm start: apply the accumulated impulses carried on the rows.
    let mut table = BodyTable::gather(world);
    for row in &distance.rows {
        let p = row.axis * row.impulse;
        table.apply_impulse(row.a, -p, row.ra, wake);
        table.apply_impulse(row.b, p, row.rb, wake);
    }
    for row in &revolute.rows {
        table.apply_impulse(row.a, -row.impulse, row.ra, wake);
        table.apply_impulse(row.b, row.impulse, row.rb, wake);
    }
    for row in &prismatic.rows {
        let axial = row.motor_impulse + row.limit_impulse;
        let p = row.perp * row.impulse + row.axis * axial;
        let la = row.s1 * row.impulse + row.a1 * axial + row.angular_impulse;
        let lb = row.s2 * row.impulse + row.a2 * axial + row.angular_impulse;
        let state_a = &mut table.states[row.a];
        if state_a.awake {
            state_a.velocity -= p * state_a.inv_mass;
            state_a.w -= state_a.inv_inertia * la;
        }
        let state_b = &mut table.states[row.b];
        if state_b.awake {
            state_b.velocity += p * state_b.inv_mass;
            state_b.w += state_b.inv_inertia * lb;
        }
    }
    table.scatter(world);

    world.insert_resource(distance);
    world.insert_resource(revolute);
    world.insert_resource(prismatic);
}

// ----------------------------------------------------------------------
// Pass 4: iterations
// ----------------------------------------------------------------------

struct ContactRow {
    index: usize,
    a: usize,
    b: usize,
    ra: Vec2Fx,
    rb: Vec2Fx,
    normal: Vec2Fx,
    tangent: Vec2Fx,
    mass_n: Fx,
    mass_t: Fx,
    bias: Fx,
    mu_d: Fx,
}

/// Runs the configured number of Gauss-Seidel iterations over contacts and
/// joint rows, accumulating clamped impulses.
pub fn solve_iterations(world: &mut World, dt: Fx) {
    let config = world
        .resource::<PhysicsConfig>()
        .copied()
        .unwrap_or_default();
    let scale = world
        .resource::<SolverTimeScale>()
        .copied()
        .unwrap_or_default()
        .0;
    let dt = {
        let scaled = dt * scale;
        if scaled == Fx::ZERO {
            Fx::from_ratio(1, 60)
        } else {
            scaled
        }
    };
    let wake = config.sleep.impulse_wake;

    let Some(mut contacts) = world.remove_resource::<Contacts2D>() else {
        return;
    };
    let mut distance = world.remove_resource::<DistanceBatch>().unwrap_or_default();
    let mut revolute = world.remove_resource::<RevoluteBatch>().unwrap_or_default();
    let mut prismatic = world
        .remove_resource::<PrismaticBatch>()
        .unwrap_or_default();
    let mut table = BodyTable::gather(world);

    // Precompute contact rows: effective masses and the velocity bias
    // (Baumgarte on penetration beyond the slop, plus restitution on the
    // pre-iteration approach speed).
    let mut rows: Vec<ContactRow> = Vec::with_capacity(contacts.contacts.len());
    for (index, contact) in contacts.contacts.iter().enumerate() {
        let (Some(a), Some(b)) = (table.lookup(contact.a), table.lookup(contact.b)) else {
            continue;
        };
        let (sa, sb) = (&table.states[a], &table.states[b]);
        // Both sides immovable (static or asleep): nothing to solve, and an
        // effective mass would be degenerate.
        if sa.eff_inv_mass() + sb.eff_inv_mass() + sa.eff_inv_inertia() + sb.eff_inv_inertia()
            == Fx::ZERO
        {
            continue;
        }
        // Speculative contacts carry a point extrapolated to the impact
        // pose; the lever arm against the current pose is meaningless, so
        // their impulse applies at the centers of mass.
        let (ra, rb) = if contact.speculative {
            (Vec2Fx::ZERO, Vec2Fx::ZERO)
        } else {
            (contact.point - sa.position, contact.point - sb.position)
        };
        let normal = contact.normal;
        let tangent = normal.perp();

        let mass_n = effective_mass(sa, sb, ra, rb, normal);
        let mass_t = effective_mass(sa, sb, ra, rb, tangent);

        let vn0 = (point_velocity(sb, rb) - point_velocity(sa, ra)).dot(normal);
        let depth = (contact.penetration - config.slop).max(Fx::ZERO);
        let positional = if contact.speculative {
            Fx::ZERO
        } else {
            config.baumgarte * depth / dt
        };
        let restitution = contact.eff_rest * (-vn0).max(Fx::ZERO);
        rows.push(ContactRow {
            index,
            a,
            b,
            ra,
            rb,
            normal,
            tangent,
            mass_n,
            mass_t,
            // The larger of the two targets wins; summing them would feed
            // positional correction into the rebound and add energy.
            bias: positional.max(restitution),
            mu_d: contact.mu_d,
        });
    }

    for _ in 0..config.iterations {
        // Contacts.
        for row in &rows {
            let contact = &mut contacts.contacts[row.index];
            let (sa, sb) = (&table.states[row.a], &table.states[row.b]);

            // Normal impulse with accumulated clamping at zero.
            let vn = (point_velocity(sb, row.rb) - point_velocity(sa, row.ra)).dot(row.normal);
            let lambda = row.mass_n * (row.bias - vn);
            let new_jn = (contact.jn + lambda).max(Fx::ZERO);
            let applied = new_jn - contact.jn;
            contact.jn = new_jn;
            let p = row.normal * applied;
            table.apply_impulse(row.a, -p, row.ra, wake);
            table.apply_impulse(row.b, p, row.rb, wake);

            // Friction clamped to the Coulomb cone around the normal impulse.
            let (sa, sb) = (&table.states[row.a], &table.states[row.b]);
            let vt = (point_velocity(sb, row.rb) - point_velocity(sa, row.ra)).dot(row.tangent);
            let lambda_t = -(row.mass_t * vt);
            let max_t = row.mu_d * contact.jn;
            let new_jt = (contact.jt + lambda_t).clamp(-max_t, max_t);
            let applied_t = new_jt - contact.jt;
            contact.jt = new_jt;
            let pt = row.tangent * applied_t;
            table.apply_impulse(row.a, -pt, row.ra, wake);
            table.apply_impulse(row.b, pt, row.rb, wake);
        }

        // Distance rows.
        for row in &mut distance.rows {
            if row.broke {
                continue;
            }
            let (sa, sb) = (&table.states[row.a], &table.states[row.b]);
            let cdot = (point_velocity(sb, row.rb) - point_velocity(sa, row.ra)).dot(row.axis);
            let lambda = -(row.mass * (cdot + row.bias));
            row.impulse += lambda;
            let p = row.axis * lambda;
            table.apply_impulse(row.a, -p, row.ra, wake);
            table.apply_impulse(row.b, p, row.rb, wake);
            if row.break_impulse > Fx::ZERO && row.impulse.abs() > row.break_impulse {
                row.broke = true;
            }
        }

        // Revolute rows.
        for row in &mut revolute.rows {
            if row.broke {
                continue;
            }
            let (sa, sb) = (&table.states[row.a], &table.states[row.b]);
            let cdot = point_velocity(sb, row.rb) - point_velocity(sa, row.ra) + row.bias;
            let lambda = Vec2Fx::new(
                -(row.inv_mass[0][0] * cdot.x + row.inv_mass[0][1] * cdot.y),
                -(row.inv_mass[1][0] * cdot.x + row.inv_mass[1][1] * cdot.y),
            );
            row.impulse += lambda;
            table.apply_impulse(row.a, -lambda, row.ra, wake);
            table.apply_impulse(row.b, lambda, row.rb, wake);
            if row.break_impulse > Fx::ZERO && row.impulse.length() > row.break_impulse {
                row.broke = true;
            }
        }

        // Prismatic rows: motor, limit, perpendicular, angular lock.
        for row in &mut prismatic.rows {
            if row.broke {
                continue;
            }
            if row.enable_motor {
                let (sa, sb) = (&table.states[row.a], &table.states[row.b]);
                let cdot =
                    (point_velocity(sb, row.rb) - point_velocity(sa, row.ra)).dot(row.axis)
                        - row.motor_speed;
                let lambda = -(row.mass_axial * cdot);
                let new_total = (row.motor_impulse + lambda)
                    .clamp(-row.max_motor_impulse, row.max_motor_impulse);
                let applied = new_total - row.motor_impulse;
                row.motor_impulse = new_total;
                apply_axial(&mut table, row, applied, wake);
            }
            if row.enable_limit {
                let (sa, sb) = (&table.states[row.a], &table.states[row.b]);
                let cdot = (point_velocity(sb, row.rb) - point_velocity(sa, row.ra)).dot(row.axis);
                if row.translation <= row.lower {
                    let lambda = -(row.mass_axial * cdot);
                    let new_total = (row.limit_impulse + lambda).max(Fx::ZERO);
                    let applied = new_total - row.limit_impulse;
                    row.limit_impulse = new_total;
                    apply_axial(&mut table, row, applied, wake);
                } else if row.translation >= row.upper {
                    let lambda = -(row.mass_axial * cdot);
                    let new_total = (row.limit_impulse + lambda).min(Fx::ZERO);
                    let applied = new_total - row.limit_impulse;
                    row.limit_impulse = new_total;
                    apply_axial(&mut table, row, applied, wake);
                }
            }
            {
                let (sa, sb) = (&table.states[row.a], &table.states[row.b]);
                let cdot = (point_velocity(sb, row.rb) - point_velocity(sa, row.ra)).dot(row.perp)
                    + row.bias_perp;
                let lambda = -(row.mass_perp * cdot);
                row.impulse += lambda;
                let p = row.perp * lambda;
                let la = row.s1 * lambda;
                let lb = row.s2 * lambda;
                apply_with_levers(&mut table, row.a, row.b, p, la, lb, wake);
            }
            {
                let (sa, sb) = (&table.states[row.a], &table.states[row.b]);
                let cdot = sb.w - sa.w;
                let lambda = -(row.mass_angular * cdot);
                row.angular_impulse += lambda;
                apply_with_levers(&mut table, row.a, row.b, Vec2Fx::ZERO, lambda, lambda, wake);
            }
            if row.break_impulse > Fx::ZERO && row.impulse.abs() > row.break_impulse {
                row.broke = true;
            }
        }
    }

    table.scatter(world);
    world.insert_resource(contacts);
    world.insert_resource(distance);
    world.insert_resource(revolute);
    world.insert_resource(prismatic);
}

/// `1 / (imA + imB + iIA (rA x d)^2 + iIB (rB x d)^2)` along direction `d`.
fn effective_mass(sa: &BodyState, sb: &BodyState, ra: Vec2Fx, rb: Vec2Fx, d: Vec2Fx) -> Fx {
    let cra = ra.cross(d);
    let crb = rb.cross(d);
    let k = sa.eff_inv_mass()
        + sb.eff_inv_mass()
        + sa.eff_inv_inertia() * cra * cra
        + sb.eff_inv_inertia() * crb * crb;
    Fx::ONE / k
}

fn apply_axial(table: &mut BodyTable, row: &PrismaticRow, lambda: Fx, wake: Fx) {
    let p = row.axis * lambda;
    let la = row.a1 * lambda;
    let lb = row.a2 * lambda;
    apply_with_levers(table, row.a, row.b, p, la, lb, wake);
}

/// Applies a linear impulse with explicit angular levers to both bodies.
fn apply_with_levers(
    table: &mut BodyTable,
    a: usize,
    b: usize,
    p: Vec2Fx,
    la: Fx,
    lb: Fx,
    wake: Fx,
) {
    let state_a = &mut table.states[a];
    if state_a.awake {
        state_a.velocity -= p * state_a.inv_mass;
        state_a.w -= state_a.inv_inertia * la;
    } else if p.length() + la.abs() > wake {
        state_a.woken = true;
    }
    let state_b = &mut table.states[b];
    if state_b.awake {
        state_b.velocity += p * state_b.inv_mass;
        state_b.w += state_b.inv_inertia * lb;
    } else if p.length() + lb.abs() > wake {
        state_b.woken = true;
    }
}

// ----------------------------------------------------------------------
// Pass 5: commit
// ----------------------------------------------------------------------

/// Writes accumulated impulses back to their persistent owners: the
/// warm-start cache for contacts (keyed by pair + feature) and the joint
/// components for joint rows, including break flags.
pub fn commit_impulses(world: &mut World) {
    if let Some(contacts) = world.remove_resource::<Contacts2D>() {
        let mut cache = world.remove_resource::<ContactCache>().unwrap_or_default();
        cache.impulses.clear();
        for contact in &contacts.contacts {
            let (lo, hi) = contact.pair();
            cache
                .impulses
                .insert((lo, hi, contact.feature), (contact.jn, contact.jt));
        }
        world.insert_resource(cache);
        world.insert_resource(contacts);
    }

    if let Some(batch) = world.remove_resource::<DistanceBatch>() {
        for row in &batch.rows {
            if let Some(joint) = world.get_mut::<DistanceJoint2D>(row.joint) {
                joint.impulse = row.impulse;
                if row.broke {
                    joint.broken = true;
                }
            }
        }
        world.insert_resource(batch);
    }
    if let Some(batch) = world.remove_resource::<RevoluteBatch>() {
        for row in &batch.rows {
            if let Some(joint) = world.get_mut::<RevoluteJoint2D>(row.joint) {
                joint.impulse = row.impulse;
                if row.broke {
                    joint.broken = true;
                }
            }
        }
        world.insert_resource(batch);
    }
    if let Some(batch) = world.remove_resource::<PrismaticBatch>() {
        for row in &batch.rows {
            if let Some(joint) = world.get_mut::<PrismaticJoint2D>(row.joint) {
                joint.impulse = row.impulse;
                joint.angular_impulse = row.angular_impulse;
                joint.motor_impulse = row.motor_impulse;
                joint.limit_impulse = row.limit_impulse;
                if row.broke {
                    joint.broken = true;
                }
            }
        }
        world.insert_resource(batch);
    }
}
