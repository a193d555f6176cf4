// SPDX-License-Identifier: Apache-2.0
#![allow(missing_docs, clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Joint behavior: distance convergence, revolute pinning, prismatic
//! sliding with limits and motors, break thresholds, sleep coupling.

mod common;

use common::{body, fx, physics_world, ticks, v2};
use ember_math::{Fx, Vec2Fx};
use ember_physics::{
    Body2D, DistanceJoint2D, PhysicsConfig, PrismaticJoint2D, RevoluteJoint2D, SleepConfig,
};

fn no_sleep(world: &mut ember_core::World) {
    world.insert_resource(PhysicsConfig {
        sleep: SleepConfig {
            time_to_sleep: fx(1000.0),
            ..SleepConfig::default()
        },
        ..PhysicsConfig::default()
    });
}

fn spawn_body(world: &mut ember_core::World, x: f32, y: f32) -> ember_core::Entity {
    let entity = world.spawn();
    world
        .add_component(entity, Body2D::dynamic(v2(x, y), Fx::ONE))
        .unwrap();
    entity
}

fn distance(world: &ember_core::World, a: ember_core::Entity, b: ember_core::Entity) -> Fx {
    (body(world, b).position - body(world, a).position).length()
}

#[test]
fn distance_joint_holds_its_rest_length_from_rest() {
    let (mut world, mut schedule) = physics_world();
    let a = spawn_body(&mut world, -1.0, 0.0);
    let b = spawn_body(&mut world, 1.0, 0.0);
    let joint = world.spawn();
    world
        .add_component(joint, DistanceJoint2D::between(a, b, fx(2.0)))
        .unwrap();

    ticks(&mut world, &mut schedule, 5);
    let error = (distance(&world, a, b) - fx(2.0)).abs();
    assert!(error <= fx(0.01), "rest length drifted by {error:?}");
}

#[test]
fn stretched_distance_joint_converges_to_rest_length() {
    let (mut world, mut schedule) = physics_world();
    no_sleep(&mut world);
    let a = spawn_body(&mut world, -1.0, 0.0);
    let b = spawn_body(&mut world, 1.5, 0.0);
    let joint = world.spawn();
    world
        .add_component(joint, DistanceJoint2D::between(a, b, fx(2.0)))
        .unwrap();

    ticks(&mut world, &mut schedule, 60);
    let error = (distance(&world, a, b) - fx(2.0)).abs();
    assert!(error <= fx(0.05), "still {error:?} from rest after 1 s");
}

#[test]
fn distance_joint_breaks_past_its_impulse_threshold() {
    let (mut world, mut schedule) = physics_world();
    no_sleep(&mut world);
    let a = spawn_body(&mut world, -1.0, 0.0);
    let b = spawn_body(&mut world, 3.0, 0.0);
    let joint = world.spawn();
    let mut config = DistanceJoint2D::between(a, b, fx(2.0));
    config.break_impulse = fx(0.001);
    world.add_component(joint, config).unwrap();

    ticks(&mut world, &mut schedule, 2);
    assert!(
        world.get::<DistanceJoint2D>(joint).unwrap().broken,
        "tiny threshold must trip on the first correction"
    );

    // A broken joint stops influencing its bodies.
    let va = body(&world, a).velocity;
    let vb = body(&world, b).velocity;
    ticks(&mut world, &mut schedule, 5);
    assert_eq!(body(&world, a).velocity, va);
    assert_eq!(body(&world, b).velocity, vb);
}

#[test]
fn revolute_joint_pins_the_orbiting_body_to_its_anchor_radius() {
    let (mut world, mut schedule) = physics_world();
    no_sleep(&mut world);
    let pivot = world.spawn();
    world
        .add_component(pivot, Body2D::immovable(v2(0.0, 0.0)))
        .unwrap();
    let orbiter = spawn_body(&mut world, 1.0, 0.0);
    world.get_mut::<Body2D>(orbiter).unwrap().velocity = v2(0.0, 1.0);

    let joint = world.spawn();
    world
        .add_component(
            joint,
            RevoluteJoint2D::at_world_point(pivot, orbiter, v2(1.0, 0.0), Vec2Fx::ZERO),
        )
        .unwrap();

    ticks(&mut world, &mut schedule, 60);
    let radius = body(&world, orbiter).position.length();
    let error = (radius - Fx::ONE).abs();
    assert!(error <= fx(0.05), "anchor radius drifted by {error:?}");
}

#[test]
fn prismatic_joint_confines_motion_to_its_axis() {
    let (mut world, mut schedule) = physics_world();
    no_sleep(&mut world);
    let rail = world.spawn();
    world
        .add_component(rail, Body2D::immovable(v2(0.0, 0.0)))
        .unwrap();
    let slider = spawn_body(&mut world, 1.0, 0.0);
    world.get_mut::<Body2D>(slider).unwrap().velocity = v2(0.5, 2.0);

    let joint = world.spawn();
    world
        .add_component(
            joint,
            PrismaticJoint2D::along(rail, slider, Vec2Fx::new(Fx::ONE, Fx::ZERO)),
        )
        .unwrap();

    ticks(&mut world, &mut schedule, 30);
    let state = body(&world, slider);
    assert!(
        state.velocity.y.abs() <= fx(0.02),
        "perpendicular velocity survives: {:?}",
        state.velocity
    );
    assert!(
        state.position.y.abs() <= fx(0.08),
        "slider left the axis: {:?}",
        state.position
    );
    assert!(state.position.x > fx(1.0), "axis motion must continue");
}

#[test]
fn prismatic_motor_drives_toward_its_target_speed() {
    let (mut world, mut schedule) = physics_world();
    no_sleep(&mut world);
    let rail = world.spawn();
    world
        .add_component(rail, Body2D::immovable(v2(0.0, 0.0)))
        .unwrap();
    let slider = spawn_body(&mut world, 0.0, 0.0);

    let joint = world.spawn();
    let mut config = PrismaticJoint2D::along(rail, slider, Vec2Fx::new(Fx::ONE, Fx::ZERO));
    config.enable_motor = true;
    config.motor_speed = Fx::ONE;
    config.max_motor_impulse = fx(100.0);
    world.add_component(joint, config).unwrap();

    ticks(&mut world, &mut schedule, 30);
    let vx = body(&world, slider).velocity.x;
    assert!(
        (vx - Fx::ONE).abs() <= fx(0.05),
        "motor speed not reached: {vx:?}"
    );
}

#[test]
fn prismatic_limit_arrests_motion_at_the_upper_bound() {
    let (mut world, mut schedule) = physics_world();
    no_sleep(&mut world);
    let rail = world.spawn();
    world
        .add_component(rail, Body2D::immovable(v2(0.0, 0.0)))
        .unwrap();
    let slider = spawn_body(&mut world, 0.0, 0.0);
    world.get_mut::<Body2D>(slider).unwrap().velocity = v2(2.0, 0.0);

    let joint = world.spawn();
    let mut config = PrismaticJoint2D::along(rail, slider, Vec2Fx::new(Fx::ONE, Fx::ZERO));
    config.enable_limit = true;
    config.lower = fx(-1.0);
    config.upper = fx(1.0);
    world.add_component(joint, config).unwrap();

    ticks(&mut world, &mut schedule, 120);
    let px = body(&world, slider).position.x;
    assert!(
        px <= fx(1.15),
        "slider blew through the upper limit: {px:?}"
    );
}

#[test]
fn joint_between_awake_and_sleeping_bodies_wakes_the_sleeper() {
    let (mut world, mut schedule) = physics_world();
    let sleeper = spawn_body(&mut world, 0.0, 0.0);
    // Let it fall asleep first (default 0.5 s).
    ticks(&mut world, &mut schedule, 40);
    assert!(!body(&world, sleeper).awake);

    let mover = spawn_body(&mut world, 2.5, 0.0);
    world.get_mut::<Body2D>(mover).unwrap().velocity = v2(1.0, 0.0);
    let joint = world.spawn();
    world
        .add_component(joint, DistanceJoint2D::between(sleeper, mover, fx(2.0)))
        .unwrap();

    ticks(&mut world, &mut schedule, 1);
    assert!(
        body(&world, sleeper).awake,
        "joint coupling must wake the sleeping endpoint"
    );
}
