// SPDX-License-Identifier: Apache-2.0
#![allow(missing_docs, clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]
//! Shared scenario scaffolding.

use ember_core::{Entity, Schedule, World};
use ember_geom::Shape2D;
use ember_math::{Fx, Vec2Fx};
use ember_physics::{install_physics, Body2D};

pub fn fx(v: f32) -> Fx {
    Fx::from_f32(v)
}

pub fn v2(x: f32, y: f32) -> Vec2Fx {
    Vec2Fx::new(fx(x), fx(y))
}

pub const DT: (i32, i32) = (1, 60);

pub fn dt() -> Fx {
    Fx::from_ratio(DT.0, DT.1)
}

/// World plus schedule with the physics pipeline installed.
pub fn physics_world() -> (World, Schedule) {
    let mut schedule = Schedule::new();
    install_physics(&mut schedule).unwrap();
    (World::new(), schedule)
}

pub fn tick(world: &mut World, schedule: &mut Schedule) {
    schedule.tick(world, dt()).unwrap();
}

pub fn ticks(world: &mut World, schedule: &mut Schedule, count: u32) {
    for _ in 0..count {
        tick(world, schedule);
    }
}

/// Dynamic unit-mass circle.
pub fn spawn_circle(world: &mut World, x: f32, y: f32, radius: f32, velocity: (f32, f32)) -> Entity {
    let entity = world.spawn();
    world
        .add_component(
            entity,
            Body2D::dynamic(v2(x, y), Fx::ONE).with_velocity(v2(velocity.0, velocity.1)),
        )
        .unwrap();
    world
        .add_component(entity, Shape2D::circle(fx(radius)))
        .unwrap();
    entity
}

/// Immovable axis-aligned box.
pub fn spawn_wall(world: &mut World, x: f32, y: f32, half_w: f32, half_h: f32) -> Entity {
    let entity = world.spawn();
    world
        .add_component(entity, Body2D::immovable(v2(x, y)))
        .unwrap();
    world
        .add_component(entity, Shape2D::rect(fx(half_w), fx(half_h)).unwrap())
        .unwrap();
    entity
}

pub fn body(world: &World, entity: Entity) -> Body2D {
    *world.get::<Body2D>(entity).unwrap()
}
