// SPDX-License-Identifier: Apache-2.0
//! Physics pipeline registration.
//!
//! Installs the physics systems into the `update` stage as one ordered set:
//!
//! ```text
//! sync-shapes -> broadphase -> ccd-detect -> toi-sort -> toi-solve
//!   -> narrowphase -> materials -> warm-start -> joints -> solve
//!   -> commit -> integrate -> sleep
//! ```
//!
//! The startup system introduces every physics resource (and the profiler)
//! so nothing global lives outside the world.

use ember_core::{
    Schedule, ScheduleError, SetConfig, Stage, SystemConfig, SystemError, SystemProfiler, World,
};
use ember_math::Fx;

use crate::ccd;
use crate::joint::{DistanceBatch, PrismaticBatch, RevoluteBatch};
use crate::material::MaterialTable2D;
use crate::resources::{
    Broadphase2D, BroadphasePairs, ContactCache, Contacts2D, PhysicsConfig, ToiQueue,
};
use crate::solver;
use crate::step;

/// Name of the ordering set every physics system belongs to.
pub const PHYSICS_SET: &str = "physics";

/// System names, exposed so hosts can order against individual passes.
pub mod names {
    /// Startup resource installation.
    pub const STARTUP: &str = "phys/startup";
    /// World-shape cache sync.
    pub const SYNC_SHAPES: &str = "phys/sync_shapes";
    /// Sweep-and-prune pairing.
    pub const BROADPHASE: &str = "phys/broadphase";
    /// Continuous-collision detection.
    pub const CCD_DETECT: &str = "phys/ccd_detect";
    /// TOI queue sort and dedup.
    pub const TOI_SORT: &str = "phys/toi_sort";
    /// TOI mini-solve.
    pub const TOI_SOLVE: &str = "phys/toi_solve";
    /// Narrowphase manifold generation.
    pub const NARROWPHASE: &str = "phys/narrowphase";
    /// Contact material composition.
    pub const MATERIALS: &str = "phys/materials";
    /// Warm-start impulse application.
    pub const WARM_START: &str = "phys/warm_start";
    /// Joint batch construction.
    pub const BUILD_JOINTS: &str = "phys/build_joints";
    /// Gauss-Seidel iterations.
    pub const SOLVE: &str = "phys/solve";
    /// Impulse cache commit.
    pub const COMMIT: &str = "phys/commit";
    /// Velocity integration.
    pub const INTEGRATE: &str = "phys/integrate";
    /// Sleep management.
    pub const SLEEP: &str = "phys/sleep";
}

/// Inserts every physics resource the pipeline expects, leaving existing
/// values (host overrides) untouched.
pub fn install_resources(world: &mut World) {
    if world.resource::<PhysicsConfig>().is_none() {
        world.insert_resource(PhysicsConfig::default());
    }
    if world.resource::<Contacts2D>().is_none() {
        world.insert_resource(Contacts2D::default());
    }
    if world.resource::<ContactCache>().is_none() {
        world.insert_resource(ContactCache::default());
    }
    if world.resource::<Broadphase2D>().is_none() {
        world.insert_resource(Broadphase2D::default());
    }
    if world.resource::<BroadphasePairs>().is_none() {
        world.insert_resource(BroadphasePairs::default());
    }
    if world.resource::<ToiQueue>().is_none() {
        world.insert_resource(ToiQueue::default());
    }
    if world.resource::<MaterialTable2D>().is_none() {
        world.insert_resource(MaterialTable2D::default());
    }
    if world.resource::<DistanceBatch>().is_none() {
        world.insert_resource(DistanceBatch::default());
    }
    if world.resource::<RevoluteBatch>().is_none() {
        world.insert_resource(RevoluteBatch::default());
    }
    if world.resource::<PrismaticBatch>().is_none() {
        world.insert_resource(PrismaticBatch::default());
    }
    if world.resource::<SystemProfiler>().is_none() {
        world.insert_resource(SystemProfiler::default());
    }
}

/// Registers the physics set and all pipeline systems on a schedule.
pub fn install_physics(schedule: &mut Schedule) -> Result<(), ScheduleError> {
    schedule.configure_set(SetConfig::new(PHYSICS_SET, Stage::Update))?;

    schedule.add_system(SystemConfig::new(names::STARTUP, Stage::Startup, |ctx| {
        install_resources(ctx.world);
        Ok(())
    }))?;

    type Pass = fn(&mut World, Fx) -> Result<(), SystemError>;
    let chain: [(&str, Pass); 13] = [
        (names::SYNC_SHAPES, |world, dt| {
            step::sync_world_shapes(world, dt).map_err(SystemError::from)
        }),
        (names::BROADPHASE, |world, _| {
            step::update_broadphase(world);
            Ok(())
        }),
        (names::CCD_DETECT, |world, dt| {
            ccd::detect(world, dt);
            Ok(())
        }),
        (names::TOI_SORT, |world, _| {
            ccd::sort_dedup(world);
            Ok(())
        }),
        (names::TOI_SOLVE, |world, dt| {
            ccd::mini_solve(world, dt);
            Ok(())
        }),
        (names::NARROWPHASE, |world, _| {
            step::run_narrowphase(world);
            Ok(())
        }),
        (names::MATERIALS, |world, _| {
            solver::build_contact_materials(world);
            Ok(())
        }),
        (names::WARM_START, |world, _| {
            solver::warm_start(world);
            Ok(())
        }),
        (names::BUILD_JOINTS, |world, dt| {
            solver::build_joint_batches(world, dt);
            Ok(())
        }),
        (names::SOLVE, |world, dt| {
            solver::solve_iterations(world, dt);
            Ok(())
        }),
        (names::COMMIT, |world, _| {
            solver::commit_impulses(world);
            Ok(())
        }),
        (names::INTEGRATE, |world, dt| {
            step::integrate(world, dt);
            Ok(())
        }),
        (names::SLEEP, |world, dt| {
            step::update_sleep(world, dt);
            Ok(())
        }),
    ];

    let mut previous: Option<&str> = None;
    for (name, pass) in chain {
        let mut config = SystemConfig::new(name, Stage::Update, move |ctx| pass(ctx.world, ctx.dt))
            .in_set(PHYSICS_SET);
        if let Some(prev) = previous {
            config = config.after(prev);
        }
        schedule.add_system(config)?;
        previous = Some(name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::float_cmp)]

    use super::*;
    use ember_core::{Stage, SystemStatus};
    use ember_math::Fx;

    #[test]
    fn pipeline_installs_and_runs_in_declared_order() {
        let mut schedule = Schedule::new();
        install_physics(&mut schedule).unwrap();
        let mut world = World::new();
        let report = schedule.tick(&mut world, Fx::from_ratio(1, 60)).unwrap();

        let update_names: Vec<&str> = report
            .outcomes
            .iter()
            .filter(|o| o.stage == Stage::Update)
            .map(|o| o.name.as_str())
            .collect();
        assert_eq!(
            update_names,
            vec![
                names::SYNC_SHAPES,
                names::BROADPHASE,
                names::CCD_DETECT,
                names::TOI_SORT,
                names::TOI_SOLVE,
                names::NARROWPHASE,
                names::MATERIALS,
                names::WARM_START,
                names::BUILD_JOINTS,
                names::SOLVE,
                names::COMMIT,
                names::INTEGRATE,
                names::SLEEP,
            ]
        );
        assert!(report
            .outcomes
            .iter()
            .all(|o| o.status == SystemStatus::Ran));
        assert!(world.resource::<PhysicsConfig>().is_some());
        assert!(world.resource::<Contacts2D>().is_some());
    }

    #[test]
    fn host_config_survives_startup() {
        let mut schedule = Schedule::new();
        install_physics(&mut schedule).unwrap();
        let mut world = World::new();
        let custom = PhysicsConfig {
            iterations: 12,
            ..PhysicsConfig::default()
        };
        world.insert_resource(custom);
        schedule.tick(&mut world, Fx::from_ratio(1, 60)).unwrap();
        assert_eq!(world.resource::<PhysicsConfig>().unwrap().iterations, 12);
    }
}
