// SPDX-License-Identifier: Apache-2.0
//! Staged system scheduler with deterministic topological ordering.
//!
//! Stages run in a fixed order: `startup` (first tick only), `preUpdate`,
//! `update`, `postUpdate`, `cleanup`. Within a stage, systems execute in the
//! stable topological order computed at build time from `before`/`after`
//! constraints and set membership; ties break by insertion order, never by
//! address or hash iteration.
//!
//! Sets are virtual nodes: a set's declared predecessors run before every
//! member and its successors after every member, encoded as a begin/end node
//! pair around the membership edges.
//!
//! Failure policy: a failing run-condition means "skip this tick"; a failing
//! system body is reported to the telemetry sink and the tick continues; a
//! cycle in the ordering graph is fatal and names the participating nodes.

use std::sync::Arc;
use std::time::Instant;

use ember_math::Fx;
use thiserror::Error;

use crate::command::CommandBuffer;
use crate::error::{ScheduleError, SystemError, WorldError};
use crate::profiler::SystemProfiler;
use crate::telemetry::{NullTelemetrySink, TelemetrySink};
use crate::world::World;

/// Execution stages in tick order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Runs once, on the first tick, before everything else.
    Startup,
    /// Input/preparation systems.
    PreUpdate,
    /// Main simulation systems (the physics pipeline lives here).
    Update,
    /// Reactions to the update (cameras, bookkeeping).
    PostUpdate,
    /// End-of-frame cleanup (channel clearing and the like).
    Cleanup,
}

/// Stages in execution order.
pub const STAGES: [Stage; 5] = [
    Stage::Startup,
    Stage::PreUpdate,
    Stage::Update,
    Stage::PostUpdate,
    Stage::Cleanup,
];

/// When a system's command buffer is applied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FlushPolicy {
    /// Flush immediately after the system returns.
    #[default]
    AfterEach,
    /// Accumulate and flush at stage end, in insertion order.
    AfterStage,
}

/// Per-system execution context handed to the system function.
pub struct SystemCtx<'a> {
    /// The world (exclusive access for the duration of the call).
    pub world: &'a mut World,
    /// This system's command buffer for deferred structural edits.
    pub commands: &'a mut CommandBuffer,
    /// Current frame number.
    pub frame: u64,
    /// Delta time forwarded from the driver, fixed-point seconds.
    pub dt: Fx,
}

/// System body. Errors are reported, never propagated.
pub type SystemFn = Box<dyn FnMut(&mut SystemCtx<'_>) -> Result<(), SystemError> + Send>;

/// Run-condition predicate; `Err` is treated as `false`.
pub type RunCondition = fn(&World) -> Result<bool, SystemError>;

/// Declarative component-access descriptor.
///
/// Execution is single-threaded, so this is metadata: a record of intent a
/// parallel dispatcher could validate against. It is carried and exposed but
/// never enforced at runtime.
#[derive(Clone, Debug, Default)]
pub struct SystemAccess {
    /// Component names read by the system.
    pub reads: Vec<&'static str>,
    /// Component names written by the system.
    pub writes: Vec<&'static str>,
}

/// Configuration for one system.
pub struct SystemConfig {
    name: String,
    stage: Stage,
    before: Vec<String>,
    after: Vec<String>,
    sets: Vec<String>,
    run_if: Option<RunCondition>,
    flush: FlushPolicy,
    access: SystemAccess,
    func: SystemFn,
}

impl SystemConfig {
    /// Creates a system with a unique name, a stage, and a body.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        stage: Stage,
        func: impl FnMut(&mut SystemCtx<'_>) -> Result<(), SystemError> + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            stage,
            before: Vec::new(),
            after: Vec::new(),
            sets: Vec::new(),
            run_if: None,
            flush: FlushPolicy::default(),
            access: SystemAccess::default(),
            func: Box::new(func),
        }
    }

    /// Orders this system before the named system or set.
    #[must_use]
    pub fn before(mut self, target: impl Into<String>) -> Self {
        self.before.push(target.into());
        self
    }

    /// Orders this system after the named system or set.
    #[must_use]
    pub fn after(mut self, target: impl Into<String>) -> Self {
        self.after.push(target.into());
        self
    }

    /// Adds this system to a configured set.
    #[must_use]
    pub fn in_set(mut self, set: impl Into<String>) -> Self {
        self.sets.push(set.into());
        self
    }

    /// Installs a run-condition.
    #[must_use]
    pub fn run_if(mut self, condition: RunCondition) -> Self {
        self.run_if = Some(condition);
        self
    }

    /// Switches the flush policy to flush-at-stage-end.
    #[must_use]
    pub fn flush_after_stage(mut self) -> Self {
        self.flush = FlushPolicy::AfterStage;
        self
    }

    /// Declares component access intent.
    #[must_use]
    pub fn with_access(mut self, access: SystemAccess) -> Self {
        self.access = access;
        self
    }
}

/// Configuration for a virtual ordering set.
#[derive(Clone, Debug)]
pub struct SetConfig {
    /// Unique set name (shares a namespace with system names).
    pub name: String,
    /// Stage the set's members run in.
    pub stage: Stage,
    /// Targets ordered after this set.
    pub before: Vec<String>,
    /// Targets ordered before this set.
    pub after: Vec<String>,
}

impl SetConfig {
    /// Creates a set in a stage with no constraints.
    #[must_use]
    pub fn new(name: impl Into<String>, stage: Stage) -> Self {
        Self {
            name: name.into(),
            stage,
            before: Vec::new(),
            after: Vec::new(),
        }
    }

    /// Orders the whole set before a target.
    #[must_use]
    pub fn before(mut self, target: impl Into<String>) -> Self {
        self.before.push(target.into());
        self
    }

    /// Orders the whole set after a target.
    #[must_use]
    pub fn after(mut self, target: impl Into<String>) -> Self {
        self.after.push(target.into());
        self
    }
}

/// How one system concluded within a tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SystemStatus {
    /// The body ran and returned `Ok`.
    Ran,
    /// The run-condition returned `false` (or failed).
    Skipped,
    /// The body returned an error; the tick continued.
    Failed(String),
}

/// Per-system record in a [`TickReport`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SystemOutcome {
    /// System name.
    pub name: String,
    /// Stage it ran in.
    pub stage: Stage,
    /// What happened.
    pub status: SystemStatus,
}

/// Receipt for one tick: what ran, what was skipped, what flushed.
#[derive(Clone, Debug, Default)]
pub struct TickReport {
    /// Frame the tick executed as.
    pub frame: u64,
    /// Outcomes in execution order.
    pub outcomes: Vec<SystemOutcome>,
    /// Total commands applied by flushes this tick.
    pub commands_applied: usize,
}

/// Errors surfaced by [`Schedule::tick`].
#[derive(Debug, Error)]
pub enum TickError {
    /// The schedule failed to build (duplicate names, unknown targets,
    /// cycles). Fatal until the schedule is reconfigured.
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    /// A command-buffer flush failed; the flush aborted and the error
    /// propagates to the caller.
    #[error("command flush failed: {0}")]
    Flush(#[from] WorldError),
}

struct SystemNode {
    config: SystemConfig,
    buffer: CommandBuffer,
}

/// The staged scheduler.
pub struct Schedule {
    systems: Vec<SystemNode>,
    sets: Vec<SetConfig>,
    /// Topological order per stage (indices into `systems`), once built.
    order: Vec<Vec<usize>>,
    built: bool,
    startup_done: bool,
    telemetry: Arc<dyn TelemetrySink>,
}

impl Default for Schedule {
    fn default() -> Self {
        Self::new()
    }
}

impl Schedule {
    /// Creates an empty schedule with the null telemetry sink.
    #[must_use]
    pub fn new() -> Self {
        Self {
            systems: Vec::new(),
            sets: Vec::new(),
            order: Vec::new(),
            built: false,
            startup_done: false,
            telemetry: Arc::new(NullTelemetrySink),
        }
    }

    /// Installs a telemetry sink.
    pub fn set_telemetry(&mut self, sink: Arc<dyn TelemetrySink>) {
        self.telemetry = sink;
    }

    /// Registers a system. Names must be unique across all stages.
    pub fn add_system(&mut self, config: SystemConfig) -> Result<(), ScheduleError> {
        if self.systems.iter().any(|n| n.config.name == config.name)
            || self.sets.iter().any(|s| s.name == config.name)
        {
            return Err(ScheduleError::DuplicateSystemName(config.name));
        }
        self.systems.push(SystemNode {
            config,
            buffer: CommandBuffer::new(),
        });
        self.built = false;
        Ok(())
    }

    /// Declares an ordering set.
    pub fn configure_set(&mut self, set: SetConfig) -> Result<(), ScheduleError> {
        if self.sets.iter().any(|s| s.name == set.name)
            || self.systems.iter().any(|n| n.config.name == set.name)
        {
            return Err(ScheduleError::DuplicateSystemName(set.name));
        }
        self.sets.push(set);
        self.built = false;
        Ok(())
    }

    /// Builds the per-stage topological order. Called implicitly by the
    /// first `tick` after a configuration change.
    pub fn build(&mut self) -> Result<(), ScheduleError> {
        let mut order = Vec::with_capacity(STAGES.len());
        for stage in STAGES {
            order.push(self.build_stage(stage)?);
        }
        self.order = order;
        self.built = true;
        Ok(())
    }

    /// Executes one tick.
    ///
    /// `dt` is forwarded to systems as their delta time. The world's frame
    /// counter advances exactly once per tick.
    pub fn tick(&mut self, world: &mut World, dt: Fx) -> Result<TickReport, TickError> {
        if !self.built {
            self.build()?;
        }
        world.begin_frame();
        let frame = world.frame();
        self.telemetry.on_tick_begin(frame);

        let mut report = TickReport {
            frame,
            outcomes: Vec::new(),
            commands_applied: 0,
        };

        for (stage_index, stage) in STAGES.iter().enumerate() {
            if *stage == Stage::Startup && self.startup_done {
                continue;
            }
            let run_order = self.order[stage_index].clone();
            let mut deferred_flushes: Vec<usize> = Vec::new();

            for system_index in run_order {
                let status = self.run_system(system_index, world, dt, frame);
                let node = &self.systems[system_index];
                report.outcomes.push(SystemOutcome {
                    name: node.config.name.clone(),
                    stage: *stage,
                    status,
                });
                match node.config.flush {
                    FlushPolicy::AfterEach => {
                        report.commands_applied += self.flush_one(system_index, world, frame)?;
                    }
                    FlushPolicy::AfterStage => deferred_flushes.push(system_index),
                }
            }
            for system_index in deferred_flushes {
                report.commands_applied += self.flush_one(system_index, world, frame)?;
            }
        }

        self.startup_done = true;
        self.telemetry.on_tick_end(frame);
        Ok(report)
    }

    /// Whether startup systems have already run.
    #[must_use]
    pub fn startup_complete(&self) -> bool {
        self.startup_done
    }

    /// Access metadata for a system, if registered.
    #[must_use]
    pub fn system_access(&self, name: &str) -> Option<&SystemAccess> {
        self.systems
            .iter()
            .find(|n| n.config.name == name)
            .map(|n| &n.config.access)
    }

    // ------------------------------------------------------------------

    fn run_system(
        &mut self,
        system_index: usize,
        world: &mut World,
        dt: Fx,
        frame: u64,
    ) -> SystemStatus {
        let node = &mut self.systems[system_index];
        let name = node.config.name.clone();
        let stage = node.config.stage;

        if let Some(condition) = node.config.run_if {
            match condition(world) {
                Ok(true) => {}
                Ok(false) => return SystemStatus::Skipped,
                Err(err) => {
                    self.telemetry
                        .on_run_condition_error(&name, frame, &err.message);
                    return SystemStatus::Skipped;
                }
            }
        }

        self.telemetry.on_system_start(&name, frame);
        let start = Instant::now();
        let result = {
            let mut ctx = SystemCtx {
                world: &mut *world,
                commands: &mut node.buffer,
                frame,
                dt,
            };
            (node.config.func)(&mut ctx)
        };
        let seconds = start.elapsed().as_secs_f64();

        let errored = result.is_err();
        if let Some(profiler) = world.resource_mut::<SystemProfiler>() {
            profiler.record(&name, stage, seconds, errored);
        }

        match result {
            Ok(()) => {
                self.telemetry.on_system_end(&name, frame);
                SystemStatus::Ran
            }
            Err(err) => {
                self.telemetry.on_system_error(&name, frame, &err.message);
                SystemStatus::Failed(err.message)
            }
        }
    }

    fn flush_one(
        &mut self,
        system_index: usize,
        world: &mut World,
        frame: u64,
    ) -> Result<usize, WorldError> {
        let buffer = &mut self.systems[system_index].buffer;
        if buffer.is_empty() {
            return Ok(0);
        }
        let count = buffer.len();
        buffer.flush(world)?;
        self.telemetry.on_flush(count, frame);
        Ok(count)
    }

    /// Builds one stage's dependency graph and runs Kahn's algorithm.
    fn build_stage(&self, stage: Stage) -> Result<Vec<usize>, ScheduleError> {
        // Node table: systems of this stage first (insertion order), then a
        // begin/end virtual pair per set of this stage.
        let members: Vec<usize> = self
            .systems
            .iter()
            .enumerate()
            .filter(|(_, n)| n.config.stage == stage)
            .map(|(i, _)| i)
            .collect();
        let sets: Vec<&SetConfig> = self.sets.iter().filter(|s| s.stage == stage).collect();

        let node_count = members.len() + sets.len() * 2;
        let mut names: Vec<String> = Vec::with_capacity(node_count);
        for &i in &members {
            names.push(self.systems[i].config.name.clone());
        }
        for set in &sets {
            names.push(set.name.clone());
            names.push(format!("{} (end)", set.name));
        }

        let system_node = |name: &str| -> Option<usize> {
            members
                .iter()
                .position(|&i| self.systems[i].config.name == name)
        };
        let set_nodes = |name: &str| -> Option<(usize, usize)> {
            sets.iter().position(|s| s.name == name).map(|p| {
                let begin = members.len() + p * 2;
                (begin, begin + 1)
            })
        };
        // An ordering target resolves to the node new edges should attach
        // to: (entry, exit). For systems both are the node itself; for sets
        // edges in attach to begin and edges out leave from end.
        let resolve = |owner: &str, name: &str| -> Result<(usize, usize), ScheduleError> {
            if let Some(node) = system_node(name) {
                return Ok((node, node));
            }
            if let Some((begin, end)) = set_nodes(name) {
                return Ok((begin, end));
            }
            Err(ScheduleError::UnknownOrderingTarget {
                system: owner.to_owned(),
                target: name.to_owned(),
            })
        };

        let mut edges: Vec<(usize, usize)> = Vec::new();
        for (local, &i) in members.iter().enumerate() {
            let config = &self.systems[i].config;
            for target in &config.after {
                let (_, exit) = resolve(&config.name, target)?;
                edges.push((exit, local));
            }
            for target in &config.before {
                let (entry, _) = resolve(&config.name, target)?;
                edges.push((local, entry));
            }
            for set_name in &config.sets {
                let (begin, end) = set_nodes(set_name).ok_or_else(|| {
                    ScheduleError::UnknownOrderingTarget {
                        system: config.name.clone(),
                        target: set_name.clone(),
                    }
                })?;
                edges.push((begin, local));
                edges.push((local, end));
            }
        }
        for (position, set) in sets.iter().enumerate() {
            let begin = members.len() + position * 2;
            let end = begin + 1;
            edges.push((begin, end));
            for target in &set.after {
                let (_, exit) = resolve(&set.name, target)?;
                edges.push((exit, begin));
            }
            for target in &set.before {
                let (entry, _) = resolve(&set.name, target)?;
                edges.push((end, entry));
            }
        }

        // Kahn's algorithm with insertion-order tie-break.
        let mut in_degree = vec![0_usize; node_count];
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); node_count];
        for &(from, to) in &edges {
            successors[from].push(to);
            in_degree[to] += 1;
        }
        let mut ready: Vec<usize> = (0..node_count).filter(|&n| in_degree[n] == 0).collect();
        let mut output = Vec::with_capacity(members.len());
        let mut emitted = 0_usize;
        while !ready.is_empty() {
            // Smallest node index first: systems sort by insertion order and
            // virtual nodes never appear in the output.
            let next = ready
                .iter()
                .copied()
                .min()
                .unwrap_or_default();
            ready.retain(|&n| n != next);
            emitted += 1;
            if next < members.len() {
                output.push(members[next]);
            }
            for &succ in &successors[next] {
                in_degree[succ] -= 1;
                if in_degree[succ] == 0 {
                    ready.push(succ);
                }
            }
        }
        if emitted != node_count {
            let nodes = (0..node_count)
                .filter(|&n| in_degree[n] > 0)
                .map(|n| names[n].clone())
                .collect();
            return Err(ScheduleError::Cycle { nodes });
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::float_cmp)]

    use super::*;

    fn noop() -> impl FnMut(&mut SystemCtx<'_>) -> Result<(), SystemError> + Send + 'static {
        |_| Ok(())
    }

    fn names(report: &TickReport, stage: Stage) -> Vec<String> {
        report
            .outcomes
            .iter()
            .filter(|o| o.stage == stage)
            .map(|o| o.name.clone())
            .collect()
    }

    #[test]
    fn before_after_orders_systems() {
        let mut schedule = Schedule::new();
        schedule
            .add_system(SystemConfig::new("c", Stage::Update, noop()).after("b"))
            .unwrap();
        schedule
            .add_system(SystemConfig::new("a", Stage::Update, noop()).before("b"))
            .unwrap();
        schedule
            .add_system(SystemConfig::new("b", Stage::Update, noop()))
            .unwrap();

        let mut world = World::new();
        let report = schedule.tick(&mut world, Fx::from_ratio(1, 60)).unwrap();
        assert_eq!(names(&report, Stage::Update), vec!["a", "b", "c"]);
    }

    #[test]
    fn ties_break_by_insertion_order() {
        let mut schedule = Schedule::new();
        for name in ["x", "y", "z"] {
            schedule
                .add_system(SystemConfig::new(name, Stage::Update, noop()))
                .unwrap();
        }
        let mut world = World::new();
        let report = schedule.tick(&mut world, Fx::from_ratio(1, 60)).unwrap();
        assert_eq!(names(&report, Stage::Update), vec!["x", "y", "z"]);
    }

    #[test]
    fn sets_fence_their_members() {
        let mut schedule = Schedule::new();
        schedule
            .configure_set(SetConfig::new("physics", Stage::Update).after("input"))
            .unwrap();
        schedule
            .add_system(SystemConfig::new("render-prep", Stage::Update, noop()).after("physics"))
            .unwrap();
        schedule
            .add_system(SystemConfig::new("solver", Stage::Update, noop()).in_set("physics"))
            .unwrap();
        schedule
            .add_system(SystemConfig::new("input", Stage::Update, noop()))
            .unwrap();

        let mut world = World::new();
        let report = schedule.tick(&mut world, Fx::from_ratio(1, 60)).unwrap();
        assert_eq!(
            names(&report, Stage::Update),
            vec!["input", "solver", "render-prep"]
        );
    }

    #[test]
    fn cycle_is_fatal_and_names_nodes() {
        let mut schedule = Schedule::new();
        schedule
            .add_system(SystemConfig::new("a", Stage::Update, noop()).after("b"))
            .unwrap();
        schedule
            .add_system(SystemConfig::new("b", Stage::Update, noop()).after("a"))
            .unwrap();
        let err = schedule.build().unwrap_err();
        match err {
            ScheduleError::Cycle { nodes } => {
                assert!(nodes.contains(&"a".to_owned()));
                assert!(nodes.contains(&"b".to_owned()));
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut schedule = Schedule::new();
        schedule
            .add_system(SystemConfig::new("dup", Stage::Update, noop()))
            .unwrap();
        let err = schedule
            .add_system(SystemConfig::new("dup", Stage::PostUpdate, noop()))
            .unwrap_err();
        assert_eq!(err, ScheduleError::DuplicateSystemName("dup".to_owned()));
    }

    #[test]
    fn startup_runs_exactly_once() {
        let mut schedule = Schedule::new();
        schedule
            .add_system(SystemConfig::new("init", Stage::Startup, |ctx| {
                ctx.world.insert_resource(1_u32);
                Ok(())
            }))
            .unwrap();
        schedule
            .add_system(SystemConfig::new("count", Stage::Update, |ctx| {
                if let Some(counter) = ctx.world.resource_mut::<u32>() {
                    *counter += 1;
                }
                Ok(())
            }))
            .unwrap();

        let mut world = World::new();
        let dt = Fx::from_ratio(1, 60);
        let first = schedule.tick(&mut world, dt).unwrap();
        assert!(names(&first, Stage::Startup).contains(&"init".to_owned()));
        let second = schedule.tick(&mut world, dt).unwrap();
        assert!(names(&second, Stage::Startup).is_empty());
        assert_eq!(world.resource::<u32>(), Some(&3));
    }

    #[test]
    fn failed_system_does_not_stop_the_tick() {
        let mut schedule = Schedule::new();
        schedule
            .add_system(SystemConfig::new("boom", Stage::Update, |_| {
                Err(SystemError::new("deliberate"))
            }))
            .unwrap();
        schedule
            .add_system(SystemConfig::new("after-boom", Stage::Update, noop()).after("boom"))
            .unwrap();

        let mut world = World::new();
        let report = schedule.tick(&mut world, Fx::from_ratio(1, 60)).unwrap();
        let update = names(&report, Stage::Update);
        assert_eq!(update, vec!["boom", "after-boom"]);
        assert!(matches!(
            report.outcomes.iter().find(|o| o.name == "boom").map(|o| &o.status),
            Some(SystemStatus::Failed(_))
        ));
    }

    #[test]
    fn run_condition_error_means_skip() {
        let mut schedule = Schedule::new();
        schedule
            .add_system(
                SystemConfig::new("guarded", Stage::Update, noop())
                    .run_if(|_| Err(SystemError::new("predicate blew up"))),
            )
            .unwrap();
        let mut world = World::new();
        let report = schedule.tick(&mut world, Fx::from_ratio(1, 60)).unwrap();
        assert_eq!(
            report.outcomes[0].status,
            SystemStatus::Skipped,
            "a throwing run-condition is treated as false"
        );
    }

    #[test]
    fn profiler_resource_records_system_timings() {
        use crate::profiler::SystemProfiler;

        let mut schedule = Schedule::new();
        schedule
            .add_system(SystemConfig::new("timed", Stage::Update, noop()))
            .unwrap();
        schedule
            .add_system(SystemConfig::new("broken", Stage::Update, |_| {
                Err(SystemError::new("boom"))
            }))
            .unwrap();

        let mut world = World::new();
        world.insert_resource(SystemProfiler::default());
        let dt = Fx::from_ratio(1, 60);
        schedule.tick(&mut world, dt).unwrap();
        schedule.tick(&mut world, dt).unwrap();

        let profiler = world.resource::<SystemProfiler>().unwrap();
        let timed = profiler.entry("timed", Stage::Update).unwrap();
        assert_eq!(timed.calls, 2);
        assert!(!timed.errored);
        assert!(timed.max >= timed.last);
        let broken = profiler.entry("broken", Stage::Update).unwrap();
        assert!(broken.errored, "failed call marks the profile");
    }

    #[test]
    fn access_metadata_is_retained_for_inspection() {
        let mut schedule = Schedule::new();
        schedule
            .add_system(
                SystemConfig::new("integrate", Stage::Update, noop()).with_access(SystemAccess {
                    reads: vec!["Shape2D"],
                    writes: vec!["Body2D"],
                }),
            )
            .unwrap();
        let access = schedule.system_access("integrate").unwrap();
        assert_eq!(access.writes, vec!["Body2D"]);
        assert!(schedule.system_access("missing").is_none());
    }

    #[test]
    fn after_stage_flushes_run_in_insertion_order() {
        let mut schedule = Schedule::new();
        schedule
            .add_system(
                SystemConfig::new("spawner", Stage::Update, |ctx| {
                    let pending = ctx.commands.create_entity();
                    ctx.commands.add_component(pending, Marker(1));
                    Ok(())
                })
                .flush_after_stage(),
            )
            .unwrap();
        schedule
            .add_system(
                SystemConfig::new("observer", Stage::Update, |ctx| {
                    // Runs in the same stage before the deferred flush: must
                    // not see the entity yet.
                    assert_eq!(ctx.world.live_entities().len(), 0);
                    Ok(())
                })
                .after("spawner"),
            )
            .unwrap();

        #[derive(Debug)]
        struct Marker(#[allow(dead_code)] u8);
        impl crate::component::Component for Marker {
            const NAME: &'static str = "Marker";
        }

        let mut world = World::new();
        schedule.tick(&mut world, Fx::from_ratio(1, 60)).unwrap();
        assert_eq!(world.live_entities().len(), 1, "flush landed at stage end");
    }
}
