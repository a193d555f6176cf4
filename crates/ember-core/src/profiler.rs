// SPDX-License-Identifier: Apache-2.0
//! Per-system wall-time profiler, stored as a world resource.
//!
//! Timing is diagnostic only and never feeds back into simulation state, so
//! wall-clock jitter cannot break determinism. Entries are keyed by
//! (system name, stage) and keep the last sample, an exponential moving
//! average, the maximum, a call count, and an error flag.

use crate::schedule::Stage;

/// Default EMA smoothing factor.
pub const DEFAULT_EMA_ALPHA: f64 = 0.15;

/// One profiled system.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileEntry {
    /// System name.
    pub name: String,
    /// Stage the system runs in.
    pub stage: Stage,
    /// Last sample, seconds.
    pub last: f64,
    /// Exponential moving average, seconds.
    pub average: f64,
    /// Maximum sample since the last `reset_max`, seconds.
    pub max: f64,
    /// Number of recorded calls.
    pub calls: u64,
    /// Whether the most recent call failed.
    pub errored: bool,
}

/// Profiler resource: insert into the world to collect system timings.
#[derive(Debug)]
pub struct SystemProfiler {
    alpha: f64,
    entries: Vec<ProfileEntry>,
}

impl Default for SystemProfiler {
    fn default() -> Self {
        Self::new(DEFAULT_EMA_ALPHA)
    }
}

impl SystemProfiler {
    /// Creates a profiler with the given EMA smoothing factor.
    #[must_use]
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            entries: Vec::new(),
        }
    }

    /// Records one sample for `(name, stage)`.
    pub fn record(&mut self, name: &str, stage: Stage, seconds: f64, errored: bool) {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.stage == stage && e.name == name)
        {
            entry.last = seconds;
            entry.average += self.alpha * (seconds - entry.average);
            entry.max = entry.max.max(seconds);
            entry.calls += 1;
            entry.errored = errored;
        } else {
            self.entries.push(ProfileEntry {
                name: name.to_owned(),
                stage,
                last: seconds,
                average: seconds,
                max: seconds,
                calls: 1,
                errored,
            });
        }
    }

    /// Entry for a system, if it has run.
    #[must_use]
    pub fn entry(&self, name: &str, stage: Stage) -> Option<&ProfileEntry> {
        self.entries.iter().find(|e| e.stage == stage && e.name == name)
    }

    /// All entries in first-recorded order.
    #[must_use]
    pub fn entries(&self) -> &[ProfileEntry] {
        &self.entries
    }

    /// Resets every entry's maximum to its last sample.
    pub fn reset_max(&mut self) {
        for entry in &mut self.entries {
            entry.max = entry.last;
        }
    }

    /// Drops all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::float_cmp)]

    use super::*;

    #[test]
    fn ema_converges_toward_samples() {
        let mut profiler = SystemProfiler::new(0.5);
        profiler.record("solver", Stage::Update, 1.0, false);
        profiler.record("solver", Stage::Update, 3.0, false);
        let entry = profiler.entry("solver", Stage::Update).unwrap();
        assert_eq!(entry.calls, 2);
        assert_eq!(entry.last, 3.0);
        assert_eq!(entry.average, 2.0);
        assert_eq!(entry.max, 3.0);
    }

    #[test]
    fn reset_max_keeps_last() {
        let mut profiler = SystemProfiler::default();
        profiler.record("a", Stage::Update, 5.0, false);
        profiler.record("a", Stage::Update, 1.0, false);
        profiler.reset_max();
        assert_eq!(profiler.entry("a", Stage::Update).unwrap().max, 1.0);
    }

    #[test]
    fn same_name_different_stage_is_distinct() {
        let mut profiler = SystemProfiler::default();
        profiler.record("sync", Stage::PreUpdate, 1.0, false);
        profiler.record("sync", Stage::PostUpdate, 2.0, true);
        assert_eq!(profiler.entries().len(), 2);
        assert!(profiler.entry("sync", Stage::PostUpdate).unwrap().errored);
    }
}
