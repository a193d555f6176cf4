// SPDX-License-Identifier: Apache-2.0
//! Telemetry sink: the scheduler's diagnostics boundary.
//!
//! The deterministic core never prints. Anything worth observing (system
//! start/end, failures, flush batches) is reported through this trait so
//! hosts can adapt it to their logging stack. The default sink drops
//! everything.

/// Receiver for scheduler diagnostics. All methods default to no-ops.
pub trait TelemetrySink: Send + Sync {
    /// A tick began on `frame`.
    fn on_tick_begin(&self, frame: u64) {
        let _ = frame;
    }

    /// The tick for `frame` completed.
    fn on_tick_end(&self, frame: u64) {
        let _ = frame;
    }

    /// A system is about to run.
    fn on_system_start(&self, name: &str, frame: u64) {
        let _ = (name, frame);
    }

    /// A system returned successfully.
    fn on_system_end(&self, name: &str, frame: u64) {
        let _ = (name, frame);
    }

    /// A system body failed; the tick continues with the next system.
    fn on_system_error(&self, name: &str, frame: u64, message: &str) {
        let _ = (name, frame, message);
    }

    /// A run-condition failed; treated as "do not run this tick".
    fn on_run_condition_error(&self, name: &str, frame: u64, message: &str) {
        let _ = (name, frame, message);
    }

    /// Command buffers were flushed (`count` commands applied).
    fn on_flush(&self, count: usize, frame: u64) {
        let _ = (count, frame);
    }
}

/// Sink that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTelemetrySink;

impl TelemetrySink for NullTelemetrySink {}
