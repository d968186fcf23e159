//! Wall-clock timing of a conversation turn.
//!
//! A [`Benchmark`] measures one turn and any number of labelled phases
//! inside it. The result is plain data the caller can log or forward.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Snapshot label for the instant activation check.
pub const INSTANT_ACTIVATION: &str = "Instant activation commands";
/// Snapshot label for provider calls.
pub const LLM_PROCESSING: &str = "LLM Processing";
/// Snapshot label for tool and skill execution.
pub const COMMANDS_AND_SKILLS: &str = "AI Commands & Skills";

/// Timing of a finished benchmark or phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    /// What was measured.
    pub label: String,
    /// Elapsed time in milliseconds.
    pub execution_time_ms: f64,
    /// Elapsed time for display, e.g. `"850ms"` or `"1.4s"`.
    pub formatted_execution_time: String,
    /// Phases measured inside this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub snapshots: Vec<BenchmarkResult>,
}

impl BenchmarkResult {
    fn new(label: String, elapsed: Duration, snapshots: Vec<Self>) -> Self {
        Self {
            label,
            execution_time_ms: elapsed.as_secs_f64() * 1000.0,
            formatted_execution_time: format_duration(elapsed),
            snapshots,
        }
    }
}

impl fmt::Display for BenchmarkResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.formatted_execution_time)?;
        for snapshot in &self.snapshots {
            write!(f, "\n  {snapshot}")?;
        }
        Ok(())
    }
}

fn format_duration(elapsed: Duration) -> String {
    if elapsed < Duration::from_secs(1) {
        format!("{}ms", elapsed.as_millis())
    } else {
        format!("{:.1}s", elapsed.as_secs_f64())
    }
}

/// Running measurement of a turn.
#[derive(Debug)]
pub struct Benchmark {
    label: String,
    started: Instant,
    running: Option<(String, Instant)>,
    snapshots: Vec<BenchmarkResult>,
}

impl Benchmark {
    /// Start measuring.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            started: Instant::now(),
            running: None,
            snapshots: Vec::new(),
        }
    }

    /// Start a phase, finishing the running one first.
    pub fn start_snapshot(&mut self, label: impl Into<String>) {
        self.finish_snapshot();
        self.running = Some((label.into(), Instant::now()));
    }

    /// Finish the running phase, if any.
    pub fn finish_snapshot(&mut self) {
        if let Some((label, started)) = self.running.take() {
            self.snapshots
                .push(BenchmarkResult::new(label, started.elapsed(), Vec::new()));
        }
    }

    /// Time since the benchmark started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Stop measuring and return the result.
    #[must_use]
    pub fn finish(mut self) -> BenchmarkResult {
        self.finish_snapshot();
        BenchmarkResult::new(self.label, self.started.elapsed(), self.snapshots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshots_are_closed_in_order() {
        let mut benchmark = Benchmark::new("turn");
        benchmark.start_snapshot(INSTANT_ACTIVATION);
        benchmark.start_snapshot(LLM_PROCESSING);
        benchmark.finish_snapshot();
        benchmark.finish_snapshot();
        benchmark.start_snapshot(COMMANDS_AND_SKILLS);

        let result = benchmark.finish();
        let labels: Vec<&str> = result.snapshots.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, [INSTANT_ACTIVATION, LLM_PROCESSING, COMMANDS_AND_SKILLS]);
        assert!(result.execution_time_ms >= result.snapshots[0].execution_time_ms);
    }

    #[test]
    fn formatting_switches_to_seconds() {
        assert_eq!(format_duration(Duration::from_millis(850)), "850ms");
        assert_eq!(format_duration(Duration::from_millis(1420)), "1.4s");
    }
}
