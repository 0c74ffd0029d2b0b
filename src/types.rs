use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use clap::ValueEnum;
use serde::Serialize;

/// One scheduled invocation of the analysis tool.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub workload: String,
    pub repetition: u32,
    pub timeout: Duration,
}

/// What the supervisor observed for a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed {
        exit_code: i32,
        stdout: String,
        stderr: String,
        elapsed: Duration,
    },
    TimedOut,
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    ExecutionError,
    ReportedFailure,
    Malformed,
}

impl FailureKind {
    pub const ALL: [FailureKind; 4] = [
        FailureKind::Timeout,
        FailureKind::ExecutionError,
        FailureKind::ReportedFailure,
        FailureKind::Malformed,
    ];

    /// Short label used in progress lines.
    pub fn label(self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::ExecutionError => "error",
            FailureKind::ReportedFailure => "failed",
            FailureKind::Malformed => "malformed",
        }
    }
}

/// Consolidated phase timings reported by the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Post,
    Future,
    Past,
    Join,
    Interference,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Post,
        Phase::Future,
        Phase::Past,
        Phase::Join,
        Phase::Interference,
    ];

    pub fn column(self) -> &'static str {
        match self {
            Phase::Post => "Post",
            Phase::Future => "Future",
            Phase::Past => "Past",
            Phase::Join => "Join",
            Phase::Interference => "Inter",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Post => "post",
            Phase::Future => "future",
            Phase::Past => "past",
            Phase::Join => "join",
            Phase::Interference => "interference",
        };
        f.write_str(name)
    }
}

/// Fully characterised successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunMetrics {
    pub total_ms: u64,
    pub iterations: u64,
    pub effects: u64,
    pub candidates: u64,
    pub phases: BTreeMap<Phase, u64>,
}

impl RunMetrics {
    pub fn value(&self, metric: Metric) -> Option<u64> {
        match metric {
            Metric::TotalTime => Some(self.total_ms),
            Metric::Iterations => Some(self.iterations),
            Metric::Effects => Some(self.effects),
            Metric::Candidates => Some(self.candidates),
            Metric::Phase(phase) => self.phases.get(&phase).copied(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedResult {
    Failure { kind: FailureKind, raw_info: String },
    Success(RunMetrics),
}

impl ExtractedResult {
    pub fn failure(kind: FailureKind, raw_info: impl Into<String>) -> Self {
        ExtractedResult::Failure {
            kind,
            raw_info: raw_info.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExtractedResult::Success(_))
    }
}

/// A per-workload sample column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    TotalTime,
    Iterations,
    Effects,
    Candidates,
    Phase(Phase),
}

impl Metric {
    pub const ALL: [Metric; 9] = [
        Metric::TotalTime,
        Metric::Iterations,
        Metric::Effects,
        Metric::Candidates,
        Metric::Phase(Phase::Post),
        Metric::Phase(Phase::Future),
        Metric::Phase(Phase::Past),
        Metric::Phase(Phase::Join),
        Metric::Phase(Phase::Interference),
    ];

    /// Counts are ratio-like once averaged; times stay integral milliseconds.
    pub fn places(self) -> u32 {
        match self {
            Metric::Iterations | Metric::Effects | Metric::Candidates => 2,
            Metric::TotalTime | Metric::Phase(_) => 0,
        }
    }

    pub fn key(self) -> String {
        match self {
            Metric::TotalTime => "total_ms".to_string(),
            Metric::Iterations => "iterations".to_string(),
            Metric::Effects => "effects".to_string(),
            Metric::Candidates => "candidates".to_string(),
            Metric::Phase(phase) => format!("{}_ms", phase),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ChartLayout {
    /// One chart covering every workload
    Shared,
    /// One chart per workload
    PerWorkload,
}

/// Millisecond count as `1m40s`.
pub fn human_readable(ms: f64) -> String {
    let secs = (ms / 1000.0).round_ties_even().max(0.0) as u64;
    format!("{}m{:02}s", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_readable_rounds_to_seconds() {
        assert_eq!(human_readable(0.0), "0m00s");
        assert_eq!(human_readable(100.0), "0m00s");
        assert_eq!(human_readable(1500.0), "0m02s");
        assert_eq!(human_readable(2500.0), "0m02s");
        assert_eq!(human_readable(3500.0), "0m04s");
        assert_eq!(human_readable(100_000.0), "1m40s");
        assert_eq!(human_readable(21_600_000.0), "360m00s");
    }

    #[test]
    fn metric_places() {
        assert_eq!(Metric::Iterations.places(), 2);
        assert_eq!(Metric::TotalTime.places(), 0);
        assert_eq!(Metric::Phase(Phase::Join).places(), 0);
    }

    #[test]
    fn metric_keys_are_distinct() {
        let mut keys: Vec<String> = Metric::ALL.iter().map(|m| m.key()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), Metric::ALL.len());
    }

    #[test]
    fn run_metrics_value_lookup() {
        let mut phases = BTreeMap::new();
        phases.insert(Phase::Join, 10);
        let metrics = RunMetrics {
            total_ms: 100,
            iterations: 4,
            effects: 5,
            candidates: 0,
            phases,
        };
        assert_eq!(metrics.value(Metric::TotalTime), Some(100));
        assert_eq!(metrics.value(Metric::Phase(Phase::Join)), Some(10));
        assert_eq!(metrics.value(Metric::Phase(Phase::Past)), None);
    }
}
