//! Bug-detection runs over workloads that are known to be broken.
//!
//! The tool is expected to reject every such workload. A positive `@gist`
//! verdict means it accepted a buggy program, which is reported as unsound.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::aggregate::average;
use crate::extract::{extract, find_headline};
use crate::types::{ExtractedResult, FailureKind, RunOutcome};

/// How one run over a buggy workload ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StressVerdict {
    /// The tool rejected the workload; `elapsed` is wall-clock time.
    Detected { elapsed: Duration },
    /// The tool accepted the workload.
    Unsound,
    /// No verdict at all: timeout, crash or unparseable output.
    Inconclusive(FailureKind),
}

impl StressVerdict {
    pub fn classify(outcome: RunOutcome) -> StressVerdict {
        if let RunOutcome::Completed { stdout, elapsed, .. } = &outcome {
            if let Some(headline) = find_headline(stdout) {
                return if headline.verdict {
                    StressVerdict::Unsound
                } else {
                    StressVerdict::Detected { elapsed: *elapsed }
                };
            }
        }
        match extract(outcome) {
            ExtractedResult::Failure { kind, .. } => StressVerdict::Inconclusive(kind),
            // extract only succeeds on a positive headline, handled above
            ExtractedResult::Success(_) => StressVerdict::Unsound,
        }
    }

    pub fn is_detected(&self) -> bool {
        matches!(self, StressVerdict::Detected { .. })
    }
}

/// Verdicts folded for one workload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StressRow {
    pub detected_ms: Vec<f64>,
    pub unsound: usize,
    pub inconclusive: BTreeMap<FailureKind, usize>,
}

impl StressRow {
    pub fn runs(&self) -> usize {
        self.detected_ms.len() + self.unsound + self.inconclusive_count()
    }

    pub fn inconclusive_count(&self) -> usize {
        self.inconclusive.values().sum()
    }

    /// Average detection time; only meaningful while no run was unsound.
    pub fn average_ms(&self) -> Option<f64> {
        if self.unsound > 0 {
            return None;
        }
        average(&self.detected_ms, 0)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StressTally {
    workloads: Vec<String>,
    rows: BTreeMap<String, StressRow>,
}

impl StressTally {
    pub fn new<S: AsRef<str>>(workloads: &[S]) -> Self {
        let mut tally = StressTally::default();
        for workload in workloads {
            tally.seed_workload(workload.as_ref());
        }
        tally
    }

    fn seed_workload(&mut self, workload: &str) {
        if !self.workloads.iter().any(|w| w == workload) {
            self.workloads.push(workload.to_string());
        }
    }

    pub fn workloads(&self) -> &[String] {
        &self.workloads
    }

    pub fn fold(&mut self, workload: &str, verdict: &StressVerdict) {
        self.seed_workload(workload);
        let row = self.rows.entry(workload.to_string()).or_default();
        match verdict {
            StressVerdict::Detected { elapsed } => row.detected_ms.push(elapsed.as_millis() as f64),
            StressVerdict::Unsound => row.unsound += 1,
            StressVerdict::Inconclusive(kind) => *row.inconclusive.entry(*kind).or_insert(0) += 1,
        }
    }

    pub fn row(&self, workload: &str) -> StressRow {
        self.rows.get(workload).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(exit_code: i32, stdout: &str, elapsed_ms: u64) -> RunOutcome {
        RunOutcome::Completed {
            exit_code,
            stdout: stdout.to_string(),
            stderr: String::new(),
            elapsed: Duration::from_millis(elapsed_ms),
        }
    }

    #[test]
    fn rejected_workload_is_detected() {
        let verdict = StressVerdict::classify(completed(1, "@gist[02_nolink_Harris.pl]=0,80;bad link\n", 1500));
        assert_eq!(
            verdict,
            StressVerdict::Detected {
                elapsed: Duration::from_millis(1500)
            }
        );
        assert!(verdict.is_detected());
    }

    #[test]
    fn accepted_workload_is_unsound_even_without_markers() {
        let verdict = StressVerdict::classify(completed(0, "@gist[03_cycle_Michael.pl]=1,80;ok\n", 10));
        assert_eq!(verdict, StressVerdict::Unsound);
    }

    #[test]
    fn no_headline_is_inconclusive() {
        assert_eq!(
            StressVerdict::classify(RunOutcome::TimedOut),
            StressVerdict::Inconclusive(FailureKind::Timeout)
        );
        assert_eq!(
            StressVerdict::classify(completed(139, "", 10)),
            StressVerdict::Inconclusive(FailureKind::ExecutionError)
        );
        assert_eq!(
            StressVerdict::classify(completed(0, "nothing useful\n", 10)),
            StressVerdict::Inconclusive(FailureKind::Malformed)
        );
    }

    #[test]
    fn row_averages_only_while_sound() {
        let mut tally = StressTally::new(&["a.pl", "b.pl", "c.pl"]);
        for ms in [1000, 3000] {
            tally.fold("a.pl", &StressVerdict::Detected { elapsed: Duration::from_millis(ms) });
        }
        tally.fold("b.pl", &StressVerdict::Detected { elapsed: Duration::from_millis(1000) });
        tally.fold("b.pl", &StressVerdict::Unsound);

        let a = tally.row("a.pl");
        assert_eq!(a.runs(), 2);
        assert_eq!(a.average_ms(), Some(2000.0));

        let b = tally.row("b.pl");
        assert_eq!(b.unsound, 1);
        assert_eq!(b.average_ms(), None);

        let c = tally.row("c.pl");
        assert_eq!(c.runs(), 0);
        assert_eq!(c.average_ms(), None);
    }

    #[test]
    fn inconclusive_runs_are_kept_apart() {
        let mut tally = StressTally::new(&["a.pl"]);
        tally.fold("a.pl", &StressVerdict::Inconclusive(FailureKind::Timeout));
        tally.fold("a.pl", &StressVerdict::Detected { elapsed: Duration::from_millis(4000) });
        let row = tally.row("a.pl");
        assert_eq!(row.inconclusive_count(), 1);
        assert_eq!(row.runs(), 2);
        assert_eq!(row.average_ms(), Some(4000.0));
    }
}
