use std::io::Write;
use std::sync::atomic::AtomicBool;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::aggregate::AggregateState;
use crate::config::HarnessConfig;
use crate::errors::BenchError;
use crate::extract::extract;
use crate::interrupt::is_interrupted;
use crate::report::{format_progress, format_stress_progress};
use crate::stress::{StressTally, StressVerdict};
use crate::supervise::Supervisor;
use crate::types::{ExtractedResult, FailureKind, RunOutcome, RunRequest, human_readable};

/// Exit status when every scheduled run succeeded.
pub const EXIT_OK: i32 = 0;
/// Exit status when at least one run did not succeed.
pub const EXIT_RUNS_FAILED: i32 = 2;
/// Exit status after a user interrupt.
pub const EXIT_INTERRUPTED: i32 = 130;

/// Result of a scheduled pass: the folded state plus run counts.
#[derive(Debug)]
pub struct HarnessOutcome<S = AggregateState> {
    pub state: S,
    pub interrupted: bool,
    pub attempted: usize,
    pub failed: usize,
}

impl<S> HarnessOutcome<S> {
    pub fn exit_code(&self) -> i32 {
        if self.interrupted {
            EXIT_INTERRUPTED
        } else if self.failed > 0 {
            EXIT_RUNS_FAILED
        } else {
            EXIT_OK
        }
    }
}

/// Drives repetitions × workloads in a fixed order, one child at a time.
pub struct Harness<'a> {
    config: &'a HarnessConfig,
    supervisor: Supervisor,
    cancel: &'a AtomicBool,
}

impl<'a> Harness<'a> {
    pub fn new(config: &'a HarnessConfig, cancel: &'a AtomicBool) -> Self {
        Harness {
            config,
            supervisor: Supervisor::new(config.grace()),
            cancel,
        }
    }

    pub fn settings_line(&self) -> String {
        format!(
            "Settings: repetitions={}, timeout={}",
            self.config.repetitions,
            human_readable(self.config.timeout().as_millis() as f64)
        )
    }

    /// Benchmark every workload, writing one progress line per run to `out`.
    ///
    /// Stops scheduling as soon as an interrupt is seen; whatever was folded
    /// up to then is returned for the final report.
    pub fn run<W: Write>(&self, out: &mut W) -> Result<HarnessOutcome> {
        let variant = self.config.variant_name();
        let mut state = AggregateState::new(self.config.workloads.as_slice());
        state.seed_variant(&variant);

        let (interrupted, attempted, failed) = self.schedule(|request, supervised| {
            let result = match supervised {
                Ok(outcome) => extract(outcome),
                Err(err) => ExtractedResult::failure(FailureKind::ExecutionError, err.to_string()),
            };
            if let ExtractedResult::Failure { kind, raw_info } = &result {
                info!(workload = %request.workload, repetition = request.repetition, kind = kind.label(), detail = %raw_info, "run failed");
            }
            state.fold(&request.workload, request.repetition, &variant, &result);
            writeln!(
                out,
                "{}",
                format_progress(request.repetition, self.config.repetitions, &result, &request.workload)
            )?;
            out.flush()?;
            Ok(!result.is_success())
        })?;

        Ok(HarnessOutcome {
            state,
            interrupted,
            attempted,
            failed,
        })
    }

    /// Run every workload expecting the tool to reject it. Any run that is not
    /// a detected bug counts as failed.
    pub fn stress<W: Write>(&self, out: &mut W) -> Result<HarnessOutcome<StressTally>> {
        let mut tally = StressTally::new(self.config.workloads.as_slice());

        let (interrupted, attempted, failed) = self.schedule(|request, supervised| {
            let verdict = match supervised {
                Ok(outcome) => StressVerdict::classify(outcome),
                Err(_) => StressVerdict::Inconclusive(FailureKind::ExecutionError),
            };
            if verdict == StressVerdict::Unsound {
                info!(workload = %request.workload, repetition = request.repetition, "buggy workload accepted");
            }
            tally.fold(&request.workload, &verdict);
            writeln!(
                out,
                "{}",
                format_stress_progress(request.repetition, self.config.repetitions, &verdict, &request.workload)
            )?;
            out.flush()?;
            Ok(!verdict.is_detected())
        })?;

        Ok(HarnessOutcome {
            state: tally,
            interrupted,
            attempted,
            failed,
        })
    }

    /// The scheduling loop shared by every mode. `on_run` sees each finished
    /// run and reports whether it failed; interrupted runs never reach it.
    /// Returns (interrupted, attempted, failed).
    fn schedule<F>(&self, mut on_run: F) -> Result<(bool, usize, usize)>
    where
        F: FnMut(&RunRequest, Result<RunOutcome, BenchError>) -> Result<bool>,
    {
        let mut attempted = 0;
        let mut failed = 0;

        for repetition in 0..self.config.repetitions {
            for workload in &self.config.workloads {
                if is_interrupted(self.cancel) {
                    return Ok((true, attempted, failed));
                }

                let request = RunRequest {
                    workload: workload.clone(),
                    repetition,
                    timeout: self.config.timeout(),
                };
                let supervised = self.launch(&request);
                if matches!(supervised, Ok(RunOutcome::Interrupted)) {
                    return Ok((true, attempted, failed));
                }

                attempted += 1;
                if on_run(&request, supervised)? {
                    failed += 1;
                }
            }
        }

        Ok((false, attempted, failed))
    }

    fn launch(&self, request: &RunRequest) -> Result<RunOutcome, BenchError> {
        let mut args: Vec<&str> = Vec::with_capacity(2);
        if !self.config.flag.is_empty() {
            args.push(&self.config.flag);
        }
        args.push(&request.workload);

        debug!(workload = %request.workload, repetition = request.repetition, "starting run");
        let supervised = self
            .supervisor
            .supervise(&self.config.executable, args.as_slice(), request.timeout, self.cancel);
        if let Err(err) = &supervised {
            warn!(workload = %request.workload, error = %err, "could not supervise run");
        }
        supervised
    }
}
