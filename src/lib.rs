pub mod aggregate;
pub mod config;
pub mod errors;
pub mod extract;
pub mod harness;
pub mod interrupt;
pub mod record;
pub mod report;
pub mod stress;
pub mod supervise;
pub mod typeset;
pub mod types;

#[cfg(test)]
mod end_to_end_tests {
    // A two-run workload where only the first run succeeds: the failure is
    // counted, the average comes from the success alone, and the row is not
    // marked failed.

    use crate::aggregate::{AggregateState, average};
    use crate::extract::extract;
    use crate::report::format_table;
    use crate::types::{Metric, RunOutcome};
    use std::time::Duration;

    const SUCCESS_OUTPUT: &str = "@gist[A.pl]=1,100;...[iter-3] Fixed-point reached....\
        Adding effects to solver (5):...Using no future suggestions....\
        [10ms] Total time measured for 'TIME Post'...\
        [20ms] Total time measured for 'TIME Future reduce'...\
        [5ms] Total time measured for 'TIME Future improve'...\
        [15ms] Total time measured for 'TIME Past reduce'...\
        [5ms] Total time measured for 'TIME Past improve'...\
        [10ms] Total time measured for 'TIME Join'...\
        [5ms] Total time measured for 'TIME Interference'";

    const FAILURE_OUTPUT: &str = "@gist[A.pl]=0,50;error message";

    fn completed(stdout: &str) -> RunOutcome {
        RunOutcome::Completed {
            exit_code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
            elapsed: Duration::from_millis(100),
        }
    }

    #[test]
    fn two_runs_one_success() {
        let mut state = AggregateState::new(&["A.pl"]);
        for (repetition, output) in [SUCCESS_OUTPUT, FAILURE_OUTPUT].iter().enumerate() {
            let result = extract(completed(output));
            state.fold("A.pl", repetition as u32, "plankton", &result);
        }

        assert_eq!(average(state.samples("A.pl", Metric::TotalTime), 0), Some(100.0));
        assert_eq!(state.failure_count("A.pl"), 1);

        let table = format_table(&state);
        let row = table.lines().find(|l| l.starts_with("A.pl")).unwrap();
        assert!(!row.contains("failed"));
        assert!(row.contains('✓'));
    }
}
