use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::types::{ExtractedResult, FailureKind, Phase, RunMetrics, RunOutcome};

static HEADLINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@gist\[(?P<path>.*?)\]=(?P<verdict>[01]),(?P<time>[0-9]+);(?P<tail>.*)")
        .expect("headline pattern is valid")
});

static MARKERS: LazyLock<MarkerTable> = LazyLock::new(MarkerTable::new);

/// A named line shape carrying one unsigned integer capture.
pub struct Marker {
    pub name: &'static str,
    pattern: Regex,
}

impl Marker {
    fn new(name: &'static str, pattern: &str) -> Self {
        Marker {
            name,
            pattern: Regex::new(pattern).expect("marker pattern is valid"),
        }
    }

    fn phase_timer(name: &'static str, timer: &str) -> Self {
        Marker::new(
            name,
            &format!(
                r"\[(?P<n>[0-9]+)ms\] Total time measured for 'TIME {}'",
                regex::escape(timer)
            ),
        )
    }

    /// First occurrence of the marker and its numeric field.
    ///
    /// A marker whose number does not fit in a `u64` counts as absent.
    pub fn find(&self, text: &str) -> Option<u64> {
        let caps = self.pattern.captures(text)?;
        match caps.name("n") {
            Some(n) => n.as_str().parse().ok(),
            None => Some(0),
        }
    }
}

/// Auxiliary markers expected after a positive verdict.
pub struct MarkerTable {
    pub iterations: Marker,
    pub effects: Marker,
    pub candidates: Marker,
    pub no_candidates: Marker,
    pub phases: Vec<(Phase, Marker)>,
}

impl MarkerTable {
    fn new() -> Self {
        MarkerTable {
            iterations: Marker::new(
                "iterations",
                r"\[iter-(?P<n>[0-9]+)\] Fixed-point reached\.",
            ),
            effects: Marker::new("effects", r"Adding effects to solver \((?P<n>[0-9]+)\):"),
            candidates: Marker::new(
                "candidates",
                r"Using the following future suggestions \((?P<n>[0-9]+)\):",
            ),
            no_candidates: Marker::new("no candidates", r"Using no future suggestions\."),
            phases: vec![
                (Phase::Post, Marker::phase_timer("post", "Post")),
                (Phase::Future, Marker::phase_timer("future reduce", "Future reduce")),
                (Phase::Future, Marker::phase_timer("future improve", "Future improve")),
                (Phase::Past, Marker::phase_timer("past reduce", "Past reduce")),
                (Phase::Past, Marker::phase_timer("past improve", "Past improve")),
                (Phase::Join, Marker::phase_timer("join", "Join")),
                (
                    Phase::Interference,
                    Marker::phase_timer("interference", "Interference"),
                ),
            ],
        }
    }
}

pub fn markers() -> &'static MarkerTable {
    &MARKERS
}

/// The `@gist[...]` status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Headline {
    pub path: String,
    pub verdict: bool,
    pub total_ms: u64,
    pub tail: String,
}

pub fn find_headline(text: &str) -> Option<Headline> {
    let caps = HEADLINE.captures(text)?;
    let total_ms = caps["time"].parse().ok()?;
    Some(Headline {
        path: caps["path"].to_string(),
        verdict: &caps["verdict"] == "1",
        total_ms,
        tail: caps["tail"].trim().to_string(),
    })
}

/// Classify a supervised run. Rules are tried in order; the first match wins.
pub fn extract(outcome: RunOutcome) -> ExtractedResult {
    let (exit_code, stdout, stderr) = match outcome {
        RunOutcome::TimedOut => return ExtractedResult::failure(FailureKind::Timeout, "timeout"),
        RunOutcome::Interrupted => {
            return ExtractedResult::failure(FailureKind::ExecutionError, "interrupted");
        }
        RunOutcome::Completed {
            exit_code,
            stdout,
            stderr,
            ..
        } => (exit_code, stdout, stderr),
    };

    let headline = match find_headline(&stdout) {
        Some(headline) => headline,
        None if exit_code != 0 => {
            return ExtractedResult::failure(
                FailureKind::ExecutionError,
                describe_exit(exit_code, &stderr),
            );
        }
        None => {
            return ExtractedResult::failure(FailureKind::Malformed, "missing @gist headline");
        }
    };

    if !headline.verdict {
        return ExtractedResult::failure(FailureKind::ReportedFailure, headline.tail);
    }

    match parse_metrics(headline.total_ms, &stdout) {
        Ok(metrics) => ExtractedResult::Success(metrics),
        Err(missing) => ExtractedResult::failure(
            FailureKind::Malformed,
            format!("missing markers: {}", missing.join(", ")),
        ),
    }
}

/// All-or-nothing: returns the names of every absent marker on failure.
pub fn parse_metrics(total_ms: u64, text: &str) -> Result<RunMetrics, Vec<&'static str>> {
    let table = markers();
    let mut missing = Vec::new();

    let iterations = table.iterations.find(text);
    if iterations.is_none() {
        missing.push(table.iterations.name);
    }

    let effects = table.effects.find(text);
    if effects.is_none() {
        missing.push(table.effects.name);
    }

    let candidates = match table.candidates.find(text) {
        Some(count) => Some(count),
        None => table.no_candidates.find(text).map(|_| 0),
    };
    if candidates.is_none() {
        missing.push(table.candidates.name);
    }

    let mut phases: BTreeMap<Phase, u64> = BTreeMap::new();
    for (phase, marker) in &table.phases {
        match marker.find(text) {
            Some(ms) => *phases.entry(*phase).or_insert(0) += ms,
            None => missing.push(marker.name),
        }
    }

    match (iterations, effects, candidates) {
        (Some(iterations), Some(effects), Some(candidates)) if missing.is_empty() => {
            Ok(RunMetrics {
                total_ms,
                // the tool numbers iterations from zero
                iterations: iterations + 1,
                effects,
                candidates,
                phases,
            })
        }
        _ => Err(missing),
    }
}

fn describe_exit(exit_code: i32, stderr: &str) -> String {
    match stderr.lines().rev().map(str::trim).find(|l| !l.is_empty()) {
        Some(last) => format!("exit code {}: {}", exit_code, last),
        None => format!("exit code {}", exit_code),
    }
}
