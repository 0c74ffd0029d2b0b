use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use owo_colors::{OwoColorize, Stream, Style};
use serde::Serialize;

use crate::aggregate::{AggregateState, average, deviation, percentage};
use crate::stress::{StressTally, StressVerdict};
use crate::types::{ExtractedResult, FailureKind, Metric, Phase, human_readable};

const FAILED_ROW: &str = "failed ✗";
const NO_VALUE: &str = "--";
const UNSOUND: &str = "unsound ✗";

/// Reduced view of one workload's samples.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadSummary {
    pub workload: String,
    pub successes: usize,
    pub failures: BTreeMap<FailureKind, usize>,
    pub averages: BTreeMap<Metric, f64>,
    pub deviations: BTreeMap<Metric, f64>,
}

impl WorkloadSummary {
    pub fn failed(&self) -> bool {
        self.successes == 0
    }

    pub fn failure_count(&self) -> usize {
        self.failures.values().sum()
    }

    pub fn average(&self, metric: Metric) -> Option<f64> {
        self.averages.get(&metric).copied()
    }

    /// Phase share of average total time, `--` when the total is zero or unknown.
    pub fn share(&self, phase: Phase) -> String {
        match (self.average(Metric::Phase(phase)), self.average(Metric::TotalTime)) {
            (Some(part), Some(total)) => percentage(part, total),
            _ => NO_VALUE.to_string(),
        }
    }
}

pub fn summarize(state: &AggregateState, workload: &str) -> WorkloadSummary {
    let mut averages = BTreeMap::new();
    let mut deviations = BTreeMap::new();
    for metric in Metric::ALL {
        let samples = state.samples(workload, metric);
        if let Some(avg) = average(samples, metric.places()) {
            averages.insert(metric, avg);
        }
        if let Some(dev) = deviation(samples) {
            deviations.insert(metric, dev);
        }
    }
    WorkloadSummary {
        workload: workload.to_string(),
        successes: state.success_count(workload),
        failures: state.failures(workload),
        averages,
        deviations,
    }
}

fn style_header() -> Style {
    Style::new().dimmed()
}

fn style_ok() -> Style {
    Style::new().green()
}

fn style_failed() -> Style {
    Style::new().red().bold()
}

/// One progress line per finished run, e.g. `[01/03]       1m40s ✓  for  A.pl`.
pub fn format_progress(repetition: u32, repetitions: u32, result: &ExtractedResult, workload: &str) -> String {
    let (info, style) = match result {
        ExtractedResult::Success(metrics) => (
            format!("{} ✓", human_readable(metrics.total_ms as f64)),
            style_ok(),
        ),
        ExtractedResult::Failure { kind, .. } => (format!("{} ✗", kind.label()), style_failed()),
    };
    progress_line(repetition, repetitions, &info, style, workload)
}

/// Progress line for a run over a buggy workload; acceptance shows `unsound ✗`.
pub fn format_stress_progress(repetition: u32, repetitions: u32, verdict: &StressVerdict, workload: &str) -> String {
    let (info, style) = match verdict {
        StressVerdict::Detected { elapsed } => (
            format!("{} ✓", human_readable(elapsed.as_millis() as f64)),
            style_ok(),
        ),
        StressVerdict::Unsound => (UNSOUND.to_string(), style_failed()),
        StressVerdict::Inconclusive(kind) => (format!("{} ✗", kind.label()), style_failed()),
    };
    progress_line(repetition, repetitions, &info, style, workload)
}

fn progress_line(repetition: u32, repetitions: u32, info: &str, style: Style, workload: &str) -> String {
    let info_padded = format!("{:>14}", info);
    format!(
        "[{:0>2}/{:0>2}] {}  for  {}",
        repetition + 1,
        repetitions,
        info_padded.if_supports_color(Stream::Stdout, |s| s.style(style)),
        workload
    )
}

/// Console pivot table: one row per workload, never omitting failed ones.
pub fn format_table(state: &AggregateState) -> String {
    let name_width = state
        .workloads()
        .iter()
        .map(|w| w.chars().count())
        .chain(std::iter::once("Workload".len()))
        .max()
        .unwrap_or(0);

    let mut columns: Vec<&str> = vec!["Iter", "Eff", "Cand"];
    columns.extend(Phase::ALL.iter().map(|p| p.column()));
    columns.push("Fail");

    let mut out = String::new();

    let mut header = format!("{:<width$}", "Workload", width = name_width);
    for column in &columns {
        header.push_str(&format!(" | {:>6}", column));
    }
    header.push_str(&format!(" | {:>12}", "Verdict"));
    out.push_str(
        &header
            .if_supports_color(Stream::Stdout, |s| s.style(style_header()))
            .to_string(),
    );
    out.push('\n');

    let mut rule = "-".repeat(name_width + 1);
    for _ in &columns {
        rule.push_str("+--------");
    }
    rule.push_str("+-------------");
    out.push_str(&rule);
    out.push('\n');

    for workload in state.workloads() {
        let summary = summarize(state, workload);
        let mut line = format!("{:<width$}", workload, width = name_width);

        let verdict = if summary.failed() {
            for _ in 0..columns.len() - 1 {
                line.push_str(&format!(" | {:>6}", NO_VALUE));
            }
            line.push_str(&format!(" | {:>6}", summary.failure_count()));
            let padded = format!("{:>12}", FAILED_ROW);
            padded
                .if_supports_color(Stream::Stdout, |s| s.style(style_failed()))
                .to_string()
        } else {
            for metric in [Metric::Iterations, Metric::Effects, Metric::Candidates] {
                let cell = summary
                    .average(metric)
                    .map(|v| format!("{:.2}", v))
                    .unwrap_or_else(|| NO_VALUE.to_string());
                line.push_str(&format!(" | {:>6}", cell));
            }
            for phase in Phase::ALL {
                line.push_str(&format!(" | {:>6}", summary.share(phase)));
            }
            line.push_str(&format!(" | {:>6}", summary.failure_count()));
            let total = summary.average(Metric::TotalTime).unwrap_or(0.0);
            let padded = format!("{:>12}", format!("{} ✓", human_readable(total)));
            padded
                .if_supports_color(Stream::Stdout, |s| s.style(style_ok()))
                .to_string()
        };

        line.push_str(" | ");
        line.push_str(&verdict);
        out.push_str(&line);
        out.push('\n');
    }

    out
}

/// `Program | Runs | Unsound | Other | Bug detected`, one row per workload.
///
/// A single unsound run marks the whole row; otherwise the detection times
/// of the conclusive runs are averaged.
pub fn format_stress_table(tally: &StressTally) -> String {
    let name_width = tally
        .workloads()
        .iter()
        .map(|w| w.chars().count())
        .chain(std::iter::once("Program".len()))
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    let header = format!(
        "{:<width$} | {:>6} | {:>7} | {:>6} | {:>14}",
        "Program",
        "Runs",
        "Unsound",
        "Other",
        "Bug detected",
        width = name_width
    );
    out.push_str(
        &header
            .if_supports_color(Stream::Stdout, |s| s.style(style_header()))
            .to_string(),
    );
    out.push('\n');
    out.push_str(&format!(
        "{}+--------+---------+--------+----------------\n",
        "-".repeat(name_width + 1)
    ));

    for workload in tally.workloads() {
        let row = tally.row(workload);
        let (cell, style) = if row.unsound > 0 {
            (UNSOUND.to_string(), style_failed())
        } else {
            match row.average_ms() {
                Some(avg) => (format!("{} ✓", human_readable(avg)), style_ok()),
                None => (FAILED_ROW.to_string(), style_failed()),
            }
        };
        let padded = format!("{:>14}", cell);
        out.push_str(&format!(
            "{:<width$} | {:>6} | {:>7} | {:>6} | {}\n",
            workload,
            row.runs(),
            row.unsound,
            row.inconclusive_count(),
            padded.if_supports_color(Stream::Stdout, |s| s.style(style)),
            width = name_width
        ));
    }
    out
}

#[derive(Serialize)]
struct JsonReport {
    generated_at: String,
    workloads: Vec<JsonWorkload>,
}

#[derive(Serialize)]
struct JsonWorkload {
    workload: String,
    status: &'static str,
    successes: usize,
    failures: BTreeMap<FailureKind, usize>,
    averages: BTreeMap<String, f64>,
    deviations: BTreeMap<String, f64>,
    phase_shares: BTreeMap<String, String>,
}

pub fn format_json(state: &AggregateState, now: DateTime<Utc>) -> serde_json::Result<String> {
    let workloads = state
        .workloads()
        .iter()
        .map(|workload| {
            let summary = summarize(state, workload);
            JsonWorkload {
                workload: workload.clone(),
                status: if summary.failed() { "failed" } else { "ok" },
                successes: summary.successes,
                failures: summary.failures.clone(),
                averages: summary.averages.iter().map(|(m, v)| (m.key(), *v)).collect(),
                deviations: summary.deviations.iter().map(|(m, v)| (m.key(), *v)).collect(),
                phase_shares: if summary.failed() {
                    BTreeMap::new()
                } else {
                    Phase::ALL
                        .iter()
                        .map(|p| (p.to_string(), summary.share(*p)))
                        .collect()
                },
            }
        })
        .collect();

    let report = JsonReport {
        generated_at: now.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        workloads,
    };
    serde_json::to_string_pretty(&report)
}

/// Nanoseconds as milliseconds with microsecond precision.
pub fn millis(ns: f64) -> String {
    format!("{:.3}ms", (ns / 1000.0).trunc() / 1000.0)
}

/// Method × footprint table over the flat-log samples.
pub fn format_footprint_table(state: &AggregateState) -> String {
    let mut out = String::new();
    out.push_str("  Method               |    #Footprint |      Average |    Deviation\n");
    out.push_str(" ----------------------+---------------+--------------+--------------\n");
    for variant in state.variants() {
        for (size, times) in state.footprint_samples(variant, None) {
            let (Some(avg), Some(dev)) = (average(&times, 0), deviation(&times)) else {
                continue;
            };
            out.push_str(&format!(
                "  {:<20} | {:>13} | {:>12} | {:>12}\n",
                variant,
                size,
                millis(avg),
                millis(dev)
            ));
        }
    }
    out
}

/// Workload × method table of per-repetition totals.
pub fn format_totals_table(state: &AggregateState) -> String {
    let mut out = String::new();
    out.push_str("  Benchmark            |               Method |      Average |    Deviation\n");
    out.push_str(" ----------------------+----------------------+--------------+--------------\n");
    for workload in state.workloads() {
        for variant in state.variants() {
            let totals = state.repetition_totals(variant, workload);
            let (avg, dev) = match (average(&totals, 0), deviation(&totals)) {
                (Some(avg), Some(dev)) => (millis(avg), millis(dev)),
                _ => (NO_VALUE.to_string(), NO_VALUE.to_string()),
            };
            out.push_str(&format!(
                "  {:<20} | {:>20} | {:>12} | {:>12}\n",
                workload, variant, avg, dev
            ));
        }
    }
    out
}
