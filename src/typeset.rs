//! LaTeX rendering of aggregate state: a summary `tabular` and pgfplots bar
//! charts of time against footprint with deviation error bars.
//!
//! The output is a fragment meant to be `\input` into a document that loads
//! `pgfplots`. It depends on nothing but the state passed in.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use crate::aggregate::{AggregateState, average, deviation};
use crate::types::ChartLayout;

const NO_DATA: &str = r"\textit{no data}";

/// Unit the per-variant samples were recorded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleUnit {
    Milliseconds,
    Nanoseconds,
}

impl SampleUnit {
    fn to_ms(self, value: f64) -> f64 {
        match self {
            SampleUnit::Milliseconds => value,
            SampleUnit::Nanoseconds => value / 1_000_000.0,
        }
    }
}

/// Escape characters with special meaning in LaTeX text mode.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str(r"\textbackslash{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str(r"\textasciitilde{}"),
            '^' => out.push_str(r"\textasciicircum{}"),
            _ => out.push(c),
        }
    }
    out
}

fn cell(avg: f64, dev: f64) -> String {
    format!(r"${:.2} \pm {:.2}$", avg, dev)
}

/// Main table: workloads × variants, each cell the average per-repetition
/// total in milliseconds with its deviation, plus a totals row.
pub fn render_table(state: &AggregateState, unit: SampleUnit) -> String {
    let variants = state.variants();
    let mut out = String::new();

    let _ = writeln!(out, r"\begin{{tabular}}{{l|{}}}", "r".repeat(variants.len().max(1)));
    let mut header = String::from("Workload");
    for variant in variants {
        let _ = write!(header, " & {}", escape(variant));
    }
    let _ = writeln!(out, r"{} \\", header);
    out.push_str("\\hline\n");

    // (sum of averages, sum of variances, cells with data) per variant
    let mut totals: Vec<(f64, f64, usize)> = vec![(0.0, 0.0, 0); variants.len()];

    for workload in state.workloads() {
        let mut line = escape(workload);
        for (idx, variant) in variants.iter().enumerate() {
            let samples: Vec<f64> = state
                .repetition_totals(variant, workload)
                .into_iter()
                .map(|v| unit.to_ms(v))
                .collect();
            match (average(&samples, 2), deviation(&samples)) {
                (Some(avg), Some(dev)) => {
                    totals[idx].0 += avg;
                    totals[idx].1 += dev * dev;
                    totals[idx].2 += 1;
                    let _ = write!(line, " & {}", cell(avg, dev));
                }
                _ => {
                    let _ = write!(line, " & {}", NO_DATA);
                }
            }
        }
        let _ = writeln!(out, r"{} \\", line);
    }

    out.push_str("\\hline\n");
    let mut line = String::from("Total");
    for (sum, variance, count) in &totals {
        if *count == 0 {
            let _ = write!(line, " & {}", NO_DATA);
        } else {
            let _ = write!(line, " & {}", cell(*sum, variance.sqrt()));
        }
    }
    let _ = writeln!(out, r"{} \\", line);
    out.push_str("\\end{tabular}\n");
    out
}

/// One `axis` with a bar series per variant, or `None` when no variant has
/// footprint samples for `workload`.
pub fn render_chart(state: &AggregateState, workload: Option<&str>, unit: SampleUnit) -> Option<String> {
    let series: Vec<(&String, BTreeMap<u64, Vec<f64>>)> = state
        .variants()
        .iter()
        .map(|variant| (variant, state.footprint_samples(variant, workload)))
        .filter(|(_, sizes)| !sizes.is_empty())
        .collect();
    if series.is_empty() {
        return None;
    }

    let sizes: BTreeSet<u64> = series.iter().flat_map(|(_, s)| s.keys().copied()).collect();
    let coords: Vec<String> = sizes.iter().map(u64::to_string).collect();

    let mut out = String::new();
    out.push_str("\\begin{tikzpicture}\n\\begin{axis}[\n    ybar,\n");
    if let Some(workload) = workload {
        let _ = writeln!(out, "    title={{{}}},", escape(workload));
    }
    let _ = writeln!(out, "    symbolic x coords={{{}}},", coords.join(","));
    out.push_str("    xtick=data,\n    xlabel={Footprint},\n    ylabel={Time [ms]},\n");
    out.push_str("    legend pos=north west,\n]\n");

    for (variant, samples) in &series {
        out.push_str("\\addplot+[error bars/.cd, y dir=both, y explicit] coordinates {\n");
        for (size, times) in samples {
            let (Some(avg), Some(dev)) = (average(times, 6), deviation(times)) else {
                continue;
            };
            let _ = writeln!(
                out,
                "    ({}, {:.3}) +- (0, {:.3})",
                size,
                unit.to_ms(avg),
                unit.to_ms(dev)
            );
        }
        out.push_str("};\n");
        let _ = writeln!(out, "\\addlegendentry{{{}}}", escape(variant));
    }

    out.push_str("\\end{axis}\n\\end{tikzpicture}\n");
    Some(out)
}

/// Table followed by the charts for `layout`.
pub fn render_document(state: &AggregateState, layout: ChartLayout, unit: SampleUnit) -> String {
    let mut out = String::new();
    out.push_str("\\begin{center}\n");
    out.push_str(&render_table(state, unit));
    out.push_str("\\end{center}\n");

    let charts: Vec<String> = match layout {
        ChartLayout::Shared => render_chart(state, None, unit).into_iter().collect(),
        ChartLayout::PerWorkload => state
            .workloads()
            .iter()
            .filter_map(|w| render_chart(state, Some(w), unit))
            .collect(),
    };
    for chart in charts {
        out.push('\n');
        out.push_str(&chart);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LogRecord;

    fn record(method: &str, footprint: u64, time_ns: u64, workload: &str, repetition: u32) -> LogRecord {
        LogRecord {
            method: method.to_string(),
            footprint,
            time_ns,
            workload: workload.to_string(),
            repetition,
        }
    }

    fn sample_state() -> AggregateState {
        let mut state = AggregateState::new(&["Michael", "Harris_2"]);
        state.fold_record(&record("HP", 1, 1_000_000, "Michael", 0));
        state.fold_record(&record("HP", 2, 2_000_000, "Michael", 0));
        state.fold_record(&record("HP", 1, 1_000_000, "Michael", 1));
        state.fold_record(&record("HP", 2, 4_000_000, "Michael", 1));
        state.fold_record(&record("EBR", 1, 500_000, "Harris_2", 0));
        state
    }

    #[test]
    fn escape_specials() {
        assert_eq!(escape("02_nolink&co"), r"02\_nolink\&co");
        assert_eq!(escape("100%"), r"100\%");
        assert_eq!(escape("a~b"), r"a\textasciitilde{}b");
        assert_eq!(escape("plain.pl"), "plain.pl");
    }

    #[test]
    fn table_cells_and_placeholders() {
        let table = render_table(&sample_state(), SampleUnit::Nanoseconds);
        assert!(table.starts_with(r"\begin{tabular}{l|rr}"));
        assert!(table.contains(r"Workload & HP & EBR \\"));
        // Michael/HP: repetition totals 3ms and 5ms
        assert!(table.contains(r"Michael & $4.00 \pm 1.00$ & \textit{no data} \\"));
        assert!(table.contains(r"Harris\_2 & \textit{no data} & $0.50 \pm 0.00$ \\"));
        assert!(table.contains(r"Total & $4.00 \pm 1.00$ & $0.50 \pm 0.00$ \\"));
        assert!(table.trim_end().ends_with(r"\end{tabular}"));
    }

    #[test]
    fn table_row_per_workload_even_without_data() {
        let mut state = sample_state();
        state.seed_workload("Empty");
        let table = render_table(&state, SampleUnit::Nanoseconds);
        assert!(table.contains(r"Empty & \textit{no data} & \textit{no data} \\"));
    }

    #[test]
    fn millisecond_samples_are_not_rescaled() {
        let mut state = AggregateState::new(&["A.pl"]);
        state.fold(
            "A.pl",
            0,
            "plankton",
            &crate::types::ExtractedResult::Success(crate::types::RunMetrics {
                total_ms: 1500,
                iterations: 1,
                effects: 0,
                candidates: 0,
                phases: Default::default(),
            }),
        );
        let table = render_table(&state, SampleUnit::Milliseconds);
        assert!(table.contains(r"A.pl & $1500.00 \pm 0.00$ \\"));
    }

    #[test]
    fn shared_chart_has_series_per_variant() {
        let chart = render_chart(&sample_state(), None, SampleUnit::Nanoseconds).unwrap();
        assert!(chart.contains("symbolic x coords={1,2}"));
        assert_eq!(chart.matches(r"\addplot+").count(), 2);
        assert!(chart.contains(r"\addlegendentry{HP}"));
        assert!(chart.contains(r"\addlegendentry{EBR}"));
        // HP footprint 2: 2ms and 4ms
        assert!(chart.contains("(2, 3.000) +- (0, 1.000)"));
        assert!(!chart.contains("title="));
    }

    #[test]
    fn per_workload_charts_only_where_data_exists() {
        let mut state = sample_state();
        state.seed_workload("Empty");
        let doc = render_document(&state, ChartLayout::PerWorkload, SampleUnit::Nanoseconds);
        assert_eq!(doc.matches(r"\begin{tikzpicture}").count(), 2);
        assert!(doc.contains("title={Michael}"));
        assert!(doc.contains(r"title={Harris\_2}"));
    }

    #[test]
    fn document_without_footprints_has_no_chart() {
        let state = AggregateState::new(&["A.pl"]);
        let doc = render_document(&state, ChartLayout::Shared, SampleUnit::Milliseconds);
        assert!(doc.contains(r"\begin{tabular}"));
        assert!(!doc.contains("tikzpicture"));
    }
}
