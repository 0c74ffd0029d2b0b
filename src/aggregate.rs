use std::collections::BTreeMap;

use crate::record::LogRecord;
use crate::types::{ExtractedResult, FailureKind, Metric};

/// Key of the per-(variant, workload) views.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct VariantKey {
    pub variant: String,
    pub workload: String,
}

impl VariantKey {
    pub fn new(variant: &str, workload: &str) -> Self {
        VariantKey {
            variant: variant.to_string(),
            workload: workload.to_string(),
        }
    }
}

/// Samples accumulated over one harness invocation.
///
/// Every configured workload is seeded up front so it is reported even when
/// none of its runs succeed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateState {
    workloads: Vec<String>,
    variants: Vec<String>,
    samples: BTreeMap<String, BTreeMap<Metric, Vec<f64>>>,
    failures: BTreeMap<String, BTreeMap<FailureKind, usize>>,
    repetition_sums: BTreeMap<VariantKey, BTreeMap<u32, f64>>,
    footprints: BTreeMap<VariantKey, BTreeMap<u64, Vec<f64>>>,
}

impl AggregateState {
    pub fn new<S: AsRef<str>>(workloads: &[S]) -> Self {
        let mut state = AggregateState::default();
        for workload in workloads {
            state.seed_workload(workload.as_ref());
        }
        state
    }

    pub fn seed_workload(&mut self, workload: &str) {
        if !self.workloads.iter().any(|w| w == workload) {
            self.workloads.push(workload.to_string());
        }
    }

    pub fn seed_variant(&mut self, variant: &str) {
        if !self.variants.iter().any(|v| v == variant) {
            self.variants.push(variant.to_string());
        }
    }

    pub fn workloads(&self) -> &[String] {
        &self.workloads
    }

    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    /// Fold one extracted run into the per-workload and per-variant views.
    pub fn fold(&mut self, workload: &str, repetition: u32, variant: &str, result: &ExtractedResult) {
        self.seed_workload(workload);
        self.seed_variant(variant);

        let metrics = match result {
            ExtractedResult::Failure { kind, .. } => {
                *self
                    .failures
                    .entry(workload.to_string())
                    .or_default()
                    .entry(*kind)
                    .or_insert(0) += 1;
                return;
            }
            ExtractedResult::Success(metrics) => metrics,
        };

        let columns = self.samples.entry(workload.to_string()).or_default();
        for metric in Metric::ALL {
            if let Some(value) = metrics.value(metric) {
                columns.entry(metric).or_default().push(value as f64);
            }
        }

        *self
            .repetition_sums
            .entry(VariantKey::new(variant, workload))
            .or_default()
            .entry(repetition)
            .or_insert(0.0) += metrics.total_ms as f64;
    }

    /// Fold one flat-log record. Times stay in nanoseconds.
    pub fn fold_record(&mut self, record: &LogRecord) {
        self.seed_workload(&record.workload);
        self.seed_variant(&record.method);

        let key = VariantKey::new(&record.method, &record.workload);
        *self
            .repetition_sums
            .entry(key.clone())
            .or_default()
            .entry(record.repetition)
            .or_insert(0.0) += record.time_ns as f64;
        self.footprints
            .entry(key)
            .or_default()
            .entry(record.footprint)
            .or_default()
            .push(record.time_ns as f64);
    }

    pub fn samples(&self, workload: &str, metric: Metric) -> &[f64] {
        self.samples
            .get(workload)
            .and_then(|columns| columns.get(&metric))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn success_count(&self, workload: &str) -> usize {
        self.samples(workload, Metric::TotalTime).len()
    }

    pub fn failures(&self, workload: &str) -> BTreeMap<FailureKind, usize> {
        self.failures.get(workload).cloned().unwrap_or_default()
    }

    pub fn failure_count(&self, workload: &str) -> usize {
        self.failures
            .get(workload)
            .map(|kinds| kinds.values().sum())
            .unwrap_or(0)
    }

    pub fn total_failures(&self) -> usize {
        self.failures.values().flat_map(|kinds| kinds.values()).sum()
    }

    /// Per-repetition totals for one (variant, workload) cell, in repetition order.
    ///
    /// Sub-measurements are summed within a repetition first so repetitions
    /// that logged more events do not weigh more in the average.
    pub fn repetition_totals(&self, variant: &str, workload: &str) -> Vec<f64> {
        self.repetition_sums
            .get(&VariantKey::new(variant, workload))
            .map(|reps| reps.values().copied().collect())
            .unwrap_or_default()
    }

    pub fn has_footprints(&self) -> bool {
        !self.footprints.is_empty()
    }

    /// Footprint samples for a variant, for one workload or pooled over all.
    pub fn footprint_samples(&self, variant: &str, workload: Option<&str>) -> BTreeMap<u64, Vec<f64>> {
        let mut pooled: BTreeMap<u64, Vec<f64>> = BTreeMap::new();
        for (key, sizes) in &self.footprints {
            if key.variant != variant || workload.is_some_and(|w| w != key.workload) {
                continue;
            }
            for (size, times) in sizes {
                pooled.entry(*size).or_default().extend(times);
            }
        }
        pooled
    }
}

/// Arithmetic mean rounded half-to-even to `places` decimals; `None` for no samples.
pub fn average(samples: &[f64], places: u32) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    let scale = 10f64.powi(places as i32);
    Some((mean * scale).round_ties_even() / scale)
}

/// Population standard deviation (divides by the sample count).
pub fn deviation(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    Some(variance.sqrt())
}

/// `part` as a whole-number share of `total`, or `--` when `total` is zero.
pub fn percentage(part: f64, total: f64) -> String {
    if total == 0.0 {
        return "--".to_string();
    }
    format!("{}%", (100.0 * part / total).round_ties_even() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Phase, RunMetrics};

    fn success(total_ms: u64, iterations: u64) -> ExtractedResult {
        let phases = Phase::ALL.iter().map(|p| (*p, total_ms / 10)).collect();
        ExtractedResult::Success(RunMetrics {
            total_ms,
            iterations,
            effects: 5,
            candidates: 0,
            phases,
        })
    }

    fn record(method: &str, footprint: u64, time_ns: u64, workload: &str, repetition: u32) -> LogRecord {
        LogRecord {
            method: method.to_string(),
            footprint,
            time_ns,
            workload: workload.to_string(),
            repetition,
        }
    }

    // ---- reductions ----

    #[test]
    fn average_rounds_to_places() {
        assert_eq!(average(&[1.0, 2.0], 0), Some(2.0));
        assert_eq!(average(&[1.0, 2.0, 2.0], 2), Some(1.67));
        assert_eq!(average(&[], 2), None);
    }

    #[test]
    fn deviation_is_population() {
        // sample deviation would be ~2.138
        let dev = deviation(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((dev - 2.0).abs() < 1e-9);
        assert_eq!(deviation(&[42.0]), Some(0.0));
        assert_eq!(deviation(&[]), None);
    }

    #[test]
    fn percentage_with_zero_total_is_sentinel() {
        assert_eq!(percentage(10.0, 0.0), "--");
        assert_eq!(percentage(0.0, 0.0), "--");
    }

    #[test]
    fn percentage_rounds() {
        assert_eq!(percentage(10.0, 100.0), "10%");
        assert_eq!(percentage(1.0, 3.0), "33%");
        assert_eq!(percentage(2.0, 3.0), "67%");
    }

    #[test]
    fn halves_round_to_even() {
        assert_eq!(average(&[2.0, 3.0], 0), Some(2.0));
        assert_eq!(average(&[3.0, 4.0], 0), Some(4.0));
        assert_eq!(average(&[0.125], 2), Some(0.12));
        assert_eq!(percentage(2.5, 100.0), "2%");
        assert_eq!(percentage(3.5, 100.0), "4%");
    }

    // ---- fold ----

    #[test]
    fn seeded_workloads_keep_order() {
        let state = AggregateState::new(&["b.pl", "a.pl", "b.pl"]);
        assert_eq!(state.workloads(), &["b.pl".to_string(), "a.pl".to_string()]);
        assert_eq!(state.success_count("a.pl"), 0);
    }

    #[test]
    fn failure_adds_no_samples() {
        let mut state = AggregateState::new(&["A.pl"]);
        state.fold(
            "A.pl",
            0,
            "default",
            &ExtractedResult::failure(FailureKind::ReportedFailure, "error message"),
        );
        assert_eq!(state.success_count("A.pl"), 0);
        assert_eq!(state.failure_count("A.pl"), 1);
        assert_eq!(state.failures("A.pl")[&FailureKind::ReportedFailure], 1);
        assert!(state.repetition_totals("default", "A.pl").is_empty());
    }

    #[test]
    fn success_adds_one_sample_per_metric() {
        let mut state = AggregateState::new(&["A.pl"]);
        state.fold("A.pl", 0, "default", &success(100, 4));
        for metric in Metric::ALL {
            assert_eq!(state.samples("A.pl", metric).len(), 1, "{:?}", metric);
        }
        assert_eq!(state.samples("A.pl", Metric::Iterations), &[4.0]);
    }

    #[test]
    fn only_successes_count_towards_average() {
        let mut state = AggregateState::new(&["A.pl"]);
        state.fold("A.pl", 0, "default", &success(100, 4));
        state.fold(
            "A.pl",
            1,
            "default",
            &ExtractedResult::failure(FailureKind::ReportedFailure, "error message"),
        );
        assert_eq!(average(state.samples("A.pl", Metric::TotalTime), 0), Some(100.0));
        assert_eq!(state.failure_count("A.pl"), 1);
        assert_eq!(state.success_count("A.pl"), 1);
    }

    #[test]
    fn fold_is_repeatable_from_fresh_state() {
        let results = vec![
            success(100, 4),
            ExtractedResult::failure(FailureKind::Timeout, "timeout"),
            success(300, 2),
        ];
        let run = || {
            let mut state = AggregateState::new(&["A.pl", "B.pl"]);
            for (i, result) in results.iter().enumerate() {
                state.fold(if i % 2 == 0 { "A.pl" } else { "B.pl" }, i as u32, "v", result);
            }
            state
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn unknown_workload_is_appended() {
        let mut state = AggregateState::new(&["A.pl"]);
        state.fold("C.pl", 0, "default", &success(10, 1));
        assert_eq!(state.workloads().len(), 2);
        assert_eq!(state.workloads()[1], "C.pl");
    }

    // ---- fold_record ----

    #[test]
    fn repetition_totals_sum_before_averaging() {
        let mut state = AggregateState::default();
        // repetition 0 logs three events, repetition 1 logs one
        state.fold_record(&record("HP", 1, 100, "Michael", 0));
        state.fold_record(&record("HP", 2, 100, "Michael", 0));
        state.fold_record(&record("HP", 3, 100, "Michael", 0));
        state.fold_record(&record("HP", 1, 500, "Michael", 1));

        let totals = state.repetition_totals("HP", "Michael");
        assert_eq!(totals, vec![300.0, 500.0]);
        assert_eq!(average(&totals, 0), Some(400.0));
    }

    #[test]
    fn footprint_samples_per_workload_and_pooled() {
        let mut state = AggregateState::default();
        state.fold_record(&record("HP", 1, 100, "Michael", 0));
        state.fold_record(&record("HP", 1, 300, "Harris", 0));
        state.fold_record(&record("HP", 2, 50, "Harris", 0));
        state.fold_record(&record("EBR", 1, 7, "Harris", 0));

        let michael = state.footprint_samples("HP", Some("Michael"));
        assert_eq!(michael.len(), 1);
        assert_eq!(michael[&1], vec![100.0]);

        let pooled = state.footprint_samples("HP", None);
        assert_eq!(pooled[&1].len(), 2);
        assert_eq!(pooled[&2], vec![50.0]);

        assert_eq!(state.variants(), &["HP".to_string(), "EBR".to_string()]);
        assert_eq!(state.workloads(), &["Michael".to_string(), "Harris".to_string()]);
        assert!(state.has_footprints());
    }
}
