//! Per-column drift results and the dataset-level verdict.

use crate::error::{DriftError, Result};
use crate::frame::{self, ColumnKind, SnapshotFrame};
use crate::gate::DriftConfig;
use crate::stats;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Floor for the reference spread when normalizing the Wasserstein distance
const MIN_NORM: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatTest {
    /// Kolmogorov-Smirnov, p-value
    Ks,
    /// Chi-square homogeneity, p-value
    ChiSquare,
    /// Wasserstein distance over the reference std
    Wasserstein,
    /// Jensen-Shannon distance
    JensenShannon,
}

impl StatTest {
    fn select(kind: ColumnKind, reference_rows: usize, config: &DriftConfig) -> Self {
        let small = reference_rows <= config.small_sample_rows;
        match (kind, small) {
            (ColumnKind::Numeric, true) => StatTest::Ks,
            (ColumnKind::Categorical, true) => StatTest::ChiSquare,
            (ColumnKind::Numeric, false) => StatTest::Wasserstein,
            (ColumnKind::Categorical, false) => StatTest::JensenShannon,
        }
    }

    #[inline]
    fn is_p_value(self) -> bool {
        matches!(self, StatTest::Ks | StatTest::ChiSquare)
    }

    fn threshold(self, config: &DriftConfig) -> f64 {
        if self.is_p_value() {
            config.p_value_threshold
        } else {
            config.distance_threshold
        }
    }

    /// p-values drift below the threshold, distances at or above it
    fn detects(self, score: f64, threshold: f64) -> bool {
        if self.is_p_value() {
            score < threshold
        } else {
            score >= threshold
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDrift {
    pub column: String,
    pub kind: ColumnKind,
    pub stattest: StatTest,
    pub score: f64,
    pub threshold: f64,
    pub drift_detected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub drift_share: f64,
    pub columns: Vec<ColumnDrift>,
}

impl DriftReport {
    /// Compare `columns` of the two snapshots.
    ///
    /// Columns with no values on either side are skipped. Fails when either
    /// snapshot has no rows or nothing is left to compare.
    pub fn compare(
        reference: &SnapshotFrame,
        current: &SnapshotFrame,
        columns: &[String],
        config: &DriftConfig,
    ) -> Result<Self> {
        if reference.n_rows() == 0 || current.n_rows() == 0 {
            return Err(DriftError::ReportExecution(format!(
                "empty snapshot (reference rows: {}, current rows: {})",
                reference.n_rows(),
                current.n_rows()
            )));
        }

        let mut results = Vec::with_capacity(columns.len());
        for name in columns {
            let (Some(ref_values), Some(cur_values)) = (reference.column(name), current.column(name))
            else {
                return Err(DriftError::ColumnMissing(name.clone()));
            };
            if frame::present(ref_values).next().is_none() || frame::present(cur_values).next().is_none() {
                tracing::warn!(column = %name, "skipping column without values");
                continue;
            }
            results.push(compare_column(name, ref_values, cur_values, reference.n_rows(), config));
        }

        if results.is_empty() {
            return Err(DriftError::ReportExecution(
                "no comparable columns in snapshots".to_string(),
            ));
        }

        Ok(Self {
            drift_share: config.drift_share,
            columns: results,
        })
    }

    pub fn number_of_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn number_of_drifted_columns(&self) -> usize {
        self.columns.iter().filter(|c| c.drift_detected).count()
    }

    pub fn share_of_drifted_columns(&self) -> f64 {
        if self.columns.is_empty() {
            return 0.0;
        }
        self.number_of_drifted_columns() as f64 / self.number_of_columns() as f64
    }

    pub fn dataset_drift(&self) -> bool {
        !self.columns.is_empty() && self.share_of_drifted_columns() >= self.drift_share
    }

    /// Report document: a dataset summary metric followed by the per-column table
    pub fn to_json(&self) -> Value {
        let by_column: serde_json::Map<String, Value> = self
            .columns
            .iter()
            .map(|c| {
                (
                    c.column.clone(),
                    json!({
                        "column_type": c.kind,
                        "stattest_name": c.stattest,
                        "drift_score": finite_or_null(c.score),
                        "stattest_threshold": c.threshold,
                        "drift_detected": c.drift_detected,
                    }),
                )
            })
            .collect();

        json!({
            "metrics": [
                {
                    "metric": "DatasetDriftMetric",
                    "result": {
                        "drift_share": self.drift_share,
                        "number_of_columns": self.number_of_columns(),
                        "number_of_drifted_columns": self.number_of_drifted_columns(),
                        "share_of_drifted_columns": self.share_of_drifted_columns(),
                        "dataset_drift": self.dataset_drift(),
                    }
                },
                {
                    "metric": "DataDriftTable",
                    "result": {
                        "number_of_columns": self.number_of_columns(),
                        "drift_by_columns": by_column,
                    }
                }
            ]
        })
    }
}

fn finite_or_null(v: f64) -> Value {
    if v.is_finite() {
        json!(v)
    } else {
        Value::Null
    }
}

fn compare_column(
    name: &str,
    reference: &[String],
    current: &[String],
    reference_rows: usize,
    config: &DriftConfig,
) -> ColumnDrift {
    let kind = frame::infer_kind(reference, current, config.categorical_unique_limit);
    let stattest = StatTest::select(kind, reference_rows, config);

    let score = match (kind, frame::numeric_values(reference), frame::numeric_values(current)) {
        (ColumnKind::Numeric, Some(a), Some(b)) => match stattest {
            StatTest::Ks => stats::ks_2samp(&a, &b).p_value,
            _ => stats::wasserstein_distance(&a, &b) / stats::std_dev(&a).max(MIN_NORM),
        },
        _ => match stattest {
            StatTest::ChiSquare => {
                stats::chi_square_homogeneity(frame::present(reference), frame::present(current))
                    .p_value
            }
            _ => stats::jensen_shannon_distance(frame::present(reference), frame::present(current)),
        },
    };

    let threshold = stattest.threshold(config);
    let drift_detected = stattest.detects(score, threshold);
    tracing::debug!(
        column = name,
        stattest = ?stattest,
        score,
        drift_detected,
        "compared column"
    );

    ColumnDrift {
        column: name.to_string(),
        kind,
        stattest,
        score,
        threshold,
        drift_detected,
    }
}

/// Read `metrics[0].result.dataset_drift` from a report document
pub fn extract_verdict(report: &Value) -> Result<bool> {
    const POINTER: &str = "/metrics/0/result/dataset_drift";
    match report.pointer(POINTER) {
        None => Err(DriftError::ReportKeyMissing(
            "metrics[0].result.dataset_drift".to_string(),
        )),
        Some(Value::Bool(drift)) => Ok(*drift),
        Some(other) => Err(DriftError::ReportProcessing(format!(
            "dataset_drift is not a boolean: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(values: impl IntoIterator<Item = impl ToString>) -> Vec<String> {
        values.into_iter().map(|v| v.to_string()).collect()
    }

    fn frame(quantities: Vec<String>, countries: Vec<String>) -> SnapshotFrame {
        SnapshotFrame::from_columns(vec![("QUANTITY", quantities), ("COUNTRY", countries)])
    }

    fn names() -> Vec<String> {
        column(["QUANTITY", "COUNTRY"])
    }

    fn countries(n: usize, pick: impl Fn(usize) -> &'static str) -> Vec<String> {
        (0..n).map(|i| pick(i).to_string()).collect()
    }

    #[test]
    fn test_identical_snapshots_do_not_drift() {
        let reference = frame(column(0..200), countries(200, |i| ["UK", "FR", "DE"][i % 3]));
        let report = DriftReport::compare(&reference, &reference, &names(), &DriftConfig::default())
            .unwrap();
        assert_eq!(report.number_of_columns(), 2);
        assert_eq!(report.number_of_drifted_columns(), 0);
        assert!(!report.dataset_drift());
        assert_eq!(report.columns[0].stattest, StatTest::Ks);
        assert_eq!(report.columns[1].stattest, StatTest::ChiSquare);
        assert!(!extract_verdict(&report.to_json()).unwrap());
    }

    #[test]
    fn test_shifted_snapshots_drift() {
        let reference = frame(column(0..200), countries(200, |i| ["UK", "FR"][i % 2]));
        let current = frame(column(500..700), countries(200, |_| "UK"));
        let report =
            DriftReport::compare(&reference, &current, &names(), &DriftConfig::default()).unwrap();
        assert_eq!(report.number_of_drifted_columns(), 2);
        assert_eq!(report.share_of_drifted_columns(), 1.0);
        assert!(extract_verdict(&report.to_json()).unwrap());
    }

    #[test]
    fn test_drift_share_threshold() {
        // only the numeric column moves: 1 of 2 columns
        let reference = frame(column(0..200), countries(200, |i| ["UK", "FR"][i % 2]));
        let current = frame(column(500..700), countries(200, |i| ["UK", "FR"][i % 2]));

        let report =
            DriftReport::compare(&reference, &current, &names(), &DriftConfig::default()).unwrap();
        assert_eq!(report.number_of_drifted_columns(), 1);
        assert!(report.dataset_drift());

        let strict = DriftConfig::default().with_drift_share(0.75);
        let report = DriftReport::compare(&reference, &current, &names(), &strict).unwrap();
        assert!(!report.dataset_drift());
    }

    #[test]
    fn test_large_reference_uses_distances() {
        let reference = frame(column(0..2000), countries(2000, |i| ["UK", "FR"][i % 2]));
        let report = DriftReport::compare(&reference, &reference, &names(), &DriftConfig::default())
            .unwrap();
        assert_eq!(report.columns[0].stattest, StatTest::Wasserstein);
        assert_eq!(report.columns[1].stattest, StatTest::JensenShannon);
        assert_eq!(report.columns[0].score, 0.0);
        assert!(!report.dataset_drift());
    }

    #[test]
    fn test_empty_snapshot_fails() {
        let reference = frame(column(0..10), countries(10, |_| "UK"));
        let current = frame(Vec::new(), Vec::new());
        let err = DriftReport::compare(&reference, &current, &names(), &DriftConfig::default())
            .unwrap_err();
        assert!(matches!(err, DriftError::ReportExecution(_)));
    }

    #[test]
    fn test_columns_without_values_are_skipped() {
        let blanks = column(std::iter::repeat("").take(10));
        let reference = frame(blanks.clone(), countries(10, |_| "UK"));
        let report = DriftReport::compare(&reference, &reference, &names(), &DriftConfig::default())
            .unwrap();
        assert_eq!(report.number_of_columns(), 1);
        assert_eq!(report.columns[0].column, "COUNTRY");

        let only_blanks = frame(blanks.clone(), blanks);
        let err = DriftReport::compare(&only_blanks, &only_blanks, &names(), &DriftConfig::default())
            .unwrap_err();
        assert!(matches!(err, DriftError::ReportExecution(_)));
    }

    #[test]
    fn test_extract_verdict_errors() {
        let missing = json!({"metrics": [{"result": {}}]});
        assert!(matches!(extract_verdict(&missing), Err(DriftError::ReportKeyMissing(_))));

        let no_metrics = json!({});
        assert!(matches!(extract_verdict(&no_metrics), Err(DriftError::ReportKeyMissing(_))));

        let malformed = json!({"metrics": [{"result": {"dataset_drift": "yes"}}]});
        assert!(matches!(extract_verdict(&malformed), Err(DriftError::ReportProcessing(_))));
    }

    #[test]
    fn test_report_document_shape() {
        let reference = frame(column(0..20), countries(20, |_| "UK"));
        let doc = DriftReport::compare(&reference, &reference, &names(), &DriftConfig::default())
            .unwrap()
            .to_json();
        assert_eq!(doc["metrics"][0]["metric"], "DatasetDriftMetric");
        assert_eq!(doc["metrics"][0]["result"]["number_of_columns"], 2);
        assert_eq!(
            doc["metrics"][1]["result"]["drift_by_columns"]["QUANTITY"]["stattest_name"],
            "ks"
        );
    }
}
