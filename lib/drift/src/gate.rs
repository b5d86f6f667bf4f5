//! The retrain gate: compare two snapshots, always end with one signal token.

use crate::error::{DriftError, Result};
use crate::frame::SnapshotFrame;
use crate::report::{extract_verdict, DriftReport};
use atomicwrites::{AtomicFile, OverwriteBehavior};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

pub const DEFAULT_SIGNAL_FILE: &str = "drift_detected.txt";

/// Configuration for a drift check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftConfig {
    /// Dropped from both snapshots when present
    pub excluded_columns: Vec<String>,
    /// Must exist in both snapshots after exclusion
    pub required_columns: Vec<String>,
    /// Share of drifted columns that makes the whole dataset drift
    pub drift_share: f64,
    /// Reference row count up to which hypothesis tests are used
    pub small_sample_rows: usize,
    pub p_value_threshold: f64,
    pub distance_threshold: f64,
    /// Numeric columns with at most this many distinct values are categorical
    pub categorical_unique_limit: usize,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            excluded_columns: vec!["Outcome".to_string()],
            required_columns: Vec::new(),
            drift_share: 0.5,
            small_sample_rows: 1000,
            p_value_threshold: 0.05,
            distance_threshold: 0.1,
            categorical_unique_limit: 5,
        }
    }
}

impl DriftConfig {
    #[must_use]
    pub fn with_excluded_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_required_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_drift_share(mut self, share: f64) -> Self {
        self.drift_share = share;
        self
    }

    #[must_use]
    pub fn with_small_sample_rows(mut self, rows: usize) -> Self {
        self.small_sample_rows = rows;
        self
    }

    #[must_use]
    pub fn with_thresholds(mut self, p_value: f64, distance: f64) -> Self {
        self.p_value_threshold = p_value;
        self.distance_threshold = distance;
        self
    }
}

/// Terminal outcome of a drift check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftReason {
    DriftDetected,
    NoDrift,
    FileNotFound,
    DataLoad,
    ColumnNotFound,
    ReportExecution,
    KeyNotFound,
    ReportProcessing,
}

impl DriftReason {
    /// The token written to the signal file
    pub fn token(self) -> &'static str {
        match self {
            DriftReason::DriftDetected => "drift_detected",
            DriftReason::NoDrift => "no_drift",
            DriftReason::FileNotFound => "error: archivo_no_encontrado",
            DriftReason::DataLoad => "error: carga_datos",
            DriftReason::ColumnNotFound => "error: columna_no_encontrada",
            DriftReason::ReportExecution => "error: reporte_drift",
            DriftReason::KeyNotFound => "error: clave_no_encontrada",
            DriftReason::ReportProcessing => "error: procesamiento_reporte",
        }
    }

    pub fn is_error(self) -> bool {
        !matches!(self, DriftReason::DriftDetected | DriftReason::NoDrift)
    }

    pub fn from_token(token: &str) -> Option<Self> {
        const ALL: [DriftReason; 8] = [
            DriftReason::DriftDetected,
            DriftReason::NoDrift,
            DriftReason::FileNotFound,
            DriftReason::DataLoad,
            DriftReason::ColumnNotFound,
            DriftReason::ReportExecution,
            DriftReason::KeyNotFound,
            DriftReason::ReportProcessing,
        ];
        let token = token.trim();
        ALL.into_iter().find(|r| r.token() == token)
    }
}

impl From<&DriftError> for DriftReason {
    fn from(err: &DriftError) -> Self {
        match err {
            DriftError::ReferenceMissing(_) | DriftError::CurrentMissing(_) => DriftReason::FileNotFound,
            DriftError::SnapshotLoad(_) => DriftReason::DataLoad,
            DriftError::ColumnMissing(_) => DriftReason::ColumnNotFound,
            DriftError::ReportExecution(_) => DriftReason::ReportExecution,
            DriftError::ReportKeyMissing(_) => DriftReason::KeyNotFound,
            DriftError::ReportProcessing(_) => DriftReason::ReportProcessing,
        }
    }
}

impl fmt::Display for DriftReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftDecision {
    pub drift_detected: bool,
    pub reason: DriftReason,
}

impl DriftDecision {
    pub fn from_verdict(drift_detected: bool) -> Self {
        Self {
            drift_detected,
            reason: if drift_detected {
                DriftReason::DriftDetected
            } else {
                DriftReason::NoDrift
            },
        }
    }

    /// A failed check never asks for a retrain
    pub fn failed(reason: DriftReason) -> Self {
        Self {
            drift_detected: false,
            reason,
        }
    }

    #[inline]
    pub fn token(&self) -> &'static str {
        self.reason.token()
    }

    /// Persist the decision as a single token, replacing the file atomically
    pub fn write_signal<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        write_atomic(path.as_ref(), self.token().as_bytes())
    }
}

/// Decides whether fresh data has drifted away from the reference snapshot
#[derive(Debug, Clone, Default)]
pub struct DriftGate {
    config: DriftConfig,
}

impl DriftGate {
    pub fn new(config: DriftConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DriftConfig {
        &self.config
    }

    /// Run every stage and map the first failure to its reason code
    pub fn check<P: AsRef<Path>, Q: AsRef<Path>>(&self, reference: P, current: Q) -> DriftDecision {
        match self.evaluate(reference.as_ref(), current.as_ref()) {
            Ok(drift) => {
                let decision = DriftDecision::from_verdict(drift);
                tracing::info!(signal = decision.token(), "drift check finished");
                decision
            }
            Err(err) => {
                let reason = DriftReason::from(&err);
                tracing::warn!(error = %err, signal = reason.token(), "drift check failed");
                DriftDecision::failed(reason)
            }
        }
    }

    /// Check and write the resulting token to `signal_file`
    pub fn check_and_signal<P, Q, S>(&self, reference: P, current: Q, signal_file: S) -> io::Result<DriftDecision>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
        S: AsRef<Path>,
    {
        let decision = self.check(reference, current);
        decision.write_signal(signal_file)?;
        Ok(decision)
    }

    /// The staged pipeline behind [`check`](Self::check), with errors visible
    pub fn evaluate(&self, reference: &Path, current: &Path) -> Result<bool> {
        let mut reference_frame = load_snapshot(reference, true)?;
        let mut current_frame = load_snapshot(current, false)?;

        let columns = self.select_columns(&mut reference_frame, &mut current_frame)?;
        let report = DriftReport::compare(&reference_frame, &current_frame, &columns, &self.config)?;
        tracing::debug!(
            columns = report.number_of_columns(),
            drifted = report.number_of_drifted_columns(),
            "drift report computed"
        );

        extract_verdict(&report.to_json())
    }

    /// Drop excluded columns, then require every remaining reference column
    /// (and every configured one) to be present in the current snapshot
    fn select_columns(
        &self,
        reference: &mut SnapshotFrame,
        current: &mut SnapshotFrame,
    ) -> Result<Vec<String>> {
        reference.drop_columns(&self.config.excluded_columns);
        current.drop_columns(&self.config.excluded_columns);

        for name in &self.config.required_columns {
            if !reference.has_column(name) || !current.has_column(name) {
                return Err(DriftError::ColumnMissing(name.clone()));
            }
        }
        if let Some(name) = reference.names().iter().find(|n| !current.has_column(n)) {
            return Err(DriftError::ColumnMissing(name.clone()));
        }
        Ok(reference.names().to_vec())
    }
}

fn load_snapshot(path: &Path, is_reference: bool) -> Result<SnapshotFrame> {
    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound if is_reference => DriftError::ReferenceMissing(path.to_path_buf()),
        io::ErrorKind::NotFound => DriftError::CurrentMissing(path.to_path_buf()),
        _ => DriftError::SnapshotLoad(format!("{}: {}", path.display(), e)),
    })?;
    SnapshotFrame::from_reader(file)
        .map_err(|e| DriftError::SnapshotLoad(format!("{}: {}", path.display(), e)))
}

/// Which snapshot slot received freshly extracted data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotSlot {
    Reference,
    Current,
}

/// Store a new extraction: it becomes the reference if none exists yet,
/// otherwise it replaces the current snapshot.
pub fn stage_snapshot<R: Read>(
    mut source: R,
    reference: &Path,
    current: &Path,
) -> io::Result<SnapshotSlot> {
    let mut data = Vec::new();
    source.read_to_end(&mut data)?;

    let (slot, target) = if reference.exists() {
        (SnapshotSlot::Current, current)
    } else {
        (SnapshotSlot::Reference, reference)
    };
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    write_atomic(target, &data)?;
    tracing::info!(slot = ?slot, path = %target.display(), bytes = data.len(), "staged snapshot");
    Ok(slot)
}

fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
        .write(|f| f.write_all(data))
        .map_err(|e| match e {
            atomicwrites::Error::Internal(e) | atomicwrites::Error::User(e) => e,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const SNAPSHOT: &str = "\
INVOICENO,STOCKCODE,QUANTITY,UNITPRICE,Outcome
536365,85123A,6,2.55,1
536365,71053,6,3.39,0
536366,22633,2,1.85,1
536366,22632,2,1.85,0
536367,84879,32,1.69,1
536367,22745,6,2.10,0
536368,22960,3,4.25,1
536369,21756,3,5.95,0
";

    fn write(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_identical_snapshots_no_drift() {
        let dir = TempDir::new().unwrap();
        let reference = write(&dir, "old.csv", SNAPSHOT);
        let current = write(&dir, "new.csv", SNAPSHOT);

        let decision = DriftGate::default().check(&reference, &current);
        assert_eq!(decision, DriftDecision::from_verdict(false));
        assert_eq!(decision.token(), "no_drift");
    }

    #[test]
    fn test_missing_reference() {
        let dir = TempDir::new().unwrap();
        let current = write(&dir, "new.csv", SNAPSHOT);

        let decision = DriftGate::default().check(dir.path().join("old.csv"), &current);
        assert!(!decision.drift_detected);
        assert_eq!(decision.token(), "error: archivo_no_encontrado");
    }

    #[test]
    fn test_missing_current() {
        let dir = TempDir::new().unwrap();
        let reference = write(&dir, "old.csv", SNAPSHOT);
        let decision = DriftGate::default().check(&reference, dir.path().join("new.csv"));
        assert_eq!(decision.reason, DriftReason::FileNotFound);
    }

    #[test]
    fn test_unparseable_snapshot() {
        let dir = TempDir::new().unwrap();
        let reference = write(&dir, "old.csv", SNAPSHOT);
        let current = write(&dir, "new.csv", "a,b\n1,2\n3\n");
        let decision = DriftGate::default().check(&reference, &current);
        assert_eq!(decision.token(), "error: carga_datos");
    }

    #[test]
    fn test_missing_column() {
        let dir = TempDir::new().unwrap();
        let reference = write(&dir, "old.csv", SNAPSHOT);
        let current = write(&dir, "new.csv", "INVOICENO,STOCKCODE\n1,A\n");
        let decision = DriftGate::default().check(&reference, &current);
        assert_eq!(decision.token(), "error: columna_no_encontrada");
    }

    #[test]
    fn test_excluded_column_may_be_absent() {
        let dir = TempDir::new().unwrap();
        let without_outcome: String = SNAPSHOT
            .lines()
            .map(|l| l.rsplit_once(',').map_or(l, |(head, _)| head))
            .collect::<Vec<_>>()
            .join("\n");
        let reference = write(&dir, "old.csv", SNAPSHOT);
        let current = write(&dir, "new.csv", &without_outcome);
        let decision = DriftGate::default().check(&reference, &current);
        assert_eq!(decision.reason, DriftReason::NoDrift);
    }

    #[test]
    fn test_required_column() {
        let dir = TempDir::new().unwrap();
        let reference = write(&dir, "old.csv", SNAPSHOT);
        let gate = DriftGate::new(DriftConfig::default().with_required_columns(["COUNTRY"]));
        assert_eq!(gate.check(&reference, &reference).reason, DriftReason::ColumnNotFound);
    }

    #[test]
    fn test_empty_current_snapshot() {
        let dir = TempDir::new().unwrap();
        let reference = write(&dir, "old.csv", SNAPSHOT);
        let current = write(&dir, "new.csv", "INVOICENO,STOCKCODE,QUANTITY,UNITPRICE,Outcome\n");
        let decision = DriftGate::default().check(&reference, &current);
        assert_eq!(decision.token(), "error: reporte_drift");
    }

    #[test]
    fn test_shifted_snapshot_drifts() {
        let dir = TempDir::new().unwrap();
        let mut reference = String::from("QUANTITY,COUNTRY\n");
        let mut current = String::from("QUANTITY,COUNTRY\n");
        for i in 0..100 {
            reference.push_str(&format!("{},UK\n", i));
            current.push_str(&format!("{},FR\n", i + 1000));
        }
        let reference = write(&dir, "old.csv", &reference);
        let current = write(&dir, "new.csv", &current);

        let decision = DriftGate::default().check(&reference, &current);
        assert!(decision.drift_detected);
        assert_eq!(decision.token(), "drift_detected");
    }

    #[test]
    fn test_write_signal() {
        let dir = TempDir::new().unwrap();
        let signal = dir.path().join(DEFAULT_SIGNAL_FILE);
        DriftDecision::from_verdict(true).write_signal(&signal).unwrap();
        assert_eq!(fs::read_to_string(&signal).unwrap(), "drift_detected");

        DriftDecision::failed(DriftReason::KeyNotFound).write_signal(&signal).unwrap();
        let token = fs::read_to_string(&signal).unwrap();
        assert_eq!(token, "error: clave_no_encontrada");
        assert_eq!(DriftReason::from_token(&token), Some(DriftReason::KeyNotFound));
    }

    #[test]
    fn test_check_and_signal() {
        let dir = TempDir::new().unwrap();
        let signal = dir.path().join("signal.txt");
        let decision = DriftGate::default()
            .check_and_signal(dir.path().join("old.csv"), dir.path().join("new.csv"), &signal)
            .unwrap();
        assert!(decision.reason.is_error());
        assert_eq!(fs::read_to_string(&signal).unwrap(), "error: archivo_no_encontrado");
    }

    #[test]
    fn test_stage_snapshot_slots() {
        let dir = TempDir::new().unwrap();
        let reference = dir.path().join("data/old.csv");
        let current = dir.path().join("data/new.csv");

        let slot = stage_snapshot(SNAPSHOT.as_bytes(), &reference, &current).unwrap();
        assert_eq!(slot, SnapshotSlot::Reference);
        assert!(!current.exists());

        let slot = stage_snapshot("a\n1\n".as_bytes(), &reference, &current).unwrap();
        assert_eq!(slot, SnapshotSlot::Current);
        assert_eq!(fs::read_to_string(&reference).unwrap(), SNAPSHOT);
        assert_eq!(fs::read_to_string(&current).unwrap(), "a\n1\n");
    }

    #[test]
    fn test_reason_tokens_are_distinct() {
        let tokens: std::collections::BTreeSet<_> = [
            DriftReason::DriftDetected,
            DriftReason::NoDrift,
            DriftReason::FileNotFound,
            DriftReason::DataLoad,
            DriftReason::ColumnNotFound,
            DriftReason::ReportExecution,
            DriftReason::KeyNotFound,
            DriftReason::ReportProcessing,
        ]
        .iter()
        .map(|r| r.token())
        .collect();
        assert_eq!(tokens.len(), 8);
    }
}
