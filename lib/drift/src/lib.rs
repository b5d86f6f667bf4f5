//! # basketx Drift
//!
//! Decides whether the recommendation models must be retrained by comparing
//! a reference transaction snapshot with a freshly extracted one.
//!
//! Every run ends in exactly one [`DriftReason`], written as a single token
//! to the signal file the training scheduler polls:
//!
//! ```rust,no_run
//! use basketx_drift::{DriftGate, DEFAULT_SIGNAL_FILE};
//!
//! let decision = DriftGate::default().check("data/old_invoice_data.csv", "data/new_invoice_data.csv");
//! decision.write_signal(DEFAULT_SIGNAL_FILE).unwrap();
//! if decision.drift_detected {
//!     println!("retraining");
//! }
//! ```

pub mod error;
pub mod frame;
pub mod gate;
pub mod report;
pub mod stats;

pub use error::{DriftError, Result};
pub use frame::{ColumnKind, SnapshotFrame};
pub use gate::{
    stage_snapshot, DriftConfig, DriftDecision, DriftGate, DriftReason, SnapshotSlot,
    DEFAULT_SIGNAL_FILE,
};
pub use report::{extract_verdict, ColumnDrift, DriftReport, StatTest};
