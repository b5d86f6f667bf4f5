//! # basketx
//!
//! Retail product recommendations from transaction history.
//!
//! basketx trains two complementary models offline and serves lookups
//! against them:
//!
//! - an item-to-item cosine similarity model over invoice co-occurrence
//! - a frequent-itemset association-rule model (Apriori or FP-Growth)
//!
//! A drift gate compares a reference transaction snapshot with a fresh one
//! and signals when the models should be rebuilt.
//!
//! ## Quick Start
//!
//! ### As a Server
//!
//! ```bash
//! basketx train --input data/transactions.csv --data-dir ./data
//! basketx serve --data-dir ./data --http-port 6333
//! basketx drift --reference data/old_invoice_data.csv --current data/new_invoice_data.csv
//! ```
//!
//! ### As a Library
//!
//! ```rust
//! use basketx::prelude::*;
//!
//! let rows = vec![
//!     TransactionRow::new("536365", "85123A", 6),
//!     TransactionRow::new("536365", "71053", 6),
//!     TransactionRow::new("536366", "85123A", 2),
//!     TransactionRow::new("536366", "22633", 2),
//! ];
//!
//! let models = TrainingPipeline::default().train(&rows).unwrap();
//! let registry = ModelRegistry::new(models.into_snapshot());
//!
//! let snapshot = registry.snapshot();
//! let similar = snapshot.similar_products("85123A", 10).unwrap();
//! assert_eq!(similar.len(), 2);
//! let bought_with = snapshot.rule_recommendations("71053", 10);
//! assert_eq!(bought_with, vec!["85123A"]);
//! ```
//!
//! ## Crate Structure
//!
//! - `basketx-core` - transactions, basket tables, similarity, rule mining, lookups, registry
//! - `basketx-drift` - snapshot comparison and the retrain signal
//! - `basketx-storage` - persisted model artifacts
//! - `basketx-api` - REST API

// Re-export core types
pub use basketx_core::{
    read_transactions, read_transactions_file, AssociationRule, BasketBuilder, BasketTable,
    CoOccurrenceTable, CoOccurrenceWeight, Error, ItemSet, MinerConfig, MiningStrategy,
    ModelRegistry, ModelSnapshot, RecommendationRequest, Recommendations, Result, RuleMetric,
    RuleMiner, RuleSet, SimilarityEngine, SimilarityMatrix, TrainedModels, TrainingConfig,
    TrainingError, TrainingMetadata, TrainingPipeline, TransactionRow,
};

// Re-export drift gate
pub use basketx_drift::{DriftConfig, DriftDecision, DriftGate, DriftReason};

// Re-export storage
pub use basketx_storage::{ArtifactStore, StorageError};

// Re-export API
pub use basketx_api::RestApi;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        ArtifactStore, DriftConfig, DriftDecision, DriftGate, DriftReason, Error, MinerConfig,
        MiningStrategy, ModelRegistry, ModelSnapshot, RestApi, Result, RuleMetric, RuleSet,
        TrainingConfig, TrainingPipeline, TransactionRow,
    };
}
