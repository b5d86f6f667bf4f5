//! # basketx Core
//!
//! Core library for the basketx product recommendation engine.
//!
//! This crate turns raw transaction lines into two recommendation models and
//! answers lookups against them:
//!
//! - [`BasketBuilder`] - invoice × product co-occurrence and basket tables
//! - [`SimilarityEngine`] - item-to-item cosine similarity
//! - [`RuleMiner`] - frequent itemsets ([`Apriori`] or [`FpGrowth`]) and association rules
//! - [`recommend`] - similarity and rule lookups
//! - [`ModelRegistry`] - the models currently served, swapped atomically on reload
//! - [`TrainingPipeline`] - the whole offline build in one call
//!
//! ## Example
//!
//! ```rust
//! use basketx_core::{ModelRegistry, TrainingPipeline, TransactionRow};
//!
//! let rows = vec![
//!     TransactionRow::new("536365", "85123A", 6),
//!     TransactionRow::new("536365", "71053", 6),
//!     TransactionRow::new("536366", "85123A", 2),
//!     TransactionRow::new("536366", "71053", 1),
//! ];
//!
//! let models = TrainingPipeline::default().train(&rows).unwrap();
//! let registry = ModelRegistry::new(models.into_snapshot());
//!
//! let similar = registry.snapshot().similar_products("85123A", 10).unwrap();
//! assert_eq!(similar, vec!["71053"]);
//! ```

pub mod basket;
pub mod error;
pub mod mining;
pub mod pipeline;
pub mod product;
pub mod recommend;
pub mod registry;
pub mod similarity;
pub mod transaction;

pub use basket::{BasketBuilder, BasketTable, CoOccurrenceTable, CoOccurrenceWeight};
pub use error::{Error, Result};
pub use mining::{
    Apriori, AssociationRule, CountedItemset, FpGrowth, ItemSet, ItemsetMiner, MinerConfig,
    MiningStrategy, RuleMetric, RuleMiner, RuleSet,
};
pub use pipeline::{
    TrainedModels, TrainingConfig, TrainingError, TrainingMetadata, TrainingPipeline,
    TrainingStage,
};
pub use product::ProductIndex;
pub use recommend::{
    batch_rule_recommendations, rule_recommendations, similar_products, RecommendationRequest,
    Recommendations, DEFAULT_RECOMMENDATIONS,
};
pub use registry::{ModelRegistry, ModelSnapshot};
pub use similarity::{SimilarityEngine, SimilarityMatrix};
pub use transaction::{read_transactions, read_transactions_file, write_transactions, TransactionRow};
