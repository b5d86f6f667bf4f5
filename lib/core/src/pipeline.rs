//! Offline training: transactions in, both recommendation models out.

use crate::basket::{BasketBuilder, CoOccurrenceWeight};
use crate::mining::{MinerConfig, MiningStrategy, RuleMiner, RuleSet};
use crate::registry::ModelSnapshot;
use crate::similarity::{SimilarityEngine, SimilarityMatrix};
use crate::{Error, TransactionRow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Which step of [`TrainingPipeline::train`] failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingStage {
    BuildBaskets,
    Mining,
}

impl fmt::Display for TrainingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainingStage::BuildBaskets => write!(f, "build_baskets"),
            TrainingStage::Mining => write!(f, "mining"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("training failed at {stage}: {source}")]
pub struct TrainingError {
    pub stage: TrainingStage,
    #[source]
    pub source: Error,
}

impl TrainingError {
    fn at(stage: TrainingStage) -> impl FnOnce(Error) -> Self {
        move |source| Self { stage, source }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub weight: CoOccurrenceWeight,
    pub miner: MinerConfig,
}

impl TrainingConfig {
    #[must_use]
    pub fn with_weight(mut self, weight: CoOccurrenceWeight) -> Self {
        self.weight = weight;
        self
    }

    #[must_use]
    pub fn with_miner(mut self, miner: MinerConfig) -> Self {
        self.miner = miner;
        self
    }
}

/// Summary of one training run, persisted next to the models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetadata {
    pub invoice_count: usize,
    pub item_count: usize,
    pub itemset_count: usize,
    pub rule_count: usize,
    pub strategy: MiningStrategy,
    pub min_support: f64,
    pub trained_at: DateTime<Utc>,
}

/// Output of a successful training run
#[derive(Debug, Clone)]
pub struct TrainedModels {
    pub similarity: SimilarityMatrix,
    pub rules: RuleSet,
    pub metadata: TrainingMetadata,
}

impl TrainedModels {
    pub fn into_snapshot(self) -> ModelSnapshot {
        self.into()
    }
}

/// Basket Builder, then Similarity Engine and Rule Miner over its output.
///
/// The pipeline holds no state between runs; calling `train` twice on the
/// same rows yields the same models (up to `trained_at`).
#[derive(Debug, Clone, Default)]
pub struct TrainingPipeline {
    config: TrainingConfig,
}

impl TrainingPipeline {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn train(&self, rows: &[TransactionRow]) -> Result<TrainedModels, TrainingError> {
        // fail on bad thresholds before spending time on the matrix
        self.config
            .miner
            .validate()
            .map_err(TrainingError::at(TrainingStage::Mining))?;

        let started = Instant::now();
        let (co_occurrence, baskets) = BasketBuilder::new()
            .with_weight(self.config.weight)
            .build(rows)
            .map_err(TrainingError::at(TrainingStage::BuildBaskets))?;
        tracing::info!(
            rows = rows.len(),
            invoices = baskets.len(),
            products = baskets.products().len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "built basket tables"
        );

        let started = Instant::now();
        let similarity = SimilarityEngine::compute(&co_occurrence);
        tracing::info!(
            products = similarity.dim(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "computed similarity matrix"
        );
        drop(co_occurrence);

        let started = Instant::now();
        let rules = RuleMiner::new(self.config.miner.clone())
            .mine(&baskets)
            .map_err(TrainingError::at(TrainingStage::Mining))?;
        tracing::info!(
            strategy = %self.config.miner.strategy,
            itemsets = rules.itemsets().len(),
            rules = rules.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "mined association rules"
        );

        let metadata = TrainingMetadata {
            invoice_count: baskets.len(),
            item_count: baskets.products().len(),
            itemset_count: rules.itemsets().len(),
            rule_count: rules.len(),
            strategy: self.config.miner.strategy,
            min_support: self.config.miner.min_support,
            trained_at: Utc::now(),
        };

        Ok(TrainedModels {
            similarity,
            rules,
            metadata,
        })
    }
}
