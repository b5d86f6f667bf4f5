use crate::mining::RuleSet;
use crate::pipeline::{TrainedModels, TrainingMetadata};
use crate::recommend::{self, RecommendationRequest, Recommendations};
use crate::similarity::SimilarityMatrix;
use crate::Result;
use parking_lot::RwLock;
use std::sync::Arc;

/// Immutable pair of trained models served together
#[derive(Debug, Clone, Default)]
pub struct ModelSnapshot {
    pub similarity: SimilarityMatrix,
    pub rules: RuleSet,
    pub metadata: Option<TrainingMetadata>,
}

impl ModelSnapshot {
    pub fn new(similarity: SimilarityMatrix, rules: RuleSet) -> Self {
        Self { similarity, rules, metadata: None }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: TrainingMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.similarity.is_empty() && self.rules.is_empty()
    }

    pub fn similar_products(&self, product_id: &str, n: usize) -> Result<Vec<String>> {
        recommend::similar_products(&self.similarity, product_id, n)
    }

    pub fn rule_recommendations(&self, product_id: &str, n: usize) -> Vec<String> {
        recommend::rule_recommendations(&self.rules, product_id, n)
    }

    pub fn batch_rule_recommendations(&self, requests: &[RecommendationRequest]) -> Vec<Recommendations> {
        recommend::batch_rule_recommendations(&self.rules, requests)
    }
}

impl From<TrainedModels> for ModelSnapshot {
    fn from(models: TrainedModels) -> Self {
        Self {
            similarity: models.similarity,
            rules: models.rules,
            metadata: Some(models.metadata),
        }
    }
}

/// Process-wide holder of the models currently being served.
///
/// Readers take a cheap `Arc` clone and keep answering from it even if a
/// reload happens mid-request. `reload` swaps the whole snapshot at once;
/// a published snapshot is never modified.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    current: RwLock<Arc<ModelSnapshot>>,
}

impl ModelRegistry {
    pub fn new(snapshot: ModelSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// The snapshot in effect right now
    #[inline]
    pub fn snapshot(&self) -> Arc<ModelSnapshot> {
        self.current.read().clone()
    }

    /// Replace the served models, returning the previous snapshot
    pub fn reload(&self, snapshot: ModelSnapshot) -> Arc<ModelSnapshot> {
        let next = Arc::new(snapshot);
        let previous = std::mem::replace(&mut *self.current.write(), Arc::clone(&next));
        tracing::info!(
            products = next.similarity.dim(),
            rules = next.rules.len(),
            "model registry reloaded"
        );
        previous
    }
}
