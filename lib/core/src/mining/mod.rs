//! Frequent-itemset mining and association rules for market basket analysis.
//!
//! Two interchangeable strategies find the frequent itemsets:
//!
//! - [`Apriori`]: level-wise candidate generation with bitset support counting
//! - [`FpGrowth`]: pattern growth over a compressed prefix tree
//!
//! Both return the same itemsets in the same canonical order (by length, then
//! by product offsets), so the rules derived from them are identical too.
//!
//! # Example
//!
//! ```
//! use basketx_core::{BasketTable, MiningStrategy, RuleMiner, MinerConfig};
//!
//! let baskets = BasketTable::from_baskets(vec![
//!     ("1", vec!["milk", "bread", "butter"]),
//!     ("2", vec!["milk", "bread"]),
//!     ("3", vec!["milk", "butter"]),
//!     ("4", vec!["bread", "butter"]),
//! ]);
//!
//! let miner = RuleMiner::new(
//!     MinerConfig::default()
//!         .with_min_support(0.5)
//!         .with_strategy(MiningStrategy::FpGrowth),
//! );
//! let rules = miner.mine(&baskets).unwrap();
//! for rule in rules.rules() {
//!     println!("{:?} => {:?} (lift={:.2})", rule.antecedents, rule.consequents, rule.lift);
//! }
//! ```

mod apriori;
mod fpgrowth;
mod rules;

pub use apriori::Apriori;
pub use fpgrowth::FpGrowth;
pub use rules::{AssociationRule, ItemSet, RuleMetric, RuleSet};

use crate::basket::BasketTable;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A frequent itemset as product offsets plus its absolute basket count
pub type CountedItemset = (Vec<u32>, usize);

/// Finds every itemset contained in at least `min_count` baskets.
///
/// Baskets are sorted product offsets below `n_items`. Implementations may
/// return itemsets in any order; [`RuleMiner`] canonicalizes them.
pub trait ItemsetMiner {
    fn frequent_itemsets(
        &self,
        baskets: &[Vec<u32>],
        n_items: usize,
        min_count: usize,
        max_len: Option<usize>,
    ) -> Vec<CountedItemset>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MiningStrategy {
    /// Candidate generation
    Apriori,
    /// Frequency growth
    #[default]
    FpGrowth,
}

impl MiningStrategy {
    fn miner(self) -> Box<dyn ItemsetMiner> {
        match self {
            MiningStrategy::Apriori => Box::new(Apriori),
            MiningStrategy::FpGrowth => Box::new(FpGrowth),
        }
    }
}

impl fmt::Display for MiningStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MiningStrategy::Apriori => write!(f, "apriori"),
            MiningStrategy::FpGrowth => write!(f, "fp-growth"),
        }
    }
}

impl FromStr for MiningStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "apriori" => Ok(MiningStrategy::Apriori),
            "fp-growth" | "fpgrowth" | "fp_growth" => Ok(MiningStrategy::FpGrowth),
            other => Err(format!("unknown mining strategy: {}", other)),
        }
    }
}

/// Configuration for rule mining
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinerConfig {
    pub strategy: MiningStrategy,
    pub min_support: f64,
    pub max_len: Option<usize>,
    pub metric: RuleMetric,
    pub min_threshold: f64,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            strategy: MiningStrategy::FpGrowth,
            min_support: 0.01,
            max_len: None,
            metric: RuleMetric::Lift,
            min_threshold: 1.0,
        }
    }
}

impl MinerConfig {
    #[must_use]
    pub fn with_strategy(mut self, strategy: MiningStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    #[must_use]
    pub fn with_min_support(mut self, min_support: f64) -> Self {
        self.min_support = min_support;
        self
    }

    #[must_use]
    pub fn with_max_len(mut self, max_len: Option<usize>) -> Self {
        self.max_len = max_len;
        self
    }

    #[must_use]
    pub fn with_metric(mut self, metric: RuleMetric, min_threshold: f64) -> Self {
        self.metric = metric;
        self.min_threshold = min_threshold;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.min_support > 0.0 && self.min_support <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "min_support must be in (0, 1], got {}",
                self.min_support
            )));
        }
        if self.min_threshold.is_nan() {
            return Err(Error::InvalidConfig("min_threshold is NaN".to_string()));
        }
        if self.max_len == Some(0) {
            return Err(Error::InvalidConfig("max_len must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Mines frequent itemsets and derives association rules from them
#[derive(Debug, Clone, Default)]
pub struct RuleMiner {
    config: MinerConfig,
}

impl RuleMiner {
    pub fn new(config: MinerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MinerConfig {
        &self.config
    }

    /// Frequent itemsets in canonical order, as product offsets with counts
    pub fn mine_counts(&self, table: &BasketTable) -> Result<Vec<CountedItemset>> {
        self.config.validate()?;
        if table.is_empty() {
            return Ok(Vec::new());
        }

        let min_count = min_count(self.config.min_support, table.len());
        let mut itemsets = self.config.strategy.miner().frequent_itemsets(
            table.baskets(),
            table.products().len(),
            min_count,
            self.config.max_len,
        );
        itemsets.sort_by(|a, b| a.0.len().cmp(&b.0.len()).then_with(|| a.0.cmp(&b.0)));
        Ok(itemsets)
    }

    /// Frequent itemsets with product ids and fractional support
    pub fn mine_itemsets(&self, table: &BasketTable) -> Result<Vec<ItemSet>> {
        let counts = self.mine_counts(table)?;
        Ok(rules::to_itemsets(&counts, table))
    }

    /// Full mining run: frequent itemsets, then rules filtered by the metric
    pub fn mine(&self, table: &BasketTable) -> Result<RuleSet> {
        let counts = self.mine_counts(table)?;
        let rule_set = rules::derive(
            &counts,
            table,
            self.config.metric,
            self.config.min_threshold,
        );
        tracing::debug!(
            strategy = %self.config.strategy,
            itemsets = rule_set.itemsets().len(),
            rules = rule_set.len(),
            "mined association rules"
        );
        Ok(rule_set)
    }
}

/// Smallest basket count whose support reaches `min_support`
fn min_count(min_support: f64, n_baskets: usize) -> usize {
    let n = n_baskets as f64;
    let mut count = (min_support * n).ceil().max(1.0) as usize;
    while count > 1 && (count - 1) as f64 / n >= min_support {
        count -= 1;
    }
    while (count as f64 / n) < min_support {
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baskets() -> BasketTable {
        BasketTable::from_baskets(vec![
            ("1", vec!["a", "b", "c"]),
            ("2", vec!["a", "b"]),
            ("3", vec!["a", "c"]),
            ("4", vec!["b", "c"]),
            ("5", vec!["a", "b", "c", "d"]),
            ("6", vec!["d", "e"]),
            ("7", vec![]),
        ])
    }

    #[test]
    fn test_min_count() {
        assert_eq!(min_count(0.5, 4), 2);
        assert_eq!(min_count(0.01, 10), 1);
        assert_eq!(min_count(0.3, 10), 3);
        assert_eq!(min_count(1.0, 7), 7);
    }

    #[test]
    fn test_strategies_agree() {
        for support in [0.1, 0.2, 0.3, 0.5] {
            let apriori = RuleMiner::new(
                MinerConfig::default()
                    .with_min_support(support)
                    .with_strategy(MiningStrategy::Apriori),
            );
            let fp = RuleMiner::new(
                MinerConfig::default()
                    .with_min_support(support)
                    .with_strategy(MiningStrategy::FpGrowth),
            );
            let table = baskets();
            assert_eq!(
                apriori.mine_counts(&table).unwrap(),
                fp.mine_counts(&table).unwrap()
            );
            assert_eq!(apriori.mine(&table).unwrap(), fp.mine(&table).unwrap());
        }
    }

    #[test]
    fn test_lower_support_keeps_itemsets() {
        let table = baskets();
        let mut previous: Vec<Vec<u32>> = Vec::new();
        for support in [0.6, 0.4, 0.3, 0.2, 0.1] {
            let miner = RuleMiner::new(MinerConfig::default().with_min_support(support));
            let current: Vec<Vec<u32>> = miner
                .mine_counts(&table)
                .unwrap()
                .into_iter()
                .map(|(items, _)| items)
                .collect();
            for itemset in &previous {
                assert!(current.contains(itemset), "{:?} lost at support {}", itemset, support);
            }
            previous = current;
        }
    }

    #[test]
    fn test_support_is_anti_monotone() {
        let miner = RuleMiner::new(MinerConfig::default().with_min_support(0.1));
        let itemsets = miner.mine_itemsets(&baskets()).unwrap();
        for big in itemsets.iter().filter(|s| s.items.len() > 1) {
            for small in itemsets.iter().filter(|s| s.items.len() < big.items.len()) {
                if small.items.iter().all(|i| big.items.contains(i)) {
                    assert!(small.support >= big.support);
                }
            }
        }
    }

    #[test]
    fn test_max_len() {
        let miner = RuleMiner::new(
            MinerConfig::default()
                .with_min_support(0.1)
                .with_max_len(Some(2)),
        );
        let itemsets = miner.mine_counts(&baskets()).unwrap();
        assert!(itemsets.iter().all(|(items, _)| items.len() <= 2));
        assert!(itemsets.iter().any(|(items, _)| items.len() == 2));
    }

    #[test]
    fn test_empty_table_yields_no_rules() {
        let empty = BasketTable::from_baskets(Vec::<(&str, Vec<&str>)>::new());
        let rules = RuleMiner::default().mine(&empty).unwrap();
        assert!(rules.is_empty());
        assert!(rules.itemsets().is_empty());
    }

    #[test]
    fn test_threshold_above_everything_yields_no_rules() {
        let miner = RuleMiner::new(MinerConfig::default().with_min_support(1.0));
        let rules = miner.mine(&baskets()).unwrap();
        assert!(rules.is_empty());
    }

    #[test]
    fn test_invalid_support() {
        for bad in [0.0, -0.1, 1.5, f64::NAN] {
            let miner = RuleMiner::new(MinerConfig::default().with_min_support(bad));
            assert!(matches!(miner.mine(&baskets()), Err(Error::InvalidConfig(_))));
        }
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!("apriori".parse::<MiningStrategy>().unwrap(), MiningStrategy::Apriori);
        assert_eq!("FP-Growth".parse::<MiningStrategy>().unwrap(), MiningStrategy::FpGrowth);
        assert!("eclat".parse::<MiningStrategy>().is_err());
    }
}
