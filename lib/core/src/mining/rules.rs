use super::CountedItemset;
use crate::basket::BasketTable;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A frequent itemset with its fraction of supporting baskets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSet {
    pub items: Vec<String>,
    pub support: f64,
}

/// Association rule: antecedents => consequents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationRule {
    pub antecedents: Vec<String>,
    pub consequents: Vec<String>,
    pub antecedent_support: f64,
    pub consequent_support: f64,
    /// Support of antecedents ∪ consequents
    pub support: f64,
    /// support / antecedent_support
    pub confidence: f64,
    /// confidence / consequent_support
    pub lift: f64,
    pub leverage: f64,
    /// Infinite when confidence is 1
    pub conviction: f64,
}

impl AssociationRule {
    #[inline]
    pub fn has_antecedent(&self, product_id: &str) -> bool {
        self.antecedents.iter().any(|p| p == product_id)
    }

    /// Value of the given metric for this rule
    pub fn metric(&self, metric: RuleMetric) -> f64 {
        match metric {
            RuleMetric::Support => self.support,
            RuleMetric::Confidence => self.confidence,
            RuleMetric::Lift => self.lift,
            RuleMetric::Leverage => self.leverage,
            RuleMetric::Conviction => self.conviction,
        }
    }
}

/// Metric used to filter generated rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleMetric {
    Support,
    Confidence,
    #[default]
    Lift,
    Leverage,
    Conviction,
}

impl fmt::Display for RuleMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuleMetric::Support => "support",
            RuleMetric::Confidence => "confidence",
            RuleMetric::Lift => "lift",
            RuleMetric::Leverage => "leverage",
            RuleMetric::Conviction => "conviction",
        };
        f.write_str(name)
    }
}

impl FromStr for RuleMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "support" => Ok(RuleMetric::Support),
            "confidence" => Ok(RuleMetric::Confidence),
            "lift" => Ok(RuleMetric::Lift),
            "leverage" => Ok(RuleMetric::Leverage),
            "conviction" => Ok(RuleMetric::Conviction),
            other => Err(format!("unknown rule metric: {}", other)),
        }
    }
}

/// Rules in discovery order together with the itemsets they came from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    itemsets: Vec<ItemSet>,
    rules: Vec<AssociationRule>,
}

impl RuleSet {
    pub fn new(itemsets: Vec<ItemSet>, rules: Vec<AssociationRule>) -> Self {
        Self { itemsets, rules }
    }

    #[inline]
    #[must_use]
    pub fn rules(&self) -> &[AssociationRule] {
        &self.rules
    }

    #[inline]
    #[must_use]
    pub fn itemsets(&self) -> &[ItemSet] {
        &self.itemsets
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

pub(super) fn to_itemsets(counts: &[CountedItemset], table: &BasketTable) -> Vec<ItemSet> {
    let n = table.len() as f64;
    counts
        .iter()
        .map(|(items, count)| ItemSet {
            items: ids(items, table),
            support: *count as f64 / n,
        })
        .collect()
}

/// Derive every rule from the canonical itemset list.
///
/// For each itemset of two or more items, every non-empty proper subset is
/// tried as the consequent, smaller subsets first. All subsets of a frequent
/// itemset are frequent, so their supports are always in the lookup.
pub(super) fn derive(
    counts: &[CountedItemset],
    table: &BasketTable,
    metric: RuleMetric,
    min_threshold: f64,
) -> RuleSet {
    let n = table.len() as f64;
    let supports: AHashMap<&[u32], f64> = counts
        .iter()
        .map(|(items, count)| (items.as_slice(), *count as f64 / n))
        .collect();

    let mut rules = Vec::new();
    for (items, count) in counts.iter().filter(|(items, _)| items.len() >= 2) {
        let support = *count as f64 / n;
        for size in 1..items.len() {
            for positions in combinations(items.len(), size) {
                let consequents: Vec<u32> = positions.iter().map(|&p| items[p]).collect();
                let antecedents: Vec<u32> = items
                    .iter()
                    .enumerate()
                    .filter(|(p, _)| !positions.contains(p))
                    .map(|(_, &item)| item)
                    .collect();

                let (Some(&antecedent_support), Some(&consequent_support)) = (
                    supports.get(antecedents.as_slice()),
                    supports.get(consequents.as_slice()),
                ) else {
                    continue;
                };

                let confidence = support / antecedent_support;
                let lift = confidence / consequent_support;
                let leverage = support - antecedent_support * consequent_support;
                let conviction = if confidence >= 1.0 {
                    f64::INFINITY
                } else {
                    (1.0 - consequent_support) / (1.0 - confidence)
                };

                let rule = AssociationRule {
                    antecedents: ids(&antecedents, table),
                    consequents: ids(&consequents, table),
                    antecedent_support,
                    consequent_support,
                    support,
                    confidence,
                    lift,
                    leverage,
                    conviction,
                };
                if rule.metric(metric) >= min_threshold {
                    rules.push(rule);
                }
            }
        }
    }

    RuleSet::new(to_itemsets(counts, table), rules)
}

fn ids(items: &[u32], table: &BasketTable) -> Vec<String> {
    items
        .iter()
        .filter_map(|&o| table.products().id(o as usize))
        .map(str::to_string)
        .collect()
}

/// All `k`-combinations of `0..n` in lexicographic order
fn combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    if k == 0 || k > n {
        return out;
    }
    let mut current: Vec<usize> = (0..k).collect();
    loop {
        out.push(current.clone());
        // rightmost position that can still advance
        let Some(i) = (0..k).rev().find(|&i| current[i] < n - k + i) else {
            return out;
        };
        current[i] += 1;
        for j in i + 1..k {
            current[j] = current[j - 1] + 1;
        }
    }
}
