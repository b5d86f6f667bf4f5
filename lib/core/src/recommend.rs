//! Recommendation lookups over trained models.
//!
//! Both lookups are pure reads: they borrow an immutable model and never
//! touch it, so any number of requests can run against the same snapshot.

use crate::mining::RuleSet;
use crate::similarity::SimilarityMatrix;
use crate::{Error, Result};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

pub const DEFAULT_RECOMMENDATIONS: usize = 10;

/// Products most similar to `product_id`, best first.
///
/// Scores are sorted descending with a stable sort, so equal scores keep
/// column order. The product itself is never returned, and neither are
/// products that never shared an invoice with it (score 0).
pub fn similar_products(
    matrix: &SimilarityMatrix,
    product_id: &str,
    n: usize,
) -> Result<Vec<String>> {
    let offset = matrix
        .products()
        .offset(product_id)
        .ok_or_else(|| Error::ProductNotFound(product_id.to_string()))?;

    let mut scored: Vec<(usize, f32)> = matrix
        .row(offset)
        .iter()
        .copied()
        .enumerate()
        .filter(|&(j, score)| j != offset && score > 0.0)
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(n);

    Ok(scored
        .into_iter()
        .filter_map(|(j, _)| matrix.products().id(j).map(str::to_string))
        .collect())
}

/// Consequents of the `n` highest-lift rules triggered by `product_id`.
///
/// Rules are stable-sorted by lift, so ties keep discovery order.
/// Consequents shared by several rules appear once, at their first
/// position. No matching rule is a valid, empty answer.
pub fn rule_recommendations(rules: &RuleSet, product_id: &str, n: usize) -> Vec<String> {
    let mut matching: Vec<_> = rules
        .rules()
        .iter()
        .filter(|rule| rule.has_antecedent(product_id))
        .collect();
    matching.sort_by(|a, b| b.lift.partial_cmp(&a.lift).unwrap_or(std::cmp::Ordering::Equal));

    let unique: IndexSet<&str> = matching
        .into_iter()
        .take(n)
        .flat_map(|rule| rule.consequents.iter().map(String::as_str))
        .filter(|&p| p != product_id)
        .collect();

    unique.into_iter().map(str::to_string).collect()
}

/// One entry of a batch rule lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRequest {
    #[serde(alias = "stockcode")]
    pub product_id: String,
    #[serde(alias = "recommendations", default = "default_count")]
    pub recommendation_count: usize,
}

fn default_count() -> usize {
    DEFAULT_RECOMMENDATIONS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    pub product_id: String,
    pub recommendations: Vec<String>,
}

/// Rule lookup for several products; entries with nothing to recommend are omitted
pub fn batch_rule_recommendations(
    rules: &RuleSet,
    requests: &[RecommendationRequest],
) -> Vec<Recommendations> {
    requests
        .iter()
        .filter_map(|req| {
            let recommendations =
                rule_recommendations(rules, &req.product_id, req.recommendation_count);
            (!recommendations.is_empty()).then(|| Recommendations {
                product_id: req.product_id.clone(),
                recommendations,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basket::BasketBuilder;
    use crate::mining::AssociationRule;
    use crate::similarity::SimilarityEngine;
    use crate::TransactionRow;
    use std::collections::BTreeSet;

    fn rule(antecedents: &[&str], consequents: &[&str], lift: f64) -> AssociationRule {
        AssociationRule {
            antecedents: antecedents.iter().map(|s| s.to_string()).collect(),
            consequents: consequents.iter().map(|s| s.to_string()).collect(),
            antecedent_support: 0.1,
            consequent_support: 0.1,
            support: 0.05,
            confidence: 0.5,
            lift,
            leverage: 0.04,
            conviction: 1.8,
        }
    }

    fn matrix() -> SimilarityMatrix {
        let rows = vec![
            TransactionRow::new("1", "A", 1),
            TransactionRow::new("1", "B", 1),
            TransactionRow::new("2", "A", 1),
            TransactionRow::new("2", "B", 1),
            TransactionRow::new("2", "C", 1),
            TransactionRow::new("3", "C", 1),
            TransactionRow::new("3", "D", 1),
            TransactionRow::new("4", "E", 1),
        ];
        let (co, _) = BasketBuilder::new().build(&rows).unwrap();
        SimilarityEngine::compute(&co)
    }

    #[test]
    fn test_similar_products_ranked() {
        let recs = similar_products(&matrix(), "A", 10).unwrap();
        assert_eq!(recs, vec!["B", "C"]);
    }

    #[test]
    fn test_similar_products_never_returns_self() {
        let m = matrix();
        for id in m.products().ids() {
            let recs = similar_products(&m, id, 100).unwrap();
            assert!(!recs.contains(id));
        }
    }

    #[test]
    fn test_similar_products_truncates() {
        let recs = similar_products(&matrix(), "C", 1).unwrap();
        assert_eq!(recs.len(), 1);
        let none = similar_products(&matrix(), "C", 0).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_lonely_item_has_no_recommendations() {
        let recs = similar_products(&matrix(), "E", 10).unwrap();
        assert!(recs.is_empty());
    }

    #[test]
    fn test_unknown_product() {
        let err = similar_products(&matrix(), "ZZZ", 10).unwrap_err();
        assert!(matches!(err, Error::ProductNotFound(id) if id == "ZZZ"));
    }

    #[test]
    fn test_ties_keep_column_order() {
        let rows = vec![
            TransactionRow::new("1", "X", 1),
            TransactionRow::new("1", "C", 1),
            TransactionRow::new("1", "A", 1),
            TransactionRow::new("1", "B", 1),
        ];
        let (co, _) = BasketBuilder::new().build(&rows).unwrap();
        let m = SimilarityEngine::compute(&co);
        assert_eq!(similar_products(&m, "X", 10).unwrap(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_single_rule_consequents() {
        let rules = RuleSet::new(Vec::new(), vec![rule(&["P"], &["C", "D"], 3.2)]);
        let recs: BTreeSet<String> = rule_recommendations(&rules, "P", 1).into_iter().collect();
        assert_eq!(recs, BTreeSet::from(["C".to_string(), "D".to_string()]));
    }

    #[test]
    fn test_rules_sorted_by_lift_and_deduplicated() {
        let rules = RuleSet::new(
            Vec::new(),
            vec![
                rule(&["P"], &["low"], 1.1),
                rule(&["P", "Q"], &["high", "shared"], 5.0),
                rule(&["Q"], &["other"], 9.0),
                rule(&["P"], &["shared"], 2.0),
            ],
        );
        assert_eq!(rule_recommendations(&rules, "P", 2), vec!["high", "shared"]);
        assert_eq!(rule_recommendations(&rules, "P", 10), vec!["high", "shared", "low"]);
    }

    #[test]
    fn test_lift_ties_keep_discovery_order() {
        let rules = RuleSet::new(
            Vec::new(),
            vec![rule(&["P"], &["first"], 2.0), rule(&["P"], &["second"], 2.0)],
        );
        assert_eq!(rule_recommendations(&rules, "P", 1), vec!["first"]);
    }

    #[test]
    fn test_no_rule_is_empty_not_error() {
        let rules = RuleSet::new(Vec::new(), vec![rule(&["P"], &["C"], 3.0)]);
        assert!(rule_recommendations(&rules, "unknown", 10).is_empty());
    }

    #[test]
    fn test_batch_omits_empty_entries() {
        let rules = RuleSet::new(Vec::new(), vec![rule(&["P"], &["C"], 3.0)]);
        let requests = vec![
            RecommendationRequest { product_id: "P".to_string(), recommendation_count: 10 },
            RecommendationRequest { product_id: "nothing".to_string(), recommendation_count: 10 },
        ];
        let out = batch_rule_recommendations(&rules, &requests);
        assert_eq!(
            out,
            vec![Recommendations {
                product_id: "P".to_string(),
                recommendations: vec!["C".to_string()],
            }]
        );
    }

    #[test]
    fn test_request_accepts_legacy_fields() {
        let req: RecommendationRequest =
            serde_json::from_str(r#"{"stockcode": "23355", "recommendations": 3}"#).unwrap();
        assert_eq!(req.product_id, "23355");
        assert_eq!(req.recommendation_count, 3);

        let req: RecommendationRequest = serde_json::from_str(r#"{"product_id": "22064"}"#).unwrap();
        assert_eq!(req.recommendation_count, DEFAULT_RECOMMENDATIONS);
    }
}
