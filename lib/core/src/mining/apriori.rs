use super::{CountedItemset, ItemsetMiner};
use ahash::AHashSet;

/// Apriori: level-wise candidate generation.
///
/// 1. Find frequent 1-itemsets
/// 2. Join frequent (k-1)-itemsets sharing a (k-2)-prefix into k-candidates
/// 3. Prune candidates with an infrequent (k-1)-subset
/// 4. Count the survivors and keep those reaching `min_count`
/// 5. Repeat until a level comes back empty
///
/// Support counting intersects per-item basket bitsets, so each candidate
/// costs one AND + popcount over the basket count.
#[derive(Debug, Clone, Copy, Default)]
pub struct Apriori;

/// Set of basket rows, one bit per basket
#[derive(Debug, Clone, PartialEq)]
struct TidSet {
    words: Vec<u64>,
}

impl TidSet {
    fn new(n_baskets: usize) -> Self {
        Self { words: vec![0; (n_baskets + 63) / 64] }
    }

    #[inline]
    fn insert(&mut self, row: usize) {
        self.words[row / 64] |= 1u64 << (row % 64);
    }

    #[inline]
    fn intersect(&self, other: &TidSet) -> TidSet {
        TidSet {
            words: self
                .words
                .iter()
                .zip(&other.words)
                .map(|(a, b)| a & b)
                .collect(),
        }
    }

    #[inline]
    fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }
}

impl Apriori {
    fn item_tidsets(baskets: &[Vec<u32>], n_items: usize) -> Vec<TidSet> {
        let mut tidsets = vec![TidSet::new(baskets.len()); n_items];
        for (row, basket) in baskets.iter().enumerate() {
            for &item in basket {
                tidsets[item as usize].insert(row);
            }
        }
        tidsets
    }

    /// Join step over a lexicographically sorted level
    fn generate_candidates(level: &[(Vec<u32>, TidSet)]) -> Vec<(Vec<u32>, usize, usize)> {
        let frequent: AHashSet<&[u32]> = level.iter().map(|(items, _)| items.as_slice()).collect();
        let mut candidates = Vec::new();

        for i in 0..level.len() {
            let a = &level[i].0;
            let prefix = &a[..a.len() - 1];
            for j in (i + 1)..level.len() {
                let b = &level[j].0;
                // sorted level: once prefixes diverge no later j can join
                if &b[..b.len() - 1] != prefix {
                    break;
                }
                let mut candidate = a.clone();
                candidate.push(b[b.len() - 1]);
                if Self::has_infrequent_subset(&candidate, &frequent) {
                    continue;
                }
                candidates.push((candidate, i, j));
            }
        }

        candidates
    }

    fn has_infrequent_subset(candidate: &[u32], frequent: &AHashSet<&[u32]>) -> bool {
        // dropping either of the last two items gives the joined parents
        let mut subset = Vec::with_capacity(candidate.len() - 1);
        for skip in 0..candidate.len().saturating_sub(2) {
            subset.clear();
            subset.extend(
                candidate
                    .iter()
                    .enumerate()
                    .filter(|&(p, _)| p != skip)
                    .map(|(_, &item)| item),
            );
            if !frequent.contains(subset.as_slice()) {
                return true;
            }
        }
        false
    }
}

impl ItemsetMiner for Apriori {
    fn frequent_itemsets(
        &self,
        baskets: &[Vec<u32>],
        n_items: usize,
        min_count: usize,
        max_len: Option<usize>,
    ) -> Vec<CountedItemset> {
        let mut result = Vec::new();

        let mut level: Vec<(Vec<u32>, TidSet)> = Self::item_tidsets(baskets, n_items)
            .into_iter()
            .enumerate()
            .filter(|(_, tids)| tids.count() >= min_count)
            .map(|(item, tids)| (vec![item as u32], tids))
            .collect();

        let mut k = 1;
        while !level.is_empty() {
            result.extend(level.iter().map(|(items, tids)| (items.clone(), tids.count())));
            if max_len.is_some_and(|max| k >= max) {
                break;
            }

            let next: Vec<(Vec<u32>, TidSet)> = Self::generate_candidates(&level)
                .into_iter()
                .filter_map(|(candidate, i, j)| {
                    let tids = level[i].1.intersect(&level[j].1);
                    (tids.count() >= min_count).then_some((candidate, tids))
                })
                .collect();

            level = next;
            k += 1;
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transactions() -> Vec<Vec<u32>> {
        vec![vec![0, 1, 2], vec![0, 1], vec![0, 2], vec![1, 2]]
    }

    #[test]
    fn test_frequent_itemsets() {
        let mut itemsets = Apriori.frequent_itemsets(&transactions(), 3, 2, None);
        itemsets.sort();

        // {0,1,2} appears once and is not frequent at count 2
        assert_eq!(
            itemsets,
            vec![
                (vec![0], 3),
                (vec![0, 1], 2),
                (vec![0, 2], 2),
                (vec![1], 3),
                (vec![1, 2], 2),
                (vec![2], 3),
            ]
        );
    }

    #[test]
    fn test_min_count_filter() {
        let transactions = vec![vec![0, 1], vec![0, 1], vec![0, 1], vec![2, 3]];
        let itemsets = Apriori.frequent_itemsets(&transactions, 4, 2, None);
        for (itemset, count) in itemsets {
            assert!(count >= 2);
            assert!(!itemset.contains(&2) && !itemset.contains(&3));
        }
    }

    #[test]
    fn test_prune_infrequent_subset() {
        let frequent: AHashSet<&[u32]> = [&[0u32, 1][..], &[0, 2][..]].into_iter().collect();
        // {1,2} is missing, so {0,1,2} must be pruned
        assert!(Apriori::has_infrequent_subset(&[0, 1, 2], &frequent));
    }

    #[test]
    fn test_tidset_count_across_words() {
        let mut tids = TidSet::new(130);
        tids.insert(0);
        tids.insert(64);
        tids.insert(129);
        assert_eq!(tids.count(), 3);
    }

    #[test]
    fn test_empty_transactions() {
        let itemsets = Apriori.frequent_itemsets(&[], 0, 1, None);
        assert!(itemsets.is_empty());
    }
}
