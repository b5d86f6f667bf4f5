use super::{CountedItemset, ItemsetMiner};
use ahash::AHashMap;

/// FP-Growth: frequent itemsets without candidate generation.
///
/// Baskets are compressed into a prefix tree ordered by descending item
/// frequency. Each frequent item's conditional pattern base (the prefix
/// paths leading to it) is turned into a smaller tree and mined
/// recursively, growing the suffix one item at a time.
#[derive(Debug, Clone, Copy, Default)]
pub struct FpGrowth;

const ROOT: usize = 0;

#[derive(Debug, Clone)]
struct FpNode {
    item: u32,
    count: usize,
    parent: usize,
    children: Vec<usize>,
}

#[derive(Debug)]
struct FpTree {
    nodes: Vec<FpNode>,
    /// item -> every node carrying it
    header: AHashMap<u32, Vec<usize>>,
    /// item -> total count in this tree
    counts: AHashMap<u32, usize>,
}

impl FpTree {
    /// Build from weighted item paths, dropping items below `min_count`
    fn build(paths: &[(Vec<u32>, usize)], min_count: usize) -> Self {
        let mut counts: AHashMap<u32, usize> = AHashMap::new();
        for (items, weight) in paths {
            for &item in items {
                *counts.entry(item).or_insert(0) += weight;
            }
        }
        counts.retain(|_, count| *count >= min_count);

        let mut tree = FpTree {
            nodes: vec![FpNode { item: u32::MAX, count: 0, parent: ROOT, children: Vec::new() }],
            header: AHashMap::new(),
            counts,
        };

        let mut ordered = Vec::new();
        for (items, weight) in paths {
            ordered.clear();
            ordered.extend(items.iter().copied().filter(|i| tree.counts.contains_key(i)));
            // most frequent first, item offset breaks ties
            ordered.sort_unstable_by(|a, b| tree.counts[b].cmp(&tree.counts[a]).then(a.cmp(b)));
            tree.insert(&ordered, *weight);
        }

        tree
    }

    fn insert(&mut self, items: &[u32], weight: usize) {
        let mut current = ROOT;
        for &item in items {
            let existing = self.nodes[current]
                .children
                .iter()
                .copied()
                .find(|&child| self.nodes[child].item == item);

            current = match existing {
                Some(child) => child,
                None => {
                    let id = self.nodes.len();
                    self.nodes.push(FpNode { item, count: 0, parent: current, children: Vec::new() });
                    self.nodes[current].children.push(id);
                    self.header.entry(item).or_default().push(id);
                    id
                }
            };
            self.nodes[current].count += weight;
        }
    }

    fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Prefix paths ending just above each node of `item`, weighted by that node's count
    fn conditional_pattern_base(&self, item: u32) -> Vec<(Vec<u32>, usize)> {
        let Some(nodes) = self.header.get(&item) else {
            return Vec::new();
        };

        nodes
            .iter()
            .map(|&node| {
                let mut path = Vec::new();
                let mut current = self.nodes[node].parent;
                while current != ROOT {
                    path.push(self.nodes[current].item);
                    current = self.nodes[current].parent;
                }
                (path, self.nodes[node].count)
            })
            .filter(|(path, _)| !path.is_empty())
            .collect()
    }

    fn mine(
        &self,
        suffix: &[u32],
        min_count: usize,
        max_len: Option<usize>,
        out: &mut Vec<CountedItemset>,
    ) {
        let mut items: Vec<(u32, usize)> = self.counts.iter().map(|(&i, &c)| (i, c)).collect();
        items.sort_unstable();

        for (item, count) in items {
            let mut itemset = suffix.to_vec();
            itemset.push(item);
            itemset.sort_unstable();
            let len = itemset.len();
            out.push((itemset.clone(), count));

            if max_len.is_some_and(|max| len >= max) {
                continue;
            }

            let base = self.conditional_pattern_base(item);
            if base.is_empty() {
                continue;
            }
            let conditional = FpTree::build(&base, min_count);
            if !conditional.is_empty() {
                conditional.mine(&itemset, min_count, max_len, out);
            }
        }
    }
}

impl ItemsetMiner for FpGrowth {
    fn frequent_itemsets(
        &self,
        baskets: &[Vec<u32>],
        _n_items: usize,
        min_count: usize,
        max_len: Option<usize>,
    ) -> Vec<CountedItemset> {
        let paths: Vec<(Vec<u32>, usize)> = baskets
            .iter()
            .filter(|basket| !basket.is_empty())
            .map(|basket| (basket.clone(), 1))
            .collect();

        let tree = FpTree::build(&paths, min_count);
        let mut out = Vec::new();
        tree.mine(&[], min_count, max_len, &mut out);
        out
    }
}
