use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Bidirectional mapping between product ids and dense matrix offsets.
///
/// Offsets are assigned once, in ascending product id order, and never
/// renumbered; every structure built from the same index shares its layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ProductIndex {
    ids: Vec<String>,
    offsets: AHashMap<String, usize>,
}

impl ProductIndex {
    /// Build from any id collection; duplicates collapse and order is sorted
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        ids.sort();
        ids.dedup();
        Self::from(ids)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[inline]
    pub fn offset(&self, product_id: &str) -> Option<usize> {
        self.offsets.get(product_id).copied()
    }

    #[inline]
    pub fn id(&self, offset: usize) -> Option<&str> {
        self.ids.get(offset).map(String::as_str)
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, product_id: &str) -> bool {
        self.offsets.contains_key(product_id)
    }

    #[inline]
    #[must_use]
    pub fn ids(&self) -> &[String] {
        &self.ids
    }
}

// Assumes `ids` is already sorted and unique, as produced by `from_ids`
// or by serializing an existing index.
impl From<Vec<String>> for ProductIndex {
    fn from(ids: Vec<String>) -> Self {
        let offsets = ids
            .iter()
            .enumerate()
            .map(|(offset, id)| (id.clone(), offset))
            .collect();
        Self { ids, offsets }
    }
}

impl From<ProductIndex> for Vec<String> {
    fn from(index: ProductIndex) -> Self {
        index.ids
    }
}

impl PartialEq for ProductIndex {
    fn eq(&self, other: &Self) -> bool {
        self.ids == other.ids
    }
}
