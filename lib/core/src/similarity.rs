//! Item-to-item cosine similarity over co-occurrence profiles.

use crate::basket::CoOccurrenceTable;
use crate::ProductIndex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Dense, symmetric product × product cosine similarity matrix.
///
/// Owns the [`ProductIndex`] it was computed with, so row and column
/// offsets always resolve to the same product ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatrix {
    products: ProductIndex,
    values: Vec<f32>,
}

impl SimilarityMatrix {
    /// A matrix with no products; every lookup against it is a miss
    #[must_use]
    pub fn empty() -> Self {
        Self {
            products: ProductIndex::default(),
            values: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn products(&self) -> &ProductIndex {
        &self.products
    }

    #[inline]
    #[must_use]
    pub fn dim(&self) -> usize {
        self.products.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Similarity by dense offsets
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.values[i * self.dim() + j]
    }

    /// Row of scores against every product, in column order
    #[inline]
    pub fn row(&self, i: usize) -> &[f32] {
        let dim = self.dim();
        &self.values[i * dim..(i + 1) * dim]
    }

    /// Similarity by product id
    pub fn similarity(&self, a: &str, b: &str) -> Option<f32> {
        let i = self.products.offset(a)?;
        let j = self.products.offset(b)?;
        Some(self.get(i, j))
    }
}

impl Default for SimilarityMatrix {
    fn default() -> Self {
        Self::empty()
    }
}

pub struct SimilarityEngine;

impl SimilarityEngine {
    /// Cosine similarity between every pair of product columns.
    ///
    /// Dot products are accumulated per invoice over the products it
    /// contains, which touches only non-zero cells. Products whose column
    /// is all zeros score 0 against everything, including themselves.
    pub fn compute(table: &CoOccurrenceTable) -> SimilarityMatrix {
        let dim = table.n_products();
        let mut dots = vec![0.0f64; dim * dim];

        for row in table.rows() {
            for (a, &(i, ci)) in row.iter().enumerate() {
                let (i, ci) = (i as usize, f64::from(ci));
                for &(j, cj) in &row[a..] {
                    // upper triangle only, mirrored below
                    dots[i * dim + j as usize] += ci * f64::from(cj);
                }
            }
        }

        let norms: Vec<f64> = (0..dim).map(|i| dots[i * dim + i].sqrt()).collect();

        let mut values = vec![0.0f32; dim * dim];
        values
            .par_chunks_mut(dim.max(1))
            .enumerate()
            .for_each(|(i, out)| {
                for j in 0..dim {
                    let (lo, hi) = if i <= j { (i, j) } else { (j, i) };
                    out[j] = if i == j {
                        if norms[i] > 0.0 { 1.0 } else { 0.0 }
                    } else {
                        cosine(dots[lo * dim + hi], norms[lo], norms[hi])
                    };
                }
            });

        tracing::debug!(products = dim, "computed similarity matrix");

        SimilarityMatrix {
            products: table.products().clone(),
            values,
        }
    }
}

#[inline]
fn cosine(dot: f64, norm_a: f64, norm_b: f64) -> f32 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0) as f32
}
