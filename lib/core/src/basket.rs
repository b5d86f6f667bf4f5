//! Basket Builder
//!
//! Turns raw invoice lines into the two tables the models train on: a
//! co-occurrence count table for the similarity engine and a boolean
//! basket table for the rule miner.

use crate::{Error, ProductIndex, Result, TransactionRow};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Sparse invoice × product count matrix.
///
/// Rows are distinct invoices in ascending id order; each row holds
/// `(product offset, line count)` pairs sorted by offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoOccurrenceTable {
    invoices: Vec<String>,
    products: ProductIndex,
    rows: Vec<Vec<(u32, u32)>>,
}

impl CoOccurrenceTable {
    #[inline]
    #[must_use]
    pub fn invoices(&self) -> &[String] {
        &self.invoices
    }

    #[inline]
    #[must_use]
    pub fn products(&self) -> &ProductIndex {
        &self.products
    }

    #[inline]
    #[must_use]
    pub fn rows(&self) -> &[Vec<(u32, u32)>] {
        &self.rows
    }

    #[inline]
    #[must_use]
    pub fn n_invoices(&self) -> usize {
        self.invoices.len()
    }

    #[inline]
    #[must_use]
    pub fn n_products(&self) -> usize {
        self.products.len()
    }

    /// Cell value; unknown invoices or products read as 0
    pub fn get(&self, invoice_id: &str, product_id: &str) -> u32 {
        let Some(offset) = self.products.offset(product_id) else {
            return 0;
        };
        let Ok(row) = self.invoices.binary_search_by(|id| id.as_str().cmp(invoice_id)) else {
            return 0;
        };
        self.rows[row]
            .binary_search_by_key(&(offset as u32), |&(p, _)| p)
            .map(|i| self.rows[row][i].1)
            .unwrap_or(0)
    }
}

/// Boolean presence table, one row per invoice.
///
/// A row lists the product offsets whose net quantity in the invoice is
/// positive, sorted. Invoices made only of returns keep an empty row so
/// they still count in the support denominator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasketTable {
    invoices: Vec<String>,
    products: ProductIndex,
    baskets: Vec<Vec<u32>>,
}

impl BasketTable {
    /// Build directly from per-invoice product lists.
    pub fn from_baskets<I, S>(baskets: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<S>)>,
        S: Into<String>,
    {
        let grouped: BTreeMap<String, BTreeSet<String>> = baskets
            .into_iter()
            .map(|(invoice, items)| {
                (invoice.into(), items.into_iter().map(Into::into).collect())
            })
            .collect();

        let products = ProductIndex::from_ids(grouped.values().flatten().cloned());
        let mut invoices = Vec::with_capacity(grouped.len());
        let mut rows = Vec::with_capacity(grouped.len());
        for (invoice, items) in grouped {
            let mut row: Vec<u32> = items
                .iter()
                .filter_map(|id| products.offset(id))
                .map(|o| o as u32)
                .collect();
            row.sort_unstable();
            invoices.push(invoice);
            rows.push(row);
        }

        Self { invoices, products, baskets: rows }
    }

    #[inline]
    #[must_use]
    pub fn invoices(&self) -> &[String] {
        &self.invoices
    }

    #[inline]
    #[must_use]
    pub fn products(&self) -> &ProductIndex {
        &self.products
    }

    #[inline]
    #[must_use]
    pub fn baskets(&self) -> &[Vec<u32>] {
        &self.baskets
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.baskets.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.baskets.is_empty()
    }

    /// Product ids present in one invoice
    pub fn basket(&self, invoice_id: &str) -> Option<BTreeSet<&str>> {
        let row = self
            .invoices
            .binary_search_by(|id| id.as_str().cmp(invoice_id))
            .ok()?;
        Some(
            self.baskets[row]
                .iter()
                .filter_map(|&o| self.products.id(o as usize))
                .collect(),
        )
    }
}

/// What a co-occurrence cell counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoOccurrenceWeight {
    /// Number of invoice lines for the pair
    #[default]
    Lines,
    /// Sum of the positive quantities on those lines
    Quantity,
}

impl std::str::FromStr for CoOccurrenceWeight {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lines" => Ok(CoOccurrenceWeight::Lines),
            "quantity" => Ok(CoOccurrenceWeight::Quantity),
            other => Err(format!("unknown co-occurrence weight: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BasketBuilder {
    weight: CoOccurrenceWeight,
}

impl BasketBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_weight(mut self, weight: CoOccurrenceWeight) -> Self {
        self.weight = weight;
        self
    }

    /// Aggregate transaction lines into both training tables.
    ///
    /// Input order never changes the output: invoices and products are both
    /// laid out in ascending id order.
    pub fn build(&self, rows: &[TransactionRow]) -> Result<(CoOccurrenceTable, BasketTable)> {
        if rows.is_empty() {
            return Err(Error::EmptyInput);
        }

        let products = ProductIndex::from_ids(rows.iter().map(|r| r.product_id.as_str()));

        // invoice -> product offset -> (cell count, net quantity)
        let mut cells: BTreeMap<&str, AHashMap<u32, (u32, i64)>> = BTreeMap::new();
        for row in rows {
            let offset = products
                .offset(&row.product_id)
                .ok_or_else(|| Error::ProductNotFound(row.product_id.clone()))? as u32;
            let cell = cells
                .entry(row.invoice_id.as_str())
                .or_default()
                .entry(offset)
                .or_insert((0, 0));
            let increment = match self.weight {
                CoOccurrenceWeight::Lines => 1,
                CoOccurrenceWeight::Quantity => row.quantity.clamp(0, i64::from(u32::MAX)) as u32,
            };
            cell.0 = cell.0.saturating_add(increment);
            cell.1 = cell.1.saturating_add(row.quantity);
        }

        let mut invoices = Vec::with_capacity(cells.len());
        let mut counts = Vec::with_capacity(cells.len());
        let mut baskets = Vec::with_capacity(cells.len());
        for (invoice, row_cells) in cells {
            let mut count_row: Vec<(u32, u32)> = row_cells
                .iter()
                .filter(|(_, cell)| cell.0 > 0)
                .map(|(&p, cell)| (p, cell.0))
                .collect();
            count_row.sort_unstable();

            let mut basket: Vec<u32> = row_cells
                .iter()
                .filter(|(_, cell)| cell.1 > 0)
                .map(|(&p, _)| p)
                .collect();
            basket.sort_unstable();

            invoices.push(invoice.to_string());
            counts.push(count_row);
            baskets.push(basket);
        }

        tracing::debug!(
            invoices = invoices.len(),
            products = products.len(),
            weight = ?self.weight,
            "built co-occurrence and basket tables"
        );

        let co_occurrence = CoOccurrenceTable {
            invoices: invoices.clone(),
            products: products.clone(),
            rows: counts,
        };
        let basket_table = BasketTable { invoices, products, baskets };
        Ok((co_occurrence, basket_table))
    }
}
