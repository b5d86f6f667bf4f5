//! Column-major view of a tabular CSV snapshot.

use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// How a column is compared between snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

/// A snapshot loaded into memory, one vector of raw cells per column.
///
/// Cells are kept as trimmed strings; empty cells are missing values and
/// are ignored by every statistic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotFrame {
    names: Vec<String>,
    columns: Vec<Vec<String>>,
    n_rows: usize,
}

impl SnapshotFrame {
    /// Read a CSV document with a header row
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let names: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut columns = vec![Vec::new(); names.len()];
        let mut n_rows = 0;

        for record in reader.records() {
            let record = record?;
            for (column, cell) in columns.iter_mut().zip(record.iter()) {
                column.push(cell.to_string());
            }
            n_rows += 1;
        }

        Ok(Self {
            names,
            columns,
            n_rows,
        })
    }

    /// Build a frame from named columns of equal length
    pub fn from_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<String>)>,
        S: Into<String>,
    {
        let (names, columns): (Vec<String>, Vec<Vec<String>>) = columns
            .into_iter()
            .map(|(name, values)| (name.into(), values))
            .unzip();
        let n_rows = columns.first().map_or(0, Vec::len);
        Self {
            names,
            columns,
            n_rows,
        }
    }

    #[inline]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    #[inline]
    pub fn n_columns(&self) -> usize {
        self.names.len()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn column(&self, name: &str) -> Option<&[String]> {
        let idx = self.names.iter().position(|n| n == name)?;
        Some(&self.columns[idx])
    }

    /// Remove the named columns that are present; absent names are ignored.
    /// Returns the names that were actually dropped.
    pub fn drop_columns(&mut self, names: &[String]) -> Vec<String> {
        let mut dropped = Vec::new();
        let mut idx = 0;
        while idx < self.names.len() {
            if names.contains(&self.names[idx]) {
                dropped.push(self.names.remove(idx));
                self.columns.remove(idx);
            } else {
                idx += 1;
            }
        }
        dropped
    }
}

/// Non-missing cells of a column
pub fn present(values: &[String]) -> impl Iterator<Item = &str> {
    values.iter().map(String::as_str).filter(|v| !v.is_empty())
}

/// Parse every present cell as a number, or `None` if any cell is not numeric
pub fn numeric_values(values: &[String]) -> Option<Vec<f64>> {
    present(values)
        .map(|v| v.parse::<f64>().ok().filter(|x| x.is_finite()))
        .collect()
}

/// Numeric only when both sides parse and the reference has more than
/// `unique_limit` distinct values; low-cardinality numbers are codes.
pub fn infer_kind(reference: &[String], current: &[String], unique_limit: usize) -> ColumnKind {
    if numeric_values(reference).is_none() || numeric_values(current).is_none() {
        return ColumnKind::Categorical;
    }
    let distinct: AHashSet<&str> = present(reference).collect();
    if distinct.len() > unique_limit {
        ColumnKind::Numeric
    } else {
        ColumnKind::Categorical
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_from_reader() {
        let data = "INVOICENO,STOCKCODE,QUANTITY\n1, A ,6\n2,B,\n";
        let frame = SnapshotFrame::from_reader(data.as_bytes()).unwrap();
        assert_eq!(frame.names(), &strings(&["INVOICENO", "STOCKCODE", "QUANTITY"]));
        assert_eq!(frame.n_rows(), 2);
        assert_eq!(frame.column("STOCKCODE").unwrap(), &strings(&["A", "B"]));
        assert_eq!(frame.column("QUANTITY").unwrap(), &strings(&["6", ""]));
        assert!(frame.column("Outcome").is_none());
    }

    #[test]
    fn test_ragged_rows_fail() {
        let data = "a,b\n1,2\n3\n";
        assert!(SnapshotFrame::from_reader(data.as_bytes()).is_err());
    }

    #[test]
    fn test_drop_columns() {
        let mut frame = SnapshotFrame::from_columns(vec![
            ("a", strings(&["1"])),
            ("Outcome", strings(&["0"])),
            ("b", strings(&["x"])),
        ]);
        let dropped = frame.drop_columns(&strings(&["Outcome", "missing"]));
        assert_eq!(dropped, strings(&["Outcome"]));
        assert_eq!(frame.names(), &strings(&["a", "b"]));
        assert_eq!(frame.column("b").unwrap(), &strings(&["x"]));
    }

    #[test]
    fn test_numeric_values() {
        assert_eq!(numeric_values(&strings(&["1", "", "2.5"])), Some(vec![1.0, 2.5]));
        assert_eq!(numeric_values(&strings(&["1", "x"])), None);
        assert_eq!(numeric_values(&strings(&["NaN"])), None);
    }

    #[test]
    fn test_infer_kind() {
        let many = strings(&["1", "2", "3", "4", "5", "6"]);
        let few = strings(&["1", "2", "1", "2", "3", "3"]);
        let text = strings(&["a", "b", "c", "d", "e", "f"]);
        assert_eq!(infer_kind(&many, &many, 5), ColumnKind::Numeric);
        assert_eq!(infer_kind(&few, &few, 5), ColumnKind::Categorical);
        assert_eq!(infer_kind(&text, &text, 5), ColumnKind::Categorical);
        assert_eq!(infer_kind(&many, &text, 5), ColumnKind::Categorical);
    }
}
