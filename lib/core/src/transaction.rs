use crate::Result;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;

/// One invoice line as extracted from the transaction warehouse.
///
/// Field aliases accept the warehouse column spelling so extracts can be
/// read without a rename step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRow {
    #[serde(alias = "INVOICENO", alias = "invoice_no")]
    pub invoice_id: String,
    #[serde(alias = "STOCKCODE", alias = "stockcode")]
    pub product_id: String,
    #[serde(alias = "DESCRIPTION", default)]
    pub description: String,
    #[serde(alias = "UNITPRICE", alias = "unitprice", default)]
    pub unit_price: f64,
    #[serde(alias = "QUANTITY")]
    pub quantity: i64,
    #[serde(alias = "FECHA_INVOICE", alias = "fecha_invoice", default)]
    pub invoice_date: String,
}

impl TransactionRow {
    #[inline]
    #[must_use]
    pub fn new(invoice_id: impl Into<String>, product_id: impl Into<String>, quantity: i64) -> Self {
        Self {
            invoice_id: invoice_id.into(),
            product_id: product_id.into(),
            description: String::new(),
            unit_price: 0.0,
            quantity,
            invoice_date: String::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_unit_price(mut self, unit_price: f64) -> Self {
        self.unit_price = unit_price;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_invoice_date(mut self, invoice_date: impl Into<String>) -> Self {
        self.invoice_date = invoice_date.into();
        self
    }
}

/// Read transaction rows from any CSV source with a header line
pub fn read_transactions<R: Read>(reader: R) -> Result<Vec<TransactionRow>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for record in csv_reader.deserialize() {
        rows.push(record?);
    }
    Ok(rows)
}

pub fn read_transactions_file<P: AsRef<Path>>(path: P) -> Result<Vec<TransactionRow>> {
    let file = std::fs::File::open(path)?;
    read_transactions(std::io::BufReader::new(file))
}

/// Write rows as CSV using the snake_case header
pub fn write_transactions<W: Write>(writer: W, rows: &[TransactionRow]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}
