use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::Path;
use thiserror::Error;

use crate::cart::Totals;
use crate::stock::StockTable;
use crate::{Amount, CartCommand, LineItem};

/// Errors that can occur when reading or writing csv
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("failed to open {path}: {source}")]
    Open { path: String, source: csv::Error },

    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized action '{action}'")]
    UnrecognizedAction { line: usize, action: String },

    #[error("line {line}: {action} missing {field}")]
    MissingField {
        line: usize,
        action: String,
        field: &'static str,
    },

    #[error("line {line}: {action} quantity {quantity} out of range")]
    InvalidQuantity {
        line: usize,
        action: String,
        quantity: i64,
    },

    #[error("line {line}: {action} price {price} is not a non-negative number")]
    InvalidPrice {
        line: usize,
        action: String,
        price: f64,
    },

    #[error("failed to write output: {0}")]
    Write(#[from] csv::Error),

    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Deserialize)]
struct StockRow {
    product: String,
    stock: u32,
}

#[derive(Debug, Deserialize)]
struct ActionRow {
    action: String,
    product: Option<String>,
    name: Option<String>,
    price: Option<f64>,
    image: Option<String>,
    quantity: Option<i64>,
    note: Option<String>,
}

#[derive(Debug, Serialize)]
struct LineRow<'a> {
    product: &'a str,
    note: &'a str,
    name: &'a str,
    unit_price: String,
    quantity: u32,
    line_total: String,
}

#[derive(Debug, Serialize)]
struct TotalsRow {
    total_quantity: u64,
    subtotal: String,
    discount: String,
    total_to_pay: String,
}

fn reader(path: &Path) -> Result<csv::Reader<std::fs::File>, CsvError> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| CsvError::Open {
            path: path.display().to_string(),
            source,
        })
}

/// Read a `product,stock` csv into a stock table. The last row for a product wins.
pub fn read_stock(path: impl AsRef<Path>) -> Result<StockTable, CsvError> {
    let mut table = StockTable::new();
    for (idx, result) in reader(path.as_ref())?.into_deserialize::<StockRow>().enumerate() {
        let line = idx + 2; // 1-indexed, skip header
        let row = result.map_err(|source| CsvError::Parse { line, source })?;
        table.set(row.product, row.stock);
    }
    Ok(table)
}

/// Read cart actions from a csv file
pub fn read_commands(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<CartCommand, CsvError>>, CsvError> {
    let reader = reader(path.as_ref())?;

    Ok(reader
        .into_deserialize::<ActionRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            parse_command(line, row)
        }))
}

fn parse_command(line: usize, row: ActionRow) -> Result<CartCommand, CsvError> {
    let missing = |field: &'static str| CsvError::MissingField {
        line,
        action: row.action.clone(),
        field,
    };

    match row.action.as_str() {
        "add" => {
            let product = row.product.clone().ok_or_else(|| missing("product"))?;
            let price = row.price.ok_or_else(|| missing("price"))?;
            if !price.is_finite() || price < 0.0 {
                return Err(CsvError::InvalidPrice {
                    line,
                    action: row.action.clone(),
                    price,
                });
            }
            let quantity = row.quantity.ok_or_else(|| missing("quantity"))?;
            let quantity = u32::try_from(quantity)
                .ok()
                .filter(|q| *q >= 1)
                .ok_or_else(|| CsvError::InvalidQuantity {
                    line,
                    action: row.action.clone(),
                    quantity,
                })?;
            Ok(CartCommand::Add(LineItem {
                name: row.name.clone().unwrap_or_else(|| product.clone()),
                product_code: product,
                unit_price: Amount::from_float(price),
                image: row.image.clone().unwrap_or_default(),
                quantity,
                note: row.note.clone(),
            }))
        }
        "remove" => Ok(CartCommand::Remove {
            product_code: row.product.clone().ok_or_else(|| missing("product"))?,
            note: row.note.clone(),
        }),
        "update" => Ok(CartCommand::UpdateQuantity {
            quantity: row.quantity.ok_or_else(|| missing("quantity"))?,
            product_code: row.product.clone(),
            note: row.note.clone(),
        }),
        "clear" => Ok(CartCommand::Clear),
        other => Err(CsvError::UnrecognizedAction {
            line,
            action: other.to_string(),
        }),
    }
}

/// Write cart lines, a blank line, then the totals row.
pub fn write_cart(
    mut out: impl io::Write,
    items: &[LineItem],
    totals: &Totals,
) -> Result<(), CsvError> {
    let mut writer = csv::Writer::from_writer(&mut out);
    for item in items {
        writer.serialize(LineRow {
            product: &item.product_code,
            note: item.note.as_deref().unwrap_or_default(),
            name: &item.name,
            unit_price: item.unit_price.to_string(),
            quantity: item.quantity,
            line_total: item.line_total().to_string(),
        })?;
    }
    if items.is_empty() {
        writer.write_record(["product", "note", "name", "unit_price", "quantity", "line_total"])?;
    }
    writer.flush()?;
    drop(writer);

    writeln!(out)?;

    let mut writer = csv::Writer::from_writer(&mut out);
    writer.serialize(TotalsRow {
        total_quantity: totals.total_quantity,
        subtotal: totals.subtotal.to_string(),
        discount: totals.discount_amount.to_string(),
        total_to_pay: totals.total_to_pay.to_string(),
    })?;
    writer.flush()?;
    Ok(())
}
