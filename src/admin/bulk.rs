//! `species_id,price` bulk rate entry.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkRow {
    pub species_id: String,
    pub price_per_kg: Decimal,
}

/// One non-blank line of pasted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkLine {
    /// 1-based line number in the pasted text.
    pub line: usize,
    pub parsed: Result<BulkRow, ValidationError>,
}

/// Parse pasted CSV text. Blank lines and a leading header are skipped.
///
/// Every other line yields either a row or the reason it was refused.
pub fn parse_bulk_rows(text: &str) -> Vec<BulkLine> {
    text.lines()
        .enumerate()
        .map(|(i, raw)| (i + 1, raw.trim()))
        .filter(|(_, line)| !line.is_empty())
        .filter(|(n, line)| !(*n == 1 && is_header(line)))
        .map(|(line, text)| BulkLine {
            line,
            parsed: parse_line(text),
        })
        .collect()
}

fn is_header(line: &str) -> bool {
    line.split(',')
        .next()
        .map(|first| first.trim().eq_ignore_ascii_case("species_id"))
        .unwrap_or(false)
}

fn parse_line(text: &str) -> Result<BulkRow, ValidationError> {
    let malformed = ValidationError::MalformedRow;

    let parts: Vec<&str> = text.split(',').map(str::trim).collect();
    let [species_id, price] = parts.as_slice() else {
        return Err(malformed(format!("expected `species_id,price`, got {text:?}")));
    };
    if species_id.is_empty() {
        return Err(malformed("species_id is empty".to_string()));
    }

    let price_per_kg = Decimal::from_str(price).map_err(|_| malformed(format!("invalid price {price:?}")))?;
    if price_per_kg.is_sign_negative() && !price_per_kg.is_zero() {
        return Err(malformed(format!("negative price {price_per_kg}")));
    }

    Ok(BulkRow {
        species_id: species_id.to_string(),
        price_per_kg,
    })
}
