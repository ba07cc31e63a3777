//! Boundary validation errors.
//!
//! Raised before a submission reaches the analytics core. Storage and
//! collaborator failures travel as `anyhow::Error` instead.

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unknown verification level: {0:?}")]
    UnknownVerificationLevel(String),

    #[error("price must be non-negative, got {0}")]
    NegativePrice(Decimal),

    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("invalid date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("unknown {kind}: {id:?}")]
    UnknownId { kind: &'static str, id: String },

    #[error("malformed row: {0}")]
    MalformedRow(String),
}
