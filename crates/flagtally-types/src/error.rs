use thiserror::Error;

/// Errors produced when constructing foundation types.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("{field} must be a positive integer, got {value}")]
    NonPositive { field: &'static str, value: i64 },

    #[error("unknown vote category: {0}")]
    UnknownCategory(String),
}
