use thiserror::Error;

/// Errors raised by table and record operations.
///
/// The engine never recovers from these; they travel up to the API boundary
/// where each variant maps to one status code.
#[derive(Debug, Error)]
pub enum TableError {
    /// Field name/type arity mismatch or an unparseable definition.
    #[error("Invalid table definition: {0}")]
    InvalidTable(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Record not found: {0}")]
    RecordNotFound(i64),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Type coercion failure, missing key or path/body mismatch.
    #[error("Bad input: {0}")]
    BadInput(String),

    #[error("Already exists: {0}")]
    Conflict(String),

    /// The row changed between read and write. Callers re-fetch and retry.
    #[error("Record {0} was changed by another request")]
    ConcurrencyConflict(i64),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, TableError>;
