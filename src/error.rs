//! Error taxonomy for the query engine.
//!
//! Every operator in [`crate::operators`] is infallible at its own boundary:
//! a failure is reported to the [`crate::sink::RecordSink`] as a diagnostic
//! and the operator returns normally. `EngineError` is the type carried in
//! that diagnostic. Internal helpers (store, sort, predicate, value) do
//! return `Result<_, EngineError>` — only the outermost operator functions
//! swallow the error into a sink call.

use std::path::PathBuf;

/// The six error kinds that can be reported to a record sink.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A table or field referenced by the query does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A `create`/`load` target conflicts with an existing table.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Row arity, join-field type, or coerced-literal type disagrees with
    /// the schema.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A condition failed to parse, an aggregate function or sort
    /// direction was unrecognized, or a literal was not a valid scalar.
    #[error("malformed query: {0}")]
    MalformedQuery(String),

    /// External sort invoked on a table with no chunks.
    #[error("empty input: {0}")]
    EmptyInput(String),

    /// Underlying file or directory operation failed.
    #[error("I/O failure: {0}")]
    IoFailure(String),
}

impl EngineError {
    pub fn io_failure(path: &std::path::Path, source: &std::io::Error) -> Self {
        EngineError::IoFailure(format!("{}: {source}", path.display()))
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::IoFailure(e.to_string())
    }
}

impl From<csv::Error> for EngineError {
    fn from(e: csv::Error) -> Self {
        EngineError::IoFailure(format!("csv: {e}"))
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::IoFailure(format!("json: {e}"))
    }
}

/// Attaches the offending path to an I/O error without discarding it.
pub(crate) fn io_err(path: &PathBuf, source: std::io::Error) -> EngineError {
    EngineError::io_failure(path, &source)
}
