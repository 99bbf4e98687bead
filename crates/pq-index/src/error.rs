//! Engine-level error kinds. `CatalogError` wraps the catalog's own error
//! type so a query can propagate an I/O fault without the engine depending
//! on the backend's concrete error representation.
use pq_catalog::CatalogError;
use pq_error::{ErrorCodes, PqError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A missing group id in `grouping_pq` — fatal, unlike silently-absorbed
    /// missing ids/tokens elsewhere.
    #[error("missing group id: {0}")]
    MissingGroup(i32),

    #[error("invariant violated: {0}")]
    InternalInvariant(String),
}

impl PqError for EngineError {
    fn code(&self) -> ErrorCodes {
        match self {
            EngineError::Catalog(e) => e.code(),
            EngineError::InvalidArgument(_) => ErrorCodes::InvalidArgument,
            EngineError::MissingGroup(_) => ErrorCodes::NotFound,
            EngineError::InternalInvariant(_) => ErrorCodes::FailedPrecondition,
        }
    }
}
