//! The catalog adapter: the engine's only permitted I/O channel.
//!
//! The core never embeds SQL, tuple marshalling, or a set-returning call
//! protocol. It depends only on [`Catalog`]. A real deployment backs this
//! with whatever storage holds the logical vector/codebook/quantization
//! tables; tests and examples use [`InMemoryCatalog`].
pub mod memory;

use async_trait::async_trait;
use pq_error::{ErrorCodes, PqError};
use pq_types::{
    CodebookEntry, Id, QuantizationRow, ResidualQuantizationRow, TableRole, Tokenized, VectorRow,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("table role {0:?} has no resolved name")]
    UnresolvedTable(TableRole),
    #[error("table {0} not found")]
    TableNotFound(String),
    #[error("unknown token: {0}")]
    UnknownToken(String),
    #[error("backend error: {0}")]
    Backend(String),
}

impl PqError for CatalogError {
    fn code(&self) -> ErrorCodes {
        match self {
            CatalogError::UnresolvedTable(_) | CatalogError::TableNotFound(_) => {
                ErrorCodes::NotFound
            }
            CatalogError::UnknownToken(_) => ErrorCodes::NotFound,
            CatalogError::Backend(_) => ErrorCodes::Internal,
        }
    }
}

/// A loaded codebook: `(M, K, entries)`, entries ordered `pos * K + code`.
#[derive(Clone, Debug)]
pub struct LoadedCodebook {
    pub m: usize,
    pub k: usize,
    pub entries: Vec<CodebookEntry>,
}

/// The engine's sole I/O boundary. Every operation may fail with a
/// [`CatalogError`]; implementors decide how failures map to their backend
/// (network error, parse error, missing row).
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn resolve_table(&self, role: TableRole) -> Result<String, CatalogError>;

    async fn load_codebook(&self, name: &str) -> Result<LoadedCodebook, CatalogError>;

    /// Same as `load_codebook` but the entries carry a `count` column used
    /// to drive the online mean update on the insert path.
    async fn load_codebook_with_counts(&self, name: &str) -> Result<LoadedCodebook, CatalogError>;

    async fn load_coarse_quantizer(&self) -> Result<Vec<VectorRow>, CatalogError>;

    async fn load_vectors_by_id(
        &self,
        name: &str,
        ids: &[Id],
    ) -> Result<Vec<VectorRow>, CatalogError>;

    async fn load_quantization_by_ids(
        &self,
        name: &str,
        ids: &[Id],
    ) -> Result<Vec<QuantizationRow>, CatalogError>;

    async fn load_quantization_by_coarse_ids(
        &self,
        name: &str,
        coarse_ids: &[Id],
    ) -> Result<Vec<ResidualQuantizationRow>, CatalogError>;

    /// A finite, non-restartable scan of every row of `name`. Implementors
    /// that page internally should exhaust the cursor before returning.
    async fn scan_quantization(&self, name: &str) -> Result<Vec<QuantizationRow>, CatalogError>;

    async fn insert_quantization(
        &self,
        name: &str,
        rows: Vec<QuantizationRow>,
    ) -> Result<(), CatalogError>;

    async fn insert_residual_quantization(
        &self,
        name: &str,
        rows: Vec<ResidualQuantizationRow>,
    ) -> Result<(), CatalogError>;

    async fn insert_vectors(&self, name: &str, rows: Vec<VectorRow>) -> Result<(), CatalogError>;

    async fn upsert_codebook(
        &self,
        name: &str,
        entries: Vec<CodebookEntry>,
    ) -> Result<(), CatalogError>;

    /// Looks up a single known token's PQ code without a full table scan,
    /// used by the term filter in `pq_search_in_cplx`.
    async fn lookup_token_code(&self, term: &str) -> Result<Option<Vec<u32>>, CatalogError>;

    async fn tokenize(&self, term: &str) -> Result<Tokenized, CatalogError>;
}
