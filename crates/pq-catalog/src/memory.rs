//! An in-memory [`Catalog`] implementation used by tests and examples: a
//! plain state struct behind `Arc<Mutex<_>>`, cloned cheaply, mutated under
//! one lock.
use crate::{Catalog, CatalogError, LoadedCodebook};
use async_trait::async_trait;
use parking_lot::Mutex;
use pq_types::{
    CodebookEntry, Id, QuantizationRow, ResidualQuantizationRow, TableRole, Tokenized, VectorRow,
};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct InMemoryCatalog {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    original_vectors: Vec<VectorRow>,
    normalized_vectors: Vec<VectorRow>,
    coarse_quantizer: Vec<VectorRow>,
    pq_codebook: Vec<CodebookEntry>,
    pq_codebook_m: usize,
    pq_codebook_k: usize,
    residual_codebook: Vec<CodebookEntry>,
    residual_codebook_m: usize,
    residual_codebook_k: usize,
    pq_quantization: Vec<QuantizationRow>,
    residual_quantization: Vec<ResidualQuantizationRow>,
    tokens_by_word: HashMap<String, Tokenized>,
    next_id: Id,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_pq_codebook(&self, m: usize, k: usize, entries: Vec<CodebookEntry>) {
        let mut inner = self.inner.lock();
        inner.pq_codebook_m = m;
        inner.pq_codebook_k = k;
        inner.pq_codebook = entries;
    }

    pub fn set_residual_codebook(&self, m: usize, k: usize, entries: Vec<CodebookEntry>) {
        let mut inner = self.inner.lock();
        inner.residual_codebook_m = m;
        inner.residual_codebook_k = k;
        inner.residual_codebook = entries;
    }

    pub fn set_coarse_quantizer(&self, rows: Vec<VectorRow>) {
        self.inner.lock().coarse_quantizer = rows;
    }

    pub fn set_pq_quantization(&self, rows: Vec<QuantizationRow>) {
        self.inner.lock().pq_quantization = rows;
    }

    pub fn set_residual_quantization(&self, rows: Vec<ResidualQuantizationRow>) {
        self.inner.lock().residual_quantization = rows;
    }

    pub fn set_original_vectors(&self, rows: Vec<VectorRow>) {
        self.inner.lock().original_vectors = rows;
    }

    pub fn set_normalized_vectors(&self, rows: Vec<VectorRow>) {
        self.inner.lock().normalized_vectors = rows;
    }

    /// Registers a term with known vectors and token id, so `tokenize` and
    /// `lookup_token_code` can resolve it deterministically in tests.
    pub fn register_term(&self, term: &str, normalized: Vec<f32>, unnormalized: Vec<f32>) -> Id {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.tokens_by_word.insert(
            term.to_string(),
            Tokenized {
                normalized,
                unnormalized,
                token: id,
            },
        );
        id
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn resolve_table(&self, role: TableRole) -> Result<String, CatalogError> {
        Ok(match role {
            TableRole::Original => "original_vectors",
            TableRole::Normalized => "normalized_vectors",
            TableRole::PqQuantization => "pq_quantization",
            TableRole::Codebook => "pq_codebook",
            TableRole::ResidualQuantization => "residual_quantization",
            TableRole::CoarseQuantization => "coarse_quantization",
            TableRole::ResidualCodebook => "residual_codebook",
        }
        .to_string())
    }

    async fn load_codebook(&self, name: &str) -> Result<LoadedCodebook, CatalogError> {
        self.load_codebook_with_counts(name).await
    }

    async fn load_codebook_with_counts(&self, name: &str) -> Result<LoadedCodebook, CatalogError> {
        let inner = self.inner.lock();
        if name == "pq_codebook" {
            Ok(LoadedCodebook {
                m: inner.pq_codebook_m,
                k: inner.pq_codebook_k,
                entries: inner.pq_codebook.clone(),
            })
        } else if name == "residual_codebook" {
            Ok(LoadedCodebook {
                m: inner.residual_codebook_m,
                k: inner.residual_codebook_k,
                entries: inner.residual_codebook.clone(),
            })
        } else {
            Err(CatalogError::TableNotFound(name.to_string()))
        }
    }

    async fn load_coarse_quantizer(&self) -> Result<Vec<VectorRow>, CatalogError> {
        Ok(self.inner.lock().coarse_quantizer.clone())
    }

    async fn load_vectors_by_id(
        &self,
        name: &str,
        ids: &[Id],
    ) -> Result<Vec<VectorRow>, CatalogError> {
        let inner = self.inner.lock();
        let table = if name == "original_vectors" {
            &inner.original_vectors
        } else if name == "normalized_vectors" {
            &inner.normalized_vectors
        } else {
            return Err(CatalogError::TableNotFound(name.to_string()));
        };
        Ok(table
            .iter()
            .filter(|row| ids.contains(&row.id))
            .cloned()
            .collect())
    }

    async fn load_quantization_by_ids(
        &self,
        name: &str,
        ids: &[Id],
    ) -> Result<Vec<QuantizationRow>, CatalogError> {
        if name != "pq_quantization" {
            return Err(CatalogError::TableNotFound(name.to_string()));
        }
        let inner = self.inner.lock();
        Ok(inner
            .pq_quantization
            .iter()
            .filter(|row| ids.contains(&row.id))
            .cloned()
            .collect())
    }

    async fn load_quantization_by_coarse_ids(
        &self,
        name: &str,
        coarse_ids: &[Id],
    ) -> Result<Vec<ResidualQuantizationRow>, CatalogError> {
        if name != "residual_quantization" {
            return Err(CatalogError::TableNotFound(name.to_string()));
        }
        let inner = self.inner.lock();
        Ok(inner
            .residual_quantization
            .iter()
            .filter(|row| coarse_ids.contains(&row.coarse_id))
            .cloned()
            .collect())
    }

    async fn scan_quantization(&self, name: &str) -> Result<Vec<QuantizationRow>, CatalogError> {
        if name != "pq_quantization" {
            return Err(CatalogError::TableNotFound(name.to_string()));
        }
        Ok(self.inner.lock().pq_quantization.clone())
    }

    async fn insert_quantization(
        &self,
        name: &str,
        rows: Vec<QuantizationRow>,
    ) -> Result<(), CatalogError> {
        if name != "pq_quantization" {
            return Err(CatalogError::TableNotFound(name.to_string()));
        }
        self.inner.lock().pq_quantization.extend(rows);
        Ok(())
    }

    async fn insert_residual_quantization(
        &self,
        name: &str,
        rows: Vec<ResidualQuantizationRow>,
    ) -> Result<(), CatalogError> {
        if name != "residual_quantization" {
            return Err(CatalogError::TableNotFound(name.to_string()));
        }
        self.inner.lock().residual_quantization.extend(rows);
        Ok(())
    }

    async fn insert_vectors(&self, name: &str, rows: Vec<VectorRow>) -> Result<(), CatalogError> {
        let mut inner = self.inner.lock();
        if name == "original_vectors" {
            inner.original_vectors.extend(rows);
        } else if name == "normalized_vectors" {
            inner.normalized_vectors.extend(rows);
        } else {
            return Err(CatalogError::TableNotFound(name.to_string()));
        }
        Ok(())
    }

    async fn upsert_codebook(
        &self,
        name: &str,
        entries: Vec<CodebookEntry>,
    ) -> Result<(), CatalogError> {
        let mut inner = self.inner.lock();
        let table = if name == "pq_codebook" {
            &mut inner.pq_codebook
        } else if name == "residual_codebook" {
            &mut inner.residual_codebook
        } else {
            return Err(CatalogError::TableNotFound(name.to_string()));
        };
        for updated in entries {
            if let Some(existing) = table
                .iter_mut()
                .find(|e| e.pos == updated.pos && e.code == updated.code)
            {
                *existing = updated;
            } else {
                table.push(updated);
            }
        }
        Ok(())
    }

    async fn lookup_token_code(&self, term: &str) -> Result<Option<Vec<u32>>, CatalogError> {
        let inner = self.inner.lock();
        let Some(tokenized) = inner.tokens_by_word.get(term) else {
            return Ok(None);
        };
        let id = tokenized.token;
        Ok(inner
            .pq_quantization
            .iter()
            .find(|row| row.id == id)
            .map(|row| row.codes.clone()))
    }

    async fn tokenize(&self, term: &str) -> Result<Tokenized, CatalogError> {
        self.inner
            .lock()
            .tokens_by_word
            .get(term)
            .cloned()
            .ok_or_else(|| CatalogError::UnknownToken(term.to_string()))
    }
}
