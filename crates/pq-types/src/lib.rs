//! Data-model types shared between the catalog adapter and the search
//! engine. Kept free of any catalog/backend dependency so both sides of
//! the `Catalog` trait boundary can share them without a dependency cycle.
use serde::{Deserialize, Serialize};

/// A 32-bit-signed-integer id, as the data model requires everywhere.
pub type Id = i32;

/// PQ subquantizer structure: `M` positions, each with `K` possible codes.
/// Fixed by the stored codebook, never a query-time parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PqParams {
    pub m: usize,
    pub k: usize,
}

impl PqParams {
    pub fn new(m: usize, k: usize) -> Self {
        Self { m, k }
    }

    /// Subvector length for a full vector of dimensionality `d`. Callers
    /// must check `dim % self.m == 0` themselves (see `InternalInvariant`
    /// in the error model) before using this.
    pub fn subvector_len(&self, dim: usize) -> usize {
        dim / self.m
    }
}

/// One `(pos, code, vector)` entry of a codebook, as persisted by the PQ
/// codebook / residual codebook tables. `count` is only meaningful on the
/// insert path (online mean updates).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CodebookEntry {
    pub pos: usize,
    pub code: usize,
    pub vector: Vec<f32>,
    pub count: u64,
}

/// `(id, code_sequence)` row of the PQ quantization table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuantizationRow {
    pub id: Id,
    pub codes: Vec<u32>,
}

/// `(id, code_sequence, coarse_id)` row of the residual quantization table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResidualQuantizationRow {
    pub id: Id,
    pub codes: Vec<u32>,
    pub coarse_id: Id,
}

/// `(id, vector)` entry of a vector table (original, normalized, or coarse
/// quantizer).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VectorRow {
    pub id: Id,
    pub vector: Vec<f32>,
}

/// A single `(normalized, unnormalized, token)` triple produced by
/// tokenizing one term on the insert path. The catalog is responsible for
/// name resolution, so `token` is already the row id this term will use in
/// every other table.
#[derive(Clone, Debug, PartialEq)]
pub struct Tokenized {
    pub normalized: Vec<f32>,
    pub unnormalized: Vec<f32>,
    pub token: Id,
}

/// Logical table roles resolved through the catalog's `resolve_table`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TableRole {
    Original,
    Normalized,
    PqQuantization,
    Codebook,
    ResidualQuantization,
    CoarseQuantization,
    ResidualCodebook,
}

/// A `(id, dist)` result row, the shape emitted by every unfiltered search
/// entry point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IdDist {
    pub id: Id,
    pub dist: f32,
}

/// A `(term, dist)` result row, emitted by `pq_search_in_cplx`.
#[derive(Clone, Debug, PartialEq)]
pub struct TermDist {
    pub term: String,
    pub dist: f32,
}

/// A `(query_id, id, dist)` result row, emitted by `ivfadc_batch_search`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QueryIdDist {
    pub query_id: Id,
    pub id: Id,
    pub dist: f32,
}
