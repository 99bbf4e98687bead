//! In-memory PQ / residual-PQ codebook model.
use crate::error::EngineError;
use pq_catalog::LoadedCodebook;
use pq_types::PqParams;

/// A loaded codebook held for the duration of one query or insert. Entries
/// are stored flat, indexed by `pos * k + code`.
#[derive(Clone, Debug)]
pub struct Codebook {
    params: PqParams,
    /// subvector length, `d = D / M`
    subvector_len: usize,
    centroids: Vec<Vec<f32>>,
    counts: Vec<u64>,
}

impl Codebook {
    /// Loads and validates a codebook against the full vector dimensionality
    /// `dim`. Fails with `InternalInvariant` if `dim % m != 0` rather than
    /// silently mis-slicing subvectors later.
    pub fn from_loaded(loaded: LoadedCodebook, dim: usize) -> Result<Self, EngineError> {
        if loaded.m == 0 || dim % loaded.m != 0 {
            return Err(EngineError::InternalInvariant(format!(
                "dimensionality {dim} is not divisible by M={}",
                loaded.m
            )));
        }
        let params = PqParams::new(loaded.m, loaded.k);
        let subvector_len = params.subvector_len(dim);
        let mut centroids = vec![Vec::new(); params.m * params.k];
        let mut counts = vec![0u64; params.m * params.k];
        for entry in loaded.entries {
            if entry.pos >= params.m || entry.code >= params.k {
                return Err(EngineError::InternalInvariant(format!(
                    "codebook entry (pos={}, code={}) out of bounds for M={} K={}",
                    entry.pos, entry.code, params.m, params.k
                )));
            }
            if entry.vector.len() != subvector_len {
                return Err(EngineError::InternalInvariant(format!(
                    "codebook entry (pos={}, code={}) has vector length {}, expected {}",
                    entry.pos,
                    entry.code,
                    entry.vector.len(),
                    subvector_len
                )));
            }
            let idx = entry.pos * params.k + entry.code;
            centroids[idx] = entry.vector;
            counts[idx] = entry.count;
        }
        Ok(Self {
            params,
            subvector_len,
            centroids,
            counts,
        })
    }

    pub fn params(&self) -> PqParams {
        self.params
    }

    pub fn subvector_len(&self) -> usize {
        self.subvector_len
    }

    pub fn centroid(&self, pos: usize, code: usize) -> &[f32] {
        &self.centroids[pos * self.params.k + code]
    }

    pub fn count(&self, pos: usize, code: usize) -> u64 {
        self.counts[pos * self.params.k + code]
    }

    /// Encodes a vector by per-position nearest-centroid assignment (used
    /// by both PQ and residual encoding on the insert path).
    pub fn encode(&self, vector: &[f32]) -> Vec<u32> {
        let mut codes = Vec::with_capacity(self.params.m);
        for pos in 0..self.params.m {
            let subvector = &vector[pos * self.subvector_len..(pos + 1) * self.subvector_len];
            let mut best_code = 0usize;
            let mut best_dist = f32::INFINITY;
            for code in 0..self.params.k {
                let dist = pq_distance::squared_euclidean(subvector, self.centroid(pos, code));
                if dist < best_dist {
                    best_dist = dist;
                    best_code = code;
                }
            }
            codes.push(best_code as u32);
        }
        codes
    }

    /// Online mean update: for a newly-encoded vector `x` with codes
    /// `c[0..M)`, folds `x`'s subvector into each assigned centroid's
    /// running mean and bumps its count.
    pub fn online_update(&mut self, vector: &[f32], codes: &[u32]) {
        for (pos, &code) in codes.iter().enumerate() {
            let code = code as usize;
            let subvector = &vector[pos * self.subvector_len..(pos + 1) * self.subvector_len];
            let idx = pos * self.params.k + code;
            let count = self.counts[idx];
            let centroid = &mut self.centroids[idx];
            if centroid.is_empty() {
                *centroid = subvector.to_vec();
            } else {
                for (c, &x) in centroid.iter_mut().zip(subvector.iter()) {
                    *c = (*c * count as f32 + x) / (count as f32 + 1.0);
                }
            }
            self.counts[idx] = count + 1;
        }
    }

    /// Exports the codebook back to the catalog's row representation, for
    /// `upsertCodebook` on the insert path.
    pub fn to_entries(&self) -> Vec<pq_types::CodebookEntry> {
        let mut entries = Vec::with_capacity(self.params.m * self.params.k);
        for pos in 0..self.params.m {
            for code in 0..self.params.k {
                let idx = pos * self.params.k + code;
                entries.push(pq_types::CodebookEntry {
                    pos,
                    code,
                    vector: self.centroids[idx].clone(),
                    count: self.counts[idx],
                });
            }
        }
        entries
    }
}
