//! ADC lookup table builder.
use crate::codebook::Codebook;

/// `L[p, k] = ‖q[p*d..(p+1)*d) - centroid(p, k)‖²`, flattened `p * K + k`.
/// Building this once per query turns per-candidate scoring into `M`
/// lookups plus `M-1` additions instead of `O(D)` floating-point ops.
#[derive(Clone, Debug)]
pub struct Lut {
    k: usize,
    table: Vec<f32>,
}

impl Lut {
    pub fn build(query: &[f32], codebook: &Codebook) -> Self {
        let params = codebook.params();
        let d = codebook.subvector_len();
        let mut table = vec![0.0f32; params.m * params.k];
        for pos in 0..params.m {
            let subvector = &query[pos * d..(pos + 1) * d];
            for code in 0..params.k {
                table[pos * params.k + code] =
                    pq_distance::squared_euclidean(subvector, codebook.centroid(pos, code));
            }
        }
        Self { k: params.k, table }
    }

    /// Sums `L[p, codes[p]]` over all positions — the ADC distance for one
    /// candidate's PQ code sequence.
    pub fn score(&self, codes: &[u32]) -> f32 {
        let mut sum = 0.0f32;
        for (pos, &code) in codes.iter().enumerate() {
            sum += self.table[pos * self.k + code as usize];
        }
        sum
    }
}
