//! `cluster_pq` (k-means over PQ codes) and `grouping_pq` (nearest-group
//! assignment).
use crate::codebook::Codebook;
use crate::error::EngineError;
use crate::lut::Lut;
use pq_catalog::Catalog;
use pq_types::{Id, TableRole};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashMap;
use tracing::instrument;

/// One output row of `cluster_pq`: the final centroid and the ids Lloyd's
/// last iteration assigned to it.
#[derive(Clone, Debug, PartialEq)]
pub struct Cluster {
    pub centroid: Vec<f32>,
    pub ids: Vec<Id>,
}

/// Lloyd iteration over PQ-coded vectors, fixed at `iterations` rounds
/// (defaults to 10, see `PqEngineConfig::kmeans_iterations`).
///
/// Assignment is tracked in a `HashMap<Id, usize>` sized by the actual
/// input rather than a fixed-size array, so clustering doesn't need to know
/// the total corpus size up front.
#[instrument(skip(catalog, ids))]
pub async fn cluster_pq(
    catalog: &dyn Catalog,
    ids: &[Id],
    k: usize,
    iterations: usize,
) -> Result<Vec<Cluster>, EngineError> {
    if ids.len() < k {
        return Err(EngineError::InvalidArgument(format!(
            "cluster_pq requires at least k={k} ids, got {}",
            ids.len()
        )));
    }

    let codebook_name = catalog.resolve_table(TableRole::Codebook).await?;
    let loaded = catalog.load_codebook(&codebook_name).await?;

    let normalized_name = catalog.resolve_table(TableRole::Normalized).await?;
    let seed_candidates = catalog.load_vectors_by_id(&normalized_name, ids).await?;
    let dim = seed_candidates
        .first()
        .map(|v| v.vector.len())
        .ok_or_else(|| EngineError::InvalidArgument("no vectors found for given ids".into()))?;
    let codebook = Codebook::from_loaded(loaded, dim)?;

    let quant_name = catalog.resolve_table(TableRole::PqQuantization).await?;
    let codes_rows = catalog.load_quantization_by_ids(&quant_name, ids).await?;
    let codes_by_id: HashMap<Id, Vec<u32>> =
        codes_rows.into_iter().map(|r| (r.id, r.codes)).collect();

    let original_name = catalog.resolve_table(TableRole::Original).await?;
    let original_rows = catalog.load_vectors_by_id(&original_name, ids).await?;
    let original_by_id: HashMap<Id, Vec<f32>> = original_rows
        .into_iter()
        .map(|v| (v.id, v.vector))
        .collect();

    // Seed centroids by sampling k ids uniformly without replacement.
    let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(0xC0FFEE);
    let mut sample_ids: Vec<Id> = ids.to_vec();
    sample_ids.shuffle(&mut rng);
    let normalized_by_id: HashMap<Id, Vec<f32>> = seed_candidates
        .into_iter()
        .map(|v| (v.id, v.vector))
        .collect();
    let mut centroids: Vec<Vec<f32>> = sample_ids
        .into_iter()
        .take(k)
        .filter_map(|id| normalized_by_id.get(&id).cloned())
        .collect();
    if centroids.len() < k {
        return Err(EngineError::InvalidArgument(
            "not enough distinct vectors to seed k centroids".into(),
        ));
    }

    let mut assign: HashMap<Id, usize> = HashMap::new();

    for _ in 0..iterations.max(1) {
        let luts: Vec<Lut> = centroids
            .iter()
            .map(|c| Lut::build(c, &codebook))
            .collect();

        let mut sums = vec![vec![0.0f32; dim]; k];
        let mut counts = vec![0u64; k];

        for &id in ids {
            let Some(codes) = codes_by_id.get(&id) else {
                continue;
            };
            let Some(original) = original_by_id.get(&id) else {
                continue;
            };
            let mut best_cluster = 0usize;
            let mut best_dist = f32::INFINITY;
            for (c, lut) in luts.iter().enumerate() {
                let dist = lut.score(codes);
                if dist < best_dist {
                    best_dist = dist;
                    best_cluster = c;
                }
            }
            assign.insert(id, best_cluster);
            counts[best_cluster] += 1;
            for (s, &x) in sums[best_cluster].iter_mut().zip(original.iter()) {
                *s += x;
            }
        }

        for c in 0..k {
            if counts[c] == 0 {
                centroids[c] = vec![0.0; dim];
            } else {
                centroids[c] = sums[c].iter().map(|&s| s / counts[c] as f32).collect();
            }
        }
    }

    let mut clusters: Vec<Cluster> = centroids
        .into_iter()
        .map(|centroid| Cluster {
            centroid,
            ids: Vec::new(),
        })
        .collect();
    for &id in ids {
        if let Some(&c) = assign.get(&id) {
            clusters[c].ids.push(id);
        }
    }
    Ok(clusters)
}

/// Assigns each input id to the nearest of `group_ids`, using PQ codes. A
/// missing group id is fatal, unlike the silently-dropped missing tokens
/// elsewhere in this crate.
#[instrument(skip(catalog, ids, group_ids))]
pub async fn grouping_pq(
    catalog: &dyn Catalog,
    ids: &[Id],
    group_ids: &[Id],
) -> Result<Vec<(Id, Id)>, EngineError> {
    let original_name = catalog.resolve_table(TableRole::Original).await?;
    let mut sorted_group_ids = group_ids.to_vec();
    sorted_group_ids.sort_unstable();

    let group_vectors = catalog
        .load_vectors_by_id(&original_name, &sorted_group_ids)
        .await?;
    let group_vectors_by_id: HashMap<Id, Vec<f32>> = group_vectors
        .into_iter()
        .map(|v| (v.id, v.vector))
        .collect();
    for &gid in &sorted_group_ids {
        if !group_vectors_by_id.contains_key(&gid) {
            return Err(EngineError::MissingGroup(gid));
        }
    }

    let codebook_name = catalog.resolve_table(TableRole::Codebook).await?;
    let loaded = catalog.load_codebook(&codebook_name).await?;
    let dim = sorted_group_ids
        .first()
        .and_then(|gid| group_vectors_by_id.get(gid))
        .map(|v| v.len())
        .unwrap_or(0);
    let codebook = Codebook::from_loaded(loaded, dim)?;

    // One LUT per group, built in ascending group-id order so ties break
    // toward the lower group id.
    let luts: Vec<(Id, Lut)> = sorted_group_ids
        .iter()
        .map(|&gid| {
            let vector = &group_vectors_by_id[&gid];
            (gid, Lut::build(vector, &codebook))
        })
        .collect();

    let quant_name = catalog.resolve_table(TableRole::PqQuantization).await?;
    let rows = catalog.load_quantization_by_ids(&quant_name, ids).await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let mut best_group = luts[0].0;
        let mut best_dist = f32::INFINITY;
        for (gid, lut) in &luts {
            let dist = lut.score(&row.codes);
            if dist < best_dist {
                best_dist = dist;
                best_group = *gid;
            }
        }
        out.push((row.id, best_group));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pq_catalog::memory::InMemoryCatalog;
    use pq_types::{CodebookEntry, QuantizationRow, VectorRow};

    fn seed_catalog() -> InMemoryCatalog {
        let catalog = InMemoryCatalog::new();
        catalog.set_pq_codebook(
            2,
            2,
            vec![
                CodebookEntry {
                    pos: 0,
                    code: 0,
                    vector: vec![0.0, 0.0],
                    count: 0,
                },
                CodebookEntry {
                    pos: 0,
                    code: 1,
                    vector: vec![1.0, 0.0],
                    count: 0,
                },
                CodebookEntry {
                    pos: 1,
                    code: 0,
                    vector: vec![0.0, 0.0],
                    count: 0,
                },
                CodebookEntry {
                    pos: 1,
                    code: 1,
                    vector: vec![0.0, 1.0],
                    count: 0,
                },
            ],
        );
        catalog.set_pq_quantization(vec![
            QuantizationRow {
                id: 1,
                codes: vec![0, 0],
            },
            QuantizationRow {
                id: 2,
                codes: vec![1, 0],
            },
            QuantizationRow {
                id: 3,
                codes: vec![0, 1],
            },
            QuantizationRow {
                id: 4,
                codes: vec![1, 1],
            },
        ]);
        catalog.set_original_vectors(vec![
            VectorRow {
                id: 1,
                vector: vec![0.0, 0.0, 0.0, 0.0],
            },
            VectorRow {
                id: 2,
                vector: vec![1.0, 0.0, 0.0, 0.0],
            },
            VectorRow {
                id: 3,
                vector: vec![0.0, 0.0, 0.0, 1.0],
            },
            VectorRow {
                id: 4,
                vector: vec![1.0, 0.0, 0.0, 1.0],
            },
        ]);
        catalog.set_normalized_vectors(vec![
            VectorRow {
                id: 1,
                vector: vec![0.0, 0.0, 0.0, 0.0],
            },
            VectorRow {
                id: 2,
                vector: vec![1.0, 0.0, 0.0, 0.0],
            },
            VectorRow {
                id: 3,
                vector: vec![0.0, 0.0, 0.0, 1.0],
            },
            VectorRow {
                id: 4,
                vector: vec![1.0, 0.0, 0.0, 1.0],
            },
        ]);
        catalog
    }

    #[tokio::test]
    async fn cluster_pq_partitions_all_ids() {
        let catalog = seed_catalog();
        let clusters = cluster_pq(&catalog, &[1, 2, 3, 4], 2, 10).await.unwrap();
        let mut all_ids: Vec<Id> = clusters.iter().flat_map(|c| c.ids.clone()).collect();
        all_ids.sort_unstable();
        assert_eq!(all_ids, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn cluster_pq_rejects_too_few_ids() {
        let catalog = seed_catalog();
        let err = cluster_pq(&catalog, &[1, 2], 4, 10).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn grouping_pq_breaks_ties_toward_lower_group_id() {
        let catalog = seed_catalog();
        let result = grouping_pq(&catalog, &[1, 2, 3, 4], &[2, 3]).await.unwrap();
        let as_map: HashMap<Id, Id> = result.into_iter().collect();
        assert_eq!(as_map[&1], 2);
        assert_eq!(as_map[&2], 2);
        assert_eq!(as_map[&3], 3);
        // tie at id4 (dist 1 to both groups) breaks to the lower group id.
        assert_eq!(as_map[&4], 2);
    }

    #[tokio::test]
    async fn grouping_pq_missing_group_is_fatal() {
        let catalog = seed_catalog();
        let err = grouping_pq(&catalog, &[1, 2], &[999]).await.unwrap_err();
        assert!(matches!(err, EngineError::MissingGroup(999)));
    }
}
