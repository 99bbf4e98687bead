//! Shared coarse-centroid nearest-neighbor lookup used by `ivfadc_search`
//! and `ivfadc_batch_search`: minimize squared distance over centroids not
//! yet in `visited`, ties broken by lower id.
use crate::visited::VisitedSet;
use pq_types::{Id, VectorRow};

pub fn nearest_unvisited(
    query: &[f32],
    coarse: &[VectorRow],
    visited: &VisitedSet,
) -> Option<(Id, Vec<f32>)> {
    let mut best: Option<(Id, f32, usize)> = None;
    for (idx, entry) in coarse.iter().enumerate() {
        if visited.contains(entry.id) {
            continue;
        }
        let dist = pq_distance::squared_euclidean(query, &entry.vector);
        let better = match &best {
            None => true,
            Some((best_id, best_dist, _)) => {
                dist < *best_dist || (dist == *best_dist && entry.id < *best_id)
            }
        };
        if better {
            best = Some((entry.id, dist, idx));
        }
    }
    best.map(|(id, _, idx)| (id, coarse[idx].vector.clone()))
}
