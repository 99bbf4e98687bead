//! Multi-query IVFADC with inverted-list coalescing.
//!
//! A naive port would find the coalesced query index for a cell by scanning
//! for the first zero slot in a fixed array — ambiguous with a genuine query
//! index 0. Avoided here: each cell's query list is an explicit,
//! freshly-built `Vec<usize>` per wave, so there is no sentinel to collide
//! with.
use crate::coarse::nearest_unvisited;
use crate::codebook::Codebook;
use crate::error::EngineError;
use crate::lut::Lut;
use crate::topk::TopK;
use crate::visited::VisitedSet;
use pq_catalog::Catalog;
use pq_types::{Id, QueryIdDist, TableRole};
use std::collections::HashMap;
use tracing::instrument;

struct QueryState {
    query_id: Id,
    vector: Vec<f32>,
    visited: VisitedSet,
    topk: TopK,
    found: usize,
}

/// Runs IVFADC for every id in `ids` in parallel waves, coalescing the
/// coarse-cell fetches needed by all still-unfinished queries into one
/// catalog call per wave.
#[instrument(skip(catalog, ids))]
pub async fn ivfadc_batch_search(
    catalog: &dyn Catalog,
    ids: &[Id],
    k: usize,
) -> Result<Vec<QueryIdDist>, EngineError> {
    let normalized_name = catalog.resolve_table(TableRole::Normalized).await?;
    let query_vectors = catalog.load_vectors_by_id(&normalized_name, ids).await?;

    // Preserve input order for output grouping: results group by query_id
    // in the order the caller's ids were given.
    let mut states: Vec<QueryState> = ids
        .iter()
        .filter_map(|&id| {
            query_vectors
                .iter()
                .find(|v| v.id == id)
                .map(|v| QueryState {
                    query_id: id,
                    vector: v.vector.clone(),
                    visited: VisitedSet::new(),
                    topk: TopK::new(k),
                    found: 0,
                })
        })
        .collect();

    if states.is_empty() {
        return Ok(Vec::new());
    }

    let residual_codebook_name = catalog.resolve_table(TableRole::ResidualCodebook).await?;
    let loaded = catalog.load_codebook(&residual_codebook_name).await?;
    let residual_codebook = Codebook::from_loaded(loaded, states[0].vector.len())?;

    let coarse = catalog.load_coarse_quantizer().await?;
    let residual_quant_name = catalog
        .resolve_table(TableRole::ResidualQuantization)
        .await?;

    let mut unfinished: Vec<usize> = (0..states.len())
        .filter(|&idx| states[idx].found < k)
        .collect();

    while !unfinished.is_empty() {
        // Step 1: each still-unfinished query picks its next coarse cell
        // and builds its own residual LUT.
        let mut cell_of: HashMap<usize, Id> = HashMap::new();
        let mut lut_of: HashMap<usize, Lut> = HashMap::new();
        for &idx in &unfinished {
            let state = &states[idx];
            let Some((coarse_id, coarse_vector)) =
                nearest_unvisited(&state.vector, &coarse, &state.visited)
            else {
                continue;
            };
            let residual = pq_distance::subtract(&state.vector, &coarse_vector);
            lut_of.insert(idx, Lut::build(&residual, &residual_codebook));
            cell_of.insert(idx, coarse_id);
        }

        // Step 2: distinct coarse-cell ids needed this wave, with the list
        // of query indices that need each one.
        let mut cell_to_queries: HashMap<Id, Vec<usize>> = HashMap::new();
        for (&idx, &cell) in &cell_of {
            cell_to_queries.entry(cell).or_default().push(idx);
        }
        if cell_to_queries.is_empty() {
            break;
        }
        let cells: Vec<Id> = cell_to_queries.keys().copied().collect();

        // Step 3: one coalesced fetch for every cell needed this wave.
        let rows = catalog
            .load_quantization_by_coarse_ids(&residual_quant_name, &cells)
            .await?;

        // Step 4: score every row against every query that needed its cell.
        let mut rows_per_cell: HashMap<Id, usize> = HashMap::new();
        for row in &rows {
            *rows_per_cell.entry(row.coarse_id).or_insert(0) += 1;
            if let Some(query_indices) = cell_to_queries.get(&row.coarse_id) {
                for &idx in query_indices {
                    if let Some(lut) = lut_of.get(&idx) {
                        states[idx].topk.offer(row.id, lut.score(&row.codes));
                    }
                }
            }
        }

        for (&idx, &cell) in &cell_of {
            states[idx].visited.insert(cell);
            states[idx].found += rows_per_cell.get(&cell).copied().unwrap_or(0);
        }

        unfinished.retain(|&idx| states[idx].found < k && cell_of.contains_key(&idx));
    }

    let mut out = Vec::with_capacity(states.len() * k);
    for state in states {
        for cand in state.topk.into_results() {
            out.push(QueryIdDist {
                query_id: state.query_id,
                id: cand.id,
                dist: cand.dist,
            });
        }
    }
    Ok(out)
}
