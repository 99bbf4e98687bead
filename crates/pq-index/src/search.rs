//! `pq_search`, `ivfadc_search`, and the ID/term-filtered variants.
use crate::coarse::nearest_unvisited;
use crate::codebook::Codebook;
use crate::error::EngineError;
use crate::lut::Lut;
use crate::topk::TopK;
use crate::visited::VisitedSet;
use pq_catalog::Catalog;
use pq_types::{Id, IdDist, TableRole, TermDist};
use tracing::instrument;

/// Exhaustive ADC scan over the PQ quantization table.
#[instrument(skip(catalog, query))]
pub async fn pq_search(
    catalog: &dyn Catalog,
    query: &[f32],
    k: usize,
) -> Result<Vec<IdDist>, EngineError> {
    let codebook_name = catalog.resolve_table(TableRole::Codebook).await?;
    let loaded = catalog.load_codebook(&codebook_name).await?;
    let codebook = Codebook::from_loaded(loaded, query.len())?;
    let lut = Lut::build(query, &codebook);

    let quant_name = catalog.resolve_table(TableRole::PqQuantization).await?;
    let rows = catalog.scan_quantization(&quant_name).await?;

    let mut topk = TopK::new(k);
    for row in rows {
        let dist = lut.score(&row.codes);
        topk.offer(row.id, dist);
    }
    Ok(topk.into_results())
}

/// Coarse-list selection loop, residual ADC, top-k aggregation. Terminates
/// when the count of *inspected rows* reaches `k`, not when `k` distinct
/// improvements have landed — this can inspect slightly more rows than
/// strictly necessary, but keeps the loop simple and its cost predictable.
#[instrument(skip(catalog, query))]
pub async fn ivfadc_search(
    catalog: &dyn Catalog,
    query: &[f32],
    k: usize,
) -> Result<Vec<IdDist>, EngineError> {
    let residual_codebook_name = catalog.resolve_table(TableRole::ResidualCodebook).await?;
    let loaded = catalog.load_codebook(&residual_codebook_name).await?;
    let residual_codebook = Codebook::from_loaded(loaded, query.len())?;

    let coarse = catalog.load_coarse_quantizer().await?;
    let residual_quant_name = catalog
        .resolve_table(TableRole::ResidualQuantization)
        .await?;

    let mut topk = TopK::new(k);
    let mut visited = VisitedSet::new();
    let mut found = 0usize;

    while found < k {
        let Some((coarse_id, coarse_vector)) = nearest_unvisited(query, &coarse, &visited) else {
            break;
        };
        visited.insert(coarse_id);

        let residual = pq_distance::subtract(query, &coarse_vector);
        let lut = Lut::build(&residual, &residual_codebook);

        let rows = catalog
            .load_quantization_by_coarse_ids(&residual_quant_name, &[coarse_id])
            .await?;
        for row in &rows {
            topk.offer(row.id, lut.score(&row.codes));
        }
        found += rows.len();
    }

    Ok(topk.into_results())
}

/// ID filter: restrict the PQ scan to rows whose id is in `ids`.
#[instrument(skip(catalog, query, ids))]
pub async fn pq_search_in(
    catalog: &dyn Catalog,
    query: &[f32],
    k: usize,
    ids: &[Id],
) -> Result<Vec<IdDist>, EngineError> {
    let codebook_name = catalog.resolve_table(TableRole::Codebook).await?;
    let loaded = catalog.load_codebook(&codebook_name).await?;
    let codebook = Codebook::from_loaded(loaded, query.len())?;
    let lut = Lut::build(query, &codebook);

    let quant_name = catalog.resolve_table(TableRole::PqQuantization).await?;
    let rows = catalog.load_quantization_by_ids(&quant_name, ids).await?;

    let mut topk = TopK::new(k);
    for row in rows {
        topk.offer(row.id, lut.score(&row.codes));
    }
    Ok(topk.into_results())
}

/// Term filter: each group's distance is the minimum over its tokens'
/// distances (a multi-word expression scores as its closest member).
/// Unknown tokens are silently skipped; a group with no known tokens is
/// dropped entirely rather than surfaced as an error.
#[instrument(skip(catalog, query, groups))]
pub async fn pq_search_in_cplx(
    catalog: &dyn Catalog,
    query: &[f32],
    k: usize,
    groups: &[Vec<String>],
) -> Result<Vec<TermDist>, EngineError> {
    let codebook_name = catalog.resolve_table(TableRole::Codebook).await?;
    let loaded = catalog.load_codebook(&codebook_name).await?;
    let codebook = Codebook::from_loaded(loaded, query.len())?;
    let lut = Lut::build(query, &codebook);

    struct TermCandidate {
        term: String,
        dist: f32,
    }
    let mut candidates: Vec<TermCandidate> = Vec::new();

    for group in groups {
        let mut min_dist = f32::INFINITY;
        let mut any_known = false;
        for token in group {
            if let Some(codes) = catalog.lookup_token_code(token).await? {
                any_known = true;
                let dist = lut.score(&codes);
                if dist < min_dist {
                    min_dist = dist;
                }
            }
        }
        if !any_known {
            continue;
        }
        candidates.push(TermCandidate {
            term: group.join(" "),
            dist: min_dist,
        });
    }

    // Top-k by distance over group candidates, same stable-tie semantics
    // as the numeric register but keyed by the joined term string rather
    // than an id.
    candidates.sort_by(|a, b| a.dist.partial_cmp(&b.dist).unwrap());
    candidates.truncate(k);
    Ok(candidates
        .into_iter()
        .map(|c| TermDist {
            term: c.term,
            dist: c.dist,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pq_catalog::memory::InMemoryCatalog;
    use pq_types::{CodebookEntry, QuantizationRow, ResidualQuantizationRow, VectorRow};

    fn two_position_codebook_catalog() -> InMemoryCatalog {
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
        catalog
    }

    #[tokio::test]
    async fn pq_search_breaks_ties_by_earlier_scan_order() {
        let catalog = two_position_codebook_catalog();
        let results = pq_search(&catalog, &[1.0, 0.0, 0.0, 1.0], 2)
            .await
            .unwrap();
        assert_eq!(results[0], IdDist { id: 4, dist: 0.0 });
        // tie between id2 and id3 at distance 1; earlier-scanned (id2)
        // wins under the register's stable insertion order.
        assert_eq!(results[1], IdDist { id: 2, dist: 1.0 });
    }

    #[tokio::test]
    async fn pq_search_orders_all_ties_by_ascending_id() {
        let catalog = two_position_codebook_catalog();
        let results = pq_search(&catalog, &[0.0, 0.0, 0.0, 0.0], 4)
            .await
            .unwrap();
        let ids: Vec<_> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn pq_search_in_restricts_scan_to_given_ids() {
        let catalog = two_position_codebook_catalog();
        let results = pq_search_in(&catalog, &[1.0, 0.0, 0.0, 1.0], 3, &[2, 4])
            .await
            .unwrap();
        assert_eq!(results[0], IdDist { id: 4, dist: 0.0 });
        assert_eq!(results[1], IdDist { id: 2, dist: 1.0 });
        // third slot stays sentinel: only two ids qualified.
        assert_eq!(results[2].id, -1);
    }

    #[tokio::test]
    async fn ivfadc_search_probes_nearest_cell_first() {
        let catalog = InMemoryCatalog::new();
        catalog.set_coarse_quantizer(vec![
            VectorRow {
                id: 0,
                vector: vec![0.0, 0.0, 0.0, 0.0],
            },
            VectorRow {
                id: 1,
                vector: vec![1.0, 1.0, 1.0, 1.0],
            },
        ]);
        catalog.set_residual_codebook(
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
        catalog.set_residual_quantization(vec![ResidualQuantizationRow {
            id: 42,
            codes: vec![0, 0],
            coarse_id: 1,
        }]);

        let results = ivfadc_search(&catalog, &[1.0, 1.0, 1.0, 1.0], 1)
            .await
            .unwrap();
        assert_eq!(results[0], IdDist { id: 42, dist: 0.0 });
    }

    #[tokio::test]
    async fn term_filter_groups_score_by_min_over_tokens() {
        let catalog = two_position_codebook_catalog();
        let cat_id = catalog.register_term("cat", vec![], vec![]);
        let feline_id = catalog.register_term("feline", vec![], vec![]);
        // Map "cat"/"feline" to their PQ codes by inserting matching
        // quantization rows for the registered token ids.
        catalog.set_pq_quantization(vec![
            QuantizationRow {
                id: cat_id,
                codes: vec![1, 0],
            },
            QuantizationRow {
                id: feline_id,
                codes: vec![0, 1],
            },
        ]);
        let groups = vec![vec!["cat".to_string(), "feline".to_string()]];
        let results = pq_search_in_cplx(&catalog, &[1.0, 0.0, 0.0, 1.0], 1, &groups)
            .await
            .unwrap();
        assert_eq!(results[0].term, "cat feline");
        // min(dist("cat")=1, dist("feline")=1) = 1
        assert_eq!(results[0].dist, 1.0);
    }

    #[tokio::test]
    async fn term_filter_drops_group_with_no_known_tokens() {
        let catalog = two_position_codebook_catalog();
        let groups = vec![vec!["ghost".to_string()]];
        let results = pq_search_in_cplx(&catalog, &[1.0, 0.0, 0.0, 1.0], 1, &groups)
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
