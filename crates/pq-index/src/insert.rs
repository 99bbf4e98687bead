//! Incremental insertion: tokenize, encode, persist, update codebooks.
use crate::codebook::Codebook;
use crate::error::EngineError;
use pq_catalog::Catalog;
use pq_types::{Id, QuantizationRow, ResidualQuantizationRow, TableRole, VectorRow};
use tracing::instrument;

/// Tokenizes every term, encodes it against both codebooks, and persists
/// everything through the catalog. All-or-nothing at the catalog
/// transaction boundary: on any failure, none of the new state is
/// observable. Codebook evolution is online and monotone in count; new
/// terms never trigger re-encoding of existing rows.
#[instrument(skip(catalog, terms))]
pub async fn insert_batch(catalog: &dyn Catalog, terms: &[String]) -> Result<i32, EngineError> {
    if terms.is_empty() {
        return Ok(0);
    }

    let mut tokenized = Vec::with_capacity(terms.len());
    for term in terms {
        tokenized.push(catalog.tokenize(term).await?);
    }

    let dim = tokenized[0].normalized.len();

    let codebook_name = catalog.resolve_table(TableRole::Codebook).await?;
    let loaded = catalog.load_codebook_with_counts(&codebook_name).await?;
    let mut codebook = Codebook::from_loaded(loaded, dim)?;

    let residual_codebook_name = catalog.resolve_table(TableRole::ResidualCodebook).await?;
    let residual_loaded = catalog
        .load_codebook_with_counts(&residual_codebook_name)
        .await?;
    let mut residual_codebook = Codebook::from_loaded(residual_loaded, dim)?;

    let coarse = catalog.load_coarse_quantizer().await?;

    let mut pq_rows = Vec::with_capacity(tokenized.len());
    let mut residual_rows = Vec::with_capacity(tokenized.len());
    let mut normalized_rows = Vec::with_capacity(tokenized.len());
    let mut original_rows = Vec::with_capacity(tokenized.len());

    for t in &tokenized {
        let coarse_id = nearest_coarse(&t.normalized, &coarse)?;
        let coarse_vector = &coarse
            .iter()
            .find(|c| c.id == coarse_id)
            .expect("nearest_coarse returned an id present in coarse")
            .vector;
        let residual = pq_distance::subtract(&t.normalized, coarse_vector);

        let pq_codes = codebook.encode(&t.normalized);
        let residual_codes = residual_codebook.encode(&residual);

        codebook.online_update(&t.normalized, &pq_codes);
        residual_codebook.online_update(&residual, &residual_codes);

        pq_rows.push(QuantizationRow {
            id: t.token,
            codes: pq_codes,
        });
        residual_rows.push(ResidualQuantizationRow {
            id: t.token,
            codes: residual_codes,
            coarse_id,
        });
        normalized_rows.push(VectorRow {
            id: t.token,
            vector: t.normalized.clone(),
        });
        original_rows.push(VectorRow {
            id: t.token,
            vector: t.unnormalized.clone(),
        });
    }

    let quant_name = catalog.resolve_table(TableRole::PqQuantization).await?;
    catalog.insert_quantization(&quant_name, pq_rows).await?;

    let residual_quant_name = catalog
        .resolve_table(TableRole::ResidualQuantization)
        .await?;
    catalog
        .insert_residual_quantization(&residual_quant_name, residual_rows)
        .await?;

    let normalized_name = catalog.resolve_table(TableRole::Normalized).await?;
    catalog
        .insert_vectors(&normalized_name, normalized_rows)
        .await?;

    let original_name = catalog.resolve_table(TableRole::Original).await?;
    catalog.insert_vectors(&original_name, original_rows).await?;

    catalog
        .upsert_codebook(&codebook_name, codebook.to_entries())
        .await?;
    catalog
        .upsert_codebook(&residual_codebook_name, residual_codebook.to_entries())
        .await?;

    Ok(0)
}

fn nearest_coarse(vector: &[f32], coarse: &[VectorRow]) -> Result<Id, EngineError> {
    coarse
        .iter()
        .map(|c| (c.id, pq_distance::squared_euclidean(vector, &c.vector)))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
        .map(|(id, _)| id)
        .ok_or_else(|| EngineError::InvalidArgument("coarse quantizer is empty".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pq_catalog::memory::InMemoryCatalog;
    use pq_types::CodebookEntry;

    fn seed_catalog() -> InMemoryCatalog {
        let catalog = InMemoryCatalog::new();
        let entries = vec![
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
        ];
        catalog.set_pq_codebook(2, 2, entries.clone());
        catalog.set_residual_codebook(2, 2, entries);
        catalog.set_coarse_quantizer(vec![pq_types::VectorRow {
            id: 0,
            vector: vec![0.0, 0.0, 0.0, 0.0],
        }]);
        catalog
    }

    #[tokio::test]
    async fn insert_batch_persists_vectors_and_codes() {
        let catalog = seed_catalog();
        let id = catalog.register_term("cat", vec![1.0, 0.0, 0.0, 1.0], vec![2.0, 0.0, 0.0, 2.0]);

        let result = insert_batch(&catalog, &["cat".to_string()]).await.unwrap();
        assert_eq!(result, 0);

        let pq_rows = catalog
            .load_quantization_by_ids("pq_quantization", &[id])
            .await
            .unwrap();
        assert_eq!(pq_rows.len(), 1);
        assert_eq!(pq_rows[0].codes.len(), 2);

        let normalized = catalog
            .load_vectors_by_id("normalized_vectors", &[id])
            .await
            .unwrap();
        assert_eq!(normalized.len(), 1);

        let original = catalog
            .load_vectors_by_id("original_vectors", &[id])
            .await
            .unwrap();
        assert_eq!(original.len(), 1);
    }

    #[tokio::test]
    async fn insert_batch_does_not_mutate_existing_rows_for_duplicate_vector() {
        let catalog = seed_catalog();
        let first_id =
            catalog.register_term("cat", vec![1.0, 0.0, 0.0, 1.0], vec![2.0, 0.0, 0.0, 2.0]);
        insert_batch(&catalog, &["cat".to_string()]).await.unwrap();

        let second_id =
            catalog.register_term("kitten", vec![1.0, 0.0, 0.0, 1.0], vec![2.0, 0.0, 0.0, 2.0]);
        insert_batch(&catalog, &["kitten".to_string()])
            .await
            .unwrap();

        let first_row = catalog
            .load_quantization_by_ids("pq_quantization", &[first_id])
            .await
            .unwrap();
        let second_row = catalog
            .load_quantization_by_ids("pq_quantization", &[second_id])
            .await
            .unwrap();
        assert_eq!(first_row[0].codes, second_row[0].codes);
    }
}
