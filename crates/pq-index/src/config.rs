//! Structural parameters configured at engine construction time. `M`/`K`
//! are fixed by the stored codebook, never query-time parameters — this
//! config only records the dimensionality the engine was built for, used to
//! validate `D mod M == 0` at codebook load time.
use pq_config::{registry::Registry, Configurable};
use pq_error::{ErrorCodes, PqError};
use serde::Deserialize;
use thiserror::Error;

#[derive(Deserialize, Debug, Clone)]
pub struct PqEngineConfig {
    pub dimensionality: usize,
    /// Lloyd iteration budget for `cluster_pq`. Kept as a config knob
    /// rather than a literal so tests can shrink it; defaults to 10.
    #[serde(default = "default_kmeans_iterations")]
    pub kmeans_iterations: usize,
}

fn default_kmeans_iterations() -> usize {
    10
}

#[derive(Debug, Error)]
pub enum PqEngineConfigError {
    #[error("dimensionality must be greater than zero")]
    ZeroDimensionality,
}

impl PqError for PqEngineConfigError {
    fn code(&self) -> ErrorCodes {
        ErrorCodes::InvalidArgument
    }
}

#[async_trait::async_trait]
impl Configurable<PqEngineConfig, PqEngineConfigError> for PqEngineConfig {
    async fn try_from_config(
        config: &PqEngineConfig,
        _registry: &Registry,
    ) -> Result<Self, PqEngineConfigError> {
        if config.dimensionality == 0 {
            return Err(PqEngineConfigError::ZeroDimensionality);
        }
        Ok(config.clone())
    }
}
