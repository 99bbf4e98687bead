pub mod registry;

use async_trait::async_trait;
use pq_error::PqError;
use registry::Registry;
use thiserror::Error;

/// Configures a struct from a deserialized config object plus the shared
/// [`Registry`]. Every component of the engine that needs construction-time
/// parameters (the PQ engine itself, the catalog handle) implements this.
#[async_trait]
pub trait Configurable<T, E = Box<dyn PqError>> {
    async fn try_from_config(config: &T, registry: &Registry) -> Result<Self, E>
    where
        Self: Sized;
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config error: {0}")]
    Figment(#[from] figment::Error),
}

impl PqError for ConfigError {
    fn code(&self) -> pq_error::ErrorCodes {
        pq_error::ErrorCodes::Internal
    }
}
