//! PQ / IVFADC vector search engine core.
//!
//! This crate implements PQ codebook encoding, the IVFADC index, asymmetric
//! distance computation, k-NN query execution, k-means over PQ codes,
//! nearest-group assignment, and incremental insertion. It depends only on
//! [`pq_catalog::Catalog`] for I/O — no SQL, no marshalling, no
//! process-level glue.
pub mod batch;
pub mod cluster;
pub mod coarse;
pub mod codebook;
pub mod config;
pub mod error;
pub mod lut;
pub mod search;
pub mod topk;
pub mod visited;

pub use batch::ivfadc_batch_search;
pub use cluster::{cluster_pq, grouping_pq, Cluster};
pub use config::PqEngineConfig;
pub use error::EngineError;
pub use insert::insert_batch;
pub use search::{ivfadc_search, pq_search, pq_search_in, pq_search_in_cplx};

mod insert;
