//! Vellum Client - Async query execution and bulk mutation engine.
//!
//! This crate executes statements compiled by `vellum-core` against a
//! document store through an external [`Transport`] collaborator, and
//! orchestrates large mutation sets with bounded concurrency, retry,
//! and progress/error reporting.
//!
//! # Quick Start
//!
//! ```ignore
//! use vellum_client::{BulkUpdateOptions, ContainerClient, PartitionScope};
//! use vellum_proto::{Filter, Op};
//!
//! # async fn run(transport: impl vellum_client::Transport) -> Result<(), vellum_client::Error> {
//! let client = ContainerClient::new(transport, "appdb", "users", "tenant");
//!
//! let patch = serde_json::json!({"status": "archived"});
//! let result = client
//!     .bulk_update(
//!         BulkUpdateOptions::patch(patch.as_object().cloned().unwrap())
//!             .with_filter(Filter::new().field_ops("age", vec![Op::gte(90)]))
//!             .within_partition("tenant-1"),
//!     )
//!     .await?;
//!
//! println!("updated {} documents", result.updated);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod bulk;
pub mod config;
pub mod container;
pub mod error;
pub mod retry;
pub mod transport;

pub use batch::{chunk, BatchControl, BatchProcessor};
pub use bulk::{
    BulkDeleteOptions, BulkUpdateOptions, ErrorCallback, ProgressCallback, UpdateFn, UpdateSource,
};
pub use config::BulkConfig;
pub use container::{ContainerClient, PartitionScope};
pub use error::Error;
pub use retry::{RetryFailure, RetryPolicy};
pub use transport::{
    document_path, documents_path, Method, StoreError, StoreResponse, Transport,
};

/// Re-export descriptor types.
pub use vellum_proto as proto;
/// Re-export the query builders callers hand to this crate.
pub use vellum_core::query::{AggregateBuilder, QueryBuilder};
