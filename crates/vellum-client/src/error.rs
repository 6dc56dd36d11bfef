//! Client error taxonomy.

use thiserror::Error;

use vellum_proto::result::{BulkDeleteResult, BulkUpdateResult};

use crate::transport::StoreError;

/// Client errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A bulk operation without a partition scope or cross-partition
    /// opt-in.
    #[error("partition key required: scope the operation with a partition key or opt into cross-partition execution")]
    PartitionScopeRequired,

    /// A bulk delete without its confirmation flag.
    #[error("bulk delete requires explicit confirmation: set confirm(true) to acknowledge that the selected documents will be removed")]
    ConfirmationRequired,

    /// Descriptor validation or result mapping failed.
    #[error(transparent)]
    Compile(#[from] vellum_core::Error),

    /// The store rejected or failed a request.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A cross-partition query failed. The common cause is querying an
    /// empty or unseeded container; the original error is preserved.
    #[error("cross-partition query failed; verify the container exists and holds documents: {source}")]
    CrossPartition {
        /// The underlying store failure.
        #[source]
        source: StoreError,
    },

    /// A bulk update stopped on its first terminal failure.
    #[error("bulk update aborted: {message}; {} failed and {} updated before the stop", .partial.failed, .partial.updated)]
    BulkUpdateAborted {
        /// Message of the failure that triggered the stop.
        message: String,
        /// Counters folded for every batch in flight when the run
        /// stopped.
        partial: Box<BulkUpdateResult>,
    },

    /// A bulk delete stopped on its first terminal failure.
    #[error("bulk delete aborted: {message}; {} failed and {} deleted before the stop", .partial.failed, .partial.deleted)]
    BulkDeleteAborted {
        /// Message of the failure that triggered the stop.
        message: String,
        /// Counters folded for every batch in flight when the run
        /// stopped.
        partial: Box<BulkDeleteResult>,
    },
}

impl Error {
    /// Whether the underlying failure is worth retrying. Validation and
    /// abort errors never are.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Error::Store(e) if e.is_retriable())
    }
}
