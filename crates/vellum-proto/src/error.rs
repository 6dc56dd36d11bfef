//! Descriptor validation errors.

use thiserror::Error;

/// Descriptor-level errors.
#[derive(Debug, Error)]
pub enum Error {
    /// An aggregate specification with no operations.
    #[error("aggregate specification is empty: request at least one of count, sum, avg, min, max")]
    EmptyAggregateSpec,

    /// A filter descriptor that could not be interpreted.
    #[error("invalid filter descriptor: {0}")]
    InvalidFilter(String),
}
