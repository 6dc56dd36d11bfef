//! Compiler and mapper error types.

use thiserror::Error;

/// Core compilation and mapping errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Descriptor validation failed.
    #[error(transparent)]
    Proto(#[from] vellum_proto::Error),

    /// A returned aggregate row could not be reshaped.
    #[error("aggregate mapping error: {0}")]
    Mapping(String),
}
