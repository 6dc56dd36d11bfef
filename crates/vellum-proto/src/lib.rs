//! Vellum Proto - Descriptor and result types for the Vellum query layer.
//!
//! This crate defines the structured descriptors callers use to describe
//! document selection, aggregation, and grouping, plus the typed result
//! shapes the execution layer hands back. Descriptors are plain values
//! with chainable builders; compilation lives in `vellum-core`.

pub mod aggregate;
pub mod error;
pub mod filter;
pub mod query;
pub mod result;

pub use aggregate::{alias, AggregateOp, AggregateSpec, CountSpec, GroupBySpec};
pub use error::Error;
pub use filter::{Condition, Filter, Op};
pub use query::{OrderDirection, OrderSpec};
pub use result::{
    AggregateResult, BulkDeleteResult, BulkError, BulkPerformance, BulkProgress, BulkUpdateResult,
    CountResult, GroupRow,
};
