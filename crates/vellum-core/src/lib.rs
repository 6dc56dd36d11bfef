//! Vellum Core - Query compilation and aggregate result mapping.
//!
//! This crate turns structured descriptors from `vellum-proto` into
//! parameterized statements in the document store's SQL-like dialect,
//! and reshapes the flat rows the store returns. It performs no I/O;
//! execution lives in `vellum-client`.

pub mod error;
pub mod query;

pub use error::Error;
pub use query::{
    compile, parse_aggregate_result, parse_group_by_results, AggregateBuilder, CompiledPredicate,
    CompiledQuery, Parameter, QueryBuilder,
};

/// Re-export descriptor types.
pub use vellum_proto as proto;
