//! Typed result shapes returned to callers.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Result of a count operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CountResult {
    /// Total number of matching documents.
    Total(i64),
    /// Non-null count per selected field, in descriptor order.
    PerField(Vec<(String, i64)>),
}

impl CountResult {
    /// The total count, when this is a plain row count.
    pub fn total(&self) -> Option<i64> {
        match self {
            CountResult::Total(n) => Some(*n),
            CountResult::PerField(_) => None,
        }
    }
}

/// The nested result shape reconstructed from a flat aggregate row.
///
/// For sum/avg/min/max, a field that no matching document contributed to
/// is present with a JSON `null` value, never `0` and never absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    /// Count result, when requested.
    pub count: Option<CountResult>,
    /// Per-field sums, when requested.
    pub sum: Option<Map<String, Value>>,
    /// Per-field averages, when requested.
    pub avg: Option<Map<String, Value>>,
    /// Per-field minimums, when requested.
    pub min: Option<Map<String, Value>>,
    /// Per-field maximums, when requested.
    pub max: Option<Map<String, Value>>,
}

/// One grouped row: the grouping key values plus the aggregates computed
/// over that group. Row order is exactly the order the store returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRow {
    /// Grouped field values, keyed by field name, in group-field order.
    pub group: Map<String, Value>,
    /// Aggregates for this group.
    pub aggregates: AggregateResult,
}

/// A per-document failure captured during a bulk run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkError {
    /// Document id, or `"unknown"` when the document carries none.
    pub id: String,
    /// Partition-key value rendered as a string, or `"unknown"`.
    pub partition_key: String,
    /// Failure message.
    pub message: String,
    /// Remote status code, when the store reported one.
    pub status: Option<u16>,
    /// Store-specific error code, when present.
    pub code: Option<String>,
    /// Whether the failure was classified retriable.
    pub retriable: bool,
    /// Attempt count at which the document was abandoned.
    pub attempts: u32,
}

/// Cost and throughput figures for a completed bulk run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkPerformance {
    /// Total request-charge consumed by mutations.
    pub request_charge: f64,
    /// Wall-clock duration of the run.
    pub duration: Duration,
    /// Documents processed per second.
    pub docs_per_second: f64,
    /// Average request charge per processed document.
    pub charge_per_document: f64,
}

/// Snapshot handed to the progress callback after each completed batch.
///
/// Every figure is recomputed from the running totals at callback time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkProgress {
    /// Batches completed so far; monotonically non-decreasing across
    /// successive callbacks.
    pub batches_completed: usize,
    /// Total number of batches in the run.
    pub total_batches: usize,
    /// Documents processed so far (applied + failed + skipped).
    pub processed: u64,
    /// Total documents in the target set.
    pub total: u64,
    /// Percentage of the target set processed.
    pub percent: f64,
    /// Request charge accumulated so far.
    pub request_charge: f64,
    /// Time elapsed since the run started.
    pub elapsed: Duration,
    /// Documents processed per second so far.
    pub docs_per_second: f64,
    /// Average request charge per processed document so far.
    pub charge_per_document: f64,
}

/// Outcome of a bulk update run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkUpdateResult {
    /// True iff no document failed.
    pub success: bool,
    /// Documents successfully replaced.
    pub updated: u64,
    /// Documents abandoned after retry exhaustion or terminal failure.
    pub failed: u64,
    /// Documents skipped by the update function.
    pub skipped: u64,
    /// One record per failed document.
    pub errors: Vec<BulkError>,
    /// Cost and throughput figures.
    pub performance: BulkPerformance,
}

/// Outcome of a bulk delete run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkDeleteResult {
    /// True iff no document failed.
    pub success: bool,
    /// Documents successfully deleted.
    pub deleted: u64,
    /// Documents abandoned after retry exhaustion or terminal failure.
    pub failed: u64,
    /// One record per failed document.
    pub errors: Vec<BulkError>,
    /// Cost and throughput figures.
    pub performance: BulkPerformance,
}
