//! Bulk mutation engine shared by the update and delete orchestrators.
//!
//! Both orchestrators follow the same state machine — validate, select,
//! batch/execute, finalize — and differ only in validation order and the
//! per-document action. The engine here owns batching, the concurrency
//! cap, counter folding, progress reporting, and the stop-on-failure
//! queue flag. Counters fold at a single completion-handling point, so
//! concurrent batch completions never race a progress read.

mod delete;
mod update;

pub use delete::BulkDeleteOptions;
pub use update::{BulkUpdateOptions, UpdateFn, UpdateSource};

pub(crate) use delete::run_bulk_delete;
pub(crate) use update::run_bulk_update;

use std::future::Future;
use std::time::Instant;

use futures::future::join_all;
use serde_json::Value;

use vellum_proto::result::{BulkError, BulkPerformance, BulkProgress};

use crate::batch::{chunk, BatchControl, BatchProcessor};
use crate::config::BulkConfig;

/// Callback fired once per completed batch with recomputed totals.
pub type ProgressCallback = Box<dyn Fn(&BulkProgress) + Send + Sync>;

/// Callback fired for each document abandoned after retry exhaustion.
pub type ErrorCallback = Box<dyn Fn(&BulkError) + Send + Sync>;

/// Outcome of one document's mutation attempt.
pub(crate) enum DocOutcome {
    /// The mutation succeeded, accruing the reported request charge.
    Applied { charge: f64 },
    /// The update function elected to skip this document.
    Skipped,
    /// The document was abandoned.
    Failed(BulkError),
}

/// Running totals folded as batches complete.
#[derive(Debug, Default)]
pub(crate) struct EngineReport {
    pub applied: u64,
    pub failed: u64,
    pub skipped: u64,
    pub charge: f64,
    pub errors: Vec<BulkError>,
    /// Message of the failure that set the stop flag, when the run
    /// aborted.
    pub aborted: Option<String>,
}

impl EngineReport {
    pub fn processed(&self) -> u64 {
        self.applied + self.failed + self.skipped
    }

    /// Recompute the performance block from the running totals.
    pub fn performance(&self, started: Instant) -> BulkPerformance {
        let duration = started.elapsed();
        let processed = self.processed();
        let seconds = duration.as_secs_f64();
        BulkPerformance {
            request_charge: self.charge,
            duration,
            docs_per_second: if seconds > 0.0 {
                processed as f64 / seconds
            } else {
                0.0
            },
            charge_per_document: if processed > 0 {
                self.charge / processed as f64
            } else {
                0.0
            },
        }
    }
}

/// Run every document through the per-document action, batched and
/// capped, folding outcomes into an [`EngineReport`].
///
/// When `continue_on_error` is false, the first failed document sets the
/// stop flag: no further batches are admitted, in-flight batches run to
/// completion, and their outcomes still fold into the report.
pub(crate) async fn run_batches<A, Fut>(
    docs: Vec<Value>,
    config: &BulkConfig,
    continue_on_error: bool,
    on_progress: Option<&ProgressCallback>,
    on_error: Option<&ErrorCallback>,
    started: Instant,
    action: A,
) -> EngineReport
where
    A: Fn(Value) -> Fut,
    Fut: Future<Output = DocOutcome>,
{
    let total = docs.len() as u64;
    let batches = chunk(docs, config.batch_size);
    let total_batches = batches.len();
    let processor = BatchProcessor::new(config.max_concurrency);

    let mut report = EngineReport::default();
    let mut batches_completed = 0usize;

    let action = &action;
    processor
        .process(
            batches,
            |_, batch| async move {
                // Siblings within a batch run to completion
                // independently; one failure never short-circuits the
                // rest.
                join_all(batch.into_iter().map(action)).await
            },
            |_, outcomes: Vec<DocOutcome>| {
                for outcome in outcomes {
                    match outcome {
                        DocOutcome::Applied { charge } => {
                            report.applied += 1;
                            report.charge += charge;
                        }
                        DocOutcome::Skipped => report.skipped += 1,
                        DocOutcome::Failed(error) => {
                            report.failed += 1;
                            if let Some(callback) = on_error {
                                callback(&error);
                            }
                            if !continue_on_error && report.aborted.is_none() {
                                report.aborted = Some(error.message.clone());
                            }
                            report.errors.push(error);
                        }
                    }
                }
                batches_completed += 1;
                if let Some(callback) = on_progress {
                    callback(&progress_snapshot(
                        &report,
                        batches_completed,
                        total_batches,
                        total,
                        started,
                    ));
                }
                if report.aborted.is_some() {
                    BatchControl::Drain
                } else {
                    BatchControl::Continue
                }
            },
        )
        .await;

    report
}

/// Build one progress snapshot, every figure recomputed from scratch.
fn progress_snapshot(
    report: &EngineReport,
    batches_completed: usize,
    total_batches: usize,
    total: u64,
    started: Instant,
) -> BulkProgress {
    let processed = report.processed();
    let elapsed = started.elapsed();
    let seconds = elapsed.as_secs_f64();
    BulkProgress {
        batches_completed,
        total_batches,
        processed,
        total,
        percent: if total > 0 {
            processed as f64 * 100.0 / total as f64
        } else {
            100.0
        },
        request_charge: report.charge,
        elapsed,
        docs_per_second: if seconds > 0.0 {
            processed as f64 / seconds
        } else {
            0.0
        },
        charge_per_document: if processed > 0 {
            report.charge / processed as f64
        } else {
            0.0
        },
    }
}

/// Render a partition-key value the way error records carry it.
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Resolve a document's partition-key value for an error record,
/// falling back to `"unknown"`.
pub(crate) fn partition_key_display(doc: &Value, field: &str) -> String {
    match doc.get(field) {
        Some(value) if !value.is_null() => display_value(value),
        _ => "unknown".to_string(),
    }
}
