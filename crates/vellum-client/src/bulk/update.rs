//! Bulk update orchestrator: validate, select, batch/execute, finalize.

use std::time::Instant;

use serde_json::{Map, Value};
use tracing::{info, warn};

use vellum_core::query::QueryBuilder;
use vellum_proto::filter::Filter;
use vellum_proto::result::{BulkError, BulkProgress, BulkUpdateResult};

use crate::bulk::{
    display_value, partition_key_display, run_batches, DocOutcome, EngineReport, ErrorCallback,
    ProgressCallback,
};
use crate::config::BulkConfig;
use crate::container::{ContainerClient, PartitionScope};
use crate::error::Error;
use crate::retry::RetryPolicy;
use crate::transport::{document_path, Method, Transport};

/// Per-document update function: returns the patch to merge, or `None`
/// to skip the document.
pub type UpdateFn = Box<dyn Fn(&Value) -> Option<Map<String, Value>> + Send + Sync>;

/// How the replacement payload for each document is produced.
pub enum UpdateSource {
    /// A static patch shallow-merged onto every target document.
    Patch(Map<String, Value>),
    /// A per-document function computing the patch.
    Compute(UpdateFn),
}

/// Options for a bulk update run.
pub struct BulkUpdateOptions {
    pub(crate) filter: Option<Filter>,
    pub(crate) update: UpdateSource,
    pub(crate) scope: Option<PartitionScope>,
    pub(crate) config: BulkConfig,
    pub(crate) continue_on_error: bool,
    pub(crate) on_progress: Option<ProgressCallback>,
    pub(crate) on_error: Option<ErrorCallback>,
}

impl BulkUpdateOptions {
    /// Update every target with a static patch.
    pub fn patch(patch: Map<String, Value>) -> Self {
        Self::from_source(UpdateSource::Patch(patch))
    }

    /// Update each target with a per-document function. Returning `None`
    /// skips the document.
    pub fn compute(
        update: impl Fn(&Value) -> Option<Map<String, Value>> + Send + Sync + 'static,
    ) -> Self {
        Self::from_source(UpdateSource::Compute(Box::new(update)))
    }

    fn from_source(update: UpdateSource) -> Self {
        Self {
            filter: None,
            update,
            scope: None,
            config: BulkConfig::default(),
            continue_on_error: false,
            on_progress: None,
            on_error: None,
        }
    }

    /// Select targets with this filter.
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Scope the run to one partition-key value.
    pub fn within_partition(mut self, key: impl Into<Value>) -> Self {
        self.scope = Some(PartitionScope::key(key));
        self
    }

    /// Opt the run into cross-partition execution.
    pub fn cross_partition(mut self) -> Self {
        self.scope = Some(PartitionScope::CrossPartition);
        self
    }

    /// Set the batch/concurrency/retry knobs.
    pub fn with_config(mut self, config: BulkConfig) -> Self {
        self.config = config;
        self
    }

    /// Keep processing after per-document failures instead of aborting
    /// on the first one.
    pub fn continue_on_error(mut self, keep_going: bool) -> Self {
        self.continue_on_error = keep_going;
        self
    }

    /// Receive a progress snapshot after each completed batch.
    pub fn on_progress(mut self, callback: impl Fn(&BulkProgress) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(callback));
        self
    }

    /// Receive each per-document failure as it is recorded.
    pub fn on_error(mut self, callback: impl Fn(&BulkError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }
}

/// Run a bulk update against one container.
pub(crate) async fn run_bulk_update<T: Transport>(
    client: &ContainerClient<T>,
    options: BulkUpdateOptions,
) -> Result<BulkUpdateResult, Error> {
    let scope = options.scope.clone().ok_or(Error::PartitionScopeRequired)?;
    let started = Instant::now();

    let mut builder = QueryBuilder::new();
    if let Some(filter) = &options.filter {
        builder = builder.with_filter(filter.clone());
    }
    let docs = client.query(&builder, &scope).await?;
    info!(
        container = %client.container(),
        targets = docs.len(),
        "bulk update target set selected"
    );

    if docs.is_empty() {
        return Ok(BulkUpdateResult {
            success: true,
            performance: EngineReport::default().performance(started),
            ..Default::default()
        });
    }

    let retry = RetryPolicy::new(options.config.max_attempts, options.config.retry_backoff);
    let report = run_batches(
        docs,
        &options.config,
        options.continue_on_error,
        options.on_progress.as_ref(),
        options.on_error.as_ref(),
        started,
        |doc| apply_update(client, &retry, &options.update, doc),
    )
    .await;

    let aborted = report.aborted.clone();
    let result = BulkUpdateResult {
        success: report.failed == 0,
        updated: report.applied,
        failed: report.failed,
        skipped: report.skipped,
        performance: report.performance(started),
        errors: report.errors,
    };
    info!(
        container = %client.container(),
        updated = result.updated,
        failed = result.failed,
        skipped = result.skipped,
        "bulk update finished"
    );

    match aborted {
        Some(message) => {
            warn!(container = %client.container(), %message, "bulk update aborted");
            Err(Error::BulkUpdateAborted {
                message,
                partial: Box::new(result),
            })
        }
        None => Ok(result),
    }
}

/// Mutate one document: compute the payload, resolve its partition key,
/// and replace it under the retry policy.
async fn apply_update<T: Transport>(
    client: &ContainerClient<T>,
    retry: &RetryPolicy,
    source: &UpdateSource,
    doc: Value,
) -> DocOutcome {
    let id = match doc.get("id").and_then(Value::as_str) {
        Some(id) => id.to_string(),
        None => {
            return DocOutcome::Failed(validation_failure(
                "unknown",
                partition_key_display(&doc, client.partition_key_field()),
                "document is missing an id field",
            ))
        }
    };

    let payload = match source {
        UpdateSource::Patch(patch) => merge_patch(&doc, patch),
        UpdateSource::Compute(compute) => match compute(&doc) {
            Some(patch) => merge_patch(&doc, &patch),
            None => return DocOutcome::Skipped,
        },
    };
    let payload = match payload {
        Ok(payload) => payload,
        Err(message) => {
            return DocOutcome::Failed(validation_failure(
                &id,
                partition_key_display(&doc, client.partition_key_field()),
                &message,
            ))
        }
    };

    let partition_key = match doc.get(client.partition_key_field()) {
        Some(value) if !value.is_null() => value.clone(),
        _ => {
            return DocOutcome::Failed(validation_failure(
                &id,
                "unknown".to_string(),
                &format!(
                    "partition key field {:?} is missing from the document",
                    client.partition_key_field()
                ),
            ))
        }
    };

    let path = document_path(client.database(), client.container(), &id);
    let attempt = retry
        .run(|| {
            client.transport().request(
                Method::Put,
                &path,
                Some(&payload),
                Some(&partition_key),
                false,
            )
        })
        .await;

    match attempt {
        Ok(response) => DocOutcome::Applied {
            charge: response.request_charge,
        },
        Err(failure) => {
            let retriable = failure.error.is_retriable();
            DocOutcome::Failed(BulkError {
                id,
                partition_key: display_value(&partition_key),
                message: failure.error.message,
                status: failure.error.status,
                code: failure.error.code,
                retriable,
                attempts: failure.attempts,
            })
        }
    }
}

/// Shallow-merge a patch onto a document, keeping unpatched fields.
fn merge_patch(doc: &Value, patch: &Map<String, Value>) -> Result<Value, String> {
    let mut merged = match doc.as_object() {
        Some(object) => object.clone(),
        None => return Err("target document is not a JSON object".to_string()),
    };
    for (key, value) in patch {
        merged.insert(key.clone(), value.clone());
    }
    Ok(Value::Object(merged))
}

/// A failure produced before any request was attempted.
fn validation_failure(id: &str, partition_key: String, message: &str) -> BulkError {
    BulkError {
        id: id.to_string(),
        partition_key,
        message: message.to_string(),
        status: None,
        code: None,
        retriable: false,
        attempts: 0,
    }
}
