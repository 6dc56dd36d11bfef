//! Bulk delete orchestrator.
//!
//! Same state machine as the update orchestrator with two differences:
//! an explicit confirmation flag is checked before partition-scope
//! validation, and the per-document action is a delete — there is no
//! payload computation and no skip path.

use std::time::Instant;

use serde_json::Value;
use tracing::{info, warn};

use vellum_core::query::QueryBuilder;
use vellum_proto::filter::Filter;
use vellum_proto::result::{BulkDeleteResult, BulkError, BulkProgress};

use crate::bulk::{
    display_value, run_batches, DocOutcome, EngineReport, ErrorCallback, ProgressCallback,
};
use crate::config::BulkConfig;
use crate::container::{ContainerClient, PartitionScope};
use crate::error::Error;
use crate::retry::RetryPolicy;
use crate::transport::{document_path, Method, Transport};

/// Options for a bulk delete run.
pub struct BulkDeleteOptions {
    pub(crate) filter: Option<Filter>,
    pub(crate) scope: Option<PartitionScope>,
    pub(crate) confirm: bool,
    pub(crate) config: BulkConfig,
    pub(crate) continue_on_error: bool,
    pub(crate) on_progress: Option<ProgressCallback>,
    pub(crate) on_error: Option<ErrorCallback>,
}

impl BulkDeleteOptions {
    /// Create options; deletion still requires [`confirm`](Self::confirm).
    pub fn new() -> Self {
        Self {
            filter: None,
            scope: None,
            confirm: false,
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

    /// Acknowledge that the selected documents will be removed.
    pub fn confirm(mut self, confirmed: bool) -> Self {
        self.confirm = confirmed;
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

impl Default for BulkDeleteOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a bulk delete against one container.
pub(crate) async fn run_bulk_delete<T: Transport>(
    client: &ContainerClient<T>,
    options: BulkDeleteOptions,
) -> Result<BulkDeleteResult, Error> {
    // Confirmation is checked before partition-scope validation.
    if !options.confirm {
        return Err(Error::ConfirmationRequired);
    }
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
        "bulk delete target set selected"
    );

    if docs.is_empty() {
        return Ok(BulkDeleteResult {
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
        |doc| apply_delete(client, &retry, doc),
    )
    .await;

    let aborted = report.aborted.clone();
    let result = BulkDeleteResult {
        success: report.failed == 0,
        deleted: report.applied,
        failed: report.failed,
        performance: report.performance(started),
        errors: report.errors,
    };
    info!(
        container = %client.container(),
        deleted = result.deleted,
        failed = result.failed,
        "bulk delete finished"
    );

    match aborted {
        Some(message) => {
            warn!(container = %client.container(), %message, "bulk delete aborted");
            Err(Error::BulkDeleteAborted {
                message,
                partial: Box::new(result),
            })
        }
        None => Ok(result),
    }
}

/// Delete one document under the retry policy.
async fn apply_delete<T: Transport>(
    client: &ContainerClient<T>,
    retry: &RetryPolicy,
    doc: Value,
) -> DocOutcome {
    let id = match doc.get("id").and_then(Value::as_str) {
        Some(id) => id.to_string(),
        None => {
            return DocOutcome::Failed(BulkError {
                id: "unknown".to_string(),
                partition_key: crate::bulk::partition_key_display(
                    &doc,
                    client.partition_key_field(),
                ),
                message: "document is missing an id field".to_string(),
                status: None,
                code: None,
                retriable: false,
                attempts: 0,
            })
        }
    };

    let partition_key = match doc.get(client.partition_key_field()) {
        Some(value) if !value.is_null() => value.clone(),
        _ => {
            return DocOutcome::Failed(BulkError {
                id,
                partition_key: "unknown".to_string(),
                message: format!(
                    "partition key field {:?} is missing from the document",
                    client.partition_key_field()
                ),
                status: None,
                code: None,
                retriable: false,
                attempts: 0,
            })
        }
    };

    let path = document_path(client.database(), client.container(), &id);
    let attempt = retry
        .run(|| {
            client
                .transport()
                .request(Method::Delete, &path, None, Some(&partition_key), false)
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
