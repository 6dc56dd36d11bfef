//! Container client: query execution against one document container.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::debug;

use vellum_core::query::{AggregateBuilder, CompiledQuery, QueryBuilder};
use vellum_proto::aggregate::{AggregateSpec, GroupBySpec};
use vellum_proto::filter::Filter;
use vellum_proto::result::{AggregateResult, BulkDeleteResult, BulkUpdateResult, GroupRow};

use crate::bulk::{run_bulk_delete, run_bulk_update, BulkDeleteOptions, BulkUpdateOptions};
use crate::error::Error;
use crate::transport::{documents_path, Method, Transport};

/// How a query or bulk operation is scoped across partitions.
///
/// Every operation must either name a partition key or opt into
/// cross-partition execution explicitly; there is no implicit fan-out.
#[derive(Debug, Clone, PartialEq)]
pub enum PartitionScope {
    /// Execute within the partition holding this key value.
    Key(Value),
    /// Explicit opt-in to cross-partition execution.
    CrossPartition,
}

impl PartitionScope {
    /// Scope to a single partition-key value.
    pub fn key(value: impl Into<Value>) -> Self {
        PartitionScope::Key(value.into())
    }

    /// The partition key to send, when scoped.
    pub(crate) fn partition_key(&self) -> Option<&Value> {
        match self {
            PartitionScope::Key(value) => Some(value),
            PartitionScope::CrossPartition => None,
        }
    }

    /// Whether the request opts into cross-partition execution.
    pub(crate) fn cross_partition(&self) -> bool {
        matches!(self, PartitionScope::CrossPartition)
    }
}

/// A client bound to one container, executing compiled statements and
/// bulk mutations through the transport collaborator.
pub struct ContainerClient<T: Transport> {
    transport: Arc<T>,
    database: String,
    container: String,
    partition_key_field: String,
}

impl<T: Transport> ContainerClient<T> {
    /// Create a client for a container.
    ///
    /// `partition_key_field` names the document field holding the
    /// partition-key value (used to resolve per-document keys during
    /// bulk mutation).
    pub fn new(
        transport: T,
        database: impl Into<String>,
        container: impl Into<String>,
        partition_key_field: impl Into<String>,
    ) -> Self {
        Self::from_shared(
            Arc::new(transport),
            database,
            container,
            partition_key_field,
        )
    }

    /// Create a client sharing an existing transport.
    pub fn from_shared(
        transport: Arc<T>,
        database: impl Into<String>,
        container: impl Into<String>,
        partition_key_field: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            database: database.into(),
            container: container.into(),
            partition_key_field: partition_key_field.into(),
        }
    }

    /// The database id this client addresses.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// The container id this client addresses.
    pub fn container(&self) -> &str {
        &self.container
    }

    /// The document field holding the partition-key value.
    pub fn partition_key_field(&self) -> &str {
        &self.partition_key_field
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Execute a built query and return the matching documents.
    pub async fn query(
        &self,
        builder: &QueryBuilder,
        scope: &PartitionScope,
    ) -> Result<Vec<Value>, Error> {
        let compiled = builder.build();
        let (rows, _) = self.execute(&compiled, scope).await?;
        Ok(rows)
    }

    /// Count matching documents, unwrapping the store's single scalar.
    pub async fn count(
        &self,
        filter: Option<&Filter>,
        scope: &PartitionScope,
    ) -> Result<i64, Error> {
        let compiled = AggregateBuilder::count(filter);
        let (rows, _) = self.execute(&compiled, scope).await?;
        match rows.first() {
            None => Ok(0),
            Some(value) => value
                .as_i64()
                .or_else(|| {
                    value
                        .as_f64()
                        .filter(|f| f.fract() == 0.0)
                        .map(|f| f as i64)
                })
                .ok_or_else(|| {
                    Error::Compile(vellum_core::Error::Mapping(format!(
                        "count query returned a non-integer scalar: {value}"
                    )))
                }),
        }
    }

    /// Run an aggregate operation set and reshape the flat row.
    ///
    /// Fails before any network call when the specification is empty.
    pub async fn aggregate(
        &self,
        spec: &AggregateSpec,
        filter: Option<&Filter>,
        scope: &PartitionScope,
    ) -> Result<AggregateResult, Error> {
        let compiled = AggregateBuilder::aggregate(spec, filter)?;
        let (rows, _) = self.execute(&compiled, scope).await?;
        let row = rows
            .into_iter()
            .next()
            .unwrap_or_else(|| Value::Object(Map::new()));
        Ok(vellum_core::query::parse_aggregate_result(&row, spec)?)
    }

    /// Run a group-by and reshape each grouped row, preserving row order.
    pub async fn group_by(
        &self,
        group: &GroupBySpec,
        filter: Option<&Filter>,
        scope: &PartitionScope,
    ) -> Result<Vec<GroupRow>, Error> {
        let compiled = AggregateBuilder::group_by(group, filter)?;
        let (rows, _) = self.execute(&compiled, scope).await?;
        Ok(vellum_core::query::parse_group_by_results(&rows, group)?)
    }

    /// Update every document matching the options' filter.
    pub async fn bulk_update(
        &self,
        options: BulkUpdateOptions,
    ) -> Result<BulkUpdateResult, Error> {
        run_bulk_update(self, options).await
    }

    /// Delete every document matching the options' filter.
    pub async fn bulk_delete(
        &self,
        options: BulkDeleteOptions,
    ) -> Result<BulkDeleteResult, Error> {
        run_bulk_delete(self, options).await
    }

    /// Execute one compiled statement, returning rows and the request
    /// charge. Cross-partition failures are re-raised enriched; the
    /// original error is kept as the source.
    pub(crate) async fn execute(
        &self,
        compiled: &CompiledQuery,
        scope: &PartitionScope,
    ) -> Result<(Vec<Value>, f64), Error> {
        let body = json!({
            "query": compiled.text,
            "parameters": compiled.parameters,
        });
        let path = documents_path(&self.database, &self.container);
        debug!(
            container = %self.container,
            query = %compiled.text,
            parameters = compiled.parameters.len(),
            cross_partition = scope.cross_partition(),
            "executing query"
        );

        let response = self
            .transport
            .request(
                Method::Post,
                &path,
                Some(&body),
                scope.partition_key(),
                scope.cross_partition(),
            )
            .await
            .map_err(|source| {
                if scope.cross_partition() {
                    Error::CrossPartition { source }
                } else {
                    Error::Store(source)
                }
            })?;

        Ok((rows_from_body(response.body), response.request_charge))
    }
}

/// Unwrap a query response body: either a bare array (VALUE projections)
/// or an object carrying a `Documents` array.
fn rows_from_body(body: Value) -> Vec<Value> {
    match body {
        Value::Array(rows) => rows,
        Value::Object(mut object) => match object.remove("Documents") {
            Some(Value::Array(rows)) => rows,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}
