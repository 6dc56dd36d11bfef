//! Integration tests for the execution layer, driven through a scripted
//! mock transport.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{json, Map, Value};

use vellum_client::{
    BulkConfig, BulkDeleteOptions, BulkUpdateOptions, ContainerClient, Error, Method,
    PartitionScope, StoreError, StoreResponse, Transport,
};
use vellum_proto::aggregate::{AggregateSpec, GroupBySpec};
use vellum_proto::filter::{Filter, Op};
use vellum_proto::result::CountResult;

const QUERY_CHARGE: f64 = 2.3;
const MUTATION_CHARGE: f64 = 5.0;

#[derive(Debug, Clone)]
struct CallRecord {
    method: Method,
    path: String,
    body: Option<Value>,
    partition_key: Option<Value>,
    cross_partition: bool,
}

#[derive(Debug)]
struct FailScript {
    remaining: u32,
    status: u16,
    code: Option<String>,
}

#[derive(Debug, Default)]
struct MockState {
    query_docs: Vec<Value>,
    query_error: Option<StoreError>,
    bare_array: bool,
    failures: HashMap<String, FailScript>,
    calls: Vec<CallRecord>,
}

#[derive(Debug, Default)]
struct MockTransport {
    state: Mutex<MockState>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockTransport {
    fn with_docs(docs: Vec<Value>) -> Arc<Self> {
        let mock = Self::default();
        mock.state.lock().query_docs = docs;
        Arc::new(mock)
    }

    fn fail(&self, id: &str, times: u32, status: u16, code: Option<&str>) {
        self.state.lock().failures.insert(
            id.to_string(),
            FailScript {
                remaining: times,
                status,
                code: code.map(str::to_string),
            },
        );
    }

    fn fail_queries(&self, error: StoreError) {
        self.state.lock().query_error = Some(error);
    }

    fn set_bare_array(&self) {
        self.state.lock().bare_array = true;
    }

    fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    fn calls(&self) -> Vec<CallRecord> {
        self.state.lock().calls.clone()
    }

    fn mutation_calls(&self) -> Vec<CallRecord> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c.method, Method::Put | Method::Delete))
            .collect()
    }

    fn respond(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        partition_key: Option<Value>,
        cross_partition: bool,
    ) -> Result<StoreResponse, StoreError> {
        let mut state = self.state.lock();
        state.calls.push(CallRecord {
            method,
            path: path.to_string(),
            body: body.clone(),
            partition_key,
            cross_partition,
        });

        if method == Method::Post && path.ends_with("/docs") {
            if let Some(error) = &state.query_error {
                return Err(error.clone());
            }
            let body = if state.bare_array {
                Value::Array(state.query_docs.clone())
            } else {
                json!({"Documents": state.query_docs.clone(), "_count": state.query_docs.len()})
            };
            return Ok(StoreResponse {
                body,
                request_charge: QUERY_CHARGE,
                status: 200,
            });
        }

        // Per-document mutation: the id is the last path segment.
        let id = path.rsplit('/').next().unwrap_or_default().to_string();
        if let Some(script) = state.failures.get_mut(&id) {
            if script.remaining == u32::MAX {
                return Err(StoreError::with_status(
                    format!("mutation of {id} failed"),
                    script.status,
                    script.code.clone(),
                ));
            }
            if script.remaining > 0 {
                script.remaining -= 1;
                return Err(StoreError::with_status(
                    format!("mutation of {id} failed"),
                    script.status,
                    script.code.clone(),
                ));
            }
        }

        Ok(StoreResponse {
            body: body.unwrap_or(Value::Null),
            request_charge: MUTATION_CHARGE,
            status: 200,
        })
    }
}

impl Transport for MockTransport {
    fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        partition_key: Option<&Value>,
        cross_partition: bool,
    ) -> impl std::future::Future<Output = Result<StoreResponse, StoreError>> + Send {
        let path = path.to_string();
        let body = body.cloned();
        let partition_key = partition_key.cloned();
        async move {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let result = self.respond(method, &path, body, partition_key, cross_partition);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }
}

fn doc(id: &str, tenant: &str) -> Value {
    json!({"id": id, "tenant": tenant, "status": "active"})
}

fn client(mock: &Arc<MockTransport>) -> ContainerClient<MockTransport> {
    ContainerClient::from_shared(Arc::clone(mock), "appdb", "users", "tenant")
}

fn archive_patch() -> Map<String, Value> {
    json!({"status": "archived"})
        .as_object()
        .cloned()
        .unwrap_or_default()
}

fn fast_config() -> BulkConfig {
    BulkConfig::new().with_retry_backoff(Duration::from_millis(1))
}

#[tokio::test]
async fn test_bulk_update_on_empty_target_set_issues_no_mutations() {
    let mock = MockTransport::with_docs(vec![]);
    let result = client(&mock)
        .bulk_update(
            BulkUpdateOptions::patch(archive_patch())
                .with_filter(Filter::new().field("status", "active"))
                .within_partition("t1"),
        )
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.updated, 0);
    assert_eq!(result.failed, 0);
    assert!(result.errors.is_empty());
    // Durations come from a monotonic clock; the point is the run
    // finalizes a performance block without any mutation call.
    assert_eq!(result.performance.request_charge, 0.0);

    let calls = mock.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, Method::Post);
    assert!(mock.mutation_calls().is_empty());
}

#[tokio::test]
async fn test_bulk_update_applies_the_patch_to_every_target() {
    let mock = MockTransport::with_docs(vec![doc("a", "t1"), doc("b", "t1"), doc("c", "t1")]);
    let result = client(&mock)
        .bulk_update(
            BulkUpdateOptions::patch(archive_patch())
                .with_filter(Filter::new().field("status", "active"))
                .within_partition("t1")
                .with_config(fast_config()),
        )
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.updated, 3);
    assert_eq!(result.skipped, 0);
    assert!((result.performance.request_charge - 3.0 * MUTATION_CHARGE).abs() < f64::EPSILON);

    let mutations = mock.mutation_calls();
    assert_eq!(mutations.len(), 3);
    for call in &mutations {
        assert_eq!(call.method, Method::Put);
        assert!(call.path.starts_with("dbs/appdb/colls/users/docs/"));
        assert_eq!(call.partition_key, Some(json!("t1")));
        assert!(!call.cross_partition);
        let body = call.body.as_ref().unwrap();
        // Patched field replaced, unpatched fields kept.
        assert_eq!(body["status"], json!("archived"));
        assert_eq!(body["tenant"], json!("t1"));
    }
}

#[tokio::test]
async fn test_bulk_update_retries_transient_failures_to_success() {
    let mock = MockTransport::with_docs(vec![doc("a", "t1"), doc("b", "t1"), doc("c", "t1")]);
    mock.fail("b", 2, 429, Some("TooManyRequests"));

    let result = client(&mock)
        .bulk_update(
            BulkUpdateOptions::patch(archive_patch())
                .within_partition("t1")
                .with_config(fast_config()),
        )
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.updated, 3);
    assert_eq!(result.failed, 0);
    // Two extra attempts for "b".
    assert_eq!(mock.mutation_calls().len(), 5);
}

#[tokio::test]
async fn test_bulk_update_records_exhausted_failures_when_continuing() {
    let mock = MockTransport::with_docs(vec![doc("a", "t1"), doc("b", "t1"), doc("c", "t1")]);
    mock.fail("b", u32::MAX, 429, Some("TooManyRequests"));

    let seen_errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen_errors);
    let result = client(&mock)
        .bulk_update(
            BulkUpdateOptions::patch(archive_patch())
                .within_partition("t1")
                .continue_on_error(true)
                .with_config(fast_config())
                .on_error(move |error| sink.lock().push(error.clone())),
        )
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.updated, 2);
    assert_eq!(result.failed, 1);
    assert_eq!(result.errors.len(), 1);

    let error = &result.errors[0];
    assert_eq!(error.id, "b");
    assert_eq!(error.partition_key, "t1");
    assert_eq!(error.status, Some(429));
    assert_eq!(error.code.as_deref(), Some("TooManyRequests"));
    assert!(error.retriable);
    assert_eq!(error.attempts, 3);

    assert_eq!(seen_errors.lock().len(), 1);
}

#[tokio::test]
async fn test_bulk_update_aborts_on_first_terminal_failure() {
    let docs: Vec<Value> = (0..6).map(|i| doc(&format!("d{i}"), "t1")).collect();
    let mock = MockTransport::with_docs(docs);
    mock.fail("d0", u32::MAX, 404, Some("NotFound"));

    let error = client(&mock)
        .bulk_update(
            BulkUpdateOptions::patch(archive_patch())
                .within_partition("t1")
                .with_config(
                    fast_config()
                        .with_batch_size(1)
                        .with_max_concurrency(1),
                ),
        )
        .await
        .unwrap_err();

    match error {
        Error::BulkUpdateAborted { partial, .. } => {
            assert_eq!(partial.failed, 1);
            assert_eq!(partial.updated, 0);
            assert_eq!(partial.errors.len(), 1);
            assert_eq!(partial.errors[0].attempts, 1);
        }
        other => panic!("expected BulkUpdateAborted, got {other}"),
    }

    // With a cap of one, the failing first batch stops all admissions:
    // no further mutation is issued.
    assert_eq!(mock.mutation_calls().len(), 1);
}

#[tokio::test]
async fn test_bulk_update_compute_fn_skips_documents() {
    let mock = MockTransport::with_docs(vec![doc("a", "t1"), doc("b", "t1"), doc("c", "t1")]);
    let result = client(&mock)
        .bulk_update(
            BulkUpdateOptions::compute(|document| {
                if document["id"] == json!("b") {
                    None
                } else {
                    json!({"status": "archived"}).as_object().cloned()
                }
            })
            .within_partition("t1")
            .with_config(fast_config()),
        )
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.updated, 2);
    assert_eq!(result.skipped, 1);
    assert_eq!(mock.mutation_calls().len(), 2);
}

#[tokio::test]
async fn test_bulk_update_requires_a_partition_scope() {
    let mock = MockTransport::with_docs(vec![doc("a", "t1")]);
    let error = client(&mock)
        .bulk_update(BulkUpdateOptions::patch(archive_patch()))
        .await
        .unwrap_err();

    assert!(matches!(error, Error::PartitionScopeRequired));
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn test_bulk_update_progress_fires_per_batch_in_order() {
    let docs: Vec<Value> = (0..10).map(|i| doc(&format!("d{i}"), "t1")).collect();
    let mock = MockTransport::with_docs(docs);

    let snapshots = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&snapshots);
    let result = client(&mock)
        .bulk_update(
            BulkUpdateOptions::patch(archive_patch())
                .within_partition("t1")
                .with_config(
                    fast_config()
                        .with_batch_size(2)
                        .with_max_concurrency(3),
                )
                .on_progress(move |progress| sink.lock().push(progress.clone())),
        )
        .await
        .unwrap();

    assert_eq!(result.updated, 10);

    let snapshots = snapshots.lock();
    assert_eq!(snapshots.len(), 5);
    for (i, snapshot) in snapshots.iter().enumerate() {
        assert_eq!(snapshot.batches_completed, i + 1);
        assert_eq!(snapshot.total_batches, 5);
        assert_eq!(snapshot.total, 10);
    }
    let last = snapshots.last().unwrap();
    assert_eq!(last.processed, 10);
    assert!((last.percent - 100.0).abs() < f64::EPSILON);
    assert!((last.request_charge - 10.0 * MUTATION_CHARGE).abs() < 1e-9);
}

#[tokio::test]
async fn test_bulk_update_respects_the_concurrency_cap() {
    let docs: Vec<Value> = (0..8).map(|i| doc(&format!("d{i}"), "t1")).collect();
    let mut mock = MockTransport::default();
    mock.set_delay(Duration::from_millis(10));
    mock.state.lock().query_docs = docs;
    let mock = Arc::new(mock);

    client(&mock)
        .bulk_update(
            BulkUpdateOptions::patch(archive_patch())
                .within_partition("t1")
                .with_config(
                    fast_config()
                        .with_batch_size(1)
                        .with_max_concurrency(2),
                ),
        )
        .await
        .unwrap();

    // One request per batch at most two batches in flight; the selection
    // query ran alone before any mutation started.
    assert!(mock.peak_in_flight.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_bulk_delete_checks_confirmation_before_partition_scope() {
    let mock = MockTransport::with_docs(vec![doc("a", "t1")]);

    // Neither confirmation nor scope: confirmation wins.
    let error = client(&mock)
        .bulk_delete(BulkDeleteOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(error, Error::ConfirmationRequired));

    // Confirmed but unscoped: partition scope is the next check.
    let error = client(&mock)
        .bulk_delete(BulkDeleteOptions::new().confirm(true))
        .await
        .unwrap_err();
    assert!(matches!(error, Error::PartitionScopeRequired));

    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn test_bulk_delete_removes_every_target() {
    let mock = MockTransport::with_docs(vec![doc("a", "t1"), doc("b", "t1"), doc("c", "t1")]);
    let result = client(&mock)
        .bulk_delete(
            BulkDeleteOptions::new()
                .with_filter(Filter::new().field("status", "active"))
                .confirm(true)
                .within_partition("t1")
                .with_config(fast_config()),
        )
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.deleted, 3);
    assert_eq!(result.failed, 0);

    let mutations = mock.mutation_calls();
    assert_eq!(mutations.len(), 3);
    for call in &mutations {
        assert_eq!(call.method, Method::Delete);
        assert!(call.body.is_none());
        assert_eq!(call.partition_key, Some(json!("t1")));
    }
}

#[tokio::test]
async fn test_bulk_delete_records_partition_key_unknown_when_unresolvable() {
    let mock = MockTransport::with_docs(vec![json!({"id": "a", "status": "active"})]);
    let result = client(&mock)
        .bulk_delete(
            BulkDeleteOptions::new()
                .confirm(true)
                .cross_partition()
                .continue_on_error(true)
                .with_config(fast_config()),
        )
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.failed, 1);
    let error = &result.errors[0];
    assert_eq!(error.id, "a");
    assert_eq!(error.partition_key, "unknown");
    assert_eq!(error.attempts, 0);
    assert!(!error.retriable);
    // The unresolvable document never produced a mutation call.
    assert!(mock.mutation_calls().is_empty());
}

#[tokio::test]
async fn test_count_unwraps_the_single_scalar() {
    let mock = MockTransport::with_docs(vec![json!(7)]);
    mock.set_bare_array();

    let count = client(&mock)
        .count(
            Some(&Filter::new().field_ops("age", vec![Op::gte(18)])),
            &PartitionScope::key("t1"),
        )
        .await
        .unwrap();
    assert_eq!(count, 7);

    let calls = mock.calls();
    assert_eq!(calls.len(), 1);
    let body = calls[0].body.as_ref().unwrap();
    assert!(body["query"]
        .as_str()
        .unwrap()
        .starts_with("SELECT VALUE COUNT(1) FROM root WHERE"));
    assert_eq!(body["parameters"][0]["name"], json!("@param0"));
    assert_eq!(body["parameters"][0]["value"], json!(18));
}

#[tokio::test]
async fn test_aggregate_reshapes_the_flat_row() {
    let mock = MockTransport::with_docs(vec![json!({"_count": 5, "_sum_amount": 42.5})]);

    let spec = AggregateSpec::new().count().sum("amount").sum("tax");
    let result = client(&mock)
        .aggregate(&spec, None, &PartitionScope::key("t1"))
        .await
        .unwrap();

    assert_eq!(result.count, Some(CountResult::Total(5)));
    let sum = result.sum.unwrap();
    assert_eq!(sum.get("amount"), Some(&json!(42.5)));
    assert_eq!(sum.get("tax"), Some(&Value::Null));
}

#[tokio::test]
async fn test_aggregate_with_empty_spec_never_touches_the_network() {
    let mock = MockTransport::with_docs(vec![]);
    let error = client(&mock)
        .aggregate(&AggregateSpec::new(), None, &PartitionScope::key("t1"))
        .await
        .unwrap_err();

    assert!(error.to_string().contains("aggregate specification is empty"));
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn test_group_by_preserves_row_order_and_injects_keys() {
    let mock = MockTransport::with_docs(vec![
        json!({"region": "eu", "_count": 2}),
        json!({"region": "us", "_count": 5}),
    ]);

    let group = GroupBySpec::by("region").with_aggregate(AggregateSpec::new().count());
    let rows = client(&mock)
        .group_by(&group, None, &PartitionScope::CrossPartition)
        .await
        .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].group.get("region"), Some(&json!("eu")));
    assert_eq!(rows[0].aggregates.count, Some(CountResult::Total(2)));
    assert_eq!(rows[1].group.get("region"), Some(&json!("us")));

    let calls = mock.calls();
    assert!(calls[0].cross_partition);
    assert_eq!(calls[0].partition_key, None);
}

#[tokio::test]
async fn test_cross_partition_failures_are_enriched_not_swallowed() {
    let mock = MockTransport::with_docs(vec![]);
    mock.fail_queries(StoreError::with_status(
        "bad request",
        400,
        Some("BadRequest".into()),
    ));

    let error = client(&mock)
        .query(&vellum_client::QueryBuilder::new(), &PartitionScope::CrossPartition)
        .await
        .unwrap_err();

    match error {
        Error::CrossPartition { source } => {
            assert_eq!(source.status, Some(400));
            assert_eq!(source.message, "bad request");
        }
        other => panic!("expected CrossPartition, got {other}"),
    }

    // The same failure on a partition-scoped query stays a plain store
    // error.
    let error = client(&mock)
        .query(&vellum_client::QueryBuilder::new(), &PartitionScope::key("t1"))
        .await
        .unwrap_err();
    assert!(matches!(error, Error::Store(_)));
}
