//! The transport collaborator interface.
//!
//! Vellum consumes an HTTP transport and request-signing layer; it never
//! implements one. The transport receives container-relative paths built
//! from the query/document patterns below and returns parsed responses.

use std::future::Future;

use serde_json::Value;
use thiserror::Error;

/// HTTP method for a store request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Read a resource.
    Get,
    /// Execute a query or create a resource.
    Post,
    /// Replace a resource.
    Put,
    /// Delete a resource.
    Delete,
}

impl Method {
    /// The method name on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

/// A parsed store response.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreResponse {
    /// Parsed response body. A query response is either a bare array
    /// (VALUE projections) or an object carrying a `Documents` array.
    pub body: Value,
    /// Request charge the store reported for this call.
    pub request_charge: f64,
    /// HTTP status of the response.
    pub status: u16,
}

/// A failed store request, carrying the remote status and store error
/// code when the store reported them.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("store error: {message}")]
pub struct StoreError {
    /// Failure message.
    pub message: String,
    /// HTTP status code, absent for transport-level failures.
    pub status: Option<u16>,
    /// Store-specific error code, when present.
    pub code: Option<String>,
}

impl StoreError {
    /// A transport-level failure with no remote status.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            code: None,
        }
    }

    /// A failure carrying a remote status and optional store code.
    pub fn with_status(
        message: impl Into<String>,
        status: u16,
        code: Option<String>,
    ) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
            code,
        }
    }

    /// Classify this failure as retriable (transient network or
    /// rate-limit conditions) or terminal.
    pub fn is_retriable(&self) -> bool {
        match self.status {
            // No status: the request never reached the store.
            None => true,
            Some(status) => matches!(status, 408 | 429 | 449 | 503),
        }
    }
}

/// The request/response collaborator Vellum executes against.
pub trait Transport {
    /// Issue one request. `partition_key` scopes the call to a single
    /// partition; `cross_partition` opts a query into fan-out execution.
    fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        partition_key: Option<&Value>,
        cross_partition: bool,
    ) -> impl Future<Output = Result<StoreResponse, StoreError>> + Send;
}

/// Container-relative query endpoint.
pub fn documents_path(database: &str, container: &str) -> String {
    format!("dbs/{database}/colls/{container}/docs")
}

/// Per-document endpoint.
pub fn document_path(database: &str, container: &str, id: &str) -> String {
    format!("dbs/{database}/colls/{container}/docs/{id}")
}
