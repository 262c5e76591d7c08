//! Domain ports defining the edges of the core.
//!
//! Ports describe how the repository layer expects to interact with driven
//! collaborators (the storage engine, external services, the operation log).
//! Each boundary exposes a strongly typed error enum so adapters map their
//! failures into predictable variants up front; the normalizer never has to
//! guess an error's origin from ad hoc fields.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use super::{EntityName, RequestId};

/// Schema-agnostic row shape exchanged with the storage collaborator.
///
/// Field names follow the storage column names; values are whatever the
/// adapter can represent as JSON.
pub type Record = Map<String, Value>;

/// One field-equality condition inside a [`Filter`].
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Column the condition applies to.
    pub field: String,
    /// Value the column must equal.
    pub value: Value,
}

/// Conjunction of field-equality conditions.
///
/// # Examples
/// ```
/// use crm_backend::domain::ports::Filter;
/// use serde_json::json;
///
/// let filter = Filter::new().eq("status", json!("ACTIVE"));
/// assert_eq!(filter.conditions().len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    /// An empty filter matching every record.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            conditions: Vec::new(),
        }
    }

    /// Add an equality condition.
    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: Value) -> Self {
        self.conditions.push(Condition {
            field: field.into(),
            value,
        });
        self
    }

    /// Conditions in insertion order.
    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Whether the filter matches everything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// Sort direction for one [`SortKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

/// One ordering key inside a window query.
#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    /// Column to sort by.
    pub field: String,
    /// Direction to sort in.
    pub direction: SortDirection,
}

impl SortKey {
    /// Ascending key on `field`.
    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    /// Descending key on `field`.
    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// A bounded, ordered, filtered window over one entity's records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowQuery {
    /// Conditions every returned record must satisfy.
    pub filter: Filter,
    /// Ordering keys, applied left to right.
    pub order_by: Vec<SortKey>,
    /// Records to skip before the window starts.
    pub skip: i64,
    /// Maximum records in the window.
    pub take: i64,
}

/// Failures surfaced by the storage collaborator.
///
/// Adapters classify engine-specific failures into these variants at the
/// boundary, replacing vendor error-code sniffing downstream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// A unique constraint rejected the write.
    #[error("unique constraint violated")]
    UniqueViolation {
        /// Constraint name, when the engine reports one.
        constraint: Option<String>,
    },
    /// The targeted record does not exist.
    #[error("record not found")]
    RecordNotFound,
    /// A foreign-key constraint rejected the write.
    #[error("foreign key constraint violated")]
    ForeignKeyViolation {
        /// Constraint name, when the engine reports one.
        constraint: Option<String>,
    },
    /// The engine could not be reached at all.
    #[error("storage unreachable: {message}")]
    ConnectionUnreachable {
        /// Adapter-provided context.
        message: String,
    },
    /// The engine gave up on the operation.
    #[error("storage operation timed out: {message}")]
    Timeout {
        /// Adapter-provided context.
        message: String,
    },
    /// Any other query or mutation failure.
    #[error("storage query failed: {message}")]
    Query {
        /// Adapter-provided context.
        message: String,
    },
}

impl StorageError {
    /// Helper for generic query failures.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Helper for connectivity failures.
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::ConnectionUnreachable {
            message: message.into(),
        }
    }

    /// Helper for timeouts.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }
}

/// Failures surfaced by external-service collaborators (cloud SDKs and the
/// like). No client lives in this crate; the enum exists so the normalizer
/// has a typed boundary to map.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExternalServiceError {
    /// The remote resource does not exist.
    #[error("external resource not found: {message}")]
    NotFound {
        /// Adapter-provided context.
        message: String,
    },
    /// The caller lacks permission on the remote side.
    #[error("external access denied: {message}")]
    AccessDenied {
        /// Adapter-provided context.
        message: String,
    },
    /// The remote service rejected a request parameter.
    #[error("external parameter invalid: {message}")]
    InvalidParameter {
        /// Adapter-provided context.
        message: String,
    },
    /// The remote service throttled the request.
    #[error("external request throttled: {message}")]
    Throttled {
        /// Adapter-provided context.
        message: String,
    },
    /// The remote service is temporarily unavailable.
    #[error("external service unavailable: {message}")]
    Unavailable {
        /// Adapter-provided context.
        message: String,
    },
    /// Any other remote failure.
    #[error("external service failed: {message}")]
    Other {
        /// Service-reported code, when present.
        code: Option<String>,
        /// Adapter-provided context.
        message: String,
    },
}

/// Transport-level failures observed while talking to a collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The peer refused the connection outright.
    #[error("connection refused: {message}")]
    ConnectionRefused {
        /// Adapter-provided context.
        message: String,
    },
    /// The peer answered with an error status of its own.
    #[error("transport error {status}: {message}")]
    Status {
        /// Status carried by the response.
        status: u16,
        /// Adapter-provided context.
        message: String,
    },
}

/// The storage handle supplied by the caller on every repository operation.
///
/// A handle represents either a live connection or an active transaction
/// context; its lifetime and commit/rollback discipline belong entirely to
/// the caller. The repository never creates, pools, or shares one.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Fetch at most one record by its primary key.
    async fn find_unique(
        &self,
        entity: EntityName,
        key_field: &str,
        id: &str,
    ) -> Result<Option<Record>, StorageError>;

    /// Insert the record as-is and return the stored row.
    async fn create(&self, entity: EntityName, data: Record) -> Result<Record, StorageError>;

    /// Apply the partial update to the row matching the key.
    ///
    /// Returns [`StorageError::RecordNotFound`] when no row matches.
    async fn update(
        &self,
        entity: EntityName,
        key_field: &str,
        id: &str,
        data: Record,
    ) -> Result<Record, StorageError>;

    /// Hard-delete the row matching the key and return it.
    ///
    /// Returns [`StorageError::RecordNotFound`] when no row matches.
    async fn delete(
        &self,
        entity: EntityName,
        key_field: &str,
        id: &str,
    ) -> Result<Record, StorageError>;

    /// Fetch a filtered, ordered window of records.
    async fn find_many(
        &self,
        entity: EntityName,
        query: &WindowQuery,
    ) -> Result<Vec<Record>, StorageError>;

    /// Count records matching the filter.
    async fn count(&self, entity: EntityName, filter: &Filter) -> Result<u64, StorageError>;
}

/// Fire-and-forget sink for per-operation observability.
///
/// The trait is infallible and synchronous by construction so a misbehaving
/// sink can never mask the outcome of the operation it observed.
pub trait OperationLog: Send + Sync {
    /// Report one completed repository operation.
    fn record(
        &self,
        operation: &str,
        entity: EntityName,
        duration: Duration,
        request_id: Option<RequestId>,
    );
}

/// No-op sink for callers that do not care about operation timing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullOperationLog;

impl OperationLog for NullOperationLog {
    fn record(&self, _: &str, _: EntityName, _: Duration, _: Option<RequestId>) {}
}
