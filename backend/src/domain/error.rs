//! Classified error taxonomy shared by every boundary of the core.
//!
//! A [`ClassifiedError`] is the single failure shape callers ever see: a
//! stable machine-readable code, an HTTP-style status, a category derived
//! purely from that status, and optional structured metadata. Instances are
//! immutable after construction and carry their creation timestamp plus the
//! caller's correlation identifier.
//!
//! Classification of raw collaborator failures into this taxonomy lives in
//! [`crate::domain::normalize`]; this module only defines the vocabulary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::RequestId;

/// Stable machine-readable code identifying a taxonomy member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorCode {
    /// Caller-supplied arguments failed validation.
    ValidationError,
    /// A destructive operation expected exactly one row and found none.
    NotFound,
    /// Authentication is missing or failed.
    Unauthorized,
    /// Authenticated but not allowed to perform the operation.
    Forbidden,
    /// The request conflicts with existing state.
    Conflict,
    /// A unique constraint rejected the write.
    UniqueConstraintViolation,
    /// A foreign-key constraint rejected the write.
    ForeignKeyViolation,
    /// Storage failure with no more specific mapping.
    DatabaseError,
    /// The storage engine could not be reached.
    DatabaseUnreachable,
    /// The storage engine timed out executing the operation.
    DatabaseTimeout,
    /// An external collaborator failed with no more specific mapping.
    ExternalServiceError,
    /// A collaborator is temporarily unavailable.
    ServiceUnavailable,
    /// A collaborator throttled the request.
    TooManyRequests,
    /// Transport failure carrying its own status; no fixed code applies.
    HttpError,
    /// Unexpected programming fault; never operational.
    InternalServerError,
}

impl ErrorCode {
    /// Default HTTP-style status for this code.
    ///
    /// [`ErrorCode::HttpError`] carries its real status on the error itself;
    /// the default only applies when none was supplied.
    #[must_use]
    pub const fn default_status(self) -> u16 {
        match self {
            Self::ValidationError => 422,
            Self::NotFound => 404,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::Conflict | Self::UniqueConstraintViolation => 409,
            Self::ForeignKeyViolation => 400,
            Self::DatabaseUnreachable | Self::ServiceUnavailable => 503,
            Self::DatabaseTimeout => 504,
            Self::ExternalServiceError => 502,
            Self::TooManyRequests => 429,
            Self::DatabaseError | Self::HttpError | Self::InternalServerError => 500,
        }
    }

    /// Wire representation of the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::Conflict => "CONFLICT",
            Self::UniqueConstraintViolation => "UNIQUE_CONSTRAINT_VIOLATION",
            Self::ForeignKeyViolation => "FOREIGN_KEY_VIOLATION",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::DatabaseUnreachable => "DATABASE_UNREACHABLE",
            Self::DatabaseTimeout => "DATABASE_TIMEOUT",
            Self::ExternalServiceError => "EXTERNAL_SERVICE_ERROR",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::TooManyRequests => "TOO_MANY_REQUESTS",
            Self::HttpError => "HTTP_ERROR",
            Self::InternalServerError => "INTERNAL_SERVER_ERROR",
        }
    }
}

/// Coarse failure category, a pure function of the status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// 4xx statuses.
    ClientError,
    /// 5xx statuses.
    ServerError,
    /// Anything outside the 4xx/5xx ranges.
    Unknown,
}

impl ErrorCategory {
    /// Derive the category for a status code.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            400..=499 => Self::ClientError,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }
}

/// Generic phrase substituted for non-operational messages outside
/// development mode.
pub const GENERIC_SERVER_MESSAGE: &str = "An unexpected error occurred";

/// Normalized failure carrying a taxonomy code, status, and metadata.
///
/// ## Invariants
/// - `category()` is always derived from `status_code`, never stored.
/// - `is_operational` is `false` only for faults outside the declared
///   taxonomy (the [`ErrorCode::InternalServerError`] fallback).
///
/// # Examples
/// ```
/// use crm_backend::domain::{ClassifiedError, ErrorCategory, ErrorCode};
///
/// let err = ClassifiedError::not_found("customer", "8f1c");
/// assert_eq!(err.status_code(), 404);
/// assert_eq!(err.category(), ErrorCategory::ClientError);
/// assert_eq!(err.code(), ErrorCode::NotFound);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedError {
    message: String,
    status_code: u16,
    code: ErrorCode,
    is_operational: bool,
    metadata: Map<String, Value>,
    timestamp: DateTime<Utc>,
    request_id: Option<RequestId>,
}

impl ClassifiedError {
    /// Construct an operational error with an explicit status.
    #[must_use]
    pub fn new(code: ErrorCode, status_code: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code,
            code,
            is_operational: true,
            metadata: Map::new(),
            timestamp: Utc::now(),
            request_id: None,
        }
    }

    /// Construct an operational error using the code's default status.
    #[must_use]
    pub fn with_default_status(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code, code.default_status(), message)
    }

    /// 422 validation failure naming the offending field in metadata.
    #[must_use]
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_default_status(ErrorCode::ValidationError, message)
            .with_metadata("field", Value::String(field.into()))
    }

    /// 404 for a destructive operation that matched no row.
    #[must_use]
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        let entity = entity.into();
        let id = id.into();
        Self::with_default_status(ErrorCode::NotFound, format!("{entity} {id} not found"))
            .with_metadata("entity", Value::String(entity))
            .with_metadata("id", Value::String(id))
    }

    /// 409 conflict with existing state.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::with_default_status(ErrorCode::Conflict, message)
    }

    /// 500 storage failure tagged with the operation that raised it.
    #[must_use]
    pub fn database(operation: impl Into<String>, message: impl Into<String>) -> Self {
        let operation = operation.into();
        Self::with_default_status(ErrorCode::DatabaseError, message)
            .with_metadata("operation", Value::String(operation))
    }

    /// 502 external collaborator failure.
    #[must_use]
    pub fn external_service(message: impl Into<String>) -> Self {
        Self::with_default_status(ErrorCode::ExternalServiceError, message)
    }

    /// 503 temporarily unavailable collaborator.
    #[must_use]
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::with_default_status(ErrorCode::ServiceUnavailable, message)
    }

    /// 500 non-operational fallback for unexpected faults.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        let mut error = Self::with_default_status(ErrorCode::InternalServerError, message);
        error.is_operational = false;
        error
    }

    /// Attach one metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Attach the caller's correlation identifier.
    #[must_use]
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Replace the surfaced message, keeping everything else.
    #[must_use]
    pub(crate) fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP-style status code.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Category derived from the status code.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        ErrorCategory::from_status(self.status_code)
    }

    /// Whether the failure belongs to the declared taxonomy.
    #[must_use]
    pub const fn is_operational(&self) -> bool {
        self.is_operational
    }

    /// Structured metadata attached during classification.
    #[must_use]
    pub const fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Construction instant.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Correlation identifier, when the caller supplied one.
    #[must_use]
    pub const fn request_id(&self) -> Option<RequestId> {
        self.request_id
    }

    /// Serialize the boundary envelope: `{"error": {...}}`.
    ///
    /// Outside development mode, non-operational errors surface
    /// [`GENERIC_SERVER_MESSAGE`] and drop their metadata so internals never
    /// leak across the trust boundary.
    #[must_use]
    pub fn to_envelope(&self, development_mode: bool) -> Value {
        let redact = !development_mode && !self.is_operational;
        let message = if redact {
            GENERIC_SERVER_MESSAGE
        } else {
            self.message.as_str()
        };
        let mut body = json!({
            "message": message,
            "code": self.code.as_str(),
            "statusCode": self.status_code,
            "category": self.category(),
            "timestamp": self.timestamp.to_rfc3339(),
        });
        if let Some(entries) = body.as_object_mut() {
            if let Some(request_id) = self.request_id {
                entries.insert("requestId".into(), json!(request_id));
            }
            if !self.metadata.is_empty() && !redact {
                entries.insert("metadata".into(), Value::Object(self.metadata.clone()));
            }
        }
        json!({ "error": body })
    }
}

impl std::fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for ClassifiedError {}

#[cfg(test)]
mod tests;
