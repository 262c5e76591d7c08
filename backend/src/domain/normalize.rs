//! Boundary-facing error normalization.
//!
//! [`normalize`] converts any failure raised inside the system into exactly
//! one [`ClassifiedError`], applying a fixed priority order: already
//! classified errors pass through unchanged, then storage, external-service,
//! validation, and transport failures map through their respective tables,
//! and anything left falls back to a non-operational 500.
//!
//! Failure sources arrive as the [`Failure`] tagged union rather than as
//! ad hoc objects inspected for vendor markers; each collaborator boundary
//! already returned a typed error, so classification is a total match with
//! no runtime guessing. Retrying is never done here; that belongs to the
//! caller that issued the original operation.

use std::sync::LazyLock;

use regex::Regex;

use super::error::GENERIC_SERVER_MESSAGE;
use super::ports::{ExternalServiceError, StorageError, TransportError};
use super::{ClassifiedError, ErrorCode, RequestId};

/// A validation failure extracted at a boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    /// Offending field, when one could be identified.
    pub field: Option<String>,
    /// Constraint message describing the failure.
    pub message: String,
}

impl ValidationFailure {
    /// Failure tied to a named field.
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    /// Failure with no identifiable field.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }
}

/// Every failure source the normalizer recognises, in classification
/// priority order.
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    /// Already classified; passes through unchanged.
    Classified(ClassifiedError),
    /// Storage-engine failure tagged with the operation that raised it.
    Storage {
        /// Operation description, e.g. `"find customer by ID"`.
        operation: String,
        /// The typed storage failure.
        error: StorageError,
    },
    /// External collaborator failure.
    ExternalService(ExternalServiceError),
    /// Validation failure raised before any collaborator was touched.
    Validation(ValidationFailure),
    /// Transport-level failure.
    Transport(TransportError),
    /// Unexpected programming fault.
    Unexpected {
        /// Raw description of the fault.
        message: String,
    },
}

impl From<ClassifiedError> for Failure {
    fn from(value: ClassifiedError) -> Self {
        Self::Classified(value)
    }
}

impl From<ExternalServiceError> for Failure {
    fn from(value: ExternalServiceError) -> Self {
        Self::ExternalService(value)
    }
}

impl From<TransportError> for Failure {
    fn from(value: TransportError) -> Self {
        Self::Transport(value)
    }
}

impl From<ValidationFailure> for Failure {
    fn from(value: ValidationFailure) -> Self {
        Self::Validation(value)
    }
}

/// Request-scoped inputs to classification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeContext {
    development_mode: bool,
    request_id: Option<RequestId>,
}

impl NormalizeContext {
    /// Build a context; development mode disables redaction and message
    /// replacement.
    #[must_use]
    pub const fn new(development_mode: bool) -> Self {
        Self {
            development_mode,
            request_id: None,
        }
    }

    /// Attach the caller's correlation identifier.
    #[must_use]
    pub const fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Whether raw internals may be surfaced.
    #[must_use]
    pub const fn development_mode(&self) -> bool {
        self.development_mode
    }
}

static IP_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\b").expect("valid regex")
});

static CREDENTIAL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(password|passwd|secret|token|api[_-]?key)\s*[=:]\s*\S+")
        .expect("valid regex")
});

static BEARER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bbearer\s+[A-Za-z0-9._~+/=-]+").expect("valid regex"));

/// Mask address- and credential-shaped substrings before a message crosses a
/// trust boundary.
#[must_use]
pub fn redact(message: &str) -> String {
    let masked = IP_PATTERN.replace_all(message, "[redacted-ip]");
    let masked = CREDENTIAL_PATTERN.replace_all(&masked, "$1=[redacted]");
    BEARER_PATTERN.replace_all(&masked, "bearer [redacted]").into_owned()
}

/// Classify one failure into the taxonomy.
#[must_use]
pub fn normalize(failure: Failure, ctx: &NormalizeContext) -> ClassifiedError {
    let classified = match failure {
        // Priority 1: idempotent passthrough.
        Failure::Classified(error) => return error,
        Failure::Storage { operation, error } => classify_storage(&operation, error),
        Failure::ExternalService(error) => classify_external(error),
        Failure::Validation(validation) => {
            let field = validation.field.unwrap_or_else(|| "unknown".to_owned());
            ClassifiedError::validation(field, validation.message)
        }
        Failure::Transport(error) => classify_transport(error),
        Failure::Unexpected { message } => {
            let surfaced = if ctx.development_mode {
                message
            } else {
                GENERIC_SERVER_MESSAGE.to_owned()
            };
            ClassifiedError::internal(surfaced)
        }
    };

    let classified = if ctx.development_mode {
        classified
    } else {
        let masked = redact(classified.message());
        classified.with_message(masked)
    };
    match ctx.request_id {
        Some(request_id) => classified.with_request_id(request_id),
        None => classified,
    }
}

fn classify_storage(operation: &str, error: StorageError) -> ClassifiedError {
    match error {
        StorageError::UniqueViolation { constraint } => {
            let classified = ClassifiedError::with_default_status(
                ErrorCode::UniqueConstraintViolation,
                format!("unique constraint violated during {operation}"),
            )
            .with_metadata("operation", operation.into());
            match constraint {
                Some(name) => classified.with_metadata("constraint", name.into()),
                None => classified,
            }
        }
        StorageError::RecordNotFound => ClassifiedError::with_default_status(
            ErrorCode::NotFound,
            format!("{operation} matched no record"),
        )
        .with_metadata("operation", operation.into()),
        StorageError::ForeignKeyViolation { constraint } => {
            let classified = ClassifiedError::with_default_status(
                ErrorCode::ForeignKeyViolation,
                format!("foreign key constraint violated during {operation}"),
            )
            .with_metadata("operation", operation.into());
            match constraint {
                Some(name) => classified.with_metadata("constraint", name.into()),
                None => classified,
            }
        }
        StorageError::ConnectionUnreachable { message } => {
            ClassifiedError::with_default_status(ErrorCode::DatabaseUnreachable, message)
                .with_metadata("operation", operation.into())
        }
        StorageError::Timeout { message } => {
            ClassifiedError::with_default_status(ErrorCode::DatabaseTimeout, message)
                .with_metadata("operation", operation.into())
        }
        StorageError::Query { message } => {
            ClassifiedError::database(operation, format!("{operation} failed: {message}"))
        }
    }
}

fn classify_external(error: ExternalServiceError) -> ClassifiedError {
    let (status, code, message) = match error {
        ExternalServiceError::NotFound { message } => (404, None, message),
        ExternalServiceError::AccessDenied { message } => (403, None, message),
        ExternalServiceError::InvalidParameter { message } => (400, None, message),
        ExternalServiceError::Throttled { message } => (429, None, message),
        ExternalServiceError::Unavailable { message } => (503, None, message),
        ExternalServiceError::Other { code, message } => (502, code, message),
    };
    let classified = ClassifiedError::new(ErrorCode::ExternalServiceError, status, message);
    match code {
        Some(service_code) => classified.with_metadata("serviceCode", service_code.into()),
        None => classified,
    }
}

fn classify_transport(error: TransportError) -> ClassifiedError {
    match error {
        TransportError::ConnectionRefused { message } => {
            ClassifiedError::service_unavailable(message)
        }
        TransportError::Status { status, message } => {
            ClassifiedError::new(ErrorCode::HttpError, status, message)
        }
    }
}
