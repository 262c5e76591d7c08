//! Unit tests for the classified error taxonomy.

use super::*;
use rstest::rstest;

#[rstest]
#[case(400, ErrorCategory::ClientError)]
#[case(422, ErrorCategory::ClientError)]
#[case(499, ErrorCategory::ClientError)]
#[case(500, ErrorCategory::ServerError)]
#[case(504, ErrorCategory::ServerError)]
#[case(302, ErrorCategory::Unknown)]
#[case(200, ErrorCategory::Unknown)]
fn category_is_pure_function_of_status(#[case] status: u16, #[case] expected: ErrorCategory) {
    assert_eq!(ErrorCategory::from_status(status), expected);
}

#[rstest]
#[case(ErrorCode::ValidationError, 422)]
#[case(ErrorCode::NotFound, 404)]
#[case(ErrorCode::Unauthorized, 401)]
#[case(ErrorCode::Forbidden, 403)]
#[case(ErrorCode::Conflict, 409)]
#[case(ErrorCode::UniqueConstraintViolation, 409)]
#[case(ErrorCode::ForeignKeyViolation, 400)]
#[case(ErrorCode::DatabaseError, 500)]
#[case(ErrorCode::DatabaseUnreachable, 503)]
#[case(ErrorCode::DatabaseTimeout, 504)]
#[case(ErrorCode::ExternalServiceError, 502)]
#[case(ErrorCode::TooManyRequests, 429)]
#[case(ErrorCode::InternalServerError, 500)]
fn default_statuses_match_taxonomy(#[case] code: ErrorCode, #[case] status: u16) {
    assert_eq!(code.default_status(), status);
}

#[rstest]
fn not_found_identifies_entity_and_id() {
    let err = ClassifiedError::not_found("customer", "8f1c");
    assert_eq!(err.status_code(), 404);
    assert_eq!(err.metadata().get("entity"), Some(&Value::String("customer".into())));
    assert_eq!(err.metadata().get("id"), Some(&Value::String("8f1c".into())));
    assert!(err.message().contains("customer"));
    assert!(err.message().contains("8f1c"));
}

#[rstest]
fn validation_defaults_carry_field_metadata() {
    let err = ClassifiedError::validation("email", "email is required");
    assert_eq!(err.code(), ErrorCode::ValidationError);
    assert_eq!(err.metadata().get("field"), Some(&Value::String("email".into())));
    assert!(err.is_operational());
}

#[rstest]
fn internal_errors_are_non_operational() {
    let err = ClassifiedError::internal("index out of bounds");
    assert!(!err.is_operational());
    assert_eq!(err.category(), ErrorCategory::ServerError);
}

#[rstest]
fn envelope_redacts_non_operational_outside_development() {
    let err = ClassifiedError::internal("panicked at src/lib.rs:42")
        .with_metadata("hint", Value::String("secret".into()));

    let prod = err.to_envelope(false);
    let body = prod.get("error").expect("error body");
    assert_eq!(
        body.get("message").and_then(Value::as_str),
        Some(GENERIC_SERVER_MESSAGE)
    );
    assert!(body.get("metadata").is_none());

    let dev = err.to_envelope(true);
    let body = dev.get("error").expect("error body");
    assert_eq!(
        body.get("message").and_then(Value::as_str),
        Some("panicked at src/lib.rs:42")
    );
    assert!(body.get("metadata").is_some());
}

#[rstest]
fn envelope_carries_code_status_category_and_request_id() {
    let request_id = RequestId::generate();
    let err = ClassifiedError::database("find customer by ID", "select failed")
        .with_request_id(request_id);
    let envelope = err.to_envelope(false);
    let body = envelope.get("error").expect("error body");

    assert_eq!(body.get("code").and_then(Value::as_str), Some("DATABASE_ERROR"));
    assert_eq!(body.get("statusCode").and_then(Value::as_u64), Some(500));
    assert_eq!(body.get("category").and_then(Value::as_str), Some("SERVER_ERROR"));
    assert_eq!(
        body.get("requestId").and_then(Value::as_str),
        Some(request_id.to_string().as_str())
    );
    // operational errors keep their message and metadata in production
    assert_eq!(body.get("message").and_then(Value::as_str), Some("select failed"));
    assert!(body.get("metadata").is_some());
}

#[rstest]
fn display_includes_code_and_message() {
    let err = ClassifiedError::conflict("duplicate account number");
    assert_eq!(err.to_string(), "[CONFLICT] duplicate account number");
}
