//! Maps Diesel failures onto the domain's storage error taxonomy.

use tracing::debug;

use crate::domain::ports::StorageError;

/// Translate a Diesel error into a [`StorageError`].
///
/// Constraint violations keep their constraint name so the error
/// normaliser can surface it; everything else collapses into the
/// query/unreachable/timeout buckets.
pub(crate) fn map_diesel_error(error: diesel::result::Error) -> StorageError {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        other => debug!(
            error_type = %std::any::type_name_of_val(other),
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::NotFound => StorageError::RecordNotFound,
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            StorageError::UniqueViolation {
                constraint: info.constraint_name().map(str::to_owned),
            }
        }
        DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
            StorageError::ForeignKeyViolation {
                constraint: info.constraint_name().map(str::to_owned),
            }
        }
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, info) => {
            StorageError::unreachable(info.message())
        }
        DieselError::DatabaseError(_, info) if info.message().contains("timeout") => {
            StorageError::timeout(info.message())
        }
        DieselError::DatabaseError(_, info) => StorageError::query(info.message()),
        other => StorageError::query(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use diesel::result::Error as DieselError;
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn not_found_becomes_record_not_found() {
        let mapped = map_diesel_error(DieselError::NotFound);

        assert!(matches!(mapped, StorageError::RecordNotFound));
    }

    #[rstest]
    fn broken_transaction_becomes_query_error() {
        let mapped = map_diesel_error(DieselError::BrokenTransactionManager);

        assert!(matches!(mapped, StorageError::Query { .. }));
    }
}
