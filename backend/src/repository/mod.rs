//! Generic entity repository: uniform CRUD and pagination over the closed
//! entity set.
//!
//! One [`EntityRepository`] exists per entity type. It owns nothing but its
//! static descriptor and two injected collaborators (operation log, clock),
//! so instances are freely shared across concurrent callers. Every operation
//! receives the storage handle from the caller; the repository never creates,
//! pools, or retries one.
//!
//! "Not found" semantics are deliberately asymmetric: reads return `Ok(None)`
//! and leave not-found business decisions to the caller, while `update` and
//! `delete` expected exactly one row and translate a miss into
//! [`RepositoryError::NotFound`].

mod registry;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Instant;

use mockable::Clock;
use pagination::{PageEnvelope, PageRequest};
use serde_json::Value;
use thiserror::Error;

use crate::domain::normalize::{Failure, ValidationFailure};
use crate::domain::ports::{
    EntityStore, Filter, OperationLog, Record, SortKey, StorageError, WindowQuery,
};
use crate::domain::{ClassifiedError, EntityDescriptor, EntityName, RequestId};

pub use registry::RepositoryRegistry;

/// Caller-supplied context threaded through every operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct OperationContext {
    request_id: Option<RequestId>,
}

impl OperationContext {
    /// Context without a correlation identifier.
    #[must_use]
    pub const fn new() -> Self {
        Self { request_id: None }
    }

    /// Attach the caller's correlation identifier.
    #[must_use]
    pub const fn with_request_id(request_id: RequestId) -> Self {
        Self {
            request_id: Some(request_id),
        }
    }

    /// The correlation identifier, when supplied.
    #[must_use]
    pub const fn request_id(&self) -> Option<RequestId> {
        self.request_id
    }
}

/// Options accepted by [`EntityRepository::find_all`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Page and window size; defaults to page 1, limit 50.
    pub page_request: PageRequest,
    /// Conditions both the window and the total count share.
    pub filter: Filter,
    /// Ordering keys applied to the window.
    pub order_by: Vec<SortKey>,
}

/// Failures raised by repository operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RepositoryError {
    /// A required argument was missing or malformed.
    #[error("validation failed for {field}: {message}")]
    Validation {
        /// Offending argument.
        field: String,
        /// Constraint message.
        message: String,
    },
    /// A destructive operation matched no row.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity the operation targeted.
        entity: EntityName,
        /// Identifier that matched nothing.
        id: String,
    },
    /// The storage collaborator failed, tagged with the operation.
    #[error("{operation} failed: {source}")]
    Storage {
        /// Operation description, e.g. `"find customer by ID"`.
        operation: String,
        /// Entity the operation targeted.
        entity: EntityName,
        /// Underlying storage failure.
        source: StorageError,
    },
}

impl RepositoryError {
    fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<RepositoryError> for Failure {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Validation { field, message } => {
                Self::Validation(ValidationFailure::field(field, message))
            }
            RepositoryError::NotFound { entity, id } => {
                Self::Classified(ClassifiedError::not_found(entity.as_str(), id))
            }
            RepositoryError::Storage {
                operation,
                entity: _,
                source,
            } => Self::Storage {
                operation,
                error: source,
            },
        }
    }
}

/// Generic CRUD and pagination engine for one entity type.
///
/// Stateless beyond its descriptor; obtain shared instances through
/// [`RepositoryRegistry`] rather than constructing one per call site.
#[derive(Clone)]
pub struct EntityRepository {
    descriptor: EntityDescriptor,
    log: Arc<dyn OperationLog>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for EntityRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityRepository")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl EntityRepository {
    /// Build a repository for one entity with injected collaborators.
    #[must_use]
    pub fn new(entity: EntityName, log: Arc<dyn OperationLog>, clock: Arc<dyn Clock>) -> Self {
        Self {
            descriptor: entity.descriptor(),
            log,
            clock,
        }
    }

    /// Entity this repository operates on.
    #[must_use]
    pub const fn entity(&self) -> EntityName {
        self.descriptor.name
    }

    /// Static descriptor, including the resolved primary-key field.
    #[must_use]
    pub const fn descriptor(&self) -> EntityDescriptor {
        self.descriptor
    }

    /// Fetch one record by primary key.
    ///
    /// Returns `Ok(None)` when no row matches: "not found" is a business
    /// decision left to the caller on read paths.
    pub async fn find_by_id(
        &self,
        id: &str,
        handle: &dyn EntityStore,
        ctx: &OperationContext,
    ) -> Result<Option<Record>, RepositoryError> {
        let operation = format!("find {} by ID", self.entity());
        let id = self.require_id(id)?;
        let started = Instant::now();
        let result = handle
            .find_unique(self.entity(), self.descriptor.primary_key_field, id)
            .await;
        self.report(&operation, started, ctx);
        result.map_err(|source| self.storage_error(&operation, source))
    }

    /// Insert the record as-is.
    ///
    /// No fields are injected beyond what the storage layer enforces;
    /// constraint violations surface as storage errors for the normalizer.
    pub async fn create(
        &self,
        data: Record,
        handle: &dyn EntityStore,
        ctx: &OperationContext,
    ) -> Result<Record, RepositoryError> {
        let operation = format!("create {}", self.entity());
        Self::require_data(&data)?;
        let started = Instant::now();
        let result = handle.create(self.entity(), data).await;
        self.report(&operation, started, ctx);
        result.map_err(|source| self.storage_error(&operation, source))
    }

    /// Apply a partial update to the row matching `id`.
    ///
    /// The record's `updated_at` is always stamped with the injected clock's
    /// current UTC instant, overriding any caller-supplied value. A missing
    /// row fails with [`RepositoryError::NotFound`].
    pub async fn update_by_id(
        &self,
        id: &str,
        mut data: Record,
        handle: &dyn EntityStore,
        ctx: &OperationContext,
    ) -> Result<Record, RepositoryError> {
        let operation = format!("update {} by ID", self.entity());
        let id = self.require_id(id)?.to_owned();
        Self::require_data(&data)?;
        data.insert(
            "updated_at".to_owned(),
            Value::String(self.clock.utc().to_rfc3339()),
        );
        let started = Instant::now();
        let result = handle
            .update(self.entity(), self.descriptor.primary_key_field, &id, data)
            .await;
        self.report(&operation, started, ctx);
        result.map_err(|source| self.translate_miss(&operation, source, id))
    }

    /// Hard-delete the row matching `id`, returning the removed record.
    ///
    /// Soft-delete policies belong to the caller, via the data it passes to
    /// [`Self::update_by_id`] instead. A missing row fails with
    /// [`RepositoryError::NotFound`].
    pub async fn delete_by_id(
        &self,
        id: &str,
        handle: &dyn EntityStore,
        ctx: &OperationContext,
    ) -> Result<Record, RepositoryError> {
        let operation = format!("delete {} by ID", self.entity());
        let id = self.require_id(id)?.to_owned();
        let started = Instant::now();
        let result = handle
            .delete(self.entity(), self.descriptor.primary_key_field, &id)
            .await;
        self.report(&operation, started, ctx);
        result.map_err(|source| self.translate_miss(&operation, source, id))
    }

    /// Fetch one page of records plus totals.
    ///
    /// The window fetch and the total count share one filter but not one
    /// snapshot; under concurrent writes the count may skew slightly against
    /// the returned window. That gap is inherited from the source system and
    /// accepted here.
    pub async fn find_all(
        &self,
        options: FindOptions,
        handle: &dyn EntityStore,
        ctx: &OperationContext,
    ) -> Result<PageEnvelope<Record>, RepositoryError> {
        let operation = format!("find all {}", self.entity());
        let query = WindowQuery {
            filter: options.filter.clone(),
            order_by: options.order_by,
            skip: saturating_i64(options.page_request.offset()),
            take: i64::from(options.page_request.limit()),
        };
        let started = Instant::now();
        let outcome = async {
            let rows = handle.find_many(self.entity(), &query).await?;
            let total = handle.count(self.entity(), &options.filter).await?;
            Ok((rows, total))
        }
        .await;
        self.report(&operation, started, ctx);
        let (rows, total) =
            outcome.map_err(|source: StorageError| self.storage_error(&operation, source))?;
        Ok(PageEnvelope::new(rows, options.page_request, total))
    }

    /// Count records matching the filter.
    pub async fn count(
        &self,
        filter: &Filter,
        handle: &dyn EntityStore,
        ctx: &OperationContext,
    ) -> Result<u64, RepositoryError> {
        let operation = format!("count {}", self.entity());
        let started = Instant::now();
        let result = handle.count(self.entity(), filter).await;
        self.report(&operation, started, ctx);
        result.map_err(|source| self.storage_error(&operation, source))
    }

    fn require_id<'a>(&self, id: &'a str) -> Result<&'a str, RepositoryError> {
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(RepositoryError::validation(
                self.descriptor.primary_key_field,
                format!("{} is required", self.descriptor.primary_key_field),
            ));
        }
        Ok(trimmed)
    }

    fn require_data(data: &Record) -> Result<(), RepositoryError> {
        if data.is_empty() {
            return Err(RepositoryError::validation("data", "data must not be empty"));
        }
        Ok(())
    }

    fn storage_error(&self, operation: &str, source: StorageError) -> RepositoryError {
        RepositoryError::Storage {
            operation: operation.to_owned(),
            entity: self.entity(),
            source,
        }
    }

    /// Translate a storage miss into the 404 taxonomy member; destructive
    /// operations expected exactly one row.
    fn translate_miss(&self, operation: &str, source: StorageError, id: String) -> RepositoryError {
        match source {
            StorageError::RecordNotFound => RepositoryError::NotFound {
                entity: self.entity(),
                id,
            },
            other => self.storage_error(operation, other),
        }
    }

    fn report(&self, operation: &str, started: Instant, ctx: &OperationContext) {
        self.log
            .record(operation, self.entity(), started.elapsed(), ctx.request_id());
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
