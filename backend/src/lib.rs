//! Customer relationship data core.
//!
//! This crate provides a generic repository engine over the CRM entity
//! set (customers, accounts, users, and their link rows), a typed error
//! taxonomy with a single normalisation point, and a tiered directory
//! query layer. The domain layer speaks only through ports; the Diesel
//! adapter under [`outbound`] supplies PostgreSQL implementations.
//!
//! A typical wiring:
//!
//! ```ignore
//! let settings = AppSettings::load()?;
//! let pool = DbPool::new(settings.pool_config().ok_or(...)?).await?;
//! let registry = RepositoryRegistry::new(TracingOperationLog::shared(), clock);
//!
//! let session = pool.session().await?;
//! let repository = registry.repository("customer")?;
//! let page = repository.find_all(FindOptions::default(), &session, &ctx).await?;
//! ```

pub mod config;
pub mod domain;
pub mod outbound;
pub mod repository;
pub mod telemetry;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use config::AppSettings;
pub use domain::{ClassifiedError, EntityName, ErrorCode, Failure, NormalizeContext, RequestId};
pub use repository::{EntityRepository, RepositoryRegistry};
