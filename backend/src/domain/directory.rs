//! Hand-written read models for the user directory.
//!
//! Two business relations (users-by-account, users-by-customer) are exposed
//! in three fixed projection tiers. Each tier is a distinct query shape
//! rather than a runtime-filtered projection of one universal query: the
//! trade-off is minimal data transfer per use case at the cost of query
//! duplication. Rows come back ordered by last name then first name and are
//! restricted to `ACTIVE` status at every joined level.
//!
//! Tier and relation selection is an exhaustive enum match; there is no
//! string-assembled method dispatch to fall through at runtime.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::normalize::{Failure, ValidationFailure};
use super::ports::StorageError;

/// Business relation a directory query walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// Users linked to one account through their account associations.
    UsersByAccount,
    /// Users belonging to one customer.
    UsersByCustomer,
}

impl Relation {
    /// Canonical name used in operation tags.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UsersByAccount => "users_by_account",
            Self::UsersByCustomer => "users_by_customer",
        }
    }

    /// Field name of the parent identifier this relation filters on.
    #[must_use]
    pub const fn parent_field(self) -> &'static str {
        match self {
            Self::UsersByAccount => "account_id",
            Self::UsersByCustomer => "customer_id",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed field-projection tier of a directory query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionTier {
    /// Identity fields only.
    Header,
    /// Header plus contact and role fields.
    Summary,
    /// Summary plus joined parent-entity fields.
    Detail,
}

impl ProjectionTier {
    /// Canonical name used in operation tags.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Summary => "summary",
            Self::Detail => "detail",
        }
    }
}

impl fmt::Display for ProjectionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Header tier: identity fields only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserHeader {
    /// User identifier.
    pub user_id: Uuid,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
}

/// Summary tier: header plus contact and role fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    /// User identifier.
    pub user_id: Uuid,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Contact email.
    pub email: String,
    /// Contact phone, when recorded.
    pub phone: Option<String>,
    /// Role within the customer organisation.
    pub role: String,
    /// User status marker.
    pub status: String,
}

/// Detail tier for the account relation: summary plus the joined account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountUserDetail {
    /// Summary fields for the user.
    #[serde(flatten)]
    pub user: UserSummary,
    /// Identifier of the joined account.
    pub account_id: Uuid,
    /// Human-facing account number.
    pub account_number: String,
    /// Account display name.
    pub account_name: String,
    /// Role the user holds on this account.
    pub account_role: String,
}

/// One active account association folded into a customer detail row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountLink {
    /// Identifier of the associated account.
    pub account_id: Uuid,
    /// Human-facing account number.
    pub account_number: String,
    /// Account display name.
    pub account_name: String,
    /// Role the user holds on the account.
    pub role: String,
}

/// Detail tier for the customer relation: one row per user with all active
/// account associations folded into one ordered list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerUserDetail {
    /// Summary fields for the user.
    #[serde(flatten)]
    pub user: UserSummary,
    /// Identifier of the owning customer.
    pub customer_id: Uuid,
    /// Customer display name.
    pub customer_name: String,
    /// Active account associations, ordered by account number. Empty when
    /// the user has none; never null.
    pub accounts: Vec<AccountLink>,
}

/// Rows returned by one directory fetch, tagged by shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProjectionRows {
    /// Header rows.
    Header(Vec<UserHeader>),
    /// Summary rows.
    Summary(Vec<UserSummary>),
    /// Account detail rows.
    AccountDetail(Vec<AccountUserDetail>),
    /// Customer detail rows.
    CustomerDetail(Vec<CustomerUserDetail>),
}

impl ProjectionRows {
    /// Number of rows regardless of shape.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Header(rows) => rows.len(),
            Self::Summary(rows) => rows.len(),
            Self::AccountDetail(rows) => rows.len(),
            Self::CustomerDetail(rows) => rows.len(),
        }
    }

    /// Whether the fetch matched nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read port answering the six fixed directory query shapes.
///
/// Implementations own the actual query text (raw parameterized SQL in the
/// Diesel adapter); this trait only fixes the shapes and their ordering and
/// status contracts.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Header rows for users on one account.
    async fn users_by_account_header(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<UserHeader>, StorageError>;

    /// Summary rows for users on one account.
    async fn users_by_account_summary(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<UserSummary>, StorageError>;

    /// Detail rows for users on one account.
    async fn users_by_account_detail(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<AccountUserDetail>, StorageError>;

    /// Header rows for users under one customer.
    async fn users_by_customer_header(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<UserHeader>, StorageError>;

    /// Summary rows for users under one customer.
    async fn users_by_customer_summary(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<UserSummary>, StorageError>;

    /// Grouped detail rows for users under one customer.
    async fn users_by_customer_detail(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<CustomerUserDetail>, StorageError>;
}

/// Failures raised by [`UserDirectoryService`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DirectoryError {
    /// The parent identifier was missing or malformed.
    #[error("directory validation failed: {message}")]
    Validation {
        /// Field the validation applies to.
        field: String,
        /// Constraint message.
        message: String,
    },
    /// The storage collaborator failed, tagged with relation and tier.
    #[error("{relation} {tier} query failed: {source}")]
    Storage {
        /// Relation being queried.
        relation: Relation,
        /// Tier being queried.
        tier: ProjectionTier,
        /// Underlying storage failure.
        source: StorageError,
    },
}

impl From<DirectoryError> for Failure {
    fn from(value: DirectoryError) -> Self {
        match value {
            DirectoryError::Validation { field, message } => {
                Self::Validation(ValidationFailure::field(field, message))
            }
            DirectoryError::Storage {
                relation,
                tier,
                source,
            } => Self::Storage {
                operation: format!("{relation} {tier} query"),
                error: source,
            },
        }
    }
}

/// Validating front door over a [`UserDirectory`] implementation.
#[derive(Clone)]
pub struct UserDirectoryService {
    directory: Arc<dyn UserDirectory>,
}

impl UserDirectoryService {
    /// Wrap a directory port implementation.
    #[must_use]
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }

    /// Fetch one relation at one tier for the given parent identifier.
    ///
    /// Blank or malformed identifiers fail with
    /// [`DirectoryError::Validation`] before the storage collaborator is
    /// touched.
    pub async fn fetch(
        &self,
        relation: Relation,
        tier: ProjectionTier,
        parent_id: &str,
    ) -> Result<ProjectionRows, DirectoryError> {
        let parent = parse_parent_id(relation, parent_id)?;
        let wrap = |source: StorageError| DirectoryError::Storage {
            relation,
            tier,
            source,
        };

        let rows = match (relation, tier) {
            (Relation::UsersByAccount, ProjectionTier::Header) => ProjectionRows::Header(
                self.directory
                    .users_by_account_header(parent)
                    .await
                    .map_err(wrap)?,
            ),
            (Relation::UsersByAccount, ProjectionTier::Summary) => ProjectionRows::Summary(
                self.directory
                    .users_by_account_summary(parent)
                    .await
                    .map_err(wrap)?,
            ),
            (Relation::UsersByAccount, ProjectionTier::Detail) => ProjectionRows::AccountDetail(
                self.directory
                    .users_by_account_detail(parent)
                    .await
                    .map_err(wrap)?,
            ),
            (Relation::UsersByCustomer, ProjectionTier::Header) => ProjectionRows::Header(
                self.directory
                    .users_by_customer_header(parent)
                    .await
                    .map_err(wrap)?,
            ),
            (Relation::UsersByCustomer, ProjectionTier::Summary) => ProjectionRows::Summary(
                self.directory
                    .users_by_customer_summary(parent)
                    .await
                    .map_err(wrap)?,
            ),
            (Relation::UsersByCustomer, ProjectionTier::Detail) => ProjectionRows::CustomerDetail(
                self.directory
                    .users_by_customer_detail(parent)
                    .await
                    .map_err(wrap)?,
            ),
        };
        Ok(rows)
    }
}

fn parse_parent_id(relation: Relation, parent_id: &str) -> Result<Uuid, DirectoryError> {
    let trimmed = parent_id.trim();
    if trimmed.is_empty() {
        return Err(DirectoryError::Validation {
            field: relation.parent_field().to_owned(),
            message: format!("{} is required", relation.parent_field()),
        });
    }
    trimmed.parse().map_err(|_| DirectoryError::Validation {
        field: relation.parent_field().to_owned(),
        message: format!("{} must be a UUID", relation.parent_field()),
    })
}
