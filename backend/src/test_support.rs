//! Shared test utilities for unit and integration suites.
//!
//! Provides in-memory implementations of the storage ports with failure
//! injection, a recording operation log, and a fixed clock. Compiled for
//! `cfg(test)` and behind the `test-support` feature so integration tests can
//! opt in without shipping any of this in production builds.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use mockable::Clock;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::directory::{
    AccountLink, AccountUserDetail, CustomerUserDetail, UserDirectory, UserHeader, UserSummary,
};
use crate::domain::ports::{
    EntityStore, Filter, OperationLog, Record, SortDirection, StorageError, WindowQuery,
};
use crate::domain::{EntityName, RequestId};

/// Build a [`Record`] from field/value pairs.
#[must_use]
pub fn record(entries: &[(&str, Value)]) -> Record {
    entries
        .iter()
        .map(|(key, value)| ((*key).to_owned(), value.clone()))
        .collect()
}

/// Clock pinned to one instant, for deterministic timestamp assertions.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: DateTime<Utc>,
}

impl FixedClock {
    /// Pin the clock to `now`.
    #[must_use]
    pub const fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }
}

impl Clock for FixedClock {
    fn local(&self) -> DateTime<Local> {
        self.now.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.now
    }
}

/// One entry captured by [`RecordingLog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedOperation {
    /// Operation description as reported.
    pub operation: String,
    /// Entity the operation targeted.
    pub entity: EntityName,
    /// Reported duration.
    pub duration: Duration,
    /// Correlation identifier, when one was supplied.
    pub request_id: Option<RequestId>,
}

/// Operation log that captures entries for assertions.
#[derive(Debug, Default)]
pub struct RecordingLog {
    entries: Mutex<Vec<LoggedOperation>>,
}

impl RecordingLog {
    /// Snapshot of everything recorded so far.
    #[must_use]
    pub fn entries(&self) -> Vec<LoggedOperation> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl OperationLog for RecordingLog {
    fn record(
        &self,
        operation: &str,
        entity: EntityName,
        duration: Duration,
        request_id: Option<RequestId>,
    ) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(LoggedOperation {
                operation: operation.to_owned(),
                entity,
                duration,
                request_id,
            });
    }
}

#[derive(Default)]
struct MemoryState {
    tables: HashMap<EntityName, Vec<Record>>,
    fail_next: Option<StorageError>,
}

/// In-memory [`EntityStore`] with per-call failure injection.
///
/// Equality filters, multi-key ordering, and windowing behave like the real
/// adapter; duplicate primary keys are rejected with a unique violation so
/// conflict paths can be exercised without a database.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert records directly, bypassing validation.
    pub fn seed(&self, entity: EntityName, records: impl IntoIterator<Item = Record>) {
        let mut state = self.lock();
        state.tables.entry(entity).or_default().extend(records);
    }

    /// Make the next store call fail with `error`.
    pub fn fail_next(&self, error: StorageError) {
        self.lock().fail_next = Some(error);
    }

    /// Snapshot of one table.
    #[must_use]
    pub fn rows(&self, entity: EntityName) -> Vec<Record> {
        self.lock().tables.get(&entity).cloned().unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_failure(state: &mut MemoryState) -> Result<(), StorageError> {
        match state.fail_next.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn value_as_key(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(text)) => Some(text.clone()),
        Some(other) => Some(other.to_string()),
        None => None,
    }
}

fn matches_filter(row: &Record, filter: &Filter) -> bool {
    filter
        .conditions()
        .iter()
        .all(|condition| row.get(&condition.field) == Some(&condition.value))
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    match (a, b) {
        (Some(Value::String(left)), Some(Value::String(right))) => left.cmp(right),
        (Some(Value::Number(left)), Some(Value::Number(right))) => left
            .as_f64()
            .partial_cmp(&right.as_f64())
            .unwrap_or(std::cmp::Ordering::Equal),
        (left, right) => {
            let left = left.map(ToString::to_string).unwrap_or_default();
            let right = right.map(ToString::to_string).unwrap_or_default();
            left.cmp(&right)
        }
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn find_unique(
        &self,
        entity: EntityName,
        key_field: &str,
        id: &str,
    ) -> Result<Option<Record>, StorageError> {
        let mut state = self.lock();
        Self::take_failure(&mut state)?;
        let found = state
            .tables
            .get(&entity)
            .and_then(|rows| {
                rows.iter()
                    .find(|row| value_as_key(row.get(key_field)).as_deref() == Some(id))
            })
            .cloned();
        Ok(found)
    }

    async fn create(&self, entity: EntityName, data: Record) -> Result<Record, StorageError> {
        let mut state = self.lock();
        Self::take_failure(&mut state)?;
        let key_field = entity.primary_key_field();
        if let Some(key) = value_as_key(data.get(key_field)) {
            let duplicate = state.tables.get(&entity).is_some_and(|rows| {
                rows.iter()
                    .any(|row| value_as_key(row.get(key_field)).as_deref() == Some(key.as_str()))
            });
            if duplicate {
                return Err(StorageError::UniqueViolation {
                    constraint: Some(format!("{}_pkey", entity.table())),
                });
            }
        }
        state.tables.entry(entity).or_default().push(data.clone());
        Ok(data)
    }

    async fn update(
        &self,
        entity: EntityName,
        key_field: &str,
        id: &str,
        data: Record,
    ) -> Result<Record, StorageError> {
        let mut state = self.lock();
        Self::take_failure(&mut state)?;
        let rows = state.tables.entry(entity).or_default();
        let Some(row) = rows
            .iter_mut()
            .find(|row| value_as_key(row.get(key_field)).as_deref() == Some(id))
        else {
            return Err(StorageError::RecordNotFound);
        };
        for (field, value) in data {
            row.insert(field, value);
        }
        Ok(row.clone())
    }

    async fn delete(
        &self,
        entity: EntityName,
        key_field: &str,
        id: &str,
    ) -> Result<Record, StorageError> {
        let mut state = self.lock();
        Self::take_failure(&mut state)?;
        let rows = state.tables.entry(entity).or_default();
        let Some(position) = rows
            .iter()
            .position(|row| value_as_key(row.get(key_field)).as_deref() == Some(id))
        else {
            return Err(StorageError::RecordNotFound);
        };
        Ok(rows.remove(position))
    }

    async fn find_many(
        &self,
        entity: EntityName,
        query: &WindowQuery,
    ) -> Result<Vec<Record>, StorageError> {
        let mut state = self.lock();
        Self::take_failure(&mut state)?;
        let mut rows: Vec<Record> = state
            .tables
            .get(&entity)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches_filter(row, &query.filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        rows.sort_by(|a, b| {
            for key in &query.order_by {
                let ordering = compare_values(a.get(&key.field), b.get(&key.field));
                let ordering = match key.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                };
                if ordering != std::cmp::Ordering::Equal {
                    return ordering;
                }
            }
            std::cmp::Ordering::Equal
        });

        let skip = usize::try_from(query.skip.max(0)).unwrap_or(usize::MAX);
        let take = usize::try_from(query.take.max(0)).unwrap_or(usize::MAX);
        Ok(rows.into_iter().skip(skip).take(take).collect())
    }

    async fn count(&self, entity: EntityName, filter: &Filter) -> Result<u64, StorageError> {
        let mut state = self.lock();
        Self::take_failure(&mut state)?;
        let count = state
            .tables
            .get(&entity)
            .map(|rows| rows.iter().filter(|row| matches_filter(row, filter)).count())
            .unwrap_or(0);
        Ok(count as u64)
    }
}

/// Customer fixture row for [`MemoryDirectory`].
#[derive(Debug, Clone)]
pub struct CustomerFixture {
    /// Customer identifier.
    pub customer_id: Uuid,
    /// Display name.
    pub name: String,
    /// Status marker.
    pub status: String,
}

/// Account fixture row for [`MemoryDirectory`].
#[derive(Debug, Clone)]
pub struct AccountFixture {
    /// Account identifier.
    pub account_id: Uuid,
    /// Owning customer.
    pub customer_id: Uuid,
    /// Human-facing account number.
    pub account_number: String,
    /// Display name.
    pub account_name: String,
    /// Status marker.
    pub status: String,
}

/// User fixture row for [`MemoryDirectory`].
#[derive(Debug, Clone)]
pub struct UserFixture {
    /// User identifier.
    pub user_id: Uuid,
    /// Owning customer.
    pub customer_id: Uuid,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Contact email.
    pub email: String,
    /// Contact phone.
    pub phone: Option<String>,
    /// Organisation role.
    pub role: String,
    /// Status marker.
    pub status: String,
}

/// User-account association fixture row for [`MemoryDirectory`].
#[derive(Debug, Clone)]
pub struct LinkFixture {
    /// Linked user.
    pub user_id: Uuid,
    /// Linked account.
    pub account_id: Uuid,
    /// Role the user holds on the account.
    pub role: String,
    /// Association status marker.
    pub status: String,
}

const ACTIVE: &str = "ACTIVE";

/// In-memory [`UserDirectory`] mirroring the SQL tier semantics: joins
/// restricted to `ACTIVE` rows at every level, ordering by last then first
/// name, and per-user grouping of account links in the customer detail tier.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    customers: Vec<CustomerFixture>,
    accounts: Vec<AccountFixture>,
    users: Vec<UserFixture>,
    links: Vec<LinkFixture>,
}

impl MemoryDirectory {
    /// Empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a customer fixture.
    pub fn push_customer(&mut self, customer: CustomerFixture) {
        self.customers.push(customer);
    }

    /// Add an account fixture.
    pub fn push_account(&mut self, account: AccountFixture) {
        self.accounts.push(account);
    }

    /// Add a user fixture.
    pub fn push_user(&mut self, user: UserFixture) {
        self.users.push(user);
    }

    /// Add a user-account association fixture.
    pub fn push_link(&mut self, link: LinkFixture) {
        self.links.push(link);
    }

    fn summary_of(user: &UserFixture) -> UserSummary {
        UserSummary {
            user_id: user.user_id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            role: user.role.clone(),
            status: user.status.clone(),
        }
    }

    fn sort_users(users: &mut Vec<&UserFixture>) {
        users.sort_by(|a, b| {
            a.last_name
                .cmp(&b.last_name)
                .then_with(|| a.first_name.cmp(&b.first_name))
        });
    }

    /// Active users reachable from one account through active links, with
    /// the link row alongside.
    fn active_users_for_account(&self, account_id: Uuid) -> Vec<(&UserFixture, &LinkFixture)> {
        let Some(account) = self
            .accounts
            .iter()
            .find(|account| account.account_id == account_id && account.status == ACTIVE)
        else {
            return Vec::new();
        };
        let mut pairs: Vec<(&UserFixture, &LinkFixture)> = self
            .links
            .iter()
            .filter(|link| link.account_id == account.account_id && link.status == ACTIVE)
            .filter_map(|link| {
                self.users
                    .iter()
                    .find(|user| user.user_id == link.user_id && user.status == ACTIVE)
                    .map(|user| (user, link))
            })
            .collect();
        pairs.sort_by(|(a, _), (b, _)| {
            a.last_name
                .cmp(&b.last_name)
                .then_with(|| a.first_name.cmp(&b.first_name))
        });
        pairs
    }

    fn active_users_for_customer(&self, customer_id: Uuid) -> Vec<&UserFixture> {
        let customer_active = self
            .customers
            .iter()
            .any(|customer| customer.customer_id == customer_id && customer.status == ACTIVE);
        if !customer_active {
            return Vec::new();
        }
        let mut users: Vec<&UserFixture> = self
            .users
            .iter()
            .filter(|user| user.customer_id == customer_id && user.status == ACTIVE)
            .collect();
        Self::sort_users(&mut users);
        users
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn users_by_account_header(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<UserHeader>, StorageError> {
        Ok(self
            .active_users_for_account(account_id)
            .into_iter()
            .map(|(user, _)| UserHeader {
                user_id: user.user_id,
                first_name: user.first_name.clone(),
                last_name: user.last_name.clone(),
            })
            .collect())
    }

    async fn users_by_account_summary(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<UserSummary>, StorageError> {
        Ok(self
            .active_users_for_account(account_id)
            .into_iter()
            .map(|(user, _)| Self::summary_of(user))
            .collect())
    }

    async fn users_by_account_detail(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<AccountUserDetail>, StorageError> {
        let account = self
            .accounts
            .iter()
            .find(|account| account.account_id == account_id && account.status == ACTIVE);
        Ok(self
            .active_users_for_account(account_id)
            .into_iter()
            .filter_map(|(user, link)| {
                account.map(|account| AccountUserDetail {
                    user: Self::summary_of(user),
                    account_id: account.account_id,
                    account_number: account.account_number.clone(),
                    account_name: account.account_name.clone(),
                    account_role: link.role.clone(),
                })
            })
            .collect())
    }

    async fn users_by_customer_header(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<UserHeader>, StorageError> {
        Ok(self
            .active_users_for_customer(customer_id)
            .into_iter()
            .map(|user| UserHeader {
                user_id: user.user_id,
                first_name: user.first_name.clone(),
                last_name: user.last_name.clone(),
            })
            .collect())
    }

    async fn users_by_customer_summary(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<UserSummary>, StorageError> {
        Ok(self
            .active_users_for_customer(customer_id)
            .into_iter()
            .map(Self::summary_of)
            .collect())
    }

    async fn users_by_customer_detail(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<CustomerUserDetail>, StorageError> {
        let Some(customer) = self
            .customers
            .iter()
            .find(|customer| customer.customer_id == customer_id && customer.status == ACTIVE)
        else {
            return Ok(Vec::new());
        };
        Ok(self
            .active_users_for_customer(customer_id)
            .into_iter()
            .map(|user| {
                let mut accounts: Vec<AccountLink> = self
                    .links
                    .iter()
                    .filter(|link| link.user_id == user.user_id && link.status == ACTIVE)
                    .filter_map(|link| {
                        self.accounts
                            .iter()
                            .find(|account| {
                                account.account_id == link.account_id && account.status == ACTIVE
                            })
                            .map(|account| AccountLink {
                                account_id: account.account_id,
                                account_number: account.account_number.clone(),
                                account_name: account.account_name.clone(),
                                role: link.role.clone(),
                            })
                    })
                    .collect();
                accounts.sort_by(|a, b| a.account_number.cmp(&b.account_number));
                CustomerUserDetail {
                    user: Self::summary_of(user),
                    customer_id: customer.customer_id,
                    customer_name: customer.name.clone(),
                    accounts,
                }
            })
            .collect())
    }
}
