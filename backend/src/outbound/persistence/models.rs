//! Row, insert, and changeset types bridging Diesel and the generic
//! record shape used by the repository layer.
//!
//! Each table gets three structs: a `*Row` selected back from queries
//! and serialised into a [`crate::domain::ports::Record`], a `New*Row`
//! deserialised from a create payload with generated defaults, and a
//! `*Changes` changeset where every field is optional so partial
//! updates only touch the columns a caller supplied.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{Nullable, Text, Uuid as SqlUuid};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::schema::{accounts, customers, user_accounts, users};

fn default_status() -> String {
    "ACTIVE".to_owned()
}

#[derive(Debug, Clone, Serialize, Queryable, Selectable)]
#[diesel(table_name = customers, check_for_backend(diesel::pg::Pg))]
pub(crate) struct CustomerRow {
    pub customer_id: Uuid,
    pub name: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Insertable)]
#[diesel(table_name = customers)]
#[serde(deny_unknown_fields)]
pub(crate) struct NewCustomerRow {
    #[serde(default = "Uuid::new_v4")]
    pub customer_id: Uuid,
    pub name: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, AsChangeset)]
#[diesel(table_name = customers)]
#[serde(deny_unknown_fields, default)]
pub(crate) struct CustomerChanges {
    pub name: Option<String>,
    pub status: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Queryable, Selectable)]
#[diesel(table_name = accounts, check_for_backend(diesel::pg::Pg))]
pub(crate) struct AccountRow {
    pub account_id: Uuid,
    pub customer_id: Uuid,
    pub account_number: String,
    pub account_name: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Insertable)]
#[diesel(table_name = accounts)]
#[serde(deny_unknown_fields)]
pub(crate) struct NewAccountRow {
    #[serde(default = "Uuid::new_v4")]
    pub account_id: Uuid,
    pub customer_id: Uuid,
    pub account_number: String,
    pub account_name: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, AsChangeset)]
#[diesel(table_name = accounts)]
#[serde(deny_unknown_fields, default)]
pub(crate) struct AccountChanges {
    pub customer_id: Option<Uuid>,
    pub account_number: Option<String>,
    pub account_name: Option<String>,
    pub status: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Queryable, Selectable)]
#[diesel(table_name = users, check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserRow {
    pub user_id: Uuid,
    pub customer_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Insertable)]
#[diesel(table_name = users)]
#[serde(deny_unknown_fields)]
pub(crate) struct NewUserRow {
    #[serde(default = "Uuid::new_v4")]
    pub user_id: Uuid,
    pub customer_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub role: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, AsChangeset)]
#[diesel(table_name = users)]
#[serde(deny_unknown_fields, default)]
pub(crate) struct UserChanges {
    pub customer_id: Option<Uuid>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Queryable, Selectable)]
#[diesel(table_name = user_accounts, check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserAccountRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub account_id: Uuid,
    pub role: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Insertable)]
#[diesel(table_name = user_accounts)]
#[serde(deny_unknown_fields)]
pub(crate) struct NewUserAccountRow {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub user_id: Uuid,
    pub account_id: Uuid,
    pub role: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, AsChangeset)]
#[diesel(table_name = user_accounts)]
#[serde(deny_unknown_fields, default)]
pub(crate) struct UserAccountChanges {
    pub user_id: Option<Uuid>,
    pub account_id: Option<Uuid>,
    pub role: Option<String>,
    pub status: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Header-tier projection from the directory queries.
#[derive(Debug, QueryableByName)]
pub(crate) struct HeaderSqlRow {
    #[diesel(sql_type = SqlUuid)]
    pub user_id: Uuid,
    #[diesel(sql_type = Text)]
    pub first_name: String,
    #[diesel(sql_type = Text)]
    pub last_name: String,
}

/// Summary-tier projection from the directory queries.
#[derive(Debug, QueryableByName)]
pub(crate) struct SummarySqlRow {
    #[diesel(sql_type = SqlUuid)]
    pub user_id: Uuid,
    #[diesel(sql_type = Text)]
    pub first_name: String,
    #[diesel(sql_type = Text)]
    pub last_name: String,
    #[diesel(sql_type = Text)]
    pub email: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub phone: Option<String>,
    #[diesel(sql_type = Text)]
    pub role: String,
    #[diesel(sql_type = Text)]
    pub status: String,
}

/// Detail-tier projection for the account relation: summary columns
/// plus the joined account.
#[derive(Debug, QueryableByName)]
pub(crate) struct AccountDetailSqlRow {
    #[diesel(sql_type = SqlUuid)]
    pub user_id: Uuid,
    #[diesel(sql_type = Text)]
    pub first_name: String,
    #[diesel(sql_type = Text)]
    pub last_name: String,
    #[diesel(sql_type = Text)]
    pub email: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub phone: Option<String>,
    #[diesel(sql_type = Text)]
    pub role: String,
    #[diesel(sql_type = Text)]
    pub status: String,
    #[diesel(sql_type = SqlUuid)]
    pub account_id: Uuid,
    #[diesel(sql_type = Text)]
    pub account_number: String,
    #[diesel(sql_type = Text)]
    pub account_name: String,
    #[diesel(sql_type = Text)]
    pub account_role: String,
}

/// Detail-tier projection for the customer relation. The account link
/// columns come from a left join, so a user with no active accounts
/// yields one row with all four link columns null.
#[derive(Debug, QueryableByName)]
pub(crate) struct CustomerDetailSqlRow {
    #[diesel(sql_type = SqlUuid)]
    pub user_id: Uuid,
    #[diesel(sql_type = Text)]
    pub first_name: String,
    #[diesel(sql_type = Text)]
    pub last_name: String,
    #[diesel(sql_type = Text)]
    pub email: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub phone: Option<String>,
    #[diesel(sql_type = Text)]
    pub role: String,
    #[diesel(sql_type = Text)]
    pub status: String,
    #[diesel(sql_type = SqlUuid)]
    pub customer_id: Uuid,
    #[diesel(sql_type = Text)]
    pub customer_name: String,
    #[diesel(sql_type = Nullable<SqlUuid>)]
    pub link_account_id: Option<Uuid>,
    #[diesel(sql_type = Nullable<Text>)]
    pub link_account_number: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub link_account_name: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub link_role: Option<String>,
}
