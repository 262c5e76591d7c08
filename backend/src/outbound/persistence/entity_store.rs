//! [`EntityStore`] implementation over Diesel PostgreSQL.
//!
//! The generic record shape crosses into typed Diesel queries here: each
//! entity dispatches to its own table with a column whitelist for filter
//! and sort fields, so an unsupported field fails loudly as a query error
//! instead of being silently dropped.

use async_trait::async_trait;
use diesel::pg::Pg;
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use super::error_mapping::map_diesel_error;
use super::models::{
    AccountChanges, AccountRow, CustomerChanges, CustomerRow, NewAccountRow, NewCustomerRow,
    NewUserAccountRow, NewUserRow, UserAccountChanges, UserAccountRow, UserChanges, UserRow,
};
use super::pool::DieselSession;
use super::schema::{accounts, customers, user_accounts, users};
use crate::domain::EntityName;
use crate::domain::ports::{
    Condition, EntityStore, Filter, Record, SortDirection, SortKey, StorageError, WindowQuery,
};

fn ensure_key_field(entity: EntityName, key_field: &str) -> Result<(), StorageError> {
    if key_field == entity.primary_key_field() {
        Ok(())
    } else {
        Err(StorageError::query(format!(
            "unsupported key field {key_field} for {}",
            entity.table()
        )))
    }
}

fn parse_uuid(entity: EntityName, id: &str) -> Result<Uuid, StorageError> {
    Uuid::parse_str(id).map_err(|_| {
        StorageError::query(format!("malformed {} identifier: {id}", entity.table()))
    })
}

fn from_payload<T: DeserializeOwned>(entity: EntityName, data: Record) -> Result<T, StorageError> {
    serde_json::from_value(Value::Object(data))
        .map_err(|err| StorageError::query(format!("invalid {} payload: {err}", entity.table())))
}

fn to_record<T: Serialize>(row: T) -> Result<Record, StorageError> {
    match serde_json::to_value(row) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(StorageError::query("row did not serialise to an object")),
        Err(err) => Err(StorageError::query(err.to_string())),
    }
}

fn condition_text(entity: EntityName, condition: &Condition) -> Result<String, StorageError> {
    match &condition.value {
        Value::String(text) => Ok(text.clone()),
        other => Err(StorageError::query(format!(
            "filter on {}.{} expects a string, got {other}",
            entity.table(),
            condition.field
        ))),
    }
}

fn condition_uuid(entity: EntityName, condition: &Condition) -> Result<Uuid, StorageError> {
    let text = condition_text(entity, condition)?;
    Uuid::parse_str(&text).map_err(|_| {
        StorageError::query(format!(
            "filter on {}.{} expects a UUID, got {text}",
            entity.table(),
            condition.field
        ))
    })
}

fn unsupported_filter(entity: EntityName, field: &str) -> StorageError {
    StorageError::query(format!(
        "unsupported filter field {field} for {}",
        entity.table()
    ))
}

fn unsupported_sort(entity: EntityName, field: &str) -> StorageError {
    StorageError::query(format!(
        "unsupported sort field {field} for {}",
        entity.table()
    ))
}

/// Primary-key CRUD for one table. The window and count queries stay
/// hand-written below because their column whitelists differ per table.
macro_rules! entity_crud {
    ($prefix:ident, $entity:expr, $table:ident, $pk:ident, $row:ty, $new:ty, $changes:ty) => {
        paste::paste! {
            async fn [<$prefix _find_unique>](
                conn: &mut AsyncPgConnection,
                id: Uuid,
            ) -> Result<Option<Record>, StorageError> {
                let row: Option<$row> = $table::table
                    .filter($table::$pk.eq(id))
                    .first(conn)
                    .await
                    .optional()
                    .map_err(map_diesel_error)?;
                row.map(to_record).transpose()
            }

            async fn [<$prefix _create>](
                conn: &mut AsyncPgConnection,
                data: Record,
            ) -> Result<Record, StorageError> {
                let new_row: $new = from_payload($entity, data)?;
                let row: $row = diesel::insert_into($table::table)
                    .values(&new_row)
                    .get_result(conn)
                    .await
                    .map_err(map_diesel_error)?;
                to_record(row)
            }

            async fn [<$prefix _update>](
                conn: &mut AsyncPgConnection,
                id: Uuid,
                data: Record,
            ) -> Result<Record, StorageError> {
                let changes: $changes = from_payload($entity, data)?;
                let row: $row = diesel::update($table::table.filter($table::$pk.eq(id)))
                    .set(&changes)
                    .get_result(conn)
                    .await
                    .map_err(map_diesel_error)?;
                to_record(row)
            }

            async fn [<$prefix _delete>](
                conn: &mut AsyncPgConnection,
                id: Uuid,
            ) -> Result<Record, StorageError> {
                let row: $row = diesel::delete($table::table.filter($table::$pk.eq(id)))
                    .get_result(conn)
                    .await
                    .map_err(map_diesel_error)?;
                to_record(row)
            }
        }
    };
}

entity_crud!(
    customer,
    EntityName::Customer,
    customers,
    customer_id,
    CustomerRow,
    NewCustomerRow,
    CustomerChanges
);
entity_crud!(
    account,
    EntityName::Account,
    accounts,
    account_id,
    AccountRow,
    NewAccountRow,
    AccountChanges
);
entity_crud!(user, EntityName::User, users, user_id, UserRow, NewUserRow, UserChanges);
entity_crud!(
    user_account,
    EntityName::UserAccount,
    user_accounts,
    id,
    UserAccountRow,
    NewUserAccountRow,
    UserAccountChanges
);

fn customers_filtered(filter: &Filter) -> Result<customers::BoxedQuery<'static, Pg>, StorageError> {
    const ENTITY: EntityName = EntityName::Customer;
    let mut query = customers::table.into_boxed();
    for condition in filter.conditions() {
        query = match condition.field.as_str() {
            "customer_id" => query.filter(customers::customer_id.eq(condition_uuid(ENTITY, condition)?)),
            "name" => query.filter(customers::name.eq(condition_text(ENTITY, condition)?)),
            "status" => query.filter(customers::status.eq(condition_text(ENTITY, condition)?)),
            other => return Err(unsupported_filter(ENTITY, other)),
        };
    }
    Ok(query)
}

fn customers_ordered(
    query: customers::BoxedQuery<'static, Pg>,
    key: &SortKey,
) -> Result<customers::BoxedQuery<'static, Pg>, StorageError> {
    use SortDirection::{Asc, Desc};
    Ok(match (key.field.as_str(), key.direction) {
        ("name", Asc) => query.then_order_by(customers::name.asc()),
        ("name", Desc) => query.then_order_by(customers::name.desc()),
        ("status", Asc) => query.then_order_by(customers::status.asc()),
        ("status", Desc) => query.then_order_by(customers::status.desc()),
        ("created_at", Asc) => query.then_order_by(customers::created_at.asc()),
        ("created_at", Desc) => query.then_order_by(customers::created_at.desc()),
        ("updated_at", Asc) => query.then_order_by(customers::updated_at.asc()),
        ("updated_at", Desc) => query.then_order_by(customers::updated_at.desc()),
        (other, _) => return Err(unsupported_sort(EntityName::Customer, other)),
    })
}

async fn customers_find_many(
    conn: &mut AsyncPgConnection,
    window: &WindowQuery,
) -> Result<Vec<Record>, StorageError> {
    let mut query = customers_filtered(&window.filter)?;
    for key in &window.order_by {
        query = customers_ordered(query, key)?;
    }
    let rows: Vec<CustomerRow> = query
        .offset(window.skip)
        .limit(window.take)
        .load(conn)
        .await
        .map_err(map_diesel_error)?;
    rows.into_iter().map(to_record).collect()
}

async fn customers_count(
    conn: &mut AsyncPgConnection,
    filter: &Filter,
) -> Result<u64, StorageError> {
    let total: i64 = customers_filtered(filter)?
        .count()
        .get_result(conn)
        .await
        .map_err(map_diesel_error)?;
    Ok(u64::try_from(total).unwrap_or(0))
}

fn accounts_filtered(filter: &Filter) -> Result<accounts::BoxedQuery<'static, Pg>, StorageError> {
    const ENTITY: EntityName = EntityName::Account;
    let mut query = accounts::table.into_boxed();
    for condition in filter.conditions() {
        query = match condition.field.as_str() {
            "account_id" => query.filter(accounts::account_id.eq(condition_uuid(ENTITY, condition)?)),
            "customer_id" => query.filter(accounts::customer_id.eq(condition_uuid(ENTITY, condition)?)),
            "account_number" => {
                query.filter(accounts::account_number.eq(condition_text(ENTITY, condition)?))
            }
            "account_name" => {
                query.filter(accounts::account_name.eq(condition_text(ENTITY, condition)?))
            }
            "status" => query.filter(accounts::status.eq(condition_text(ENTITY, condition)?)),
            other => return Err(unsupported_filter(ENTITY, other)),
        };
    }
    Ok(query)
}

fn accounts_ordered(
    query: accounts::BoxedQuery<'static, Pg>,
    key: &SortKey,
) -> Result<accounts::BoxedQuery<'static, Pg>, StorageError> {
    use SortDirection::{Asc, Desc};
    Ok(match (key.field.as_str(), key.direction) {
        ("account_number", Asc) => query.then_order_by(accounts::account_number.asc()),
        ("account_number", Desc) => query.then_order_by(accounts::account_number.desc()),
        ("account_name", Asc) => query.then_order_by(accounts::account_name.asc()),
        ("account_name", Desc) => query.then_order_by(accounts::account_name.desc()),
        ("status", Asc) => query.then_order_by(accounts::status.asc()),
        ("status", Desc) => query.then_order_by(accounts::status.desc()),
        ("created_at", Asc) => query.then_order_by(accounts::created_at.asc()),
        ("created_at", Desc) => query.then_order_by(accounts::created_at.desc()),
        ("updated_at", Asc) => query.then_order_by(accounts::updated_at.asc()),
        ("updated_at", Desc) => query.then_order_by(accounts::updated_at.desc()),
        (other, _) => return Err(unsupported_sort(EntityName::Account, other)),
    })
}

async fn accounts_find_many(
    conn: &mut AsyncPgConnection,
    window: &WindowQuery,
) -> Result<Vec<Record>, StorageError> {
    let mut query = accounts_filtered(&window.filter)?;
    for key in &window.order_by {
        query = accounts_ordered(query, key)?;
    }
    let rows: Vec<AccountRow> = query
        .offset(window.skip)
        .limit(window.take)
        .load(conn)
        .await
        .map_err(map_diesel_error)?;
    rows.into_iter().map(to_record).collect()
}

async fn accounts_count(
    conn: &mut AsyncPgConnection,
    filter: &Filter,
) -> Result<u64, StorageError> {
    let total: i64 = accounts_filtered(filter)?
        .count()
        .get_result(conn)
        .await
        .map_err(map_diesel_error)?;
    Ok(u64::try_from(total).unwrap_or(0))
}

fn users_filtered(filter: &Filter) -> Result<users::BoxedQuery<'static, Pg>, StorageError> {
    const ENTITY: EntityName = EntityName::User;
    let mut query = users::table.into_boxed();
    for condition in filter.conditions() {
        query = match condition.field.as_str() {
            "user_id" => query.filter(users::user_id.eq(condition_uuid(ENTITY, condition)?)),
            "customer_id" => query.filter(users::customer_id.eq(condition_uuid(ENTITY, condition)?)),
            "first_name" => query.filter(users::first_name.eq(condition_text(ENTITY, condition)?)),
            "last_name" => query.filter(users::last_name.eq(condition_text(ENTITY, condition)?)),
            "email" => query.filter(users::email.eq(condition_text(ENTITY, condition)?)),
            "role" => query.filter(users::role.eq(condition_text(ENTITY, condition)?)),
            "status" => query.filter(users::status.eq(condition_text(ENTITY, condition)?)),
            other => return Err(unsupported_filter(ENTITY, other)),
        };
    }
    Ok(query)
}

fn users_ordered(
    query: users::BoxedQuery<'static, Pg>,
    key: &SortKey,
) -> Result<users::BoxedQuery<'static, Pg>, StorageError> {
    use SortDirection::{Asc, Desc};
    Ok(match (key.field.as_str(), key.direction) {
        ("first_name", Asc) => query.then_order_by(users::first_name.asc()),
        ("first_name", Desc) => query.then_order_by(users::first_name.desc()),
        ("last_name", Asc) => query.then_order_by(users::last_name.asc()),
        ("last_name", Desc) => query.then_order_by(users::last_name.desc()),
        ("email", Asc) => query.then_order_by(users::email.asc()),
        ("email", Desc) => query.then_order_by(users::email.desc()),
        ("role", Asc) => query.then_order_by(users::role.asc()),
        ("role", Desc) => query.then_order_by(users::role.desc()),
        ("status", Asc) => query.then_order_by(users::status.asc()),
        ("status", Desc) => query.then_order_by(users::status.desc()),
        ("created_at", Asc) => query.then_order_by(users::created_at.asc()),
        ("created_at", Desc) => query.then_order_by(users::created_at.desc()),
        ("updated_at", Asc) => query.then_order_by(users::updated_at.asc()),
        ("updated_at", Desc) => query.then_order_by(users::updated_at.desc()),
        (other, _) => return Err(unsupported_sort(EntityName::User, other)),
    })
}

async fn users_find_many(
    conn: &mut AsyncPgConnection,
    window: &WindowQuery,
) -> Result<Vec<Record>, StorageError> {
    let mut query = users_filtered(&window.filter)?;
    for key in &window.order_by {
        query = users_ordered(query, key)?;
    }
    let rows: Vec<UserRow> = query
        .offset(window.skip)
        .limit(window.take)
        .load(conn)
        .await
        .map_err(map_diesel_error)?;
    rows.into_iter().map(to_record).collect()
}

async fn users_count(conn: &mut AsyncPgConnection, filter: &Filter) -> Result<u64, StorageError> {
    let total: i64 = users_filtered(filter)?
        .count()
        .get_result(conn)
        .await
        .map_err(map_diesel_error)?;
    Ok(u64::try_from(total).unwrap_or(0))
}

fn user_accounts_filtered(
    filter: &Filter,
) -> Result<user_accounts::BoxedQuery<'static, Pg>, StorageError> {
    const ENTITY: EntityName = EntityName::UserAccount;
    let mut query = user_accounts::table.into_boxed();
    for condition in filter.conditions() {
        query = match condition.field.as_str() {
            "id" => query.filter(user_accounts::id.eq(condition_uuid(ENTITY, condition)?)),
            "user_id" => query.filter(user_accounts::user_id.eq(condition_uuid(ENTITY, condition)?)),
            "account_id" => {
                query.filter(user_accounts::account_id.eq(condition_uuid(ENTITY, condition)?))
            }
            "role" => query.filter(user_accounts::role.eq(condition_text(ENTITY, condition)?)),
            "status" => query.filter(user_accounts::status.eq(condition_text(ENTITY, condition)?)),
            other => return Err(unsupported_filter(ENTITY, other)),
        };
    }
    Ok(query)
}

fn user_accounts_ordered(
    query: user_accounts::BoxedQuery<'static, Pg>,
    key: &SortKey,
) -> Result<user_accounts::BoxedQuery<'static, Pg>, StorageError> {
    use SortDirection::{Asc, Desc};
    Ok(match (key.field.as_str(), key.direction) {
        ("role", Asc) => query.then_order_by(user_accounts::role.asc()),
        ("role", Desc) => query.then_order_by(user_accounts::role.desc()),
        ("status", Asc) => query.then_order_by(user_accounts::status.asc()),
        ("status", Desc) => query.then_order_by(user_accounts::status.desc()),
        ("created_at", Asc) => query.then_order_by(user_accounts::created_at.asc()),
        ("created_at", Desc) => query.then_order_by(user_accounts::created_at.desc()),
        ("updated_at", Asc) => query.then_order_by(user_accounts::updated_at.asc()),
        ("updated_at", Desc) => query.then_order_by(user_accounts::updated_at.desc()),
        (other, _) => return Err(unsupported_sort(EntityName::UserAccount, other)),
    })
}

async fn user_accounts_find_many(
    conn: &mut AsyncPgConnection,
    window: &WindowQuery,
) -> Result<Vec<Record>, StorageError> {
    let mut query = user_accounts_filtered(&window.filter)?;
    for key in &window.order_by {
        query = user_accounts_ordered(query, key)?;
    }
    let rows: Vec<UserAccountRow> = query
        .offset(window.skip)
        .limit(window.take)
        .load(conn)
        .await
        .map_err(map_diesel_error)?;
    rows.into_iter().map(to_record).collect()
}

async fn user_accounts_count(
    conn: &mut AsyncPgConnection,
    filter: &Filter,
) -> Result<u64, StorageError> {
    let total: i64 = user_accounts_filtered(filter)?
        .count()
        .get_result(conn)
        .await
        .map_err(map_diesel_error)?;
    Ok(u64::try_from(total).unwrap_or(0))
}

#[async_trait]
impl EntityStore for DieselSession {
    async fn find_unique(
        &self,
        entity: EntityName,
        key_field: &str,
        id: &str,
    ) -> Result<Option<Record>, StorageError> {
        ensure_key_field(entity, key_field)?;
        let id = parse_uuid(entity, id)?;
        let mut conn = self.connection().await;
        match entity {
            EntityName::Customer => customer_find_unique(&mut conn, id).await,
            EntityName::Account => account_find_unique(&mut conn, id).await,
            EntityName::User => user_find_unique(&mut conn, id).await,
            EntityName::UserAccount => user_account_find_unique(&mut conn, id).await,
        }
    }

    async fn create(&self, entity: EntityName, data: Record) -> Result<Record, StorageError> {
        let mut conn = self.connection().await;
        match entity {
            EntityName::Customer => customer_create(&mut conn, data).await,
            EntityName::Account => account_create(&mut conn, data).await,
            EntityName::User => user_create(&mut conn, data).await,
            EntityName::UserAccount => user_account_create(&mut conn, data).await,
        }
    }

    async fn update(
        &self,
        entity: EntityName,
        key_field: &str,
        id: &str,
        data: Record,
    ) -> Result<Record, StorageError> {
        ensure_key_field(entity, key_field)?;
        let id = parse_uuid(entity, id)?;
        let mut conn = self.connection().await;
        match entity {
            EntityName::Customer => customer_update(&mut conn, id, data).await,
            EntityName::Account => account_update(&mut conn, id, data).await,
            EntityName::User => user_update(&mut conn, id, data).await,
            EntityName::UserAccount => user_account_update(&mut conn, id, data).await,
        }
    }

    async fn delete(
        &self,
        entity: EntityName,
        key_field: &str,
        id: &str,
    ) -> Result<Record, StorageError> {
        ensure_key_field(entity, key_field)?;
        let id = parse_uuid(entity, id)?;
        let mut conn = self.connection().await;
        match entity {
            EntityName::Customer => customer_delete(&mut conn, id).await,
            EntityName::Account => account_delete(&mut conn, id).await,
            EntityName::User => user_delete(&mut conn, id).await,
            EntityName::UserAccount => user_account_delete(&mut conn, id).await,
        }
    }

    async fn find_many(
        &self,
        entity: EntityName,
        query: &WindowQuery,
    ) -> Result<Vec<Record>, StorageError> {
        let mut conn = self.connection().await;
        match entity {
            EntityName::Customer => customers_find_many(&mut conn, query).await,
            EntityName::Account => accounts_find_many(&mut conn, query).await,
            EntityName::User => users_find_many(&mut conn, query).await,
            EntityName::UserAccount => user_accounts_find_many(&mut conn, query).await,
        }
    }

    async fn count(&self, entity: EntityName, filter: &Filter) -> Result<u64, StorageError> {
        let mut conn = self.connection().await;
        match entity {
            EntityName::Customer => customers_count(&mut conn, filter).await,
            EntityName::Account => accounts_count(&mut conn, filter).await,
            EntityName::User => users_count(&mut conn, filter).await,
            EntityName::UserAccount => user_accounts_count(&mut conn, filter).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    #[case(EntityName::Customer, "customer_id")]
    #[case(EntityName::Account, "account_id")]
    #[case(EntityName::User, "user_id")]
    #[case(EntityName::UserAccount, "id")]
    fn accepts_the_declared_key_field(#[case] entity: EntityName, #[case] key_field: &str) {
        assert!(ensure_key_field(entity, key_field).is_ok());
    }

    #[rstest]
    fn rejects_foreign_key_fields_as_lookup_keys() {
        let err = ensure_key_field(EntityName::User, "email").unwrap_err();

        assert!(err.to_string().contains("unsupported key field email"));
    }

    #[rstest]
    fn rejects_malformed_identifiers() {
        let err = parse_uuid(EntityName::Customer, "not-a-uuid").unwrap_err();

        assert!(matches!(err, StorageError::Query { .. }));
        assert!(err.to_string().contains("customers"));
    }

    #[rstest]
    fn filter_builder_rejects_unknown_columns() {
        let filter = Filter::new().eq("favourite_colour", json!("teal"));

        let err = customers_filtered(&filter).map(|_| ()).unwrap_err();

        assert!(
            err.to_string()
                .contains("unsupported filter field favourite_colour")
        );
    }

    #[rstest]
    fn filter_builder_rejects_non_string_uuid_values() {
        let filter = Filter::new().eq("customer_id", json!(42));

        let err = users_filtered(&filter).map(|_| ()).unwrap_err();

        assert!(err.to_string().contains("expects a string"));
    }

    #[rstest]
    fn sort_builder_rejects_unknown_columns() {
        let query = accounts_filtered(&Filter::new()).unwrap();

        let err = accounts_ordered(query, &SortKey::asc("balance"))
            .map(|_| ())
            .unwrap_err();

        assert!(err.to_string().contains("unsupported sort field balance"));
    }

    #[rstest]
    fn rows_serialise_to_records() {
        let row = CustomerRow {
            customer_id: Uuid::nil(),
            name: "Acme".into(),
            status: "ACTIVE".into(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };

        let record = to_record(row).unwrap();

        assert_eq!(record.get("name"), Some(&json!("Acme")));
        assert!(record.contains_key("customer_id"));
    }

    #[rstest]
    fn create_payload_rejects_unknown_fields() {
        let mut data = Record::new();
        data.insert("name".into(), json!("Acme"));
        data.insert("shoe_size".into(), json!(9));

        let err = from_payload::<NewCustomerRow>(EntityName::Customer, data).unwrap_err();

        assert!(err.to_string().contains("invalid customers payload"));
    }
}
