//! Diesel table definitions for the CRM schema.
//!
//! Column sets here must stay in lockstep with the deployed database
//! schema; the row structs in [`super::models`] derive `Selectable`
//! against these tables so drift is caught at compile time.

diesel::table! {
    customers (customer_id) {
        customer_id -> Uuid,
        name -> Varchar,
        status -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    accounts (account_id) {
        account_id -> Uuid,
        customer_id -> Uuid,
        account_number -> Varchar,
        account_name -> Varchar,
        status -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    users (user_id) {
        user_id -> Uuid,
        customer_id -> Uuid,
        first_name -> Varchar,
        last_name -> Varchar,
        email -> Varchar,
        phone -> Nullable<Varchar>,
        role -> Varchar,
        status -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    user_accounts (id) {
        id -> Uuid,
        user_id -> Uuid,
        account_id -> Uuid,
        role -> Varchar,
        status -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(accounts -> customers (customer_id));
diesel::joinable!(users -> customers (customer_id));
diesel::joinable!(user_accounts -> users (user_id));
diesel::joinable!(user_accounts -> accounts (account_id));

diesel::allow_tables_to_appear_in_same_query!(customers, accounts, users, user_accounts);
