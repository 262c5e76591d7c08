//! [`UserDirectory`] implementation over raw SQL projections.
//!
//! The directory views join across users, link rows, accounts, and
//! customers, which is awkward to express through the DSL, so each tier
//! runs a hand-written query with typed binds. Every join level filters
//! on `ACTIVE` status; an inactive link or account hides the association
//! without hiding the user.

use async_trait::async_trait;
use diesel::sql_types::Uuid as SqlUuid;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use super::error_mapping::map_diesel_error;
use super::models::{AccountDetailSqlRow, CustomerDetailSqlRow, HeaderSqlRow, SummarySqlRow};
use super::pool::DieselSession;
use crate::domain::directory::{
    AccountLink, AccountUserDetail, CustomerUserDetail, UserDirectory, UserHeader, UserSummary,
};
use crate::domain::ports::StorageError;

const ACCOUNT_HEADER_SQL: &str = "\
    SELECT u.user_id, u.first_name, u.last_name \
    FROM users u \
    JOIN user_accounts ua ON ua.user_id = u.user_id \
    JOIN accounts a ON a.account_id = ua.account_id \
    WHERE a.account_id = $1 \
      AND u.status = 'ACTIVE' AND ua.status = 'ACTIVE' AND a.status = 'ACTIVE' \
    ORDER BY u.last_name, u.first_name";

const ACCOUNT_SUMMARY_SQL: &str = "\
    SELECT u.user_id, u.first_name, u.last_name, u.email, u.phone, u.role, u.status \
    FROM users u \
    JOIN user_accounts ua ON ua.user_id = u.user_id \
    JOIN accounts a ON a.account_id = ua.account_id \
    WHERE a.account_id = $1 \
      AND u.status = 'ACTIVE' AND ua.status = 'ACTIVE' AND a.status = 'ACTIVE' \
    ORDER BY u.last_name, u.first_name";

const ACCOUNT_DETAIL_SQL: &str = "\
    SELECT u.user_id, u.first_name, u.last_name, u.email, u.phone, u.role, u.status, \
           a.account_id, a.account_number, a.account_name, ua.role AS account_role \
    FROM users u \
    JOIN user_accounts ua ON ua.user_id = u.user_id \
    JOIN accounts a ON a.account_id = ua.account_id \
    WHERE a.account_id = $1 \
      AND u.status = 'ACTIVE' AND ua.status = 'ACTIVE' AND a.status = 'ACTIVE' \
    ORDER BY u.last_name, u.first_name";

const CUSTOMER_HEADER_SQL: &str = "\
    SELECT u.user_id, u.first_name, u.last_name \
    FROM users u \
    JOIN customers c ON c.customer_id = u.customer_id \
    WHERE c.customer_id = $1 \
      AND u.status = 'ACTIVE' AND c.status = 'ACTIVE' \
    ORDER BY u.last_name, u.first_name";

const CUSTOMER_SUMMARY_SQL: &str = "\
    SELECT u.user_id, u.first_name, u.last_name, u.email, u.phone, u.role, u.status \
    FROM users u \
    JOIN customers c ON c.customer_id = u.customer_id \
    WHERE c.customer_id = $1 \
      AND u.status = 'ACTIVE' AND c.status = 'ACTIVE' \
    ORDER BY u.last_name, u.first_name";

// Left joins keep users with no active accounts; their link columns come
// back null and fold into an empty association list.
const CUSTOMER_DETAIL_SQL: &str = "\
    SELECT u.user_id, u.first_name, u.last_name, u.email, u.phone, u.role, u.status, \
           c.customer_id, c.name AS customer_name, \
           a.account_id AS link_account_id, a.account_number AS link_account_number, \
           a.account_name AS link_account_name, ua.role AS link_role \
    FROM users u \
    JOIN customers c ON c.customer_id = u.customer_id \
    LEFT JOIN user_accounts ua ON ua.user_id = u.user_id AND ua.status = 'ACTIVE' \
    LEFT JOIN accounts a ON a.account_id = ua.account_id AND a.status = 'ACTIVE' \
    WHERE c.customer_id = $1 \
      AND u.status = 'ACTIVE' AND c.status = 'ACTIVE' \
    ORDER BY u.last_name, u.first_name, a.account_number";

fn header_from(row: HeaderSqlRow) -> UserHeader {
    UserHeader {
        user_id: row.user_id,
        first_name: row.first_name,
        last_name: row.last_name,
    }
}

fn summary_from(row: SummarySqlRow) -> UserSummary {
    UserSummary {
        user_id: row.user_id,
        first_name: row.first_name,
        last_name: row.last_name,
        email: row.email,
        phone: row.phone,
        role: row.role,
        status: row.status,
    }
}

fn account_detail_from(row: AccountDetailSqlRow) -> AccountUserDetail {
    AccountUserDetail {
        user: UserSummary {
            user_id: row.user_id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
            role: row.role,
            status: row.status,
        },
        account_id: row.account_id,
        account_number: row.account_number,
        account_name: row.account_name,
        account_role: row.account_role,
    }
}

/// Collapse the left-joined rows into one detail record per user.
///
/// Rows arrive ordered by user then account number, so consecutive rows
/// for the same user fold into the open record's account list.
fn fold_customer_detail(rows: Vec<CustomerDetailSqlRow>) -> Vec<CustomerUserDetail> {
    let mut details: Vec<CustomerUserDetail> = Vec::new();
    for row in rows {
        let link = match (
            row.link_account_id,
            row.link_account_number,
            row.link_account_name,
            row.link_role,
        ) {
            (Some(account_id), Some(account_number), Some(account_name), Some(role)) => {
                Some(AccountLink {
                    account_id,
                    account_number,
                    account_name,
                    role,
                })
            }
            _ => None,
        };

        match details.last_mut() {
            Some(open) if open.user.user_id == row.user_id => {
                if let Some(link) = link {
                    open.accounts.push(link);
                }
            }
            _ => details.push(CustomerUserDetail {
                user: UserSummary {
                    user_id: row.user_id,
                    first_name: row.first_name,
                    last_name: row.last_name,
                    email: row.email,
                    phone: row.phone,
                    role: row.role,
                    status: row.status,
                },
                customer_id: row.customer_id,
                customer_name: row.customer_name,
                accounts: link.into_iter().collect(),
            }),
        }
    }
    details
}

#[async_trait]
impl UserDirectory for DieselSession {
    async fn users_by_account_header(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<UserHeader>, StorageError> {
        let mut conn = self.connection().await;
        let rows: Vec<HeaderSqlRow> = diesel::sql_query(ACCOUNT_HEADER_SQL)
            .bind::<SqlUuid, _>(account_id)
            .load(&mut *conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(header_from).collect())
    }

    async fn users_by_account_summary(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<UserSummary>, StorageError> {
        let mut conn = self.connection().await;
        let rows: Vec<SummarySqlRow> = diesel::sql_query(ACCOUNT_SUMMARY_SQL)
            .bind::<SqlUuid, _>(account_id)
            .load(&mut *conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(summary_from).collect())
    }

    async fn users_by_account_detail(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<AccountUserDetail>, StorageError> {
        let mut conn = self.connection().await;
        let rows: Vec<AccountDetailSqlRow> = diesel::sql_query(ACCOUNT_DETAIL_SQL)
            .bind::<SqlUuid, _>(account_id)
            .load(&mut *conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(account_detail_from).collect())
    }

    async fn users_by_customer_header(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<UserHeader>, StorageError> {
        let mut conn = self.connection().await;
        let rows: Vec<HeaderSqlRow> = diesel::sql_query(CUSTOMER_HEADER_SQL)
            .bind::<SqlUuid, _>(customer_id)
            .load(&mut *conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(header_from).collect())
    }

    async fn users_by_customer_summary(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<UserSummary>, StorageError> {
        let mut conn = self.connection().await;
        let rows: Vec<SummarySqlRow> = diesel::sql_query(CUSTOMER_SUMMARY_SQL)
            .bind::<SqlUuid, _>(customer_id)
            .load(&mut *conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(summary_from).collect())
    }

    async fn users_by_customer_detail(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<CustomerUserDetail>, StorageError> {
        let mut conn = self.connection().await;
        let rows: Vec<CustomerDetailSqlRow> = diesel::sql_query(CUSTOMER_DETAIL_SQL)
            .bind::<SqlUuid, _>(customer_id)
            .load(&mut *conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(fold_customer_detail(rows))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn detail_row(
        user_id: Uuid,
        last_name: &str,
        link: Option<(&str, &str)>,
    ) -> CustomerDetailSqlRow {
        CustomerDetailSqlRow {
            user_id,
            first_name: "Avery".into(),
            last_name: last_name.into(),
            email: "avery@example.com".into(),
            phone: None,
            role: "ADMIN".into(),
            status: "ACTIVE".into(),
            customer_id: Uuid::nil(),
            customer_name: "Acme".into(),
            link_account_id: link.map(|_| Uuid::new_v4()),
            link_account_number: link.map(|(number, _)| number.to_owned()),
            link_account_name: link.map(|(_, name)| name.to_owned()),
            link_role: link.map(|_| "VIEWER".to_owned()),
        }
    }

    #[rstest]
    fn folds_consecutive_rows_for_one_user() {
        let user = Uuid::new_v4();
        let rows = vec![
            detail_row(user, "Quint", Some(("ACC-001", "Operating"))),
            detail_row(user, "Quint", Some(("ACC-002", "Savings"))),
        ];

        let details = fold_customer_detail(rows);

        assert_eq!(details.len(), 1);
        let accounts: Vec<&str> = details
            .as_slice()
            .first()
            .map(|d| d.accounts.iter().map(|a| a.account_number.as_str()).collect())
            .unwrap_or_default();
        assert_eq!(accounts, vec!["ACC-001", "ACC-002"]);
    }

    #[rstest]
    fn user_without_active_accounts_gets_empty_list() {
        let rows = vec![detail_row(Uuid::new_v4(), "Sole", None)];

        let details = fold_customer_detail(rows);

        assert_eq!(details.len(), 1);
        assert!(details.as_slice().first().is_some_and(|d| d.accounts.is_empty()));
    }

    #[rstest]
    fn distinct_users_stay_distinct() {
        let rows = vec![
            detail_row(Uuid::new_v4(), "First", Some(("ACC-001", "Operating"))),
            detail_row(Uuid::new_v4(), "Second", None),
        ];

        let details = fold_customer_detail(rows);

        assert_eq!(details.len(), 2);
    }
}
