//! Behavioural coverage for the generic repository and its registry.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rstest::{fixture, rstest};
use serde_json::json;

use crate::domain::normalize::{normalize, Failure, NormalizeContext};
use crate::domain::ports::{Filter, SortKey, StorageError};
use crate::domain::{EntityName, ErrorCode, RequestId};
use crate::test_support::{record, FixedClock, MemoryStore, RecordingLog};

use super::*;

fn stamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).single().expect("valid stamp")
}

struct Harness {
    repository: EntityRepository,
    store: MemoryStore,
    log: Arc<RecordingLog>,
}

#[fixture]
fn customers() -> Harness {
    let log = Arc::new(RecordingLog::default());
    let repository = EntityRepository::new(
        EntityName::Customer,
        log.clone(),
        Arc::new(FixedClock::new(stamp())),
    );
    Harness {
        repository,
        store: MemoryStore::new(),
        log,
    }
}

fn customer_row(id: &str, name: &str, status: &str) -> crate::domain::ports::Record {
    record(&[
        ("customer_id", json!(id)),
        ("name", json!(name)),
        ("status", json!(status)),
        ("updated_at", json!("2024-01-01T00:00:00+00:00")),
    ])
}

#[rstest]
#[tokio::test]
async fn find_by_id_returns_none_for_missing_row(customers: Harness) {
    let found = customers
        .repository
        .find_by_id("c-404", &customers.store, &OperationContext::new())
        .await
        .expect("missing rows are not errors");
    assert!(found.is_none());
}

#[rstest]
#[case("")]
#[case("   ")]
#[tokio::test]
async fn blank_ids_fail_validation(customers: Harness, #[case] id: &str) {
    let err = customers
        .repository
        .find_by_id(id, &customers.store, &OperationContext::new())
        .await
        .expect_err("blank id must fail");
    assert!(matches!(
        err,
        RepositoryError::Validation { ref field, .. } if field == "customer_id"
    ));
}

#[rstest]
#[tokio::test]
async fn create_inserts_record_as_is(customers: Harness) {
    let created = customers
        .repository
        .create(
            customer_row("c-1", "Acme", "ACTIVE"),
            &customers.store,
            &OperationContext::new(),
        )
        .await
        .expect("create should succeed");

    assert_eq!(created.get("name"), Some(&json!("Acme")));
    assert_eq!(customers.store.rows(EntityName::Customer).len(), 1);
}

#[rstest]
#[tokio::test]
async fn create_rejects_empty_payloads(customers: Harness) {
    let err = customers
        .repository
        .create(record(&[]), &customers.store, &OperationContext::new())
        .await
        .expect_err("empty payload must fail");
    assert!(matches!(err, RepositoryError::Validation { .. }));
}

#[rstest]
#[tokio::test]
async fn duplicate_create_normalizes_to_conflict(customers: Harness) {
    customers
        .store
        .seed(EntityName::Customer, [customer_row("c-1", "Acme", "ACTIVE")]);

    let err = customers
        .repository
        .create(
            customer_row("c-1", "Acme Again", "ACTIVE"),
            &customers.store,
            &OperationContext::new(),
        )
        .await
        .expect_err("duplicate key must fail");

    let classified = normalize(Failure::from(err), &NormalizeContext::new(false));
    assert_eq!(classified.status_code(), 409);
    assert_eq!(classified.code().as_str(), "UNIQUE_CONSTRAINT_VIOLATION");
}

#[rstest]
#[tokio::test]
async fn update_stamps_modification_timestamp(customers: Harness) {
    customers
        .store
        .seed(EntityName::Customer, [customer_row("c-1", "Acme", "ACTIVE")]);
    let prior: DateTime<Utc> = "2024-01-01T00:00:00+00:00".parse().expect("valid prior");

    let updated = customers
        .repository
        .update_by_id(
            "c-1",
            record(&[
                ("status", json!("INACTIVE")),
                // caller-supplied timestamps are always overridden
                ("updated_at", json!("1999-01-01T00:00:00+00:00")),
            ]),
            &customers.store,
            &OperationContext::new(),
        )
        .await
        .expect("update should succeed");

    assert_eq!(updated.get("status"), Some(&json!("INACTIVE")));
    let stamped: DateTime<Utc> = updated
        .get("updated_at")
        .and_then(|value| value.as_str())
        .expect("updated_at present")
        .parse()
        .expect("valid timestamp");
    assert_eq!(stamped, stamp());
    assert!(stamped > prior);
}

#[rstest]
#[tokio::test]
async fn update_and_delete_translate_missing_rows(customers: Harness) {
    let err = customers
        .repository
        .update_by_id(
            "c-404",
            record(&[("status", json!("INACTIVE"))]),
            &customers.store,
            &OperationContext::new(),
        )
        .await
        .expect_err("missing row must fail");
    assert_eq!(
        err,
        RepositoryError::NotFound {
            entity: EntityName::Customer,
            id: "c-404".into(),
        }
    );

    let err = customers
        .repository
        .delete_by_id("c-404", &customers.store, &OperationContext::new())
        .await
        .expect_err("missing row must fail");
    let classified = normalize(Failure::from(err), &NormalizeContext::new(false));
    assert_eq!(classified.status_code(), 404);
    assert_eq!(classified.metadata().get("entity"), Some(&json!("customer")));
    assert_eq!(classified.metadata().get("id"), Some(&json!("c-404")));
}

#[rstest]
#[tokio::test]
async fn delete_removes_and_returns_the_record(customers: Harness) {
    customers
        .store
        .seed(EntityName::Customer, [customer_row("c-1", "Acme", "ACTIVE")]);

    let removed = customers
        .repository
        .delete_by_id("c-1", &customers.store, &OperationContext::new())
        .await
        .expect("delete should succeed");

    assert_eq!(removed.get("customer_id"), Some(&json!("c-1")));
    assert!(customers.store.rows(EntityName::Customer).is_empty());
}

#[rstest]
#[tokio::test]
async fn find_all_paginates_five_rows_two_at_a_time(customers: Harness) {
    customers.store.seed(
        EntityName::Customer,
        (1..=5).map(|n| customer_row(&format!("c-{n}"), &format!("Customer {n}"), "ACTIVE")),
    );

    let options = FindOptions {
        page_request: pagination::PageRequest::new(1, 2).expect("valid request"),
        filter: Filter::new(),
        order_by: vec![SortKey::asc("customer_id")],
    };
    let page = customers
        .repository
        .find_all(options, &customers.store, &OperationContext::new())
        .await
        .expect("find_all should succeed");

    assert_eq!(page.data.len(), 2);
    assert_eq!(page.total_count, 5);
    assert_eq!(page.total_pages, 3);
    assert!(page.has_next);
    assert!(!page.has_prev);
    assert_eq!(page.data[0].get("customer_id"), Some(&json!("c-1")));
}

#[rstest]
#[tokio::test]
async fn find_all_shares_one_filter_between_window_and_count(customers: Harness) {
    customers.store.seed(
        EntityName::Customer,
        [
            customer_row("c-1", "Acme", "ACTIVE"),
            customer_row("c-2", "Globex", "INACTIVE"),
            customer_row("c-3", "Initech", "ACTIVE"),
        ],
    );

    let options = FindOptions {
        filter: Filter::new().eq("status", json!("ACTIVE")),
        order_by: vec![SortKey::asc("name")],
        ..FindOptions::default()
    };
    let page = customers
        .repository
        .find_all(options, &customers.store, &OperationContext::new())
        .await
        .expect("find_all should succeed");

    assert_eq!(page.total_count, 2);
    assert_eq!(page.data.len(), 2);
    assert_eq!(page.data[0].get("name"), Some(&json!("Acme")));
    assert_eq!(page.data[1].get("name"), Some(&json!("Initech")));
}

#[rstest]
#[tokio::test]
async fn count_applies_the_filter(customers: Harness) {
    customers.store.seed(
        EntityName::Customer,
        [
            customer_row("c-1", "Acme", "ACTIVE"),
            customer_row("c-2", "Globex", "INACTIVE"),
        ],
    );

    let active = customers
        .repository
        .count(
            &Filter::new().eq("status", json!("ACTIVE")),
            &customers.store,
            &OperationContext::new(),
        )
        .await
        .expect("count should succeed");
    assert_eq!(active, 1);
}

#[rstest]
#[tokio::test]
async fn operations_report_to_the_log_even_on_failure(customers: Harness) {
    let request_id = RequestId::generate();
    customers.store.fail_next(StorageError::timeout("deadline"));

    let err = customers
        .repository
        .find_by_id(
            "c-1",
            &customers.store,
            &OperationContext::with_request_id(request_id),
        )
        .await
        .expect_err("injected failure must surface");
    assert!(matches!(
        err,
        RepositoryError::Storage { ref operation, .. } if operation == "find customer by ID"
    ));

    let entries = customers.log.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].operation, "find customer by ID");
    assert_eq!(entries[0].entity, EntityName::Customer);
    assert_eq!(entries[0].request_id, Some(request_id));
}

mod registry {
    use super::*;

    fn registry() -> RepositoryRegistry {
        RepositoryRegistry::new(
            Arc::new(RecordingLog::default()),
            Arc::new(FixedClock::new(stamp())),
        )
    }

    #[rstest]
    fn same_name_returns_reference_identical_instances() {
        let registry = registry();
        let first = registry.repository("customer").expect("known entity");
        let second = registry.repository("customer").expect("known entity");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[rstest]
    fn different_names_return_distinct_instances() {
        let registry = registry();
        let customers = registry.repository("customers").expect("known entity");
        let accounts = registry.repository("accounts").expect("known entity");
        assert!(!Arc::ptr_eq(&customers, &accounts));
        assert_eq!(customers.entity(), EntityName::Customer);
        assert_eq!(accounts.entity(), EntityName::Account);
        assert_eq!(registry.cached_count(), 2);
    }

    #[rstest]
    #[case("")]
    #[case("  ")]
    #[case("invoice")]
    fn blank_or_unknown_names_fail_validation(#[case] name: &str) {
        let err = registry().repository(name).expect_err("must fail");
        assert!(matches!(err, RepositoryError::Validation { .. }));
        let classified = normalize(Failure::from(err), &NormalizeContext::new(true));
        assert_eq!(classified.code(), ErrorCode::ValidationError);
    }

    #[rstest]
    fn clear_forces_reconstruction() {
        let registry = registry();
        let before = registry.repository_for(EntityName::User);
        registry.clear(Some(EntityName::User));
        let after = registry.repository_for(EntityName::User);
        assert!(!Arc::ptr_eq(&before, &after));

        registry.repository_for(EntityName::Account);
        registry.clear(None);
        assert_eq!(registry.cached_count(), 0);
    }
}
