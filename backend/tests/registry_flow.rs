//! End-to-end flows through the registry, repositories, and the error
//! normaliser, using the in-memory store ports.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rstest::rstest;
use serde_json::json;
use uuid::Uuid;

use crm_backend::domain::directory::{
    ProjectionRows, ProjectionTier, Relation, UserDirectoryService,
};
use crm_backend::domain::ports::Filter;
use crm_backend::repository::{FindOptions, OperationContext, RepositoryRegistry};
use crm_backend::test_support::{
    AccountFixture, CustomerFixture, FixedClock, LinkFixture, MemoryDirectory, MemoryStore,
    RecordingLog, UserFixture, record,
};
use crm_backend::{EntityName, ErrorCode, Failure, NormalizeContext, RequestId};
use pagination::PageRequest;

const STAMP: &str = "2025-06-01T12:00:00Z";

fn fixed_clock() -> Arc<FixedClock> {
    let now: DateTime<Utc> = STAMP.parse().expect("valid timestamp");
    Arc::new(FixedClock::new(now))
}

fn registry_with_log() -> (RepositoryRegistry, Arc<RecordingLog>) {
    let log = Arc::new(RecordingLog::default());
    let registry = RepositoryRegistry::new(log.clone(), fixed_clock());
    (registry, log)
}

#[rstest]
#[tokio::test]
async fn crud_round_trip_through_the_registry() {
    let (registry, log) = registry_with_log();
    let store = MemoryStore::new();
    let ctx = OperationContext::new();
    let repository = registry.repository("customers").expect("known entity");

    let id = Uuid::new_v4().to_string();
    let created = repository
        .create(
            record(&[
                ("customer_id", json!(id.clone())),
                ("name", json!("Acme Industrial")),
                ("status", json!("ACTIVE")),
                ("updated_at", json!("2024-01-01T00:00:00+00:00")),
            ]),
            &store,
            &ctx,
        )
        .await
        .expect("create should succeed");
    assert_eq!(created.get("name"), Some(&json!("Acme Industrial")));

    let found = repository
        .find_by_id(&id, &store, &ctx)
        .await
        .expect("lookup should succeed")
        .expect("record should exist");
    assert_eq!(found.get("customer_id"), Some(&json!(id.clone())));

    let updated = repository
        .update_by_id(&id, record(&[("status", json!("SUSPENDED"))]), &store, &ctx)
        .await
        .expect("update should succeed");
    assert_eq!(updated.get("status"), Some(&json!("SUSPENDED")));
    // The clock stamps every update, overriding whatever was stored.
    assert_eq!(
        updated.get("updated_at"),
        Some(&json!("2025-06-01T12:00:00+00:00"))
    );

    let deleted = repository
        .delete_by_id(&id, &store, &ctx)
        .await
        .expect("delete should succeed");
    assert_eq!(deleted.get("customer_id"), Some(&json!(id.clone())));
    assert!(
        repository
            .find_by_id(&id, &store, &ctx)
            .await
            .expect("lookup should succeed")
            .is_none()
    );

    let operations: Vec<String> = log
        .entries()
        .into_iter()
        .map(|entry| entry.operation)
        .collect();
    assert_eq!(
        operations,
        vec![
            "create customer",
            "find customer by ID",
            "update customer by ID",
            "delete customer by ID",
            "find customer by ID",
        ]
    );
}

#[rstest]
#[tokio::test]
async fn find_all_pages_share_their_filter_with_the_count() {
    let (registry, _log) = registry_with_log();
    let store = MemoryStore::new();
    let ctx = OperationContext::new();
    let repository = registry.repository_for(EntityName::User);

    let customer = Uuid::new_v4().to_string();
    store.seed(
        EntityName::User,
        (0..5).map(|n| {
            record(&[
                ("user_id", json!(Uuid::new_v4().to_string())),
                ("customer_id", json!(customer.clone())),
                ("last_name", json!(format!("User{n}"))),
                ("status", json!(if n < 4 { "ACTIVE" } else { "INACTIVE" })),
            ])
        }),
    );

    let options = FindOptions {
        page_request: PageRequest::new(1, 3).expect("valid request"),
        filter: Filter::new().eq("status", json!("ACTIVE")),
        order_by: vec![],
    };
    let page = repository
        .find_all(options, &store, &ctx)
        .await
        .expect("find all should succeed");

    assert_eq!(page.data.len(), 3);
    assert_eq!(page.total_count, 4);
    assert_eq!(page.total_pages, 2);
    assert!(page.has_next);
    assert!(!page.has_prev);
}

#[rstest]
#[tokio::test]
async fn duplicate_create_normalizes_to_a_conflict_envelope() {
    let (registry, _log) = registry_with_log();
    let store = MemoryStore::new();
    let repository = registry.repository_for(EntityName::Account);

    let request_id = RequestId::generate();
    let ctx = OperationContext::with_request_id(request_id);
    let data = record(&[
        ("account_id", json!("7c9e6679-7425-40de-944b-e07fc1f90ae7")),
        ("customer_id", json!(Uuid::new_v4().to_string())),
        ("account_number", json!("ACC-001")),
        ("account_name", json!("Operating")),
    ]);

    repository
        .create(data.clone(), &store, &ctx)
        .await
        .expect("first create should succeed");
    let err = repository
        .create(data, &store, &ctx)
        .await
        .expect_err("second create should conflict");

    let normalize_ctx = NormalizeContext::new(false).with_request_id(request_id);
    let classified = crm_backend::domain::normalize(Failure::from(err), &normalize_ctx);
    assert_eq!(classified.code(), ErrorCode::UniqueConstraintViolation);

    let envelope = classified.to_envelope(false);
    assert_eq!(envelope["error"]["statusCode"], json!(409));
    assert_eq!(
        envelope["error"]["requestId"],
        json!(request_id.to_string())
    );
}

#[rstest]
#[tokio::test]
async fn unknown_entity_names_normalize_to_validation_errors() {
    let (registry, _log) = registry_with_log();

    let err = registry
        .repository("invoices")
        .expect_err("unknown entity should be rejected");

    let classified = crm_backend::domain::normalize(
        Failure::from(err),
        &NormalizeContext::new(false),
    );
    assert_eq!(classified.code(), ErrorCode::ValidationError);
    assert_eq!(classified.status_code(), 422);
}

fn sample_directory() -> (MemoryDirectory, Uuid, Uuid) {
    let customer_id = Uuid::new_v4();
    let account_id = Uuid::new_v4();
    let other_account = Uuid::new_v4();
    let mut directory = MemoryDirectory::new();

    directory.push_customer(CustomerFixture {
        customer_id,
        name: "Acme Industrial".into(),
        status: "ACTIVE".into(),
    });
    directory.push_account(AccountFixture {
        account_id,
        customer_id,
        account_number: "ACC-002".into(),
        account_name: "Operating".into(),
        status: "ACTIVE".into(),
    });
    directory.push_account(AccountFixture {
        account_id: other_account,
        customer_id,
        account_number: "ACC-001".into(),
        account_name: "Savings".into(),
        status: "ACTIVE".into(),
    });

    let users = [
        (Uuid::new_v4(), "Zoe", "Banks", "ACTIVE"),
        (Uuid::new_v4(), "Yara", "Adams", "ACTIVE"),
        (Uuid::new_v4(), "Abel", "Adams", "ACTIVE"),
        (Uuid::new_v4(), "Gone", "Left", "INACTIVE"),
    ];
    for (user_id, first, last, status) in &users {
        directory.push_user(UserFixture {
            user_id: *user_id,
            customer_id,
            first_name: (*first).into(),
            last_name: (*last).into(),
            email: format!("{}@example.com", first.to_lowercase()),
            phone: None,
            role: "MEMBER".into(),
            status: (*status).into(),
        });
    }

    // Banks holds both accounts, Yara Adams only the second, Abel none.
    // The inactive user keeps an active link, which must stay hidden.
    directory.push_link(LinkFixture {
        user_id: users[0].0,
        account_id,
        role: "ADMIN".into(),
        status: "ACTIVE".into(),
    });
    directory.push_link(LinkFixture {
        user_id: users[0].0,
        account_id: other_account,
        role: "VIEWER".into(),
        status: "ACTIVE".into(),
    });
    directory.push_link(LinkFixture {
        user_id: users[1].0,
        account_id: other_account,
        role: "VIEWER".into(),
        status: "ACTIVE".into(),
    });
    directory.push_link(LinkFixture {
        user_id: users[3].0,
        account_id,
        role: "ADMIN".into(),
        status: "ACTIVE".into(),
    });

    (directory, customer_id, account_id)
}

#[rstest]
#[tokio::test]
async fn customer_rows_order_by_last_then_first_name() {
    let (directory, customer_id, _) = sample_directory();
    let service = UserDirectoryService::new(Arc::new(directory));

    let rows = service
        .fetch(
            Relation::UsersByCustomer,
            ProjectionTier::Header,
            &customer_id.to_string(),
        )
        .await
        .expect("fetch should succeed");

    let ProjectionRows::Header(headers) = rows else {
        panic!("header tier should yield header rows");
    };
    let names: Vec<(String, String)> = headers
        .into_iter()
        .map(|header| (header.last_name, header.first_name))
        .collect();
    assert_eq!(
        names,
        vec![
            ("Adams".to_owned(), "Abel".to_owned()),
            ("Adams".to_owned(), "Yara".to_owned()),
            ("Banks".to_owned(), "Zoe".to_owned()),
        ]
    );
}

#[rstest]
#[tokio::test]
async fn account_detail_hides_inactive_users() {
    let (directory, _, account_id) = sample_directory();
    let service = UserDirectoryService::new(Arc::new(directory));

    let rows = service
        .fetch(
            Relation::UsersByAccount,
            ProjectionTier::Detail,
            &account_id.to_string(),
        )
        .await
        .expect("fetch should succeed");

    let ProjectionRows::AccountDetail(details) = rows else {
        panic!("detail tier should yield account detail rows");
    };
    assert_eq!(details.len(), 1);
    let detail = details.first().expect("one detail row");
    assert_eq!(detail.user.last_name, "Banks");
    assert_eq!(detail.account_number, "ACC-002");
    assert_eq!(detail.account_role, "ADMIN");
}

#[rstest]
#[tokio::test]
async fn account_detail_orders_by_last_then_first_name() {
    let customer_id = Uuid::new_v4();
    let account_id = Uuid::new_v4();
    let mut directory = MemoryDirectory::new();
    directory.push_customer(CustomerFixture {
        customer_id,
        name: "Acme Industrial".into(),
        status: "ACTIVE".into(),
    });
    directory.push_account(AccountFixture {
        account_id,
        customer_id,
        account_number: "ACC-001".into(),
        account_name: "Operating".into(),
        status: "ACTIVE".into(),
    });
    // Insertion order deliberately scrambled relative to the expected sort.
    let members = [
        ("Zoe", "Banks"),
        ("Yara", "Adams"),
        ("Noor", "Chandra"),
        ("Abel", "Adams"),
    ];
    for (first, last) in members {
        let user_id = Uuid::new_v4();
        directory.push_user(UserFixture {
            user_id,
            customer_id,
            first_name: first.into(),
            last_name: last.into(),
            email: format!("{}@example.com", first.to_lowercase()),
            phone: None,
            role: "MEMBER".into(),
            status: "ACTIVE".into(),
        });
        directory.push_link(LinkFixture {
            user_id,
            account_id,
            role: "VIEWER".into(),
            status: "ACTIVE".into(),
        });
    }
    let service = UserDirectoryService::new(Arc::new(directory));

    let rows = service
        .fetch(
            Relation::UsersByAccount,
            ProjectionTier::Detail,
            &account_id.to_string(),
        )
        .await
        .expect("fetch should succeed");

    let ProjectionRows::AccountDetail(details) = rows else {
        panic!("detail tier should yield account detail rows");
    };
    let names: Vec<(String, String)> = details
        .into_iter()
        .map(|detail| (detail.user.last_name, detail.user.first_name))
        .collect();
    assert_eq!(
        names,
        vec![
            ("Adams".to_owned(), "Abel".to_owned()),
            ("Adams".to_owned(), "Yara".to_owned()),
            ("Banks".to_owned(), "Zoe".to_owned()),
            ("Chandra".to_owned(), "Noor".to_owned()),
        ]
    );
}

#[rstest]
#[tokio::test]
async fn customer_detail_groups_accounts_per_user() {
    let (directory, customer_id, _) = sample_directory();
    let service = UserDirectoryService::new(Arc::new(directory));

    let rows = service
        .fetch(
            Relation::UsersByCustomer,
            ProjectionTier::Detail,
            &customer_id.to_string(),
        )
        .await
        .expect("fetch should succeed");

    let ProjectionRows::CustomerDetail(details) = rows else {
        panic!("detail tier should yield customer detail rows");
    };
    assert_eq!(details.len(), 3);

    // Abel Adams has no links: present, with an empty account list.
    let abel = details.first().expect("three detail rows");
    assert_eq!(abel.user.first_name, "Abel");
    assert!(abel.accounts.is_empty());

    // Zoe Banks holds both accounts, ordered by account number.
    let zoe = details.get(2).expect("three detail rows");
    let numbers: Vec<&str> = zoe
        .accounts
        .iter()
        .map(|link| link.account_number.as_str())
        .collect();
    assert_eq!(numbers, vec!["ACC-001", "ACC-002"]);
}

#[rstest]
#[tokio::test]
async fn blank_parent_identifiers_fail_before_storage() {
    let (directory, _, _) = sample_directory();
    let service = UserDirectoryService::new(Arc::new(directory));

    let err = service
        .fetch(Relation::UsersByAccount, ProjectionTier::Summary, "  ")
        .await
        .expect_err("blank id should be rejected");

    let classified = crm_backend::domain::normalize(
        Failure::from(err),
        &NormalizeContext::new(false),
    );
    assert_eq!(classified.code(), ErrorCode::ValidationError);
    assert_eq!(
        classified.metadata().get("field"),
        Some(&json!("account_id"))
    );
}
