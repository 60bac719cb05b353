use dynx_api::{BatchGetOptions, BatchGetter, Table, TableDescriptor};
use dynx_core::{BatchConfig, Error, Item, KeyRecord, Result, RetryPolicy, StandardSerializer};
use dynx_test_utils::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

fn users_table() -> TableDescriptor {
    TableDescriptor::new("users", users_schema())
}

fn seeded_store(count: usize) -> InMemoryStore {
    let store = InMemoryStore::new();
    let mut gen = MockDataGenerator::new();
    store
        .load("users", &users_schema(), &gen.users(count))
        .unwrap();
    store
}

fn ids(items: &[Item]) -> Vec<String> {
    items
        .iter()
        .map(|item| item["id"].as_string().unwrap().to_string())
        .collect()
}

/// 250 keys become buckets of 100, 100 and 50, returned in bucket order
#[tokio::test]
async fn test_keys_split_into_buckets() {
    init_test_logging();
    let store = Arc::new(seeded_store(250));
    let getter = BatchGetter::new(users_table(), store.clone(), StandardSerializer);

    let items = getter
        .get_items(&user_keys(250), &BatchGetOptions::default())
        .await
        .unwrap();

    assert_eq!(items.len(), 250);

    let sizes: Vec<usize> = store.requests().iter().map(|r| r.key_count()).collect();
    let mut sorted = sizes.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, vec![50, 100, 100]);

    // Single-round buckets keep their items grouped in bucket order
    let expected: Vec<String> = (0..250).map(|i| format!("user{}", i)).collect();
    assert_eq!(ids(&items), expected);
}

#[tokio::test]
async fn test_unprocessed_keys_follow_up() {
    init_test_logging();
    let store = Arc::new(seeded_store(10).with_page_limit(4));
    let getter = BatchGetter::new(users_table(), store.clone(), StandardSerializer);

    let items = getter
        .get_items(&user_keys(10), &BatchGetOptions::default())
        .await
        .unwrap();

    assert_eq!(items.len(), 10);
    let sizes: Vec<usize> = store.requests().iter().map(|r| r.key_count()).collect();
    assert_eq!(sizes, vec![10, 6, 2]);
}

#[tokio::test]
async fn test_missing_keys_are_absent() {
    let store = Arc::new(seeded_store(3));
    let getter = BatchGetter::new(users_table(), store, StandardSerializer);

    let keys = vec![
        KeyRecord::new("user0"),
        KeyRecord::new("nobody"),
        KeyRecord::new("user2"),
    ];
    let items = getter.get_items(&keys, &BatchGetOptions::default()).await.unwrap();

    assert_eq!(ids(&items), vec!["user0", "user2"]);
}

#[tokio::test]
async fn test_empty_key_list_makes_no_calls() {
    let store = Arc::new(seeded_store(3));
    let getter = BatchGetter::new(users_table(), store.clone(), StandardSerializer);

    let items = getter.get_items(&[], &BatchGetOptions::default()).await.unwrap();

    assert!(items.is_empty());
    assert_eq!(store.call_count(), 0);
}

#[tokio::test]
async fn test_retryable_errors_are_retried() {
    init_test_logging();
    let store = Arc::new(seeded_store(5));
    store.fail_next(Error::retryable_transport("connection reset"));
    store.fail_next(Error::Throttled("provisioned throughput exceeded".into()));

    let getter = BatchGetter::new(users_table(), store.clone(), StandardSerializer);
    let items = getter
        .get_items(&user_keys(5), &BatchGetOptions::default())
        .await
        .unwrap();

    assert_eq!(items.len(), 5);
    let requests = store.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests.iter().all(|r| *r == requests[0]));
}

#[tokio::test]
async fn test_terminal_error_aborts() {
    let store = Arc::new(seeded_store(5));
    store.fail_next(Error::transport("access denied"));

    let getter = BatchGetter::new(users_table(), store.clone(), StandardSerializer);
    let err = getter
        .get_items(&user_keys(5), &BatchGetOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "TRANSPORT_ERROR");
    assert!(!err.is_retryable());
    assert_eq!(store.call_count(), 1);
}

/// 250 keys at 10 per call take 25 rounds across 3 buckets; a terminal error stops all of them
#[tokio::test]
async fn test_terminal_error_in_one_bucket_fails_whole_fetch() {
    let store = Arc::new(
        seeded_store(250)
            .with_page_limit(10)
            .with_latency(Duration::from_millis(20)),
    );
    store.fail_next(Error::transport("access denied"));

    let getter = BatchGetter::new(users_table(), store.clone(), StandardSerializer);
    let err = getter
        .get_items(&user_keys(250), &BatchGetOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "TRANSPORT_ERROR");
    let issued = store.call_count();
    assert!(issued < 25, "{} calls issued after abort", issued);

    // Dropped buckets issue nothing further
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(store.call_count(), issued);
}

#[tokio::test]
async fn test_terminal_error_stops_later_buckets() {
    let store = Arc::new(seeded_store(250).with_latency(Duration::from_millis(5)));
    store.fail_next(Error::transport("access denied"));

    let config = BatchConfig::new().with_max_concurrency(1);
    let getter = BatchGetter::new(users_table(), store.clone(), StandardSerializer)
        .with_config(config)
        .unwrap();

    let result = getter
        .get_items(&user_keys(250), &BatchGetOptions::default())
        .await;

    assert!(result.is_err());
    let requests = store.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].key_count(), 100);
}

#[tokio::test]
async fn test_capped_retry_policy_gives_up() {
    let store = Arc::new(seeded_store(5));
    for _ in 0..5 {
        store.fail_next(Error::retryable_transport("timeout"));
    }

    let config = BatchConfig::new().with_retry_policy(RetryPolicy::new(2, 1, 5, 2.0));
    let getter = BatchGetter::new(users_table(), store.clone(), StandardSerializer)
        .with_config(config)
        .unwrap();

    let err = getter
        .get_items(&user_keys(5), &BatchGetOptions::default())
        .await
        .unwrap_err();

    match err {
        Error::RetriesExhausted { attempts, last } => {
            assert_eq!(attempts, 3);
            assert!(last.is_retryable());
        }
        other => panic!("expected RetriesExhausted, got {:?}", other),
    }
    assert_eq!(store.call_count(), 3);
}

#[tokio::test]
async fn test_options_merged_into_every_request() {
    let store = Arc::new(seeded_store(150).with_page_limit(60));
    let getter = BatchGetter::new(users_table(), store.clone(), StandardSerializer);

    let mut names = HashMap::new();
    names.insert("#name".to_string(), "name".to_string());
    let options = BatchGetOptions::new()
        .consistent_read(true)
        .projection("id, #name", names);

    let items = getter.get_items(&user_keys(150), &options).await.unwrap();
    assert_eq!(items.len(), 150);

    for request in store.requests() {
        let entry = &request.request_items["users"];
        assert_eq!(entry.options, options);
    }
}

#[tokio::test]
async fn test_concurrency_limit() {
    let store = Arc::new(seeded_store(500).with_latency(Duration::from_millis(20)));
    let config = BatchConfig::new()
        .with_max_batch_size(50)
        .with_max_concurrency(2);
    let getter = BatchGetter::new(users_table(), store.clone(), StandardSerializer)
        .with_config(config)
        .unwrap();

    let items = getter
        .get_items(&user_keys(500), &BatchGetOptions::default())
        .await
        .unwrap();

    assert_eq!(items.len(), 500);
    assert_eq!(store.call_count(), 10);
    assert!(store.peak_concurrency() <= 2);
}

#[tokio::test]
async fn test_unlimited_concurrency_runs_buckets_together() {
    let store = Arc::new(seeded_store(300).with_latency(Duration::from_millis(20)));
    let getter = BatchGetter::new(users_table(), store.clone(), StandardSerializer);

    getter
        .get_items(&user_keys(300), &BatchGetOptions::default())
        .await
        .unwrap();

    assert!(store.peak_concurrency() > 1);
}

#[tokio::test]
async fn test_composite_keys() {
    let store = Arc::new(InMemoryStore::new());
    let events: Vec<Item> = (0..3)
        .map(|seq| {
            dynx_api::ItemBuilder::new()
                .string("stream", "orders")
                .number("seq", seq)
                .string("kind", "created")
                .build()
        })
        .collect();
    store.load("events", &events_schema(), &events).unwrap();

    let table = TableDescriptor::new("events", events_schema());
    let getter = BatchGetter::new(table, store, StandardSerializer);

    let keys = vec![
        KeyRecord::with_range("orders", 2i64),
        KeyRecord::with_range("orders", 7i64),
    ];
    let items = getter.get_items(&keys, &BatchGetOptions::default()).await.unwrap();

    assert_eq!(items.len(), 1);
    assert_number_eq(&items[0]["seq"], "2");
}

#[tokio::test]
async fn test_missing_range_key_fails_before_any_call() {
    let store = Arc::new(InMemoryStore::new());
    let table = TableDescriptor::new("events", events_schema());
    let getter = BatchGetter::new(table, store.clone(), StandardSerializer);

    let err = getter
        .get_items(&[KeyRecord::new("orders")], &BatchGetOptions::default())
        .await
        .unwrap_err();

    assert!(!err.is_retryable());
    assert_eq!(store.call_count(), 0);
}

/// Domain table whose items become typed users
struct UserTable {
    inner: TableDescriptor,
}

#[derive(Debug, PartialEq)]
struct User {
    id: String,
    name: String,
}

impl Table for UserTable {
    type Model = User;

    fn table_name(&self) -> &str {
        self.inner.table_name()
    }

    fn schema(&self) -> &dynx_core::TableSchema {
        self.inner.schema()
    }

    fn init_item(&self, item: Item) -> Result<User> {
        let field = |name: &str| {
            item.get(name)
                .and_then(|v| v.as_string())
                .map(str::to_string)
                .ok_or_else(|| Error::Serialization(format!("missing {}", name)))
        };
        Ok(User {
            id: field("id")?,
            name: field("name")?,
        })
    }
}

#[tokio::test]
async fn test_items_built_through_table() {
    let store = Arc::new(seeded_store(4));
    let table = UserTable { inner: users_table() };
    let getter = BatchGetter::new(table, store, StandardSerializer);

    let users = getter
        .get_items(&user_keys(4), &BatchGetOptions::default())
        .await
        .unwrap();

    let names: HashSet<&str> = users.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(users.len(), 4);
    assert!(names.contains("User 3"));
    assert_eq!(users[0], User { id: "user0".into(), name: "User 0".into() });
}

#[tokio::test]
async fn test_paginated_request_directly() -> anyhow::Result<()> {
    let store = Arc::new(seeded_store(5).with_page_limit(2));
    let getter = BatchGetter::new(users_table(), store.clone(), StandardSerializer);

    let request = dynx_api::BatchGetRequest::for_table(
        "users",
        vec![user_key("user0"), user_key("user3"), user_key("user4")],
        BatchGetOptions::default(),
    );
    let items = getter.paginated_request(request).await?;

    assert_eq!(items.len(), 3);
    assert_eq!(store.call_count(), 2);
    Ok(())
}
