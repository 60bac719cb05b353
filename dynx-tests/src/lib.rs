/// Test utilities and helpers for dynx testing
///
/// [`InMemoryStore`] stands in for the remote store: it answers batch gets
/// from a local item table, can hold back keys as unprocessed, and can be
/// scripted to fail.

use async_trait::async_trait;
use dynx_api::{BatchGetRequest, BatchGetResponse, BatchTransport, ItemBuilder, KeysAndAttributes};
use dynx_core::{
    AttributeValue, Datatype, Error, KeyRecord, NativeItem, NativeKey, Result, Serializer,
    StandardSerializer, TableSchema, Value,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub type Item = dynx_core::Item;

/// In-memory batch get endpoint
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<HashMap<String, Vec<NativeItem>>>,
    failures: Mutex<VecDeque<Error>>,
    requests: Mutex<Vec<BatchGetRequest>>,
    /// Keys answered per call; the rest come back unprocessed
    page_limit: Option<usize>,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer at most `limit` keys per call
    pub fn with_page_limit(mut self, limit: usize) -> Self {
        self.page_limit = Some(limit);
        self
    }

    /// Hold every call open for `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn insert(&self, table: &str, item: NativeItem) {
        self.tables
            .lock()
            .entry(table.to_string())
            .or_default()
            .push(item);
    }

    /// Serialize and store application items under `schema`
    pub fn load(&self, table: &str, schema: &TableSchema, items: &[Item]) -> Result<()> {
        let serializer = StandardSerializer;
        for item in items {
            let native = item
                .iter()
                .map(|(name, value)| {
                    let encoded = serializer.serialize_attribute(value, schema.datatype(name))?;
                    Ok((name.clone(), encoded))
                })
                .collect::<Result<NativeItem>>()?;
            self.insert(table, native);
        }
        Ok(())
    }

    /// Queue an error to be returned by the next call, ahead of any lookup
    pub fn fail_next(&self, error: Error) {
        self.failures.lock().push_back(error);
    }

    /// Every request received, in arrival order
    pub fn requests(&self) -> Vec<BatchGetRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Highest number of calls observed in flight at once
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn lookup(&self, table: &str, key: &NativeKey) -> Option<NativeItem> {
        let tables = self.tables.lock();
        tables.get(table)?.iter().find(|item| matches_key(item, key)).cloned()
    }

    fn answer(&self, request: &BatchGetRequest) -> BatchGetResponse {
        let mut budget = self.page_limit.unwrap_or(usize::MAX);
        let mut responses: HashMap<String, Vec<NativeItem>> = HashMap::new();
        let mut unprocessed: HashMap<String, KeysAndAttributes> = HashMap::new();

        for (table, wanted) in &request.request_items {
            let take = wanted.keys.len().min(budget);
            budget -= take;

            let found = wanted.keys[..take]
                .iter()
                .filter_map(|key| self.lookup(table, key))
                .collect();
            responses.insert(table.clone(), found);

            if take < wanted.keys.len() {
                unprocessed.insert(
                    table.clone(),
                    KeysAndAttributes {
                        keys: wanted.keys[take..].to_vec(),
                        options: wanted.options.clone(),
                    },
                );
            }
        }

        BatchGetResponse {
            responses,
            unprocessed_keys: (!unprocessed.is_empty()).then_some(unprocessed),
        }
    }
}

#[async_trait]
impl BatchTransport for InMemoryStore {
    async fn batch_get_items(&self, request: &BatchGetRequest) -> Result<BatchGetResponse> {
        self.requests.lock().push(request.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let failure = self.failures.lock().pop_front();
        let result = match failure {
            Some(error) => Err(error),
            None => Ok(self.answer(request)),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

fn matches_key(item: &NativeItem, key: &NativeKey) -> bool {
    key.iter().all(|(name, value)| item.get(name) == Some(value))
}

/// Schema for the `users` fixture table: string hash key `id`
pub fn users_schema() -> TableSchema {
    TableSchema::new("id", Datatype::String)
        .with_attribute("score", Datatype::Number)
        .with_attribute("tags", Datatype::StringSet)
        .with_attribute("created", Datatype::Date)
}

/// Schema for the `events` fixture table: string hash `stream`, number range `seq`
pub fn events_schema() -> TableSchema {
    TableSchema::new("stream", Datatype::String).with_range_key("seq", Datatype::Number)
}

/// Mock data generator for testing
pub struct MockDataGenerator {
    counter: u64,
}

impl MockDataGenerator {
    pub fn new() -> Self {
        Self { counter: 0 }
    }

    /// Generate the next user item
    pub fn user(&mut self) -> Item {
        let idx = self.counter;
        self.counter += 1;
        ItemBuilder::new()
            .string("id", format!("user{}", idx))
            .string("name", format!("User {}", idx))
            .number("score", idx as i64)
            .build()
    }

    pub fn users(&mut self, count: usize) -> Vec<Item> {
        (0..count).map(|_| self.user()).collect()
    }
}

impl Default for MockDataGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash keys `user0..user{count}`
pub fn user_keys(count: usize) -> Vec<KeyRecord> {
    (0..count).map(|i| KeyRecord::new(format!("user{}", i))).collect()
}

/// Native key for a fixture user
pub fn user_key(id: &str) -> NativeKey {
    let mut key = NativeKey::new();
    key.insert("id".to_string(), AttributeValue::S(id.to_string()));
    key
}

/// Install a test-writer subscriber once; honors `RUST_LOG`
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Assert that a value is a number with expected value
pub fn assert_number_eq(value: &Value, expected: &str) {
    match value {
        Value::N(n) => assert_eq!(n, expected),
        _ => panic!("Expected number, got {:?}", value),
    }
}

/// Assert that a value is a string with expected value
pub fn assert_string_eq(value: &Value, expected: &str) {
    match value {
        Value::S(s) => assert_eq!(s, expected),
        _ => panic!("Expected string, got {:?}", value),
    }
}
