/// Batch get for arbitrarily many keys
///
/// Keys are split into buckets no larger than the store's per-call limit.
/// Each bucket runs a sequential loop of rounds: issue the request, keep the
/// returned items, and reissue whatever the store reports as unprocessed.
/// Buckets run concurrently and their items are concatenated in bucket order.

use crate::table::Table;
use crate::transport::BatchTransport;
use dynx_core::retry::retry_with_policy;
use dynx_core::{
    BatchConfig, Error, KeyRecord, NativeItem, NativeKey, Result, Serializer, StandardSerializer,
};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, debug_span, info, info_span, Instrument};

/// Request-shaping options merged into every table entry of a batch get
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchGetOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consistent_read: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection_expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression_attribute_names: Option<HashMap<String, String>>,
    /// Any other option, passed through as-is
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl BatchGetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn consistent_read(mut self, consistent: bool) -> Self {
        self.consistent_read = Some(consistent);
        self
    }

    pub fn projection(mut self, expression: impl Into<String>, names: HashMap<String, String>) -> Self {
        self.projection_expression = Some(expression.into());
        self.expression_attribute_names = Some(names);
        self
    }

    pub fn option(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }
}

/// Keys for one table plus the options that shape how they are read
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeysAndAttributes {
    pub keys: Vec<NativeKey>,
    #[serde(flatten)]
    pub options: BatchGetOptions,
}

/// `{ "RequestItems": { <table>: { "Keys": [...], ...options } } }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchGetRequest {
    #[serde(rename = "RequestItems")]
    pub request_items: HashMap<String, KeysAndAttributes>,
}

impl BatchGetRequest {
    /// First-round request for one bucket of keys
    pub fn for_table(table_name: impl Into<String>, keys: Vec<NativeKey>, options: BatchGetOptions) -> Self {
        let mut request_items = HashMap::new();
        request_items.insert(table_name.into(), KeysAndAttributes { keys, options });
        Self { request_items }
    }

    /// Number of keys across all tables
    pub fn key_count(&self) -> usize {
        self.request_items.values().map(|k| k.keys.len()).sum()
    }

    /// True when there is nothing left to ask for
    pub fn is_empty(&self) -> bool {
        self.key_count() == 0
    }
}

/// `{ "Responses": { <table>: [...] }, "UnprocessedKeys": { <table>: {...} }? }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchGetResponse {
    #[serde(rename = "Responses", default)]
    pub responses: HashMap<String, Vec<NativeItem>>,
    #[serde(rename = "UnprocessedKeys", default, skip_serializing_if = "Option::is_none")]
    pub unprocessed_keys: Option<HashMap<String, KeysAndAttributes>>,
}

impl BatchGetResponse {
    pub fn items_for(&self, table_name: &str) -> &[NativeItem] {
        self.responses.get(table_name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Next-round request, if any keys were left unprocessed
    pub fn next_request(&self) -> Option<BatchGetRequest> {
        self.unprocessed_keys
            .as_ref()
            .map(|unprocessed| BatchGetRequest {
                request_items: unprocessed.clone(),
            })
            .filter(|request| !request.is_empty())
    }

    pub fn has_unprocessed(&self) -> bool {
        self.next_request().is_some()
    }
}

/// Split `keys` into consecutive buckets of at most `size`, preserving order.
///
/// The input is left untouched. A `size` of zero is treated as one.
pub fn buckets<K: Clone>(keys: &[K], size: usize) -> Vec<Vec<K>> {
    keys.chunks(size.max(1)).map(<[K]>::to_vec).collect()
}

/// Fetches items for many keys from one table
pub struct BatchGetter<T, X, S = StandardSerializer> {
    table: T,
    transport: X,
    serializer: S,
    config: BatchConfig,
}

impl<T, X, S> BatchGetter<T, X, S>
where
    T: Table,
    X: BatchTransport,
    S: Serializer,
{
    pub fn new(table: T, transport: X, serializer: S) -> Self {
        Self {
            table,
            transport,
            serializer,
            config: BatchConfig::default(),
        }
    }

    /// Replace the configuration; rejected if it does not validate
    pub fn with_config(mut self, config: BatchConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    /// Fetch every item for `keys`.
    ///
    /// Items come back grouped by bucket, in bucket order. Missing keys are
    /// simply absent from the result. The first terminal error from any
    /// bucket fails the whole call.
    pub async fn get_items(&self, keys: &[KeyRecord], options: &BatchGetOptions) -> Result<Vec<T::Model>> {
        let table_name = self.table.table_name();
        let span = info_span!("batch_get", table = %table_name, keys = keys.len());

        async move {
            let schema = self.table.schema();
            let native_buckets = buckets(keys, self.config.max_batch_size)
                .iter()
                .map(|bucket| {
                    bucket
                        .iter()
                        .map(|key| self.serializer.build_key(&key.hash, key.range.as_ref(), schema))
                        .collect::<Result<Vec<_>>>()
                })
                .collect::<Result<Vec<_>>>()?;

            if native_buckets.is_empty() {
                return Ok(Vec::new());
            }

            let concurrency = self
                .config
                .max_concurrency
                .unwrap_or(native_buckets.len())
                .max(1);
            debug!(buckets = native_buckets.len(), concurrency, "dispatching buckets");

            let mut results: Vec<(usize, Vec<T::Model>)> = stream::iter(
                native_buckets.into_iter().enumerate().map(|(index, bucket)| async move {
                    let models = self.fetch_bucket(index, bucket, options).await?;
                    Ok::<_, Error>((index, models))
                }),
            )
            .buffer_unordered(concurrency)
            .try_collect()
            .await?;

            results.sort_by_key(|(index, _)| *index);
            let models: Vec<T::Model> = results.into_iter().flat_map(|(_, models)| models).collect();

            info!(items = models.len(), "batch get complete");
            Ok(models)
        }
        .instrument(span)
        .await
    }

    async fn fetch_bucket(&self, index: usize, keys: Vec<NativeKey>, options: &BatchGetOptions) -> Result<Vec<T::Model>> {
        let span = debug_span!("bucket", index, keys = keys.len());

        async move {
            let request = BatchGetRequest::for_table(self.table.table_name(), keys, options.clone());
            let native_items = self.paginated_request(request).await?;

            native_items
                .iter()
                .map(|native| {
                    let item = self.serializer.deserialize_item(native)?;
                    self.table.init_item(item).map_err(|e| {
                        e.with_context(&format!("building item for table {}", self.table.table_name()))
                    })
                })
                .collect()
        }
        .instrument(span)
        .await
    }

    /// Run `request` to completion, following unprocessed keys round by round.
    ///
    /// Returns the native items for this getter's table across all rounds.
    pub async fn paginated_request(&self, request: BatchGetRequest) -> Result<Vec<NativeItem>> {
        let table_name = self.table.table_name();
        let mut items = Vec::new();
        let mut pending = Some(request);
        let mut round = 0u32;

        while let Some(current) = pending.take().filter(|r| !r.is_empty()) {
            round += 1;
            let outstanding = current.key_count();

            let request = &current;
            let response = retry_with_policy(&self.config.retry, move || {
                self.transport.batch_get_items(request)
            })
            .await?;

            let returned = response.items_for(table_name);
            let next = response.next_request();
            let remaining = next.as_ref().map_or(0, BatchGetRequest::key_count);

            debug!(
                round,
                outstanding,
                returned = returned.len(),
                unprocessed = remaining,
                "batch get round"
            );

            if remaining > outstanding {
                return Err(Error::Internal(format!(
                    "store reported {} unprocessed keys for a request of {}",
                    remaining, outstanding
                )));
            }

            items.extend_from_slice(returned);
            pending = next;
        }

        Ok(items)
    }
}
