/// Transport seam for issuing batch get calls against the store

use crate::batch::{BatchGetRequest, BatchGetResponse};
use async_trait::async_trait;
use dynx_core::Result;
use std::sync::Arc;

/// Issues one batch get call.
///
/// Implementations report transient failures (timeouts, throttling, 5xx)
/// with an error whose `is_retryable()` is true; the pipeline re-issues the
/// same request for those. Any other error aborts the fetch.
#[async_trait]
pub trait BatchTransport: Send + Sync {
    async fn batch_get_items(&self, request: &BatchGetRequest) -> Result<BatchGetResponse>;
}

#[async_trait]
impl<T: BatchTransport + ?Sized> BatchTransport for Arc<T> {
    async fn batch_get_items(&self, request: &BatchGetRequest) -> Result<BatchGetResponse> {
        (**self).batch_get_items(request).await
    }
}
