//! Synthetics API
//!
//! The runner talks to the remote service only through the
//! [`SyntheticsApi`] trait; [`ApiClient`] is the HTTP implementation.

mod client;
mod error;
mod types;

use async_trait::async_trait;

pub use client::ApiClient;
pub use error::{ApiError, ErrorKind};
pub use types::*;

/// Result type for API calls
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Remote operations used by the runner
#[async_trait]
pub trait SyntheticsApi: Send + Sync {
    /// Look up one test by public id
    async fn get_test(&self, public_id: &str) -> ApiResult<Test>;

    /// Find tests matching a search query
    async fn search_tests(&self, query: &str) -> ApiResult<Vec<TestSummary>>;

    /// Trigger a batch of tests
    async fn trigger_tests(&self, payload: &TriggerPayload) -> ApiResult<TriggerResponse>;

    /// Current status of a batch
    async fn get_batch(&self, batch_id: &str) -> ApiResult<Batch>;

    /// Detailed results for finished executions
    async fn poll_results(&self, result_ids: &[String]) -> ApiResult<Vec<PolledResult>>;
}
