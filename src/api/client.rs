//! HTTP client for the synthetics API

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;

use crate::common::{Error, Result};
use crate::config::RunTestsConfig;

use super::error::ApiError;
use super::types::{
    Batch, PollResultsResponse, PolledResult, Test, TestSearchResponse, TestSummary,
    TriggerPayload, TriggerResponse,
};
use super::{ApiResult, SyntheticsApi};

/// reqwest-backed [`SyntheticsApi`] implementation
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    app_key: String,
}

impl ApiClient {
    /// Build a client for the configured site, credentials, and proxy
    pub fn new(config: &RunTestsConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(concat!(
            "synthetics-ci/",
            env!("CARGO_PKG_VERSION")
        ));

        if let Some(url) = config.proxy.url() {
            let mut proxy = reqwest::Proxy::all(&url)
                .map_err(|e| Error::Config(format!("Invalid proxy '{}': {}", url, e)))?;
            if let Some(auth) = &config.proxy.auth {
                proxy = proxy.basic_auth(
                    auth.username.as_deref().unwrap_or_default(),
                    auth.password.as_deref().unwrap_or_default(),
                );
            }
            tracing::debug!(proxy = %url, "Using proxy");
            builder = builder.proxy(proxy);
        }

        let http = builder
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: format!("https://api.{}", config.datadog_site),
            api_key: config.api_key.clone(),
            app_key: config.app_key.clone(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    fn authenticated(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("DD-API-KEY", &self.api_key)
            .header("DD-APPLICATION-KEY", &self.app_key)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        endpoint: &str,
    ) -> ApiResult<T> {
        tracing::debug!(endpoint, "API request");
        let response = self
            .authenticated(request)
            .send()
            .await
            .map_err(|e| ApiError::unknown(endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(endpoint, status.as_u16(), body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::unknown(endpoint, format!("invalid response body: {}", e)))
    }
}

fn result_ids_param(result_ids: &[String]) -> String {
    serde_json::Value::from(result_ids.to_vec()).to_string()
}

#[async_trait]
impl SyntheticsApi for ApiClient {
    async fn get_test(&self, public_id: &str) -> ApiResult<Test> {
        let endpoint = format!("/api/v1/synthetics/tests/{}", public_id);
        self.send(self.http.get(self.url(&endpoint)), &endpoint).await
    }

    async fn search_tests(&self, query: &str) -> ApiResult<Vec<TestSummary>> {
        let endpoint = "/api/v1/synthetics/tests/search";
        let request = self.http.get(self.url(endpoint)).query(&[("text", query)]);
        let response: TestSearchResponse = self.send(request, endpoint).await?;
        Ok(response.tests)
    }

    async fn trigger_tests(&self, payload: &TriggerPayload) -> ApiResult<TriggerResponse> {
        let endpoint = "/api/v1/synthetics/tests/trigger/ci";
        let request = self.http.post(self.url(endpoint)).json(payload);
        self.send(request, endpoint).await
    }

    async fn get_batch(&self, batch_id: &str) -> ApiResult<Batch> {
        let endpoint = format!("/api/v1/synthetics/ci/batch/{}", batch_id);
        #[derive(serde::Deserialize)]
        struct Envelope {
            data: Batch,
        }
        let envelope: Envelope = self.send(self.http.get(self.url(&endpoint)), &endpoint).await?;
        Ok(envelope.data)
    }

    async fn poll_results(&self, result_ids: &[String]) -> ApiResult<Vec<PolledResult>> {
        let endpoint = "/api/v1/synthetics/tests/poll_results";
        let request = self
            .http
            .get(self.url(endpoint))
            .query(&[("result_ids", result_ids_param(result_ids))]);
        let response: PollResultsResponse = self.send(request, endpoint).await?;
        Ok(response.results)
    }
}
