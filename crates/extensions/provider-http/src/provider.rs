//! HTTP provider implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use tracing::debug;

use stepwise_config::ProviderConfig;
use stepwise_protocols::{InferenceError, InferenceProvider, InferenceRequest, InferenceResponse};

use crate::api::{ApiRequest, ApiResponse};

/// Used when a 429 carries no usable `retry-after` header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 1;

/// Provider that posts each request to a fixed JSON endpoint.
pub struct HttpInferenceProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpInferenceProvider {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: None,
            timeout: Duration::from_secs(180),
        }
    }

    /// Build from the `[provider]` section. Fails when no endpoint is set.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, InferenceError> {
        let endpoint = config.endpoint.clone().ok_or_else(|| {
            InferenceError::InvalidRequest("no provider endpoint configured".to_string())
        })?;
        let mut provider = Self::new(endpoint).with_timeout(Duration::from_secs(config.timeout_secs));
        provider.api_key = config.api_key.clone().filter(|key| !key.is_empty());
        Ok(provider)
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send_request(
        &self,
        body: &ApiRequest<'_>,
        timeout: Duration,
    ) -> Result<reqwest::Response, InferenceError> {
        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .timeout(timeout)
            .json(body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| map_transport_error(e, timeout))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_seconds = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            return Err(InferenceError::RateLimited { retry_after_seconds });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // {"error": {"message": "..."}} or {"error": "..."}
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| {
                    v["error"]["message"]
                        .as_str()
                        .or_else(|| v["error"].as_str())
                        .map(String::from)
                })
                .unwrap_or(body);
            return Err(InferenceError::from_status(status.as_u16(), message));
        }

        Ok(response)
    }
}

fn map_transport_error(error: reqwest::Error, timeout: Duration) -> InferenceError {
    if error.is_timeout() {
        InferenceError::Timeout(timeout.as_secs())
    } else {
        InferenceError::Network(error.to_string())
    }
}

#[async_trait]
impl InferenceProvider for HttpInferenceProvider {
    fn id(&self) -> &str {
        "http"
    }

    async fn invoke(&self, request: InferenceRequest) -> Result<InferenceResponse, InferenceError> {
        let timeout = request.timeout.unwrap_or(self.timeout);
        debug!(
            endpoint = %self.endpoint,
            step = request.step_index,
            attempt = request.attempt,
            "Posting inference request"
        );

        let body = ApiRequest::from(&request);
        let response = self.send_request(&body, timeout).await?;
        let api_response: ApiResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                InferenceError::Timeout(timeout.as_secs())
            } else {
                InferenceError::InvalidResponse(e.to_string())
            }
        })?;
        Ok(api_response.into())
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
