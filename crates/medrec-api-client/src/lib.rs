//! HTTP client for the medrec API.
//!
//! Provides a minimal client with optional bearer auth, generic GET/POST/DELETE
//! helpers returning [`ApiError`], and the [`EntityFileApi`] implementation used
//! by the upload core (see [`api`]).
//!
//! [`EntityFileApi`]: medrec_core::EntityFileApi

pub mod api;

use anyhow::Context;
use bytes::Bytes;
use medrec_core::{ApiError, ApiResult, ClientConfig};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

pub use api::PaperlessUploadResponse;

/// Polling budget for background task monitoring.
#[derive(Clone, Copy, Debug)]
pub struct TaskPollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl From<&ClientConfig> for TaskPollConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            interval: config.task_poll_interval(),
            max_attempts: config.task_max_attempts,
        }
    }
}

/// HTTP client for the medrec API.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    api_prefix: String,
    token: Option<String>,
    poll: TaskPollConfig,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            api_prefix: config.api_prefix(),
            token: config.api_token.clone(),
            poll: TaskPollConfig::from(config),
        })
    }

    /// Create client from environment: MEDREC_API_URL, MEDREC_API_TOKEN, MEDREC_API_VERSION.
    pub fn from_env() -> anyhow::Result<Self> {
        let config = ClientConfig::from_env().context("Invalid client configuration")?;
        Self::new(&config).context("Failed to create API client")
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn poll_config(&self) -> TaskPollConfig {
        self.poll
    }

    /// Full URL for a path below the API prefix.
    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, self.api_prefix, path)
    }

    fn apply_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> ApiResult<Response> {
        let response = self
            .apply_auth(request)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        Ok(response)
    }

    /// GET request with optional query parameters. Deserializes JSON response.
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> ApiResult<T> {
        let mut request = self.client.get(self.build_url(path));
        if !query.is_empty() {
            request = request.query(query);
        }

        let response = self.send(request).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response as JSON: {}", e)))
    }

    /// GET request returning the raw body and its content type.
    pub async fn get_bytes(&self, path: &str, query: &[(&str, String)]) -> ApiResult<(Bytes, String)> {
        let mut request = self.client.get(self.build_url(path));
        if !query.is_empty() {
            request = request.query(query);
        }

        let response = self.send(request).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let body = response.bytes().await.map_err(transport_error)?;

        Ok((body, content_type))
    }

    /// POST multipart form and deserialize response.
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> ApiResult<T> {
        let request = self.client.post(self.build_url(path)).multipart(form);

        let response = self.send(request).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response as JSON: {}", e)))
    }

    /// DELETE request. Returns Ok(()) on success.
    pub async fn delete(&self, path: &str) -> ApiResult<()> {
        let request = self.client.delete(self.build_url(path));
        self.send(request).await?;
        Ok(())
    }
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, alias = "error_code")]
    code: Option<String>,
}

/// Turn a non-2xx response into `ApiError::Http`, keeping any structured code.
async fn error_from_response(response: Response) -> ApiError {
    let status = response.status().as_u16();
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    let (code, message) = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => {
            let message = body
                .message
                .or_else(|| {
                    body.detail.map(|d| match d {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    })
                })
                .unwrap_or_else(|| text.clone());
            (body.code, message)
        }
        Err(_) => (None, text),
    };

    ApiError::Http {
        status,
        code,
        message,
    }
}

fn transport_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout(err.to_string())
    } else if err.is_decode() {
        ApiError::InvalidResponse(err.to_string())
    } else if err.is_builder() {
        ApiError::InvalidRequest(err.to_string())
    } else {
        ApiError::Network(err.to_string())
    }
}
