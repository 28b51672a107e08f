// src/backends/http_client.rs
//! Generic JSON-over-HTTP client for the external services.
//!
//! Every collaborator exposes its operations as `POST {base}/{method}` with a
//! JSON body. Transport failures, non-2xx answers and undecodable bodies map
//! to distinct [`ExternalServiceError`] variants. There is no retry.

use crate::error::{ExternalServiceError, Result};
use log::debug;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Thin client bound to one service base URL.
#[derive(Debug, Clone)]
pub struct JsonServiceClient {
    http: Client,
    base_url: String,
    /// Label used in errors and logs, e.g. `"prover"`.
    service: &'static str,
    bearer: Option<String>,
}

impl JsonServiceClient {
    /// Creates a client for `base_url`.
    ///
    /// # Arguments
    /// * `service` - Label reported in errors
    /// * `base_url` - Service root; a trailing `/` is ignored
    /// * `timeout` - Per-request timeout, if any
    pub fn new(service: &'static str, base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|source| ExternalServiceError::Unreachable { service, source })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            service,
            bearer: None,
        })
    }

    /// Sends `Authorization: Bearer <token>` with every request.
    pub fn with_bearer(mut self, token: Option<String>) -> Self {
        self.bearer = token.filter(|t| !t.is_empty());
        self
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    pub fn url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method.trim_start_matches('/'))
    }

    /// Calls `POST {base}/{method}` and decodes the JSON answer.
    pub async fn call<P, R>(&self, method: &str, params: &P) -> Result<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.url(method);
        debug!("{} -> POST {}", self.service, url);

        let mut request = self.http.post(&url).json(params);
        if let Some(token) = &self.bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|source| ExternalServiceError::Unreachable {
            service: self.service,
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExternalServiceError::Status {
                service: self.service,
                status: status.as_u16(),
                body,
            }
            .into());
        }

        response.json::<R>().await.map_err(|e| {
            ExternalServiceError::Decode {
                service: self.service,
                reason: e.to_string(),
            }
            .into()
        })
    }
}
