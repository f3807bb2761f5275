//! HTTP implementation of the auth gateway.
//!
//! Posts `{"username", "password"}` as JSON to `{base_url}/auth/login` and
//! expects a `{"data": {...}, "message": "..."}` envelope back.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Serialize;
use tracing::{debug, error, warn};

use super::{AuthGateway, GatewayError, GatewayResponse};

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// Auth gateway backed by a JSON HTTP endpoint.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
    initial_backoff: Duration,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    /// Override the first rate-limit backoff delay (doubles on each retry)
    pub fn with_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    fn login_url(&self) -> String {
        format!("{}/auth/login", self.base_url)
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<GatewayResponse, GatewayError> {
        let url = self.login_url();
        let body = LoginRequest { username, password };
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let response = self
                .client
                .post(&url)
                .header(header::ACCEPT, "application/json")
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            if status.is_success() {
                let text = response.text().await?;
                return serde_json::from_str(&text).map_err(|e| {
                    GatewayError::InvalidResponse(format!("Failed to parse login response: {}", e))
                });
            }

            if status.as_u16() == 429 && retries < MAX_RATE_LIMIT_RETRIES {
                retries += 1;
                warn!(url = %url, retry = retries, backoff_ms = backoff.as_millis() as u64, "Rate limited, backing off");
                tokio::time::sleep(backoff).await;
                backoff *= 2;
                continue;
            }

            let text = response.text().await.unwrap_or_default();
            // Prefer the server's own explanation when it sent one
            if let Ok(GatewayResponse { message: Some(message), .. }) = serde_json::from_str(&text) {
                return Ok(GatewayResponse::failure(message));
            }
            return Err(GatewayError::from_status(status, &text));
        }
    }
}

#[async_trait]
impl AuthGateway for HttpGateway {
    async fn login(&self, username: &str, password: &str) -> GatewayResponse {
        match self.authenticate(username, password).await {
            Ok(response) => {
                debug!(username, accepted = response.data.is_some(), "Gateway answered");
                response
            }
            Err(e) => {
                error!(username, error = %e, "Login request failed");
                GatewayResponse::failure(e.user_message())
            }
        }
    }
}
