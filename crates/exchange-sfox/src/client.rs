//! SFOX REST API client with rate limiting.
//!
//! Implements [`ExchangeClient`] against the SFOX v1 API using bearer-token
//! authentication. One client wraps one API key; the execution layer builds
//! a pool of them.
//!
//! # Example
//!
//! ```ignore
//! use crossarb_sfox::{SfoxClient, SfoxClientConfig};
//!
//! let client = SfoxClient::new(SfoxClientConfig::default(), api_key)?;
//! let status = client.place_order(&OrderRequest::buy(pair, dec!(0.5), dec!(9380))).await?;
//! println!("order {} is {}", status.id, status.state);
//! ```

use async_trait::async_trait;
use crossarb_core::{
    Balance, ExchangeClient, ExchangeConfig, ExchangeError, OrderId, OrderRequest, OrderState,
    OrderStatus, Result,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::{header::RETRY_AFTER, Client, RequestBuilder};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::decimal;
use crate::error::{from_json, from_reqwest, from_status};

// =============================================================================
// Constants
// =============================================================================

/// SFOX production API base URL.
pub const SFOX_API_URL: &str = "https://api.sfox.com";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the SFOX client.
#[derive(Debug, Clone)]
pub struct SfoxClientConfig {
    /// Base URL for the API.
    pub base_url: String,

    /// Requests per second allowed per client.
    pub requests_per_second: NonZeroU32,

    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for SfoxClientConfig {
    fn default() -> Self {
        Self {
            base_url: SFOX_API_URL.to_string(),
            requests_per_second: nonzero!(10u32),
            timeout: Duration::from_secs(5),
        }
    }
}

impl From<&ExchangeConfig> for SfoxClientConfig {
    fn from(config: &ExchangeConfig) -> Self {
        Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            requests_per_second: NonZeroU32::new(config.requests_per_second)
                .unwrap_or(nonzero!(1u32)),
            timeout: Duration::from_millis(config.request_timeout_ms),
        }
    }
}

impl SfoxClientConfig {
    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the rate limit.
    #[must_use]
    pub fn with_rate_limit(mut self, requests_per_second: NonZeroU32) -> Self {
        self.requests_per_second = requests_per_second;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// =============================================================================
// Wire Types
// =============================================================================

/// Body of a new order request.
#[derive(Debug, Serialize)]
struct NewOrderBody {
    #[serde(with = "rust_decimal::serde::str")]
    quantity: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    price: Decimal,
    algorithm_id: u32,
    currency_pair: String,
    client_order_id: String,
}

impl From<&OrderRequest> for NewOrderBody {
    fn from(order: &OrderRequest) -> Self {
        Self {
            quantity: order.quantity,
            price: order.limit_price,
            algorithm_id: order.algorithm_id,
            currency_pair: order.pair.symbol(),
            client_order_id: Uuid::new_v4().to_string(),
        }
    }
}

/// SFOX returns numeric ids; tolerate strings as well.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

impl From<RawId> for OrderId {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Number(id) => OrderId::new(id.to_string()),
            RawId::Text(id) => OrderId::new(id),
        }
    }
}

/// Raw order from the order and order-status endpoints.
#[derive(Debug, Clone, Deserialize)]
struct RawOrder {
    id: RawId,
    status: String,
    #[serde(default, deserialize_with = "decimal::exact")]
    filled: Decimal,
    #[serde(default, deserialize_with = "decimal::exact")]
    vwap: Decimal,
    #[serde(default, deserialize_with = "decimal::exact")]
    net_proceeds: Decimal,
}

impl TryFrom<RawOrder> for OrderStatus {
    type Error = ExchangeError;

    fn try_from(raw: RawOrder) -> Result<Self> {
        let state: OrderState = raw.status.parse()?;
        Ok(OrderStatus::new(raw.id.into(), state).with_fill(
            raw.filled,
            raw.vwap,
            raw.net_proceeds,
        ))
    }
}

/// Raw entry of the balance endpoint.
#[derive(Debug, Clone, Deserialize)]
struct RawBalance {
    currency: String,
    #[serde(default, deserialize_with = "decimal::exact")]
    available: Decimal,
}

impl From<RawBalance> for Balance {
    fn from(raw: RawBalance) -> Self {
        Balance::new(raw.currency.as_str(), raw.available)
    }
}

// =============================================================================
// SfoxClient
// =============================================================================

/// SFOX REST API client for one API key.
pub struct SfoxClient {
    config: SfoxClientConfig,
    http: Client,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
    api_key: SecretString,
}

impl fmt::Debug for SfoxClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SfoxClient")
            .field("base_url", &self.config.base_url)
            .field("requests_per_second", &self.config.requests_per_second)
            .finish_non_exhaustive()
    }
}

impl SfoxClient {
    /// Creates a client authenticating with `api_key`.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built or the key is empty.
    pub fn new(config: SfoxClientConfig, api_key: SecretString) -> Result<Self> {
        if api_key.expose_secret().trim().is_empty() {
            return Err(ExchangeError::Configuration("API key is empty".to_string()));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                ExchangeError::Configuration(format!("failed to build HTTP client: {e}"))
            })?;

        let quota = Quota::per_second(config.requests_per_second);
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        Ok(Self {
            config,
            http,
            rate_limiter,
            api_key,
        })
    }

    /// Shares a rate limiter with other clients using the same key.
    #[must_use]
    pub fn with_rate_limiter(mut self, rate_limiter: Arc<DefaultDirectRateLimiter>) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Waits for the rate limiter, sends, and returns the body of a success response.
    async fn send(&self, request: RequestBuilder, order_id: Option<&str>) -> Result<String> {
        self.rate_limiter.until_ready().await;

        let response = request
            .bearer_auth(self.api_key.expose_secret())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok());
        let body = response.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            debug!(status = status.as_u16(), body = %body, "request failed");
            return Err(from_status(status, retry_after, body, order_id));
        }
        Ok(body)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, order_id: Option<&str>) -> Result<T> {
        let url = self.url(path);
        debug!(url = %url, "GET");
        let body = self.send(self.http.get(&url), order_id).await?;
        serde_json::from_str(&body).map_err(from_json)
    }
}

#[async_trait]
impl ExchangeClient for SfoxClient {
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderStatus> {
        let url = self.url(&format!("/v1/orders/{}", order.side));
        let body = NewOrderBody::from(order);
        debug!(
            url = %url,
            pair = %body.currency_pair,
            quantity = %body.quantity,
            price = %body.price,
            client_order_id = %body.client_order_id,
            "POST"
        );

        let text = self.send(self.http.post(&url).json(&body), None).await?;
        let raw: RawOrder = serde_json::from_str(&text).map_err(from_json)?;
        raw.try_into()
    }

    async fn order_status(&self, order_id: &OrderId) -> Result<OrderStatus> {
        let path = format!("/v1/order/{order_id}");
        let raw: RawOrder = self.get(&path, Some(order_id.as_str())).await?;
        raw.try_into()
    }

    async fn cancel_order(&self, order_id: &OrderId) -> Result<()> {
        let url = self.url(&format!("/v1/orders/{order_id}"));
        debug!(url = %url, "DELETE");
        self.send(self.http.delete(&url), Some(order_id.as_str()))
            .await
            .map(|_| ())
    }

    async fn balances(&self) -> Result<Vec<Balance>> {
        let raw: Vec<RawBalance> = self.get("/v1/user/balance", None).await?;
        Ok(raw.into_iter().map(Balance::from).collect())
    }
}
