//! Mapping of HTTP and decoding failures onto [`ExchangeError`].

use crossarb_core::ExchangeError;
use reqwest::StatusCode;

/// Delay assumed when a 429 carries no usable `Retry-After`.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 1;

/// Converts a transport failure.
pub fn from_reqwest(err: reqwest::Error) -> ExchangeError {
    if err.is_timeout() {
        ExchangeError::Timeout(err.to_string())
    } else if err.is_connect() {
        ExchangeError::Network(format!("connection failed: {err}"))
    } else if err.is_decode() {
        ExchangeError::Serialization(err.to_string())
    } else {
        ExchangeError::Network(err.to_string())
    }
}

/// Converts a response body that did not match the expected shape.
pub fn from_json(err: serde_json::Error) -> ExchangeError {
    ExchangeError::Serialization(err.to_string())
}

/// Converts a non-success HTTP status.
///
/// `order_id` names the order for 404s on order endpoints.
pub fn from_status(
    status: StatusCode,
    retry_after: Option<u64>,
    body: String,
    order_id: Option<&str>,
) -> ExchangeError {
    match status.as_u16() {
        401 | 403 => ExchangeError::Authentication(body),
        404 => match order_id {
            Some(id) => ExchangeError::order_not_found(id),
            None => ExchangeError::api(404, body),
        },
        429 => ExchangeError::rate_limit(retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS)),
        code => ExchangeError::api(code, body),
    }
}
