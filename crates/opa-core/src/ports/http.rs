//! HTTP transport port definition

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// A fully prepared HTTP request, ready to be put on the wire
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Uppercased HTTP method (e.g., "GET", "POST")
    pub method: String,
    /// Absolute URL including any query string
    pub url: String,
    /// Request headers in insertion order
    pub headers: Vec<(String, String)>,
    /// Serialized request body, if any
    pub body: Option<Vec<u8>>,
    /// Total time allowed for the round-trip
    pub timeout: Duration,
}

impl HttpRequest {
    /// Returns the value of a header, comparing names case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Raw response as received from the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Body decoded with the response charset (UTF-8 when unspecified)
    pub text: String,
}

/// Errors raised below the HTTP layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request did not complete within its timeout
    #[error("timeout")]
    Timeout,

    /// Connection, DNS, TLS or protocol failure
    #[error("network error: {0}")]
    Network(String),

    /// The request could not be built (bad method, header or URL)
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    /// Returns true if the failure was a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout)
    }
}

/// Port for performing a single HTTP round-trip
///
/// Implementations must not interpret the status code: 4xx/5xx responses are
/// returned as `Ok(RawResponse)` so the caller can classify them.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends the request and returns the status and decoded body
    async fn send(&self, request: HttpRequest) -> Result<RawResponse, TransportError>;
}
