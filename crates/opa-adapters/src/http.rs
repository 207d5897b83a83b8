//! reqwest-backed HTTP transport
//!
//! Implements the `HttpTransport` port. Status codes are not interpreted here;
//! only failures below HTTP are mapped to `TransportError`.

use async_trait::async_trait;
use opa_core::ports::http::{HttpRequest, HttpTransport, RawResponse, TransportError};
use reqwest::{Client, Method};
use tracing::{debug, error};

/// User agent sent with every request
const USER_AGENT: &str = concat!("opa/", env!("CARGO_PKG_VERSION"));

/// HTTP transport using a shared `reqwest::Client`
///
/// The per-request timeout carried by `HttpRequest` bounds the whole
/// round-trip, body included.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Creates a transport with its own connection pool
    ///
    /// # Errors
    /// Returns `TransportError::Network` if the TLS backend cannot be initialized
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                error!(error = %e, "Failed to create HTTP client");
                TransportError::Network(e.to_string())
            })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<RawResponse, TransportError> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        let mut builder = self
            .client
            .request(method, &request.url)
            .timeout(request.timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        debug!(status, url = %request.url, "Received response headers");

        // Decodes with the charset named in Content-Type, UTF-8 otherwise
        let text = response.text().await.map_err(classify)?;

        Ok(RawResponse { status, text })
    }
}

fn classify(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_builder() {
        TransportError::InvalidRequest(e.to_string())
    } else {
        TransportError::Network(e.to_string())
    }
}
