//! In-memory transport used by unit tests

use crate::ports::http::{HttpRequest, HttpTransport, RawResponse, TransportError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Answers requests from a table keyed by URL (query string ignored)
///
/// Unknown URLs fail with a network error. Every request is recorded.
pub(crate) struct MockTransport {
    routes: Mutex<HashMap<String, Result<RawResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn respond(self, url: &str, status: u16, body: &str) -> Self {
        self.routes.lock().unwrap().insert(
            url.to_string(),
            Ok(RawResponse {
                status,
                text: body.to_string(),
            }),
        );
        self
    }

    pub(crate) fn fail(self, url: &str, error: TransportError) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Err(error));
        self
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub(crate) fn last_request(&self) -> Option<HttpRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<RawResponse, TransportError> {
        let route = request
            .url
            .split('?')
            .next()
            .unwrap_or_default()
            .to_string();
        self.requests.lock().unwrap().push(request);

        self.routes
            .lock()
            .unwrap()
            .get(&route)
            .cloned()
            .unwrap_or_else(|| Err(TransportError::Network(format!("no route to {}", route))))
    }
}
