//! One-shot HTTP fetch helper
//!
//! Turns a loosely specified [`FetchRequest`] (URL, optional query params,
//! optional JSON data, headers, method) into a wire-ready [`HttpRequest`],
//! sends it through an [`HttpTransport`] and classifies the result.

use crate::ports::http::{HttpRequest, HttpTransport, RawResponse, TransportError};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use url::form_urlencoded;

/// Time allowed for every request
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Content type set on requests carrying a JSON body
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// Errors raised before a request is sent
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL does not use http or https
    #[error("Incorrect and possibly insecure protocol in url: {0}")]
    UnsupportedScheme(String),

    /// Request data could not be serialized
    #[error("Failed to encode request body: {0}")]
    InvalidBody(String),
}

/// Caller-side description of a request
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    /// Target URL, must start with `http`
    pub url: String,
    /// JSON object sent as body (or folded into the query for GET)
    pub data: Option<Map<String, Value>>,
    /// Query parameters in order
    pub params: Vec<(String, String)>,
    /// Extra headers, overriding the defaults
    pub headers: Vec<(String, String)>,
    /// HTTP method, case-insensitive
    pub method: String,
}

impl FetchRequest {
    /// Creates a GET request for the URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            data: None,
            params: Vec::new(),
            headers: Vec::new(),
            method: "GET".to_string(),
        }
    }

    /// Creates a POST request for the URL
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(url).with_method("POST")
    }

    /// Sets the method
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Appends a query parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Appends a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the JSON data
    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = Some(data);
        self
    }
}

/// Status code and body text of a completed exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status, `0` when no usable response was obtained
    pub status_code: u16,
    /// Raw body text
    pub text: String,
}

impl Response {
    /// Body text of the failure sentinel
    pub const FAILURE_TEXT: &'static str = "error";

    /// The `{0, "error"}` sentinel standing for "no usable response"
    pub fn failure() -> Self {
        Self {
            status_code: 0,
            text: Self::FAILURE_TEXT.to_string(),
        }
    }

    /// Decodes the body as JSON
    ///
    /// Returns `None` for malformed JSON and for a literal `null`, both of
    /// which carry no reading.
    pub fn json(&self) -> Option<Value> {
        serde_json::from_str::<Value>(&self.text)
            .ok()
            .filter(|value| !value.is_null())
    }
}

impl From<RawResponse> for Response {
    fn from(raw: RawResponse) -> Self {
        Self {
            status_code: raw.status,
            text: raw.text,
        }
    }
}

/// Classified result of a fetch
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The server answered with a non-error status
    Completed(Response),
    /// The server answered with a 4xx/5xx status
    HttpError(Response),
    /// No usable response was obtained
    TransportFailed(TransportError),
}

impl FetchOutcome {
    /// Status code, `0` for transport failures
    pub fn status_code(&self) -> u16 {
        match self {
            FetchOutcome::Completed(r) | FetchOutcome::HttpError(r) => r.status_code,
            FetchOutcome::TransportFailed(_) => 0,
        }
    }

    /// Collapses every failure into [`Response::failure`]
    pub fn into_response(self) -> Response {
        match self {
            FetchOutcome::Completed(r) => r,
            FetchOutcome::HttpError(_) | FetchOutcome::TransportFailed(_) => Response::failure(),
        }
    }
}

/// Builds the wire request
///
/// - the method is uppercased
/// - `Accept: application/json` is always sent unless overridden
/// - for GET, `data` is folded into the query string and no body is sent
/// - otherwise non-empty `data` becomes a JSON body with a JSON content type
///
/// # Errors
/// Returns `FetchError::UnsupportedScheme` if the URL does not start with
/// `http` (case-insensitive)
pub fn prepare(request: FetchRequest) -> Result<HttpRequest, FetchError> {
    if !request.url.to_lowercase().starts_with("http") {
        return Err(FetchError::UnsupportedScheme(request.url));
    }

    let method = request.method.to_uppercase();

    let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
    for (name, value) in request.headers {
        set_header(&mut headers, name, value);
    }

    let mut params = request.params;
    let mut data = request.data.unwrap_or_default();
    if method == "GET" {
        for (key, value) in std::mem::take(&mut data) {
            merge_query_value(&mut params, &key, value);
        }
    }

    let mut url = request.url;
    if !params.is_empty() {
        url.push('?');
        url.push_str(&encode_query(&params));
    }

    let body = if data.is_empty() {
        None
    } else {
        let bytes = serde_json::to_vec(&data).map_err(|e| FetchError::InvalidBody(e.to_string()))?;
        set_header(
            &mut headers,
            "Content-Type".to_string(),
            JSON_CONTENT_TYPE.to_string(),
        );
        Some(bytes)
    };

    Ok(HttpRequest {
        method,
        url,
        headers,
        body,
        timeout: FETCH_TIMEOUT,
    })
}

/// Performs one HTTP round-trip
///
/// Logs a line before sending and one describing the result. Network and
/// HTTP failures are reported through [`FetchOutcome`], never as `Err`.
pub async fn fetch<T>(transport: &T, request: FetchRequest) -> Result<FetchOutcome, FetchError>
where
    T: HttpTransport + ?Sized,
{
    let request = prepare(request)?;
    let url = request.url.clone();

    info!(method = %request.method, "fetch({})", url);

    let outcome = match transport.send(request).await {
        Ok(raw) if raw.status >= 400 => {
            warn!("fetch({}): http error {}", url, raw.status);
            FetchOutcome::HttpError(raw.into())
        }
        Ok(raw) => {
            info!("fetch({}): response status {}", url, raw.status);
            FetchOutcome::Completed(raw.into())
        }
        Err(TransportError::Timeout) => {
            warn!("fetch({}): timeout", url);
            FetchOutcome::TransportFailed(TransportError::Timeout)
        }
        Err(e) => {
            warn!("fetch({}): error {}", url, e);
            FetchOutcome::TransportFailed(e)
        }
    };

    Ok(outcome)
}

fn set_header(headers: &mut Vec<(String, String)>, name: String, value: String) {
    match headers
        .iter_mut()
        .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
    {
        Some(entry) => *entry = (name, value),
        None => headers.push((name, value)),
    }
}

/// Arrays expand to one pair per element
///
/// A key already present keeps its position and takes the new value(s).
fn merge_query_value(params: &mut Vec<(String, String)>, key: &str, value: Value) {
    let pairs: Vec<(String, String)> = match value {
        Value::Array(items) => items.into_iter().map(query_scalar).collect(),
        other => vec![query_scalar(other)],
    }
    .into_iter()
    .map(|value| (key.to_string(), value))
    .collect();

    match params.iter().position(|(existing, _)| existing == key) {
        Some(index) => {
            params.retain(|(existing, _)| existing != key);
            let tail = params.split_off(index);
            params.extend(pairs);
            params.extend(tail);
        }
        None => params.extend(pairs),
    }
}

/// Booleans and null are spelled `True`, `False` and `None`
fn query_scalar(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}

/// Form-encodes the pairs
///
/// Letters, digits, `_.-~` and `/` are kept; space becomes `+`; everything
/// else, `*` included, is percent-encoded.
pub fn encode_query(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{}={}", encode_component(key), encode_component(value)))
        .collect::<Vec<_>>()
        .join("&")
}

fn encode_component(raw: &str) -> String {
    form_urlencoded::byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace("%2F", "/")
        .replace("%7E", "~")
        .replace('*', "%2A")
}
