//! Port definitions for Hexagonal Architecture
//!
//! These traits define the boundaries between the core domain and external adapters.

pub mod http;

pub use http::{HttpRequest, HttpTransport, RawResponse, TransportError};
