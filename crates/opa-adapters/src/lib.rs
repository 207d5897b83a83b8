//! OPA Adapters - Infrastructure implementations
//!
//! This crate contains concrete implementations of the ports defined in opa-core.
//! Today that is the reqwest-based HTTP transport.

pub mod http;

// Re-export primary adapter types
pub use http::ReqwestTransport;
