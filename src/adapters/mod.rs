//! Adapter implementations of the trait abstractions.
//!
//! - [`ReqwestHttpClient`] - production HTTP client
//! - [`mock`] - scripted implementations for tests

pub mod mock;
mod reqwest_http;

pub use reqwest_http::ReqwestHttpClient;
