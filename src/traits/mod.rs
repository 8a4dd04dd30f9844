//! Trait abstractions for external dependencies.
//!
//! The orchestrator and gateway client depend on these seams instead of
//! concrete transports, so every streaming scenario can be driven from a
//! scripted mock in tests.

mod http;

pub use http::{
    header_get, ByteStream, Headers, HttpClient, HttpError, Response, StreamResponse,
};
