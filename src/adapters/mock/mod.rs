//! Mock adapters for testing.

mod http;

pub use http::{MockHttpClient, RecordedRequest, ScriptedStream};
