//! Event-stream frame decoding.
//!
//! The gateway streams completions as newline-delimited frames:
//! - `data: <json>` - one completion chunk
//! - `data: [DONE]` - terminal sentinel
//! - anything else (comments, blank lines, other fields) is discarded
//!
//! Chunk boundaries are arbitrary; [`FrameDecoder`] carries partial lines
//! across chunks.

mod decoder;

pub use decoder::{FrameDecoder, DONE_SENTINEL};
