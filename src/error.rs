//! Core error taxonomy for the report pipeline.
//!
//! These are the *expected* failure modes of the pipeline — caller
//! mistakes, unproducible output, and untrusted oracle text that fails
//! the parse boundary. Infrastructure failures (HTTP transport, retry
//! exhaustion) travel as `anyhow::Error` with context, as they do
//! throughout the rest of the crate.

use thiserror::Error;

/// Typed pipeline errors.
///
/// | Variant | Meaning | Retried? |
/// |---------|---------|----------|
/// | `InvalidInput` | bad parameters, caller error | never |
/// | `ChunkingFailed` | no valid chunks producible from the document | never |
/// | `MalformedResponse` | oracle text failed to parse as the expected structure | recoverable mid-stream, fatal on the first batch |
/// | `UnsupportedFormat` | unrecognized document file extension | never |
#[derive(Debug, Error)]
pub enum WeaveError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("chunking failed: {0}")]
    ChunkingFailed(String),

    #[error("malformed oracle response: {0}")]
    MalformedResponse(String),

    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),
}
