pub mod client;
pub mod prompt;
pub mod rerank;

use thiserror::Error;

pub use client::{ClaudeClient, LlmClient};

/// Failures of the re-rank collaborator. All of them are recovered by
/// falling back to the engine order.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM not configured")]
    NotConfigured,

    #[error("LLM request timed out")]
    Timeout,

    #[error("LLM transport error: {0}")]
    Transport(String),

    #[error("LLM API returned status {0}")]
    Status(u16),

    #[error("unexpected LLM response body: {0}")]
    Decode(String),

    #[error("no JSON object in LLM output")]
    NoJson,

    #[error("malformed re-rank payload: {0}")]
    Malformed(String),

    #[error("re-rank payload had no usable entries")]
    Empty,
}
