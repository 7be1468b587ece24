//! The agent execution contract
//!
//! An executor wraps one agent's reasoning loop behind a single call:
//! instruction text in, result text out. The orchestrator never looks
//! inside; it only bounds the call with a timeout and captures the outcome.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors an agent invocation can surface.
///
/// Timeouts are not raised here; the orchestrator owns the time budget and
/// records a distinguished "timeout" error kind on the result itself.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Agent unavailable: {0}")]
    Unavailable(String),
}

impl AgentError {
    /// Short kind label recorded on traces and agent results
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Llm(_) => "llm",
            Self::Network(_) => "network",
            Self::Parse(_) => "parse",
            Self::Unavailable(_) => "unavailable",
        }
    }
}

/// Single-call contract for running one agent.
///
/// Implementations must be safe to call repeatedly and must not retain
/// state across calls beyond what the instruction carries.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    /// Run the agent against an instruction, returning its report text.
    ///
    /// Agents are encouraged to return a JSON object with an `evidence` key
    /// (the structured extraction path); free-form markdown is handled by
    /// the fallback extractor.
    async fn run(&self, instruction: &str) -> Result<String, AgentError>;
}

/// Thread-safe reference to an executor
pub type SharedExecutor = Arc<dyn AgentExecutor>;
