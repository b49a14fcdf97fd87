//! Error types for the Parley domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.
//!
//! Failures that must not abort a turn (a tool that failed, an agent whose
//! LLM call failed) are converted into data at the component boundary and
//! tagged with an [`ErrorKind`]. Only wiring mistakes and invalid input reach
//! callers as `Err`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The top-level error type for all Parley operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- LLM client errors ---
    #[error("LLM client error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Persistence errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Orchestration ---
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No active agents configured")]
    NoActiveAgents,

    #[error("Agent already registered: {0}")]
    DuplicateAgent(String),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// The taxonomy bucket this error falls into.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Provider(_) => ErrorKind::LlmCallFailed,
            Error::Tool(e) => e.kind(),
            Error::NoActiveAgents => ErrorKind::NoActiveAgents,
            Error::InvalidInput(_) | Error::Serialization(_) | Error::DuplicateAgent(_) => {
                ErrorKind::InvalidInput
            }
            Error::Store(_) | Error::Config { .. } | Error::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure classification carried by data-level results
/// (`ToolResponse`, `AgentResponse`, `LlmResponse`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No registered ToolSet claims the requested tool name.
    ToolNotFound,
    /// The tool ran but returned or raised an error (including timeouts).
    ToolExecutionFailed,
    /// Network failure, timeout or malformed response from the LLM client.
    LlmCallFailed,
    /// The orchestrator has nothing to run.
    NoActiveAgents,
    /// Empty user message or malformed tool arguments.
    InvalidInput,
    /// Anything else that escaped a component boundary.
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::ToolNotFound => "tool_not_found",
            ErrorKind::ToolExecutionFailed => "tool_execution_failed",
            ErrorKind::LlmCallFailed => "llm_call_failed",
            ErrorKind::NoActiveAgents => "no_active_agents",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_ms}ms")]
    Timeout { tool_name: String, timeout_ms: u64 },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool '{tool_name}' is already claimed by tool set '{tool_set_id}'")]
    AlreadyClaimed {
        tool_name: String,
        tool_set_id: String,
    },
}

impl ToolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolError::NotFound(_) => ErrorKind::ToolNotFound,
            ToolError::ExecutionFailed { .. } | ToolError::Timeout { .. } => {
                ErrorKind::ToolExecutionFailed
            }
            ToolError::InvalidArguments(_) => ErrorKind::InvalidInput,
            ToolError::AlreadyClaimed { .. } => ErrorKind::Internal,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),
}
