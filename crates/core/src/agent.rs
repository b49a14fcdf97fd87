//! Agent configuration and per-turn outcome types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ErrorKind;
use crate::llm::Usage;
use crate::tool::{ToolCall, ToolResponse};

/// Configuration for one agent. Immutable once loaded for a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfiguration {
    pub agent_id: String,

    #[serde(default)]
    pub agent_name: String,

    #[serde(default)]
    pub description: String,

    /// Model to use (e.g., "gpt-4o-mini")
    #[serde(default)]
    pub model_name: String,

    /// LLM client name to route to; empty means the default client
    #[serde(default)]
    pub provider: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Budget for one LLM call, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Budget for one tool execution, in milliseconds
    #[serde(default = "default_tool_timeout_ms")]
    pub tool_timeout_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Maximum tool calls honoured per LLM response (safety limit)
    #[serde(default = "default_max_tool_calls")]
    pub max_tool_calls: usize,

    #[serde(default = "default_true")]
    pub can_execute_tools: bool,

    /// Whether tool results are sent back to the model for a final answer
    #[serde(default = "default_true")]
    pub follow_up: bool,

    #[serde(default)]
    pub system_prompt: String,

    /// ToolSet ids or individual tool names this agent may use
    #[serde(default)]
    pub tools: Vec<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Execution order; lower runs first
    #[serde(default)]
    pub priority: i32,

    /// USD per 1K prompt tokens
    #[serde(default)]
    pub input_token_cost: f64,

    /// USD per 1K completion tokens
    #[serde(default)]
    pub output_token_cost: f64,
}

fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_timeout_ms() -> u64 {
    10_000
}
fn default_tool_timeout_ms() -> u64 {
    5_000
}
fn default_max_retries() -> u32 {
    3
}
fn default_max_tool_calls() -> usize {
    5
}
fn default_true() -> bool {
    true
}

impl AgentConfiguration {
    pub fn new(agent_id: impl Into<String>) -> Self {
        let agent_id = agent_id.into();
        Self {
            agent_name: agent_id.clone(),
            agent_id,
            description: String::new(),
            model_name: String::new(),
            provider: String::new(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_ms: default_timeout_ms(),
            tool_timeout_ms: default_tool_timeout_ms(),
            max_retries: default_max_retries(),
            max_tool_calls: default_max_tool_calls(),
            can_execute_tools: true,
            follow_up: true,
            system_prompt: String::new(),
            tools: Vec::new(),
            enabled: true,
            priority: 0,
            input_token_cost: 0.0,
            output_token_cost: 0.0,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_name = model.into();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_tools(mut self, tools: &[&str]) -> Self {
        self.tools = tools.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_millis(self.tool_timeout_ms)
    }
}

/// Terminal state of an agent turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Completed,
    Error,
}

/// Per-agent outcome of one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub agent_id: String,

    /// Final text; empty or partial when `state` is `Error`
    pub content: String,

    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,

    #[serde(default)]
    pub tool_responses: Vec<ToolResponse>,

    pub state: AgentState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    pub usage: Option<Usage>,

    pub timestamp: DateTime<Utc>,
}

impl AgentResponse {
    pub fn completed(agent_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            content: content.into(),
            tool_calls: Vec::new(),
            tool_responses: Vec::new(),
            state: AgentState::Completed,
            error_kind: None,
            error_message: None,
            usage: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(agent_id: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            state: AgentState::Error,
            error_kind: Some(kind),
            error_message: Some(message.into()),
            ..Self::completed(agent_id, "")
        }
    }

    pub fn is_error(&self) -> bool {
        self.state == AgentState::Error
    }
}

/// The merged outcome of a turn, returned to the caller of the chat layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,

    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,

    #[serde(default)]
    pub tool_responses: Vec<ToolResponse>,

    /// True only if every active agent completed
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_agents: Vec<String>,

    pub usage: Option<Usage>,

    pub timestamp: DateTime<Utc>,
}

impl LlmResponse {
    /// The response when no agent is enabled.
    pub fn no_agents() -> Self {
        Self::failure(
            ErrorKind::NoActiveAgents,
            "No active agents",
            "No agents are configured to handle this request.",
        )
    }

    pub fn failure(kind: ErrorKind, message: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
            tool_responses: Vec::new(),
            success: false,
            error_message: Some(message.into()),
            error_kind: Some(kind),
            failed_agents: Vec::new(),
            usage: None,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_defaults_from_toml() {
        let config: AgentConfiguration = toml::from_str(r#"agent_id = "travel""#).unwrap();
        assert_eq!(config.max_tokens, 2048);
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.tool_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_tool_calls, 5);
        assert!(config.enabled);
        assert!(config.can_execute_tools);
        assert!(config.tools.is_empty());
    }

    #[test]
    fn builder_matches_serde_defaults() {
        let built = AgentConfiguration::new("travel");
        let parsed: AgentConfiguration = toml::from_str(
            r#"
            agent_id = "travel"
            agent_name = "travel"
            "#,
        )
        .unwrap();
        assert_eq!(built, parsed);
    }

    #[test]
    fn error_response_is_empty_and_tagged() {
        let resp = AgentResponse::error("a", ErrorKind::LlmCallFailed, "timeout");
        assert!(resp.is_error());
        assert!(resp.content.is_empty());
        assert_eq!(resp.error_kind, Some(ErrorKind::LlmCallFailed));
    }

    #[test]
    fn no_agents_response() {
        let resp = LlmResponse::no_agents();
        assert!(!resp.success);
        assert_eq!(resp.error_message.as_deref(), Some("No active agents"));
        assert_eq!(resp.error_kind, Some(ErrorKind::NoActiveAgents));
        assert!(resp.content.contains("No agents are configured"));
    }
}
