//! LlmClient trait: the abstraction over LLM backends.
//!
//! An LlmClient takes a conversation plus a tool catalogue and returns either
//! text or a set of tool calls. The orchestration layer never knows which
//! backend answered.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::Message;
use crate::tool::{ToolCall, ToolDefinition};

/// One request to an LLM client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    /// The model to use (e.g., "gpt-4o-mini")
    pub model: String,

    /// Preferred provider name; routing clients use it, others ignore it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// The conversation messages
    pub messages: Vec<Message>,

    /// Tools the model may call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

impl LlmRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            provider: None,
            messages,
            tools: Vec::new(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }

    /// The tool catalogue in wire shape.
    pub fn wire_tools(&self) -> Vec<serde_json::Value> {
        self.tools.iter().map(ToolDefinition::to_wire).collect()
    }
}

/// What the model produced for one request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Completion {
    pub content: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

impl Completion {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Default::default()
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    #[serde(default)]
    pub cost_usd: f64,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            cost_usd: 0.0,
        }
    }

    /// Fill in `cost_usd` from per-1K-token prices.
    pub fn priced(mut self, input_cost_per_1k: f64, output_cost_per_1k: f64) -> Self {
        self.cost_usd = (self.prompt_tokens as f64 / 1000.0) * input_cost_per_1k
            + (self.completion_tokens as f64 / 1000.0) * output_cost_per_1k;
        self
    }

    /// Sum optional usages; `None` when none of them carried any.
    pub fn merge<'a>(usages: impl IntoIterator<Item = &'a Option<Usage>>) -> Option<Usage> {
        usages
            .into_iter()
            .flatten()
            .copied()
            .reduce(|mut acc, u| {
                acc += u;
                acc
            })
    }
}

impl std::ops::AddAssign for Usage {
    fn add_assign(&mut self, rhs: Self) {
        self.prompt_tokens += rhs.prompt_tokens;
        self.completion_tokens += rhs.completion_tokens;
        self.total_tokens += rhs.total_tokens;
        self.cost_usd += rhs.cost_usd;
    }
}

/// The core LlmClient trait.
///
/// Failures are reported as `ProviderError`; callers decide whether to retry.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// A human-readable name for this client (e.g., "simulated").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: LlmRequest) -> std::result::Result<Completion, ProviderError>;

    /// Health check: can we reach the backend?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}
