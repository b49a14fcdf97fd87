//! Shared test helpers for executor and orchestrator tests.

use parley_core::error::ProviderError;
use parley_core::llm::{Completion, LlmClient, LlmRequest, Usage};
use parley_core::tool::{ToolArguments, ToolCall};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// An LLM client that returns a sequence of scripted results.
///
/// Each call to `complete` pops the next result and records the request.
/// Once the script runs out, every further call fails.
pub struct ScriptedClient {
    script: Mutex<VecDeque<Result<Completion, ProviderError>>>,
    requests: Mutex<Vec<LlmRequest>>,
    delay: Duration,
}

impl ScriptedClient {
    pub fn new(script: Vec<Result<Completion, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    /// A client that answers once with plain text.
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![Ok(text_completion(text))])
    }

    /// First a tool-call response, then a final answer.
    pub fn tool_then_answer(tool_calls: Vec<ToolCall>, answer: &str) -> Self {
        Self::new(vec![
            Ok(tool_call_completion(tool_calls)),
            Ok(text_completion(answer)),
        ])
    }

    /// Sleep this long before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every request received so far, in call order.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: LlmRequest) -> Result<Completion, ProviderError> {
        self.requests.lock().unwrap().push(request);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Network("script exhausted".into())))
    }
}

pub fn text_completion(text: &str) -> Completion {
    Completion {
        content: text.to_string(),
        tool_calls: Vec::new(),
        usage: Some(Usage::new(10, 5)),
        model: "mock-model".into(),
    }
}

pub fn tool_call_completion(tool_calls: Vec<ToolCall>) -> Completion {
    Completion {
        content: String::new(),
        tool_calls,
        usage: Some(Usage::new(10, 5)),
        model: "mock-model".into(),
    }
}

/// A tool call whose id is derived from the tool name.
pub fn make_tool_call(name: &str, arguments: ToolArguments) -> ToolCall {
    ToolCall::new(format!("call_{name}"), name, arguments)
}
