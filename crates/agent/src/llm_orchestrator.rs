//! LlmOrchestrator: owns the agent set and drives one turn across it.
//!
//! Agents run one after another in priority order, each against the same
//! pre-turn snapshot, so no agent sees another's output within a turn.
//! Their responses are merged into a single [`LlmResponse`]; a failing
//! agent marks the turn unsuccessful without hiding the others' content.

use chrono::Utc;
use parley_core::agent::{AgentConfiguration, AgentResponse, LlmResponse};
use parley_core::error::{Error, ErrorKind, Result};
use parley_core::llm::Usage;
use parley_core::message::ConversationContext;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::executor::AgentExecutor;

/// Shown to the user when a turn produced nothing usable.
pub const APOLOGY: &str = "I apologize, but I encountered an error processing your request.";

const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

pub struct LlmOrchestrator {
    executor: Arc<AgentExecutor>,
    /// Registration order; execution order is derived from it.
    agents: RwLock<Vec<AgentConfiguration>>,
    retry_backoff: Duration,
}

impl LlmOrchestrator {
    pub fn new(executor: Arc<AgentExecutor>) -> Self {
        Self {
            executor,
            agents: RwLock::new(Vec::new()),
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// Base delay between retries; doubled on every attempt.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn executor(&self) -> &AgentExecutor {
        &self.executor
    }

    fn read_agents(&self) -> RwLockReadGuard<'_, Vec<AgentConfiguration>> {
        self.agents.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_agents(&self) -> RwLockWriteGuard<'_, Vec<AgentConfiguration>> {
        self.agents.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn register_agent(&self, agent: AgentConfiguration) -> Result<()> {
        if agent.agent_id.trim().is_empty() {
            return Err(Error::InvalidInput("agent_id must not be empty".into()));
        }
        let mut agents = self.write_agents();
        if agents.iter().any(|a| a.agent_id == agent.agent_id) {
            return Err(Error::DuplicateAgent(agent.agent_id));
        }
        info!(
            agent_id = %agent.agent_id,
            priority = agent.priority,
            enabled = agent.enabled,
            "Agent registered"
        );
        agents.push(agent);
        Ok(())
    }

    pub fn remove_agent(&self, agent_id: &str) -> bool {
        let mut agents = self.write_agents();
        let before = agents.len();
        agents.retain(|a| a.agent_id != agent_id);
        before != agents.len()
    }

    pub fn clear_agents(&self) {
        self.write_agents().clear();
    }

    /// Takes effect from the next turn; a turn in flight keeps its agents.
    pub fn enable_agent(&self, agent_id: &str) -> bool {
        self.set_enabled(agent_id, true)
    }

    pub fn disable_agent(&self, agent_id: &str) -> bool {
        self.set_enabled(agent_id, false)
    }

    fn set_enabled(&self, agent_id: &str, enabled: bool) -> bool {
        match self.write_agents().iter_mut().find(|a| a.agent_id == agent_id) {
            Some(agent) => {
                agent.enabled = enabled;
                debug!(agent_id = %agent_id, enabled, "Agent toggled");
                true
            }
            None => false,
        }
    }

    pub fn agent(&self, agent_id: &str) -> Option<AgentConfiguration> {
        self.read_agents()
            .iter()
            .find(|a| a.agent_id == agent_id)
            .cloned()
    }

    /// All registered agents in registration order.
    pub fn agents(&self) -> Vec<AgentConfiguration> {
        self.read_agents().clone()
    }

    /// Enabled agent ids in execution order.
    pub fn list_active_agents(&self) -> Vec<String> {
        self.active_agents()
            .into_iter()
            .map(|a| a.agent_id)
            .collect()
    }

    /// Enabled agents, ascending priority; ties keep registration order.
    fn active_agents(&self) -> Vec<AgentConfiguration> {
        let mut active: Vec<AgentConfiguration> = self
            .read_agents()
            .iter()
            .filter(|a| a.enabled)
            .cloned()
            .collect();
        active.sort_by_key(|a| a.priority);
        active
    }

    /// Run every active agent against `context` and merge the results.
    ///
    /// The agent set is copied when the turn starts, so toggling agents
    /// while a turn runs only affects later turns. Only an empty context is
    /// an `Err`; everything that goes wrong inside an agent is reported in
    /// the returned response.
    pub async fn process(&self, context: &ConversationContext) -> Result<LlmResponse> {
        if context.is_empty() {
            return Err(Error::InvalidInput(
                "conversation context has no messages".into(),
            ));
        }

        let active = self.active_agents();
        if active.is_empty() {
            warn!(conversation_id = %context.conversation_id(), "No active agents");
            return Ok(LlmResponse::no_agents());
        }

        info!(
            conversation_id = %context.conversation_id(),
            agents = active.len(),
            "Processing turn"
        );

        let mut responses = Vec::with_capacity(active.len());
        for agent in &active {
            responses.push(self.run_with_retry(agent, context).await);
        }

        Ok(merge_responses(responses))
    }

    /// Re-run an agent whose LLM call failed before any tool ran.
    async fn run_with_retry(
        &self,
        agent: &AgentConfiguration,
        context: &ConversationContext,
    ) -> AgentResponse {
        let mut attempt: u32 = 0;
        loop {
            let response = self.executor.execute(agent, context).await;

            let retryable = response.is_error()
                && response.error_kind == Some(ErrorKind::LlmCallFailed)
                && response.tool_responses.is_empty();
            if !retryable || attempt >= agent.max_retries {
                return response;
            }

            let delay = self.retry_backoff.saturating_mul(1 << attempt.min(16));
            attempt += 1;
            warn!(
                agent_id = %agent.agent_id,
                attempt,
                max_retries = agent.max_retries,
                delay_ms = delay.as_millis() as u64,
                "Retrying agent after LLM failure"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Fold per-agent responses (in execution order) into one.
pub fn merge_responses(responses: Vec<AgentResponse>) -> LlmResponse {
    let usage = Usage::merge(responses.iter().map(|r| &r.usage));

    let mut contents = Vec::new();
    let mut tool_calls = Vec::new();
    let mut tool_responses = Vec::new();
    let mut failures = Vec::new();
    let mut failed_agents = Vec::new();
    let mut error_kind = None;

    for response in responses {
        if response.is_error() {
            failures.push(format!(
                "Agent {} failed: {}",
                response.agent_id,
                response.error_message.as_deref().unwrap_or("unknown error")
            ));
            error_kind = error_kind.or(response.error_kind);
            failed_agents.push(response.agent_id);
        } else if !response.content.trim().is_empty() {
            contents.push(response.content);
        }
        tool_calls.extend(response.tool_calls);
        tool_responses.extend(response.tool_responses);
    }

    let success = failed_agents.is_empty();
    let mut content = contents.join("\n\n");
    if !success && content.is_empty() {
        content = APOLOGY.to_string();
    }

    LlmResponse {
        content,
        tool_calls,
        tool_responses,
        success,
        error_message: (!success).then(|| failures.join("; ")),
        error_kind,
        failed_agents,
        usage,
        timestamp: Utc::now(),
    }
}
