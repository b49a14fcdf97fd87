//! AgentExecutor: runs one agent's contribution to a turn.
//!
//! 1. Build a request from the agent's system prompt, the context snapshot
//!    and the agent's tool catalogue
//! 2. Call the LLM client (bounded by the agent timeout)
//! 3. Dispatch requested tool calls through the ToolSet registry
//! 4. Feed the results back in a follow-up call on a working copy
//! 5. Return an `AgentResponse`; failures are data, never `Err`
//!
//! The executor never writes to the caller's context. Everything it wants
//! appended comes back inside the response.

use chrono::Utc;
use parley_core::agent::{AgentConfiguration, AgentResponse};
use parley_core::error::{ErrorKind, ProviderError, ToolError};
use parley_core::event::{DomainEvent, EventBus};
use parley_core::llm::{Completion, LlmClient, LlmRequest, Usage};
use parley_core::message::{ConversationContext, Message};
use parley_core::tool::{ToolCall, ToolDebugSink, ToolDefinition, ToolResponse, ToolSetRegistry};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct AgentExecutor {
    client: Arc<dyn LlmClient>,
    tools: Arc<ToolSetRegistry>,
    event_bus: Arc<EventBus>,
    debug_sink: Option<Arc<dyn ToolDebugSink>>,
}

impl AgentExecutor {
    pub fn new(
        client: Arc<dyn LlmClient>,
        tools: Arc<ToolSetRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            client,
            tools,
            event_bus,
            debug_sink: None,
        }
    }

    /// Report every tool execution to `sink`.
    pub fn with_debug_sink(mut self, sink: Arc<dyn ToolDebugSink>) -> Self {
        self.debug_sink = Some(sink);
        self
    }

    pub fn tools(&self) -> &ToolSetRegistry {
        &self.tools
    }

    /// The tools this agent may call.
    pub fn catalogue(&self, agent: &AgentConfiguration) -> Vec<ToolDefinition> {
        if !agent.can_execute_tools {
            return Vec::new();
        }
        self.tools.catalogue_for(&agent.tools)
    }

    /// Build the LLM request for `context`. The system prompt is added to the
    /// request only, never to the context.
    pub fn build_request(
        &self,
        agent: &AgentConfiguration,
        context: &ConversationContext,
        tools: &[ToolDefinition],
    ) -> LlmRequest {
        let mut messages = Vec::with_capacity(context.len() + 1);
        if !agent.system_prompt.trim().is_empty() {
            messages.push(Message::system(
                context.conversation_id(),
                &agent.system_prompt,
            ));
        }
        messages.extend(context.messages().iter().cloned());

        let mut request = LlmRequest::new(&agent.model_name, messages);
        request.provider = Some(agent.provider.clone()).filter(|p| !p.is_empty());
        request.tools = tools.to_vec();
        request.temperature = agent.temperature;
        request.max_tokens = Some(agent.max_tokens);
        request
    }

    /// Run one agent against a context snapshot.
    pub async fn execute(
        &self,
        agent: &AgentConfiguration,
        context: &ConversationContext,
    ) -> AgentResponse {
        let started = Instant::now();
        let catalogue = self.catalogue(agent);

        info!(
            agent_id = %agent.agent_id,
            conversation_id = %context.conversation_id(),
            messages = context.len(),
            tools = catalogue.len(),
            "Executing agent"
        );

        let request = self.build_request(agent, context, &catalogue);
        let first = match self.call_llm(agent, request).await {
            Ok(completion) => completion,
            Err(e) => {
                let response =
                    AgentResponse::error(&agent.agent_id, ErrorKind::LlmCallFailed, e.to_string());
                return self.finish(agent, response, &[], started);
            }
        };

        let mut usages = vec![first.usage];
        let tool_calls = self.admit_tool_calls(agent, first.tool_calls);

        if tool_calls.is_empty() {
            let response = AgentResponse::completed(&agent.agent_id, first.content);
            return self.finish(agent, response, &usages, started);
        }

        let allowed: HashSet<&str> = catalogue.iter().map(|d| d.name.as_str()).collect();
        let mut tool_responses = Vec::with_capacity(tool_calls.len());
        for call in &tool_calls {
            tool_responses.push(self.dispatch(agent, &allowed, call).await);
        }

        if !agent.follow_up {
            let mut response = AgentResponse::completed(&agent.agent_id, first.content);
            response.tool_calls = tool_calls;
            response.tool_responses = tool_responses;
            return self.finish(agent, response, &usages, started);
        }

        let mut working = context.clone();
        let appended = working
            .push(Message::assistant_tool_calls(
                context.conversation_id(),
                &first.content,
                tool_calls.clone(),
            ))
            .and_then(|_| {
                tool_responses.iter().try_for_each(|r| {
                    working.push(Message::tool_result(
                        context.conversation_id(),
                        &r.tool_call_id,
                        &r.content,
                    ))
                })
            });

        let mut response = match appended {
            Err(e) => {
                warn!(agent_id = %agent.agent_id, error = %e, "Could not build follow-up context");
                let mut response =
                    AgentResponse::error(&agent.agent_id, ErrorKind::Internal, e.to_string());
                response.content = first.content;
                response
            }
            Ok(()) => {
                debug!(agent_id = %agent.agent_id, tool_results = tool_responses.len(), "Follow-up call");
                let request = self.build_request(agent, &working, &catalogue);
                match self.call_llm(agent, request).await {
                    Ok(second) => {
                        if second.has_tool_calls() {
                            warn!(
                                agent_id = %agent.agent_id,
                                ignored = second.tool_calls.len(),
                                "Tool calls in follow-up response ignored"
                            );
                        }
                        usages.push(second.usage);
                        AgentResponse::completed(&agent.agent_id, second.content)
                    }
                    Err(e) => {
                        let mut response = AgentResponse::error(
                            &agent.agent_id,
                            ErrorKind::LlmCallFailed,
                            format!("follow-up call failed: {e}"),
                        );
                        response.content = first.content;
                        response
                    }
                }
            }
        };

        response.tool_calls = tool_calls;
        response.tool_responses = tool_responses;
        self.finish(agent, response, &usages, started)
    }

    async fn call_llm(
        &self,
        agent: &AgentConfiguration,
        request: LlmRequest,
    ) -> Result<Completion, ProviderError> {
        match tokio::time::timeout(agent.timeout(), self.client.complete(request)).await {
            Ok(Ok(completion)) => Ok(completion),
            Ok(Err(e)) => {
                warn!(agent_id = %agent.agent_id, client = %self.client.name(), error = %e, "LLM call failed");
                Err(e)
            }
            Err(_) => {
                warn!(agent_id = %agent.agent_id, timeout_ms = agent.timeout_ms, "LLM call timed out");
                Err(ProviderError::Timeout(format!(
                    "no response within {}ms",
                    agent.timeout_ms
                )))
            }
        }
    }

    /// Apply the agent's tool permissions and per-response limit.
    fn admit_tool_calls(&self, agent: &AgentConfiguration, mut calls: Vec<ToolCall>) -> Vec<ToolCall> {
        if calls.is_empty() {
            return calls;
        }
        if !agent.can_execute_tools {
            warn!(agent_id = %agent.agent_id, ignored = calls.len(), "Agent may not execute tools");
            return Vec::new();
        }
        if calls.len() > agent.max_tool_calls {
            warn!(
                agent_id = %agent.agent_id,
                requested = calls.len(),
                limit = agent.max_tool_calls,
                "Too many tool calls, extra calls dropped"
            );
            calls.truncate(agent.max_tool_calls);
        }
        for call in calls.iter_mut().filter(|c| c.id.trim().is_empty()) {
            *call = ToolCall::generate(&call.name, call.arguments.clone());
        }
        calls
    }

    async fn dispatch(
        &self,
        agent: &AgentConfiguration,
        allowed: &HashSet<&str>,
        call: &ToolCall,
    ) -> ToolResponse {
        let started = Instant::now();
        debug!(
            agent_id = %agent.agent_id,
            tool = %call.name,
            arguments = %call.arguments.summary(),
            "Dispatching tool call"
        );

        let response = self.run_tool(agent, allowed, call).await;

        self.event_bus.publish(DomainEvent::ToolExecuted {
            agent_id: agent.agent_id.clone(),
            tool_name: call.name.clone(),
            success: response.success,
            duration_ms: started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        });
        response
    }

    async fn run_tool(
        &self,
        agent: &AgentConfiguration,
        allowed: &HashSet<&str>,
        call: &ToolCall,
    ) -> ToolResponse {
        let sink = self.debug_sink.as_deref();

        let tool_set = match self.tools.resolve(&call.name) {
            Some(set) if allowed.contains(call.name.as_str()) => set,
            _ => {
                warn!(agent_id = %agent.agent_id, tool = %call.name, "No tool set claims this tool");
                let error = ToolError::NotFound(call.name.clone());
                if let Some(sink) = sink {
                    sink.on_tool_error(&call.name, "", &error.to_string());
                }
                return ToolResponse::from_error(call, &error);
            }
        };

        if let Err(error) = tool_set.validate(call).await {
            warn!(tool = %call.name, error = %error, "Tool call rejected");
            if let Some(sink) = sink {
                sink.on_tool_error(&call.name, tool_set.tool_set_id(), &error.to_string());
            }
            return ToolResponse::from_error(call, &error);
        }

        match tokio::time::timeout(agent.tool_timeout(), tool_set.execute(call, sink)).await {
            Ok(response) => response,
            Err(_) => {
                let error = ToolError::Timeout {
                    tool_name: call.name.clone(),
                    timeout_ms: agent.tool_timeout_ms,
                };
                warn!(tool = %call.name, timeout_ms = agent.tool_timeout_ms, "Tool timed out");
                if let Some(sink) = sink {
                    sink.on_tool_error(&call.name, tool_set.tool_set_id(), &error.to_string());
                }
                ToolResponse::from_error(call, &error)
            }
        }
    }

    fn finish(
        &self,
        agent: &AgentConfiguration,
        mut response: AgentResponse,
        usages: &[Option<Usage>],
        started: Instant,
    ) -> AgentResponse {
        response.usage = Usage::merge(usages)
            .map(|u| u.priced(agent.input_token_cost, agent.output_token_cost));
        let duration_ms = started.elapsed().as_millis() as u64;

        info!(
            agent_id = %agent.agent_id,
            success = !response.is_error(),
            tool_calls = response.tool_calls.len(),
            duration_ms,
            "Agent finished"
        );

        self.event_bus.publish(DomainEvent::AgentCompleted {
            agent_id: agent.agent_id.clone(),
            success: !response.is_error(),
            tool_calls: response.tool_calls.len(),
            tokens_used: response.usage.map(|u| u.total_tokens).unwrap_or(0),
            duration_ms,
            timestamp: Utc::now(),
        });
        response
    }
}
