//! Wiring for the commands that run turns.

use parley_agent::{AgentExecutor, ChatOrchestrator, ContextManager, LlmOrchestrator};
use parley_config::AppConfig;
use parley_core::agent::AgentConfiguration;
use parley_core::event::EventBus;
use parley_store::InMemoryStore;
use parley_tools::TracingDebugSink;
use std::sync::Arc;
use tracing::debug;

/// Agents used when the config file lists none.
pub fn default_agents() -> Vec<AgentConfiguration> {
    let mut travel = AgentConfiguration::new("travel")
        .with_system_prompt(
            "You are a travel assistant. Search packages by country or preferences and explain the options.",
        )
        .with_tools(&["travel-search-toolset"])
        .with_priority(0);
    travel.agent_name = "Travel Assistant".into();
    travel.description = "Finds and describes travel packages".into();

    let mut user = AgentConfiguration::new("user")
        .with_system_prompt("You manage user profiles: names, tags and travel comments.")
        .with_tools(&["user-management-toolset"])
        .with_priority(1);
    user.agent_name = "User Manager".into();
    user.description = "Updates user profiles".into();

    vec![travel, user]
}

/// Configured agents (or the defaults) with model and provider filled in,
/// in execution order.
pub fn effective_agents(config: &AppConfig) -> Vec<AgentConfiguration> {
    let mut resolved = if config.agents.is_empty() {
        let mut with_defaults = config.clone();
        with_defaults.agents = default_agents();
        with_defaults.resolved_agents()
    } else {
        config.resolved_agents()
    };
    resolved.sort_by_key(|a| a.priority);
    resolved
}

/// Build a chat orchestrator from configuration.
pub fn build_chat(config: &AppConfig) -> anyhow::Result<ChatOrchestrator> {
    let event_bus = Arc::new(EventBus::default());
    let client = Arc::new(parley_providers::build_from_config(config));
    let tools = Arc::new(parley_tools::default_registry()?);

    let executor = AgentExecutor::new(client, tools, event_bus.clone())
        .with_debug_sink(Arc::new(TracingDebugSink));
    let orchestrator = LlmOrchestrator::new(Arc::new(executor))
        .with_retry_backoff(config.orchestrator.retry_backoff());
    for agent in effective_agents(config) {
        orchestrator.register_agent(agent)?;
    }
    debug!(agents = ?orchestrator.list_active_agents(), "Orchestrator ready");

    let chat = ChatOrchestrator::new(
        Arc::new(ContextManager::new()),
        Arc::new(orchestrator),
        event_bus,
    );
    Ok(if config.persistence.enabled {
        chat.with_store(Arc::new(InMemoryStore::new()))
    } else {
        chat
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::message::ConversationId;

    #[test]
    fn defaults_fill_an_empty_config() {
        let agents = effective_agents(&AppConfig::default());
        let ids: Vec<&str> = agents.iter().map(|a| a.agent_id.as_str()).collect();
        assert_eq!(ids, vec!["travel", "user"]);
        assert!(agents.iter().all(|a| a.model_name == "gpt-4o-mini"));
        assert!(agents.iter().all(|a| a.provider == "simulated"));
    }

    #[test]
    fn configured_agents_replace_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [[agents]]
            agent_id = "late"
            priority = 9

            [[agents]]
            agent_id = "early"
            priority = -1
            "#,
        )
        .unwrap();
        let ids: Vec<String> = effective_agents(&config)
            .into_iter()
            .map(|a| a.agent_id)
            .collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[tokio::test]
    async fn default_runtime_answers_a_travel_question() {
        let chat = build_chat(&AppConfig::default()).unwrap();
        let id = ConversationId::from("cli-test");

        let resp = chat
            .process_user_message(&id, "I want to travel to Spain")
            .await;
        assert!(resp.success);
        assert!(!resp.content.is_empty());
        assert!(resp
            .tool_calls
            .iter()
            .any(|c| c.name == "search_by_country"));
    }
}
