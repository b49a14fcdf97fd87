//! ChatOrchestrator: the externally callable entry point for a turn.
//!
//! A turn appends the user message, runs the LlmOrchestrator on a snapshot,
//! appends the resulting tool and assistant messages and saves the
//! conversation. Callers always get an `LlmResponse` back, never an error.

use chrono::Utc;
use parley_core::agent::LlmResponse;
use parley_core::error::{ErrorKind, Result};
use parley_core::event::{DomainEvent, EventBus};
use parley_core::message::{ConversationContext, ConversationId};
use parley_core::store::ConversationStore;
use parley_core::tool::ToolCall;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::context_manager::ContextManager;
use crate::llm_orchestrator::{APOLOGY, LlmOrchestrator};

const PREVIEW_CHARS: usize = 50;

pub struct ChatOrchestrator {
    contexts: Arc<ContextManager>,
    orchestrator: Arc<LlmOrchestrator>,
    event_bus: Arc<EventBus>,
    store: Option<Arc<dyn ConversationStore>>,
}

impl ChatOrchestrator {
    pub fn new(
        contexts: Arc<ContextManager>,
        orchestrator: Arc<LlmOrchestrator>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            contexts,
            orchestrator,
            event_bus,
            store: None,
        }
    }

    /// Save every conversation to `store` after each turn and restore
    /// unknown conversations from it.
    pub fn with_store(mut self, store: Arc<dyn ConversationStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn context_manager(&self) -> &ContextManager {
        &self.contexts
    }

    pub fn orchestrator(&self) -> &LlmOrchestrator {
        &self.orchestrator
    }

    /// Process one user message and return the merged response.
    pub async fn process_user_message(
        &self,
        conversation_id: &ConversationId,
        text: &str,
    ) -> LlmResponse {
        if text.trim().is_empty() {
            warn!(conversation_id = %conversation_id, "Empty user message rejected");
            return LlmResponse::failure(
                ErrorKind::InvalidInput,
                "Message must not be empty",
                APOLOGY,
            );
        }

        // A live conversation is authoritative, even when it was just cleared.
        let was_live = self.contexts.exists(conversation_id).await;
        let _turn = self.contexts.begin_turn(conversation_id).await;
        if !was_live {
            self.restore_from_store(conversation_id).await;
        }

        match self.run_turn(conversation_id, text).await {
            Ok(response) => response,
            Err(e) => {
                error!(conversation_id = %conversation_id, error = %e, "Turn failed");
                LlmResponse::failure(e.kind(), e.to_string(), APOLOGY)
            }
        }
    }

    async fn run_turn(&self, id: &ConversationId, text: &str) -> Result<LlmResponse> {
        self.contexts.add_user_message(id, text).await?;
        self.event_bus.publish(DomainEvent::MessageReceived {
            conversation_id: id.to_string(),
            content_preview: text.chars().take(PREVIEW_CHARS).collect(),
            timestamp: Utc::now(),
        });

        let snapshot = self.contexts.get(id).await;
        let response = match self.orchestrator.process(&snapshot).await {
            Ok(response) => response,
            Err(e) => {
                warn!(conversation_id = %id, error = %e, "Orchestrator rejected the turn");
                LlmResponse::failure(e.kind(), e.to_string(), APOLOGY)
            }
        };

        let appended = self.append_results(id, &response).await?;
        self.persist(id).await;

        info!(
            conversation_id = %id,
            success = response.success,
            messages_appended = appended + 1,
            "Turn completed"
        );
        self.event_bus.publish(DomainEvent::TurnCompleted {
            conversation_id: id.to_string(),
            success: response.success,
            messages_appended: appended + 1,
            timestamp: Utc::now(),
        });
        Ok(response)
    }

    /// Append tool traffic and the final answer; returns how many messages
    /// were added.
    async fn append_results(&self, id: &ConversationId, response: &LlmResponse) -> Result<usize> {
        let mut appended = 0;

        if !response.tool_responses.is_empty() {
            let answered: Vec<ToolCall> = response
                .tool_calls
                .iter()
                .filter(|call| {
                    response
                        .tool_responses
                        .iter()
                        .any(|r| r.tool_call_id == call.id)
                })
                .cloned()
                .collect();
            self.contexts
                .add_assistant_tool_calls(id, "", answered)
                .await?;
            appended += 1;

            for tool_response in &response.tool_responses {
                self.contexts
                    .add_tool_message(id, &tool_response.tool_call_id, &tool_response.content)
                    .await?;
                appended += 1;
            }
        }

        if response.success && !response.content.trim().is_empty() {
            self.contexts
                .add_assistant_message(id, &response.content)
                .await?;
            appended += 1;
        }

        Ok(appended)
    }

    async fn restore_from_store(&self, id: &ConversationId) {
        let Some(store) = &self.store else {
            return;
        };
        if self.contexts.message_count(id).await > 0 {
            return;
        }
        match store.load(id).await {
            Ok(Some(saved)) => {
                if self.contexts.restore(saved).await {
                    info!(conversation_id = %id, store = %store.name(), "Conversation loaded from store");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(conversation_id = %id, error = %e, "Failed to load conversation"),
        }
    }

    async fn persist(&self, id: &ConversationId) {
        let Some(store) = &self.store else {
            return;
        };
        let snapshot = self.contexts.get(id).await;
        match store.save(&snapshot).await {
            Ok(()) => debug!(conversation_id = %id, store = %store.name(), "Conversation saved"),
            Err(e) => {
                warn!(conversation_id = %id, error = %e, "Failed to save conversation");
                self.event_bus.publish(DomainEvent::PersistenceFailed {
                    conversation_id: id.to_string(),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
            }
        }
    }

    /// Snapshot of the conversation as it stands now.
    pub async fn get_conversation_context(&self, conversation_id: &ConversationId) -> ConversationContext {
        self.contexts.get(conversation_id).await
    }

    /// Empty the conversation and drop its saved copy.
    pub async fn clear_conversation(&self, conversation_id: &ConversationId) {
        let _turn = self.contexts.begin_turn(conversation_id).await;
        self.contexts.clear(conversation_id).await;

        if let Some(store) = &self.store {
            if let Err(e) = store.delete(conversation_id).await {
                warn!(conversation_id = %conversation_id, error = %e, "Failed to delete saved conversation");
                // Overwrite the saved copy so a restart cannot bring the history back.
                let cleared = self.contexts.get(conversation_id).await;
                if let Err(e) = store.save(&cleared).await {
                    warn!(conversation_id = %conversation_id, error = %e, "Failed to save cleared conversation");
                    self.event_bus.publish(DomainEvent::PersistenceFailed {
                        conversation_id: conversation_id.to_string(),
                        error_message: e.to_string(),
                        timestamp: Utc::now(),
                    });
                }
            }
        }

        self.event_bus.publish(DomainEvent::ConversationCleared {
            conversation_id: conversation_id.to_string(),
            timestamp: Utc::now(),
        });
    }

    /// Load every saved conversation that is not live yet. Returns how many
    /// were restored.
    pub async fn restore_all(&self) -> usize {
        let Some(store) = &self.store else {
            return 0;
        };
        let ids = match store.list_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(store = %store.name(), error = %e, "Failed to list saved conversations");
                return 0;
            }
        };

        let mut restored = 0;
        for id in ids {
            match store.load(&id).await {
                Ok(Some(saved)) => {
                    if self.contexts.restore(saved).await {
                        restored += 1;
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(conversation_id = %id, error = %e, "Failed to load conversation"),
            }
        }
        info!(restored, store = %store.name(), "Saved conversations restored");
        restored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::AgentExecutor;
    use crate::test_helpers::*;
    use async_trait::async_trait;
    use parley_core::agent::AgentConfiguration;
    use parley_core::error::{ProviderError, StoreError};
    use parley_core::message::{Message, MessageType, Role};
    use parley_core::tool::{ToolArguments, ToolSetRegistry};
    use parley_store::InMemoryStore;
    use parley_tools::TravelToolSet;
    use std::time::Duration;

    fn chat_with(client: Arc<ScriptedClient>, agents: Vec<AgentConfiguration>) -> ChatOrchestrator {
        let mut registry = ToolSetRegistry::new();
        registry.register(Arc::new(TravelToolSet::new())).unwrap();
        let bus = Arc::new(EventBus::default());
        let executor = AgentExecutor::new(client, Arc::new(registry), bus.clone());
        let orchestrator =
            LlmOrchestrator::new(Arc::new(executor)).with_retry_backoff(Duration::from_millis(1));
        for agent in agents {
            orchestrator.register_agent(agent).unwrap();
        }
        ChatOrchestrator::new(Arc::new(ContextManager::new()), Arc::new(orchestrator), bus)
    }

    fn travel_agent() -> AgentConfiguration {
        AgentConfiguration::new("travel")
            .with_model("mock-model")
            .with_tools(&["search_by_country"])
    }

    fn conv(id: &str) -> ConversationId {
        ConversationId::from(id)
    }

    /// Store whose writes always fail.
    struct BrokenStore;

    #[async_trait]
    impl ConversationStore for BrokenStore {
        fn name(&self) -> &str {
            "broken"
        }

        async fn save(&self, _context: &ConversationContext) -> std::result::Result<(), StoreError> {
            Err(StoreError::Storage("disk full".into()))
        }

        async fn load(
            &self,
            _id: &ConversationId,
        ) -> std::result::Result<Option<ConversationContext>, StoreError> {
            Ok(None)
        }

        async fn delete(&self, _id: &ConversationId) -> std::result::Result<bool, StoreError> {
            Err(StoreError::Storage("disk full".into()))
        }

        async fn list_ids(&self) -> std::result::Result<Vec<ConversationId>, StoreError> {
            Ok(Vec::new())
        }
    }

    /// Keeps saved conversations but refuses to delete them.
    struct UndeletableStore {
        inner: InMemoryStore,
    }

    #[async_trait]
    impl ConversationStore for UndeletableStore {
        fn name(&self) -> &str {
            "undeletable"
        }

        async fn save(&self, context: &ConversationContext) -> std::result::Result<(), StoreError> {
            self.inner.save(context).await
        }

        async fn load(
            &self,
            id: &ConversationId,
        ) -> std::result::Result<Option<ConversationContext>, StoreError> {
            self.inner.load(id).await
        }

        async fn delete(&self, _id: &ConversationId) -> std::result::Result<bool, StoreError> {
            Err(StoreError::Storage("read-only volume".into()))
        }

        async fn list_ids(&self) -> std::result::Result<Vec<ConversationId>, StoreError> {
            self.inner.list_ids().await
        }
    }

    #[tokio::test]
    async fn hello_round_trip() {
        let chat = chat_with(
            Arc::new(ScriptedClient::single_text("Hi there!")),
            vec![travel_agent()],
        );

        let resp = chat.process_user_message(&conv("c1"), "hello").await;
        assert!(resp.success);
        assert_eq!(resp.content, "Hi there!");

        let ctx = chat.get_conversation_context(&conv("c1")).await;
        let messages = ctx.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "hello");
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, "Hi there!");
    }

    #[tokio::test]
    async fn tool_turn_appends_in_order() {
        let call = make_tool_call(
            "search_by_country",
            ToolArguments::new().with("country", "Spain"),
        );
        let chat = chat_with(
            Arc::new(ScriptedClient::tool_then_answer(vec![call.clone()], "Spain it is.")),
            vec![travel_agent()],
        );

        chat.process_user_message(&conv("c1"), "trip to Spain").await;

        let ctx = chat.get_conversation_context(&conv("c1")).await;
        let shape: Vec<(Role, MessageType)> = ctx
            .messages()
            .iter()
            .map(|m| (m.role, m.message_type))
            .collect();
        assert_eq!(
            shape,
            vec![
                (Role::User, MessageType::Text),
                (Role::Assistant, MessageType::ToolCall),
                (Role::Tool, MessageType::ToolResponse),
                (Role::Assistant, MessageType::Text),
            ]
        );
        assert_eq!(ctx.messages()[1].tool_calls[0].id, call.id);
        assert_eq!(ctx.messages()[2].tool_call_id.as_deref(), Some(call.id.as_str()));
    }

    #[tokio::test]
    async fn empty_message_changes_nothing() {
        let client = Arc::new(ScriptedClient::new(vec![]));
        let chat = chat_with(client.clone(), vec![travel_agent()]);

        let resp = chat.process_user_message(&conv("c1"), "   \n").await;
        assert!(!resp.success);
        assert_eq!(resp.error_kind, Some(ErrorKind::InvalidInput));
        assert_eq!(resp.content, APOLOGY);
        assert_eq!(chat.context_manager().message_count(&conv("c1")).await, 0);
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn failed_turn_keeps_only_the_user_message() {
        let chat = chat_with(
            Arc::new(ScriptedClient::new(vec![Err(ProviderError::Network("down".into()))])),
            vec![AgentConfiguration {
                max_retries: 0,
                ..travel_agent()
            }],
        );

        let resp = chat.process_user_message(&conv("c1"), "hello").await;
        assert!(!resp.success);
        assert_eq!(resp.content, APOLOGY);
        let messages = chat.context_manager().get_all_messages(&conv("c1")).await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
    }

    #[tokio::test]
    async fn persistence_failure_does_not_fail_the_turn() {
        let bus_chat = chat_with(
            Arc::new(ScriptedClient::single_text("saved?")),
            vec![travel_agent()],
        )
        .with_store(Arc::new(BrokenStore));
        let mut events = bus_chat.event_bus.subscribe();

        let resp = bus_chat.process_user_message(&conv("c1"), "hello").await;
        assert!(resp.success);
        assert_eq!(resp.content, "saved?");

        let mut saw_failure = false;
        while let Ok(event) = events.try_recv() {
            if let DomainEvent::PersistenceFailed { error_message, .. } = event.as_ref() {
                assert!(error_message.contains("disk full"));
                saw_failure = true;
            }
        }
        assert!(saw_failure);
    }

    #[tokio::test]
    async fn conversations_survive_a_restart() {
        let store: Arc<dyn ConversationStore> = Arc::new(InMemoryStore::new());

        let first = chat_with(
            Arc::new(ScriptedClient::single_text("first answer")),
            vec![travel_agent()],
        )
        .with_store(store.clone());
        first.process_user_message(&conv("c1"), "hello").await;

        let client = Arc::new(ScriptedClient::single_text("second answer"));
        let second = chat_with(client.clone(), vec![travel_agent()]).with_store(store);
        second.process_user_message(&conv("c1"), "again").await;

        let contents: Vec<String> = second
            .get_conversation_context(&conv("c1"))
            .await
            .to_vec()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["hello", "first answer", "again", "second answer"]);
        assert_eq!(client.requests()[0].messages.len(), 3);
    }

    #[tokio::test]
    async fn restore_all_loads_every_saved_conversation() {
        let store = Arc::new(InMemoryStore::new());
        for id in ["a", "b"] {
            let mut ctx = ConversationContext::new(conv(id));
            ctx.push(Message::user(&conv(id), "saved")).unwrap();
            store.save(&ctx).await.unwrap();
        }

        let chat = chat_with(Arc::new(ScriptedClient::new(vec![])), vec![]).with_store(store);
        assert_eq!(chat.restore_all().await, 2);
        assert_eq!(
            chat.context_manager().conversation_ids().await,
            vec![conv("a"), conv("b")]
        );
    }

    #[tokio::test]
    async fn clear_empties_context_and_store() {
        let store = Arc::new(InMemoryStore::new());
        let chat = chat_with(
            Arc::new(ScriptedClient::single_text("hi")),
            vec![travel_agent()],
        )
        .with_store(store.clone());

        chat.process_user_message(&conv("c1"), "hello").await;
        assert!(store.exists(&conv("c1")).await.unwrap());

        chat.clear_conversation(&conv("c1")).await;
        assert!(chat.get_conversation_context(&conv("c1")).await.is_empty());
        assert!(!store.exists(&conv("c1")).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn same_conversation_turns_do_not_interleave() {
        let client = Arc::new(
            ScriptedClient::new(vec![
                Ok(text_completion("answer one")),
                Ok(text_completion("answer two")),
            ])
            .with_delay(Duration::from_millis(100)),
        );
        let chat = chat_with(client, vec![travel_agent()]);
        let id = conv("shared");

        let (one, two) = tokio::join!(
            chat.process_user_message(&id, "one"),
            chat.process_user_message(&id, "two"),
        );
        assert!(one.success && two.success);

        let contents: Vec<String> = chat
            .context_manager()
            .get_all_messages(&id)
            .await
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["one", "answer one", "two", "answer two"]);
    }

    #[tokio::test]
    async fn cleared_history_stays_gone_when_delete_fails() {
        let store = Arc::new(UndeletableStore {
            inner: InMemoryStore::new(),
        });
        let client = Arc::new(ScriptedClient::new(vec![
            Ok(text_completion("reply one")),
            Ok(text_completion("reply two")),
        ]));
        let chat = chat_with(client.clone(), vec![travel_agent()]).with_store(store.clone());
        let id = conv("c1");

        chat.process_user_message(&id, "secret one").await;
        chat.clear_conversation(&id).await;

        // The saved copy was overwritten with the empty conversation.
        let saved = store.load(&id).await.unwrap().unwrap();
        assert!(saved.is_empty());

        chat.process_user_message(&id, "fresh start").await;
        let contents: Vec<String> = chat
            .get_conversation_context(&id)
            .await
            .to_vec()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["fresh start", "reply two"]);
        assert_eq!(client.requests()[1].messages.len(), 1);
    }

    #[tokio::test]
    async fn agents_can_be_toggled_between_turns() {
        let client = Arc::new(ScriptedClient::new(vec![
            Ok(text_completion("travel only")),
            Ok(text_completion("travel again")),
            Ok(text_completion("helper is back")),
        ]));
        let helper = AgentConfiguration::new("helper")
            .with_model("mock-model")
            .with_priority(1);
        let chat = chat_with(client.clone(), vec![travel_agent(), helper]);

        assert!(chat.orchestrator().disable_agent("helper"));
        let resp = chat.process_user_message(&conv("c1"), "one").await;
        assert_eq!(resp.content, "travel only");
        assert_eq!(client.call_count(), 1);

        assert!(chat.orchestrator().enable_agent("helper"));
        let resp = chat.process_user_message(&conv("c1"), "two").await;
        assert_eq!(resp.content, "travel again\n\nhelper is back");
        assert_eq!(client.call_count(), 3);
        assert_eq!(chat.orchestrator().list_active_agents(), vec!["travel", "helper"]);
    }
}
