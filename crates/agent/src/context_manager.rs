//! ContextManager: sole owner of every live conversation.
//!
//! Each conversation id maps to its context behind a mutex, so message
//! appends are linearized. Whole turns are linearized by
//! [`ContextManager::begin_turn`], whose locks live in a separate table that
//! outlives deleting a conversation. Different ids never contend.

use parley_core::error::{Error, Result};
use parley_core::message::{ConversationContext, ConversationId, Message};
use parley_core::tool::ToolCall;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

type Slot = Arc<Mutex<ConversationContext>>;

/// Held for the duration of one turn on one conversation.
pub struct TurnGuard {
    conversation_id: ConversationId,
    _guard: OwnedMutexGuard<()>,
}

impl TurnGuard {
    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }
}

pub struct ContextManager {
    conversations: RwLock<HashMap<ConversationId, Slot>>,
    /// One entry per id ever used; entries are never removed.
    turn_locks: RwLock<HashMap<ConversationId, Arc<Mutex<()>>>>,
}

impl ContextManager {
    pub fn new() -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
            turn_locks: RwLock::new(HashMap::new()),
        }
    }

    /// The context slot for `id`, created empty on first access.
    async fn slot(&self, id: &ConversationId) -> Slot {
        if let Some(slot) = self.conversations.read().await.get(id) {
            return slot.clone();
        }
        let mut conversations = self.conversations.write().await;
        conversations
            .entry(id.clone())
            .or_insert_with(|| {
                debug!(conversation_id = %id, "Conversation created");
                Arc::new(Mutex::new(ConversationContext::new(id.clone())))
            })
            .clone()
    }

    async fn turn_lock(&self, id: &ConversationId) -> Arc<Mutex<()>> {
        if let Some(lock) = self.turn_locks.read().await.get(id) {
            return lock.clone();
        }
        self.turn_locks
            .write()
            .await
            .entry(id.clone())
            .or_default()
            .clone()
    }

    /// Serialize whole turns on one conversation. Waits while another turn
    /// on the same id is in flight.
    pub async fn begin_turn(&self, id: &ConversationId) -> TurnGuard {
        let guard = self.turn_lock(id).await.lock_owned().await;
        TurnGuard {
            conversation_id: id.clone(),
            _guard: guard,
        }
    }

    /// Snapshot of the conversation; creates it empty if unknown.
    pub async fn get(&self, id: &ConversationId) -> ConversationContext {
        let slot = self.slot(id).await;
        let context = slot.lock().await;
        context.clone()
    }

    /// Whether the id is live. Never creates state.
    pub async fn exists(&self, id: &ConversationId) -> bool {
        self.conversations.read().await.contains_key(id)
    }

    /// Empty the conversation, keeping the id live.
    pub async fn clear(&self, id: &ConversationId) {
        let slot = self.slot(id).await;
        slot.lock().await.clear();
        debug!(conversation_id = %id, "Conversation cleared");
    }

    /// Forget the conversation entirely. Waits for a turn in flight on the
    /// same id, so must not be called while holding its [`TurnGuard`].
    pub async fn delete(&self, id: &ConversationId) -> bool {
        let _turn = self.begin_turn(id).await;
        let removed = self.conversations.write().await.remove(id).is_some();
        if removed {
            debug!(conversation_id = %id, "Conversation deleted");
        }
        removed
    }

    /// Install a previously saved context if the id is not live yet or
    /// still has no messages. Returns whether it was installed.
    pub async fn restore(&self, context: ConversationContext) -> bool {
        let id = context.conversation_id().clone();
        let mut conversations = self.conversations.write().await;
        if let Some(slot) = conversations.get(&id) {
            let mut live = slot.lock().await;
            if !live.is_empty() {
                return false;
            }
            debug!(conversation_id = %id, messages = context.len(), "Conversation restored");
            *live = context;
            return true;
        }
        debug!(conversation_id = %id, messages = context.len(), "Conversation restored");
        conversations.insert(id, Arc::new(Mutex::new(context)));
        true
    }

    /// Append a message. It must belong to this conversation.
    pub async fn add_message(&self, id: &ConversationId, message: Message) -> Result<()> {
        if &message.conversation_id != id {
            return Err(Error::InvalidInput(format!(
                "message for conversation '{}' appended to '{}'",
                message.conversation_id, id
            )));
        }
        let slot = self.slot(id).await;
        let mut context = slot.lock().await;
        context.push(message)
    }

    pub async fn add_user_message(&self, id: &ConversationId, content: &str) -> Result<()> {
        self.add_message(id, Message::user(id, content)).await
    }

    pub async fn add_assistant_message(&self, id: &ConversationId, content: &str) -> Result<()> {
        self.add_message(id, Message::assistant(id, content)).await
    }

    pub async fn add_assistant_tool_calls(
        &self,
        id: &ConversationId,
        content: &str,
        tool_calls: Vec<ToolCall>,
    ) -> Result<()> {
        self.add_message(id, Message::assistant_tool_calls(id, content, tool_calls))
            .await
    }

    pub async fn add_system_message(&self, id: &ConversationId, content: &str) -> Result<()> {
        self.add_message(id, Message::system(id, content)).await
    }

    /// Append a tool result. The call id must have been requested earlier
    /// in this conversation.
    pub async fn add_tool_message(
        &self,
        id: &ConversationId,
        tool_call_id: &str,
        content: &str,
    ) -> Result<()> {
        self.add_message(id, Message::tool_result(id, tool_call_id, content))
            .await
    }

    /// Copy of all messages in append order.
    pub async fn get_all_messages(&self, id: &ConversationId) -> Vec<Message> {
        let slot = self.slot(id).await;
        let context = slot.lock().await;
        context.to_vec()
    }

    pub async fn message_count(&self, id: &ConversationId) -> usize {
        match self.conversations.read().await.get(id) {
            Some(slot) => slot.lock().await.len(),
            None => 0,
        }
    }

    /// Live conversation ids, sorted.
    pub async fn conversation_ids(&self) -> Vec<ConversationId> {
        let mut ids: Vec<ConversationId> =
            self.conversations.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl Default for ContextManager {
    fn default() -> Self {
        Self::new()
    }
}
