//! In-memory store: useful for testing and single-process sessions.
//!
//! Conversations are kept as serialized JSON so a loaded context never
//! shares state with the one that was saved.

use async_trait::async_trait;
use parley_core::error::StoreError;
use parley_core::message::{ConversationContext, ConversationId};
use parley_core::store::ConversationStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

pub struct InMemoryStore {
    entries: Arc<RwLock<HashMap<ConversationId, String>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn save(&self, context: &ConversationContext) -> Result<(), StoreError> {
        let json =
            serde_json::to_string(context).map_err(|e| StoreError::Serialization(e.to_string()))?;
        debug!(
            conversation_id = %context.conversation_id(),
            messages = context.len(),
            "Conversation saved"
        );
        self.entries
            .write()
            .await
            .insert(context.conversation_id().clone(), json);
        Ok(())
    }

    async fn load(&self, id: &ConversationId) -> Result<Option<ConversationContext>, StoreError> {
        let entries = self.entries.read().await;
        entries
            .get(id)
            .map(|json| {
                serde_json::from_str(json).map_err(|e| StoreError::Serialization(e.to_string()))
            })
            .transpose()
    }

    async fn delete(&self, id: &ConversationId) -> Result<bool, StoreError> {
        Ok(self.entries.write().await.remove(id).is_some())
    }

    async fn exists(&self, id: &ConversationId) -> Result<bool, StoreError> {
        Ok(self.entries.read().await.contains_key(id))
    }

    async fn list_ids(&self) -> Result<Vec<ConversationId>, StoreError> {
        let mut ids: Vec<ConversationId> = self.entries.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::message::Message;

    fn context(id: &str, texts: &[&str]) -> ConversationContext {
        let conv = ConversationId::from(id);
        let mut ctx = ConversationContext::new(conv.clone());
        for text in texts {
            ctx.push(Message::user(&conv, *text)).unwrap();
        }
        ctx
    }

    #[tokio::test]
    async fn save_and_load() {
        let store = InMemoryStore::new();
        store.save(&context("a", &["hello", "again"])).await.unwrap();

        let loaded = store.load(&ConversationId::from("a")).await.unwrap().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.messages()[1].content, "again");
        assert!(store.load(&ConversationId::from("b")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_overwrites() {
        let store = InMemoryStore::new();
        store.save(&context("a", &["one"])).await.unwrap();
        store.save(&context("a", &["one", "two", "three"])).await.unwrap();

        assert_eq!(store.len().await, 1);
        let loaded = store.load(&ConversationId::from("a")).await.unwrap().unwrap();
        assert_eq!(loaded.len(), 3);
    }

    #[tokio::test]
    async fn delete_and_list() {
        let store = InMemoryStore::new();
        store.save(&context("b", &["x"])).await.unwrap();
        store.save(&context("a", &["y"])).await.unwrap();

        assert_eq!(
            store.list_ids().await.unwrap(),
            vec![ConversationId::from("a"), ConversationId::from("b")]
        );
        assert!(store.delete(&ConversationId::from("a")).await.unwrap());
        assert!(!store.delete(&ConversationId::from("a")).await.unwrap());
        assert!(!store.exists(&ConversationId::from("a")).await.unwrap());
        assert!(store.exists(&ConversationId::from("b")).await.unwrap());
    }
}
