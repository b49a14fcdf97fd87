//! ConversationStore trait: the persistence collaborator.
//!
//! The chat layer saves a conversation after every turn and loads it back
//! when an id is first seen. Stores never decide turn outcomes; every
//! failure is reported and then ignored by the caller.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::message::{ConversationContext, ConversationId};

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Backend name (e.g., "memory", "none").
    fn name(&self) -> &str;

    /// Save (overwrite) the full context.
    async fn save(&self, context: &ConversationContext) -> std::result::Result<(), StoreError>;

    async fn load(
        &self,
        id: &ConversationId,
    ) -> std::result::Result<Option<ConversationContext>, StoreError>;

    /// Returns whether anything was deleted.
    async fn delete(&self, id: &ConversationId) -> std::result::Result<bool, StoreError>;

    async fn exists(&self, id: &ConversationId) -> std::result::Result<bool, StoreError> {
        Ok(self.load(id).await?.is_some())
    }

    async fn list_ids(&self) -> std::result::Result<Vec<ConversationId>, StoreError>;
}
