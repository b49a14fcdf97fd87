//! No-op store: disables conversation persistence entirely.

use async_trait::async_trait;
use parley_core::error::StoreError;
use parley_core::message::{ConversationContext, ConversationId};
use parley_core::store::ConversationStore;

/// A store that keeps nothing.
pub struct NoopStore;

#[async_trait]
impl ConversationStore for NoopStore {
    fn name(&self) -> &str {
        "none"
    }

    async fn save(&self, _context: &ConversationContext) -> Result<(), StoreError> {
        Ok(())
    }

    async fn load(&self, _id: &ConversationId) -> Result<Option<ConversationContext>, StoreError> {
        Ok(None)
    }

    async fn delete(&self, _id: &ConversationId) -> Result<bool, StoreError> {
        Ok(false)
    }

    async fn list_ids(&self) -> Result<Vec<ConversationId>, StoreError> {
        Ok(Vec::new())
    }
}
