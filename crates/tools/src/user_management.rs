//! User management tool set: edits an in-process user profile table.
//!
//! These tools mutate state, so they are annotated as non-read-only and
//! callers must not replay them blindly.

use async_trait::async_trait;
use parley_core::error::ToolError;
use parley_core::tool::{
    ToolAnnotations, ToolCall, ToolDebugSink, ToolDefinition, ToolResponse, ToolSet,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{finish, require_args};

pub const TOOL_SET_ID: &str = "user-management-toolset";

const UPDATE_TAG: &str = "update_user_tag";
const UPDATE_NAME: &str = "update_user_name";
const ADD_COMMENT: &str = "add_user_comment";

/// Everything the tools have recorded about one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserProfile {
    pub name: Option<String>,
    pub tag: Option<String>,
    /// travel id → comment
    pub comments: BTreeMap<String, String>,
}

pub struct UserToolSet {
    users: RwLock<HashMap<String, UserProfile>>,
    latency: Duration,
}

impl UserToolSet {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            latency: Duration::ZERO,
        }
    }

    /// Simulated backend latency applied to every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Snapshot of a user's profile, if any tool has touched it.
    pub async fn user_profile(&self, user_id: &str) -> Option<UserProfile> {
        self.users.read().await.get(user_id).cloned()
    }

    async fn run(&self, call: &ToolCall) -> Result<String, ToolError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let args = &call.arguments;
        match call.name.as_str() {
            UPDATE_TAG => {
                let user_id = args.require_str("id")?;
                let tag = args.require_str("tag")?;
                self.update(user_id, |p| p.tag = Some(tag.to_string())).await;
                Ok(format!("User tag updated successfully for user {user_id}"))
            }
            UPDATE_NAME => {
                let user_id = args.require_str("id")?;
                let name = args.require_str("name")?;
                self.update(user_id, |p| p.name = Some(name.to_string())).await;
                Ok(format!("User name updated successfully for user {user_id}"))
            }
            ADD_COMMENT => {
                let user_id = args.require_str("id")?;
                let travel_id = args.require_str("travelId")?;
                let comment = args.require_str("comment")?;
                self.update(user_id, |p| {
                    p.comments.insert(travel_id.to_string(), comment.to_string());
                })
                .await;
                Ok(format!(
                    "Comment added successfully for user {user_id} on travel {travel_id}"
                ))
            }
            other => Err(ToolError::NotFound(other.to_string())),
        }
    }

    async fn update(&self, user_id: &str, apply: impl FnOnce(&mut UserProfile)) {
        let mut users = self.users.write().await;
        apply(users.entry(user_id.to_string()).or_default());
        debug!(user_id = %user_id, "User profile updated");
    }
}

impl Default for UserToolSet {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolSet for UserToolSet {
    fn tool_set_id(&self) -> &str {
        TOOL_SET_ID
    }

    fn list_tools(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: UPDATE_TAG.into(),
                description: "Set the tag of a user.".into(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "id": { "type": "string", "description": "User ID" },
                        "tag": { "type": "string", "description": "New user tag" }
                    },
                    "required": ["id", "tag"]
                }),
                annotations: mutating("Update User Tag"),
            },
            ToolDefinition {
                name: UPDATE_NAME.into(),
                description: "Change the display name of a user.".into(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "id": { "type": "string", "description": "User ID" },
                        "name": { "type": "string", "description": "New user name" }
                    },
                    "required": ["id", "name"]
                }),
                annotations: mutating("Update User Name"),
            },
            ToolDefinition {
                name: ADD_COMMENT.into(),
                description: "Attach a user's comment to a travel package.".into(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "id": { "type": "string", "description": "User ID" },
                        "travelId": { "type": "string", "description": "Travel identifier" },
                        "comment": { "type": "string", "description": "Comment text" }
                    },
                    "required": ["id", "travelId", "comment"]
                }),
                annotations: mutating("Add User Comment"),
            },
        ]
    }

    fn supports(&self, tool_name: &str) -> bool {
        matches!(tool_name, UPDATE_TAG | UPDATE_NAME | ADD_COMMENT)
    }

    async fn validate(&self, call: &ToolCall) -> Result<(), ToolError> {
        match call.name.as_str() {
            UPDATE_TAG => require_args(call, &["id", "tag"]),
            UPDATE_NAME => require_args(call, &["id", "name"]),
            ADD_COMMENT => require_args(call, &["id", "travelId", "comment"]),
            other => Err(ToolError::NotFound(other.to_string())),
        }
    }

    async fn execute(&self, call: &ToolCall, sink: Option<&dyn ToolDebugSink>) -> ToolResponse {
        let result = self.run(call).await;
        finish(TOOL_SET_ID, call, result, sink)
    }
}

fn mutating(title: &str) -> ToolAnnotations {
    ToolAnnotations {
        title: Some(title.into()),
        read_only_hint: false,
        destructive_hint: false,
        idempotent_hint: true,
        open_world_hint: false,
    }
}
