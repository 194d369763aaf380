//! Core data models for the transaction-chat agent

use serde::{Deserialize, Serialize};
use std::fmt;

//
// ================= Chat Messages =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A request from the model to invoke a named tool.
///
/// The identifier is optional at the wire level; the tool loop enforces
/// its presence because correlation is impossible without it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: Option<String>,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// One message in the turn's conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    /// Tool-call requests attached to an assistant message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Correlation id of a tool-result message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant_with_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            tool_calls,
            tool_call_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }
}

//
// ================= Memory =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MemoryRole {
    User,
    Assistant,
}

/// One persisted conversational exchange fragment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryItem {
    pub user_id: String,
    /// Monotonic sort key, `ix#<millis>`
    pub sort_key: String,
    pub role: MemoryRole,
    pub text: String,
    /// Creation time in epoch milliseconds
    pub created_at: i64,
    /// Expiry in epoch seconds, enforced by the store
    pub ttl: i64,
}

//
// ================= User Profile =================
//

/// Display attributes resolved for a user before a turn runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub name: Option<String>,
    pub language: Option<String>,
    pub email: Option<String>,
}

impl UserProfile {
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            name: None,
            language: None,
            email: None,
        }
    }

    /// Display name with the default used across the app
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Usuario")
    }

    /// Reply language with the default used across the app
    pub fn lang(&self) -> &str {
        self.language.as_deref().unwrap_or("es")
    }
}

//
// ================= Turn I/O =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRequest {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    pub input: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnReply {
    pub reply: String,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
            ChatRole::Tool => "tool",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for MemoryRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MemoryRole::User => "User",
            MemoryRole::Assistant => "Assistant",
        };
        write!(f, "{}", s)
    }
}
