//! Chat model trait and implementations
//!
//! The model drives every decision in a turn: classification, the
//! short-circuit replies, and the tool loop. Everything behind this trait
//! so tests run without a network.

use crate::models::{ChatMessage, ToolCall};
use crate::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::Mutex;

pub mod openai;
pub use openai::OpenAiClient;

/// A tool made available to the model for one call
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// What the model returned: plain text, possibly with tool-call requests
#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl ModelResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn with_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: content.into(),
            tool_calls,
        }
    }
}

/// Trait for chat-completion model access
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Invoke the model with the full message sequence and an optional
    /// bound tool set.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ModelResponse>;
}

/// Scripted model for development & testing
/// Pops one queued response per call; an exhausted queue replays the
/// fallback response.
pub struct MockChatModel {
    responses: Mutex<VecDeque<ModelResponse>>,
    fallback: ModelResponse,
}

impl MockChatModel {
    pub fn new(responses: Vec<ModelResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            fallback: ModelResponse::text(""),
        }
    }

    /// A model that answers every call with the same text.
    pub fn always(text: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fallback: ModelResponse::text(text),
        }
    }

    /// Replace the response replayed once the queue is exhausted.
    pub fn with_fallback(mut self, fallback: ModelResponse) -> Self {
        self.fallback = fallback;
        self
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn chat(
        &self,
        _messages: &[ChatMessage],
        _tools: Option<&[ToolDefinition]>,
    ) -> Result<ModelResponse> {
        let mut queue = self.responses.lock().await;
        Ok(queue.pop_front().unwrap_or_else(|| self.fallback.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_pops_in_order() {
        let model = MockChatModel::new(vec![
            ModelResponse::with_calls(
                "",
                vec![ToolCall {
                    id: Some("c1".into()),
                    name: "transaction_query".into(),
                    arguments: serde_json::json!({}),
                }],
            ),
            ModelResponse::text("listo"),
        ]);

        let first = model.chat(&[], None).await.unwrap();
        assert_eq!(first.tool_calls.len(), 1);

        let second = model.chat(&[], None).await.unwrap();
        assert_eq!(second.content, "listo");
        assert!(second.tool_calls.is_empty());
    }
}
