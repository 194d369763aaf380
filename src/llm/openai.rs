//! OpenAI-compatible chat-completions client
//!
//! Works against any endpoint exposing `/chat/completions`.
//! Uses a long-lived reqwest::Client for connection pooling.

use crate::error::AgentError;
use crate::llm::{ChatModel, ModelResponse, ToolDefinition};
use crate::models::{ChatMessage, ChatRole, ToolCall};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

/// Reusable chat-completions client (connection-pooled)
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: Option<f32>,
}

impl OpenAiClient {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(120))
            .build()
            .expect("Failed to build HTTP client");

        // Some small models reject sampling params entirely
        let temperature = if model.to_lowercase().contains("gpt-5-nano") {
            None
        } else {
            Some(0.2)
        };

        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            temperature,
        }
    }

    fn to_api_messages(messages: &[ChatMessage]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    ChatRole::System => "system",
                    ChatRole::User => "user",
                    ChatRole::Assistant => "assistant",
                    ChatRole::Tool => "tool",
                }
                .to_string(),
                content: Some(m.content.clone()),
                tool_calls: if m.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        m.tool_calls
                            .iter()
                            .map(|tc| ApiToolCall {
                                id: tc.id.clone(),
                                r#type: "function".to_string(),
                                function: ApiFunctionCall {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.to_string(),
                                },
                            })
                            .collect(),
                    )
                },
                tool_call_id: m.tool_call_id.clone(),
            })
            .collect()
    }

    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".to_string(),
                function: ApiFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
    ) -> crate::Result<ModelResponse> {
        if self.api_key.is_empty() {
            return Err(AgentError::ModelError(
                "OPENAI_API_KEY not configured".to_string(),
            ));
        }

        let url = format!("{}/chat/completions", self.base_url);

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: Self::to_api_messages(messages),
            temperature: self.temperature,
            tools: tools.map(Self::to_api_tools),
        };

        debug!(model = %self.model, messages = messages.len(), "Calling chat-completions API");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Chat-completions request failed: {}", e);
                AgentError::ModelError(format!("Chat API error: {}", e))
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Chat-completions error response: {}", error_text);
            return Err(AgentError::ModelError(format!(
                "Chat API error: {}",
                error_text
            )));
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            error!("Failed to parse chat-completions response: {}", e);
            AgentError::ModelError(format!("Chat API parse error: {}", e))
        })?;

        let choice = completion.choices.into_iter().next().ok_or_else(|| {
            AgentError::ModelError("Empty response from chat API".to_string())
        })?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: serde_json::from_str(&tc.function.arguments)
                    .unwrap_or(serde_json::Value::Object(Default::default())),
            })
            .collect();

        Ok(ModelResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ApiToolDefinition>>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: Option<String>,
    r#type: String,
    function: ApiFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize)]
struct ApiFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = ChatCompletionRequest {
            model: "gpt-5-nano".to_string(),
            messages: vec![ApiMessage {
                role: "user".to_string(),
                content: Some("cuánto gasté este mes?".to_string()),
                tool_calls: None,
                tool_call_id: None,
            }],
            temperature: None,
            tools: None,
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("cuánto gasté este mes?"));
        assert!(!json.contains("temperature"));
    }

    #[test]
    fn test_response_tool_call_without_id() {
        let raw = r#"{
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "type": "function",
                        "function": {"name": "transaction_query", "arguments": "{}"}
                    }]
                }
            }]
        }"#;

        let parsed: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        let calls = parsed.choices[0].message.tool_calls.as_ref().unwrap();
        assert!(calls[0].id.is_none());
    }
}
