//! Conversation orchestrator
//!
//! An explicit state machine drives each turn:
//!
//! Classify → {Chitchat, Guardrail, LoadContext} → Model ⟷ ToolExec → Persist → Done
//!
//! Every node is a transition function returning the next node plus a
//! state patch, so routing is testable without any external service.
//! The Model⟷ToolExec cycle is bounded by the configured hop budget;
//! running out of budget produces a fixed fallback reply, not an error.

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::events::{progress_label, OutputChannel};
use crate::llm::ChatModel;
use crate::memory::{build_context, MemoryStore};
use crate::models::{ChatMessage, MemoryRole, ToolCall};
use crate::tools::ToolRegistry;
use crate::Result;
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub mod prompts;

/// Reply when the model produced no usable text
pub const EMPTY_ANSWER_FALLBACK: &str = "Perdón, no pude generar una respuesta en este momento.";

/// Reply when the hop budget runs out before a final answer
pub const HOP_BUDGET_FALLBACK: &str =
    "Necesito un poco más de contexto o permiso para usar herramientas y completar tu pedido.";

//
// ================= Turn State =================
//

/// Conversation state, exclusively owned by one turn
#[derive(Clone, Default)]
pub struct TurnState {
    pub messages: Vec<ChatMessage>,
    pub user_id: String,
    pub input: String,
    pub user_name: String,
    pub lang: String,
    /// Live output sink; absent on the non-streaming path
    pub channel: Option<OutputChannel>,
}

/// How a patch updates the message sequence
#[derive(Default)]
pub enum MessageUpdate {
    #[default]
    Keep,
    /// The normal merge rule: concatenation
    Append(Vec<ChatMessage>),
    /// Only LoadContext replaces the sequence wholesale
    Replace(Vec<ChatMessage>),
}

/// State delta produced by one node
#[derive(Default)]
pub struct StatePatch {
    pub messages: MessageUpdate,
    pub user_name: Option<String>,
    pub lang: Option<String>,
}

impl StatePatch {
    pub fn append(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages: MessageUpdate::Append(messages),
            ..Default::default()
        }
    }

    pub fn replace(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages: MessageUpdate::Replace(messages),
            ..Default::default()
        }
    }
}

impl TurnState {
    /// Merge a node's patch: messages concatenate (or are replaced by
    /// LoadContext); scalars are last-write-wins, empty values never
    /// overwrite a prior value.
    pub fn apply(&mut self, patch: StatePatch) {
        match patch.messages {
            MessageUpdate::Keep => {}
            MessageUpdate::Append(mut messages) => self.messages.append(&mut messages),
            MessageUpdate::Replace(messages) => self.messages = messages,
        }
        if let Some(name) = patch.user_name.filter(|v| !v.is_empty()) {
            self.user_name = name;
        }
        if let Some(lang) = patch.lang.filter(|v| !v.is_empty()) {
            self.lang = lang;
        }
    }
}

//
// ================= Nodes =================
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    Classify,
    Chitchat,
    Guardrail,
    LoadContext,
    Model,
    ToolExec,
    Persist,
    Done,
}

//
// ================= Orchestrator =================
//

/// Drives one turn through the state machine
pub struct Orchestrator {
    model: Arc<dyn ChatModel>,
    tools: Arc<ToolRegistry>,
    memory: Arc<dyn MemoryStore>,
    config: AgentConfig,
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn ChatModel>,
        tools: Arc<ToolRegistry>,
        memory: Arc<dyn MemoryStore>,
        config: AgentConfig,
    ) -> Self {
        Self {
            model,
            tools,
            memory,
            config,
        }
    }

    /// Run one turn to completion and return the final reply text.
    pub async fn run(&self, mut state: TurnState) -> Result<String> {
        if state.user_id.trim().is_empty() || state.input.trim().is_empty() {
            return Err(AgentError::ValidationError(
                "userId and input are required".to_string(),
            ));
        }

        let turn_id = Uuid::new_v4();
        info!(%turn_id, user_id = %state.user_id, "Turn started");

        let mut node = Node::Classify;
        let mut hops = 0usize;

        loop {
            debug!(%turn_id, ?node, hops, "Transition");

            node = match node {
                Node::Classify => {
                    let (next, patch) = self.classify(&state).await?;
                    state.apply(patch);
                    next
                }
                Node::Chitchat => {
                    let (next, patch) = self.chitchat(&state).await?;
                    state.apply(patch);
                    next
                }
                Node::Guardrail => {
                    let (next, patch) = self.guardrail(&state).await?;
                    state.apply(patch);
                    next
                }
                Node::LoadContext => {
                    let (next, patch) = self.load_context(&state).await?;
                    state.apply(patch);
                    next
                }
                Node::Model => {
                    hops += 1;
                    if hops > self.config.max_hops {
                        warn!(
                            user_id = %state.user_id,
                            hops,
                            "Hop budget exhausted, returning fallback"
                        );
                        state.apply(StatePatch::append(vec![ChatMessage::assistant(
                            HOP_BUDGET_FALLBACK,
                        )]));
                        // Not a successful completion; nothing is persisted
                        Node::Done
                    } else {
                        let (next, patch) = self.call_model(&state).await?;
                        state.apply(patch);
                        next
                    }
                }
                Node::ToolExec => {
                    let (next, patch) = self.exec_tools(&state).await?;
                    state.apply(patch);
                    next
                }
                Node::Persist => {
                    self.persist(&state).await?;
                    Node::Done
                }
                Node::Done => break,
            };
        }

        Ok(final_reply(&state))
    }

    /// One closed-label model call; never mutates `messages`.
    async fn classify(&self, state: &TurnState) -> Result<(Node, StatePatch)> {
        let prompt = prompts::classifier_prompt(&state.input);
        let response = self.model.chat(&[ChatMessage::user(prompt)], None).await?;
        let label = response.content.trim();

        debug!(label, "Turn classified");

        let next = match label {
            l if l == prompts::LABEL_CHITCHAT => Node::Chitchat,
            l if l == prompts::LABEL_GUARDRAILS => Node::Guardrail,
            _ => {
                if let Some(channel) = &state.channel {
                    channel.emit_pending("preFlowClassifier");
                }
                Node::LoadContext
            }
        };

        Ok((next, StatePatch::default()))
    }

    /// Informal redirect for small talk. No history, no persistence.
    async fn chitchat(&self, state: &TurnState) -> Result<(Node, StatePatch)> {
        let prompt = prompts::chitchat_prompt(&state.user_name, &state.input);
        let response = self.model.chat(&[ChatMessage::user(prompt)], None).await?;

        Ok((
            Node::Done,
            StatePatch::append(vec![ChatMessage::system(response.content)]),
        ))
    }

    /// Firm reply for abusive input. No history, no persistence.
    async fn guardrail(&self, state: &TurnState) -> Result<(Node, StatePatch)> {
        let prompt = prompts::guardrail_prompt(&state.user_name);
        let response = self.model.chat(&[ChatMessage::user(prompt)], None).await?;

        Ok((
            Node::Done,
            StatePatch::append(vec![ChatMessage::system(response.content)]),
        ))
    }

    /// Replace `messages` wholesale with system + contextualized input.
    async fn load_context(&self, state: &TurnState) -> Result<(Node, StatePatch)> {
        let recent = self
            .memory
            .recent(&state.user_id, self.config.memory_items)
            .await?;
        let context = build_context(&recent, self.config.context_max_chars);
        let system = prompts::initial_system_message(&state.user_name, &state.lang);

        let messages = vec![
            ChatMessage::system(system),
            ChatMessage::user(format!("{}\n\nContexto:\n{}", state.input, context)),
        ];

        Ok((Node::Model, StatePatch::replace(messages)))
    }

    async fn call_model(&self, state: &TurnState) -> Result<(Node, StatePatch)> {
        let definitions = self.tools.definitions();
        let response = self
            .model
            .chat(&state.messages, Some(&definitions))
            .await?;

        if response.tool_calls.is_empty() {
            // Final answer
            return Ok((
                Node::Persist,
                StatePatch::append(vec![ChatMessage::assistant(response.content)]),
            ));
        }

        Ok((
            Node::ToolExec,
            StatePatch::append(vec![ChatMessage::assistant_with_calls(
                response.content,
                response.tool_calls,
            )]),
        ))
    }

    /// Execute every requested tool call concurrently and append one
    /// correlated tool-result message per call.
    async fn exec_tools(&self, state: &TurnState) -> Result<(Node, StatePatch)> {
        let last = state
            .messages
            .last()
            .filter(|m| !m.tool_calls.is_empty())
            .ok_or_else(|| {
                AgentError::ToolCorrelationError("No tool calls found".to_string())
            })?;

        // Correlation ids are mandatory; without them results cannot be
        // matched back to their requests.
        let mut calls: Vec<(String, &ToolCall)> = Vec::with_capacity(last.tool_calls.len());
        for call in &last.tool_calls {
            let id = call.id.clone().ok_or_else(|| {
                AgentError::ToolCorrelationError(format!(
                    "Tool call '{}' is missing its id",
                    call.name
                ))
            })?;
            calls.push((id, call));
        }

        if let Some(channel) = &state.channel {
            for (_, call) in &calls {
                channel.emit(
                    "toolExec",
                    json!({
                        "text": progress_label(&call.name),
                        "tool": call.name,
                        "status": "pending",
                    }),
                );
            }
        }

        let results = join_all(
            calls
                .iter()
                .map(|(id, call)| self.run_tool(id.clone(), *call)),
        )
        .await;

        Ok((Node::Model, StatePatch::append(results)))
    }

    async fn run_tool(&self, call_id: String, call: &ToolCall) -> ChatMessage {
        let Some(tool) = self.tools.get(&call.name) else {
            // Unknown tools degrade to an inline error the model can see
            warn!(tool = %call.name, "Unknown tool requested");
            return ChatMessage::tool_result(
                call_id,
                json!({ "error": format!("Unknown tool: {}", call.name) }).to_string(),
            );
        };

        match tool.execute(call.arguments.clone()).await {
            Ok(output) => ChatMessage::tool_result(call_id, output.to_string()),
            Err(error) => {
                warn!(tool = %call.name, %error, "Tool execution failed");
                ChatMessage::tool_result(
                    call_id,
                    json!({ "error": error.to_string() }).to_string(),
                )
            }
        }
    }

    /// Store the turn: the user's input and the final assistant reply.
    async fn persist(&self, state: &TurnState) -> Result<()> {
        let reply = final_reply(state);
        let ttl = self.config.memory_ttl_seconds;

        self.memory
            .append(&state.user_id, MemoryRole::User, &state.input, ttl)
            .await?;
        self.memory
            .append(&state.user_id, MemoryRole::Assistant, &reply, ttl)
            .await?;

        debug!(user_id = %state.user_id, "Turn persisted");
        Ok(())
    }
}

fn final_reply(state: &TurnState) -> String {
    let text = state
        .messages
        .last()
        .map(|m| m.content.trim())
        .unwrap_or_default();

    if text.is_empty() {
        EMPTY_ANSWER_FALLBACK.to_string()
    } else {
        text.to_string()
    }
}
