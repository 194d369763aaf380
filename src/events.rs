//! Live output channel for the streaming entry point
//!
//! Progress notifications are fire-and-forget: nodes emit and move on,
//! the HTTP handler owns the receiving end and is responsible for
//! closing the stream exactly once. Records use the SSE wire shape
//! `event: <name>\ndata: <json>\n\n`.

use serde_json::{json, Value};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// One server-sent event
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    pub event: String,
    pub data: Value,
}

impl SseEvent {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Render as an SSE wire record.
    pub fn to_wire(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.event, self.data)
    }
}

/// Write-once-per-event sink for progress notifications
#[derive(Clone)]
pub struct OutputChannel {
    tx: UnboundedSender<SseEvent>,
}

impl OutputChannel {
    /// Channel pair: the sender side travels with the turn state, the
    /// receiver side is drained by the HTTP handler.
    pub fn new() -> (Self, UnboundedReceiver<SseEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Emit one event. Never blocks and never fails: a closed receiver
    /// just drops the notification.
    pub fn emit(&self, event: &str, data: Value) {
        let _ = self.tx.send(SseEvent::new(event, data));
    }

    pub fn emit_pending(&self, event: &str) {
        self.emit(event, json!({ "text": "...", "status": "pending" }));
    }
}

/// Short human-readable "what I'm doing" message for a tool invocation
pub fn progress_label(tool_name: &str) -> &'static str {
    match tool_name {
        "transaction_query" => "Consultando tus transacciones...",
        "list_transaction_categories" => "Revisando las categorías disponibles...",
        "list_transaction_types" => "Revisando los tipos de transacción...",
        "user_query" => "Buscando usuarios...",
        _ => "Procesando tu consulta...",
    }
}
