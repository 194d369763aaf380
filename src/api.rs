//! REST API server for the transaction-chat agent
//!
//! Two entry points over one orchestrator: a synchronous request/response
//! call and a streaming call that forwards progress events as SSE and
//! always closes the stream with a final `status: "done"` record.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::error::AgentError;
use crate::events::OutputChannel;
use crate::graph::{Orchestrator, TurnState};
use crate::models::{TurnReply, TurnRequest};
use crate::profile::ProfileRepository;

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
    pub profiles: Arc<ProfileRepository>,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, serde::Serialize)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            error: message.into(),
        })
    }
}

/// =============================
/// Handlers
/// =============================

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

fn validated(req: &TurnRequest) -> Option<(String, String)> {
    let user_id = req.user_id.as_deref().unwrap_or("").trim();
    let input = req.input.as_deref().unwrap_or("").trim();
    if user_id.is_empty() || input.is_empty() {
        return None;
    }
    Some((user_id.to_string(), input.to_string()))
}

async fn run_turn(
    state: &ApiState,
    user_id: String,
    input: String,
    channel: Option<OutputChannel>,
) -> crate::Result<String> {
    let profile = state.profiles.get(&user_id).await?;

    let turn = TurnState {
        user_id,
        input,
        user_name: profile.display_name().to_string(),
        lang: profile.lang().to_string(),
        channel,
        ..Default::default()
    };

    state.orchestrator.run(turn).await
}

async fn chat_handler(
    State(state): State<ApiState>,
    Json(req): Json<TurnRequest>,
) -> (StatusCode, axum::response::Response) {
    let Some((user_id, input)) = validated(&req) else {
        return (
            StatusCode::BAD_REQUEST,
            ApiError::new("userId and input are required").into_response(),
        );
    };

    info!(user_id = %user_id, "Chat request received");

    match run_turn(&state, user_id, input, None).await {
        Ok(reply) => (StatusCode::OK, Json(TurnReply { reply }).into_response()),
        Err(AgentError::ValidationError(message)) => {
            (StatusCode::BAD_REQUEST, ApiError::new(message).into_response())
        }
        Err(e) => {
            error!("Turn failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new(format!("Turn failed: {}", e)).into_response(),
            )
        }
    }
}

/// The final record of every stream carries `status: "done"`. The model
/// is instructed to answer with a JSON object; replies that are not JSON
/// are wrapped under `text`.
fn final_event_payload(reply: &str) -> Value {
    let mut data = serde_json::from_str::<Value>(reply)
        .ok()
        .filter(|v| v.is_object())
        .unwrap_or_else(|| json!({ "text": reply }));
    data["status"] = json!("done");
    data
}

async fn chat_stream_handler(
    State(state): State<ApiState>,
    Json(req): Json<TurnRequest>,
) -> Sse<impl futures::Stream<Item = std::result::Result<Event, Infallible>>> {
    let (channel, rx) = OutputChannel::new();

    match validated(&req) {
        Some((user_id, input)) => {
            // The spawned task owns the only sender; dropping it on every
            // exit path is what closes the stream.
            tokio::spawn(async move {
                match run_turn(&state, user_id, input, Some(channel.clone())).await {
                    Ok(reply) => {
                        channel.emit("finalResponse", final_event_payload(&reply));
                    }
                    Err(e) => {
                        error!("Streaming turn failed: {}", e);
                        channel.emit(
                            "error",
                            json!({
                                "message": "Ocurrió un error en el servidor.",
                                "detail": e.to_string(),
                                "status": "done",
                            }),
                        );
                    }
                }
            });
        }
        None => {
            channel.emit(
                "error",
                json!({
                    "message": "userId and input are required",
                    "status": "done",
                }),
            );
            // Dropping the sender here ends the stream after the record
        }
    }

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        let sse = Event::default()
            .event(event.event)
            .data(event.data.to_string());
        Some((Ok(sse), rx))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat_handler))
        .route("/api/chat/stream", post(chat_stream_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    state: ApiState,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API server listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_rejects_blank_fields() {
        let req = TurnRequest {
            user_id: Some("  ".to_string()),
            input: Some("hola".to_string()),
        };
        assert!(validated(&req).is_none());

        let req = TurnRequest {
            user_id: Some("u1".to_string()),
            input: Some("hola".to_string()),
        };
        assert_eq!(
            validated(&req),
            Some(("u1".to_string(), "hola".to_string()))
        );
    }

    #[test]
    fn test_final_event_payload_merges_model_json() {
        let payload = final_event_payload(r#"{"text": "Hola Seba"}"#);
        assert_eq!(payload["text"], "Hola Seba");
        assert_eq!(payload["status"], "done");
    }

    #[test]
    fn test_final_event_payload_wraps_plain_text() {
        let payload = final_event_payload("una respuesta simple");
        assert_eq!(payload["text"], "una respuesta simple");
        assert_eq!(payload["status"], "done");
    }
}
