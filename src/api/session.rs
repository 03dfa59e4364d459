//! Session API endpoints: material upload, conversation turns, history,
//! reset

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ApiError, ApiState};
use crate::history::{Message, Role};
use crate::voice::AudioPayload;

/// Build session router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/material", post(upload_material))
        .route("/start", post(start))
        .route("/send-message", post(send_message))
        .route("/history", get(history))
        .route("/reset", post(reset))
        .with_state(state)
}

/// One history entry as shown to clients.
///
/// The assistant is rendered as "tutor" and system messages are never
/// exposed.
#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub role: &'static str,
    pub content: String,
}

/// Convert a display snapshot into client-facing entries
pub fn display_history(messages: &[Message]) -> Vec<HistoryEntry> {
    messages
        .iter()
        .map(|m| HistoryEntry {
            role: match m.role {
                Role::User => "user",
                // System messages are filtered out of snapshots upstream
                Role::Assistant | Role::System => "tutor",
            },
            content: m.content.clone(),
        })
        .collect()
}

/// Study material upload: extracted text, not the raw document
#[derive(Debug, Deserialize)]
pub struct UploadMaterialRequest {
    pub text: String,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Serialize)]
struct UploadMaterialResponse {
    success: bool,
    session_id: String,
    filename: Option<String>,
}

/// Store uploaded study material and mint the session id for it
async fn upload_material(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<UploadMaterialRequest>,
) -> Result<Json<UploadMaterialResponse>, ApiError> {
    if request.text.trim().is_empty() {
        return Err(ApiError::BadRequest("no study material text provided"));
    }

    let session_id = Uuid::new_v4().to_string();
    tracing::debug!(session_id = %session_id, bytes = request.text.len(), "material uploaded");

    state
        .engine
        .registry()
        .store_material(&session_id, request.text)
        .await;

    Ok(Json(UploadMaterialResponse {
        success: true,
        session_id,
        filename: request.filename,
    }))
}

#[derive(Debug, Deserialize)]
struct StartRequest {
    session_id: String,
}

#[derive(Serialize)]
struct StartResponse {
    success: bool,
    message: String,
    session_id: String,
    #[serde(flatten)]
    audio: Option<AudioPayload>,
}

/// Create the session and run the greeting turn
async fn start(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<StartRequest>,
) -> Result<Json<StartResponse>, ApiError> {
    if request.session_id.trim().is_empty() {
        return Err(ApiError::BadRequest("no session id provided"));
    }

    let message = state.engine.start(&request.session_id).await?;
    let audio = state.engine.spoken_reply(&message).await;

    Ok(Json(StartResponse {
        success: true,
        message,
        session_id: request.session_id,
        audio,
    }))
}

#[derive(Debug, Deserialize)]
struct SendMessageRequest {
    session_id: String,
    message: String,
}

#[derive(Serialize)]
struct SendMessageResponse {
    success: bool,
    response: String,
    history: Vec<HistoryEntry>,
    #[serde(flatten)]
    audio: Option<AudioPayload>,
}

/// Run one conversation turn
async fn send_message(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    let text = request.message.trim();
    if text.is_empty() {
        // Empty input is a no-op, not a failure of the session
        return Err(ApiError::BadRequest("no message provided"));
    }

    let response = state
        .engine
        .send_message(&request.session_id, text, None)
        .await?;
    let audio = state.engine.spoken_reply(&response).await;
    let snapshot = state.engine.history(&request.session_id).await?;

    Ok(Json(SendMessageResponse {
        success: true,
        response,
        history: display_history(&snapshot),
        audio,
    }))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    session_id: String,
}

#[derive(Serialize)]
struct HistoryResponse {
    success: bool,
    history: Vec<HistoryEntry>,
}

/// Display-safe conversation history
async fn history(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let snapshot = state.engine.history(&query.session_id).await?;
    Ok(Json(HistoryResponse {
        success: true,
        history: display_history(&snapshot),
    }))
}

#[derive(Debug, Deserialize)]
struct ResetRequest {
    session_id: String,
}

#[derive(Serialize)]
struct ResetResponse {
    success: bool,
}

/// Destroy the session and any stored material
async fn reset(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<ResetRequest>,
) -> Json<ResetResponse> {
    state.engine.reset(&request.session_id).await;
    Json(ResetResponse { success: true })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_history_maps_assistant_to_tutor() {
        let messages = vec![Message::user("hi"), Message::assistant("hello")];
        let entries = display_history(&messages);
        assert_eq!(entries[0].role, "user");
        assert_eq!(entries[1].role, "tutor");
        assert_eq!(entries[1].content, "hello");
    }

    #[test]
    fn send_message_request_deserializes() {
        let request: SendMessageRequest =
            serde_json::from_str(r#"{"session_id":"s1","message":"What is osmosis?"}"#).unwrap();
        assert_eq!(request.session_id, "s1");
        assert_eq!(request.message, "What is osmosis?");
    }

    #[test]
    fn start_response_flattens_audio_payload() {
        let response = StartResponse {
            success: true,
            message: "[TA] Welcome!".to_string(),
            session_id: "s1".to_string(),
            audio: Some(AudioPayload {
                audio_base64: "AAAA".to_string(),
                audio_mime_type: "audio/wav".to_string(),
            }),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["audio_base64"], "AAAA");
        assert_eq!(json["audio_mime_type"], "audio/wav");
        assert!(json.get("audio").is_none());
    }
}
