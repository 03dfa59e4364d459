//! Voice API endpoints for speech-to-text and text-to-speech

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiState};

/// Build voice router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/transcribe", post(transcribe))
        .route("/synthesize", post(synthesize))
        .route("/capabilities", get(capabilities))
        .with_state(state)
}

/// Microphone capture hints served to recording clients
#[derive(Debug, Serialize)]
pub struct CaptureHints {
    pub energy_threshold: u32,
    pub pause_threshold: f64,
    pub phrase_time_limit: Option<u64>,
}

/// Voice capabilities response
#[derive(Debug, Serialize)]
pub struct VoiceCapabilities {
    pub stt_available: bool,
    pub tts_available: bool,
    pub capture: CaptureHints,
}

/// Get voice capabilities and capture hints
async fn capabilities(State(state): State<Arc<ApiState>>) -> Json<VoiceCapabilities> {
    let voice = &state.config.voice;
    Json(VoiceCapabilities {
        stt_available: state.stt.is_some(),
        tts_available: state.engine.tts().is_some(),
        capture: CaptureHints {
            energy_threshold: voice.energy_threshold,
            pause_threshold: voice.pause_threshold,
            phrase_time_limit: voice.phrase_time_limit,
        },
    })
}

/// Transcription response
#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    pub success: bool,
    pub text: String,
}

/// Transcribe WAV audio to text.
///
/// Unintelligible audio yields `success: false` with empty text rather than
/// an error; the client simply records again.
async fn transcribe(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<Json<TranscribeResponse>, ApiError> {
    let stt = state
        .stt
        .as_ref()
        .ok_or(ApiError::NotConfigured("speech recognition not enabled on this server"))?;

    if body.is_empty() {
        return Err(ApiError::BadRequest("empty audio data"));
    }

    let text = stt.transcribe(&body).await?;
    Ok(Json(TranscribeResponse {
        success: !text.is_empty(),
        text,
    }))
}

/// Synthesis request
#[derive(Debug, Deserialize)]
pub struct SynthesizeRequest {
    pub text: String,
}

/// Synthesize text to speech, returning audio bytes
async fn synthesize(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<SynthesizeRequest>,
) -> Result<Response, ApiError> {
    let tts = state
        .engine
        .tts()
        .ok_or(ApiError::NotConfigured("speech synthesis not enabled on this server"))?;

    if request.text.trim().is_empty() {
        return Err(ApiError::BadRequest("empty text"));
    }

    let audio = tts.synthesize(&request.text).await?;
    let mime = tts.mime_type();

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, mime)], audio).into_response())
}
