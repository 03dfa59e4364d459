//! HTTP API server for the tutor gateway

pub mod health;
pub mod session;
pub mod voice;
pub mod websocket;

use std::sync::Arc;

use axum::{
    Json, Router,
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::engine::ConversationEngine;
use crate::voice::SpeechToText;
use crate::{Error, Result};

/// Shared state for API handlers
pub struct ApiState {
    pub engine: Arc<ConversationEngine>,
    pub stt: Option<SpeechToText>,
    pub config: Arc<Config>,
}

/// The HTTP/WebSocket API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    /// Assemble the server from validated configuration and an engine
    #[must_use]
    pub fn new(config: Arc<Config>, engine: Arc<ConversationEngine>) -> Self {
        let stt = if config.voice.enabled {
            SpeechToText::new(&config.api_keys.openai, &config.voice.stt_model)
                .map_err(|e| tracing::warn!(error = %e, "STT disabled"))
                .ok()
        } else {
            None
        };

        let port = config.server.port;
        let state = Arc::new(ApiState {
            engine,
            stt,
            config,
        });

        Self { state, port }
    }

    /// Build the full router
    #[must_use]
    pub fn router(&self) -> Router {
        let api = Router::new()
            .merge(health::router())
            .merge(session::router(Arc::clone(&self.state)))
            .nest("/voice", voice::router(Arc::clone(&self.state)));

        Router::new()
            .nest("/api", api)
            .nest("/ws", websocket::router(Arc::clone(&self.state)))
            .layer(cors_layer(&self.state.config))
            .layer(TraceLayer::new_for_http())
    }

    /// Bind and serve until the process is stopped
    ///
    /// # Errors
    ///
    /// Returns error if binding or serving fails
    pub async fn serve(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!(addr = %addr, "API server listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| Error::Config(format!("server error: {e}")))?;
        Ok(())
    }
}

/// CORS layer from the configured origin allow-list
fn cors_layer(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    if config.server.allow_all_origins {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .server
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    layer.allow_origin(origins)
}

/// API handler errors with their HTTP mapping
#[derive(Debug)]
pub enum ApiError {
    BadRequest(&'static str),
    NotFound(String),
    NotConfigured(&'static str),
    Upstream(String),
    Internal(String),
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e {
            Error::SessionNotFound(id) => {
                Self::NotFound(format!("no active conversation for session {id}"))
            }
            Error::Transport(m) | Error::Stream(m) => Self::Upstream(m),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(serde::Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(serde::Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
        }

        let (status, code, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.to_string()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "session_not_found", msg),
            Self::NotConfigured(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "not_configured", msg.to_string())
            }
            Self::Upstream(msg) => (StatusCode::BAD_GATEWAY, "upstream_error", msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        (status, Json(ErrorResponse { error: ErrorBody { code, message } })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_not_found_maps_to_404() {
        let api_err = ApiError::from(Error::SessionNotFound("s1".to_string()));
        assert!(matches!(api_err, ApiError::NotFound(_)));
    }

    #[test]
    fn transport_errors_map_to_upstream() {
        let api_err = ApiError::from(Error::Transport("connect refused".to_string()));
        assert!(matches!(api_err, ApiError::Upstream(_)));

        let api_err = ApiError::from(Error::Stream("reset mid-stream".to_string()));
        assert!(matches!(api_err, ApiError::Upstream(_)));
    }
}
