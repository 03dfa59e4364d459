//! WebSocket handler for streamed conversation turns
//!
//! One socket serves one session. Visible fragments are forwarded to the
//! client as discrete `chunk` events the moment they clear the hidden-region
//! filter; the terminal event is either `complete` with the assembled reply
//! or `error`. Chunks already delivered before a mid-stream failure are not
//! retracted, but the failed turn is never recorded in history.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::ApiState;
use super::session::{HistoryEntry, display_history};
use crate::voice::AudioPayload;

/// Incoming WebSocket message from client
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsIncoming {
    /// Send a chat message on this socket's session
    Chat { content: String },
    /// Ping to keep connection alive
    Ping,
}

/// Outgoing WebSocket message to client
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsOutgoing {
    /// Connection established
    Connected { session_id: String },
    /// Session resolved; current display history attached
    SessionJoined {
        session_id: String,
        history: Vec<HistoryEntry>,
    },
    /// Generation started
    Start,
    /// One visible fragment of the streamed reply
    Chunk { content: String },
    /// Reply complete
    Complete {
        full_text: String,
        history: Vec<HistoryEntry>,
        #[serde(flatten)]
        audio: Option<AudioPayload>,
    },
    /// Error occurred; the session remains usable
    Error { message: String },
    /// Pong response
    Pong,
}

/// Build WebSocket router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/chat/{session_id}", get(ws_upgrade))
        .with_state(state)
}

/// Handle WebSocket upgrade request
async fn ws_upgrade(
    State(state): State<Arc<ApiState>>,
    Path(session_id): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, session_id))
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<ApiState>, session_id: String) {
    let (mut sender, mut receiver) = socket.split();

    tracing::info!(session_id = %session_id, "WebSocket connected");

    // Channel for messages back to the client
    let (tx, mut rx) = mpsc::channel::<WsOutgoing>(32);

    let connected = WsOutgoing::Connected {
        session_id: session_id.clone(),
    };
    if let Ok(msg) = serde_json::to_string(&connected) {
        if sender.send(Message::Text(msg.into())).await.is_err() {
            return;
        }
    }

    // Resolve the session up front (creates on first sight, folding any
    // stored material) and replay its history to the client
    let session = state.engine.ensure_session(&session_id).await;
    let joined = WsOutgoing::SessionJoined {
        session_id: session_id.clone(),
        history: display_history(&session.snapshot().await),
    };
    if let Ok(msg) = serde_json::to_string(&joined) {
        if sender.send(Message::Text(msg.into())).await.is_err() {
            return;
        }
    }

    // Forward outgoing messages from the channel to the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(text) = serde_json::to_string(&msg) {
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    let session_id_recv = session_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if let Err(e) = handle_message(&text, &state, &session_id_recv, &tx).await {
                        let error = WsOutgoing::Error {
                            message: e.to_string(),
                        };
                        if tx.send(error).await.is_err() {
                            break;
                        }
                    }
                }
                Message::Close(_) => {
                    tracing::info!(session_id = %session_id_recv, "WebSocket closed by client");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    tracing::info!(session_id = %session_id, "WebSocket disconnected");
}

/// Handle a single incoming message
async fn handle_message(
    text: &str,
    state: &Arc<ApiState>,
    session_id: &str,
    tx: &mpsc::Sender<WsOutgoing>,
) -> crate::Result<()> {
    let incoming: WsIncoming = serde_json::from_str(text)
        .map_err(|e| crate::Error::Stream(format!("invalid message: {e}")))?;

    match incoming {
        WsIncoming::Ping => {
            send(tx, WsOutgoing::Pong).await?;
        }
        WsIncoming::Chat { content } => {
            handle_chat_message(content.trim(), state, session_id, tx).await?;
        }
    }

    Ok(())
}

/// Run one turn and stream the reply as chunk events
async fn handle_chat_message(
    content: &str,
    state: &Arc<ApiState>,
    session_id: &str,
    tx: &mpsc::Sender<WsOutgoing>,
) -> crate::Result<()> {
    if content.is_empty() {
        send(tx, WsOutgoing::Error { message: "empty message received".to_string() }).await?;
        return Ok(());
    }

    send(tx, WsOutgoing::Start).await?;

    // Bridge engine fragments to chunk events
    let (chunk_tx, mut chunk_rx) = mpsc::channel::<String>(32);
    let tx_chunks = tx.clone();
    let bridge = tokio::spawn(async move {
        while let Some(content) = chunk_rx.recv().await {
            if tx_chunks.send(WsOutgoing::Chunk { content }).await.is_err() {
                break;
            }
        }
    });

    let result = state
        .engine
        .send_message(session_id, content, Some(chunk_tx))
        .await;
    // The engine dropped its sender; drain remaining chunks before the
    // terminal event so ordering holds
    let _ = bridge.await;

    match result {
        Ok(full_text) => {
            let audio = state.engine.spoken_reply(&full_text).await;
            let history = state
                .engine
                .history(session_id)
                .await
                .map(|snapshot| display_history(&snapshot))
                .unwrap_or_default();
            send(
                tx,
                WsOutgoing::Complete {
                    full_text,
                    history,
                    audio,
                },
            )
            .await?;
        }
        Err(e) => {
            tracing::warn!(session_id = %session_id, error = %e, "turn failed");
            send(tx, WsOutgoing::Error { message: e.to_string() }).await?;
        }
    }

    Ok(())
}

async fn send(tx: &mpsc::Sender<WsOutgoing>, msg: WsOutgoing) -> crate::Result<()> {
    tx.send(msg)
        .await
        .map_err(|_| crate::Error::Stream("websocket channel closed".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_message_deserializes() {
        let json = r#"{"type":"chat","content":"Explain entropy"}"#;
        let msg: WsIncoming = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, WsIncoming::Chat { content } if content == "Explain entropy"));
    }

    #[test]
    fn ping_deserializes() {
        let msg: WsIncoming = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(msg, WsIncoming::Ping));
    }

    #[test]
    fn chunk_serializes_with_snake_case_tag() {
        let json = serde_json::to_string(&WsOutgoing::Chunk {
            content: "[Expert] ".to_string(),
        })
        .unwrap();
        assert!(json.contains("\"type\":\"chunk\""));
        assert!(json.contains("\"content\":\"[Expert] \""));
    }

    #[test]
    fn complete_without_audio_omits_audio_fields() {
        let json = serde_json::to_value(WsOutgoing::Complete {
            full_text: "done".to_string(),
            history: Vec::new(),
            audio: None,
        })
        .unwrap();
        assert_eq!(json["type"], "complete");
        assert!(json.get("audio_base64").is_none());
    }

    #[test]
    fn complete_with_audio_flattens_payload() {
        let json = serde_json::to_value(WsOutgoing::Complete {
            full_text: "done".to_string(),
            history: Vec::new(),
            audio: Some(AudioPayload {
                audio_base64: "UklGRg==".to_string(),
                audio_mime_type: "audio/wav".to_string(),
            }),
        })
        .unwrap();
        assert_eq!(json["audio_mime_type"], "audio/wav");
    }
}
