//! Conversation engine
//!
//! Drives one tutoring turn end to end: resolves the session, opens the
//! streaming completion, filters hidden reasoning regions, forwards visible
//! fragments to an optional listener channel, and records the finished turn
//! in history. All remote failures are converted to typed errors here; a
//! failed turn never corrupts history or affects sibling sessions.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::filter::ThinkFilter;
use crate::history::Message;
use crate::llm::{ChatClient, GenerationParams, WireMessage};
use crate::session::{Session, SessionRegistry};
use crate::voice::tts::{AudioPayload, TextToSpeech};
use crate::{Error, Result, prompt};

/// Engine owning the registry, the completion client, and optional TTS
pub struct ConversationEngine {
    config: Arc<Config>,
    llm: ChatClient,
    registry: SessionRegistry,
    tts: Option<TextToSpeech>,
}

impl ConversationEngine {
    /// Build an engine from validated configuration
    #[must_use]
    pub fn new(config: Arc<Config>) -> Self {
        let llm = ChatClient::new(&config.llm.base_url, config.api_keys.tutor.clone());
        let tts = config
            .tts_available()
            .then(|| TextToSpeech::new(&config.api_keys.openai, &config.voice));

        Self {
            config,
            llm,
            registry: SessionRegistry::new(),
            tts,
        }
    }

    /// The session registry
    #[must_use]
    pub const fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// The active configuration
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The speech synthesizer, when voice output is configured
    #[must_use]
    pub const fn tts(&self) -> Option<&TextToSpeech> {
        self.tts.as_ref()
    }

    /// Get or create the session for `id`, folding any uploaded material
    /// into its system prompt on true creation
    pub async fn ensure_session(&self, id: &str) -> Arc<Session> {
        self.registry
            .get_or_create(
                id,
                &self.config.llm.system_prompt,
                GenerationParams::from(&self.config.llm),
            )
            .await
    }

    /// Start a conversation: create the session and run the greeting turn
    ///
    /// # Errors
    ///
    /// Returns a transport or stream error if the greeting generation fails;
    /// the session remains usable for a retry.
    pub async fn start(&self, session_id: &str) -> Result<String> {
        let session = self.ensure_session(session_id).await;
        let opening = self.config.llm.opening_message.clone();
        self.run_turn(&session, &opening, None).await
    }

    /// Run one turn on an existing session.
    ///
    /// Visible fragments are forwarded to `chunks` in arrival order as they
    /// stream in. The returned string is the assembled, trimmed assistant
    /// reply; it has been recorded in history together with the user
    /// message unless it is empty.
    ///
    /// # Errors
    ///
    /// [`Error::SessionNotFound`] if `session_id` is unknown;
    /// [`Error::Transport`] if the completion call fails to open;
    /// [`Error::Stream`] on mid-stream failure. In every failure case
    /// history is left unchanged; fragments already forwarded to `chunks`
    /// stay delivered, but a partial reply is never persisted.
    pub async fn send_message(
        &self,
        session_id: &str,
        text: &str,
        chunks: Option<mpsc::Sender<String>>,
    ) -> Result<String> {
        let session = self
            .registry
            .get(session_id)
            .await
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;
        self.run_turn(&session, text, chunks).await
    }

    async fn run_turn(
        &self,
        session: &Arc<Session>,
        text: &str,
        chunks: Option<mpsc::Sender<String>>,
    ) -> Result<String> {
        // One turn at a time per session; turns on other sessions proceed
        let _turn = session.begin_turn().await;

        let user = Message::user(text);
        let mut wire: Vec<WireMessage> =
            session.request_messages().await.iter().map(Into::into).collect();
        // Per-turn guidance is sent fresh each call and never stored
        wire.push(WireMessage {
            role: "system",
            content: prompt::ITERATIVE_PROMPT.to_string(),
        });
        wire.push(WireMessage::from(&user));

        let stream = self.llm.stream_completion(&wire, session.params()).await?;
        let assembled = consume_stream(stream, chunks.as_ref()).await?;

        if assembled.is_empty() {
            tracing::warn!(session_id = %session.id, "model returned no visible text");
            return Ok(assembled);
        }

        session
            .record_turn(user, Message::assistant(assembled.clone()))
            .await;
        tracing::info!(
            session_id = %session.id,
            chars = assembled.len(),
            "turn complete"
        );
        Ok(assembled)
    }

    /// Display snapshot of a session's history
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionNotFound`] for an unknown id.
    pub async fn history(&self, session_id: &str) -> Result<Vec<Message>> {
        let session = self
            .registry
            .get(session_id)
            .await
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;
        Ok(session.snapshot().await)
    }

    /// Destroy a session and its material; returns whether anything existed
    pub async fn reset(&self, session_id: &str) -> bool {
        self.registry.destroy(session_id).await
    }

    /// Synthesize a spoken reply, best effort.
    ///
    /// Returns `None` when TTS is not configured, the text is empty, or
    /// synthesis fails; failures are logged and never propagated to the
    /// caller of the turn.
    pub async fn spoken_reply(&self, text: &str) -> Option<AudioPayload> {
        let tts = self.tts.as_ref()?;
        if text.trim().is_empty() {
            return None;
        }
        match tts.synthesize_base64(text).await {
            Ok(payload) => Some(payload),
            Err(e) => {
                tracing::warn!(error = %e, "speech synthesis failed");
                None
            }
        }
    }
}

/// Consume a delta stream through a fresh [`ThinkFilter`].
///
/// Each non-empty visible fragment is forwarded to `chunks` (when present)
/// and accumulated; the result is trimmed of surrounding whitespace. The
/// filter state lives only for this call, so concurrent generations never
/// share scanner state. Dropping the stream on error releases the
/// underlying transport.
pub async fn consume_stream<S>(
    mut deltas: S,
    chunks: Option<&mpsc::Sender<String>>,
) -> Result<String>
where
    S: Stream<Item = Result<String>> + Unpin,
{
    let mut filter = ThinkFilter::new();
    let mut assembled = String::new();

    while let Some(delta) = deltas.next().await {
        let visible = filter.push(&delta?);
        if visible.is_empty() {
            continue;
        }
        if let Some(tx) = chunks {
            // A closed listener only stops live forwarding, not assembly
            let _ = tx.send(visible.clone()).await;
        }
        assembled.push_str(&visible);
    }

    let tail = filter.finish();
    if !tail.is_empty() {
        if let Some(tx) = chunks {
            let _ = tx.send(tail.clone()).await;
        }
        assembled.push_str(&tail);
    }

    Ok(assembled.trim().to_string())
}
