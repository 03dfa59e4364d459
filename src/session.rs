//! Session registry and per-session state
//!
//! Sessions live in process memory for the process lifetime and are
//! destroyed only by an explicit reset. The registry owns both the session
//! map and the uploaded study-material store; the material for an id is
//! folded into the session's system prompt once, at true creation.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard, RwLock};

use crate::history::{History, Message};
use crate::llm::GenerationParams;
use crate::prompt;

/// One conversation session
///
/// Generation parameters are captured at creation and immutable afterwards.
/// The turn gate serializes turns on this session; turns on different
/// sessions run fully in parallel.
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    params: GenerationParams,
    history: Mutex<History>,
    turn_gate: Mutex<()>,
}

impl Session {
    fn new(id: String, system_prompt: String, params: GenerationParams) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            params,
            history: Mutex::new(History::with_system_prompt(system_prompt)),
            turn_gate: Mutex::new(()),
        }
    }

    /// Frozen generation parameters for this session
    #[must_use]
    pub const fn params(&self) -> &GenerationParams {
        &self.params
    }

    /// Acquire the turn gate; hold the guard for the whole turn
    pub async fn begin_turn(&self) -> MutexGuard<'_, ()> {
        self.turn_gate.lock().await
    }

    /// Full message list for a model request, system message included
    pub async fn request_messages(&self) -> Vec<Message> {
        self.history.lock().await.request_messages().to_vec()
    }

    /// Display snapshot, system messages excluded
    pub async fn snapshot(&self) -> Vec<Message> {
        self.history.lock().await.snapshot()
    }

    /// Record a completed turn atomically
    pub async fn record_turn(&self, user: Message, assistant: Message) {
        self.history.lock().await.record_turn(user, assistant);
    }

    /// Number of stored messages, system message included
    pub async fn message_count(&self) -> usize {
        self.history.lock().await.len()
    }
}

/// Process-wide mapping from session id to session
///
/// All access goes through this registry object; there is no module-level
/// shared state.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    materials: RwLock<HashMap<String, String>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the session for `id`, creating it on first sight.
    ///
    /// On true creation, study material previously stored for `id` is
    /// folded into the system prompt. For an existing session the stored
    /// material is ignored: auxiliary context is fixed at creation time.
    pub async fn get_or_create(
        &self,
        id: &str,
        base_prompt: &str,
        params: GenerationParams,
    ) -> Arc<Session> {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get(id) {
            return Arc::clone(session);
        }

        let material = self.materials.read().await.get(id).cloned();
        let system_prompt = prompt::fold_material(base_prompt, material.as_deref());
        let session = Arc::new(Session::new(id.to_string(), system_prompt, params));
        sessions.insert(id.to_string(), Arc::clone(&session));
        tracing::info!(session_id = %id, has_material = material.is_some(), "created session");
        session
    }

    /// Look up an existing session
    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Destroy a session and its stored material irreversibly.
    ///
    /// Returns whether anything was removed.
    pub async fn destroy(&self, id: &str) -> bool {
        let removed_session = self.sessions.write().await.remove(id).is_some();
        let removed_material = self.materials.write().await.remove(id).is_some();
        if removed_session {
            tracing::info!(session_id = %id, "destroyed session");
        }
        removed_session || removed_material
    }

    /// Store uploaded study material for a not-yet-created session
    pub async fn store_material(&self, id: &str, text: String) {
        tracing::debug!(session_id = %id, bytes = text.len(), "stored study material");
        self.materials.write().await.insert(id.to_string(), text);
    }

    /// Stored study material for `id`, if any
    pub async fn material(&self, id: &str) -> Option<String> {
        self.materials.read().await.get(id).cloned()
    }

    /// Number of live sessions
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> GenerationParams {
        GenerationParams {
            model: "qwen-3-32b".to_string(),
            max_completion_tokens: 1024,
            temperature: 0.6,
            top_p: 0.95,
        }
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let registry = SessionRegistry::new();

        let first = registry.get_or_create("s1", "base", params()).await;
        let second = registry.get_or_create("s1", "other base", params()).await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.session_count().await, 1);
    }

    #[tokio::test]
    async fn material_is_folded_only_at_creation() {
        let registry = SessionRegistry::new();
        registry.store_material("s1", "mitochondria notes".to_string()).await;

        let session = registry.get_or_create("s1", "base", params()).await;
        let messages = session.request_messages().await;
        assert!(messages[0].content.contains("mitochondria notes"));

        // Material supplied after creation is ignored
        registry.store_material("s1", "late material".to_string()).await;
        let same = registry.get_or_create("s1", "base", params()).await;
        let messages = same.request_messages().await;
        assert!(!messages[0].content.contains("late material"));
    }

    #[tokio::test]
    async fn destroy_removes_session_and_material() {
        let registry = SessionRegistry::new();
        registry.store_material("s1", "notes".to_string()).await;
        registry.get_or_create("s1", "base", params()).await;

        assert!(registry.destroy("s1").await);
        assert!(registry.get("s1").await.is_none());
        assert!(registry.material("s1").await.is_none());
        assert!(!registry.destroy("s1").await);
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let registry = SessionRegistry::new();
        let a = registry.get_or_create("a", "base", params()).await;
        let b = registry.get_or_create("b", "base", params()).await;

        a.record_turn(Message::user("qa"), Message::assistant("ra")).await;
        b.record_turn(Message::user("qb"), Message::assistant("rb")).await;

        let snap_a = a.snapshot().await;
        let snap_b = b.snapshot().await;
        assert_eq!(snap_a[0].content, "qa");
        assert_eq!(snap_b[0].content, "qb");
    }
}
