//! In-memory conversation history
//!
//! Messages live in process memory for the lifetime of their session; there
//! is no persistence across restarts.

use chrono::{DateTime, Utc};

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single conversation message
///
/// Content is plain text, normalized at ingestion; it is never mutated
/// after creation.
#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Append-only ordered message sequence owned by one session
///
/// Holds at most one system message, always first. Messages are never
/// edited, reordered, or removed; the only way to discard history is to
/// destroy the owning session.
#[derive(Debug, Default)]
pub struct History {
    messages: Vec<Message>,
}

impl History {
    /// Create an empty history
    #[must_use]
    pub const fn new() -> Self {
        Self { messages: Vec::new() }
    }

    /// Create a history seeded with a system message
    #[must_use]
    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(prompt)],
        }
    }

    /// Append a single message
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Record one completed turn: user message and assistant reply together
    ///
    /// Turns are recorded as a unit so a reader never observes a user
    /// message without its assistant counterpart.
    pub fn record_turn(&mut self, user: Message, assistant: Message) {
        self.messages.push(user);
        self.messages.push(assistant);
    }

    /// All messages in order, system message included (request payload)
    #[must_use]
    pub fn request_messages(&self) -> &[Message] {
        &self.messages
    }

    /// Display snapshot: all messages in order, system messages excluded
    #[must_use]
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|m| m.role != Role::System)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_is_first_message() {
        let history = History::with_system_prompt("You are a tutor.");
        assert_eq!(history.len(), 1);
        assert_eq!(history.request_messages()[0].role, Role::System);
    }

    #[test]
    fn turns_append_in_order() {
        let mut history = History::with_system_prompt("sys");
        history.record_turn(Message::user("q1"), Message::assistant("a1"));
        history.record_turn(Message::user("q2"), Message::assistant("a2"));

        // 2 turns over a system prompt: 2 * 2 + 1 messages
        assert_eq!(history.len(), 5);
        let roles: Vec<Role> = history.request_messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
    }

    #[test]
    fn snapshot_excludes_system_messages() {
        let mut history = History::with_system_prompt("sys");
        history.record_turn(Message::user("hello"), Message::assistant("hi"));

        let snapshot = history.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.iter().all(|m| m.role != Role::System));
        assert_eq!(snapshot[0].content, "hello");
        assert_eq!(snapshot[1].content, "hi");
    }

    #[test]
    fn empty_history_without_system_prompt() {
        let history = History::new();
        assert!(history.is_empty());
        assert!(history.snapshot().is_empty());
    }
}
