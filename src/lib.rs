//! Tutor Gateway - voice and text gateway for an AI tutoring assistant
//!
//! This library provides the core functionality for the tutor gateway:
//! - Streamed chat completions with hidden-reasoning filtering
//! - Per-session conversation history and lifecycle
//! - Speech synthesis and transcription plumbing
//! - HTTP/WebSocket API surface
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  Interfaces                      │
//! │     HTTP API   │   WebSocket   │   Console      │
//! └───────────────────────┬─────────────────────────┘
//!                         │
//! ┌───────────────────────▼─────────────────────────┐
//! │              Conversation Engine                 │
//! │  Sessions │ History │ Think Filter │ TTS/STT    │
//! └───────────────────────┬─────────────────────────┘
//!                         │
//! ┌───────────────────────▼─────────────────────────┐
//! │        Hosted LLM API (SSE completions)          │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod history;
pub mod llm;
pub mod prompt;
pub mod session;
pub mod voice;

pub use api::ApiServer;
pub use config::Config;
pub use engine::ConversationEngine;
pub use error::{Error, Result};
pub use filter::ThinkFilter;
pub use history::{History, Message, Role};
pub use llm::{ChatClient, GenerationParams};
pub use session::{Session, SessionRegistry};
