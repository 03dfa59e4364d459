//! Voice processing: speech synthesis and transcription
//!
//! Audio crosses this service as opaque bytes; capture and playback happen
//! in the client. Both backends are thin wrappers over hosted APIs.

pub mod stt;
pub mod tts;

pub use stt::SpeechToText;
pub use tts::{AudioPayload, TextToSpeech};
