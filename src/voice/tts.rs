//! Text-to-speech (TTS) processing

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;

use crate::config::VoiceConfig;
use crate::{Error, Result};

/// Audio attachment for API responses: base64 body plus its MIME type
#[derive(Debug, Clone, Serialize)]
pub struct AudioPayload {
    pub audio_base64: String,
    pub audio_mime_type: String,
}

/// Synthesizes speech from text via the OpenAI speech API
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: String,
    model: String,
    voice: String,
    instructions: String,
    response_format: String,
}

impl TextToSpeech {
    /// Create a TTS instance from voice configuration
    #[must_use]
    pub fn new(api_key: &str, voice: &VoiceConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            model: voice.tts_model.clone(),
            voice: voice.tts_voice.clone(),
            instructions: voice.tts_instructions.clone(),
            response_format: voice.tts_format.trim().to_string(),
        }
    }

    /// Synthesize text to audio bytes
    ///
    /// # Errors
    ///
    /// Returns error if the synthesis request fails
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(Serialize)]
        struct SpeechRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            response_format: &'a str,
            #[serde(skip_serializing_if = "str::is_empty")]
            instructions: &'a str,
        }

        let request = SpeechRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            response_format: &self.response_format,
            instructions: self.instructions.trim(),
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/speech")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("speech API error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }

    /// Synthesize text and package it for a JSON response
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    pub async fn synthesize_base64(&self, text: &str) -> Result<AudioPayload> {
        let audio = self.synthesize(text).await?;
        Ok(AudioPayload {
            audio_base64: BASE64.encode(audio),
            audio_mime_type: self.mime_type(),
        })
    }

    /// MIME type of the configured response format
    #[must_use]
    pub fn mime_type(&self) -> String {
        mime_for_format(&self.response_format)
    }
}

/// Map a speech response format to its MIME type.
///
/// PCM is shipped to clients as WAV-compatible audio, matching what the
/// speech API produces for that format.
fn mime_for_format(format: &str) -> String {
    let fmt = format.trim().trim_start_matches('.').to_lowercase();
    if fmt.starts_with("audio/") {
        return fmt;
    }
    match fmt.as_str() {
        "mp3" | "mpeg" => "audio/mpeg".to_string(),
        "wav" | "wave" | "pcm" => "audio/wav".to_string(),
        "ogg" => "audio/ogg".to_string(),
        "aac" => "audio/aac".to_string(),
        "flac" => "audio/flac".to_string(),
        other => format!("audio/{other}"),
    }
}
