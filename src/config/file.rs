//! TOML configuration file loading
//!
//! Supports `~/.config/tutor/config.toml` as a persistent config source.
//! Every field is optional: the file is a partial overlay on top of
//! defaults, and environment variables override both.

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct TutorConfigFile {
    /// LLM configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Exit phrases for the console chat loop
    #[serde(default)]
    pub exit_phrases: Option<Vec<String>>,
}

/// LLM-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Model identifier (e.g. "qwen-3-32b")
    pub model: Option<String>,

    /// Endpoint base URL override
    pub base_url: Option<String>,

    /// Max completion tokens per turn
    pub max_tokens: Option<u32>,

    /// Sampling temperature
    pub temperature: Option<f64>,

    /// Top-p sampling cutoff
    pub top_p: Option<f64>,

    /// System prompt override
    pub system_prompt: Option<String>,

    /// Opening user message override
    pub opening_message: Option<String>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Enable voice endpoints
    pub enabled: Option<bool>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// TTS model (e.g. "gpt-4o-mini-tts")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "nova")
    pub tts_voice: Option<String>,

    /// TTS delivery instructions
    pub tts_instructions: Option<String>,

    /// TTS response format (e.g. "pcm", "mp3")
    pub tts_format: Option<String>,

    /// Capture energy threshold hint for clients
    pub energy_threshold: Option<u32>,

    /// Capture pause threshold hint, seconds
    pub pause_threshold: Option<f64>,

    /// Capture phrase time limit hint, seconds
    pub phrase_time_limit: Option<u64>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    /// Completion API key
    pub tutor: Option<String>,

    /// OpenAI key for Whisper STT and speech TTS
    pub openai: Option<String>,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// API server port
    pub port: Option<u16>,

    /// Allowed CORS origins
    pub allowed_origins: Option<Vec<String>>,

    /// Allow any origin (development only)
    pub allow_all_origins: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_file() {
        let file: TutorConfigFile = toml::from_str(
            r#"
            [llm]
            model = "qwen-3-32b"
            temperature = 0.4

            [voice]
            enabled = true
            tts_voice = "nova"
            "#,
        )
        .unwrap();

        assert_eq!(file.llm.model.as_deref(), Some("qwen-3-32b"));
        assert_eq!(file.llm.temperature, Some(0.4));
        assert_eq!(file.voice.enabled, Some(true));
        assert!(file.server.port.is_none());
        assert!(file.exit_phrases.is_none());
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let file: TutorConfigFile = toml::from_str("").unwrap();
        assert!(file.llm.model.is_none());
        assert!(file.api_keys.tutor.is_none());
    }
}
