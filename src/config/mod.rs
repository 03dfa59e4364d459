//! Configuration management for the tutor gateway
//!
//! Layered resolution: built-in defaults, then the optional config file,
//! then environment variables. Read once at startup and immutable for the
//! process lifetime; sessions capture their generation parameters at
//! creation and never observe later changes.

pub mod file;

use std::env;
use std::path::PathBuf;

use crate::{Error, Result};
use file::TutorConfigFile;

pub const DEFAULT_MODEL: &str = "qwen-3-32b";
pub const DEFAULT_BASE_URL: &str = "https://api.cerebras.ai/v1";
pub const DEFAULT_MAX_TOKENS: u32 = 40_960;
pub const DEFAULT_TEMPERATURE: f64 = 0.6;
pub const DEFAULT_TOP_P: f64 = 0.95;
pub const DEFAULT_PORT: u16 = 8501;

const DEFAULT_EXIT_PHRASES: &[&str] =
    &["quit", "exit", "stop", "goodbye", "good bye", "that's all"];

const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://localhost:5173",
    "http://127.0.0.1:3000",
    "http://127.0.0.1:5173",
];

/// Tutor gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// LLM completion settings
    pub llm: LlmConfig,

    /// Voice processing settings
    pub voice: VoiceConfig,

    /// API keys for external services
    pub api_keys: ApiKeys,

    /// HTTP server settings
    pub server: ServerConfig,

    /// Phrases that end the console chat loop (lowercase)
    pub exit_phrases: Vec<String>,
}

/// LLM completion settings
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Model identifier
    pub model: String,

    /// OpenAI-compatible endpoint base URL
    pub base_url: String,

    /// Max completion tokens per turn
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f64,

    /// Top-p sampling cutoff
    pub top_p: f64,

    /// System prompt (defaults to the built-in tutor prompt)
    pub system_prompt: String,

    /// Opening user message for new conversations
    pub opening_message: String,
}

/// Voice processing settings
///
/// The capture thresholds are hints served to clients that record audio;
/// this service never touches audio hardware itself.
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Enable voice endpoints and spoken replies
    pub enabled: bool,

    /// STT model for transcription
    pub stt_model: String,

    /// TTS model for synthesis
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS delivery instructions
    pub tts_instructions: String,

    /// TTS response format ("pcm", "mp3", ...)
    pub tts_format: String,

    /// Microphone energy threshold hint
    pub energy_threshold: u32,

    /// Silence duration that ends an utterance, seconds
    pub pause_threshold: f64,

    /// Hard cap on a single utterance, seconds
    pub phrase_time_limit: Option<u64>,
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// Completion API key (required)
    pub tutor: String,

    /// OpenAI key for Whisper STT and speech TTS (optional)
    pub openai: String,
}

/// HTTP server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Allowed CORS origins
    pub allowed_origins: Vec<String>,

    /// Allow any origin (development only)
    pub allow_all_origins: bool,
}

impl Config {
    /// Load configuration from defaults, config file, and environment
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the config file is malformed or a
    /// numeric environment variable fails to parse.
    pub fn load() -> Result<Self> {
        let file = load_config_file()?;
        Self::from_sources(&file)
    }

    /// Resolve configuration from an already-parsed file overlay plus the
    /// process environment
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a numeric environment variable fails
    /// to parse.
    pub fn from_sources(file: &TutorConfigFile) -> Result<Self> {
        let llm = LlmConfig {
            model: env_or("TUTOR_MODEL", file.llm.model.clone(), DEFAULT_MODEL),
            base_url: env_or("TUTOR_BASE_URL", file.llm.base_url.clone(), DEFAULT_BASE_URL),
            max_tokens: env_parsed("TUTOR_MAX_TOKENS", file.llm.max_tokens, DEFAULT_MAX_TOKENS)?,
            temperature: env_parsed("TUTOR_TEMPERATURE", file.llm.temperature, DEFAULT_TEMPERATURE)?,
            top_p: env_parsed("TUTOR_TOP_P", file.llm.top_p, DEFAULT_TOP_P)?,
            system_prompt: env_or(
                "TUTOR_SYSTEM_PROMPT",
                file.llm.system_prompt.clone(),
                crate::prompt::SYSTEM_PROMPT,
            ),
            opening_message: env_or(
                "TUTOR_OPENING_MESSAGE",
                file.llm.opening_message.clone(),
                crate::prompt::OPENING_MESSAGE,
            ),
        };

        let voice = VoiceConfig {
            enabled: env_flag("TUTOR_DISABLE_VOICE").map_or_else(
                || file.voice.enabled.unwrap_or(true),
                |disabled| !disabled,
            ),
            stt_model: env_or("TUTOR_STT_MODEL", file.voice.stt_model.clone(), "whisper-1"),
            tts_model: env_or("TUTOR_TTS_MODEL", file.voice.tts_model.clone(), "gpt-4o-mini-tts"),
            tts_voice: env_or("TUTOR_TTS_VOICE", file.voice.tts_voice.clone(), "nova"),
            tts_instructions: env_or(
                "TUTOR_TTS_INSTRUCTIONS",
                file.voice.tts_instructions.clone(),
                "Speak like a professor who is helpful, yet focused",
            ),
            tts_format: env_or("TUTOR_TTS_FORMAT", file.voice.tts_format.clone(), "pcm"),
            energy_threshold: env_parsed(
                "TUTOR_ENERGY_THRESHOLD",
                file.voice.energy_threshold,
                300,
            )?,
            pause_threshold: env_parsed("TUTOR_PAUSE_THRESHOLD", file.voice.pause_threshold, 0.8)?,
            phrase_time_limit: match env::var("TUTOR_PHRASE_TIME_LIMIT") {
                Ok(raw) if raw.trim().is_empty() => None,
                Ok(raw) => Some(raw.trim().parse().map_err(|_| {
                    Error::Config(format!("TUTOR_PHRASE_TIME_LIMIT: invalid integer {raw:?}"))
                })?),
                Err(_) => file.voice.phrase_time_limit.or(Some(12)),
            },
        };

        let api_keys = ApiKeys {
            tutor: env_or("TUTOR_API_KEY", file.api_keys.tutor.clone(), ""),
            openai: env_or("OPENAI_API_KEY", file.api_keys.openai.clone(), ""),
        };

        let server = ServerConfig {
            port: env_parsed("TUTOR_PORT", file.server.port, DEFAULT_PORT)?,
            allowed_origins: comma_env("TUTOR_ALLOWED_ORIGINS").unwrap_or_else(|| {
                file.server.allowed_origins.clone().unwrap_or_else(|| {
                    DEFAULT_ALLOWED_ORIGINS.iter().map(ToString::to_string).collect()
                })
            }),
            allow_all_origins: env_flag("TUTOR_ALLOW_ALL_ORIGINS")
                .unwrap_or_else(|| file.server.allow_all_origins.unwrap_or(false)),
        };

        let exit_phrases = comma_env("TUTOR_EXIT_PHRASES")
            .or_else(|| file.exit_phrases.clone())
            .unwrap_or_else(|| DEFAULT_EXIT_PHRASES.iter().map(ToString::to_string).collect())
            .into_iter()
            .map(|p| p.to_lowercase())
            .collect();

        Ok(Self {
            llm,
            voice,
            api_keys,
            server,
            exit_phrases,
        })
    }

    /// Validate that the configuration can serve sessions
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the completion API key is missing.
    /// This is the only error class that should terminate the process.
    pub fn validate(&self) -> Result<()> {
        if self.api_keys.tutor.is_empty() {
            return Err(Error::Config(
                "missing TUTOR_API_KEY (set the env var or api_keys.tutor in config.toml)"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Whether spoken replies can be produced at all
    #[must_use]
    pub fn tts_available(&self) -> bool {
        self.voice.enabled && !self.api_keys.openai.is_empty()
    }
}

/// Path to the persistent config file, if a home directory exists
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| dirs.config_dir().join("tutor").join("config.toml"))
}

fn load_config_file() -> Result<TutorConfigFile> {
    let Some(path) = config_file_path() else {
        return Ok(TutorConfigFile::default());
    };
    if !path.exists() {
        return Ok(TutorConfigFile::default());
    }

    tracing::debug!(path = %path.display(), "loading config file");
    let raw = std::fs::read_to_string(&path)?;
    toml::from_str(&raw)
        .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
}

fn env_or(name: &str, file_value: Option<String>, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or(file_value)
        .unwrap_or_else(|| default.to_string())
}

fn env_parsed<T>(name: &str, file_value: Option<T>, default: T) -> Result<T>
where
    T: std::str::FromStr,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{name}: invalid value {raw:?}"))),
        _ => Ok(file_value.unwrap_or(default)),
    }
}

fn env_flag(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

/// Parse a comma-separated env var into trimmed, non-empty entries
fn comma_env(name: &str) -> Option<Vec<String>> {
    let raw = env::var(name).ok()?;
    let parts: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(ToString::to_string)
        .collect();
    if parts.is_empty() { None } else { Some(parts) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_hosted_api() {
        let config = Config::from_sources(&TutorConfigFile::default()).unwrap();
        assert_eq!(config.llm.model, DEFAULT_MODEL);
        assert_eq!(config.llm.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.llm.max_tokens, DEFAULT_MAX_TOKENS);
        assert!((config.llm.temperature - DEFAULT_TEMPERATURE).abs() < f64::EPSILON);
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert!(config.exit_phrases.contains(&"quit".to_string()));
        assert_eq!(config.voice.phrase_time_limit, Some(12));
    }

    #[test]
    fn file_values_override_defaults() {
        let file: TutorConfigFile = toml::from_str(
            r#"
            [llm]
            model = "llama-3.3-70b"
            max_tokens = 2048

            [server]
            port = 9000
            allow_all_origins = true
            "#,
        )
        .unwrap();

        let config = Config::from_sources(&file).unwrap();
        assert_eq!(config.llm.model, "llama-3.3-70b");
        assert_eq!(config.llm.max_tokens, 2048);
        assert_eq!(config.server.port, 9000);
        assert!(config.server.allow_all_origins);
    }

    #[test]
    fn validate_requires_api_key() {
        let mut config = Config::from_sources(&TutorConfigFile::default()).unwrap();
        config.api_keys.tutor = String::new();
        assert!(config.validate().is_err());

        config.api_keys.tutor = "csk-test".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn exit_phrases_are_lowercased() {
        let file: TutorConfigFile = toml::from_str(r#"exit_phrases = ["Quit", "STOP"]"#).unwrap();
        let config = Config::from_sources(&file).unwrap();
        assert_eq!(config.exit_phrases, vec!["quit", "stop"]);
    }
}
