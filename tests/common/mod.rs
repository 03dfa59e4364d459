//! Shared test utilities

use std::sync::Arc;

use tutor_gateway::config::file::TutorConfigFile;
use tutor_gateway::{Config, ConversationEngine};

/// Build a config suitable for tests (no network credentials required)
#[must_use]
pub fn test_config() -> Config {
    let mut config =
        Config::from_sources(&TutorConfigFile::default()).expect("failed to build test config");
    config.api_keys.tutor = "test-key".to_string();
    config.voice.enabled = false;
    config
}

/// Build an engine over the test config
#[must_use]
pub fn test_engine() -> Arc<ConversationEngine> {
    Arc::new(ConversationEngine::new(Arc::new(test_config())))
}
