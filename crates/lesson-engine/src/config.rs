use crate::narration::VoiceSettings;
use crate::session::Script;
use crate::viseme::FRAME_PERIOD;
use std::time::Duration;

/// A custom error type for client configuration failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Everything a host application needs to run a lesson engine.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL of the lesson backend, without a trailing path.
    pub base_url: String,
    pub voice: VoiceSettings,
    pub frame_period: Duration,
    pub script: Script,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            voice: VoiceSettings::default(),
            frame_period: FRAME_PERIOD,
            script: Script::default(),
        }
    }
}

impl ClientConfig {
    /// Loads overrides from environment variables on top of the defaults.
    ///
    /// `LESSON_API_URL` sets the backend address and `LESSON_SPEECH_RATE`
    /// the narration rate.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let mut config = Self::default();

        if let Ok(base_url) = std::env::var("LESSON_API_URL") {
            let base_url = base_url.trim().trim_end_matches('/');
            if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
                return Err(ConfigError::InvalidValue(
                    "LESSON_API_URL".to_string(),
                    format!("'{base_url}' is not an http(s) URL"),
                ));
            }
            config.base_url = base_url.to_string();
        }

        if let Ok(rate_str) = std::env::var("LESSON_SPEECH_RATE") {
            let rate = rate_str
                .parse::<f32>()
                .ok()
                .filter(|rate| *rate > 0.0)
                .ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "LESSON_SPEECH_RATE".to_string(),
                        format!("'{rate_str}' is not a positive number"),
                    )
                })?;
            config.voice.rate = rate;
        }

        Ok(config)
    }
}
