//! Runtime configuration for the client.
//!
//! Plain defaultable structs with environment overrides; no config files.

use crate::speech::CaptureTimings;
use std::env;

/// Configuration for the interpretation service client.
#[derive(Clone, Debug)]
pub struct ChatConfig {
    /// Endpoint accepting the interpretation POST.
    pub endpoint: String,

    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Overall request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8787/api/interpret".to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 60,
        }
    }
}

/// A transcription service the speech engine can be constructed against.
///
/// The two default providers expose the same wire API; the availability
/// probe picks the first one that is usable on this machine.
#[derive(Clone, Debug)]
pub struct TranscriptionProvider {
    pub id: String,
    pub label: String,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub requires_key: bool,
}

impl TranscriptionProvider {
    pub fn is_configured(&self) -> bool {
        if self.base_url.trim().is_empty() {
            return false;
        }
        if self.requires_key {
            return self
                .api_key
                .as_deref()
                .map(|k| !k.trim().is_empty())
                .unwrap_or(false);
        }
        true
    }
}

/// Configuration for the speech capture subsystem.
#[derive(Clone, Debug)]
pub struct SpeechConfig {
    /// Candidate providers, probed in order.
    pub providers: Vec<TranscriptionProvider>,

    /// Transcription language hint.
    pub language: String,

    /// Speech probability threshold for voice activity detection.
    pub vad_threshold: f32,

    /// Trailing silence that ends one utterance inside the engine.
    pub utterance_silence_ms: u64,

    /// Controller timings (silence threshold, poll, restart debounce).
    pub timings: CaptureTimings,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            providers: vec![
                TranscriptionProvider {
                    id: "hosted".to_string(),
                    label: "Hosted transcription".to_string(),
                    base_url: String::new(),
                    model: "whisper-1".to_string(),
                    api_key: None,
                    requires_key: true,
                },
                TranscriptionProvider {
                    id: "local".to_string(),
                    label: "Local transcription server".to_string(),
                    base_url: "http://127.0.0.1:8000/v1".to_string(),
                    model: "whisper-1".to_string(),
                    api_key: None,
                    requires_key: false,
                },
            ],
            language: "en".to_string(),
            vad_threshold: 0.5,
            utterance_silence_ms: 800,
            timings: CaptureTimings::default(),
        }
    }
}

/// Top-level application configuration.
#[derive(Clone, Debug, Default)]
pub struct AppConfig {
    pub chat: ChatConfig,
    pub speech: SpeechConfig,
}

impl AppConfig {
    /// Defaults overridden by `REVERIE_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(endpoint) = env::var("REVERIE_CHAT_ENDPOINT") {
            config.chat.endpoint = endpoint;
        }
        if let Ok(url) = env::var("REVERIE_STT_URL") {
            if let Some(hosted) = config.speech.providers.iter_mut().find(|p| p.id == "hosted") {
                hosted.base_url = url;
            }
        }
        if let Ok(key) = env::var("REVERIE_STT_API_KEY") {
            if let Some(hosted) = config.speech.providers.iter_mut().find(|p| p.id == "hosted") {
                hosted.api_key = Some(key);
            }
        }
        if let Ok(url) = env::var("REVERIE_STT_FALLBACK_URL") {
            if let Some(local) = config.speech.providers.iter_mut().find(|p| p.id == "local") {
                local.base_url = url;
            }
        }

        config
    }
}
