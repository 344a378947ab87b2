//! Configuration management for hark
//!
//! Configuration is a read-only struct loaded once at startup from a TOML
//! file, with defaults for every field so a missing file still yields a
//! working (degraded) assistant. API keys may also come from the
//! environment so they stay out of config files.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;

use crate::{Error, Result};

/// Ordered intent vocabulary: intent name to canonical trigger phrases.
///
/// Declaration order matters: the classifier breaks score ties in favor of
/// the earliest declared intent.
pub type Vocabulary = IndexMap<String, Vec<String>>;

/// The reserved intent whose phrases are the only ones permitted to stop
/// the session from inside the pipeline.
pub const STOP_INTENT: &str = "stop_session";

/// hark configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Wake-word detection
    pub wake: WakeConfig,

    /// Speech-to-text
    pub stt: SttConfig,

    /// Intent classification
    pub intent: IntentConfig,

    /// Text-to-speech output
    pub tts: TtsConfig,

    /// Audio capture
    pub audio: AudioConfig,

    /// Session lifecycle
    pub session: SessionConfig,
}

/// Wake-word detection method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WakeMethod {
    /// Commercial keyword-spotting engine (requires an access key)
    KeywordSpotter,
    /// Voice-activity detection: triggers on any sustained speech
    VoiceActivity,
    /// Plain energy gate, always available
    BuiltInFallback,
}

/// Wake-word detector configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WakeConfig {
    /// Detection method
    pub method: WakeMethod,

    /// Wake phrase the assistant answers to
    pub phrase: String,

    /// Access key for the keyword-spotting engine (env: `HARK_WAKE_ACCESS_KEY`)
    pub access_key: Option<String>,

    /// Path to a custom keyword model for the configured phrase
    pub keyword_path: Option<PathBuf>,

    /// Fall back to the built-in detector when the configured method fails
    /// to initialize
    pub fallback_enabled: bool,

    /// RMS energy threshold for the voice-activity variants
    pub energy_threshold: f32,

    /// Bounded retries for detector initialization
    pub init_retries: u32,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            method: WakeMethod::VoiceActivity,
            phrase: "hey hark".to_string(),
            access_key: None,
            keyword_path: None,
            fallback_enabled: true,
            energy_threshold: 0.01,
            init_retries: 3,
        }
    }
}

/// Speech-to-text configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SttConfig {
    /// Whisper model identifier (e.g. "whisper-1")
    pub model: String,

    /// Transcription endpoint
    pub endpoint: String,

    /// API key (env: `OPENAI_API_KEY`)
    pub api_key: Option<String>,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: "whisper-1".to_string(),
            endpoint: "https://api.openai.com/v1/audio/transcriptions".to_string(),
            api_key: None,
        }
    }
}

/// Intent classification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IntentConfig {
    /// Acceptance threshold on the 0-100 fuzzy score scale
    pub threshold: f32,

    /// Optional TOML file overriding the built-in vocabulary
    pub vocabulary_path: Option<PathBuf>,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            threshold: 70.0,
            vocabulary_path: None,
        }
    }
}

/// Text-to-speech configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TtsConfig {
    /// Enable spoken responses
    pub enabled: bool,

    /// TTS model identifier
    pub model: String,

    /// Voice identifier
    pub voice: String,

    /// Speed multiplier (0.25 to 4.0)
    pub speed: f32,

    /// Synthesis endpoint
    pub endpoint: String,

    /// API key (env: `OPENAI_API_KEY`)
    pub api_key: Option<String>,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "tts-1".to_string(),
            voice: "nova".to_string(),
            speed: 1.0,
            endpoint: "https://api.openai.com/v1/audio/speech".to_string(),
            api_key: None,
        }
    }
}

/// Audio capture configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AudioConfig {
    /// Capture sample rate in Hz
    pub sample_rate: u32,

    /// Samples per detector frame
    pub frame_size: usize,

    /// Maximum command recording length in seconds
    pub record_max_secs: f32,

    /// Trailing silence that ends a recording early, in seconds
    pub silence_timeout_secs: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            frame_size: 512,
            record_max_secs: 5.0,
            silence_timeout_secs: 1.5,
        }
    }
}

/// Session lifecycle configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Liveness heartbeat interval while idle-listening, in seconds
    pub heartbeat_secs: u64,

    /// Bounded retries for opening the audio device
    pub audio_open_retries: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: 30,
            audio_open_retries: 3,
        }
    }
}

impl Config {
    /// Load configuration from an explicit path, or from the default
    /// location (`~/.config/hark/hark.toml` on Linux). A missing file
    /// yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => default_config_path(),
        };

        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            let config: Self = toml::from_str(&raw)?;
            tracing::info!(path = %path.display(), "loaded configuration");
            config
        } else {
            tracing::info!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Fill API keys from the environment when the file left them unset
    fn apply_env(&mut self) {
        if self.wake.access_key.is_none() {
            self.wake.access_key = std::env::var("HARK_WAKE_ACCESS_KEY").ok();
        }
        if self.stt.api_key.is_none() {
            self.stt.api_key = std::env::var("OPENAI_API_KEY").ok();
        }
        if self.tts.api_key.is_none() {
            self.tts.api_key = std::env::var("OPENAI_API_KEY").ok();
        }
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.intent.threshold) {
            return Err(Error::Config(format!(
                "intent.threshold must be within 0-100, got {}",
                self.intent.threshold
            )));
        }
        if self.audio.frame_size == 0 {
            return Err(Error::Config("audio.frame_size must be non-zero".into()));
        }
        if self.audio.record_max_secs <= 0.0 {
            return Err(Error::Config("audio.record_max_secs must be positive".into()));
        }
        Ok(())
    }

    /// Load the intent vocabulary: the built-in table, or the configured
    /// override file. The reserved `stop_session` intent is always present.
    ///
    /// # Errors
    ///
    /// Returns error if the override file cannot be read or parsed.
    pub fn vocabulary(&self) -> Result<Vocabulary> {
        let mut vocab = match &self.intent.vocabulary_path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                let vocab: Vocabulary = toml::from_str(&raw)?;
                tracing::info!(path = %path.display(), intents = vocab.len(), "loaded vocabulary");
                vocab
            }
            None => crate::intent::default_vocabulary(),
        };

        if !vocab.contains_key(STOP_INTENT) {
            vocab.insert(
                STOP_INTENT.to_string(),
                vec!["stop the agent".to_string(), "shut down".to_string()],
            );
        }
        Ok(vocab)
    }
}

/// Default config file path (`~/.config/hark/hark.toml` on Linux)
#[must_use]
pub fn default_config_path() -> PathBuf {
    directories::ProjectDirs::from("dev", "hark", "hark").map_or_else(
        || PathBuf::from("hark.toml"),
        |d| d.config_dir().join("hark.toml"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.intent.threshold, 70.0);
        assert_eq!(config.audio.sample_rate, 16_000);
        assert_eq!(config.session.heartbeat_secs, 30);
        assert_eq!(config.wake.method, WakeMethod::VoiceActivity);
    }

    #[test]
    fn parses_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[wake]
method = "built-in-fallback"
phrase = "hey hark"

[intent]
threshold = 80.0
"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.wake.method, WakeMethod::BuiltInFallback);
        assert_eq!(config.intent.threshold, 80.0);
        // Untouched sections keep their defaults
        assert_eq!(config.audio.frame_size, 512);
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[intent]\nthreshold = 250.0\n").unwrap();
        assert!(Config::load(Some(file.path())).is_err());
    }

    #[test]
    fn vocabulary_always_has_stop_intent() {
        let config = Config::default();
        let vocab = config.vocabulary().unwrap();
        assert!(vocab.contains_key(STOP_INTENT));
        assert!(vocab[STOP_INTENT].iter().any(|p| p == "stop the agent"));
    }

    #[test]
    fn vocabulary_override_preserves_declaration_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
zebra = ["stripes"]
apple = ["fruit"]
"#
        )
        .unwrap();

        let config = Config {
            intent: IntentConfig {
                vocabulary_path: Some(file.path().to_path_buf()),
                ..IntentConfig::default()
            },
            ..Config::default()
        };
        let vocab = config.vocabulary().unwrap();
        let keys: Vec<&str> = vocab.keys().map(String::as_str).collect();
        assert_eq!(&keys[..2], &["zebra", "apple"]);
        assert_eq!(*keys.last().unwrap(), STOP_INTENT);
    }
}
