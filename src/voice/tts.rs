//! Text-to-speech (TTS) output

use crate::config::TtsConfig;
use crate::{Error, Result};

use super::playback::AudioPlayback;

/// Speaks responses to the user
///
/// A failed utterance is an error for the caller to log, never a reason
/// to kill the session.
pub trait SpeechOutput: Send {
    /// Synthesize and play one utterance, blocking until done
    ///
    /// # Errors
    ///
    /// Returns error when synthesis or playback fails.
    fn speak(&mut self, text: &str) -> Result<()>;
}

/// OpenAI-compatible TTS synthesis piped to the default output device
pub struct Speaker {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
    model: String,
    voice: String,
    speed: f32,
    playback: AudioPlayback,
}

impl Speaker {
    /// Create a speaker from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing or no output device exists
    pub fn new(config: &TtsConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Config("OpenAI API key required for TTS".to_string()))?;

        Ok(Self {
            client: reqwest::blocking::Client::new(),
            endpoint: config.endpoint.clone(),
            api_key,
            model: config.model.clone(),
            voice: config.voice.clone(),
            speed: config.speed,
            playback: AudioPlayback::new()?,
        })
    }

    /// Synthesize text to MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns error if the TTS backend is unreachable or rejects the text
    pub fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(Error::Output(format!("TTS error {status}: {body}")));
        }

        Ok(response.bytes()?.to_vec())
    }
}

impl SpeechOutput for Speaker {
    fn speak(&mut self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Ok(());
        }
        tracing::debug!(chars = text.len(), "synthesizing speech");
        let audio = self.synthesize(text)?;
        self.playback.play_mp3(&audio)
    }
}

/// Silent speech output for `--quiet` mode and tests
#[derive(Debug, Default)]
pub struct NullSpeech;

impl SpeechOutput for NullSpeech {
    fn speak(&mut self, text: &str) -> Result<()> {
        tracing::info!(response = %text, "speech suppressed");
        Ok(())
    }
}
