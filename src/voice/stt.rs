//! Speech-to-text (STT) processing

use crate::config::SttConfig;
use crate::{Error, Result};

use super::capture::{samples_to_wav, Recording};

/// Recordings quieter than this are treated as silence without a
/// network round trip
const SILENCE_FLOOR: f32 = 0.005;

/// Response from OpenAI Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Result of transcribing one recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub text: String,
}

impl Transcript {
    /// Transcript for silence or an unusable recording
    #[must_use]
    pub fn empty() -> Self {
        Self {
            text: String::new(),
        }
    }

    /// True when there is no usable text
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Turns a recording into text
pub trait Transcriber: Send {
    /// Transcribe a finished recording
    ///
    /// # Errors
    ///
    /// Returns error when the backend is unreachable or rejects the audio.
    fn transcribe(&self, recording: &Recording) -> Result<Transcript>;
}

/// Whisper-compatible HTTP transcription backend
pub struct WhisperStt {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl WhisperStt {
    /// Create a Whisper client from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing
    pub fn new(config: &SttConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                Error::Config("OpenAI API key required for Whisper".to_string())
            })?;

        Ok(Self {
            client: reqwest::blocking::Client::new(),
            endpoint: config.endpoint.clone(),
            api_key,
            model: config.model.clone(),
        })
    }
}

impl Transcriber for WhisperStt {
    fn transcribe(&self, recording: &Recording) -> Result<Transcript> {
        if recording.samples.is_empty() || recording.rms() < SILENCE_FLOOR {
            tracing::debug!("recording is silent, skipping transcription");
            return Ok(Transcript::empty());
        }

        let audio = samples_to_wav(&recording.samples, recording.sample_rate)?;
        tracing::debug!(audio_bytes = audio.len(), "starting Whisper transcription");

        let form = reqwest::blocking::multipart::Form::new()
            .part(
                "file",
                reqwest::blocking::multipart::Part::bytes(audio)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Transcription(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .map_err(|e| {
                tracing::error!(error = %e, "Whisper request failed");
                e
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Transcription(format!(
                "Whisper API error {status}: {body}"
            )));
        }

        let result: WhisperResponse = response.json().map_err(|e| {
            tracing::error!(error = %e, "failed to parse response");
            e
        })?;

        tracing::info!(transcript = %result.text, "transcription complete");
        Ok(Transcript {
            text: result.text,
        })
    }
}
