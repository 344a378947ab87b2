//! Voice processing
//!
//! Audio capture, wake-word detection, transcription, synthesis, and
//! playback. The session worker owns all of these for the lifetime of a
//! session; nothing here is shared across threads.

mod capture;
mod playback;
mod stt;
mod tts;
mod wake;

pub use capture::{samples_to_wav, AudioSource, MicCapture, Recording, SourceFactory};
pub use playback::AudioPlayback;
pub use stt::{Transcriber, Transcript, WhisperStt};
pub use tts::{NullSpeech, Speaker, SpeechOutput};
pub use wake::{build_detector, DetectionResult, WakeDetector};

/// RMS energy of a slice of PCM samples
#[must_use]
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let mean_square = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    mean_square.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_of_silence_is_zero() {
        assert_eq!(rms(&[]), 0.0);
        assert!(rms(&[0.0; 256]) < 1e-6);
    }

    #[test]
    fn rms_of_constant_signal() {
        let signal = vec![0.5f32; 256];
        assert!((rms(&signal) - 0.5).abs() < 1e-6);
    }
}
