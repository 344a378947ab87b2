//! Audio capture from microphone
//!
//! One exclusive input stream per session, serving two consumers without
//! reopening the device: the continuous per-frame feed for the wake
//! detector, and bounded recordings for transcription.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};

use crate::{Error, Result};

/// Amplitude below which a sample counts as silence when trimming
const TRIM_THRESHOLD: f32 = 0.01;

/// A bounded recording of mono PCM, owned by one command cycle
#[derive(Debug, Clone)]
pub struct Recording {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Recording {
    /// Recording length in seconds
    #[must_use]
    pub fn duration_secs(&self) -> f32 {
        #[allow(clippy::cast_precision_loss)]
        let secs = self.samples.len() as f32 / self.sample_rate as f32;
        secs
    }

    /// RMS energy over the whole recording
    #[must_use]
    pub fn rms(&self) -> f32 {
        super::rms(&self.samples)
    }
}

/// Supplies audio frames and bounded recordings from one input stream
///
/// Implementations are constructed on the session worker thread (cpal
/// streams are not `Send`) via a [`SourceFactory`].
pub trait AudioSource {
    /// Open the exclusive input stream
    ///
    /// # Errors
    ///
    /// `Error::AudioUnavailable` when no device exists, permission is
    /// denied, or the device is already held by another session.
    fn open(&mut self) -> Result<()>;

    /// Next fixed-size frame for the detector; waits at most about one
    /// frame duration for samples to arrive
    ///
    /// # Errors
    ///
    /// Returns error if the stream has failed.
    fn next_frame(&mut self, len: usize) -> Result<Vec<f32>>;

    /// Capture a bounded recording: stops at `max`, or earlier once speech
    /// has been heard and `silence_timeout` of trailing silence follows
    ///
    /// # Errors
    ///
    /// Returns error if the stream has failed.
    fn record(&mut self, max: Duration, silence_timeout: Duration) -> Result<Recording>;

    /// Release the stream; idempotent, called on every exit path
    fn close(&mut self);

    fn sample_rate(&self) -> u32;
}

/// Constructs an [`AudioSource`] on the worker thread
pub type SourceFactory = Box<dyn FnOnce() -> Result<Box<dyn AudioSource>> + Send>;

/// Microphone capture over the default cpal input device
pub struct MicCapture {
    sample_rate: u32,
    buffer: Arc<Mutex<Vec<f32>>>,
    pending: VecDeque<f32>,
    stream: Option<Stream>,
}

impl MicCapture {
    #[must_use]
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            buffer: Arc::new(Mutex::new(Vec::new())),
            pending: VecDeque::new(),
            stream: None,
        }
    }

    /// Drain everything the callback has appended since the last call
    fn take_captured(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }

    fn frame_duration(&self, len: usize) -> Duration {
        Duration::from_secs_f64(len as f64 / f64::from(self.sample_rate))
    }
}

impl AudioSource for MicCapture {
    fn open(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::AudioUnavailable("no input device available".to_string()))?;

        let supported = device
            .supported_input_configs()
            .map_err(|e| Error::AudioUnavailable(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(self.sample_rate)
                    && c.max_sample_rate() >= SampleRate(self.sample_rate)
            })
            .ok_or_else(|| {
                Error::AudioUnavailable(format!(
                    "no mono input config at {} Hz",
                    self.sample_rate
                ))
            })?;

        let config: StreamConfig = supported.with_sample_rate(SampleRate(self.sample_rate)).config();
        let buffer = Arc::clone(&self.buffer);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    // Callback only appends; all policy lives on the worker.
                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend_from_slice(data);
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::AudioUnavailable(e.to_string()))?;

        stream
            .play()
            .map_err(|e| Error::AudioUnavailable(e.to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = self.sample_rate,
            "audio capture started"
        );
        self.stream = Some(stream);
        Ok(())
    }

    fn next_frame(&mut self, len: usize) -> Result<Vec<f32>> {
        if self.stream.is_none() {
            return Err(Error::Audio("capture stream not open".to_string()));
        }

        let wait = self.frame_duration(len);
        let deadline = Instant::now() + wait * 4;

        loop {
            self.pending.extend(self.take_captured());
            if self.pending.len() >= len {
                return Ok(self.pending.drain(..len).collect());
            }
            if Instant::now() >= deadline {
                // Stream is running but starved; hand back what exists,
                // padded, so the poll loop keeps its cadence.
                let mut frame: Vec<f32> = self.pending.drain(..).collect();
                frame.resize(len, 0.0);
                return Ok(frame);
            }
            std::thread::sleep(wait / 4);
        }
    }

    fn record(&mut self, max: Duration, silence_timeout: Duration) -> Result<Recording> {
        if self.stream.is_none() {
            return Err(Error::Audio("capture stream not open".to_string()));
        }

        // Leftover detector frames belong to the wake phrase, not the command.
        self.pending.clear();
        self.take_captured();

        let chunk_wait = Duration::from_millis(50);
        let start = Instant::now();
        let mut samples = Vec::new();
        let mut heard_speech = false;
        let mut trailing_silence = Duration::ZERO;

        while start.elapsed() < max {
            std::thread::sleep(chunk_wait);
            let chunk = self.take_captured();
            if !chunk.is_empty() {
                let loud = super::rms(&chunk) > TRIM_THRESHOLD;
                if loud {
                    heard_speech = true;
                    trailing_silence = Duration::ZERO;
                } else {
                    trailing_silence += chunk_wait;
                }
                samples.extend(chunk);
            } else {
                trailing_silence += chunk_wait;
            }

            if heard_speech && trailing_silence >= silence_timeout {
                break;
            }
        }

        let samples = trim_silence(samples, self.sample_rate);
        tracing::debug!(
            samples = samples.len(),
            secs = start.elapsed().as_secs_f32(),
            "recording captured"
        );
        Ok(Recording {
            samples,
            sample_rate: self.sample_rate,
        })
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio capture stopped");
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for MicCapture {
    fn drop(&mut self) {
        self.close();
    }
}

/// Trim leading and trailing silence, keeping a short margin around speech
fn trim_silence(samples: Vec<f32>, sample_rate: u32) -> Vec<f32> {
    let first = samples.iter().position(|s| s.abs() > TRIM_THRESHOLD);
    let Some(first) = first else {
        return Vec::new();
    };
    let last = samples
        .iter()
        .rposition(|s| s.abs() > TRIM_THRESHOLD)
        .unwrap_or(samples.len() - 1);

    let lead_margin = sample_rate as usize / 10; // 100ms
    let tail_margin = sample_rate as usize / 2; // 500ms
    let start = first.saturating_sub(lead_margin);
    let end = (last + tail_margin).min(samples.len());
    samples[start..end].to_vec()
}

/// Encode f32 samples as 16-bit mono WAV bytes for the STT upload
///
/// # Errors
///
/// Returns error if WAV encoding fails.
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;
        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }
        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trim_silence_drops_silent_edges() {
        let rate = 16_000;
        let mut samples = vec![0.0f32; rate as usize]; // 1s silence
        samples.extend(vec![0.5f32; rate as usize]); // 1s speech
        samples.extend(vec![0.0f32; rate as usize]); // 1s silence

        let trimmed = trim_silence(samples, rate);
        // 100ms lead + 1s speech + 500ms tail
        let expected = rate as usize / 10 + rate as usize + rate as usize / 2;
        assert_eq!(trimmed.len(), expected);
    }

    #[test]
    fn trim_silence_of_pure_silence_is_empty() {
        let trimmed = trim_silence(vec![0.0f32; 16_000], 16_000);
        assert!(trimmed.is_empty());
    }

    #[test]
    fn recording_duration() {
        let rec = Recording {
            samples: vec![0.0; 8_000],
            sample_rate: 16_000,
        };
        assert!((rec.duration_secs() - 0.5).abs() < 1e-6);
    }
}
