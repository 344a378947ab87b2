//! Voice pipeline integration tests
//!
//! Tests voice components without requiring audio hardware

use std::io::Cursor;

use hark::config::{WakeConfig, WakeMethod};
use hark::voice::{build_detector, samples_to_wav, Recording};

const SAMPLE_RATE: u32 = 16_000;

/// Generate sine wave audio samples
fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Generate silence
fn generate_silence(duration_secs: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    vec![0.0; num_samples]
}

#[test]
fn test_vad_triggers_on_sustained_tone() {
    let config = WakeConfig {
        method: WakeMethod::VoiceActivity,
        energy_threshold: 0.01,
        ..WakeConfig::default()
    };
    let mut detector = build_detector(&config).unwrap();
    assert_eq!(detector.name(), "voice-activity");

    let tone = generate_sine_samples(440.0, 0.5, 0.3);
    let mut detected = false;
    for frame in tone.chunks(512) {
        if detector.feed(frame).detected {
            detected = true;
            break;
        }
    }
    assert!(detected, "half a second of tone should trigger the VAD");
}

#[test]
fn test_vad_ignores_silence() {
    let config = WakeConfig {
        method: WakeMethod::VoiceActivity,
        ..WakeConfig::default()
    };
    let mut detector = build_detector(&config).unwrap();

    let silence = generate_silence(1.0);
    for frame in silence.chunks(512) {
        assert!(!detector.feed(frame).detected);
    }
}

#[test]
fn test_vad_ignores_short_click() {
    let config = WakeConfig {
        method: WakeMethod::VoiceActivity,
        ..WakeConfig::default()
    };
    let mut detector = build_detector(&config).unwrap();

    // A single loud frame surrounded by silence is a click, not speech
    let mut samples = generate_silence(0.2);
    samples.extend(generate_sine_samples(440.0, 0.03, 0.5));
    samples.extend(generate_silence(0.2));

    for frame in samples.chunks(512) {
        assert!(!detector.feed(frame).detected);
    }
}

#[test]
fn test_detector_reset_clears_progress() {
    let config = WakeConfig {
        method: WakeMethod::VoiceActivity,
        ..WakeConfig::default()
    };
    let mut detector = build_detector(&config).unwrap();

    let tone = generate_sine_samples(440.0, 0.1, 0.3);
    for frame in tone.chunks(512).take(3) {
        detector.feed(frame);
    }
    detector.reset();

    // After reset a single loud frame must not complete a run
    let frame = generate_sine_samples(440.0, 0.032, 0.3);
    assert!(!detector.feed(&frame[..512]).detected);
}

#[test]
fn test_builtin_fallback_when_spotter_unavailable() {
    let config = WakeConfig {
        method: WakeMethod::KeywordSpotter,
        access_key: None,
        fallback_enabled: true,
        init_retries: 0,
        ..WakeConfig::default()
    };
    let mut detector = build_detector(&config).unwrap();
    assert_eq!(detector.name(), "built-in-fallback");

    // The fallback is a plain energy gate
    let loud = generate_sine_samples(440.0, 0.032, 0.5);
    assert!(detector.feed(&loud[..512]).detected);
}

#[test]
fn test_no_fallback_is_fatal() {
    let config = WakeConfig {
        method: WakeMethod::KeywordSpotter,
        access_key: None,
        fallback_enabled: false,
        init_retries: 0,
        ..WakeConfig::default()
    };
    assert!(build_detector(&config).is_err());
}

#[test]
fn test_samples_to_wav() {
    let samples = generate_sine_samples(440.0, 0.1, 0.5);
    let wav_data = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    // Check WAV header magic
    assert_eq!(&wav_data[0..4], b"RIFF");
    assert_eq!(&wav_data[8..12], b"WAVE");

    // WAV should have reasonable size
    assert!(wav_data.len() > 44); // WAV header is 44 bytes
}

#[test]
fn test_wav_roundtrip() {
    let original_samples: Vec<f32> = vec![0.0, 0.5, -0.5, 1.0, -1.0, 0.25];
    let wav_data = samples_to_wav(&original_samples, SAMPLE_RATE).unwrap();

    // Read WAV back
    let cursor = Cursor::new(wav_data);
    let mut reader = hound::WavReader::new(cursor).unwrap();

    let spec = reader.spec();
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.channels, 1);

    let read_samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(read_samples.len(), original_samples.len());
}

#[test]
fn test_recording_duration_and_energy() {
    let recording = Recording {
        samples: generate_sine_samples(440.0, 1.0, 0.5),
        sample_rate: SAMPLE_RATE,
    };
    assert!((recording.duration_secs() - 1.0).abs() < 0.01);

    // RMS of a 0.5-amplitude sine is about 0.35
    let energy = recording.rms();
    assert!((0.3..0.4).contains(&energy), "rms was {energy}");

    let silent = Recording {
        samples: generate_silence(0.5),
        sample_rate: SAMPLE_RATE,
    };
    assert!(silent.rms() < 1e-6);
}
