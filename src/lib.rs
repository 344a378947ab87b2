//! hark - Always-on local voice command assistant
//!
//! This library provides the core pipeline for hark:
//! - Continuous microphone capture and wake-word detection
//! - Bounded command recording and Whisper transcription
//! - Fuzzy intent classification over a configurable vocabulary
//! - OS command dispatch with spoken responses
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                 SessionController                      │
//! │      stop flag  │  status snapshot  │  join           │
//! └────────────────────────┬──────────────────────────────┘
//!                          │ worker thread
//! ┌────────────────────────▼──────────────────────────────┐
//! │   Mic  →  Wake  →  Record  →  STT  →  Intent  →  Cmd  │
//! │                                           └──→  TTS   │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! The worker thread owns the microphone stream, the detector, and the
//! command cycle end to end; the controller handle only observes it.

pub mod command;
pub mod config;
pub mod error;
pub mod intent;
pub mod session;
pub mod voice;

pub use command::{CommandExecutor, CommandRequest, CommandResult, CommandRouter, OsCommands};
pub use config::{Config, Vocabulary, STOP_INTENT};
pub use error::{Error, Result};
pub use intent::{IntentClassifier, IntentMatch, UNKNOWN_INTENT};
pub use session::{
    DetectorFactory, SessionController, SessionParts, SessionSettings, SessionState,
    StatusSnapshot, StopHandle,
};
pub use voice::{
    build_detector, AudioSource, MicCapture, NullSpeech, Recording, SourceFactory, Speaker,
    SpeechOutput, Transcriber, Transcript, WakeDetector, WhisperStt,
};
