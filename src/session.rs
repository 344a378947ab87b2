//! Session lifecycle
//!
//! One session owns the microphone, the wake detector, and the command
//! cycle. All of it runs on a dedicated worker thread; the controller
//! handle held by the caller only flips the stop flag and reads status.
//! Blocking inside the cycle is deliberate: while a command is being
//! transcribed and executed the assistant is not listening, so overlapping
//! wake events cannot occur.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::command::CommandRouter;
use crate::config::Config;
use crate::intent::IntentClassifier;
use crate::voice::{SourceFactory, SpeechOutput, Transcriber, Transcript, WakeDetector};
use crate::{Error, Result};

/// Spoken once the session is live
const READY_MESSAGE: &str = "Ready and listening.";

/// Spoken after a wake event, before recording the command
const ACK_MESSAGE: &str = "Yes?";

/// Constructs the wake detector on the worker thread
pub type DetectorFactory = Box<dyn FnOnce() -> Result<Box<dyn WakeDetector>> + Send>;

/// Where the session is in its command cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Listening,
    WakeDetected,
    Recording,
    Transcribing,
    Classifying,
    Executing,
    Responding,
    Stopping,
    Stopped,
    Error,
}

impl SessionState {
    /// Whether moving to `next` is a legal step in the cycle
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use SessionState::{
            Classifying, Error, Executing, Idle, Listening, Recording, Responding, Stopped,
            Stopping, Transcribing, WakeDetected,
        };
        match self {
            Idle => matches!(next, Listening | Stopping | Error),
            Listening => matches!(next, WakeDetected | Stopping | Error),
            WakeDetected => matches!(next, Recording | Stopping),
            Recording => matches!(next, Transcribing | Stopping | Error),
            Transcribing => matches!(next, Classifying | Listening | Stopping),
            Classifying => matches!(next, Executing | Listening | Stopping),
            Executing => matches!(next, Responding | Stopping | Error),
            Responding => matches!(next, Listening | Stopping),
            Stopping => matches!(next, Stopped),
            Stopped | Error => false,
        }
    }

    /// Terminal states never leave
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Error)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::WakeDetected => "wake-detected",
            Self::Recording => "recording",
            Self::Transcribing => "transcribing",
            Self::Classifying => "classifying",
            Self::Executing => "executing",
            Self::Responding => "responding",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of a running session
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub state: SessionState,
    pub last_error: Option<String>,
    pub uptime: Duration,
    /// Completed wake-to-response cycles
    pub cycles: u64,
}

/// Everything the worker thread consumes
///
/// Factories are deferred so that non-`Send` resources (the cpal input
/// stream) are constructed on the worker itself.
pub struct SessionParts {
    pub source: SourceFactory,
    pub detector: DetectorFactory,
    pub transcriber: Box<dyn Transcriber>,
    pub classifier: IntentClassifier,
    pub router: CommandRouter,
    pub speech: Box<dyn SpeechOutput>,
}

/// Timing knobs lifted out of [`Config`]
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub frame_size: usize,
    pub record_max: Duration,
    pub silence_timeout: Duration,
    pub heartbeat: Duration,
    pub audio_open_retries: u32,
}

impl SessionSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            frame_size: config.audio.frame_size,
            record_max: Duration::from_secs_f32(config.audio.record_max_secs),
            silence_timeout: Duration::from_secs_f32(config.audio.silence_timeout_secs),
            heartbeat: Duration::from_secs(config.session.heartbeat_secs),
            audio_open_retries: config.session.audio_open_retries,
        }
    }
}

struct Shared {
    stop: AtomicBool,
    state: Mutex<SessionState>,
    last_error: Mutex<Option<String>>,
    cycles: AtomicU64,
    started_at: Instant,
}

impl Shared {
    fn transition(&self, next: SessionState) {
        let mut state = self.state.lock().unwrap();
        if !state.can_transition_to(next) {
            tracing::warn!(from = %*state, to = %next, "irregular state transition");
        }
        tracing::debug!(from = %*state, to = %next, "session state");
        *state = next;
    }

    fn fail(&self, error: &Error) {
        *self.last_error.lock().unwrap() = Some(error.to_string());
        let mut state = self.state.lock().unwrap();
        tracing::error!(error = %error, from = %*state, "session failed");
        *state = SessionState::Error;
    }

    fn stopping(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}

/// Handle to a running session
///
/// Dropping the controller without calling [`SessionController::join`]
/// detaches the worker; it keeps running until the process exits.
pub struct SessionController {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<Result<()>>>,
}

impl SessionController {
    /// Spawn the session worker
    ///
    /// # Errors
    ///
    /// Returns error if the worker thread cannot be spawned.
    pub fn start(settings: SessionSettings, parts: SessionParts) -> Result<Self> {
        let shared = Arc::new(Shared {
            stop: AtomicBool::new(false),
            state: Mutex::new(SessionState::Idle),
            last_error: Mutex::new(None),
            cycles: AtomicU64::new(0),
            started_at: Instant::now(),
        });

        let worker_shared = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name("hark-session".to_string())
            .spawn(move || {
                let result = run_worker(&worker_shared, &settings, parts);
                if let Err(ref e) = result {
                    worker_shared.fail(e);
                }
                result
            })?;

        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    /// Request a cooperative stop; returns immediately
    ///
    /// The worker notices at the next loop boundary, so stop latency is
    /// bounded by the longest blocking step (a recording or one HTTP
    /// round trip).
    pub fn stop(&self) {
        self.shared.stop.store(true, Ordering::Release);
    }

    /// A cheap handle other threads can use to request a stop
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.shared))
    }

    /// Current state, last error, and uptime
    #[must_use]
    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            state: *self.shared.state.lock().unwrap(),
            last_error: self.shared.last_error.lock().unwrap().clone(),
            uptime: self.shared.started_at.elapsed(),
            cycles: self.shared.cycles.load(Ordering::Relaxed),
        }
    }

    /// Whether the worker thread is still alive
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Wait for the worker to exit and surface its result
    ///
    /// # Errors
    ///
    /// The worker's fatal error, or `Error::Session` if it panicked.
    pub fn join(mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| Error::Session("session worker panicked".to_string()))?,
            None => Ok(()),
        }
    }
}

/// Requests a stop on a session owned elsewhere
#[derive(Clone)]
pub struct StopHandle(Arc<Shared>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.stop.store(true, Ordering::Release);
    }
}

/// The whole session, from microphone open to farewell
fn run_worker(shared: &Shared, settings: &SessionSettings, parts: SessionParts) -> Result<()> {
    let SessionParts {
        source,
        detector,
        transcriber,
        classifier,
        router,
        mut speech,
    } = parts;

    let mut source = source()?;
    open_with_retries(source.as_mut(), settings.audio_open_retries)?;

    let mut detector = match detector() {
        Ok(d) => d,
        Err(e) => {
            source.close();
            return Err(e);
        }
    };

    tracing::info!(
        detector = detector.name(),
        sample_rate = source.sample_rate(),
        "session started"
    );
    speak_soft(speech.as_mut(), READY_MESSAGE);

    shared.transition(SessionState::Listening);
    let mut last_heartbeat = Instant::now();

    let outcome = loop {
        if shared.stopping() {
            break Ok(());
        }

        if last_heartbeat.elapsed() >= settings.heartbeat {
            let status_state = *shared.state.lock().unwrap();
            tracing::info!(
                state = %status_state,
                uptime_secs = shared.started_at.elapsed().as_secs(),
                cycles = shared.cycles.load(Ordering::Relaxed),
                "heartbeat"
            );
            last_heartbeat = Instant::now();
        }

        let frame = match source.next_frame(settings.frame_size) {
            Ok(frame) => frame,
            Err(e) => break Err(e),
        };
        let detection = detector.feed(&frame);
        if !detection.detected {
            continue;
        }

        shared.transition(SessionState::WakeDetected);
        tracing::info!(
            keyword = detection.keyword_id.as_deref().unwrap_or("-"),
            confidence = detection.confidence.unwrap_or(0.0),
            "wake detected"
        );
        speak_soft(speech.as_mut(), ACK_MESSAGE);

        if shared.stopping() {
            break Ok(());
        }
        shared.transition(SessionState::Recording);
        let recording = match source.record(settings.record_max, settings.silence_timeout) {
            Ok(recording) => recording,
            Err(e) => break Err(e),
        };

        shared.transition(SessionState::Transcribing);
        let transcript = match transcriber.transcribe(&recording) {
            Ok(transcript) => transcript,
            Err(e) => {
                // A failed transcription costs one command, not the session
                tracing::warn!(error = %e, "transcription failed, dropping command");
                Transcript::empty()
            }
        };

        if transcript.is_empty() || classifier.is_wake_echo(&transcript.text) {
            tracing::debug!("nothing usable heard, resuming listening");
            detector.reset();
            shared.transition(SessionState::Listening);
            continue;
        }
        tracing::info!(transcript = %transcript.text, "transcript received");

        shared.transition(SessionState::Classifying);
        let intent_match = classifier.classify(&transcript.text);
        tracing::info!(
            intent = %intent_match.intent,
            confidence = intent_match.confidence,
            "intent classified"
        );

        shared.transition(SessionState::Executing);
        let result = router.route(&intent_match);

        shared.transition(SessionState::Responding);
        speak_soft(speech.as_mut(), &result.message);
        shared.cycles.fetch_add(1, Ordering::Relaxed);

        if result.should_stop_session {
            tracing::info!("stop requested by voice command");
            break Ok(());
        }

        detector.reset();
        shared.transition(SessionState::Listening);
    };

    source.close();
    if outcome.is_ok() {
        shared.transition(SessionState::Stopping);
        shared.transition(SessionState::Stopped);
        tracing::info!(
            uptime_secs = shared.started_at.elapsed().as_secs(),
            cycles = shared.cycles.load(Ordering::Relaxed),
            "session stopped"
        );
    }
    outcome
}

/// Open the audio source, retrying with a linear backoff
fn open_with_retries(source: &mut dyn crate::voice::AudioSource, retries: u32) -> Result<()> {
    let mut attempt = 0;
    loop {
        match source.open() {
            Ok(()) => return Ok(()),
            Err(e) if attempt < retries => {
                attempt += 1;
                tracing::warn!(error = %e, attempt, "audio open failed, retrying");
                std::thread::sleep(Duration::from_millis(200 * u64::from(attempt)));
            }
            Err(e) => return Err(e),
        }
    }
}

/// Speak if possible; a dead speaker never takes the session down
fn speak_soft(speech: &mut dyn SpeechOutput, text: &str) {
    if let Err(e) = speech.speak(text) {
        tracing::warn!(error = %e, "speech output failed");
    }
}
