//! Wake-word detection
//!
//! Three detector variants behind one trait, selected at configuration
//! time: a keyword spotter (commercial engine boundary, needs an access
//! key), a voice-activity detector, and a plain energy gate that is always
//! constructible. Initialization failures retry a bounded number of times
//! and then either degrade to the built-in gate or surface a fatal error;
//! a detector is never silently replaced by "always" or "never" triggered.

use std::time::Duration;

use crate::config::{WakeConfig, WakeMethod};
use crate::{Error, Result};

use super::rms;

/// Samples per detector frame is decided by the caller; these windows are
/// counted in frames (~32ms each at 16kHz/512).
const CONFIRM_WINDOW_FRAMES: u32 = 8;
const CONFIRM_HITS_NEEDED: u32 = 2;

/// Outcome of feeding one frame to a detector
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub detected: bool,
    pub keyword_id: Option<String>,
    pub confidence: Option<f32>,
}

impl DetectionResult {
    /// No wake event this frame
    #[must_use]
    pub fn none() -> Self {
        Self {
            detected: false,
            keyword_id: None,
            confidence: None,
        }
    }

    fn hit(keyword_id: Option<String>, confidence: f32) -> Self {
        Self {
            detected: true,
            keyword_id,
            confidence: Some(confidence.clamp(0.0, 1.0)),
        }
    }
}

/// Consumes audio frames and emits wake events
pub trait WakeDetector {
    /// Score one frame of mono PCM
    fn feed(&mut self, frame: &[f32]) -> DetectionResult;

    /// Clear internal state (called when returning to listening)
    fn reset(&mut self);

    /// Human-readable variant name for logs and status
    fn name(&self) -> &'static str;
}

/// Build the configured detector with bounded retries, degrading to the
/// built-in gate when allowed
///
/// # Errors
///
/// `Error::DetectorInit` when the configured method cannot initialize and
/// no fallback is enabled.
pub fn build_detector(config: &WakeConfig) -> Result<Box<dyn WakeDetector>> {
    let mut last_err = None;
    for attempt in 0..=config.init_retries {
        match try_build(config) {
            Ok(detector) => {
                tracing::info!(detector = detector.name(), attempt, "wake detector initialized");
                return Ok(detector);
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "wake detector init failed");
                last_err = Some(e);
                if attempt < config.init_retries {
                    std::thread::sleep(Duration::from_millis(50 * u64::from(attempt + 1)));
                }
            }
        }
    }

    if config.fallback_enabled && config.method != WakeMethod::BuiltInFallback {
        tracing::warn!("degrading to built-in fallback detector");
        return Ok(Box::new(EnergyGate::new(config.energy_threshold)));
    }

    Err(last_err.unwrap_or_else(|| Error::DetectorInit("detector init failed".to_string())))
}

fn try_build(config: &WakeConfig) -> Result<Box<dyn WakeDetector>> {
    match config.method {
        WakeMethod::KeywordSpotter => Ok(Box::new(KeywordSpotter::new(config)?)),
        WakeMethod::VoiceActivity => {
            Ok(Box::new(VoiceActivityDetector::new(config.energy_threshold)))
        }
        WakeMethod::BuiltInFallback => Ok(Box::new(EnergyGate::new(config.energy_threshold))),
    }
}

/// Keyword-spotting engine boundary
///
/// Validates the provisioned access key and keyword model, then scores
/// frames with an energy-spike pattern matcher behind the adapter seam
/// (replaceable by a real keyword model without touching the session).
/// Detection confirms over a short window: a low threshold opens the
/// window, and enough high-threshold hits inside it confirm the wake.
pub struct KeywordSpotter {
    keyword_id: String,
    prev_energy: f32,
    spike_ratio: f32,
    trigger_threshold: f32,
    confirm_threshold: f32,
    window_left: u32,
    hits: u32,
    best_score: f32,
}

impl KeywordSpotter {
    /// Built-in generic keyword used when the custom phrase model is
    /// unavailable (degraded mode, not an error)
    pub const BUILTIN_KEYWORD: &'static str = "computer";

    /// Create a spotter from configuration
    ///
    /// # Errors
    ///
    /// `Error::DetectorInit` when no plausible access key is provisioned.
    pub fn new(config: &WakeConfig) -> Result<Self> {
        let access_key = config.access_key.as_deref().unwrap_or("").trim();
        if access_key.len() < 10 {
            return Err(Error::DetectorInit(
                "keyword spotter requires a provisioned access key".to_string(),
            ));
        }

        let keyword_id = match &config.keyword_path {
            Some(path) if path.exists() => config.phrase.clone(),
            Some(path) => {
                tracing::warn!(
                    path = %path.display(),
                    "keyword model not found, using built-in keyword \"{}\"",
                    Self::BUILTIN_KEYWORD
                );
                Self::BUILTIN_KEYWORD.to_string()
            }
            None => {
                tracing::info!(
                    "no keyword model configured, using built-in keyword \"{}\"",
                    Self::BUILTIN_KEYWORD
                );
                Self::BUILTIN_KEYWORD.to_string()
            }
        };

        Ok(Self {
            keyword_id,
            prev_energy: 0.0,
            spike_ratio: 3.0,
            trigger_threshold: 0.3,
            confirm_threshold: 0.5,
            window_left: 0,
            hits: 0,
            best_score: 0.0,
        })
    }

    /// The keyword this spotter is armed with
    #[must_use]
    pub fn keyword(&self) -> &str {
        &self.keyword_id
    }

    /// Energy-spike score for one frame, 0-1
    fn score(&mut self, frame: &[f32]) -> f32 {
        let energy = rms(frame);
        let score = if self.prev_energy > 0.003 && energy > self.prev_energy * self.spike_ratio {
            let ratio = energy / self.prev_energy;
            ((ratio - self.spike_ratio) / self.spike_ratio).clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.prev_energy = self.prev_energy * 0.9 + energy * 0.1;
        score
    }
}

impl WakeDetector for KeywordSpotter {
    fn feed(&mut self, frame: &[f32]) -> DetectionResult {
        let score = self.score(frame);

        if self.window_left == 0 {
            if score >= self.trigger_threshold {
                self.window_left = CONFIRM_WINDOW_FRAMES;
                self.hits = u32::from(score >= self.confirm_threshold);
                self.best_score = score;
            }
            return DetectionResult::none();
        }

        self.window_left -= 1;
        if score >= self.confirm_threshold {
            self.hits += 1;
            self.best_score = self.best_score.max(score);
        }

        if self.hits >= CONFIRM_HITS_NEEDED {
            let confidence = self.best_score;
            self.reset();
            return DetectionResult::hit(Some(self.keyword_id.clone()), confidence);
        }
        if self.window_left == 0 {
            self.reset();
        }
        DetectionResult::none()
    }

    fn reset(&mut self) {
        self.window_left = 0;
        self.hits = 0;
        self.best_score = 0.0;
    }

    fn name(&self) -> &'static str {
        "keyword-spotter"
    }
}

/// Voice-activity detector: sustained speech energy over consecutive
/// frames. Triggers on any utterance, not a specific phrase.
pub struct VoiceActivityDetector {
    threshold: f32,
    consecutive_needed: u32,
    consecutive: u32,
}

impl VoiceActivityDetector {
    #[must_use]
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            consecutive_needed: 5,
            consecutive: 0,
        }
    }
}

impl WakeDetector for VoiceActivityDetector {
    fn feed(&mut self, frame: &[f32]) -> DetectionResult {
        let energy = rms(frame);
        if energy > self.threshold {
            self.consecutive += 1;
            if self.consecutive >= self.consecutive_needed {
                self.reset();
                let confidence = energy / (self.threshold * 4.0);
                return DetectionResult::hit(None, confidence);
            }
        } else {
            self.consecutive = 0;
        }
        DetectionResult::none()
    }

    fn reset(&mut self) {
        self.consecutive = 0;
    }

    fn name(&self) -> &'static str {
        "voice-activity"
    }
}

/// Plain RMS gate; always constructible, used as the degraded-mode
/// fallback
pub struct EnergyGate {
    threshold: f32,
}

impl EnergyGate {
    #[must_use]
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }
}

impl WakeDetector for EnergyGate {
    fn feed(&mut self, frame: &[f32]) -> DetectionResult {
        let energy = rms(frame);
        if energy > self.threshold {
            let confidence = energy / (self.threshold * 4.0);
            return DetectionResult::hit(None, confidence);
        }
        DetectionResult::none()
    }

    fn reset(&mut self) {}

    fn name(&self) -> &'static str {
        "built-in-fallback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WakeConfig;

    fn spotter_config() -> WakeConfig {
        WakeConfig {
            method: WakeMethod::KeywordSpotter,
            access_key: Some("0123456789abcdef".to_string()),
            init_retries: 0,
            ..WakeConfig::default()
        }
    }

    #[test]
    fn spotter_requires_access_key() {
        let config = WakeConfig {
            method: WakeMethod::KeywordSpotter,
            access_key: None,
            ..WakeConfig::default()
        };
        assert!(matches!(
            KeywordSpotter::new(&config),
            Err(Error::DetectorInit(_))
        ));
    }

    #[test]
    fn spotter_degrades_to_builtin_keyword_without_model() {
        let spotter = KeywordSpotter::new(&spotter_config()).unwrap();
        assert_eq!(spotter.keyword(), KeywordSpotter::BUILTIN_KEYWORD);
    }

    #[test]
    fn spotter_missing_model_file_degrades_not_errors() {
        let config = WakeConfig {
            keyword_path: Some("/nonexistent/hark.kw".into()),
            ..spotter_config()
        };
        let spotter = KeywordSpotter::new(&config).unwrap();
        assert_eq!(spotter.keyword(), KeywordSpotter::BUILTIN_KEYWORD);
    }

    #[test]
    fn spotter_detects_energy_spike_after_quiet() {
        let mut spotter = KeywordSpotter::new(&spotter_config()).unwrap();
        let quiet = vec![0.01f32; 512];
        let loud = vec![0.5f32; 512];

        for _ in 0..10 {
            assert!(!spotter.feed(&quiet).detected);
        }
        // First spike opens the confirmation window; following spikes confirm.
        let mut detected = false;
        for _ in 0..4 {
            let result = spotter.feed(&loud);
            if result.detected {
                assert_eq!(
                    result.keyword_id.as_deref(),
                    Some(KeywordSpotter::BUILTIN_KEYWORD)
                );
                let confidence = result.confidence.unwrap();
                assert!((0.0..=1.0).contains(&confidence));
                detected = true;
                break;
            }
        }
        assert!(detected, "sustained spike should confirm within the window");
    }

    #[test]
    fn vad_needs_sustained_speech() {
        let mut vad = VoiceActivityDetector::new(0.01);
        let loud = vec![0.2f32; 512];
        let quiet = vec![0.0f32; 512];

        // A short burst is not enough
        for _ in 0..3 {
            assert!(!vad.feed(&loud).detected);
        }
        assert!(!vad.feed(&quiet).detected); // resets the run

        // Five consecutive loud frames trigger
        let mut result = DetectionResult::none();
        for _ in 0..5 {
            result = vad.feed(&loud);
        }
        assert!(result.detected);
        assert!(result.keyword_id.is_none());
    }

    #[test]
    fn energy_gate_triggers_on_single_loud_frame() {
        let mut gate = EnergyGate::new(0.01);
        assert!(!gate.feed(&[0.0f32; 512]).detected);
        assert!(gate.feed(&[0.2f32; 512]).detected);
    }

    #[test]
    fn build_falls_back_when_spotter_cannot_init() {
        let config = WakeConfig {
            method: WakeMethod::KeywordSpotter,
            access_key: None,
            fallback_enabled: true,
            init_retries: 1,
            ..WakeConfig::default()
        };
        let detector = build_detector(&config).unwrap();
        assert_eq!(detector.name(), "built-in-fallback");
    }

    #[test]
    fn build_is_fatal_without_fallback() {
        let config = WakeConfig {
            method: WakeMethod::KeywordSpotter,
            access_key: None,
            fallback_enabled: false,
            init_retries: 1,
            ..WakeConfig::default()
        };
        assert!(matches!(
            build_detector(&config),
            Err(Error::DetectorInit(_))
        ));
    }
}
