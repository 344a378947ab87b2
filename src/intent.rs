//! Intent classification
//!
//! Maps free transcript text onto a fixed vocabulary of intents using
//! approximate string matching. The classifier is a pure function of
//! (text, vocabulary, threshold) with no session state, so the fuzzy policy
//! can be tuned and tested in isolation.
//!
//! Matching order: priority regex extraction for intents that carry
//! entities (app name, volume level), then fuzzy scoring of every canonical
//! phrase. The highest score wins; ties go to the earliest declared intent.
//! Anything below the acceptance threshold is `"unknown"`.

use std::collections::HashMap;

use regex::Regex;

use crate::config::{Vocabulary, STOP_INTENT};

/// The fallback intent when no phrase clears the threshold
pub const UNKNOWN_INTENT: &str = "unknown";

/// A classified intent with its confidence
#[derive(Debug, Clone, PartialEq)]
pub struct IntentMatch {
    /// Intent name, or `"unknown"`
    pub intent: String,

    /// Normalized confidence in [0, 1]
    pub confidence: f32,

    /// The canonical phrase that produced the score, when fuzzy-matched
    pub matched_phrase: Option<String>,

    /// Extracted entities (e.g. `app_name`, `volume`)
    pub entities: HashMap<String, String>,
}

impl IntentMatch {
    fn unknown(confidence: f32) -> Self {
        Self {
            intent: UNKNOWN_INTENT.to_string(),
            confidence,
            matched_phrase: None,
            entities: HashMap::new(),
        }
    }

    /// Whether this match carries the reserved stop intent
    #[must_use]
    pub fn is_stop(&self) -> bool {
        self.intent == STOP_INTENT
    }
}

/// Classifies transcripts against an ordered vocabulary
pub struct IntentClassifier {
    vocabulary: Vocabulary,
    /// Acceptance threshold on the 0-100 score scale
    threshold: f32,
    /// Wake phrase, used to discard transcripts that are only the wake
    /// word leaking into the recording
    wake_phrase: String,
    open_app_re: Regex,
    volume_set_re: Regex,
}

impl IntentClassifier {
    /// Create a classifier
    ///
    /// # Panics
    ///
    /// Never panics: the embedded regexes are static and valid.
    #[must_use]
    pub fn new(vocabulary: Vocabulary, threshold: f32, wake_phrase: &str) -> Self {
        Self {
            vocabulary,
            threshold,
            wake_phrase: normalize(wake_phrase),
            open_app_re: Regex::new(r"\b(?:open|launch)\s+(?:the\s+)?(.+)$").unwrap(),
            volume_set_re: Regex::new(r"volume\s+(?:to|at)\s+(\d+)").unwrap(),
        }
    }

    /// Classify a transcript
    ///
    /// Always returns a confidence in [0, 1]; below-threshold inputs return
    /// intent `"unknown"` carrying the best score seen.
    #[must_use]
    pub fn classify(&self, text: &str) -> IntentMatch {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return IntentMatch::unknown(0.0);
        }

        // A transcript that is just the wake phrase is the detector hearing
        // itself; treat it as nothing rather than a command.
        if self.is_wake_echo(&normalized) {
            tracing::debug!(text, "transcript is wake phrase only, ignoring");
            return IntentMatch::unknown(0.0);
        }

        // Entity-bearing intents are matched structurally first, as long as
        // the vocabulary actually declares them.
        if let Some(m) = self.match_volume_set(&normalized) {
            return m;
        }
        if let Some(m) = self.match_open_app(&normalized) {
            return m;
        }

        let mut best_score = 0.0f32;
        let mut best: Option<(&str, &str)> = None;

        for (intent, phrases) in &self.vocabulary {
            for phrase in phrases {
                let score = phrase_score(&normalized, phrase);
                // Strictly greater: first declared intent wins ties
                if score > best_score {
                    best_score = score;
                    best = Some((intent, phrase));
                }
            }
        }

        match best {
            Some((intent, phrase)) if best_score >= self.threshold => IntentMatch {
                intent: intent.to_string(),
                confidence: best_score / 100.0,
                matched_phrase: Some(phrase.to_string()),
                entities: HashMap::new(),
            },
            _ => IntentMatch::unknown(best_score / 100.0),
        }
    }

    fn match_volume_set(&self, text: &str) -> Option<IntentMatch> {
        if !self.vocabulary.contains_key("volume_set") {
            return None;
        }
        let caps = self.volume_set_re.captures(text)?;
        let level: u32 = caps[1].parse().ok()?;
        let mut entities = HashMap::new();
        entities.insert("volume".to_string(), level.min(100).to_string());
        Some(IntentMatch {
            intent: "volume_set".to_string(),
            confidence: 1.0,
            matched_phrase: None,
            entities,
        })
    }

    fn match_open_app(&self, text: &str) -> Option<IntentMatch> {
        if !self.vocabulary.contains_key("open_app") {
            return None;
        }
        let caps = self.open_app_re.captures(text)?;
        let app = caps[1]
            .trim()
            .trim_end_matches(" app")
            .trim_end_matches(" application")
            .trim()
            .to_string();
        if app.is_empty() {
            return None;
        }
        let mut entities = HashMap::new();
        entities.insert("app_name".to_string(), app);
        Some(IntentMatch {
            intent: "open_app".to_string(),
            confidence: 1.0,
            matched_phrase: None,
            entities,
        })
    }

    /// True when the transcript is (a fragment of) the wake phrase alone,
    /// i.e. the detector hearing itself
    #[must_use]
    pub fn is_wake_echo(&self, text: &str) -> bool {
        let normalized = normalize(text);
        if self.wake_phrase.is_empty()
            || normalized.is_empty()
            || normalized.split_whitespace().count() > 3
        {
            return false;
        }
        normalized.contains(self.wake_phrase.as_str()) || self.wake_phrase.contains(&normalized)
    }

    /// The configured acceptance threshold (0-100 scale)
    #[must_use]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }
}

/// Lowercase, strip punctuation, collapse whitespace
#[must_use]
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped: String = lowered
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Score a normalized transcript against one canonical phrase, 0-100.
///
/// Single-word phrases are compared whole-word against each transcript
/// token (so "hi" does not light up inside "this"); multi-word phrases use
/// a partial-ratio sweep over the transcript.
fn phrase_score(text: &str, phrase: &str) -> f32 {
    let phrase = normalize(phrase);
    if phrase.is_empty() {
        return 0.0;
    }
    if phrase.split_whitespace().count() == 1 {
        text.split_whitespace()
            .map(|token| similarity(&phrase, token))
            .fold(0.0, f32::max)
    } else {
        partial_ratio(&phrase, text)
    }
}

/// Best windowed similarity of `needle` against `haystack`, 0-100.
///
/// Slides a window the length of the shorter string across the longer one
/// and keeps the best normalized Levenshtein similarity, tolerating
/// transcription noise around an embedded phrase.
#[must_use]
pub fn partial_ratio(needle: &str, haystack: &str) -> f32 {
    let (short, long) = if needle.chars().count() <= haystack.chars().count() {
        (needle, haystack)
    } else {
        (haystack, needle)
    };

    let short_len = short.chars().count();
    if short_len == 0 {
        return 0.0;
    }
    let long_chars: Vec<char> = long.chars().collect();
    if long_chars.len() == short_len {
        return similarity(short, long);
    }

    let mut best = 0.0f32;
    for start in 0..=(long_chars.len() - short_len) {
        let window: String = long_chars[start..start + short_len].iter().collect();
        best = best.max(similarity(short, &window));
        if best >= 100.0 {
            break;
        }
    }
    best
}

/// Normalized Levenshtein similarity, 0-100
fn similarity(a: &str, b: &str) -> f32 {
    #[allow(clippy::cast_possible_truncation)]
    let sim = strsim::normalized_levenshtein(a, b) as f32;
    sim * 100.0
}

/// Built-in intent vocabulary, in priority order.
///
/// Derived from the fixed command set of the assistant: device control,
/// simple queries, media transport, small talk, and the reserved session
/// stop phrases.
#[must_use]
pub fn default_vocabulary() -> Vocabulary {
    let table: &[(&str, &[&str])] = &[
        (
            "lock",
            &["lock", "lock device", "lock screen", "lock the screen", "lock computer"],
        ),
        (
            "open_app",
            &["open", "launch", "open app", "launch application"],
        ),
        (
            "volume_up",
            &["volume up", "increase volume", "turn up volume", "louder", "raise volume"],
        ),
        (
            "volume_down",
            &["volume down", "decrease volume", "turn down volume", "quieter", "lower volume"],
        ),
        ("volume_set", &["set volume", "volume to", "set volume to"]),
        (
            "time_query",
            &["what time", "current time", "time now", "whats the time", "tell me the time"],
        ),
        (
            "date_query",
            &["what date", "current date", "date today", "whats the date", "tell me the date"],
        ),
        (
            "system_info",
            &["system info", "system information", "system status", "device info"],
        ),
        (
            "media_play",
            &["play music", "resume music", "unpause", "start music"],
        ),
        ("media_pause", &["pause", "pause music", "pause playback"]),
        (
            "media_stop",
            &["stop music", "stop the music", "stop playback"],
        ),
        (
            "media_next",
            &["next song", "next track", "skip song", "play next"],
        ),
        (
            "media_previous",
            &["previous song", "previous track", "last song", "play previous"],
        ),
        (
            "power_off",
            &["power off", "power off the computer", "turn off the computer"],
        ),
        (
            "restart",
            &["restart", "reboot", "restart the computer"],
        ),
        (
            "greeting",
            &["hello", "hi", "hey", "good morning", "good afternoon", "how are you"],
        ),
        ("thanks", &["thank you", "thanks", "appreciate it"]),
        ("goodbye", &["goodbye", "bye", "see you later", "farewell"]),
        (
            STOP_INTENT,
            &["stop the agent", "stop listening", "shut down", "shut yourself down"],
        ),
    ];

    table
        .iter()
        .map(|(intent, phrases)| {
            (
                (*intent).to_string(),
                phrases.iter().map(|p| (*p).to_string()).collect(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> IntentClassifier {
        IntentClassifier::new(default_vocabulary(), 70.0, "hey hark")
    }

    #[test]
    fn normalize_strips_punctuation_and_case() {
        assert_eq!(normalize("What's  the TIME?!"), "what s the time");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("...,,!"), "");
    }

    #[test]
    fn confidence_is_always_normalized() {
        let c = classifier();
        for text in ["what time", "zzz qqq xxx", "", "lock the screen", "open firefox"] {
            let m = c.classify(text);
            assert!(
                (0.0..=1.0).contains(&m.confidence),
                "confidence out of range for {text:?}: {}",
                m.confidence
            );
        }
    }

    #[test]
    fn exact_phrase_scores_full() {
        let m = classifier().classify("what time");
        assert_eq!(m.intent, "time_query");
        assert!(m.confidence >= 0.99);
        assert_eq!(m.matched_phrase.as_deref(), Some("what time"));
    }

    #[test]
    fn tolerates_transcription_noise() {
        // "what time is it" embeds the canonical phrase
        let m = classifier().classify("what time is it");
        assert_eq!(m.intent, "time_query");
        assert!(m.confidence >= 0.70);
    }

    #[test]
    fn below_threshold_is_exactly_unknown() {
        let m = classifier().classify("gibberish zzz");
        assert_eq!(m.intent, UNKNOWN_INTENT);
        assert!(m.confidence < 0.70);
    }

    #[test]
    fn empty_text_is_unknown_with_zero_confidence() {
        let m = classifier().classify("");
        assert_eq!(m.intent, UNKNOWN_INTENT);
        assert_eq!(m.confidence, 0.0);
    }

    #[test]
    fn stop_phrase_maps_to_stop_intent() {
        let m = classifier().classify("stop the agent");
        assert_eq!(m.intent, STOP_INTENT);
        assert!(m.is_stop());
        assert!(m.confidence >= 0.70);
    }

    #[test]
    fn media_stop_does_not_shadow_session_stop() {
        let c = classifier();
        assert_eq!(c.classify("stop music").intent, "media_stop");
        assert_eq!(c.classify("stop the agent").intent, STOP_INTENT);
    }

    #[test]
    fn power_phrases_stay_distinct_from_session_stop() {
        let c = classifier();
        assert_eq!(c.classify("power off").intent, "power_off");
        assert_eq!(c.classify("turn off the computer").intent, "power_off");
        assert_eq!(c.classify("shut down").intent, STOP_INTENT);
        assert_eq!(c.classify("restart the computer").intent, "restart");
    }

    #[test]
    fn wake_echo_is_ignored() {
        let c = classifier();
        for text in ["hey hark", "Hey Hark!", "hark"] {
            let m = c.classify(text);
            assert_eq!(m.intent, UNKNOWN_INTENT, "expected echo for {text:?}");
            assert_eq!(m.confidence, 0.0);
        }
        // Wake phrase followed by a real command is not an echo
        let m = c.classify("hey hark what time is it now today");
        assert_ne!(m.confidence, 0.0);
    }

    #[test]
    fn echo_check_covers_both_containment_directions() {
        let c = classifier();
        // Fragment of the wake phrase, and wake phrase with noise around it
        assert!(c.is_wake_echo("hark"));
        assert!(c.is_wake_echo("uh hey hark"));
        assert!(!c.is_wake_echo("open firefox"));
        assert!(!c.is_wake_echo(""));
    }

    #[test]
    fn open_app_extracts_entity() {
        let m = classifier().classify("open firefox");
        assert_eq!(m.intent, "open_app");
        assert_eq!(m.entities.get("app_name").map(String::as_str), Some("firefox"));

        let m = classifier().classify("launch the calculator app");
        assert_eq!(m.intent, "open_app");
        assert_eq!(
            m.entities.get("app_name").map(String::as_str),
            Some("calculator")
        );
    }

    #[test]
    fn open_app_with_leading_words_still_extracts_entity() {
        let m = classifier().classify("could you open firefox");
        assert_eq!(m.intent, "open_app");
        assert_eq!(m.entities.get("app_name").map(String::as_str), Some("firefox"));

        // "reopen" is not an open command
        let m = classifier().classify("reopen the case");
        assert!(m.entities.get("app_name").is_none());
    }

    #[test]
    fn volume_set_extracts_clamped_level() {
        let m = classifier().classify("set volume to 40");
        assert_eq!(m.intent, "volume_set");
        assert_eq!(m.entities.get("volume").map(String::as_str), Some("40"));

        let m = classifier().classify("set volume to 300");
        assert_eq!(m.entities.get("volume").map(String::as_str), Some("100"));
    }

    #[test]
    fn tie_break_prefers_first_declared_intent() {
        let mut vocab = Vocabulary::new();
        vocab.insert("first".to_string(), vec!["same phrase".to_string()]);
        vocab.insert("second".to_string(), vec!["same phrase".to_string()]);
        let c = IntentClassifier::new(vocab, 70.0, "");
        let m = c.classify("same phrase");
        assert_eq!(m.intent, "first");
    }

    #[test]
    fn single_word_phrase_does_not_match_inside_words() {
        // "hi" must not light up inside "this"
        let m = classifier().classify("what is this thing");
        assert_ne!(m.intent, "greeting");
    }

    #[test]
    fn partial_ratio_bounds() {
        assert_eq!(partial_ratio("abc", "abc"), 100.0);
        assert_eq!(partial_ratio("", "anything"), 0.0);
        let score = partial_ratio("pause music", "please pause music now");
        assert!(score >= 99.0, "embedded phrase should score ~100, got {score}");
    }
}
