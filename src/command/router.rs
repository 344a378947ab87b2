//! Routes classified intents to command execution

use rand::seq::SliceRandom;

use crate::config::STOP_INTENT;
use crate::intent::{IntentMatch, UNKNOWN_INTENT};

use super::{CommandExecutor, CommandRequest, CommandResult};

/// Fixed response for below-threshold transcripts
pub const CLARIFICATION: &str = "Sorry, I didn't understand that.";

/// Spoken before the session stops on a stop phrase
pub const FAREWELL: &str = "Shutting down. Goodbye.";

const GREETINGS: &[&str] = &[
    "Hello! How can I help you?",
    "Hi there! What can I do for you?",
    "Hey! I'm here to help.",
];

const THANKS_REPLIES: &[&str] = &["You're welcome!", "Happy to help!", "Anytime!"];

/// Maps intents to handlers and aggregates their results
pub struct CommandRouter {
    executor: Box<dyn CommandExecutor>,
}

impl CommandRouter {
    #[must_use]
    pub fn new(executor: Box<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    /// Route an intent to its handler
    ///
    /// Routing failures are recoverable results, never errors that unwind
    /// the session loop. The clarification path never touches the executor.
    #[must_use]
    pub fn route(&self, intent_match: &IntentMatch) -> CommandResult {
        let intent = intent_match.intent.as_str();
        tracing::info!(
            intent,
            confidence = intent_match.confidence,
            "command dispatched"
        );

        // Conversational intents are answered inline, no OS action.
        let mut rng = rand::thread_rng();
        let result = match intent {
            UNKNOWN_INTENT => CommandResult::failure(CLARIFICATION),
            STOP_INTENT => CommandResult::stop(FAREWELL),
            "greeting" => CommandResult::ok(*GREETINGS.choose(&mut rng).unwrap_or(&GREETINGS[0])),
            "thanks" => {
                CommandResult::ok(*THANKS_REPLIES.choose(&mut rng).unwrap_or(&THANKS_REPLIES[0]))
            }
            "goodbye" => CommandResult::ok("Goodbye! Have a great day!"),
            other => match to_request(other, intent_match) {
                Some(request) => self.executor.execute(&request),
                None => {
                    tracing::warn!(intent = other, "no handler registered");
                    CommandResult::failure(format!("I recognized \"{other}\" but have no handler for it."))
                }
            },
        };

        tracing::info!(
            intent,
            success = result.success,
            stop = result.should_stop_session,
            "command result"
        );
        result
    }
}

/// Translate a known intent into a typed request, if a handler exists
fn to_request(intent: &str, intent_match: &IntentMatch) -> Option<CommandRequest> {
    let request = match intent {
        "lock" => CommandRequest::Lock,
        "open_app" => CommandRequest::OpenApp {
            app_name: intent_match.entities.get("app_name")?.clone(),
        },
        "volume_up" => CommandRequest::VolumeUp,
        "volume_down" => CommandRequest::VolumeDown,
        "volume_set" => CommandRequest::VolumeSet {
            level: intent_match.entities.get("volume")?.parse().ok()?,
        },
        "time_query" => CommandRequest::TimeQuery,
        "date_query" => CommandRequest::DateQuery,
        "system_info" => CommandRequest::SystemInfo,
        "media_play" => CommandRequest::MediaPlay,
        "media_pause" => CommandRequest::MediaPause,
        "media_stop" => CommandRequest::MediaStop,
        "media_next" => CommandRequest::MediaNext,
        "media_previous" => CommandRequest::MediaPrevious,
        "power_off" => CommandRequest::Shutdown,
        "restart" => CommandRequest::Restart,
        _ => return None,
    };
    Some(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingExecutor {
        calls: Arc<AtomicUsize>,
    }

    impl CommandExecutor for CountingExecutor {
        fn execute(&self, _request: &CommandRequest) -> CommandResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            CommandResult::ok("done")
        }
    }

    fn router_with_counter() -> (CommandRouter, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let router = CommandRouter::new(Box::new(CountingExecutor {
            calls: Arc::clone(&calls),
        }));
        (router, calls)
    }

    fn a_match(intent: &str) -> IntentMatch {
        IntentMatch {
            intent: intent.to_string(),
            confidence: 0.9,
            matched_phrase: None,
            entities: HashMap::new(),
        }
    }

    #[test]
    fn unknown_returns_fixed_clarification_without_executing() {
        let (router, calls) = router_with_counter();
        let result = router.route(&a_match(UNKNOWN_INTENT));
        assert!(!result.success);
        assert_eq!(result.message, CLARIFICATION);
        assert!(!result.should_stop_session);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn stop_intent_sets_stop_flag_and_farewell() {
        let (router, calls) = router_with_counter();
        let result = router.route(&a_match(STOP_INTENT));
        assert!(result.success);
        assert!(result.should_stop_session);
        assert_eq!(result.message, FAREWELL);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn known_intent_reaches_executor() {
        let (router, calls) = router_with_counter();
        let result = router.route(&a_match("time_query"));
        assert!(result.success);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn power_and_media_stop_intents_reach_executor() {
        let (router, calls) = router_with_counter();
        for intent in ["media_stop", "power_off", "restart"] {
            let result = router.route(&a_match(intent));
            assert!(result.success, "{intent} should reach the executor");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn unregistered_intent_is_recoverable_failure() {
        let (router, calls) = router_with_counter();
        let result = router.route(&a_match("teleport"));
        assert!(!result.success);
        assert!(!result.should_stop_session);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn open_app_without_entity_does_not_execute() {
        let (router, calls) = router_with_counter();
        let result = router.route(&a_match("open_app"));
        assert!(!result.success);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn chat_intents_answered_inline() {
        let (router, calls) = router_with_counter();
        for intent in ["greeting", "thanks", "goodbye"] {
            let result = router.route(&a_match(intent));
            assert!(result.success, "{intent} should succeed");
            assert!(!result.message.is_empty());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
