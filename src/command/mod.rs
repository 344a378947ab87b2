//! Command routing and execution
//!
//! A classified intent becomes a typed [`CommandRequest`], which a
//! [`CommandExecutor`] turns into a side effect. Execution never unwinds
//! the session loop: every outcome, including failure, is a
//! [`CommandResult`].

mod os;
mod router;

pub use os::OsCommands;
pub use router::{CommandRouter, CLARIFICATION, FAREWELL};

/// A typed OS action derived from an intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandRequest {
    Lock,
    OpenApp { app_name: String },
    VolumeUp,
    VolumeDown,
    VolumeSet { level: u8 },
    TimeQuery,
    DateQuery,
    SystemInfo,
    MediaPlay,
    MediaPause,
    MediaStop,
    MediaNext,
    MediaPrevious,
    Shutdown,
    Restart,
}

/// Outcome of one dispatched command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Whether the action succeeded
    pub success: bool,

    /// User-facing message, spoken back
    pub message: String,

    /// Set only by the reserved stop intent; the single legitimate way a
    /// command terminates the session from inside the pipeline
    pub should_stop_session: bool,
}

impl CommandResult {
    /// Successful result
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            should_stop_session: false,
        }
    }

    /// Failed result; reported, never thrown
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            should_stop_session: false,
        }
    }

    /// Successful result that also ends the session
    #[must_use]
    pub fn stop(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            should_stop_session: true,
        }
    }
}

/// Executes side-effecting OS actions
///
/// Handlers are synchronous with bounded latency and report failures in
/// the result rather than returning errors.
pub trait CommandExecutor: Send {
    fn execute(&self, request: &CommandRequest) -> CommandResult;
}
