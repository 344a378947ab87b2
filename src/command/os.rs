//! OS command handlers
//!
//! Each handler shells out to the platform tool for the action and reports
//! the outcome in a [`CommandResult`]. Failures (tool missing, non-zero
//! exit) are messages, not errors; the session keeps running.

use std::process::Command;

use chrono::Local;

use super::{CommandExecutor, CommandRequest, CommandResult};

/// Default executor backed by platform commands
#[derive(Debug, Default)]
pub struct OsCommands;

impl OsCommands {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn lock(&self) -> CommandResult {
        #[cfg(target_os = "linux")]
        {
            run("loginctl", &["lock-session"], "Locking the screen.")
        }
        #[cfg(target_os = "macos")]
        {
            run("pmset", &["displaysleepnow"], "Locking the screen.")
        }
        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            CommandResult::failure("Screen locking is not supported on this platform.")
        }
    }

    fn open_app(&self, app_name: &str) -> CommandResult {
        if !app_name
            .chars()
            .all(|c| c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' || c == '.')
        {
            return CommandResult::failure(format!("I can't open \"{app_name}\"."));
        }

        #[cfg(target_os = "macos")]
        let spawn = Command::new("open").args(["-a", app_name]).spawn();
        #[cfg(not(target_os = "macos"))]
        let spawn = Command::new(app_name).spawn();

        match spawn {
            Ok(_) => CommandResult::ok(format!("Opening {app_name}.")),
            Err(e) => {
                tracing::warn!(app = app_name, error = %e, "open app failed");
                CommandResult::failure(format!("I couldn't find an application called {app_name}."))
            }
        }
    }

    fn volume(&self, delta: &str, message: &str) -> CommandResult {
        #[cfg(target_os = "linux")]
        {
            run(
                "pactl",
                &["set-sink-volume", "@DEFAULT_SINK@", delta],
                message,
            )
        }
        #[cfg(target_os = "macos")]
        {
            let script = match delta {
                d if d.starts_with('+') => {
                    "set volume output volume ((output volume of (get volume settings)) + 10)"
                        .to_string()
                }
                d if d.starts_with('-') => {
                    "set volume output volume ((output volume of (get volume settings)) - 10)"
                        .to_string()
                }
                d => format!("set volume output volume {}", d.trim_end_matches('%')),
            };
            run("osascript", &["-e", script.as_str()], message)
        }
        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            let _ = (delta, message);
            CommandResult::failure("Volume control is not supported on this platform.")
        }
    }

    fn media(&self, action: &str, message: &str) -> CommandResult {
        #[cfg(target_os = "linux")]
        {
            run("playerctl", &[action], message)
        }
        #[cfg(not(target_os = "linux"))]
        {
            let _ = (action, message);
            CommandResult::failure("Media control is not supported on this platform.")
        }
    }

    fn shutdown(&self) -> CommandResult {
        #[cfg(target_os = "linux")]
        {
            run("systemctl", &["poweroff"], "Shutting down the computer.")
        }
        #[cfg(target_os = "macos")]
        {
            run(
                "osascript",
                &["-e", "tell app \"System Events\" to shut down"],
                "Shutting down the computer.",
            )
        }
        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            CommandResult::failure("Shutdown is not supported on this platform.")
        }
    }

    fn restart(&self) -> CommandResult {
        #[cfg(target_os = "linux")]
        {
            run("systemctl", &["reboot"], "Restarting the computer.")
        }
        #[cfg(target_os = "macos")]
        {
            run(
                "osascript",
                &["-e", "tell app \"System Events\" to restart"],
                "Restarting the computer.",
            )
        }
        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            CommandResult::failure("Restart is not supported on this platform.")
        }
    }

    fn time_query(&self) -> CommandResult {
        let now = Local::now();
        CommandResult::ok(format!("It's {}.", now.format("%-I:%M %p")))
    }

    fn date_query(&self) -> CommandResult {
        let now = Local::now();
        CommandResult::ok(format!("Today is {}.", now.format("%A, %B %-d")))
    }

    fn system_info(&self) -> CommandResult {
        CommandResult::ok(format!(
            "Running {} on {}.",
            std::env::consts::OS,
            std::env::consts::ARCH
        ))
    }
}

impl CommandExecutor for OsCommands {
    fn execute(&self, request: &CommandRequest) -> CommandResult {
        match request {
            CommandRequest::Lock => self.lock(),
            CommandRequest::OpenApp { app_name } => self.open_app(app_name),
            CommandRequest::VolumeUp => self.volume("+10%", "Volume up."),
            CommandRequest::VolumeDown => self.volume("-10%", "Volume down."),
            CommandRequest::VolumeSet { level } => {
                let level = (*level).min(100);
                self.volume(&format!("{level}%"), &format!("Volume set to {level} percent."))
            }
            CommandRequest::TimeQuery => self.time_query(),
            CommandRequest::DateQuery => self.date_query(),
            CommandRequest::SystemInfo => self.system_info(),
            CommandRequest::MediaPlay => self.media("play", "Playing."),
            CommandRequest::MediaPause => self.media("pause", "Paused."),
            CommandRequest::MediaStop => self.media("stop", "Stopped playback."),
            CommandRequest::MediaNext => self.media("next", "Next track."),
            CommandRequest::MediaPrevious => self.media("previous", "Previous track."),
            CommandRequest::Shutdown => self.shutdown(),
            CommandRequest::Restart => self.restart(),
        }
    }
}

/// Run a one-shot platform command and fold its exit status into a result
#[allow(dead_code)]
fn run(program: &str, args: &[&str], ok_message: &str) -> CommandResult {
    match Command::new(program).args(args).output() {
        Ok(output) if output.status.success() => CommandResult::ok(ok_message),
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(program, ?args, stderr = %stderr.trim(), "command failed");
            CommandResult::failure(format!("The {program} command failed."))
        }
        Err(e) => {
            tracing::warn!(program, error = %e, "command not available");
            CommandResult::failure(format!("{program} is not available on this system."))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_query_contains_a_clock_reading() {
        let result = OsCommands::new().execute(&CommandRequest::TimeQuery);
        assert!(result.success);
        assert!(result.message.starts_with("It's "));
        assert!(result.message.contains(':'));
    }

    #[test]
    fn date_query_names_the_weekday() {
        let result = OsCommands::new().execute(&CommandRequest::DateQuery);
        assert!(result.success);
        assert!(result.message.starts_with("Today is "));
    }

    #[test]
    fn system_info_reports_platform() {
        let result = OsCommands::new().execute(&CommandRequest::SystemInfo);
        assert!(result.success);
        assert!(result.message.contains(std::env::consts::OS));
    }

    #[test]
    fn suspicious_app_name_is_rejected() {
        let result = OsCommands::new().execute(&CommandRequest::OpenApp {
            app_name: "firefox; rm -rf /".to_string(),
        });
        assert!(!result.success);
    }

    #[test]
    fn handlers_never_panic() {
        // Every request variant must produce a result, success or not.
        let requests = [
            CommandRequest::VolumeUp,
            CommandRequest::VolumeDown,
            CommandRequest::VolumeSet { level: 200 },
            CommandRequest::MediaPause,
        ];
        for request in &requests {
            let _ = OsCommands::new().execute(request);
        }
    }
}
