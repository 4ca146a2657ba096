//! User-visible messages for user-initiated actions
//!
//! The tray process has no window of its own, so each notice is shown by a
//! short-lived child process running the egui notice window.

use std::thread;
use tracing::{error, info, warn};

use crate::gui;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_arg(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, severity: Severity, title: &str, message: &str);
}

/// Shows each notice in its own `bongo-bridge notice` window
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowNotifier;

impl Notifier for WindowNotifier {
    fn notify(&self, severity: Severity, title: &str, message: &str) {
        match severity {
            Severity::Info => info!(title, message, "Notice"),
            Severity::Warning => warn!(title, message, "Notice"),
            Severity::Error => error!(title, message, "Notice"),
        }

        let args = [
            "notice",
            "--level",
            severity.as_arg(),
            "--title",
            title,
            "--message",
            message,
        ];
        match gui::spawn_self(&args) {
            // Reap the window in the background so it never lingers as a zombie
            Ok(mut child) => {
                thread::spawn(move || {
                    let _ = child.wait();
                });
            }
            Err(e) => error!(error = ?e, "Failed to show notice window"),
        }
    }
}

#[cfg(test)]
pub mod recording {
    use super::*;
    use std::sync::Mutex;

    /// Keeps every notice for assertions
    #[derive(Default)]
    pub struct RecordingNotifier {
        notices: Mutex<Vec<(Severity, String)>>,
    }

    impl RecordingNotifier {
        pub fn severities(&self) -> Vec<Severity> {
            self.notices.lock().unwrap().iter().map(|(s, _)| *s).collect()
        }

        pub fn titles(&self) -> Vec<String> {
            self.notices.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, severity: Severity, title: &str, _message: &str) {
            self.notices.lock().unwrap().push((severity, title.to_string()));
        }
    }
}
