//! Upward notifications and the per-session error latch

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info};

/// Sink for user-facing messages
///
/// Fire-and-forget; implementations must not block.
pub trait Notifier: Send + Sync {
    fn show_information(&self, title: &str, detail: &str);
    fn show_error(&self, message: &str);
}

/// Writes notifications to the log (headless mode)
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn show_information(&self, title: &str, detail: &str) {
        info!(detail, "{title}");
    }

    fn show_error(&self, message: &str) {
        error!("{message}");
    }
}

/// Lets exactly one fatal error through per failure episode
///
/// Several async paths may notice the same failure; the first to
/// [`report`](Self::report) shows it, the rest are dropped until
/// [`reset`](Self::reset) starts a new episode.
#[derive(Debug, Default)]
pub struct ErrorLatch {
    fired: AtomicBool,
}

impl ErrorLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show `message` unless this episode already reported; returns whether it was shown
    pub fn report(&self, notifier: &dyn Notifier, message: &str) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            return false;
        }
        notifier.show_error(message);
        true
    }

    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.fired.store(false, Ordering::SeqCst);
    }
}

const RESCAN_HINT_AFTER: usize = 10;

/// Status text shown while connecting
///
/// Rotates trailing dots on warm-up messages and, once a wallet rescan has
/// been reported often enough, appends a hint that it may take hours.
#[derive(Debug, Default)]
pub struct ConnectStatus {
    dots: usize,
    rescan_updates: usize,
}

impl ConnectStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the last three characters of `message` with 0-3 rotating dots
    pub fn rotate(&mut self, message: &str) -> String {
        let keep = message.chars().count().saturating_sub(3);
        let mut status: String = message.chars().take(keep).collect();
        status.push_str(&".".repeat(self.dots));
        self.dots = (self.dots + 1) % 4;
        status
    }

    /// Decorate `detail` and report whether the update is still worth logging
    pub fn decorate(&mut self, detail: &str) -> (String, bool) {
        if detail.to_lowercase().starts_with("rescan") {
            self.rescan_updates += 1;
        }
        let detail = if self.rescan_updates > RESCAN_HINT_AFTER {
            format!("{detail}\nThis may take several hours")
        } else {
            detail.to_string()
        };
        (detail, self.rescan_updates < RESCAN_HINT_AFTER)
    }
}

/// Notifier that keeps everything it was told (tests and scripted callers)
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub infos: Mutex<Vec<(String, String)>>,
    pub errors: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn infos(&self) -> Vec<(String, String)> {
        self.infos.lock().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn show_information(&self, title: &str, detail: &str) {
        self.infos.lock().push((title.to_string(), detail.to_string()));
    }

    fn show_error(&self, message: &str) {
        self.errors.lock().push(message.to_string());
    }
}
