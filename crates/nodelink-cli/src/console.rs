//! Terminal rendering of connection notifications

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use nodelink_client::{DownloadProgress, Notifier, TracingNotifier};
use std::sync::Arc;
use std::time::Duration;

/// Shows startup progress on a spinner and errors on stderr
pub struct ConsoleNotifier {
    spinner: ProgressBar,
}

impl ConsoleNotifier {
    pub fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg} [{elapsed_precise}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));
        Self { spinner }
    }

    pub fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for ConsoleNotifier {
    fn show_information(&self, title: &str, detail: &str) {
        if detail.is_empty() {
            self.spinner.set_message(title.cyan().to_string());
        } else {
            self.spinner
                .set_message(format!("{} {}", title.cyan(), detail.dimmed()));
        }
    }

    fn show_error(&self, message: &str) {
        self.spinner
            .suspend(|| eprintln!("{} {}", "Error:".red().bold(), message));
    }
}

/// Notifier for the run plus a hook to clear it once done
pub struct Output {
    console: Option<Arc<ConsoleNotifier>>,
}

impl Output {
    pub fn new(headless: bool) -> Self {
        let console = (!headless).then(|| Arc::new(ConsoleNotifier::new()));
        Self { console }
    }

    pub fn notifier(&self) -> Arc<dyn Notifier> {
        match &self.console {
            Some(console) => Arc::clone(console) as Arc<dyn Notifier>,
            None => Arc::new(TracingNotifier),
        }
    }

    pub fn finish(&self) {
        if let Some(console) = &self.console {
            console.finish();
        }
    }
}

/// Byte-level progress bar for parameter downloads
pub struct DownloadBar {
    bar: ProgressBar,
    file: String,
}

impl DownloadBar {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {bytes}/{total_bytes} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        Self {
            bar,
            file: String::new(),
        }
    }

    pub fn update(&mut self, progress: &DownloadProgress) {
        if progress.file != self.file {
            self.file = progress.file.clone();
            self.bar.reset();
            self.bar.set_message(progress.title());
        }
        if let Some(total) = progress.total {
            self.bar.set_length(total);
        }
        self.bar.set_position(progress.done);
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for DownloadBar {
    fn default() -> Self {
        Self::new()
    }
}
