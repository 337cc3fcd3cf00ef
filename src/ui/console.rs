use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::core::constants::timeouts;
use crate::loading::layer::{Extent, FitOptions, LayerSpec};
use crate::sinks::{MapLayer, StatusKind, StatusSink};

/// Status display for the terminal: a spinner while loading and one line
/// per status change, all on stderr.
pub struct ConsoleStatus {
    enabled: bool,
    spinner: Mutex<Option<Spinner>>,
}

struct Spinner {
    bar: ProgressBar,
    message: String,
}

impl ConsoleStatus {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            spinner: Mutex::new(None),
        }
    }

    fn spinner(&self) -> MutexGuard<'_, Option<Spinner>> {
        self.spinner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn println(&self, line: String) {
        match self.spinner().as_ref() {
            Some(spinner) => spinner.bar.println(line),
            None => eprintln!("{line}"),
        }
    }
}

fn spinner_text(message: &str, progress: Option<&str>) -> String {
    match progress {
        Some(progress) if !progress.is_empty() => format!("{message} {progress}"),
        _ => message.to_string(),
    }
}

impl StatusSink for ConsoleStatus {
    fn set_status(&self, message: &str, kind: StatusKind, details: Option<&Value>) {
        if !self.enabled {
            return;
        }

        let marker = match kind {
            StatusKind::Info => "✓",
            StatusKind::Error => "✗",
        };
        self.println(format!("{marker} {message}"));

        if let Some(details) = details {
            let pretty = serde_json::to_string_pretty(details).unwrap_or_else(|_| details.to_string());
            self.println(pretty);
        }
    }

    fn show_loading(&self, message: &str, progress: Option<&str>) {
        if !self.enabled {
            return;
        }

        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(spinner_text(message, progress));
        bar.enable_steady_tick(Duration::from_millis(timeouts::SPINNER_TICK_MS));

        if let Some(previous) = self.spinner().replace(Spinner {
            bar,
            message: message.to_string(),
        }) {
            previous.bar.finish_and_clear();
        }
    }

    fn update_progress(&self, progress: &str) {
        if let Some(spinner) = self.spinner().as_ref() {
            spinner
                .bar
                .set_message(spinner_text(&spinner.message, Some(progress)));
        }
    }

    fn hide_loading(&self) {
        if let Some(spinner) = self.spinner().take() {
            spinner.bar.finish_and_clear();
        }
    }
}

/// Stand-in for a map widget: reports layer changes on stderr.
pub struct ConsoleMap {
    enabled: bool,
}

impl ConsoleMap {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl MapLayer for ConsoleMap {
    fn add_layer(&self, layer: &LayerSpec) {
        if self.enabled {
            eprintln!("+ {} layer {}", layer.kind, layer.source_url);
        }
    }

    fn remove_layer(&self) {
        log::debug!("Layer removed");
    }

    fn fit_extent(&self, extent: &Extent, options: &FitOptions) {
        if self.enabled {
            eprintln!(
                "→ view {extent} (padding {}px, {}ms)",
                options.padding[0], options.duration_ms
            );
        }
    }
}
