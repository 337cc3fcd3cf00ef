//! Collaborators a load session reports to
//!
//! The map engine, the status display and the activity log transport are
//! capabilities supplied by the embedding application. This module defines
//! them as traits and provides log-based and in-memory implementations.

use log::{debug, info};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinSet;

use crate::loading::layer::{Extent, FitOptions, LayerSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Info,
    Error,
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusKind::Info => write!(f, "info"),
            StatusKind::Error => write!(f, "error"),
        }
    }
}

/// The rendering engine. Holds at most one resource layer at a time.
pub trait MapLayer: Send + Sync {
    fn add_layer(&self, layer: &LayerSpec);
    fn remove_layer(&self);
    fn fit_extent(&self, extent: &Extent, options: &FitOptions);
}

/// Where the user sees what is going on.
pub trait StatusSink: Send + Sync {
    fn set_status(&self, message: &str, kind: StatusKind, details: Option<&Value>);
    fn show_loading(&self, message: &str, progress: Option<&str>);
    fn update_progress(&self, progress: &str);
    fn hide_loading(&self);
}

/// Fire-and-forget event log. Implementations must not block and must
/// swallow delivery failures.
pub trait ActivityLog: Send + Sync {
    fn record(&self, event: &str, fields: Value);
}

/// Writes every event as a single JSON `info!` line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogActivity;

impl ActivityLog for LogActivity {
    fn record(&self, event: &str, fields: Value) {
        let entry = json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "action": event,
            "data": fields,
        });
        info!("[activity] {entry}");
    }
}

/// Forwards events to another log and additionally POSTs error-level
/// events (`"level": "error"` in the fields) to a backend endpoint.
///
/// Reports are sent in the background. Call [`flush`](Self::flush) before
/// shutting the runtime down or the last ones may never leave the process.
pub struct BackendReporter {
    inner: Arc<dyn ActivityLog>,
    client: reqwest::Client,
    endpoint: String,
    in_flight: Mutex<JoinSet<()>>,
}

impl BackendReporter {
    pub fn new(inner: Arc<dyn ActivityLog>, client: reqwest::Client, endpoint: String) -> Self {
        Self {
            inner,
            client,
            endpoint,
            in_flight: Mutex::new(JoinSet::new()),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Wait for every report sent so far. Delivery failures are ignored.
    pub async fn flush(&self) {
        let mut pending = std::mem::take(&mut *lock(&self.in_flight));
        while pending.join_next().await.is_some() {}
    }

    fn payload(event: &str, fields: &Value) -> Value {
        let mut body = Map::new();
        body.insert(
            "timestamp".to_string(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );
        body.insert("action".to_string(), Value::String(event.to_string()));
        if let Value::Object(fields) = fields {
            body.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        Value::Object(body)
    }
}

impl ActivityLog for BackendReporter {
    fn record(&self, event: &str, fields: Value) {
        let is_error = fields.get("level").and_then(Value::as_str) == Some("error");
        if is_error {
            let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                debug!("No async runtime, not reporting {event}");
                self.inner.record(event, fields);
                return;
            };

            let request = self
                .client
                .post(&self.endpoint)
                .json(&Self::payload(event, &fields));
            let event = event.to_string();
            let mut in_flight = lock(&self.in_flight);
            while in_flight.try_join_next().is_some() {}
            in_flight.spawn_on(
                async move {
                    if let Err(e) = request.send().await {
                        debug!("Failed to report {event}: {e}");
                    }
                },
                &runtime,
            );
        }

        self.inner.record(event, fields);
    }
}

impl fmt::Debug for BackendReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendReporter")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapCall {
    Add(LayerSpec),
    Remove,
    Fit(Extent, FitOptions),
}

/// Map that remembers the calls it received
#[derive(Debug, Default)]
pub struct MemoryMap {
    calls: Mutex<Vec<MapCall>>,
}

impl MemoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<MapCall> {
        lock(&self.calls).clone()
    }

    /// The layer currently on the map.
    pub fn current_layer(&self) -> Option<LayerSpec> {
        lock(&self.calls)
            .iter()
            .fold(None, |current, call| match call {
                MapCall::Add(layer) => Some(layer.clone()),
                MapCall::Remove => None,
                MapCall::Fit(..) => current,
            })
    }
}

impl MapLayer for MemoryMap {
    fn add_layer(&self, layer: &LayerSpec) {
        lock(&self.calls).push(MapCall::Add(layer.clone()));
    }

    fn remove_layer(&self) {
        lock(&self.calls).push(MapCall::Remove);
    }

    fn fit_extent(&self, extent: &Extent, options: &FitOptions) {
        lock(&self.calls).push(MapCall::Fit(*extent, *options));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusEntry {
    pub message: String,
    pub kind: StatusKind,
    pub details: Option<Value>,
}

/// Status display that keeps a history of everything shown
#[derive(Debug, Default)]
pub struct MemoryStatus {
    history: Mutex<Vec<StatusEntry>>,
    loading: Mutex<Option<String>>,
    progress: Mutex<Vec<String>>,
}

impl MemoryStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<StatusEntry> {
        lock(&self.history).clone()
    }

    pub fn last(&self) -> Option<StatusEntry> {
        lock(&self.history).last().cloned()
    }

    /// Message of the loading indicator if it is shown.
    pub fn loading(&self) -> Option<String> {
        lock(&self.loading).clone()
    }

    pub fn progress(&self) -> Vec<String> {
        lock(&self.progress).clone()
    }
}

impl StatusSink for MemoryStatus {
    fn set_status(&self, message: &str, kind: StatusKind, details: Option<&Value>) {
        lock(&self.history).push(StatusEntry {
            message: message.to_string(),
            kind,
            details: details.cloned(),
        });
    }

    fn show_loading(&self, message: &str, progress: Option<&str>) {
        *lock(&self.loading) = Some(message.to_string());
        if let Some(progress) = progress {
            lock(&self.progress).push(progress.to_string());
        }
    }

    fn update_progress(&self, progress: &str) {
        lock(&self.progress).push(progress.to_string());
    }

    fn hide_loading(&self) {
        *lock(&self.loading) = None;
    }
}

/// Activity log kept in memory
#[derive(Debug, Default)]
pub struct MemoryActivity {
    events: Mutex<Vec<(String, Value)>>,
}

impl MemoryActivity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, Value)> {
        lock(&self.events).clone()
    }

    pub fn names(&self) -> Vec<String> {
        lock(&self.events).iter().map(|(name, _)| name.clone()).collect()
    }
}

impl ActivityLog for MemoryActivity {
    fn record(&self, event: &str, fields: Value) {
        lock(&self.events).push((event.to_string(), fields));
    }
}
