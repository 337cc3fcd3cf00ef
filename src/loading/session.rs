use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tokio::time::{Duration, timeout_at};

use super::coordinator::LoadCoordinator;
use super::error::LoadError;
use super::fetcher::Fetcher;
use super::layer::{FitOptions, LayerSpec, ResourceKind, build_layer};
use super::token::{LoadToken, TokenState};
use crate::admission::UrlAdmissionGate;
use crate::core::constants::{events, messages, timeouts};
use crate::core::types::AdmissionError;
use crate::logging;
use crate::params::{TileJsonParams, apply_tilejson_params};
use crate::sinks::{ActivityLog, MapLayer, StatusKind, StatusSink};

/// Per-load options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Move the view onto the new layer's extent
    pub recenter: bool,
    /// Applied to TileJSON URLs only
    pub tilejson: TileJsonParams,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            recenter: true,
            tilejson: TileJsonParams::default(),
        }
    }
}

/// How a call to [`LoadSession::load`] ended
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Rendered(LayerSpec),
    Rejected(AdmissionError),
    Failed(LoadError),
    TimedOut,
    /// A newer load started first; nothing was touched
    Superseded,
}

impl LoadOutcome {
    pub fn is_rendered(&self) -> bool {
        matches!(self, LoadOutcome::Rendered(_))
    }
}

impl fmt::Display for LoadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadOutcome::Rendered(layer) => {
                write!(f, "{}{}", messages::LOADED_PREFIX, layer.source_url)
            }
            LoadOutcome::Rejected(err) => write!(f, "{err}"),
            LoadOutcome::Failed(err) => write!(f, "{err}"),
            LoadOutcome::TimedOut => write!(f, "{}", messages::TIMED_OUT),
            LoadOutcome::Superseded => write!(f, "Superseded by a newer load"),
        }
    }
}

/// Validates, fetches and renders user-supplied resource URLs.
///
/// Each call to [`load`](Self::load) is one attempt. Attempts may overlap;
/// the coordinator guarantees that only the latest one reaches the map,
/// the status sink and the activity log once its fetch has returned.
pub struct LoadSession {
    gate: UrlAdmissionGate,
    coordinator: LoadCoordinator,
    fetcher: Arc<dyn Fetcher>,
    map: Arc<dyn MapLayer>,
    status: Arc<dyn StatusSink>,
    activity: Arc<dyn ActivityLog>,
    timeout: Duration,
}

impl LoadSession {
    pub fn new(
        gate: UrlAdmissionGate,
        fetcher: Arc<dyn Fetcher>,
        map: Arc<dyn MapLayer>,
        status: Arc<dyn StatusSink>,
        activity: Arc<dyn ActivityLog>,
    ) -> Self {
        Self {
            gate,
            coordinator: LoadCoordinator::new(),
            fetcher,
            map,
            status,
            activity,
            timeout: Duration::from_millis(timeouts::DEFAULT_LOAD_TIMEOUT_MS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn coordinator(&self) -> &LoadCoordinator {
        &self.coordinator
    }

    /// Load `raw` and show it on the map.
    pub async fn load(&self, raw: &str, options: &LoadOptions) -> LoadOutcome {
        let verdict = self.gate.validate(raw);
        logging::log_admission(raw, &verdict);

        let url = match verdict.into_result() {
            Ok(url) => url,
            Err(err) => {
                self.status
                    .set_status(&err.to_string(), StatusKind::Error, None);
                self.activity.record(
                    events::URL_REJECTED,
                    json!({ "url": raw, "reason": format!("{err:?}"), "error": err.to_string() }),
                );
                return LoadOutcome::Rejected(err);
            }
        };

        let kind = ResourceKind::detect(&url);
        let url = match kind {
            ResourceKind::TileJson => apply_tilejson_params(&url, &options.tilejson),
            ResourceKind::Stac => url,
        };

        let token = self
            .coordinator
            .create_token(self.timeout, self.timeout_handler(kind, &url));

        self.activity
            .record(&event_name(kind, events::LOAD_ATTEMPT), json!({ "url": url }));
        self.status
            .show_loading(kind.loading_message(), Some(messages::FETCHING));
        self.map.remove_layer();

        let fetched = match timeout_at(token.deadline(), self.fetcher.fetch_json(&url)).await {
            Ok(fetched) => fetched,
            Err(_) => {
                // The deadline timer may or may not have run yet
                self.coordinator.expire(&token);
                return self.stale(&url, &token);
            }
        };

        if !self.coordinator.complete(&token) {
            return self.stale(&url, &token);
        }

        let payload = match fetched {
            Ok(payload) => payload,
            Err(err) => return self.fail(kind, &url, err),
        };
        self.activity
            .record(&event_name(kind, events::LOAD_SUCCESS), json!({ "url": url }));

        self.status.update_progress(messages::PARSING);
        let layer = match build_layer(kind, &url, &payload) {
            Ok(layer) => layer,
            Err(err) => return self.fail(kind, &url, err),
        };

        self.status.update_progress(messages::CREATING_LAYER);
        self.map.add_layer(&layer);
        if options.recenter
            && let Some(extent) = layer.extent
        {
            self.map.fit_extent(&extent, &FitOptions::default());
        }

        self.status.hide_loading();
        self.status.set_status(
            &format!("{}{url}", messages::LOADED_PREFIX),
            StatusKind::Info,
            None,
        );
        self.activity.record(
            &event_name(kind, events::RENDERED),
            json!({ "url": url, "extent": layer.extent }),
        );

        let outcome = LoadOutcome::Rendered(layer);
        logging::log_load_outcome(&url, &outcome);
        outcome
    }

    /// Stop tracking the in-flight attempt, e.g. when the view goes away.
    /// Its result will be discarded and its timeout never fires.
    pub fn cancel(&self) -> bool {
        self.coordinator.cancel_current().is_some()
    }

    fn timeout_handler(
        &self,
        kind: ResourceKind,
        url: &str,
    ) -> impl FnOnce(&LoadToken) + Send + 'static {
        let map = Arc::clone(&self.map);
        let status = Arc::clone(&self.status);
        let activity = Arc::clone(&self.activity);
        let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
        let url = url.to_string();

        move |_token: &LoadToken| {
            map.remove_layer();
            status.hide_loading();
            status.set_status(messages::TIMED_OUT, StatusKind::Error, None);
            activity.record(
                &event_name(kind, events::TIMEOUT),
                json!({ "url": url, "level": "error", "timeout_ms": timeout_ms }),
            );
        }
    }

    fn fail(&self, kind: ResourceKind, url: &str, err: LoadError) -> LoadOutcome {
        self.status.hide_loading();
        self.status
            .set_status(&err.to_string(), StatusKind::Error, err.details());

        let fields = match &err {
            // Nothing went wrong on our side, so no error level
            LoadError::EmptyResult(payload) => json!({ "url": url, "data": payload }),
            _ => json!({ "url": url, "error": err.to_string(), "level": "error" }),
        };
        self.activity
            .record(&event_name(kind, err.event_suffix()), fields);

        let outcome = LoadOutcome::Failed(err);
        logging::log_load_outcome(url, &outcome);
        outcome
    }

    /// Outcome for an attempt that may no longer touch anything.
    fn stale(&self, url: &str, token: &LoadToken) -> LoadOutcome {
        let outcome = match token.state() {
            TokenState::TimedOut => LoadOutcome::TimedOut,
            _ => LoadOutcome::Superseded,
        };
        logging::log_load_outcome(url, &outcome);
        outcome
    }
}

impl fmt::Debug for LoadSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadSession")
            .field("gate", &self.gate)
            .field("coordinator", &self.coordinator)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn event_name(kind: ResourceKind, suffix: &str) -> String {
    format!("{}_{suffix}", kind.label())
}
