use serde_json::Value;
use std::fmt;

use crate::core::constants::messages;

/// Why a load attempt that passed admission did not render
#[derive(Debug, Clone, PartialEq)]
pub enum LoadError {
    /// Network error, non-success status or unparseable body
    FetchFailed(String),

    /// The attempt hit its deadline
    Timeout,

    /// The payload could not be turned into a layer
    LayerConstructionFailed(String),

    /// A feature collection without features; carries the raw payload
    EmptyResult(Value),
}

impl LoadError {
    /// Structured details to surface on demand next to the message.
    pub fn details(&self) -> Option<&Value> {
        match self {
            LoadError::EmptyResult(payload) => Some(payload),
            _ => None,
        }
    }

    /// Short event suffix used in activity records.
    pub fn event_suffix(&self) -> &'static str {
        use crate::core::constants::events;

        match self {
            LoadError::FetchFailed(_) => events::FETCH_ERROR,
            LoadError::Timeout => events::TIMEOUT,
            LoadError::LayerConstructionFailed(_) => events::LAYER_ERROR,
            LoadError::EmptyResult(_) => events::EMPTY_FEATURES,
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::FetchFailed(msg) => write!(f, "Failed to fetch data: {msg}"),
            LoadError::Timeout => write!(f, "{}", messages::TIMED_OUT),
            LoadError::LayerConstructionFailed(msg) => write!(f, "Error creating layer: {msg}"),
            LoadError::EmptyResult(_) => write!(f, "{}", messages::EMPTY_RESULT),
        }
    }
}

impl std::error::Error for LoadError {}
