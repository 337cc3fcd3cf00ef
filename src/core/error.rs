use std::fmt;

/// Crate-level error type for everything outside a single load attempt
#[derive(Debug)]
pub enum TileGateError {
    /// IO error (config file reads, etc.)
    Io(std::io::Error),

    /// Configuration error
    Config(String),

    /// HTTP client error
    Http(reqwest::Error),

    /// JSON (de)serialization error
    Json(serde_json::Error),

    /// TOML parsing error
    TomlParsing(toml::de::Error),
}

impl fmt::Display for TileGateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TileGateError::Io(err) => write!(f, "IO error: {err}"),
            TileGateError::Config(msg) => write!(f, "Configuration error: {msg}"),
            TileGateError::Http(err) => write!(f, "HTTP error: {err}"),
            TileGateError::Json(err) => write!(f, "JSON error: {err}"),
            TileGateError::TomlParsing(err) => write!(f, "TOML parsing error: {err}"),
        }
    }
}

impl std::error::Error for TileGateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TileGateError::Io(err) => Some(err),
            TileGateError::Http(err) => Some(err),
            TileGateError::Json(err) => Some(err),
            TileGateError::TomlParsing(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TileGateError {
    fn from(err: std::io::Error) -> Self {
        TileGateError::Io(err)
    }
}

impl From<reqwest::Error> for TileGateError {
    fn from(err: reqwest::Error) -> Self {
        TileGateError::Http(err)
    }
}

impl From<serde_json::Error> for TileGateError {
    fn from(err: serde_json::Error) -> Self {
        TileGateError::Json(err)
    }
}

impl From<toml::de::Error> for TileGateError {
    fn from(err: toml::de::Error) -> Self {
        TileGateError::TomlParsing(err)
    }
}

/// Type alias for Results using TileGateError
pub type Result<T> = std::result::Result<T, TileGateError>;
