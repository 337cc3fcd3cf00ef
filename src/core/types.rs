use serde::Serialize;
use std::fmt;

/// Canonical, lowercase form of a hostname produced by the normalizer.
///
/// IPv4-like inputs are dotted decimal and IPv6-like inputs carry no
/// brackets. Build one with [`crate::admission::normalize`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedHost(String);

impl NormalizedHost {
    pub(crate) fn new(host: String) -> Self {
        Self(host)
    }

    /// Get the host as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedHost {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Reasons the admission gate refuses a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AdmissionError {
    /// Empty or oversized input
    InvalidInput,
    /// Not parseable as an absolute URL
    MalformedUrl,
    /// Scheme other than http/https
    UnsupportedScheme,
    /// Userinfo embedded in the URL
    CredentialsPresent,
    /// Host resolves to a private, reserved or metadata address
    BlockedAddress,
    /// Explicit port of an internal service
    BlockedPort,
}

impl fmt::Display for AdmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput => write!(f, "URL is required and must be at most 2048 characters"),
            Self::MalformedUrl => write!(f, "Invalid URL format"),
            Self::UnsupportedScheme => write!(f, "Only HTTP/HTTPS URLs are allowed"),
            Self::CredentialsPresent => write!(f, "URLs with credentials are not allowed"),
            Self::BlockedAddress => write!(f, "Local/private network URLs are not allowed"),
            Self::BlockedPort => write!(f, "Access to this port is not allowed"),
        }
    }
}

impl std::error::Error for AdmissionError {}

/// Outcome of a single admission check.
///
/// Exactly one of `error` and `normalized_url` is set, matching `valid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<AdmissionError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized_url: Option<String>,
}

impl ValidationResult {
    /// Create an accepting result carrying the canonical URL.
    pub fn accepted(normalized_url: String) -> Self {
        Self {
            valid: true,
            error: None,
            normalized_url: Some(normalized_url),
        }
    }

    /// Create a rejecting result.
    pub fn rejected(error: AdmissionError) -> Self {
        Self {
            valid: false,
            error: Some(error),
            normalized_url: None,
        }
    }

    /// Human-readable rejection message, if any.
    pub fn error_message(&self) -> Option<String> {
        self.error.map(|e| e.to_string())
    }

    /// Convert into a `Result`, which is what most callers want.
    pub fn into_result(self) -> Result<String, AdmissionError> {
        match (self.normalized_url, self.error) {
            (Some(url), None) => Ok(url),
            (_, Some(err)) => Err(err),
            (None, None) => Err(AdmissionError::InvalidInput),
        }
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.normalized_url, &self.error) {
            (Some(url), _) => write!(f, "OK {url}"),
            (None, Some(err)) => write!(f, "REJECTED {err:?} - {err}"),
            (None, None) => write!(f, "REJECTED"),
        }
    }
}
