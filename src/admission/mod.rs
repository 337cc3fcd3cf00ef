//! Untrusted-URL admission control
//!
//! Hostnames are normalized to defeat numeric-encoding tricks, classified
//! against a static blocklist of private, reserved and metadata addresses,
//! and finally the whole URL is checked for scheme, credentials, length and
//! port before anything is fetched.

pub mod classifier;
pub mod gate;
pub mod normalizer;

// Re-export commonly used items
pub use classifier::{BLOCK_RULES, BlockCategory, BlockRule, is_blocked, matching_rule};
pub use gate::{UrlAdmissionGate, admit, validate};
pub use normalizer::normalize;
