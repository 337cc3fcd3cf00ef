//! # tilegate
//!
//! Admission control and cancellable loading for user-supplied map resource
//! URLs (TileJSON documents and STAC items).
//!
//! - [`admission`] decides whether a URL may be fetched at all. It rejects
//!   anything that could make the process talk to loopback, private,
//!   link-local or cloud-metadata addresses, including numerically encoded
//!   hosts such as `0x7f.0.0.1` or `2130706433`.
//! - [`loading`] runs fetch-and-render attempts. Attempts may overlap, but
//!   only the latest one is allowed to update the map and the status
//!   display, and each one has a hard deadline.
//!
//! ```
//! use tilegate::admission::validate;
//!
//! assert!(validate("https://example.com/tilejson.json", "").valid);
//! assert!(!validate("http://0177.0.0.1/", "").valid);
//! ```

// Module declarations
pub mod admission;
pub mod config;
pub mod core;
pub mod loading;
pub mod logging;
pub mod params;
pub mod sinks;
pub mod ui;

// Re-export commonly used items
pub use admission::{UrlAdmissionGate, validate};
pub use config::{CliConfig, Config};
pub use crate::core::types::AdmissionError;
pub use crate::core::{Result, TileGateError, ValidationResult};
pub use loading::{LoadCoordinator, LoadError, LoadOptions, LoadOutcome, LoadSession, LoadToken};
