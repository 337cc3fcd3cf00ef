//! Fetch-and-render attempts with cancellation
//!
//! Only the most recently started attempt may touch the map or the status
//! display. Every attempt has a hard deadline; an attempt that is superseded
//! or times out has its result discarded.

pub mod coordinator;
pub mod error;
pub mod fetcher;
pub mod layer;
pub mod session;
pub mod token;

// Re-export commonly used items
pub use coordinator::{LoadCoordinator, TimeoutHandler};
pub use error::LoadError;
pub use fetcher::{Fetcher, HttpFetcher};
pub use layer::{Center, Extent, FitOptions, LayerSpec, ResourceKind, build_layer};
pub use session::{LoadOptions, LoadOutcome, LoadSession};
pub use token::{LoadToken, TokenState};
