//! User interface and interaction
//!
//! This module contains the CLI definitions and the terminal
//! implementations of the status and map collaborators.

pub mod cli;
pub mod console;

// Re-export commonly used items
pub use cli::{Cli, Commands, cli_to_config};
pub use console::{ConsoleMap, ConsoleStatus};
