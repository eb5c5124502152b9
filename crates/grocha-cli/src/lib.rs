//! # grocha-cli
//!
//! Command-line interface for the Grocha guild companion.
//!
//! ## Commands
//!
//! - `grocha start`: Connect to Discord and serve every guild
//! - `grocha config`: Show the effective configuration
//! - `grocha check`: Audit the configuration
//! - `grocha version`: Show version and build info
//! - `grocha completions`: Generate shell completions

pub mod commands;

pub use commands::{Cli, resolve_log_level};
