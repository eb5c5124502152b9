//! # grocha-config
//!
//! Configuration system for the Grocha runtime. Reads from `grocha.toml`,
//! environment variables, and CLI overrides, in that precedence order.
//!
//! Supports hot-reload via filesystem watcher.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::GrochaConfig;
pub use schema::{ConfigWarning, FaultMode, WarningSeverity};
