//! # grocha-core
//!
//! Core types and primitives for the Grocha guild companion.
//! This crate defines the shared vocabulary used by every other crate in the workspace:
//! the unified error type, platform identifiers, emoji references and the
//! accent-insensitive text normalization every command relies on.

pub mod emoji;
pub mod error;
pub mod text;
pub mod types;

pub use emoji::{CustomEmoji, EmojiRef};
pub use error::{GrochaError, Result};
pub use types::*;
