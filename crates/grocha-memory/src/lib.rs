//! # grocha-memory
//!
//! Durable per-guild memory for Grocha:
//!
//! - **Memory store**: one JSON object document per guild, rewritten in full
//!   (write-to-temp then rename) after every mutation.
//! - **Autoreact table**: `word → emoji set`, kept under the `autoreact` key
//!   of the document and pruned against the live emoji directory on load.
//!
//! Subsystems share the document namespace; the top-level keys each one owns
//! are listed in [`keys`].

pub mod autoreact;
pub mod store;

pub use autoreact::AutoreactTable;
pub use store::{Document, FileBackend, InMemoryBackend, MemoryBackend, MemoryStore, keys};
