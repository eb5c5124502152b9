//! # grocha-runtime
//!
//! Per-guild sessions and the loop that feeds them.
//!
//! ## Architecture
//!
//! ```text
//!              ┌──────────────┐
//!              │   Platform   │  ← Discord gateway (or the mock)
//!              └──────┬───────┘
//!                     │ PlatformEvent
//!                     ▼
//!              ┌──────────────┐
//!              │ GuildRuntime │  ← one ordered worker queue per guild
//!              └──────┬───────┘
//!                     ▼
//!              ┌──────────────┐
//!              │SessionManager│  ← lazily opened, one session per guild
//!              └──────┬───────┘
//!                     ▼
//!              ┌──────────────┐
//!              │ GuildSession │
//!              │  1. Route    │  ← first keyword wins
//!              │  2. Handle   │  ← command / approval / autoreact
//!              │  3. Persist  │  ← memory document rewritten
//!              │  4. Fault    │  ← apology + diagnostics
//!              └──────────────┘
//! ```

pub mod commands;
pub mod context;
pub mod fault;
pub mod manager;
pub mod profile;
pub mod router;
pub mod runtime;
pub mod session;

pub use context::SessionContext;
pub use fault::FaultHandler;
pub use manager::{SessionHandle, SessionManager};
pub use profile::Profiler;
pub use router::{Command, CommandTable, Route};
pub use runtime::GuildRuntime;
pub use session::GuildSession;
