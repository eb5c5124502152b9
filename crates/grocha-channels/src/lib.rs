//! # grocha-channels
//!
//! The platform boundary. Adapters bridge a chat platform to the guild
//! sessions: they deliver inbound events, perform outbound actions and
//! answer directory lookups.
//!
//! | Adapter          | Use                                   |
//! |------------------|---------------------------------------|
//! | `DiscordPlatform`| Gateway WebSocket + REST v10          |
//! | `MockPlatform`   | Scripted directory, records actions   |

pub mod adapter;
pub mod discord;
pub mod mock;

pub use adapter::{HistoryMessage, IncomingMessage, Platform, PlatformEvent, ReactionCount};
pub use discord::DiscordPlatform;
pub use mock::{Action, MockPlatform};
