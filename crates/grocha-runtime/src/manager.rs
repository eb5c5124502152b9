use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

use grocha_channels::PlatformEvent;
use grocha_core::{GrochaError, GuildId, Result};

use crate::context::SessionContext;
use crate::session::GuildSession;

/// Exclusive access to one guild's session.
pub type SessionHandle = Arc<Mutex<GuildSession>>;

/// Guild id → session, opened lazily on the guild's first event.
///
/// Lookups of an open session only take the read lock. The write lock is
/// held just long enough to insert an empty cell; the cell then guarantees
/// a single `open` per guild even when callers race.
pub struct SessionManager {
    ctx: SessionContext,
    sessions: RwLock<HashMap<GuildId, Arc<OnceCell<SessionHandle>>>>,
}

impl SessionManager {
    pub fn new(ctx: SessionContext) -> Self {
        Self {
            ctx,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// The session of `guild`, opening it first if needed. A failed open
    /// leaves the slot empty so the next event retries.
    pub async fn get_or_open(&self, guild: GuildId) -> Result<SessionHandle> {
        let existing = self.sessions.read().get(&guild).cloned();
        let cell = match existing {
            Some(cell) => cell,
            None => self.sessions.write().entry(guild).or_default().clone(),
        };

        let handle = cell
            .get_or_try_init(|| async {
                debug!(guild, "opening guild session");
                let session = GuildSession::open(guild, self.ctx.clone()).await?;
                Ok::<_, GrochaError>(Arc::new(Mutex::new(session)))
            })
            .await?;
        Ok(handle.clone())
    }

    /// The session of `guild` if it is already open.
    pub fn get(&self, guild: GuildId) -> Option<SessionHandle> {
        self.sessions
            .read()
            .get(&guild)
            .and_then(|cell| cell.get().cloned())
    }

    /// Route `event` to its guild's session. Guild-less events are ignored.
    pub async fn handle(&self, event: PlatformEvent) -> Result<()> {
        let Some(guild) = event.guild() else {
            return Ok(());
        };
        let session = self.get_or_open(guild).await?;
        let mut session = session.lock().await;
        session.handle(event).await
    }

    /// Guilds with an open session.
    pub fn guilds(&self) -> Vec<GuildId> {
        let mut guilds: Vec<GuildId> = self
            .sessions
            .read()
            .iter()
            .filter(|(_, cell)| cell.initialized())
            .map(|(id, _)| *id)
            .collect();
        guilds.sort_unstable();
        guilds
    }

    pub fn len(&self) -> usize {
        self.guilds().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
