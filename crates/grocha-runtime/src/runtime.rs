use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use grocha_channels::PlatformEvent;
use grocha_core::{GuildId, Result};

use crate::context::SessionContext;
use crate::manager::SessionManager;

/// Per-guild queue. Unbounded: routing never waits on a busy guild.
struct Worker {
    tx: mpsc::UnboundedSender<PlatformEvent>,
    task: JoinHandle<()>,
}

/// Feeds platform events to guild sessions: one worker per guild keeps that
/// guild's events in order while guilds progress independently.
pub struct GuildRuntime {
    manager: Arc<SessionManager>,
    workers: HashMap<GuildId, Worker>,
}

impl GuildRuntime {
    pub fn new(ctx: SessionContext) -> Self {
        Self {
            manager: Arc::new(SessionManager::new(ctx)),
            workers: HashMap::new(),
        }
    }

    pub fn manager(&self) -> Arc<SessionManager> {
        self.manager.clone()
    }

    /// Consume `events` until the stream ends or `shutdown` resolves, then
    /// let every worker finish its queue.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<PlatformEvent>,
        shutdown: impl Future<Output = ()>,
    ) -> Result<()> {
        info!("guild runtime started");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => self.route(event),
                    None => {
                        info!("platform event stream closed");
                        break;
                    }
                },
            }
        }

        self.drain().await;
        Ok(())
    }

    fn route(&mut self, event: PlatformEvent) {
        let Some(guild) = event.guild() else {
            match &event {
                PlatformEvent::Connected => info!("platform connected"),
                PlatformEvent::Disconnected(reason) => {
                    warn!(reason = reason.as_deref().unwrap_or("none"), "platform disconnected")
                }
                _ => {}
            }
            return;
        };

        let manager = self.manager.clone();
        let worker = self
            .workers
            .entry(guild)
            .or_insert_with(|| spawn_worker(manager, guild));
        if worker.tx.send(event).is_err() {
            error!(guild, "guild worker stopped, event dropped");
            self.workers.remove(&guild);
        }
    }

    async fn drain(self) {
        let count = self.workers.len();
        for (guild, worker) in self.workers {
            drop(worker.tx);
            if let Err(e) = worker.task.await {
                error!(guild, error = %e, "guild worker panicked");
            }
        }
        info!(workers = count, "guild runtime stopped");
    }
}

fn spawn_worker(manager: Arc<SessionManager>, guild: GuildId) -> Worker {
    let (tx, mut rx) = mpsc::unbounded_channel::<PlatformEvent>();
    let task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Err(e) = manager.handle(event).await {
                error!(guild, error = %e, "guild event failed");
            }
        }
    });
    Worker { tx, task }
}
