use tracing::{error, warn};

use grocha_channels::Platform;
use grocha_config::FaultMode;
use grocha_core::{ChannelId, GrochaError, GuildChannel, Result, text};

const MESSAGE_LIMIT: usize = 2000;

/// Turns unhandled handler errors into an apology plus diagnostics, or
/// hands them back in `Propagate` mode.
#[derive(Debug, Clone, Copy)]
pub struct FaultHandler {
    mode: FaultMode,
}

impl FaultHandler {
    pub fn new(mode: FaultMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> FaultMode {
        self.mode
    }

    pub fn apology(debug: Option<&GuildChannel>) -> String {
        let name = debug.map(|c| c.name.as_str()).unwrap_or("debug");
        format!(
            "MAOUUUUU :frowning:\n_(je suis cassé! Regarde #{name} pour plus d'infos sur le problème)_"
        )
    }

    pub fn diagnostics(error: &GrochaError) -> String {
        let detail = format!("{error}\n\n{error:#?}");
        let head = "_Le bobo de Grocha :_\n```";
        let budget = MESSAGE_LIMIT - head.chars().count() - 3;
        format!("{head}{}```", text::truncate_chars(&detail, budget))
    }

    /// Report `error`: apology in `origin`, detail in `debug`. Never fails
    /// in `Report` mode; reporting problems are only logged.
    pub async fn handle(
        &self,
        platform: &dyn Platform,
        origin: Option<ChannelId>,
        debug: Option<&GuildChannel>,
        error: GrochaError,
    ) -> Result<()> {
        if self.mode == FaultMode::Propagate {
            return Err(error);
        }

        error!(error = %error, ?origin, "handler fault");

        if let Some(channel) = origin {
            if let Err(e) = platform.send(channel, &Self::apology(debug)).await {
                warn!(error = %e, channel, "could not post apology");
            }
        }

        match debug {
            Some(debug) => {
                if let Err(e) = platform.send(debug.id, &Self::diagnostics(&error)).await {
                    warn!(error = %e, "could not post diagnostics");
                }
            }
            None => warn!("no debug channel, diagnostics only logged"),
        }
        Ok(())
    }
}
