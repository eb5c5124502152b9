//! Command handlers, one `impl GuildSession` block per family.

mod autoreact;
mod emojis;
mod grodle;
mod info;
mod moderation;
mod ops;

pub use emojis::EmojiTally;
pub use info::{format_wait, parse_city, weekend_wait};

use grocha_channels::IncomingMessage;
use grocha_core::{GrochaError, Result};

use crate::router::Command;
use crate::session::GuildSession;

/// Discord refuses messages longer than this.
pub const MESSAGE_LIMIT: usize = 2000;

impl GuildSession {
    pub(crate) async fn dispatch(
        &mut self,
        command: Command,
        msg: &IncomingMessage,
        tokens: &[String],
    ) -> Result<()> {
        match command {
            Command::Kick => self.cmd_kick(msg).await,
            Command::Lick => self.cmd_lick(msg).await,
            Command::Emojis => self.cmd_emojis(msg, tokens).await,
            Command::Weekend => self.cmd_weekend(msg).await,
            Command::Autoreact => self.cmd_autoreact(msg, tokens).await,
            Command::Meteo => self.cmd_meteo(msg).await,
            Command::Revolution => self.cmd_revolution(msg).await,
            Command::Grodle => self.cmd_grodle(msg, tokens).await,
            Command::Hurt => Err(GrochaError::Fault(
                "*grocha vient de chier une ogive, tape un sprint et se prend une porte*".into(),
            )),
            Command::Version => self.cmd_version(msg).await,
            Command::Profile => self.cmd_profile(msg).await,
            Command::Update => self.cmd_update(msg).await,
            Command::Restart => self.cmd_restart(msg).await,
        }
    }
}
