use tracing::info;

use grocha_channels::IncomingMessage;
use grocha_core::{Result, text};

use super::MESSAGE_LIMIT;
use crate::session::GuildSession;

impl GuildSession {
    pub(crate) async fn cmd_update(&mut self, msg: &IncomingMessage) -> Result<()> {
        info!(guild = self.guild, author = %msg.author.name, "self update requested");
        let output = self.ctx.ops.update().await?;
        let text = format!("MAOU! _(updating myself!)_\n**Results**\n```{output}```");
        self.reply(msg.message, &text::truncate_chars(&text, MESSAGE_LIMIT))
            .await?;
        Ok(())
    }

    pub(crate) async fn cmd_restart(&mut self, msg: &IncomingMessage) -> Result<()> {
        self.reply(msg.message, "MAOU~ _(takin a short nap bruh)_")
            .await?;
        info!(guild = self.guild, author = %msg.author.name, "restart requested");
        self.ctx.ops.restart().await
    }
}
