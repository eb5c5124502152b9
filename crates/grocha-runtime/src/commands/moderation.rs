use chrono::Utc;
use tracing::{debug, info};

use grocha_channels::IncomingMessage;
use grocha_core::{GrochaError, Result};
use grocha_moderation::ApprovalBook;

use crate::session::GuildSession;

impl GuildSession {
    /// Post a kick vote in the main channel for every mentioned human.
    pub(crate) async fn cmd_kick(&mut self, msg: &IncomingMessage) -> Result<()> {
        let subjects = ApprovalBook::kick_subjects(&self.mentioned_others(msg));
        if subjects.is_empty() {
            debug!(guild = self.guild, "kick without subject");
            return Ok(());
        }
        let main = self
            .directory
            .main
            .clone()
            .ok_or_else(|| GrochaError::NotFound("main channel".into()))?;

        let names: Vec<&str> = subjects.iter().map(|m| m.name.as_str()).collect();
        let text = format!(
            "MAOU! **{}** est sur le point d'être kické.\nRéagissez à ce message avec au moins {} emojis {} pour valider la décision!",
            names.join(", "),
            self.approvals.kick_quorum(),
            self.directory.grant_markup()
        );
        let anchor = self.send(main.id, &text).await?;
        info!(guild = self.guild, anchor = anchor.id, subjects = subjects.len(), "kick vote posted");
        self.approvals.open_kick(anchor, &subjects, Utc::now());
        Ok(())
    }

    pub(crate) async fn cmd_lick(&mut self, msg: &IncomingMessage) -> Result<()> {
        let mut targets = self.mentioned_others(msg);
        if targets.is_empty() {
            targets.push(msg.author.clone());
        }
        let lick_name = self.ctx.config.read().guild.lick_emoji.clone();
        let lick = self.directory.emoji_markup(&lick_name);
        let mentions: Vec<String> = targets.iter().map(|m| m.mention()).collect();
        let text = format!("{lick} {} {lick}", mentions.join(&format!(" {lick} ")));
        self.reply(msg.message, &text).await?;
        Ok(())
    }
}
