use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use grocha_channels::IncomingMessage;
use grocha_core::{ChannelId, ChannelKind, CustomEmoji, EmojiRef, MessageRef, Result, UserId, text};

use super::MESSAGE_LIMIT;
use crate::session::GuildSession;

/// Usage score of every custom emoji of a guild.
#[derive(Debug, Clone)]
pub struct EmojiTally {
    entries: Vec<(CustomEmoji, usize)>,
}

impl EmojiTally {
    pub fn new(directory: &[CustomEmoji]) -> Self {
        Self {
            entries: directory.iter().map(|e| (e.clone(), 0)).collect(),
        }
    }

    /// Count every markup occurrence in a message body.
    pub fn count_text(&mut self, content: &str) {
        for (emoji, score) in &mut self.entries {
            *score += content.matches(&emoji.markup()).count();
        }
    }

    /// Add `count` uses of `emoji`. Emojis outside the directory are ignored.
    pub fn add(&mut self, emoji: &EmojiRef, count: usize) {
        if let Some((_, score)) = self.entries.iter_mut().find(|(e, _)| emoji.is(e)) {
            *score += count;
        }
    }

    pub fn tracks(&self, emoji: &EmojiRef) -> bool {
        self.entries.iter().any(|(e, _)| emoji.is(e))
    }

    pub fn score(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|(e, _)| e.name == name)
            .map(|(_, s)| *s)
    }

    /// Used emojis from most to least used, ties in directory order.
    pub fn ranking(&self) -> Vec<(&CustomEmoji, usize)> {
        let mut ranked: Vec<_> = self
            .entries
            .iter()
            .filter(|(_, s)| *s > 0)
            .map(|(e, s)| (e, *s))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }

    pub fn render(&self, done: bool) -> String {
        let header = if done {
            "E-MAOU-jis :\n"
        } else {
            "E-MAOU-jis : (calcul en cours)\n"
        };
        let body: Vec<String> = self
            .ranking()
            .into_iter()
            .map(|(e, s)| format!("{}`{s}`", e.markup()))
            .collect();
        text::truncate_chars(&format!("{header}{}", body.join("-")), MESSAGE_LIMIT)
    }
}

impl GuildSession {
    /// Rank custom emojis by use in recent history, editing a progress
    /// reply while the scan runs.
    pub(crate) async fn cmd_emojis(
        &mut self,
        msg: &IncomingMessage,
        tokens: &[String],
    ) -> Result<()> {
        let platform = self.ctx.platform.clone();
        let response = self.reply(msg.message, "E-MAOU-jis...").await?;

        self.directory.emojis = platform.emojis(self.guild).await?;
        let mut tally = EmojiTally::new(&self.directory.emojis);

        let channels: Vec<ChannelId> = if tokens.iter().any(|t| t == "ici" || t == "here") {
            vec![msg.message.channel]
        } else if !msg.channel_mentions.is_empty() {
            msg.channel_mentions.clone()
        } else {
            platform
                .channels(self.guild)
                .await?
                .into_iter()
                .filter(|c| c.kind == ChannelKind::Text)
                .map(|c| c.id)
                .collect()
        };

        let mut valid: HashSet<UserId> = self.mentioned_others(msg).iter().map(|m| m.id).collect();
        if valid.is_empty() {
            valid = platform
                .members(self.guild)
                .await?
                .iter()
                .filter(|m| m.id != self.bot.id)
                .map(|m| m.id)
                .collect();
        }

        let (limit, interval) = {
            let cfg = self.ctx.config.read();
            (
                cfg.runtime.emoji_scan_limit,
                Duration::from_millis(cfg.runtime.progress_interval_ms),
            )
        };
        debug!(guild = self.guild, channels = channels.len(), users = valid.len(), "emoji scan started");

        let mut next_update = Instant::now();
        let mut scanned = 0usize;
        for channel in channels {
            for past in platform.history(channel, limit).await? {
                if Instant::now() >= next_update {
                    next_update = Instant::now() + interval;
                    self.show_tally(response, &tally, false).await?;
                }
                if valid.contains(&past.author.id) {
                    tally.count_text(&past.content);
                }
                for reaction in past.reactions.iter() {
                    if !tally.tracks(&reaction.emoji) {
                        continue;
                    }
                    let users = platform.reaction_users(past.message, &reaction.emoji).await?;
                    let count = users.iter().filter(|u| valid.contains(&u.id)).count();
                    tally.add(&reaction.emoji, count);
                }
                scanned += 1;
            }
        }

        info!(guild = self.guild, scanned, "emoji scan done");
        self.show_tally(response, &tally, true).await
    }

    async fn show_tally(&self, response: MessageRef, tally: &EmojiTally, done: bool) -> Result<()> {
        self.ctx.platform.edit(response, &tally.render(done)).await
    }
}
