use tracing::info;

use grocha_channels::IncomingMessage;
use grocha_core::{EmojiRef, Result, text};
use grocha_memory::AutoreactTable;

use crate::session::GuildSession;

const KEYWORDS: [&str; 2] = ["autoreact", "remove"];

/// `MAOW-toreacts :` followed by one line per word.
pub(crate) fn digest(table: &AutoreactTable) -> String {
    let mut out = String::from("MAOW-toreacts :\n");
    for (word, emojis) in table.iter() {
        let joined: String = emojis.iter().map(String::as_str).collect();
        out.push_str(&format!("`{word}` → {joined}\n"));
    }
    out
}

impl GuildSession {
    /// Register (or with `remove`, unregister) every named word with every
    /// named emoji. Without either, show the table.
    pub(crate) async fn cmd_autoreact(
        &mut self,
        msg: &IncomingMessage,
        tokens: &[String],
    ) -> Result<()> {
        let removing = tokens.iter().any(|t| t == "remove");
        let words: Vec<&str> = tokens
            .iter()
            .map(String::as_str)
            .filter(|t| text::is_word(t) && !KEYWORDS.contains(t))
            .collect();

        // Custom emoji names keep their case, so read emojis from the raw text.
        self.directory.emojis = self.ctx.platform.emojis(self.guild).await?;
        let emojis: Vec<EmojiRef> = msg
            .content
            .split_whitespace()
            .filter(|t| AutoreactTable::validate(t, &self.directory.emojis))
            .filter_map(EmojiRef::parse)
            .collect();

        if words.is_empty() && emojis.is_empty() {
            self.reply(msg.message, &digest(&self.autoreact)).await?;
            return Ok(());
        }

        let changed = self.commit(|table, _| {
            let mut changed = 0usize;
            for word in &words {
                table.ensure_word(word);
                for emoji in &emojis {
                    let applied = if removing {
                        table.unregister(word, emoji)
                    } else {
                        table.register(word, emoji)
                    };
                    changed += usize::from(applied);
                }
            }
            Ok(changed)
        })?;
        info!(guild = self.guild, words = words.len(), changed, removing, "autoreact updated");
        Ok(())
    }
}
