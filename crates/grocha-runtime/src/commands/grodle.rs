use chrono::Utc;
use tracing::{info, warn};

use grocha_channels::IncomingMessage;
use grocha_core::Result;
use grocha_game::{GuessOutcome, render};

use crate::session::GuildSession;

impl GuildSession {
    pub(crate) async fn cmd_grodle(&mut self, msg: &IncomingMessage, tokens: &[String]) -> Result<()> {
        let words: Vec<&str> = tokens
            .iter()
            .map(String::as_str)
            .filter(|t| !t.starts_with("<@") && *t != "grodle")
            .collect();

        if self.grodle.is_active() && words.is_empty() {
            let hint = self.grodle.hint()?;
            self.reply(msg.message, &render::hint(&hint)).await?;
            return Ok(());
        }

        let [word] = words.as_slice() else {
            self.reply(msg.message, "Proposez un (seul) mot !").await?;
            return Ok(());
        };

        if self.grodle.is_active() {
            self.guess(msg, word).await
        } else {
            self.propose(msg, word).await
        }
    }

    async fn propose(&mut self, msg: &IncomingMessage, word: &str) -> Result<()> {
        let proposal =
            self.commit(|_, grodle| Ok(grodle.propose(word, Utc::now())?))?;
        self.ctx.platform.delete(msg.message).await?;

        let found = self.lookup(&proposal.word).await.is_some();
        let mut text = format!(
            ":mag: {} propose un nouveau mot de {} lettres à deviner !",
            msg.author.mention(),
            proposal.length
        );
        text.push_str(if found {
            " Je l'ai trouvé dans le dictionnaire !"
        } else {
            " Je ne l'ai pas trouvé dans le dictionnaire..."
        });
        info!(guild = self.guild, author = %msg.author.name, length = proposal.length, found, "grodle word proposed");
        self.send(msg.message.channel, &text).await?;
        Ok(())
    }

    async fn guess(&mut self, msg: &IncomingMessage, word: &str) -> Result<()> {
        let outcome = self.commit(|_, grodle| Ok(grodle.guess(word)?))?;

        let letters = render::letters(outcome.word());
        let squares = render::squares(outcome.feedback());
        let text = match &outcome {
            GuessOutcome::Win { word, .. } => {
                let mut text = format!(
                    ":tada: Bien joué {} !\n{letters}\n{squares}",
                    msg.author.mention()
                );
                if let Some(url) = self.lookup(word).await {
                    text.push_str(&format!("\n(<{url}>)"));
                }
                text.push_str(&format!(
                    "\nPour proposer un nouveau mot : `@{} grodle ||mot||`",
                    self.bot.name
                ));
                text
            }
            GuessOutcome::Ongoing { word, .. } => {
                format!(":disappointed: {word} n'est pas le bon mot !\n{letters}\n{squares}")
            }
        };
        self.reply(msg.message, &text).await?;
        Ok(())
    }

    /// Dictionary entry of `word`; an unreachable dictionary counts as a miss.
    async fn lookup(&self, word: &str) -> Option<String> {
        match self.ctx.dictionary.lookup(word).await {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, word, "dictionary lookup failed");
                None
            }
        }
    }
}
