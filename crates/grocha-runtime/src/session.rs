use chrono::{Local, Utc};
use rand::rngs::StdRng;
use std::time::Instant;
use tracing::{debug, info, warn};

use grocha_channels::{IncomingMessage, PlatformEvent};
use grocha_core::{
    ChannelId, ChannelKind, CustomEmoji, EmojiRef, GrochaError, GuildChannel, GuildId, Member,
    MessageRef, Result, Role, UserId, text,
};
use grocha_game::{Grodle, GrodleSettings};
use grocha_memory::{AutoreactTable, MemoryStore};
use grocha_moderation::{Approval, ApprovalBook, ApprovalKind, audit_reason};

use crate::context::SessionContext;
use crate::fault::FaultHandler;
use crate::profile::Profiler;
use crate::router::{CommandTable, Route};

/// Channels, role and emojis of a guild, resolved by configured name when
/// the session opens.
#[derive(Debug, Clone)]
pub struct Directory {
    pub welcome: Option<GuildChannel>,
    pub main: Option<GuildChannel>,
    pub debug: Option<GuildChannel>,
    pub main_role: Role,
    pub grant_emoji: Option<CustomEmoji>,
    /// Custom emojis as last listed.
    pub emojis: Vec<CustomEmoji>,
}

impl Directory {
    /// Markup of the grant emoji, or a warning sign when the guild lacks it.
    pub fn grant_markup(&self) -> String {
        self.grant_emoji
            .as_ref()
            .map_or_else(|| "⚠️".to_string(), CustomEmoji::markup)
    }

    /// Markup of the custom emoji `name`, or `:name:` when the guild lacks it.
    pub fn emoji_markup(&self, name: &str) -> String {
        self.emojis
            .iter()
            .find(|e| e.name == name)
            .map_or_else(|| format!(":{name}:"), CustomEmoji::markup)
    }
}

/// All state of one guild. Events are handled one at a time.
pub struct GuildSession {
    pub(crate) guild: GuildId,
    pub(crate) ctx: SessionContext,
    pub(crate) bot: Member,
    pub(crate) directory: Directory,
    pub(crate) store: MemoryStore,
    pub(crate) autoreact: AutoreactTable,
    pub(crate) grodle: Grodle,
    pub(crate) approvals: ApprovalBook,
    pub(crate) profiler: Profiler,
    pub(crate) rng: StdRng,
    table: CommandTable,
}

impl GuildSession {
    /// Resolve the guild directory and restore the guild memory.
    ///
    /// Fails with `NotFound` when the main role does not exist.
    pub async fn open(guild: GuildId, ctx: SessionContext) -> Result<Self> {
        let cfg = ctx.config();
        let platform = ctx.platform.clone();
        let bot = platform
            .bot_user()
            .ok_or_else(|| GrochaError::PlatformNotConnected(platform.name().to_string()))?;

        let channels = platform.channels(guild).await?;
        let roles = platform.roles(guild).await?;
        let emojis = platform.emojis(guild).await?;

        let text_channel = |name: &str| {
            let found = channels
                .iter()
                .find(|c| c.kind == ChannelKind::Text && c.name == name)
                .cloned();
            if found.is_none() {
                warn!(guild, channel = name, "channel not found");
            }
            found
        };
        let welcome = text_channel(&cfg.guild.welcome_channel);
        let main = text_channel(&cfg.guild.main_channel);
        let debug = text_channel(&cfg.guild.debug_channel);

        let main_role = roles
            .iter()
            .find(|r| r.name == cfg.guild.main_role)
            .cloned()
            .ok_or_else(|| {
                GrochaError::NotFound(format!("role '{}' in guild {guild}", cfg.guild.main_role))
            })?;

        let grant_emoji = emojis.iter().find(|e| e.name == cfg.guild.grant_emoji).cloned();
        if grant_emoji.is_none() {
            warn!(guild, emoji = %cfg.guild.grant_emoji, "grant emoji not found, approvals disabled");
        }

        let mut store = MemoryStore::open(guild, ctx.backend.clone())?;
        let autoreact = AutoreactTable::load(&mut store, &emojis)?;
        let grodle = Grodle::load(
            &store,
            GrodleSettings {
                max_letters: cfg.grodle.max_letters,
                absent_hint_threshold: cfg.grodle.absent_hint_threshold,
            },
        )?;

        info!(
            guild,
            autoreacts = autoreact.len(),
            grodle_active = grodle.is_active(),
            "guild session opened"
        );

        Ok(Self {
            guild,
            bot,
            directory: Directory {
                welcome,
                main,
                debug,
                main_role,
                grant_emoji,
                emojis,
            },
            store,
            autoreact,
            grodle,
            approvals: ApprovalBook::new(cfg.moderation.grant_quorum, cfg.moderation.kick_quorum),
            profiler: Profiler::new(),
            rng: ctx.rng_for(guild),
            table: CommandTable::new(),
            ctx,
        })
    }

    pub fn guild(&self) -> GuildId {
        self.guild
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn autoreact(&self) -> &AutoreactTable {
        &self.autoreact
    }

    pub fn grodle(&self) -> &Grodle {
        &self.grodle
    }

    pub fn approvals(&self) -> &ApprovalBook {
        &self.approvals
    }

    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }

    /// Handle one event to completion. Errors surface only in `Propagate`
    /// fault mode.
    pub async fn handle(&mut self, event: PlatformEvent) -> Result<()> {
        let (origin, outcome) = match event {
            PlatformEvent::Ready { .. } => (None, self.on_ready().await),
            PlatformEvent::MemberJoined { member, .. } => (
                self.directory.main.as_ref().map(|c| c.id),
                self.on_member_join(member).await,
            ),
            PlatformEvent::Reaction {
                message,
                user,
                emoji,
                ..
            } => (Some(message.channel), self.on_reaction(message, user, emoji).await),
            PlatformEvent::Message(msg) => {
                let origin = msg.message;
                let outcome = match self.on_message(&msg).await {
                    Err(e) if e.is_user_facing() => self.reply_user_error(origin, &e).await,
                    other => other,
                };
                (Some(origin.channel), outcome)
            }
            PlatformEvent::Connected | PlatformEvent::Disconnected(_) => return Ok(()),
        };

        match outcome {
            Ok(()) => Ok(()),
            Err(e) => self.fault(origin, e).await,
        }
    }

    async fn fault(&self, origin: Option<ChannelId>, error: GrochaError) -> Result<()> {
        let handler = FaultHandler::new(self.ctx.config.read().runtime.fault_mode);
        handler
            .handle(
                self.ctx.platform.as_ref(),
                origin,
                self.directory.debug.as_ref(),
                error,
            )
            .await
    }

    async fn reply_user_error(&self, to: MessageRef, error: &GrochaError) -> Result<()> {
        let text = match error {
            GrochaError::InvalidInput(text) | GrochaError::NotFound(text) => text.clone(),
            other => other.to_string(),
        };
        self.reply(to, &text).await.map(|_| ())
    }

    pub(crate) async fn reply(&self, to: MessageRef, text: &str) -> Result<MessageRef> {
        self.ctx.platform.reply(to, text).await
    }

    pub(crate) async fn send(&self, channel: ChannelId, text: &str) -> Result<MessageRef> {
        self.ctx.platform.send(channel, text).await
    }

    /// Mentioned members other than the bot itself.
    pub(crate) fn mentioned_others(&self, msg: &IncomingMessage) -> Vec<Member> {
        msg.mentions
            .iter()
            .filter(|m| m.id != self.bot.id)
            .cloned()
            .collect()
    }

    /// Apply `change` to the autoreact table and the game, then persist
    /// whichever of them changed. When the change or the save fails, both
    /// are put back as they were.
    pub(crate) fn commit<T>(
        &mut self,
        change: impl FnOnce(&mut AutoreactTable, &mut Grodle) -> Result<T>,
    ) -> Result<T> {
        let (autoreact, grodle) = (self.autoreact.clone(), self.grodle.clone());
        let outcome = change(&mut self.autoreact, &mut self.grodle).and_then(|value| {
            if self.autoreact != autoreact {
                self.autoreact.persist(&mut self.store)?;
            }
            if self.grodle.state() != grodle.state() {
                self.grodle.persist(&mut self.store)?;
            }
            Ok(value)
        });
        if outcome.is_err() {
            self.autoreact = autoreact;
            self.grodle = grodle;
        }
        outcome
    }

    // ── Events ─────────────────────────────────────────────────

    async fn on_ready(&mut self) -> Result<()> {
        info!(guild = self.guild, "connected on guild");
        if let Some(debug) = &self.directory.debug {
            self.send(debug.id, "MAOOWWWWWW _(I just awakened)_").await?;
        }
        Ok(())
    }

    async fn on_member_join(&mut self, member: Member) -> Result<()> {
        let main = self
            .directory
            .main
            .clone()
            .ok_or_else(|| GrochaError::NotFound("main channel".into()))?;
        let text = format!(
            "MAOU! **{}** vient d'arriver sur le serveur.\nRéagis à ce message avec l'emoji {} pour lui donner les droits!",
            member.name,
            self.directory.grant_markup()
        );
        let anchor = self.send(main.id, &text).await?;
        info!(guild = self.guild, member = %member.name, anchor = anchor.id, "member joined");
        self.approvals.open_grant(anchor, member, Utc::now());
        Ok(())
    }

    async fn on_reaction(
        &mut self,
        message: MessageRef,
        user: UserId,
        emoji: EmojiRef,
    ) -> Result<()> {
        let Some(grant) = self.directory.grant_emoji.clone() else {
            return Ok(());
        };
        if !self.approvals.concerns(message.id, &emoji, &grant) {
            return Ok(());
        }
        debug!(guild = self.guild, anchor = message.id, user, "approval reaction");

        let reactors = self
            .ctx
            .platform
            .reaction_users(message, &EmojiRef::from(&grant))
            .await?;
        let Some(approval) = self.approvals.evaluate(message.id, &reactors) else {
            return Ok(());
        };
        self.execute(approval).await
    }

    /// Carry out an approved request. Subjects are processed in order and
    /// each one done is removed, so a failure leaves only the rest open.
    async fn execute(&mut self, approval: Approval) -> Result<()> {
        let bot_name = self.ctx.config.read().guild.bot_name.clone();
        let reason = audit_reason(
            approval.kind,
            &approval.approvers,
            &bot_name,
            Local::now().naive_local(),
        );
        let anchor = approval.anchor.id;
        let platform = self.ctx.platform.clone();

        for (done, subject) in approval.subjects.iter().enumerate() {
            let result = match approval.kind {
                ApprovalKind::GrantRole => {
                    platform
                        .grant_role(self.guild, subject.id, self.directory.main_role.id, &reason)
                        .await
                }
                ApprovalKind::Kick => platform.kick(self.guild, subject.id, &reason).await,
            };
            if let Err(e) = result {
                self.approvals
                    .retain_subjects(anchor, approval.subjects[done..].to_vec());
                return Err(GrochaError::PartialActionFailure {
                    action: approval.kind.to_string(),
                    subject: subject.name.clone(),
                    reason: e.to_string(),
                });
            }
            info!(guild = self.guild, kind = %approval.kind, subject = %subject.name, "approval executed");
        }

        self.approvals.resolve(anchor);
        Ok(())
    }

    async fn on_message(&mut self, msg: &IncomingMessage) -> Result<()> {
        if msg.author.id == self.bot.id {
            return Ok(());
        }

        let addressed = msg.mentions_user(self.bot.id)
            && !msg.mentions_everyone
            && msg.reply_to_author != Some(self.bot.id);
        let tokens = text::tokenize(&msg.content);

        match self.table.route(&tokens, addressed) {
            Route::Autoreact => self.react_to(msg, &tokens).await,
            Route::Unrecognized => self.reply(msg.message, "MAOU?").await.map(|_| ()),
            Route::Dispatch(command) => {
                debug!(guild = self.guild, %command, author = %msg.author.name, "dispatching");
                let started = Instant::now();
                self.dispatch(command, msg, &tokens).await?;
                self.profiler.record(command.keyword(), started.elapsed());
                Ok(())
            }
        }
    }

    async fn react_to(&mut self, msg: &IncomingMessage, tokens: &[String]) -> Result<()> {
        if self.autoreact.is_empty() {
            return Ok(());
        }
        let probability = self.ctx.config.read().autoreact.probability;
        let picked = self
            .autoreact
            .reactions_for(tokens, probability, &mut self.rng);
        for emoji in picked {
            self.ctx.platform.add_reaction(msg.message, &emoji).await?;
        }
        Ok(())
    }
}
