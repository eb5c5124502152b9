use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use grocha_core::{
    ChannelId, CustomEmoji, EmojiRef, GuildChannel, GuildId, Member, MessageRef, Result, Role,
    RoleId, UserId,
};

/// A message posted in a guild text channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub guild: GuildId,
    pub message: MessageRef,
    pub author: Member,
    /// Raw text content.
    pub content: String,
    /// Users mentioned in the message, in mention order.
    #[serde(default)]
    pub mentions: Vec<Member>,
    /// Channels referenced with `<#id>`.
    #[serde(default)]
    pub channel_mentions: Vec<ChannelId>,
    /// Whether `@everyone` / `@here` was used.
    #[serde(default)]
    pub mentions_everyone: bool,
    /// Author of the message this one replies to, if any.
    pub reply_to_author: Option<UserId>,
}

impl IncomingMessage {
    pub fn mentions_user(&self, user: UserId) -> bool {
        self.mentions.iter().any(|m| m.id == user)
    }
}

/// One reaction on a message, as listed by the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionCount {
    pub emoji: EmojiRef,
    pub count: usize,
}

/// A message read back from a channel's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub message: MessageRef,
    pub author: Member,
    pub content: String,
    #[serde(default)]
    pub reactions: Vec<ReactionCount>,
}

/// Events emitted by a platform adapter.
#[derive(Debug, Clone)]
pub enum PlatformEvent {
    /// The bot is ready to serve a guild.
    Ready { guild: GuildId },
    Message(IncomingMessage),
    /// A reaction was added to a message.
    Reaction {
        guild: GuildId,
        message: MessageRef,
        user: UserId,
        emoji: EmojiRef,
    },
    MemberJoined { guild: GuildId, member: Member },
    /// The adapter connected successfully.
    Connected,
    /// The adapter disconnected.
    Disconnected(Option<String>),
}

impl PlatformEvent {
    /// Guild the event belongs to, if any.
    pub fn guild(&self) -> Option<GuildId> {
        match self {
            PlatformEvent::Ready { guild }
            | PlatformEvent::Reaction { guild, .. }
            | PlatformEvent::MemberJoined { guild, .. } => Some(*guild),
            PlatformEvent::Message(m) => Some(m.guild),
            PlatformEvent::Connected | PlatformEvent::Disconnected(_) => None,
        }
    }
}

/// Trait implemented by each platform adapter.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Platform name (e.g. "discord").
    fn name(&self) -> &str;

    /// Start the adapter. Returns a receiver for inbound events.
    async fn start(&self) -> Result<mpsc::Receiver<PlatformEvent>>;

    /// Stop the adapter gracefully.
    async fn stop(&self) -> Result<()>;

    fn is_connected(&self) -> bool;

    /// The bot's own user, known once connected.
    fn bot_user(&self) -> Option<Member>;

    // ── Outbound actions ───────────────────────────────────────

    async fn send(&self, channel: ChannelId, text: &str) -> Result<MessageRef>;

    async fn reply(&self, to: MessageRef, text: &str) -> Result<MessageRef>;

    async fn edit(&self, message: MessageRef, text: &str) -> Result<()>;

    async fn add_reaction(&self, message: MessageRef, emoji: &EmojiRef) -> Result<()>;

    async fn delete(&self, message: MessageRef) -> Result<()>;

    async fn grant_role(
        &self,
        guild: GuildId,
        member: UserId,
        role: RoleId,
        reason: &str,
    ) -> Result<()>;

    async fn kick(&self, guild: GuildId, member: UserId, reason: &str) -> Result<()>;

    // ── Directory lookups ──────────────────────────────────────

    async fn channels(&self, guild: GuildId) -> Result<Vec<GuildChannel>>;

    async fn roles(&self, guild: GuildId) -> Result<Vec<Role>>;

    async fn emojis(&self, guild: GuildId) -> Result<Vec<CustomEmoji>>;

    async fn members(&self, guild: GuildId) -> Result<Vec<Member>>;

    /// Everyone who reacted to `message` with `emoji`.
    async fn reaction_users(&self, message: MessageRef, emoji: &EmojiRef) -> Result<Vec<Member>>;

    /// Up to `limit` most recent messages of a channel, newest first.
    async fn history(&self, channel: ChannelId, limit: usize) -> Result<Vec<HistoryMessage>>;
}
