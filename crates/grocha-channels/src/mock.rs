//! Mock platform for deterministic testing.
//!
//! Serves a scripted guild directory and records every outbound action
//! instead of talking to a real service.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::mpsc;

use grocha_core::{
    ChannelId, ChannelKind, CustomEmoji, EmojiRef, GrochaError, GuildChannel, GuildId, Member,
    MessageId, MessageRef, Result, Role, RoleId, UserId,
};

use crate::adapter::*;

/// One outbound action performed through the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Send {
        channel: ChannelId,
        text: String,
        message: MessageRef,
    },
    Reply {
        to: MessageRef,
        text: String,
        message: MessageRef,
    },
    Edit {
        message: MessageRef,
        text: String,
    },
    React {
        message: MessageRef,
        emoji: EmojiRef,
    },
    Delete {
        message: MessageRef,
    },
    GrantRole {
        guild: GuildId,
        member: UserId,
        role: RoleId,
        reason: String,
    },
    Kick {
        guild: GuildId,
        member: UserId,
        reason: String,
    },
}

impl Action {
    /// Text carried by a send, reply or edit.
    pub fn text(&self) -> Option<&str> {
        match self {
            Action::Send { text, .. } | Action::Reply { text, .. } | Action::Edit { text, .. } => {
                Some(text)
            }
            _ => None,
        }
    }
}

/// A scripted platform.
///
/// # Example
/// ```
/// use grocha_channels::MockPlatform;
/// use grocha_core::Member;
/// let platform = MockPlatform::new(Member::bot(1, "Grocha"))
///     .with_text_channel(10, "general")
///     .with_role(20, "membre");
/// ```
pub struct MockPlatform {
    bot: Member,
    next_id: AtomicU64,
    connected: AtomicBool,
    actions: Mutex<Vec<Action>>,
    channels: Mutex<Vec<GuildChannel>>,
    roles: Mutex<Vec<Role>>,
    emojis: Mutex<Vec<CustomEmoji>>,
    members: Mutex<Vec<Member>>,
    reactions: Mutex<HashMap<(MessageId, String), Vec<Member>>>,
    history: Mutex<HashMap<ChannelId, Vec<HistoryMessage>>>,
    failing_kicks: Mutex<HashSet<UserId>>,
    events: Mutex<Option<mpsc::Sender<PlatformEvent>>>,
}

impl MockPlatform {
    pub fn new(bot: Member) -> Self {
        Self {
            bot,
            next_id: AtomicU64::new(1000),
            connected: AtomicBool::new(false),
            actions: Mutex::new(Vec::new()),
            channels: Mutex::new(Vec::new()),
            roles: Mutex::new(Vec::new()),
            emojis: Mutex::new(Vec::new()),
            members: Mutex::new(Vec::new()),
            reactions: Mutex::new(HashMap::new()),
            history: Mutex::new(HashMap::new()),
            failing_kicks: Mutex::new(HashSet::new()),
            events: Mutex::new(None),
        }
    }

    // ── Directory scripting ────────────────────────────────────

    pub fn with_text_channel(self, id: ChannelId, name: &str) -> Self {
        self.add_channel(id, name, ChannelKind::Text);
        self
    }

    pub fn with_role(self, id: RoleId, name: &str) -> Self {
        self.roles.lock().push(Role {
            id,
            name: name.to_string(),
        });
        self
    }

    pub fn with_emoji(self, emoji: CustomEmoji) -> Self {
        self.emojis.lock().push(emoji);
        self
    }

    pub fn with_member(self, member: Member) -> Self {
        self.members.lock().push(member);
        self
    }

    pub fn add_channel(&self, id: ChannelId, name: &str, kind: ChannelKind) {
        self.channels.lock().push(GuildChannel {
            id,
            name: name.to_string(),
            kind,
        });
    }

    pub fn remove_emoji(&self, name: &str) {
        self.emojis.lock().retain(|e| e.name != name);
    }

    /// Script who reacted to `message` with `emoji`.
    pub fn set_reactors(&self, message: MessageId, emoji: &EmojiRef, users: Vec<Member>) {
        self.reactions
            .lock()
            .insert((message, emoji.reaction_key()), users);
    }

    pub fn add_history(&self, channel: ChannelId, message: HistoryMessage) {
        self.history.lock().entry(channel).or_default().push(message);
    }

    /// Make every kick of `member` fail.
    pub fn fail_kick(&self, member: UserId) {
        self.failing_kicks.lock().insert(member);
    }

    // ── Inspection ─────────────────────────────────────────────

    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().clone()
    }

    pub fn clear_actions(&self) {
        self.actions.lock().clear();
    }

    /// Texts of every send, reply and edit, in order.
    pub fn texts(&self) -> Vec<String> {
        self.actions
            .lock()
            .iter()
            .filter_map(|a| a.text().map(str::to_string))
            .collect()
    }

    pub fn last_text(&self) -> Option<String> {
        self.texts().pop()
    }

    /// Id the next created message will get.
    pub fn peek_next_id(&self) -> MessageId {
        self.next_id.load(Ordering::SeqCst)
    }

    /// Push an inbound event to the receiver handed out by `start`.
    pub async fn emit(&self, event: PlatformEvent) -> Result<()> {
        let tx = self
            .events
            .lock()
            .clone()
            .ok_or_else(|| GrochaError::PlatformNotConnected("mock".into()))?;
        tx.send(event)
            .await
            .map_err(|_| GrochaError::platform("mock", "event receiver dropped"))
    }

    fn record(&self, action: Action) {
        self.actions.lock().push(action);
    }

    fn new_message(&self, channel: ChannelId) -> MessageRef {
        MessageRef::new(channel, self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl Platform for MockPlatform {
    fn name(&self) -> &str {
        "mock"
    }

    async fn start(&self) -> Result<mpsc::Receiver<PlatformEvent>> {
        let (tx, rx) = mpsc::channel(64);
        *self.events.lock() = Some(tx);
        self.connected.store(true, Ordering::SeqCst);
        Ok(rx)
    }

    async fn stop(&self) -> Result<()> {
        self.events.lock().take();
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn bot_user(&self) -> Option<Member> {
        Some(self.bot.clone())
    }

    async fn send(&self, channel: ChannelId, text: &str) -> Result<MessageRef> {
        let message = self.new_message(channel);
        self.record(Action::Send {
            channel,
            text: text.to_string(),
            message,
        });
        Ok(message)
    }

    async fn reply(&self, to: MessageRef, text: &str) -> Result<MessageRef> {
        let message = self.new_message(to.channel);
        self.record(Action::Reply {
            to,
            text: text.to_string(),
            message,
        });
        Ok(message)
    }

    async fn edit(&self, message: MessageRef, text: &str) -> Result<()> {
        self.record(Action::Edit {
            message,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn add_reaction(&self, message: MessageRef, emoji: &EmojiRef) -> Result<()> {
        self.record(Action::React {
            message,
            emoji: emoji.clone(),
        });
        Ok(())
    }

    async fn delete(&self, message: MessageRef) -> Result<()> {
        self.record(Action::Delete { message });
        Ok(())
    }

    async fn grant_role(
        &self,
        guild: GuildId,
        member: UserId,
        role: RoleId,
        reason: &str,
    ) -> Result<()> {
        self.record(Action::GrantRole {
            guild,
            member,
            role,
            reason: reason.to_string(),
        });
        Ok(())
    }

    async fn kick(&self, guild: GuildId, member: UserId, reason: &str) -> Result<()> {
        if self.failing_kicks.lock().contains(&member) {
            return Err(GrochaError::platform("mock", format!("kick of {member} refused")));
        }
        self.record(Action::Kick {
            guild,
            member,
            reason: reason.to_string(),
        });
        Ok(())
    }

    async fn channels(&self, _guild: GuildId) -> Result<Vec<GuildChannel>> {
        Ok(self.channels.lock().clone())
    }

    async fn roles(&self, _guild: GuildId) -> Result<Vec<Role>> {
        Ok(self.roles.lock().clone())
    }

    async fn emojis(&self, _guild: GuildId) -> Result<Vec<CustomEmoji>> {
        Ok(self.emojis.lock().clone())
    }

    async fn members(&self, _guild: GuildId) -> Result<Vec<Member>> {
        Ok(self.members.lock().clone())
    }

    async fn reaction_users(&self, message: MessageRef, emoji: &EmojiRef) -> Result<Vec<Member>> {
        Ok(self
            .reactions
            .lock()
            .get(&(message.id, emoji.reaction_key()))
            .cloned()
            .unwrap_or_default())
    }

    async fn history(&self, channel: ChannelId, limit: usize) -> Result<Vec<HistoryMessage>> {
        Ok(self
            .history
            .lock()
            .get(&channel)
            .map(|h| h.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}
