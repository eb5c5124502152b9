use serde::{Deserialize, Serialize};

/// Discord snowflake identifying a guild (community).
pub type GuildId = u64;

/// Identifier of a text channel.
pub type ChannelId = u64;

/// Identifier of a message.
pub type MessageId = u64;

/// Identifier of a user / member.
pub type UserId = u64;

/// Identifier of a role.
pub type RoleId = u64;

/// A guild member (or any user seen through a guild event).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Member {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub bot: bool,
}

impl Member {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            bot: false,
        }
    }

    pub fn bot(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            bot: true,
        }
    }

    /// Platform mention markup, e.g. `<@1234>`.
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

/// Points at one message inside a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub channel: ChannelId,
    pub id: MessageId,
}

impl MessageRef {
    pub fn new(channel: ChannelId, id: MessageId) -> Self {
        Self { channel, id }
    }
}

/// Kind of a guild channel, only text channels carry messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Text,
    Voice,
    Category,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildChannel {
    pub id: ChannelId,
    pub name: String,
    pub kind: ChannelKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
}
