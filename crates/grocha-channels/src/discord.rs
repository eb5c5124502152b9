use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use grocha_core::{
    ChannelId, ChannelKind, CustomEmoji, EmojiRef, GrochaError, GuildChannel, GuildId, Member,
    MessageRef, Result, Role, RoleId, UserId,
};

use crate::adapter::*;

/// Discord Gateway opcodes.
const OP_DISPATCH: u64 = 0;
const OP_HEARTBEAT: u64 = 1;
const OP_IDENTIFY: u64 = 2;
const OP_RECONNECT: u64 = 7;
const OP_INVALID_SESSION: u64 = 9;
const OP_HELLO: u64 = 10;
const OP_HEARTBEAT_ACK: u64 = 11;

/// GUILDS | GUILD_MEMBERS | GUILD_MESSAGES | GUILD_MESSAGE_REACTIONS | MESSAGE_CONTENT
const INTENTS: u64 = 1 | (1 << 1) | (1 << 9) | (1 << 10) | (1 << 15);

const PAGE_SIZE: usize = 100;
const MEMBER_PAGE_SIZE: usize = 1000;

type KnownGuilds = HashSet<GuildId>;

/// Discord adapter using the Gateway WebSocket for events and REST v10 for
/// actions and directory lookups.
///
/// ## Setup
///
/// 1. <https://discord.com/developers/applications> → Create application
/// 2. Bot section → Copy token
/// 3. Enable the "Server Members" and "Message Content" privileged intents
/// 4. Invite the bot with Manage Roles, Kick Members, Manage Messages,
///    Add Reactions and Read Message History
/// 5. Configure in grocha.toml:
///    ```toml
///    [discord]
///    token = "YOUR_BOT_TOKEN"
///    ```
pub struct DiscordPlatform {
    token: String,
    api_base: String,
    gateway_url: String,
    client: reqwest::Client,
    connected: Arc<AtomicBool>,
    shutdown_tx: Mutex<Option<watch::Sender<bool>>>,
    bot_user: Arc<RwLock<Option<Member>>>,
}

impl DiscordPlatform {
    pub fn new(
        token: impl Into<String>,
        api_base: impl Into<String>,
        gateway_url: impl Into<String>,
    ) -> Self {
        Self {
            token: token.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            gateway_url: gateway_url.into(),
            client: reqwest::Client::new(),
            connected: Arc::new(AtomicBool::new(false)),
            shutdown_tx: Mutex::new(None),
            bot_user: Arc::new(RwLock::new(None)),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Url::parse(&format!("{}{}", self.api_base, path))
            .map_err(|e| GrochaError::platform("discord", format!("bad URL {path}: {e}")))
    }

    /// `/channels/{c}/messages/{m}/reactions/{emoji}` with the emoji
    /// percent-encoded as a single path segment.
    fn reaction_url(&self, message: MessageRef, emoji: &EmojiRef, tail: &[&str]) -> Result<Url> {
        let mut url = self.endpoint(&format!(
            "/channels/{}/messages/{}/reactions",
            message.channel, message.id
        ))?;
        url.path_segments_mut()
            .map_err(|_| GrochaError::platform("discord", "API base cannot hold a path"))?
            .push(&emoji.reaction_key())
            .extend(tail);
        Ok(url)
    }

    fn call(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("Authorization", format!("Bot {}", self.token))
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Value> {
        let resp = request
            .send()
            .await
            .map_err(|e| GrochaError::platform("discord", format!("HTTP error: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %text, "Discord API error");
            return Err(GrochaError::platform(
                "discord",
                format!("Discord API {status}: {text}"),
            ));
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        resp.json()
            .await
            .map_err(|e| GrochaError::platform("discord", format!("bad response body: {e}")))
    }

    async fn post_message(&self, channel: ChannelId, body: Value) -> Result<MessageRef> {
        let url = self.endpoint(&format!("/channels/{channel}/messages"))?;
        let data = self.execute(self.call(Method::POST, url).json(&body)).await?;
        let id = snowflake(&data["id"])
            .ok_or_else(|| GrochaError::platform("discord", "message created without id"))?;
        Ok(MessageRef::new(channel, id))
    }
}

#[async_trait]
impl Platform for DiscordPlatform {
    fn name(&self) -> &str {
        "discord"
    }

    async fn start(&self) -> Result<mpsc::Receiver<PlatformEvent>> {
        let (event_tx, event_rx) = mpsc::channel(256);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        *self.shutdown_tx.lock() = Some(shutdown_tx);

        let gateway = Gateway {
            token: self.token.clone(),
            url: self.gateway_url.clone(),
            event_tx,
            connected: self.connected.clone(),
            bot_user: self.bot_user.clone(),
        };

        tokio::spawn(async move {
            gateway.run(shutdown_rx).await;
        });

        Ok(event_rx)
    }

    async fn stop(&self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.lock().take() {
            let _ = tx.send(true);
        }
        self.connected.store(false, Ordering::SeqCst);
        info!("Discord platform stopped");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn bot_user(&self) -> Option<Member> {
        self.bot_user.read().clone()
    }

    async fn send(&self, channel: ChannelId, text: &str) -> Result<MessageRef> {
        self.post_message(channel, json!({ "content": text })).await
    }

    async fn reply(&self, to: MessageRef, text: &str) -> Result<MessageRef> {
        let body = json!({
            "content": text,
            "message_reference": {
                "message_id": to.id.to_string(),
                "fail_if_not_exists": false,
            },
        });
        self.post_message(to.channel, body).await
    }

    async fn edit(&self, message: MessageRef, text: &str) -> Result<()> {
        let url = self.endpoint(&format!(
            "/channels/{}/messages/{}",
            message.channel, message.id
        ))?;
        self.execute(self.call(Method::PATCH, url).json(&json!({ "content": text })))
            .await?;
        Ok(())
    }

    async fn add_reaction(&self, message: MessageRef, emoji: &EmojiRef) -> Result<()> {
        let url = self.reaction_url(message, emoji, &["@me"])?;
        self.execute(self.call(Method::PUT, url)).await?;
        Ok(())
    }

    async fn delete(&self, message: MessageRef) -> Result<()> {
        let url = self.endpoint(&format!(
            "/channels/{}/messages/{}",
            message.channel, message.id
        ))?;
        self.execute(self.call(Method::DELETE, url)).await?;
        Ok(())
    }

    async fn grant_role(
        &self,
        guild: GuildId,
        member: UserId,
        role: RoleId,
        reason: &str,
    ) -> Result<()> {
        let url = self.endpoint(&format!("/guilds/{guild}/members/{member}/roles/{role}"))?;
        let request = self
            .call(Method::PUT, url)
            .header("X-Audit-Log-Reason", audit_header(reason));
        self.execute(request).await?;
        info!(guild, member, role, "role granted");
        Ok(())
    }

    async fn kick(&self, guild: GuildId, member: UserId, reason: &str) -> Result<()> {
        let url = self.endpoint(&format!("/guilds/{guild}/members/{member}"))?;
        let request = self
            .call(Method::DELETE, url)
            .header("X-Audit-Log-Reason", audit_header(reason));
        self.execute(request).await?;
        info!(guild, member, "member kicked");
        Ok(())
    }

    async fn channels(&self, guild: GuildId) -> Result<Vec<GuildChannel>> {
        let url = self.endpoint(&format!("/guilds/{guild}/channels"))?;
        let data = self.execute(self.call(Method::GET, url)).await?;
        Ok(array(&data).iter().filter_map(parse_channel).collect())
    }

    async fn roles(&self, guild: GuildId) -> Result<Vec<Role>> {
        let url = self.endpoint(&format!("/guilds/{guild}/roles"))?;
        let data = self.execute(self.call(Method::GET, url)).await?;
        Ok(array(&data)
            .iter()
            .filter_map(|r| {
                Some(Role {
                    id: snowflake(&r["id"])?,
                    name: r["name"].as_str()?.to_string(),
                })
            })
            .collect())
    }

    async fn emojis(&self, guild: GuildId) -> Result<Vec<CustomEmoji>> {
        let url = self.endpoint(&format!("/guilds/{guild}/emojis"))?;
        let data = self.execute(self.call(Method::GET, url)).await?;
        Ok(array(&data)
            .iter()
            .filter_map(|e| {
                Some(CustomEmoji {
                    id: snowflake(&e["id"])?,
                    name: e["name"].as_str()?.to_string(),
                    animated: e["animated"].as_bool().unwrap_or(false),
                })
            })
            .collect())
    }

    async fn members(&self, guild: GuildId) -> Result<Vec<Member>> {
        let mut members = Vec::new();
        let mut after: UserId = 0;
        loop {
            let url = self.endpoint(&format!("/guilds/{guild}/members"))?;
            let request = self.call(Method::GET, url).query(&[
                ("limit", MEMBER_PAGE_SIZE.to_string()),
                ("after", after.to_string()),
            ]);
            let data = self.execute(request).await?;
            let page: Vec<Member> = array(&data)
                .iter()
                .filter_map(|m| parse_user(&m["user"]))
                .collect();
            let full = page.len() == MEMBER_PAGE_SIZE;
            match page.iter().map(|m| m.id).max() {
                Some(last) => after = last,
                None => break,
            }
            members.extend(page);
            if !full {
                break;
            }
        }
        debug!(guild, count = members.len(), "members listed");
        Ok(members)
    }

    async fn reaction_users(&self, message: MessageRef, emoji: &EmojiRef) -> Result<Vec<Member>> {
        let mut users = Vec::new();
        let mut after: UserId = 0;
        loop {
            let url = self.reaction_url(message, emoji, &[])?;
            let request = self.call(Method::GET, url).query(&[
                ("limit", PAGE_SIZE.to_string()),
                ("after", after.to_string()),
            ]);
            let data = self.execute(request).await?;
            let page: Vec<Member> = array(&data).iter().filter_map(parse_user).collect();
            let full = page.len() == PAGE_SIZE;
            match page.iter().map(|m| m.id).max() {
                Some(last) => after = last,
                None => break,
            }
            users.extend(page);
            if !full {
                break;
            }
        }
        Ok(users)
    }

    async fn history(&self, channel: ChannelId, limit: usize) -> Result<Vec<HistoryMessage>> {
        let mut messages = Vec::new();
        let mut before: Option<u64> = None;
        while messages.len() < limit {
            let url = self.endpoint(&format!("/channels/{channel}/messages"))?;
            let page_size = (limit - messages.len()).min(PAGE_SIZE);
            let mut query = vec![("limit", page_size.to_string())];
            if let Some(b) = before {
                query.push(("before", b.to_string()));
            }
            let data = self.execute(self.call(Method::GET, url).query(&query)).await?;
            let page: Vec<HistoryMessage> = array(&data)
                .iter()
                .filter_map(|m| parse_history_message(m, channel))
                .collect();
            let full = page.len() == page_size;
            match page.last() {
                Some(last) => before = Some(last.message.id),
                None => break,
            }
            messages.extend(page);
            if !full {
                break;
            }
        }
        Ok(messages)
    }
}

/// Gateway connection state shared by every reconnect attempt.
struct Gateway {
    token: String,
    url: String,
    event_tx: mpsc::Sender<PlatformEvent>,
    connected: Arc<AtomicBool>,
    bot_user: Arc<RwLock<Option<Member>>>,
}

impl Gateway {
    /// Main gateway loop: connects, identifies, heartbeats and dispatches
    /// events, reconnecting with exponential backoff.
    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut backoff = 1u64;
        let mut known = KnownGuilds::new();

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            info!("Discord: connecting to Gateway...");

            let ws_stream = match tokio_tungstenite::connect_async(self.url.as_str()).await {
                Ok((stream, _)) => stream,
                Err(e) => {
                    error!(error = %e, "Discord Gateway connection failed");
                    tokio::time::sleep(std::time::Duration::from_secs(backoff)).await;
                    backoff = (backoff * 2).min(60);
                    continue;
                }
            };

            backoff = 1;
            let (mut write, mut read) = ws_stream.split();

            // Wait for HELLO to get heartbeat interval
            let heartbeat_interval = match read.next().await {
                Some(Ok(msg)) => {
                    let payload: Value = msg
                        .to_text()
                        .ok()
                        .and_then(|t| serde_json::from_str(t).ok())
                        .unwrap_or_default();
                    if payload["op"].as_u64() == Some(OP_HELLO) {
                        payload["d"]["heartbeat_interval"].as_u64().unwrap_or(41250)
                    } else {
                        warn!("Discord: expected HELLO, got op={}", payload["op"]);
                        41250
                    }
                }
                _ => {
                    error!("Discord: no HELLO received");
                    tokio::time::sleep(std::time::Duration::from_secs(backoff)).await;
                    backoff = (backoff * 2).min(60);
                    continue;
                }
            };

            let identify = json!({
                "op": OP_IDENTIFY,
                "d": {
                    "token": self.token,
                    "intents": INTENTS,
                    "properties": {
                        "os": std::env::consts::OS,
                        "browser": "grocha",
                        "device": "grocha"
                    }
                }
            });

            if let Err(e) = write.send(WsMessage::Text(identify.to_string().into())).await {
                error!(error = %e, "Discord: failed to send IDENTIFY");
                continue;
            }

            self.connected.store(true, Ordering::SeqCst);
            let _ = self.event_tx.send(PlatformEvent::Connected).await;
            info!(heartbeat_ms = heartbeat_interval, "Discord Gateway connected");

            let mut sequence: Option<u64> = None;
            let mut heartbeat_timer =
                tokio::time::interval(std::time::Duration::from_millis(heartbeat_interval));
            heartbeat_timer.tick().await; // consume initial tick

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("Discord: shutdown signal received");
                            let _ = write.close().await;
                            return;
                        }
                    }
                    _ = heartbeat_timer.tick() => {
                        let hb = json!({ "op": OP_HEARTBEAT, "d": sequence });
                        if let Err(e) = write.send(WsMessage::Text(hb.to_string().into())).await {
                            warn!(error = %e, "Discord: heartbeat send failed");
                            break;
                        }
                    }
                    msg = read.next() => {
                        match msg {
                            Some(Ok(ws_msg)) => {
                                if ws_msg.is_close() {
                                    info!("Discord: server closed connection");
                                    break;
                                }
                                let Ok(text) = ws_msg.to_text() else { continue };
                                let Ok(payload) = serde_json::from_str::<Value>(text) else { continue };

                                if let Some(s) = payload["s"].as_u64() {
                                    sequence = Some(s);
                                }

                                match payload["op"].as_u64().unwrap_or(999) {
                                    OP_DISPATCH => {
                                        let event_name = payload["t"].as_str().unwrap_or("");
                                        self.dispatch(event_name, &payload["d"], &mut known).await;
                                    }
                                    OP_HEARTBEAT_ACK => {
                                        debug!("Discord: heartbeat ACK");
                                    }
                                    OP_HEARTBEAT => {
                                        let hb = json!({ "op": OP_HEARTBEAT, "d": sequence });
                                        let _ = write.send(WsMessage::Text(hb.to_string().into())).await;
                                    }
                                    OP_RECONNECT | OP_INVALID_SESSION => {
                                        info!("Discord: gateway asked for a new session");
                                        break;
                                    }
                                    op => {
                                        debug!(op, "Discord: unhandled opcode");
                                    }
                                }
                            }
                            Some(Err(e)) => {
                                error!(error = %e, "Discord WebSocket error");
                                break;
                            }
                            None => {
                                info!("Discord: WebSocket stream ended");
                                break;
                            }
                        }
                    }
                }
            }

            self.connected.store(false, Ordering::SeqCst);
            let _ = self
                .event_tx
                .send(PlatformEvent::Disconnected(Some(
                    "Gateway connection lost".into(),
                )))
                .await;

            if *shutdown_rx.borrow() {
                break;
            }

            info!(retry_in = backoff, "Discord: reconnecting...");
            tokio::time::sleep(std::time::Duration::from_secs(backoff)).await;
            backoff = (backoff * 2).min(60);
        }
    }

    /// Handle a DISPATCH event (op=0).
    async fn dispatch(&self, event_name: &str, data: &Value, known: &mut KnownGuilds) {
        let events: Vec<PlatformEvent> = match event_name {
            "READY" => {
                if let Some(user) = parse_user(&data["user"]) {
                    info!(bot_id = user.id, name = %user.name, "Discord bot ready");
                    *self.bot_user.write() = Some(user);
                }
                array(&data["guilds"])
                    .iter()
                    .filter_map(|g| snowflake(&g["id"]))
                    .filter(|g| known.insert(*g))
                    .map(|guild| PlatformEvent::Ready { guild })
                    .collect()
            }
            "GUILD_CREATE" => snowflake(&data["id"])
                .filter(|g| known.insert(*g))
                .map(|guild| PlatformEvent::Ready { guild })
                .into_iter()
                .collect(),
            "MESSAGE_CREATE" => parse_message(data)
                .map(PlatformEvent::Message)
                .into_iter()
                .collect(),
            "MESSAGE_REACTION_ADD" => parse_reaction(data).into_iter().collect(),
            "GUILD_MEMBER_ADD" => parse_member_add(data).into_iter().collect(),
            _ => {
                debug!(event = %event_name, "Discord: unhandled dispatch event");
                Vec::new()
            }
        };

        for event in events {
            if self.event_tx.send(event).await.is_err() {
                warn!("Discord: event channel closed");
                return;
            }
        }
    }
}

// ── Payload parsing ────────────────────────────────────────────

fn array(value: &Value) -> &[Value] {
    value.as_array().map(Vec::as_slice).unwrap_or(&[])
}

/// Snowflakes travel as decimal strings.
pub fn snowflake(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

pub fn parse_user(user: &Value) -> Option<Member> {
    Some(Member {
        id: snowflake(&user["id"])?,
        name: user["username"].as_str().unwrap_or("unknown").to_string(),
        bot: user["bot"].as_bool().unwrap_or(false),
    })
}

/// A partial emoji object: native when it has no id.
pub fn parse_emoji(emoji: &Value) -> Option<EmojiRef> {
    let name = emoji["name"].as_str()?;
    Some(match snowflake(&emoji["id"]) {
        Some(id) => EmojiRef::Custom {
            name: name.to_string(),
            id,
            animated: emoji["animated"].as_bool().unwrap_or(false),
        },
        None => EmojiRef::Native {
            symbol: name.to_string(),
        },
    })
}

pub fn parse_channel(channel: &Value) -> Option<GuildChannel> {
    let kind = match channel["type"].as_u64()? {
        0 | 5 => ChannelKind::Text,
        2 | 13 => ChannelKind::Voice,
        4 => ChannelKind::Category,
        _ => ChannelKind::Other,
    };
    Some(GuildChannel {
        id: snowflake(&channel["id"])?,
        name: channel["name"].as_str()?.to_string(),
        kind,
    })
}

fn channel_mentions(content: &str) -> Vec<ChannelId> {
    content
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter_map(|t| t.strip_prefix("<#")?.strip_suffix('>')?.parse().ok())
        .collect()
}

/// MESSAGE_CREATE payload. Direct messages (no guild) are dropped.
pub fn parse_message(data: &Value) -> Option<IncomingMessage> {
    let guild = snowflake(&data["guild_id"])?;
    let channel = snowflake(&data["channel_id"])?;
    let content = data["content"].as_str().unwrap_or("").to_string();
    Some(IncomingMessage {
        guild,
        message: MessageRef::new(channel, snowflake(&data["id"])?),
        author: parse_user(&data["author"])?,
        mentions: array(&data["mentions"]).iter().filter_map(parse_user).collect(),
        channel_mentions: channel_mentions(&content),
        mentions_everyone: data["mention_everyone"].as_bool().unwrap_or(false),
        reply_to_author: snowflake(&data["referenced_message"]["author"]["id"]),
        content,
    })
}

pub fn parse_reaction(data: &Value) -> Option<PlatformEvent> {
    Some(PlatformEvent::Reaction {
        guild: snowflake(&data["guild_id"])?,
        message: MessageRef::new(
            snowflake(&data["channel_id"])?,
            snowflake(&data["message_id"])?,
        ),
        user: snowflake(&data["user_id"])?,
        emoji: parse_emoji(&data["emoji"])?,
    })
}

pub fn parse_member_add(data: &Value) -> Option<PlatformEvent> {
    Some(PlatformEvent::MemberJoined {
        guild: snowflake(&data["guild_id"])?,
        member: parse_user(&data["user"])?,
    })
}

pub fn parse_history_message(data: &Value, channel: ChannelId) -> Option<HistoryMessage> {
    Some(HistoryMessage {
        message: MessageRef::new(channel, snowflake(&data["id"])?),
        author: parse_user(&data["author"])?,
        content: data["content"].as_str().unwrap_or("").to_string(),
        reactions: array(&data["reactions"])
            .iter()
            .filter_map(|r| {
                Some(ReactionCount {
                    emoji: parse_emoji(&r["emoji"])?,
                    count: r["count"].as_u64().unwrap_or(0) as usize,
                })
            })
            .collect(),
    })
}

/// Audit reasons are sent percent-encoded so non-ASCII text survives the
/// header.
pub fn audit_header(reason: &str) -> String {
    url::form_urlencoded::byte_serialize(reason.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
