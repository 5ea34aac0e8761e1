//! Chat-platform adapter for Discord's HTTP API.
//!
//! Read-only: lists guilds and text channels and pages through channel history.
//! The token comes from `DML_TOKEN`; without it every call is `Unauthorized`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use curl::easy::{Easy, List};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use dml_core::platform::{
    Attachment, Channel, ChannelId, ChatPlatform, Guild, GuildId, Message, MessageId,
    PlatformError,
};

pub const TOKEN_ENV: &str = "DML_TOKEN";
const API_BASE: &str = "https://discord.com/api/v10";
/// Largest page the messages endpoint serves.
const MAX_PAGE: u32 = 100;
const GUILD_TEXT: u8 = 0;
const GUILD_ANNOUNCEMENT: u8 = 5;

pub struct DiscordHttp {
    token: Option<String>,
    api_base: String,
    user_agent: String,
}

impl DiscordHttp {
    pub fn new(token: Option<String>, api_base: impl Into<String>) -> Self {
        Self {
            token,
            api_base: api_base.into(),
            user_agent: concat!("dml/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    pub fn from_env() -> Self {
        let token = std::env::var(TOKEN_ENV)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        if token.is_none() {
            tracing::debug!("{} not set", TOKEN_ENV);
        }
        Self::new(token, API_BASE)
    }

    async fn get<T>(&self, path: String) -> Result<T, PlatformError>
    where
        T: DeserializeOwned,
    {
        let token = self.token.clone().ok_or(PlatformError::Unauthorized)?;
        let url = format!("{}{}", self.api_base, path);
        let user_agent = self.user_agent.clone();
        tracing::debug!(%path, "platform request");
        let body = tokio::task::spawn_blocking(move || get_blocking(&url, &token, &user_agent))
            .await
            .map_err(|e| PlatformError::Transport(e.to_string()))??;
        serde_json::from_slice(&body)
            .map_err(|e| PlatformError::Transport(format!("decode {}: {}", path, e)))
    }
}

fn get_blocking(url: &str, token: &str, user_agent: &str) -> Result<Vec<u8>, PlatformError> {
    let transport = |e: curl::Error| PlatformError::Transport(e.to_string());
    let mut body = Vec::new();
    let mut easy = Easy::new();
    easy.url(url).map_err(transport)?;
    easy.useragent(user_agent).map_err(transport)?;
    easy.connect_timeout(Duration::from_secs(30)).map_err(transport)?;
    easy.timeout(Duration::from_secs(60)).map_err(transport)?;
    let mut headers = List::new();
    headers
        .append(&format!("Authorization: {}", token))
        .map_err(transport)?;
    easy.http_headers(headers).map_err(transport)?;
    {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })
            .map_err(transport)?;
        transfer.perform().map_err(transport)?;
    }
    let code = easy.response_code().map_err(transport)?;
    status_to_result(code, url).map(|()| body)
}

fn status_to_result(code: u32, what: &str) -> Result<(), PlatformError> {
    match code {
        200..=299 => Ok(()),
        401 => Err(PlatformError::Unauthorized),
        403 => Err(PlatformError::Forbidden(what.to_string())),
        404 => Err(PlatformError::NotFound(what.to_string())),
        other => Err(PlatformError::Http(other)),
    }
}

fn parse_id(raw: &str) -> Result<u64, PlatformError> {
    raw.parse()
        .map_err(|_| PlatformError::Transport(format!("invalid snowflake {:?}", raw)))
}

#[derive(Debug, Deserialize)]
struct WireGuild {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct WireChannel {
    id: String,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    position: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WireAuthor {
    username: String,
}

#[derive(Debug, Deserialize)]
struct WireAttachment {
    url: String,
    filename: String,
    #[serde(default)]
    size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    id: String,
    channel_id: String,
    author: WireAuthor,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    attachments: Vec<WireAttachment>,
}

impl WireChannel {
    fn into_text_channel(self, guild: GuildId) -> Result<Option<Channel>, PlatformError> {
        if self.kind != GUILD_TEXT && self.kind != GUILD_ANNOUNCEMENT {
            return Ok(None);
        }
        Ok(Some(Channel {
            id: ChannelId(parse_id(&self.id)?),
            guild,
            name: self.name.unwrap_or_default(),
            position: self.position.unwrap_or_default(),
        }))
    }
}

impl TryFrom<WireMessage> for Message {
    type Error = PlatformError;

    fn try_from(w: WireMessage) -> Result<Self, Self::Error> {
        Ok(Message {
            id: MessageId(parse_id(&w.id)?),
            channel: ChannelId(parse_id(&w.channel_id)?),
            author: w.author.username,
            timestamp: w.timestamp,
            attachments: w
                .attachments
                .into_iter()
                .map(|a| Attachment {
                    url: a.url,
                    filename: a.filename,
                    size: a.size,
                })
                .collect(),
        })
    }
}

#[async_trait]
impl ChatPlatform for DiscordHttp {
    async fn guilds(&self) -> Result<Vec<Guild>, PlatformError> {
        let wire: Vec<WireGuild> = self.get("/users/@me/guilds".to_string()).await?;
        wire.into_iter()
            .map(|g| {
                Ok(Guild {
                    id: GuildId(parse_id(&g.id)?),
                    name: g.name,
                })
            })
            .collect()
    }

    async fn text_channels(&self, guild: GuildId) -> Result<Vec<Channel>, PlatformError> {
        let wire: Vec<WireChannel> = self.get(format!("/guilds/{}/channels", guild)).await?;
        let mut channels = Vec::new();
        for c in wire {
            if let Some(channel) = c.into_text_channel(guild)? {
                channels.push(channel);
            }
        }
        Ok(channels)
    }

    async fn messages_after(
        &self,
        channel: ChannelId,
        after: Option<MessageId>,
        limit: u32,
    ) -> Result<Vec<Message>, PlatformError> {
        // `after=0` pages from the first message; the API returns newest first.
        let after = after.unwrap_or(MessageId(0));
        let limit = limit.clamp(1, MAX_PAGE);
        let wire: Vec<WireMessage> = self
            .get(format!(
                "/channels/{}/messages?after={}&limit={}",
                channel, after, limit
            ))
            .await?;
        let mut messages = wire
            .into_iter()
            .map(Message::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        messages.sort_by_key(|m| m.id);
        Ok(messages)
    }
}
