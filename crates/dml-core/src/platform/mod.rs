//! Chat-platform capabilities consumed by the core.
//!
//! The core never speaks the platform's protocol itself. It needs three things:
//! enumerate guilds and their text channels, page through a channel's history
//! oldest-to-newest, and fetch attachment bytes by URL (`fetch::Fetcher`).

mod fetch;

pub use fetch::{CurlFetcher, FetchError, Fetcher};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! snowflake {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

snowflake!(GuildId);
snowflake!(ChannelId);
snowflake!(MessageId);

/// Identity of a job: one channel inside one guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobKey {
    pub guild: GuildId,
    pub channel: ChannelId,
}

impl JobKey {
    pub fn new(guild: GuildId, channel: ChannelId) -> Self {
        Self { guild, channel }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.guild, self.channel)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guild {
    pub id: GuildId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: ChannelId,
    pub guild: GuildId,
    pub name: String,
    /// Sort position inside the guild's channel list.
    pub position: i64,
}

/// A file attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub url: String,
    pub filename: String,
    /// Size reported by the platform; used to verify the fetched byte count.
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub channel: ChannelId,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub attachments: Vec<Attachment>,
}

/// Errors surfaced by a `ChatPlatform` implementation.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// The session is no longer valid. Fatal for the whole scheduler.
    #[error("platform session is not authorized")]
    Unauthorized,
    /// The channel exists but can no longer be read.
    #[error("access to {0} is forbidden")]
    Forbidden(String),
    /// The guild or channel is gone.
    #[error("{0} not found")]
    NotFound(String),
    #[error("platform returned HTTP {0}")]
    Http(u32),
    /// Connection-level failure (DNS, reset, timeout).
    #[error("platform transport error: {0}")]
    Transport(String),
}

/// Read access to guilds, channels and message history.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    async fn guilds(&self) -> Result<Vec<Guild>, PlatformError>;

    async fn text_channels(&self, guild: GuildId) -> Result<Vec<Channel>, PlatformError>;

    /// Up to `limit` messages strictly newer than `after` (from the start of history when
    /// `None`), ordered oldest to newest. An empty page means the end of history for now.
    async fn messages_after(
        &self,
        channel: ChannelId,
        after: Option<MessageId>,
        limit: u32,
    ) -> Result<Vec<Message>, PlatformError>;
}

/// Names used when rendering destination paths for a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelNames {
    pub guild: String,
    pub channel: String,
}

/// Look up the guild and channel names for `key`. A missing guild or channel is `NotFound`.
pub async fn resolve_channel(
    platform: &dyn ChatPlatform,
    key: JobKey,
) -> Result<ChannelNames, PlatformError> {
    let guild = platform
        .guilds()
        .await?
        .into_iter()
        .find(|g| g.id == key.guild)
        .ok_or_else(|| PlatformError::NotFound(format!("guild {}", key.guild)))?;
    let channel = platform
        .text_channels(key.guild)
        .await?
        .into_iter()
        .find(|c| c.id == key.channel)
        .ok_or_else(|| PlatformError::NotFound(format!("channel {}", key)))?;
    Ok(ChannelNames {
        guild: guild.name,
        channel: channel.name,
    })
}
