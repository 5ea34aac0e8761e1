//! In-memory chat platform: guilds, channels and per-channel history.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use dml_core::platform::{
    Attachment, Channel, ChannelId, ChatPlatform, Guild, GuildId, Message, MessageId,
    PlatformError,
};

#[derive(Default)]
pub struct FakePlatform {
    guilds: Mutex<Vec<Guild>>,
    channels: Mutex<Vec<Channel>>,
    history: Mutex<HashMap<ChannelId, Vec<Message>>>,
    forbidden: Mutex<HashSet<ChannelId>>,
    unauthorized: AtomicBool,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_channel(&self, guild: u64, guild_name: &str, channel: u64, channel_name: &str) {
        let mut guilds = self.guilds.lock().unwrap();
        if !guilds.iter().any(|g| g.id == GuildId(guild)) {
            guilds.push(Guild {
                id: GuildId(guild),
                name: guild_name.to_string(),
            });
        }
        let mut channels = self.channels.lock().unwrap();
        let position = channels.len() as i64;
        channels.push(Channel {
            id: ChannelId(channel),
            guild: GuildId(guild),
            name: channel_name.to_string(),
            position,
        });
    }

    /// Append a message with one attachment per `(url, filename)` pair.
    pub fn post(&self, channel: u64, id: u64, author: &str, attachments: &[(&str, &str)]) {
        let message = Message {
            id: MessageId(id),
            channel: ChannelId(channel),
            author: author.to_string(),
            timestamp: Utc.timestamp_opt(1_700_000_000 + id as i64, 0).unwrap(),
            attachments: attachments
                .iter()
                .map(|(url, filename)| Attachment {
                    url: url.to_string(),
                    filename: filename.to_string(),
                    size: None,
                })
                .collect(),
        };
        self.history
            .lock()
            .unwrap()
            .entry(ChannelId(channel))
            .or_default()
            .push(message);
    }

    pub fn forbid(&self, channel: u64) {
        self.forbidden.lock().unwrap().insert(ChannelId(channel));
    }

    pub fn set_unauthorized(&self, value: bool) {
        self.unauthorized.store(value, Ordering::SeqCst);
    }

    fn check_session(&self) -> Result<(), PlatformError> {
        if self.unauthorized.load(Ordering::SeqCst) {
            Err(PlatformError::Unauthorized)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ChatPlatform for FakePlatform {
    async fn guilds(&self) -> Result<Vec<Guild>, PlatformError> {
        self.check_session()?;
        Ok(self.guilds.lock().unwrap().clone())
    }

    async fn text_channels(&self, guild: GuildId) -> Result<Vec<Channel>, PlatformError> {
        self.check_session()?;
        Ok(self
            .channels
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.guild == guild)
            .cloned()
            .collect())
    }

    async fn messages_after(
        &self,
        channel: ChannelId,
        after: Option<MessageId>,
        limit: u32,
    ) -> Result<Vec<Message>, PlatformError> {
        self.check_session()?;
        if self.forbidden.lock().unwrap().contains(&channel) {
            return Err(PlatformError::Forbidden(format!("channel {}", channel)));
        }
        let history = self.history.lock().unwrap();
        Ok(history
            .get(&channel)
            .map(|msgs| {
                msgs.iter()
                    .filter(|m| after.map_or(true, |a| m.id > a))
                    .take(limit as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
