//! Types stored by the job store.

use serde::Serialize;

use crate::platform::{ChannelId, GuildId, JobKey};

/// A persisted job definition: one channel to archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Job {
    pub key: JobKey,
    /// Unix seconds when the job was first saved.
    pub added_at: i64,
}

impl Job {
    pub fn new(key: JobKey) -> Self {
        Self {
            key,
            added_at: super::db::unix_timestamp(),
        }
    }

    pub fn guild(&self) -> GuildId {
        self.key.guild
    }

    pub fn channel(&self) -> ChannelId {
        self.key.channel
    }
}

// Snowflakes are u64; SQLite integers are i64. Store the bit pattern unchanged.
pub(crate) fn to_sql(id: u64) -> i64 {
    id as i64
}

pub(crate) fn from_sql(v: i64) -> u64 {
    v as u64
}
