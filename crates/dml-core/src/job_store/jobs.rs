//! Job CRUD: save, delete, load_all.

use anyhow::Result;
use sqlx::Row;

use super::db::JobStore;
use super::types::{from_sql, to_sql, Job};
use crate::platform::{ChannelId, GuildId, JobKey};

impl JobStore {
    /// Persist a job. Returns false when a job with the same key is already stored
    /// (the stored row is left untouched).
    pub async fn save(&self, job: &Job) -> Result<bool> {
        let r = sqlx::query(
            r#"
            INSERT OR IGNORE INTO jobs (guild_id, channel_id, added_at)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(to_sql(job.key.guild.0))
        .bind(to_sql(job.key.channel.0))
        .bind(job.added_at)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected() == 1)
    }

    /// Remove a job. Returns false when nothing was stored under `key`.
    pub async fn delete(&self, key: JobKey) -> Result<bool> {
        let r = sqlx::query(
            r#"
            DELETE FROM jobs
            WHERE guild_id = ?1 AND channel_id = ?2
            "#,
        )
        .bind(to_sql(key.guild.0))
        .bind(to_sql(key.channel.0))
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected() > 0)
    }

    /// All stored jobs, oldest first.
    pub async fn load_all(&self) -> Result<Vec<Job>> {
        let rows = sqlx::query(
            r#"
            SELECT guild_id, channel_id, added_at
            FROM jobs
            ORDER BY added_at ASC, rowid ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let jobs = rows
            .into_iter()
            .map(|row| {
                let guild: i64 = row.get("guild_id");
                let channel: i64 = row.get("channel_id");
                Job {
                    key: JobKey::new(GuildId(from_sql(guild)), ChannelId(from_sql(channel))),
                    added_at: row.get("added_at"),
                }
            })
            .collect();
        Ok(jobs)
    }
}
