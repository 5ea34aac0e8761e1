//! `dml guilds` – list guilds and their text channels with the ids `add` expects.

use anyhow::{Context, Result};
use dml_core::platform::ChatPlatform;

pub async fn run_guilds(platform: &dyn ChatPlatform) -> Result<()> {
    let guilds = platform.guilds().await.context("list guilds")?;
    if guilds.is_empty() {
        println!("No guilds.");
    }
    for guild in guilds {
        println!("{} {}", guild.id, guild.name);
        let mut channels = platform
            .text_channels(guild.id)
            .await
            .with_context(|| format!("list channels of {}", guild.name))?;
        channels.sort_by_key(|c| c.position);
        for channel in channels {
            println!("    {} #{}", channel.id, channel.name);
        }
    }
    Ok(())
}
