//! CLI for the DML channel media archiver.

mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use dml_core::config;
use dml_core::context::AppContext;
use dml_core::job_store::JobStore;
use dml_core::platform::{ChannelId, CurlFetcher, GuildId, JobKey};

use crate::discord::DiscordHttp;
use commands::{
    run_add, run_config_set, run_config_show, run_guilds, run_jobs, run_list, run_remove,
    ConfigChanges, RunTargets,
};

/// Top-level CLI for the DML channel media archiver.
#[derive(Debug, Parser)]
#[command(name = "dml")]
#[command(about = "DML: archive media attachments from chat channels", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Add a channel to the job list (does not start it).
    Add {
        /// Guild id.
        guild: u64,
        /// Channel id.
        channel: u64,
    },

    /// Remove a channel from the job list.
    Remove {
        guild: u64,
        channel: u64,
    },

    /// Show the job list.
    List {
        /// Print the list as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List guilds and their text channels.
    Guilds,

    /// Show or change settings.
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },

    /// Start jobs and show progress until Ctrl-C (or until history is done with --once).
    Run {
        /// Start every job in the list.
        #[arg(long, conflicts_with = "targets")]
        all: bool,
        /// Stop each job at the end of its history instead of watching for new messages.
        #[arg(long)]
        once: bool,
        /// Pairs of guild and channel ids.
        #[arg(value_name = "GUILD CHANNEL")]
        targets: Vec<u64>,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the current settings.
    Show,
    /// Change settings and store them.
    Set {
        #[arg(long, value_name = "DIR")]
        operating_folder: Option<PathBuf>,
        /// File name template, e.g. "{guild}/{channel}/{message_id}_{filename}".
        #[arg(long)]
        scheme: Option<String>,
        #[arg(long, value_name = "BOOL")]
        skip_existing: Option<bool>,
        #[arg(long, value_name = "N")]
        thread_limit: Option<usize>,
    },
}

/// Turn `[g1, c1, g2, c2, ...]` into job keys.
pub(crate) fn keys_from_pairs(ids: &[u64]) -> Result<Vec<JobKey>> {
    if ids.len() % 2 != 0 {
        bail!("expected pairs of <guild> <channel> ids, got {} value(s)", ids.len());
    }
    Ok(ids
        .chunks_exact(2)
        .map(|p| JobKey::new(GuildId(p[0]), ChannelId(p[1])))
        .collect())
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let settings = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", settings);

        match cli.command {
            CliCommand::Config { action } => {
                let path = config::config_path()?;
                match action {
                    ConfigCommand::Show => run_config_show(&path, &settings),
                    ConfigCommand::Set {
                        operating_folder,
                        scheme,
                        skip_existing,
                        thread_limit,
                    } => run_config_set(
                        &path,
                        settings,
                        ConfigChanges {
                            operating_folder,
                            scheme,
                            skip_existing,
                            thread_limit,
                        },
                    ),
                }
            }
            CliCommand::Guilds => run_guilds(&DiscordHttp::from_env()).await,
            command => command.run_with_context(settings).await,
        }
    }

    /// Commands that need the job store and scheduler.
    async fn run_with_context(self, settings: config::Settings) -> Result<()> {
        let store = JobStore::open_default().await?;
        let ctx = AppContext::startup(
            settings,
            store,
            Arc::new(DiscordHttp::from_env()),
            Arc::new(CurlFetcher::default()),
        )
        .await?;
        let result = match self {
            CliCommand::Add { guild, channel } => {
                run_add(&ctx, JobKey::new(GuildId(guild), ChannelId(channel))).await
            }
            CliCommand::Remove { guild, channel } => {
                run_remove(&ctx, JobKey::new(GuildId(guild), ChannelId(channel))).await
            }
            CliCommand::List { json } => run_list(&ctx, json),
            CliCommand::Run { all, once, targets } => match keys_from_pairs(&targets) {
                Ok(_) if all => run_jobs(&ctx, RunTargets::All, once).await,
                Ok(keys) => run_jobs(&ctx, RunTargets::Only(keys), once).await,
                Err(e) => Err(e),
            },
            CliCommand::Config { .. } | CliCommand::Guilds => Ok(()),
        };
        ctx.shutdown().await;
        result
    }
}

#[cfg(test)]
mod tests;
