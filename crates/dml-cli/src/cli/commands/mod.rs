//! CLI command handlers, one file per command.

mod add;
mod config;
mod guilds;
mod list;
mod remove;
mod run;

pub use add::run_add;
pub use config::{run_config_set, run_config_show, ConfigChanges};
pub use guilds::run_guilds;
pub use list::run_list;
pub use remove::run_remove;
pub use run::{run_jobs, RunTargets};
