//! `dml add <guild> <channel>` – add a channel to the job list.

use anyhow::Result;
use dml_core::context::AppContext;
use dml_core::platform::JobKey;
use dml_core::scheduler::AddOutcome;

pub async fn run_add(ctx: &AppContext, key: JobKey) -> Result<()> {
    match ctx.scheduler().add(key).await? {
        AddOutcome::Added => println!("Added job {key}"),
        AddOutcome::AlreadyExists => println!("Job {key} is already in the list"),
    }
    Ok(())
}
