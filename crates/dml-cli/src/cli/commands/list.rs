//! `dml list [--json]` – show the job list.

use anyhow::Result;
use chrono::DateTime;
use dml_core::context::AppContext;

pub fn run_list(ctx: &AppContext, json: bool) -> Result<()> {
    let jobs = ctx.scheduler().jobs();
    if json {
        println!("{}", serde_json::to_string_pretty(&jobs)?);
        return Ok(());
    }
    if jobs.is_empty() {
        println!("No jobs in the list.");
        return Ok(());
    }
    println!("{:<22} {:<22} {:<20} {}", "GUILD", "CHANNEL", "ADDED", "STATUS");
    for view in jobs {
        let added = DateTime::from_timestamp(view.job.added_at, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<22} {:<22} {:<20} {}",
            view.job.guild(),
            view.job.channel(),
            added,
            view.status
        );
    }
    Ok(())
}
