//! `dml remove <guild> <channel>` – remove a channel from the job list.
//! Downloaded files stay where they are.

use anyhow::Result;
use dml_core::context::AppContext;
use dml_core::platform::JobKey;

pub async fn run_remove(ctx: &AppContext, key: JobKey) -> Result<()> {
    if ctx.scheduler().remove(key).await? {
        println!("Removed job {key}");
    } else {
        println!("No job {key}");
    }
    Ok(())
}
