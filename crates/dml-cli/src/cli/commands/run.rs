//! `dml run` – start jobs and print aggregate progress until they end or Ctrl-C.

use std::io::Write;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use dml_core::context::AppContext;
use dml_core::platform::JobKey;
use dml_core::scheduler::{JobStatus, Scheduler};

const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunTargets {
    All,
    Only(Vec<JobKey>),
}

pub async fn run_jobs(ctx: &AppContext, targets: RunTargets, once: bool) -> Result<()> {
    let scheduler = ctx.scheduler();
    if once {
        let mut settings = (*scheduler.settings()).clone();
        settings.scan.live_tail = false;
        scheduler.apply_settings(settings)?;
    }

    let keys: Vec<JobKey> = match targets {
        RunTargets::All => scheduler.jobs().iter().map(|v| v.job.key).collect(),
        RunTargets::Only(keys) => keys,
    };
    if keys.is_empty() {
        println!("No jobs to run.");
        return Ok(());
    }
    for key in &keys {
        scheduler
            .start(*key)
            .with_context(|| format!("start job {} (add it first with `dml add`)", key))?;
    }
    println!(
        "Started {} job(s) with thread limit {}. Press Ctrl-C to stop.",
        keys.len(),
        scheduler.pool_capacity()
    );

    let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                print_progress(ctx, scheduler);
                if scheduler.fatal_error().is_some()
                    || keys.iter().all(|k| !scheduler.is_running(*k))
                {
                    break;
                }
            }
            signal = &mut ctrl_c => {
                signal.context("listen for Ctrl-C")?;
                println!();
                println!("Stopping...");
                scheduler.stop_all().await;
                break;
            }
        }
    }
    print_progress(ctx, scheduler);
    println!();

    for key in &keys {
        let status = scheduler.status(*key).unwrap_or(JobStatus::Idle);
        println!("{:<45} {}", key, status);
    }
    if let Some(reason) = scheduler.fatal_error() {
        bail!("{}; set DML_TOKEN to a valid token", reason);
    }
    Ok(())
}

fn print_progress(ctx: &AppContext, scheduler: &Scheduler) {
    let snap = ctx.progress();
    print!(
        "\r{}  ({}%, {} failed, {} scanning)  ",
        snap,
        snap.percent(),
        snap.attachments_failed,
        scheduler.executing()
    );
    let _ = std::io::stdout().flush();
}
