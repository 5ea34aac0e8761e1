//! Integration tests: channel scans driven through the application context.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::fake_fetcher::FakeFetcher;
use common::fake_platform::FakePlatform;
use common::{eventually, key, settings};
use dml_core::context::AppContext;
use dml_core::job_store::JobStore;
use dml_core::platform::CurlFetcher;
use dml_core::scheduler::JobStatus;
use tempfile::tempdir;

async fn store_in(dir: &std::path::Path) -> JobStore {
    JobStore::open_at(dir.join("jobs.db")).await.unwrap()
}

#[tokio::test]
async fn three_messages_two_attachments_one_existing() {
    let root = tempdir().unwrap();
    let state = tempdir().unwrap();

    let platform = Arc::new(FakePlatform::new());
    platform.add_channel(1, "Guild", 10, "general");
    platform.post(10, 1, "ann", &[]);
    platform.post(10, 2, "bob", &[("https://cdn.test/a.png", "a.png")]);
    platform.post(10, 3, "cat", &[("https://cdn.test/b.png", "b.png")]);
    let fetcher = Arc::new(FakeFetcher::new());
    fetcher.serve("https://cdn.test/a.png", b"first");
    fetcher.serve("https://cdn.test/b.png", b"second");

    let existing = root.path().join("Guild/general/3_b.png");
    std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
    std::fs::write(&existing, b"kept").unwrap();

    let ctx = AppContext::startup(
        settings(root.path(), 2, false),
        store_in(state.path()).await,
        platform.clone(),
        fetcher.clone(),
    )
    .await
    .unwrap();
    let scheduler = ctx.scheduler();
    scheduler.add(key(1, 10)).await.unwrap();
    scheduler.start(key(1, 10)).unwrap();
    eventually("job completion", || {
        scheduler.status(key(1, 10)) == Some(JobStatus::Completed)
    })
    .await;

    let snap = ctx.progress();
    assert_eq!(snap.messages_scanned, 3);
    assert_eq!(snap.attachments_discovered, 2);
    assert_eq!(snap.attachments_downloaded, 1);
    assert_eq!(snap.to_string(), "Scanned: 3 Downloaded: 1 Open: 1");
    assert_eq!(fetcher.requests.load(Ordering::SeqCst), 1);
    assert_eq!(
        std::fs::read(root.path().join("Guild/general/2_a.png")).unwrap(),
        b"first"
    );
    assert_eq!(std::fs::read(&existing).unwrap(), b"kept");

    ctx.shutdown().await;
}

#[tokio::test]
async fn transient_failures_then_success_downloads_once() {
    let body: Vec<u8> = (0u8..=255).cycle().take(32 * 1024).collect();
    let server = common::flaky_server::start(body.clone(), 2);
    let root = tempdir().unwrap();
    let state = tempdir().unwrap();

    let platform = Arc::new(FakePlatform::new());
    platform.add_channel(1, "Guild", 10, "general");
    let url = server.file_url();
    platform.post(10, 7, "ann", &[(url.as_str(), "blob.bin")]);

    let ctx = AppContext::startup(
        settings(root.path(), 1, false),
        store_in(state.path()).await,
        platform,
        Arc::new(CurlFetcher::default()),
    )
    .await
    .unwrap();
    ctx.scheduler().add(key(1, 10)).await.unwrap();
    ctx.scheduler().start(key(1, 10)).unwrap();
    eventually("job completion", || {
        ctx.scheduler().status(key(1, 10)) == Some(JobStatus::Completed)
    })
    .await;

    assert_eq!(server.requests(), 3);
    let snap = ctx.progress();
    assert_eq!(snap.attachments_downloaded, 1);
    assert_eq!(snap.attachments_failed, 0);

    let dir = root.path().join("Guild/general");
    let files: Vec<_> = std::fs::read_dir(&dir)
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(files, vec![std::ffi::OsString::from("7_blob.bin")]);
    assert_eq!(std::fs::read(dir.join("7_blob.bin")).unwrap(), body);

    ctx.shutdown().await;
}

#[tokio::test]
async fn missing_attachment_is_a_per_attachment_failure() {
    let server = common::flaky_server::start(b"ok".to_vec(), 0);
    let root = tempdir().unwrap();
    let state = tempdir().unwrap();

    let platform = Arc::new(FakePlatform::new());
    platform.add_channel(1, "Guild", 10, "general");
    let (missing, present) = (server.missing_url(), server.file_url());
    platform.post(10, 1, "ann", &[(missing.as_str(), "gone.png")]);
    platform.post(10, 2, "bob", &[(present.as_str(), "ok.txt")]);

    let ctx = AppContext::startup(
        settings(root.path(), 1, false),
        store_in(state.path()).await,
        platform,
        Arc::new(CurlFetcher::default()),
    )
    .await
    .unwrap();
    ctx.scheduler().add(key(1, 10)).await.unwrap();
    ctx.scheduler().start(key(1, 10)).unwrap();
    eventually("job completion", || {
        ctx.scheduler().status(key(1, 10)) == Some(JobStatus::Completed)
    })
    .await;

    // 404 is permanent: one request, no retries.
    assert_eq!(server.requests(), 2);
    let snap = ctx.progress();
    assert_eq!(snap.attachments_discovered, 2);
    assert_eq!(snap.attachments_downloaded, 1);
    assert_eq!(snap.attachments_failed, 1);
    assert!(!root.path().join("Guild/general/1_gone.png").exists());

    ctx.shutdown().await;
}

#[tokio::test]
async fn two_jobs_rendering_the_same_path_write_it_once() {
    let root = tempdir().unwrap();
    let state = tempdir().unwrap();

    let platform = Arc::new(FakePlatform::new());
    platform.add_channel(1, "Guild", 10, "one");
    platform.add_channel(1, "Guild", 11, "two");
    platform.post(10, 1, "ann", &[("https://cdn.test/x", "shared.png")]);
    platform.post(11, 2, "bob", &[("https://cdn.test/y", "shared.png")]);
    let fetcher = Arc::new(FakeFetcher::new());
    fetcher.serve("https://cdn.test/x", b"from one");
    fetcher.serve("https://cdn.test/y", b"from two");

    let mut cfg = settings(root.path(), 2, false);
    cfg.file_name_scheme = "{guild}/{filename}".into();
    let ctx = AppContext::startup(cfg, store_in(state.path()).await, platform, fetcher)
        .await
        .unwrap();
    let scheduler = ctx.scheduler();
    scheduler.add(key(1, 10)).await.unwrap();
    scheduler.add(key(1, 11)).await.unwrap();
    assert_eq!(scheduler.start_all().unwrap(), 2);
    eventually("both jobs completed", || {
        scheduler
            .jobs()
            .iter()
            .all(|v| v.status == JobStatus::Completed)
    })
    .await;

    let snap = ctx.progress();
    assert_eq!(snap.attachments_discovered, 2);
    assert_eq!(snap.attachments_downloaded, 1);
    let content = std::fs::read(root.path().join("Guild/shared.png")).unwrap();
    assert!(content == b"from one" || content == b"from two");
    let entries = std::fs::read_dir(root.path().join("Guild")).unwrap().count();
    assert_eq!(entries, 1, "no staged files left behind");

    ctx.shutdown().await;
}

#[tokio::test]
async fn live_tail_picks_up_messages_posted_after_backfill() {
    let root = tempdir().unwrap();
    let state = tempdir().unwrap();

    let platform = Arc::new(FakePlatform::new());
    platform.add_channel(1, "Guild", 10, "general");
    platform.post(10, 1, "ann", &[("https://cdn.test/old.png", "old.png")]);
    let fetcher = Arc::new(FakeFetcher::new());
    fetcher.serve("https://cdn.test/old.png", b"old");
    fetcher.serve("https://cdn.test/new.png", b"new");

    let mut s = settings(root.path(), 1, true);
    s.scan.poll_interval_secs = 1;
    let ctx = AppContext::startup(s, store_in(state.path()).await, platform.clone(), fetcher.clone())
        .await
        .unwrap();
    let scheduler = ctx.scheduler();
    scheduler.add(key(1, 10)).await.unwrap();
    scheduler.start(key(1, 10)).unwrap();
    eventually("backfill download", || ctx.progress().attachments_downloaded == 1).await;

    platform.post(10, 2, "bob", &[("https://cdn.test/new.png", "new.png")]);
    eventually("live tail download", || ctx.progress().attachments_downloaded == 2).await;

    let snap = ctx.progress();
    assert_eq!(snap.messages_scanned, 2);
    assert_eq!(snap.attachments_discovered, 2);
    assert_eq!(scheduler.status(key(1, 10)), Some(JobStatus::Running));
    assert_eq!(
        std::fs::read(root.path().join("Guild/general/2_new.png")).unwrap(),
        b"new"
    );

    ctx.shutdown().await;
}
