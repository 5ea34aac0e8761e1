//! Single-attachment downloader.
//!
//! Streams one URL into a staged file beside the destination, retries
//! transient failures with backoff, verifies the byte count against the
//! platform's size hint and renames onto the destination only when complete.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use crate::control::{AbortToken, JobAborted};
use crate::naming::{self, OutsideRoot};
use crate::platform::{FetchError, Fetcher};
use crate::retry::{classify_fetch_error, run_with_retry, Retried, RetryPolicy};
use crate::storage::{CommitOutcome, StagedFile};

/// One attachment to fetch.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    /// Expected byte count, if the platform reported one.
    pub expected_size: Option<u64>,
    /// Final path; must lie below `root`.
    pub dest: PathBuf,
    /// Operating folder.
    pub root: PathBuf,
    /// Replace an existing destination instead of keeping it.
    pub overwrite: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    Downloaded { bytes: u64, attempts: u32 },
    /// Another writer committed the destination first (no-clobber mode).
    AlreadyExists,
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error(transparent)]
    OutsideRoot(#[from] OutsideRoot),
    /// Permanent failure, or transient failures that exhausted the retry budget.
    #[error("fetch failed after {attempts} attempt(s): {source}")]
    Fetch {
        source: FetchError,
        attempts: u32,
        transient: bool,
    },
    /// Disk full, permission denied and other local I/O failures. Never retried.
    #[error("disk error at {}: {source}", path.display())]
    Disk { path: PathBuf, source: io::Error },
    #[error("download aborted")]
    Aborted,
}

/// Fetches attachments to disk. Cheap to clone.
#[derive(Clone)]
pub struct Downloader {
    fetcher: Arc<dyn Fetcher>,
    policy: RetryPolicy,
}

impl Downloader {
    pub fn new(fetcher: Arc<dyn Fetcher>, policy: RetryPolicy) -> Self {
        Self { fetcher, policy }
    }

    /// Download on a blocking thread; the caller's task only awaits the result.
    pub async fn download(
        &self,
        req: DownloadRequest,
        abort: &AbortToken,
    ) -> Result<DownloadOutcome, DownloadError> {
        let this = self.clone();
        let abort = abort.clone();
        tokio::task::spawn_blocking(move || this.download_blocking(&req, &abort))
            .await
            .unwrap_or_else(|e| match e.try_into_panic() {
                Ok(panic) => std::panic::resume_unwind(panic),
                Err(_) => Err(DownloadError::Aborted),
            })
    }

    /// Blocking download. Leaves either a complete file at `req.dest` or nothing new.
    pub fn download_blocking(
        &self,
        req: &DownloadRequest,
        abort: &AbortToken,
    ) -> Result<DownloadOutcome, DownloadError> {
        if !naming::is_within(&req.root, &req.dest) || req.dest == req.root {
            return Err(OutsideRoot(req.dest.clone()).into());
        }
        let parent = req
            .dest
            .parent()
            .ok_or_else(|| OutsideRoot(req.dest.clone()))?;
        std::fs::create_dir_all(parent).map_err(|source| DownloadError::Disk {
            path: parent.to_path_buf(),
            source,
        })?;

        let mut attempts = 0u32;
        let staged = run_with_retry(&self.policy, abort, classify_fetch_error, |attempt| {
            attempts = attempt;
            self.attempt(req, abort)
        })
        .map_err(|e| match e {
            Retried::Aborted => DownloadError::Aborted,
            Retried::Failed {
                error: FetchError::Aborted,
                ..
            } => DownloadError::Aborted,
            Retried::Failed {
                error: FetchError::Storage(source),
                ..
            } => DownloadError::Disk {
                path: req.dest.clone(),
                source,
            },
            Retried::Failed {
                error,
                attempts,
                transient,
            } => DownloadError::Fetch {
                source: error,
                attempts,
                transient,
            },
        })?;

        let bytes = staged.written();
        let outcome = staged
            .commit(&req.dest, req.overwrite)
            .map_err(|source| DownloadError::Disk {
                path: req.dest.clone(),
                source,
            })?;
        match outcome {
            CommitOutcome::Committed => {
                tracing::debug!(path = %req.dest.display(), bytes, attempts, "attachment saved");
                Ok(DownloadOutcome::Downloaded { bytes, attempts })
            }
            CommitOutcome::AlreadyExists => {
                tracing::debug!(path = %req.dest.display(), "destination appeared during download");
                Ok(DownloadOutcome::AlreadyExists)
            }
        }
    }

    fn attempt(&self, req: &DownloadRequest, abort: &AbortToken) -> Result<StagedFile, FetchError> {
        if abort.is_aborted() {
            return Err(FetchError::Aborted);
        }
        let mut staged = StagedFile::create_for(&req.dest).map_err(FetchError::Storage)?;
        let received = {
            let mut sink = AbortableWriter {
                inner: &mut staged,
                abort,
            };
            self.fetcher.fetch(&req.url, &mut sink)?
        };
        if let Some(expected) = req.expected_size {
            if received != expected {
                return Err(FetchError::PartialTransfer { expected, received });
            }
        }
        Ok(staged)
    }
}

/// Writer that fails with `JobAborted` once the job is stopped.
struct AbortableWriter<'a> {
    inner: &'a mut StagedFile,
    abort: &'a AbortToken,
}

impl Write for AbortableWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.abort.is_aborted() {
            return Err(io::Error::new(io::ErrorKind::Other, JobAborted));
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Fails the first `failures` calls with `error`, then serves `body`.
    struct ScriptedFetcher {
        body: Vec<u8>,
        failures: u32,
        error: fn() -> FetchError,
        calls: AtomicU32,
    }

    impl ScriptedFetcher {
        fn new(body: &[u8], failures: u32, error: fn() -> FetchError) -> Arc<Self> {
            Arc::new(Self {
                body: body.to_vec(),
                failures,
                error,
                calls: AtomicU32::new(0),
            })
        }
    }

    impl Fetcher for ScriptedFetcher {
        fn fetch(&self, _url: &str, sink: &mut dyn Write) -> Result<u64, FetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            // Write a little before failing so a partial temp file exists.
            sink.write_all(&self.body[..self.body.len().min(2)])
                .map_err(|e| match e.get_ref() {
                    Some(inner) if inner.is::<JobAborted>() => FetchError::Aborted,
                    _ => FetchError::Storage(e),
                })?;
            if n < self.failures {
                return Err((self.error)());
            }
            sink.write_all(&self.body[self.body.len().min(2)..])
                .map_err(FetchError::Storage)?;
            Ok(self.body.len() as u64)
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    fn request(root: &Path, rel: &str, size: Option<u64>) -> DownloadRequest {
        DownloadRequest {
            url: "https://cdn.example.com/a.bin".to_string(),
            expected_size: size,
            dest: root.join(rel),
            root: root.to_path_buf(),
            overwrite: false,
        }
    }

    fn file_count(dir: &Path) -> usize {
        walk(dir).len()
    }

    fn walk(dir: &Path) -> Vec<PathBuf> {
        let mut out = Vec::new();
        for entry in std::fs::read_dir(dir).unwrap() {
            let p = entry.unwrap().path();
            if p.is_dir() {
                out.extend(walk(&p));
            } else {
                out.push(p);
            }
        }
        out
    }

    #[test]
    fn transient_failures_then_success_writes_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = ScriptedFetcher::new(b"payload", 2, || FetchError::Http(503));
        let d = Downloader::new(fetcher.clone(), fast_policy());
        let req = request(dir.path(), "g/c/1_a.bin", Some(7));
        let out = d.download_blocking(&req, &AbortToken::new()).unwrap();
        assert_eq!(out, DownloadOutcome::Downloaded { bytes: 7, attempts: 3 });
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
        assert_eq!(std::fs::read(&req.dest).unwrap(), b"payload");
        assert_eq!(file_count(dir.path()), 1);
    }

    #[test]
    fn permanent_failure_is_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = ScriptedFetcher::new(b"payload", 10, || FetchError::Http(404));
        let d = Downloader::new(fetcher.clone(), fast_policy());
        let req = request(dir.path(), "x.bin", None);
        match d.download_blocking(&req, &AbortToken::new()) {
            Err(DownloadError::Fetch {
                attempts, transient, ..
            }) => {
                assert_eq!(attempts, 1);
                assert!(!transient);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(file_count(dir.path()), 0);
    }

    #[test]
    fn exhausted_retries_leave_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = ScriptedFetcher::new(b"payload", 10, || FetchError::Http(500));
        let d = Downloader::new(fetcher.clone(), fast_policy());
        let req = request(dir.path(), "x.bin", None);
        assert!(matches!(
            d.download_blocking(&req, &AbortToken::new()),
            Err(DownloadError::Fetch { attempts: 4, transient: true, .. })
        ));
        assert_eq!(file_count(dir.path()), 0);
    }

    #[test]
    fn size_mismatch_is_retried_as_partial_transfer() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = ScriptedFetcher::new(b"short", 0, || FetchError::Http(500));
        let d = Downloader::new(fetcher.clone(), fast_policy());
        let req = request(dir.path(), "x.bin", Some(100));
        match d.download_blocking(&req, &AbortToken::new()) {
            Err(DownloadError::Fetch {
                source: FetchError::PartialTransfer { expected, received },
                ..
            }) => {
                assert_eq!(expected, 100);
                assert_eq!(received, 5);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 4);
        assert!(!req.dest.exists());
    }

    #[test]
    fn aborted_download_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = ScriptedFetcher::new(b"payload", 0, || FetchError::Http(500));
        let d = Downloader::new(fetcher, fast_policy());
        let abort = AbortToken::new();
        abort.abort();
        let req = request(dir.path(), "x.bin", None);
        assert!(matches!(
            d.download_blocking(&req, &abort),
            Err(DownloadError::Aborted)
        ));
        assert_eq!(file_count(dir.path()), 0);
    }

    #[test]
    fn destination_outside_root_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        let fetcher = ScriptedFetcher::new(b"payload", 0, || FetchError::Http(500));
        let d = Downloader::new(fetcher.clone(), fast_policy());
        let req = DownloadRequest {
            dest: root.join("../evil.bin"),
            ..request(&root, "x", None)
        };
        assert!(matches!(
            d.download_blocking(&req, &AbortToken::new()),
            Err(DownloadError::OutsideRoot(_))
        ));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn existing_destination_wins_without_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = ScriptedFetcher::new(b"new", 0, || FetchError::Http(500));
        let d = Downloader::new(fetcher, fast_policy());
        let req = request(dir.path(), "x.bin", None);
        std::fs::write(&req.dest, b"old").unwrap();
        assert_eq!(
            d.download_blocking(&req, &AbortToken::new()).unwrap(),
            DownloadOutcome::AlreadyExists
        );
        assert_eq!(std::fs::read(&req.dest).unwrap(), b"old");

        let req = DownloadRequest {
            overwrite: true,
            ..req
        };
        assert!(matches!(
            d.download_blocking(&req, &AbortToken::new()).unwrap(),
            DownloadOutcome::Downloaded { .. }
        ));
        assert_eq!(std::fs::read(&req.dest).unwrap(), b"new");
        assert_eq!(file_count(dir.path()), 1);
    }
}
