//! In-memory fetcher with optional slow, chunked delivery.

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use dml_core::control::JobAborted;
use dml_core::platform::{FetchError, Fetcher};

#[derive(Default)]
pub struct FakeFetcher {
    bodies: Mutex<HashMap<String, Vec<u8>>>,
    /// Pause before each chunk of `chunk` bytes.
    pace: Mutex<Option<(usize, Duration)>>,
    pub requests: AtomicUsize,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: &str, body: &[u8]) {
        self.bodies
            .lock()
            .unwrap()
            .insert(url.to_string(), body.to_vec());
    }

    pub fn slow(&self, chunk: usize, pause: Duration) {
        *self.pace.lock().unwrap() = Some((chunk.max(1), pause));
    }
}

impl Fetcher for FakeFetcher {
    fn fetch(&self, url: &str, sink: &mut dyn Write) -> Result<u64, FetchError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let body = self
            .bodies
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or(FetchError::Http(404))?;
        let pace = *self.pace.lock().unwrap();
        let (chunk, pause) = pace.unwrap_or((body.len().max(1), Duration::ZERO));
        let mut written = 0u64;
        for part in body.chunks(chunk) {
            std::thread::sleep(pause);
            if let Err(e) = sink.write_all(part) {
                if e.get_ref().is_some_and(|i| i.is::<JobAborted>()) {
                    return Err(FetchError::Aborted);
                }
                return Err(FetchError::Storage(e));
            }
            written += part.len() as u64;
        }
        Ok(written)
    }
}
