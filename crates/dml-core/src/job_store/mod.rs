//! Durable job definitions (SQLite via sqlx).
//!
//! One row per watched channel, keyed by (guild id, channel id). Inserts are
//! idempotent so a crash between save and reload can neither lose nor
//! duplicate a job.

mod db;
mod jobs;
mod types;

pub use db::JobStore;
#[cfg(test)]
pub(crate) use db::open_memory;
pub use types::Job;
