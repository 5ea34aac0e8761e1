//! Disk I/O and file lifecycle.
//!
//! Attachments are streamed into a staged temp file in the destination's own
//! directory and only renamed onto the final name once complete, so a
//! half-written file never satisfies a later skip-existing check.

mod staged;

pub use staged::{CommitOutcome, StagedFile};

use std::path::Path;

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// True when `path` is a regular file with at least one byte.
pub fn is_nonempty_file(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}
