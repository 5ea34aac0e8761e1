//! Staged temp file next to its destination, committed by atomic rename.

use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use super::{is_nonempty_file, TEMP_SUFFIX};

/// Result of committing a staged file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// No-clobber commit found a file already at the destination; the staged bytes were dropped.
    AlreadyExists,
}

/// Temp file created in the destination's directory. Removed on drop unless committed.
pub struct StagedFile {
    file: NamedTempFile,
    written: u64,
}

impl StagedFile {
    /// Create a temp file (`.<name>.XXXXXX.part`) in the parent directory of `dest`.
    /// The parent directory must already exist.
    pub fn create_for(dest: &Path) -> io::Result<Self> {
        let dir = dest
            .parent()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "destination has no parent"))?;
        let name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let prefix = format!(".{}.", name);
        let file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(dir)?;
        Ok(Self { file, written: 0 })
    }

    pub fn temp_path(&self) -> &Path {
        self.file.path()
    }

    /// Bytes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush, fsync and rename onto `dest`.
    ///
    /// With `overwrite` an existing destination is replaced; without it an existing
    /// non-empty destination wins and `AlreadyExists` is returned. An empty file at
    /// the destination never counts as existing and is replaced.
    pub fn commit(mut self, dest: &Path, overwrite: bool) -> io::Result<CommitOutcome> {
        self.file.flush()?;
        self.file.as_file().sync_all()?;
        let result = if overwrite {
            self.file.persist(dest).map(|_| ())
        } else {
            self.file.persist_noclobber(dest).map(|_| ())
        };
        match result {
            Ok(()) => Ok(CommitOutcome::Committed),
            Err(e) if !overwrite && e.error.kind() == io::ErrorKind::AlreadyExists => {
                if is_nonempty_file(dest) {
                    // Dropping the returned temp file removes it.
                    drop(e.file);
                    return Ok(CommitOutcome::AlreadyExists);
                }
                e.file.persist(dest).map_err(|e| e.error)?;
                Ok(CommitOutcome::Committed)
            }
            Err(e) => Err(e.error),
        }
    }
}

impl Write for StagedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}
