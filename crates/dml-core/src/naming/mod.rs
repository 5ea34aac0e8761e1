//! Destination path computation for attachments.
//!
//! Renders the configured file name scheme, sanitizes every substituted value,
//! and confines the result to the operating folder.

mod path;
mod sanitize;
mod scheme;

pub use path::filename_from_url_path;
pub use sanitize::sanitize_component;
pub use scheme::{AttachmentContext, FileNameScheme, SchemeError};

use std::path::{Component, Path, PathBuf};

use crate::platform::Attachment;

/// Filename used when neither the attachment nor its URL yields anything usable.
const DEFAULT_FILENAME: &str = "attachment.bin";

/// Error returned when a path would land outside the operating folder.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0} escapes the operating folder")]
pub struct OutsideRoot(pub PathBuf);

/// Original filename of an attachment, falling back to the URL's last path segment.
pub fn attachment_filename(attachment: &Attachment) -> String {
    let name = attachment.filename.trim();
    if !name.is_empty() {
        return name.to_string();
    }
    filename_from_url_path(&attachment.url).unwrap_or_else(|| DEFAULT_FILENAME.to_string())
}

/// Join `relative` onto `root`, refusing anything but plain file name components.
pub fn confine(root: &Path, relative: &Path) -> Result<PathBuf, OutsideRoot> {
    let mut components = relative.components().peekable();
    if components.peek().is_none() {
        return Err(OutsideRoot(relative.to_path_buf()));
    }
    if !components.all(|c| matches!(c, Component::Normal(_))) {
        return Err(OutsideRoot(relative.to_path_buf()));
    }
    Ok(root.join(relative))
}

/// True when `path` is `root` itself or lies below it, compared lexically.
pub fn is_within(root: &Path, path: &Path) -> bool {
    match path.strip_prefix(root) {
        Ok(rest) => rest.components().all(|c| matches!(c, Component::Normal(_))),
        Err(_) => false,
    }
}
