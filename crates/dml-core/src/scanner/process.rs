//! Per-message processing: count, name, skip or download each attachment.

use crate::downloader::{DownloadError, DownloadOutcome, DownloadRequest};
use crate::naming::{self, AttachmentContext};
use crate::platform::{ChannelNames, Message};
use crate::storage;

use super::{ChannelScanner, ScanError, ScanSummary};

impl ChannelScanner {
    pub(super) async fn process_message(
        &self,
        names: &ChannelNames,
        message: &Message,
        summary: &mut ScanSummary,
    ) -> Result<(), ScanError> {
        self.progress.message_scanned();
        summary.messages += 1;

        let root = &self.settings.operating_folder;
        let skip_existing = self.settings.skip_existing_files;

        for attachment in &message.attachments {
            self.checkpoint()?;
            self.progress.attachment_discovered();
            summary.discovered += 1;

            let filename = naming::attachment_filename(attachment);
            let relative = self.scheme.render(&AttachmentContext {
                guild: &names.guild,
                channel: &names.channel,
                author: &message.author,
                message_id: message.id,
                filename: &filename,
                timestamp: message.timestamp,
            });
            let dest = match naming::confine(root, &relative) {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!(message = %message.id, "skipping attachment: {}", e);
                    self.progress.attachment_failed();
                    summary.failed += 1;
                    continue;
                }
            };

            if skip_existing && storage::is_nonempty_file(&dest) {
                tracing::debug!(path = %dest.display(), "already exists, skipping");
                summary.skipped += 1;
                continue;
            }

            let req = DownloadRequest {
                url: attachment.url.clone(),
                expected_size: attachment.size,
                dest,
                root: root.clone(),
                overwrite: !skip_existing,
            };
            match self.downloader.download(req, &self.abort).await {
                Ok(DownloadOutcome::Downloaded { .. }) => {
                    self.progress.attachment_downloaded();
                    summary.downloaded += 1;
                }
                Ok(DownloadOutcome::AlreadyExists) => summary.skipped += 1,
                Err(DownloadError::Aborted) => return Err(ScanError::Aborted),
                Err(DownloadError::Disk { path, source }) => {
                    return Err(ScanError::Disk { path, source })
                }
                Err(e) => {
                    tracing::warn!(
                        message = %message.id,
                        url = %attachment.url,
                        "attachment failed: {}",
                        e
                    );
                    self.progress.attachment_failed();
                    summary.failed += 1;
                }
            }
        }
        Ok(())
    }
}
