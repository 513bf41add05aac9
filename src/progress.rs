//! Progress reporter: rate-limited, idempotent status-message updates
//!
//! One reporter per work item, owning all edits to the single status
//! message. Updates are best-effort: the message may have been deleted by
//! the user or the edit may be rate-limited, and neither outcome is allowed
//! to disturb the pipeline. Cadence is the caller's problem (the transcode
//! runner updates once per output poll).

use std::sync::Arc;

use crate::platform::PlatformClient;
use crate::types::{ChatId, MessageId};

/// Idempotent editor of one status message
pub struct ProgressReporter {
    platform: Arc<dyn PlatformClient>,
    chat: ChatId,
    message: MessageId,
    /// Last text successfully rendered to the remote message
    last_rendered: Option<String>,
}

impl ProgressReporter {
    /// Take ownership of edits to `message` in `chat`
    pub fn new(platform: Arc<dyn PlatformClient>, chat: ChatId, message: MessageId) -> Self {
        Self {
            platform,
            chat,
            message,
            last_rendered: None,
        }
    }

    /// Render `text` into the status message unless it is already showing
    ///
    /// A failed edit is swallowed; the text is not recorded as rendered, so
    /// the next differing update (or even the same one) will try again.
    pub async fn update(&mut self, text: &str) {
        if self.last_rendered.as_deref() == Some(text) {
            return;
        }
        match self
            .platform
            .edit_message_text(self.chat, self.message, text)
            .await
        {
            Ok(()) => self.last_rendered = Some(text.to_string()),
            Err(e) => {
                tracing::debug!(
                    chat = %self.chat,
                    message = %self.message,
                    error = %e,
                    "status message edit failed, ignoring"
                );
            }
        }
    }

    /// Delete the status message, swallowing failures
    ///
    /// Called once on the success path; a message already deleted by the
    /// user is not an error worth surfacing.
    pub async fn delete(&self) {
        if let Err(e) = self.platform.delete_message(self.chat, self.message).await {
            tracing::debug!(
                chat = %self.chat,
                message = %self.message,
                error = %e,
                "status message delete failed, ignoring"
            );
        }
    }
}
