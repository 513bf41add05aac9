//! Messaging-platform collaborator
//!
//! The pipeline only sees the [`PlatformClient`] trait: send/edit/delete a
//! message, resolve an uploaded file to a downloadable URL, and upload the
//! finished artifact. [`TelegramClient`] is the production implementation
//! over the Bot API; tests substitute their own.

/// User-facing text catalogue
pub mod messages;
mod telegram;
mod updates;

pub use telegram::TelegramClient;
pub use updates::{IncomingChat, IncomingDocument, IncomingMessage, IncomingSticker, Update};

use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;
use crate::types::{ChatId, MessageId, VideoMetadata};

/// Synchronous-call surface of the messaging platform
///
/// Each worker holds a shared handle to a stateless client; calls are
/// independent and safe to issue concurrently from independent workers.
/// Nothing here retries; a failed call is reported to the caller once.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Post a new message, optionally as a reply; returns its identifier
    async fn send_message(
        &self,
        chat: ChatId,
        reply_to: Option<MessageId>,
        text: &str,
    ) -> Result<MessageId>;

    /// Replace the text of an existing message
    async fn edit_message_text(&self, chat: ChatId, message: MessageId, text: &str) -> Result<()>;

    /// Delete a message
    async fn delete_message(&self, chat: ChatId, message: MessageId) -> Result<()>;

    /// Resolve a platform file reference to a downloadable URL
    async fn resolve_file_url(&self, file_id: &str) -> Result<String>;

    /// Upload a video with its metadata and an optional thumbnail, as a
    /// reply to the requesting message
    async fn send_video(
        &self,
        chat: ChatId,
        reply_to: MessageId,
        video: &Path,
        meta: &VideoMetadata,
        thumbnail: Option<&Path>,
    ) -> Result<()>;

    /// Upload a non-video artifact as a document, as a reply to the
    /// requesting message
    async fn send_document(&self, chat: ChatId, reply_to: MessageId, document: &Path)
    -> Result<()>;
}
