//! Inbound update payloads
//!
//! The minimal slice of the Bot API update schema the relay reads: text,
//! attached documents/videos, and stickers. Everything else deserializes
//! to `None` and is ignored by the dispatcher.

use serde::Deserialize;

/// One long-poll update
#[derive(Clone, Debug, Deserialize)]
pub struct Update {
    /// Monotonic update identifier, acknowledged by polling past it
    pub update_id: i64,
    /// The message this update carries, if it is a message update at all
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

/// An inbound chat message
#[derive(Clone, Debug, Deserialize)]
pub struct IncomingMessage {
    /// Message identifier within its chat
    pub message_id: i64,
    /// Originating chat
    pub chat: IncomingChat,
    /// Plain text, for URL requests and commands
    #[serde(default)]
    pub text: Option<String>,
    /// Attached generic file
    #[serde(default)]
    pub document: Option<IncomingDocument>,
    /// Attached video (platform-classified)
    #[serde(default)]
    pub video: Option<IncomingDocument>,
    /// Attached sticker
    #[serde(default)]
    pub sticker: Option<IncomingSticker>,
}

/// Chat reference
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct IncomingChat {
    /// Chat identifier
    pub id: i64,
}

/// Attached file reference with its platform-declared type and size
#[derive(Clone, Debug, Deserialize)]
pub struct IncomingDocument {
    /// Opaque file reference, resolvable to a download URL
    pub file_id: String,
    /// Declared content type, if the platform knows one
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Declared byte size, if the platform knows one
    #[serde(default)]
    pub file_size: Option<u64>,
}

/// Attached sticker reference
///
/// Static stickers are webp images and video stickers are webm clips; both
/// convert like ordinary uploads. Animated (`.tgs`) stickers have no raster
/// content and get a dedicated rejection reply.
#[derive(Clone, Debug, Deserialize)]
pub struct IncomingSticker {
    /// Opaque file reference
    pub file_id: String,
    /// Lottie/.tgs animation, no raster frames
    #[serde(default)]
    pub is_animated: bool,
    /// webm video sticker
    #[serde(default)]
    pub is_video: bool,
    /// Declared byte size, if known
    #[serde(default)]
    pub file_size: Option<u64>,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_update_deserializes() {
        let json = r#"{
            "update_id": 42,
            "message": {
                "message_id": 7,
                "chat": {"id": -100123, "type": "group"},
                "text": "http://example.com/clip.webm"
            }
        }"#;
        let update: Update = serde_json::from_str(json).unwrap();
        assert_eq!(update.update_id, 42);
        let message = update.message.unwrap();
        assert_eq!(message.chat.id, -100123);
        assert_eq!(message.text.as_deref(), Some("http://example.com/clip.webm"));
        assert!(message.document.is_none());
    }

    #[test]
    fn document_update_carries_mime_and_size() {
        let json = r#"{
            "update_id": 43,
            "message": {
                "message_id": 8,
                "chat": {"id": 5},
                "document": {
                    "file_id": "AAQC",
                    "file_name": "clip.webm",
                    "mime_type": "video/webm",
                    "file_size": 1048576
                }
            }
        }"#;
        let update: Update = serde_json::from_str(json).unwrap();
        let doc = update.message.unwrap().document.unwrap();
        assert_eq!(doc.file_id, "AAQC");
        assert_eq!(doc.mime_type.as_deref(), Some("video/webm"));
        assert_eq!(doc.file_size, Some(1_048_576));
    }

    #[test]
    fn sticker_flags_default_to_false() {
        let json = r#"{
            "update_id": 44,
            "message": {
                "message_id": 9,
                "chat": {"id": 5},
                "sticker": {"file_id": "STCK"}
            }
        }"#;
        let update: Update = serde_json::from_str(json).unwrap();
        let sticker = update.message.unwrap().sticker.unwrap();
        assert!(!sticker.is_animated);
        assert!(!sticker.is_video);
    }

    #[test]
    fn non_message_update_is_tolerated() {
        let json = r#"{"update_id": 45, "edited_message": {"message_id": 1}}"#;
        let update: Update = serde_json::from_str(json).unwrap();
        assert!(update.message.is_none());
    }
}
