//! Error types for media-relay
//!
//! Two layers:
//! - [`ConvertError`]: the terminal failure taxonomy of a single conversion.
//!   Every variant ends the work item; nothing is retried internally. Each
//!   variant maps to a user-facing message via [`ConvertError::user_message`].
//! - [`Error`]: the crate-level error covering everything outside a running
//!   conversion (configuration, platform API faults, tool discovery, I/O).

use thiserror::Error;

use crate::platform::messages;

/// Result type alias for media-relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-relay
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "bot_token")
        key: Option<String>,
    },

    /// A conversion ended in one of the terminal failure states
    #[error("conversion error: {0}")]
    Convert(#[from] ConvertError),

    /// Messaging-platform API call failed (non-ok response, malformed body)
    #[error("platform API error: {0}")]
    Platform(String),

    /// External tool missing or failed to launch (ffmpeg, ffprobe)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Terminal failure of a single conversion work item
///
/// All variants are final: the status message is rewritten with the matching
/// user-facing text, every temp file is released, and the user must resubmit.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Neither the transport-reported nor the platform-declared content type
    /// is on the allow-list for the requested target kind
    #[error("unsupported media type (transport: {transport:?}, declared: {declared:?})")]
    UnsupportedType {
        /// Content type reported by the HTTP response, if any
        transport: Option<String>,
        /// Content type declared by the messaging platform, if any
        declared: Option<String>,
    },

    /// The source reported no content type at all, so the media kind cannot
    /// be validated
    #[error("source did not report a content type")]
    HeaderMissing,

    /// Network or I/O fault while streaming the source to disk
    #[error("transfer failed: {reason}")]
    TransferFailed {
        /// What went wrong (HTTP status, read/write fault)
        reason: String,
    },

    /// Input or output artifact reached the configured byte ceiling
    #[error("size ceiling of {limit} bytes reached")]
    SizeExceeded {
        /// The configured ceiling in bytes
        limit: u64,
    },

    /// The transcoding process exited non-zero, produced no output, or was
    /// force-killed by the watchdog deadline
    #[error("conversion failed: {reason}")]
    ConversionFailed {
        /// Exit status or watchdog/spawn detail
        reason: String,
    },

    /// Metadata probing or thumbnail frame extraction failed; a video is
    /// never uploaded without its duration and dimensions
    #[error("thumbnail generation failed: {reason}")]
    ThumbnailFailed {
        /// Which invocation failed and why
        reason: String,
    },

    /// Sending the finished artifact to the platform failed (non-retriable)
    #[error("upload failed: {reason}")]
    UploadFailed {
        /// Transport or API detail
        reason: String,
    },
}

impl ConvertError {
    /// The reason-specific text rendered into the status message when this
    /// failure ends a conversion
    pub fn user_message(&self) -> &'static str {
        match self {
            ConvertError::UnsupportedType { .. } => messages::error::UNSUPPORTED,
            ConvertError::HeaderMissing => messages::error::HEADER_MISSING,
            ConvertError::TransferFailed { .. } => messages::error::DOWNLOAD_FAILED,
            ConvertError::SizeExceeded { .. } => messages::error::TOO_BIG,
            ConvertError::ConversionFailed { .. } => messages::error::CONVERT_FAILED,
            ConvertError::ThumbnailFailed { .. } => messages::error::THUMBNAIL_FAILED,
            ConvertError::UploadFailed { .. } => messages::error::UPLOAD_FAILED,
        }
    }
}
