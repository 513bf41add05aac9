//! Core types for media-relay

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::utils;

/// Length of the random temp-file identifier
const REQUEST_ID_LEN: usize = 12;

/// Unique identifier for a conversion request
///
/// A 12-character uppercase-alphanumeric string, used as the stem of every
/// temp file the work item owns. Collisions between concurrent work items
/// are negligible at this length.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(utils::random_id(REQUEST_ID_LEN))
    }

    /// The identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Chat identifier on the messaging platform
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message identifier on the messaging platform
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the conversion produces
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// Video input re-encoded to an mp4 container (H.264)
    Video,
    /// Still/animated image decoded to a single png frame
    Image,
}

impl TargetKind {
    /// File extension of the transcoded artifact
    pub fn output_extension(&self) -> &'static str {
        match self {
            TargetKind::Video => "mp4",
            TargetKind::Image => "png",
        }
    }
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetKind::Video => write!(f, "video"),
            TargetKind::Image => write!(f, "image"),
        }
    }
}

/// One inbound conversion request, immutable once created
///
/// Built by the inbound-message handler (from a URL in a text message or a
/// resolved platform file) and owned exclusively by the worker that runs it.
#[derive(Clone, Debug)]
pub struct ConversionRequest {
    /// Unique identifier, also the stem of the work item's temp files
    pub id: RequestId,
    /// Where the media bytes come from (direct link or resolved file URL)
    pub source_url: String,
    /// Content type declared by the platform for uploaded files, if any
    pub declared_mime: Option<String>,
    /// Byte size declared by the platform for uploaded files, if any
    pub declared_size: Option<u64>,
    /// What to convert to
    pub target: TargetKind,
    /// Chat the request came from (status message and upload go here)
    pub chat: ChatId,
    /// The requesting message, replied to with the result
    pub reply_to: MessageId,
}

impl ConversionRequest {
    /// Create a request with a freshly generated identifier
    pub fn new(
        source_url: impl Into<String>,
        declared_mime: Option<String>,
        declared_size: Option<u64>,
        target: TargetKind,
        chat: ChatId,
        reply_to: MessageId,
    ) -> Self {
        Self {
            id: RequestId::generate(),
            source_url: source_url.into(),
            declared_mime,
            declared_size,
            target,
            chat,
            reply_to,
        }
    }
}

/// Duration and dimensions probed from a transcoded video
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VideoMetadata {
    /// Total duration in seconds, rounded to the nearest integer
    pub duration_secs: u32,
    /// Pixel width of the first video stream
    pub width: u32,
    /// Pixel height of the first video stream
    pub height: u32,
}

/// Orchestrator state, used for logging only
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkState {
    /// Posting the initial status message
    Starting,
    /// Streaming the source to disk
    Downloading,
    /// ffmpeg is running
    Converting,
    /// Probing duration and dimensions (video only)
    ExtractingMetadata,
    /// Extracting the preview frame (video only)
    GeneratingThumbnail,
    /// Sending the artifact back to the platform
    Uploading,
    /// Terminal success
    Done,
}

impl std::fmt::Display for WorkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WorkState::Starting => "starting",
            WorkState::Downloading => "downloading",
            WorkState::Converting => "converting",
            WorkState::ExtractingMetadata => "extracting_metadata",
            WorkState::GeneratingThumbnail => "generating_thumbnail",
            WorkState::Uploading => "uploading",
            WorkState::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// Runtime state of one in-flight conversion: the temp paths it owns and the
/// byte counts observed so far
///
/// Created when the worker starts, mutated only by that worker, and released
/// (all paths removed) before the worker reaches any terminal state.
#[derive(Debug)]
pub struct WorkItem {
    /// Downloaded source bytes
    pub input_path: PathBuf,
    /// Transcoded artifact
    pub output_path: PathBuf,
    /// Preview frame (only written for video targets)
    pub thumbnail_path: PathBuf,
    /// Bytes observed by the transfer sink
    pub input_size: u64,
    /// Final size of the transcoded artifact
    pub output_size: u64,
}

impl WorkItem {
    /// Lay out the temp paths for a request under `temp_dir`
    ///
    /// The input keeps the source's file extension when one is recognizable
    /// so the transcoder's demuxer can use it as a hint.
    pub fn new(request: &ConversionRequest, temp_dir: &Path) -> Self {
        let input_ext =
            utils::url_file_extension(&request.source_url).unwrap_or_else(|| "bin".to_string());
        Self {
            input_path: temp_dir.join(format!("{}.{}", request.id, input_ext)),
            output_path: temp_dir.join(format!(
                "{}.{}",
                request.id,
                request.target.output_extension()
            )),
            thumbnail_path: temp_dir.join(format!("{}.thumb.jpg", request.id)),
            input_size: 0,
            output_size: 0,
        }
    }

    /// Remove every temp path that exists, ignoring individual failures
    ///
    /// Called exactly once per work item, on every exit path.
    pub async fn cleanup(&self) {
        utils::remove_file_quiet(&self.input_path).await;
        utils::remove_file_quiet(&self.output_path).await;
        utils::remove_file_quiet(&self.thumbnail_path).await;
    }
}
