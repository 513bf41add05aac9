//! User-facing text catalogue
//!
//! Every string the bot renders into a chat lives here: command replies,
//! the status lines for each pipeline stage, and the per-reason error texts.
//! The orchestrator never builds chat-visible text anywhere else.

/// Reply to the `/start` command
pub const START: &str = "Hello! I am a media converter bot 📺\n\n\
I can convert:\n\
🎥 <b>webm</b> and other video formats → mp4\n\
🖼 <b>webp</b> and stickers → png";

/// Reply to the `/help` command
pub const HELP: &str =
    "Send me a <b>link</b> (http://...) or a <b>document</b> (including stickers)";

/// Initial status message posted before any work happens
pub const STARTING: &str = "🚀 Starting...";

/// Status line while the source is being fetched
pub const DOWNLOADING: &str = "📥 Downloading...";

/// Status line while ffmpeg runs, carrying the "<output> / <input>" progress
pub fn converting(progress: &str) -> String {
    format!("☕️ Converting... {}", progress)
}

/// Status line while the preview frame is extracted
pub const GENERATING_THUMBNAIL: &str = "🖼 Generating thumbnail...";

/// Status line while the result is sent back to the platform
pub const UPLOADING: &str = "☁️ Uploading...";

/// Reason-specific error texts rendered in place of the progress message
pub mod error {
    /// Source could not be fetched (HTTP error, broken link, read fault)
    pub const DOWNLOAD_FAILED: &str = "⚠️ Unable to download this file.";

    /// Content type is not on the allow-list for the requested conversion
    pub const UNSUPPORTED: &str = "👀 This does not look like a supported media file.";

    /// The server reported no content type, so the file kind is unknown
    pub const HEADER_MISSING: &str =
        "🔬 The server did not say what kind of file this is.";

    /// Input or output is larger than the upload ceiling
    pub const TOO_BIG: &str =
        "🍉 File is bigger than 50 MB. Telegram does not allow bots to upload huge files, sorry.";

    /// ffmpeg exited non-zero or produced nothing
    pub const CONVERT_FAILED: &str =
        "⚠️ Sorry, <code>ffmpeg</code> seems unable to convert this file.";

    /// ffprobe or the frame grab failed on the converted video
    pub const THUMBNAIL_FAILED: &str =
        "⚠️ Sorry, <code>ffmpeg</code> seems unable to generate a thumbnail for this file.";

    /// Sending the finished artifact failed
    pub const UPLOAD_FAILED: &str = "☁️ Uploading failed, please try again later.";

    /// Animated `.tgs` stickers have no raster frames to convert
    pub const ANIMATED_STICKER: &str = "🎬 Animated stickers are unsupported, sorry.";
}
