//! Configuration types for media-relay

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::TargetKind;

/// Messaging-platform credentials and endpoint
///
/// Used as a nested sub-config within [`Config`]. The API base URL is
/// overridable so tests can point the client at a mock server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Bot credential. Empty is a fatal startup condition.
    #[serde(default)]
    pub bot_token: String,

    /// Bot API base URL (default: "https://api.telegram.org")
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Long-poll timeout for update fetching, in seconds (default: 30)
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_base_url: default_api_base_url(),
            poll_timeout_secs: default_poll_timeout(),
        }
    }
}

/// Transcoding budgets and progress cadence
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConvertConfig {
    /// Maximum permitted byte size for input and output artifacts
    /// (default: 50 MiB, the platform's bot upload limit)
    #[serde(default = "default_size_ceiling")]
    pub size_ceiling: u64,

    /// Thread hint passed to the transcoder (default: 2)
    #[serde(default = "default_ffmpeg_threads")]
    pub ffmpeg_threads: u32,

    /// Output-growth poll interval in seconds (default: 2)
    ///
    /// Also the progress-update cadence; the reporter itself never throttles.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Wall-clock budget handed to the transcoder for video jobs, in seconds
    /// (default: 900)
    #[serde(default = "default_video_budget")]
    pub video_time_budget_secs: u64,

    /// Wall-clock budget for image jobs, in seconds (default: 60).
    /// Image decodes are cheap; a long run indicates a hang.
    #[serde(default = "default_image_budget")]
    pub image_time_budget_secs: u64,

    /// Grace on top of the budget before the watchdog force-kills a
    /// transcoder that ignored its own time limit (default: 30)
    #[serde(default = "default_watchdog_grace")]
    pub watchdog_grace_secs: u64,
}

impl ConvertConfig {
    /// Poll interval as a [`Duration`]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Transcoder time budget for the given target kind
    pub fn time_budget(&self, target: TargetKind) -> Duration {
        match target {
            TargetKind::Video => Duration::from_secs(self.video_time_budget_secs),
            TargetKind::Image => Duration::from_secs(self.image_time_budget_secs),
        }
    }

    /// Supervisory deadline: budget plus grace
    pub fn watchdog_deadline(&self, target: TargetKind) -> Duration {
        self.time_budget(target) + Duration::from_secs(self.watchdog_grace_secs)
    }
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            size_ceiling: default_size_ceiling(),
            ffmpeg_threads: default_ffmpeg_threads(),
            poll_interval_secs: default_poll_interval(),
            video_time_budget_secs: default_video_budget(),
            image_time_budget_secs: default_image_budget(),
            watchdog_grace_secs: default_watchdog_grace(),
        }
    }
}

/// External tool paths (ffmpeg, ffprobe)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to ffmpeg executable (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Path to ffprobe executable (auto-detected if None)
    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,

    /// Whether to search PATH for binaries if explicit paths not set
    /// (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            search_path: true,
        }
    }
}

/// Worker fan-out and temp-file placement
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Directory for per-request temp files (default: the system temp dir)
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Maximum concurrent conversions (default: 8)
    ///
    /// Bounds fan-out so a burst of requests cannot exhaust disk or CPU;
    /// excess requests wait for a slot.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_conversions: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
            max_concurrent_conversions: default_max_concurrent(),
        }
    }
}

/// Configurable MIME and URL-extension allow-lists per target kind
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AllowListConfig {
    /// MIME types accepted for video conversion
    #[serde(default = "default_video_mime_types")]
    pub video_mime_types: Vec<String>,

    /// MIME types accepted for image conversion
    #[serde(default = "default_image_mime_types")]
    pub image_mime_types: Vec<String>,

    /// URL extensions (without dot) treated as video sources
    #[serde(default = "default_video_extensions")]
    pub video_extensions: Vec<String>,

    /// URL extensions (without dot) treated as image sources
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
}

impl AllowListConfig {
    /// Whether `mime` is on the allow-list for `target`
    pub fn mime_matches(&self, target: TargetKind, mime: &str) -> bool {
        let list = match target {
            TargetKind::Video => &self.video_mime_types,
            TargetKind::Image => &self.image_mime_types,
        };
        list.iter().any(|m| m.eq_ignore_ascii_case(mime))
    }

    /// Target kind for a platform-declared MIME type, if accepted at all
    pub fn target_for_mime(&self, mime: &str) -> Option<TargetKind> {
        if self.mime_matches(TargetKind::Video, mime) {
            Some(TargetKind::Video)
        } else if self.mime_matches(TargetKind::Image, mime) {
            Some(TargetKind::Image)
        } else {
            None
        }
    }

    /// Target kind for a URL file extension (lowercase, without dot)
    pub fn target_for_extension(&self, ext: &str) -> Option<TargetKind> {
        if self.video_extensions.iter().any(|e| e == ext) {
            Some(TargetKind::Video)
        } else if self.image_extensions.iter().any(|e| e == ext) {
            Some(TargetKind::Image)
        } else {
            None
        }
    }
}

impl Default for AllowListConfig {
    fn default() -> Self {
        Self {
            video_mime_types: default_video_mime_types(),
            image_mime_types: default_image_mime_types(),
            video_extensions: default_video_extensions(),
            image_extensions: default_image_extensions(),
        }
    }
}

/// Main configuration for [`MediaRelay`](crate::MediaRelay)
///
/// Fields are organized into logical sub-configs. The sub-configs other than
/// `platform` are flattened so the serialized format stays flat.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Platform credential and endpoint
    pub platform: PlatformConfig,

    /// Transcoding budgets and cadence
    #[serde(flatten)]
    pub convert: ConvertConfig,

    /// External tool paths
    #[serde(flatten)]
    pub tools: ToolsConfig,

    /// Worker fan-out and temp-file placement
    #[serde(flatten)]
    pub worker: WorkerConfig,

    /// MIME/extension allow-lists
    #[serde(flatten)]
    pub allow: AllowListConfig,
}

impl Config {
    /// Validate the configuration, failing fast on unusable settings
    ///
    /// A missing bot credential is fatal: the relay cannot talk to the
    /// platform at all without it.
    pub fn validate(&self) -> Result<()> {
        if self.platform.bot_token.trim().is_empty() {
            return Err(Error::Config {
                message: "bot token must not be empty".to_string(),
                key: Some("platform.bot_token".to_string()),
            });
        }
        if self.convert.size_ceiling == 0 {
            return Err(Error::Config {
                message: "size ceiling must be greater than zero".to_string(),
                key: Some("size_ceiling".to_string()),
            });
        }
        if self.convert.poll_interval_secs == 0 {
            return Err(Error::Config {
                message: "poll interval must be at least one second".to_string(),
                key: Some("poll_interval_secs".to_string()),
            });
        }
        if self.worker.max_concurrent_conversions == 0 {
            return Err(Error::Config {
                message: "at least one concurrent conversion is required".to_string(),
                key: Some("max_concurrent_conversions".to_string()),
            });
        }
        Ok(())
    }
}

fn default_api_base_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout() -> u64 {
    30
}

fn default_size_ceiling() -> u64 {
    50 * 1024 * 1024
}

fn default_ffmpeg_threads() -> u32 {
    2
}

fn default_poll_interval() -> u64 {
    2
}

fn default_video_budget() -> u64 {
    900
}

fn default_image_budget() -> u64 {
    60
}

fn default_watchdog_grace() -> u64 {
    30
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir()
}

fn default_max_concurrent() -> usize {
    8
}

fn default_true() -> bool {
    true
}

fn default_video_mime_types() -> Vec<String> {
    ["video/webm", "video/mp4", "video/quicktime", "video/x-matroska"]
        .map(String::from)
        .to_vec()
}

fn default_image_mime_types() -> Vec<String> {
    ["image/webp", "image/gif"].map(String::from).to_vec()
}

fn default_video_extensions() -> Vec<String> {
    ["webm", "mp4", "mov", "mkv"].map(String::from).to_vec()
}

fn default_image_extensions() -> Vec<String> {
    ["webp", "gif"].map(String::from).to_vec()
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            platform: PlatformConfig {
                bot_token: "123:ABC".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn defaults_match_the_documented_values() {
        let config = Config::default();
        assert_eq!(config.convert.size_ceiling, 50 * 1024 * 1024);
        assert_eq!(config.convert.poll_interval(), Duration::from_secs(2));
        assert_eq!(
            config.convert.time_budget(TargetKind::Video),
            Duration::from_secs(900)
        );
        assert_eq!(
            config.convert.time_budget(TargetKind::Image),
            Duration::from_secs(60)
        );
        assert_eq!(config.platform.api_base_url, "https://api.telegram.org");
        assert_eq!(config.worker.max_concurrent_conversions, 8);
    }

    #[test]
    fn watchdog_deadline_adds_grace_on_top_of_the_budget() {
        let config = ConvertConfig::default();
        assert_eq!(
            config.watchdog_deadline(TargetKind::Image),
            Duration::from_secs(60 + 30)
        );
    }

    #[test]
    fn empty_bot_token_is_fatal() {
        let config = Config::default();
        let err = config.validate().unwrap_err();
        match err {
            Error::Config { key, .. } => {
                assert_eq!(key.as_deref(), Some("platform.bot_token"));
            }
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn whitespace_bot_token_is_also_fatal() {
        let mut config = valid_config();
        config.platform.bot_token = "   ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_ceiling_and_zero_workers_are_rejected() {
        let mut config = valid_config();
        config.convert.size_ceiling = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.worker.max_concurrent_conversions = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn valid_config_passes_validation() {
        valid_config().validate().unwrap();
    }

    #[test]
    fn allow_list_matches_mime_case_insensitively() {
        let allow = AllowListConfig::default();
        assert!(allow.mime_matches(TargetKind::Video, "Video/WebM"));
        assert!(allow.mime_matches(TargetKind::Image, "image/webp"));
        assert!(!allow.mime_matches(TargetKind::Video, "application/pdf"));
    }

    #[test]
    fn allow_list_classifies_extensions() {
        let allow = AllowListConfig::default();
        assert_eq!(allow.target_for_extension("webm"), Some(TargetKind::Video));
        assert_eq!(allow.target_for_extension("webp"), Some(TargetKind::Image));
        assert_eq!(allow.target_for_extension("exe"), None);
    }

    #[test]
    fn config_deserializes_from_a_minimal_document() {
        let json = r#"{"platform": {"bot_token": "123:ABC"}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        config.validate().unwrap();
        assert_eq!(config.convert.size_ceiling, 50 * 1024 * 1024);
    }
}
