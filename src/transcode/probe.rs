//! Metadata probing and thumbnail extraction for video outputs
//!
//! Three read-only invocations against the finished artifact: duration,
//! dimensions, and one preview frame at the temporal midpoint. Any failure
//! here is terminal: a video without duration/dimensions is rejected
//! rather than uploaded incomplete.

use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use super::MediaTools;
use crate::error::ConvertError;
use crate::types::VideoMetadata;

/// Longest side of the preview frame, in pixels
const THUMBNAIL_BOUND: u32 = 90;

/// Run ffprobe with `args` and return trimmed stdout
async fn run_probe(ffprobe: &Path, args: &[&str], media: &Path) -> Result<String, ConvertError> {
    let output = Command::new(ffprobe)
        .args(args)
        .arg(media)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| ConvertError::ThumbnailFailed {
            reason: format!("failed to launch ffprobe: {}", e),
        })?;

    if !output.status.success() {
        return Err(ConvertError::ThumbnailFailed {
            reason: format!("ffprobe exited with status {:?}", output.status.code()),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Total duration in seconds, rounded to the nearest integer
async fn probe_duration(ffprobe: &Path, media: &Path) -> Result<u32, ConvertError> {
    let raw = run_probe(
        ffprobe,
        &[
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ],
        media,
    )
    .await?;

    let seconds: f64 = raw.parse().map_err(|_| ConvertError::ThumbnailFailed {
        reason: format!("unparsable duration {:?}", raw),
    })?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(ConvertError::ThumbnailFailed {
            reason: format!("nonsensical duration {:?}", raw),
        });
    }
    Ok(seconds.round() as u32)
}

/// Pixel dimensions of the first video stream
async fn probe_dimensions(ffprobe: &Path, media: &Path) -> Result<(u32, u32), ConvertError> {
    let raw = run_probe(
        ffprobe,
        &[
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=s=x:p=0",
        ],
        media,
    )
    .await?;

    let parsed = raw
        .split_once('x')
        .and_then(|(w, h)| Some((w.trim().parse().ok()?, h.trim().parse().ok()?)));
    match parsed {
        Some(dims) => Ok(dims),
        None => Err(ConvertError::ThumbnailFailed {
            reason: format!("unparsable dimensions {:?}", raw),
        }),
    }
}

/// Probe duration and dimensions of a transcoded video
pub async fn extract_metadata(
    tools: &MediaTools,
    media: &Path,
) -> Result<VideoMetadata, ConvertError> {
    let duration_secs = probe_duration(&tools.ffprobe, media).await?;
    let (width, height) = probe_dimensions(&tools.ffprobe, media).await?;
    let meta = VideoMetadata {
        duration_secs,
        width,
        height,
    };
    debug!(?media, ?meta, "probed video metadata");
    Ok(meta)
}

/// Pull one preview frame at the video's temporal midpoint
///
/// The frame is scaled so neither side exceeds 90 px, aspect preserved,
/// and both sides forced even so downstream encoders accept it.
pub async fn extract_thumbnail(
    tools: &MediaTools,
    media: &Path,
    duration_secs: u32,
    dest: &Path,
) -> Result<(), ConvertError> {
    let midpoint = duration_secs / 2;
    let scale = format!(
        "scale={bound}:{bound}:force_original_aspect_ratio=decrease:force_divisible_by=2",
        bound = THUMBNAIL_BOUND
    );

    let output = Command::new(&tools.ffmpeg)
        .arg("-y")
        .arg("-ss")
        .arg(midpoint.to_string())
        .arg("-i")
        .arg(media)
        .arg("-vframes")
        .arg("1")
        .arg("-vf")
        .arg(scale)
        .arg(dest)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .await
        .map_err(|e| ConvertError::ThumbnailFailed {
            reason: format!("failed to launch frame extraction: {}", e),
        })?;

    if !output.status.success() {
        return Err(ConvertError::ThumbnailFailed {
            reason: format!(
                "frame extraction exited with status {:?}",
                output.status.code()
            ),
        });
    }
    // Some builds exit zero without writing when the seek lands past the end
    if tokio::fs::metadata(dest).await.is_err() {
        return Err(ConvertError::ThumbnailFailed {
            reason: "frame extraction produced no file".to_string(),
        });
    }
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    /// Write an executable shell script and return its path
    fn script(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    fn stub_tools(dir: &Path, ffprobe_body: &str) -> MediaTools {
        MediaTools {
            ffmpeg: script(dir, "ffmpeg", "exit 0"),
            ffprobe: script(dir, "ffprobe", ffprobe_body),
        }
    }

    #[tokio::test]
    async fn metadata_is_parsed_and_duration_rounded() {
        let dir = TempDir::new().unwrap();
        let tools = stub_tools(
            dir.path(),
            r#"case "$*" in
  *format=duration*) echo "3.6424" ;;
  *width,height*) echo "640x360" ;;
  *) exit 1 ;;
esac"#,
        );

        let meta = extract_metadata(&tools, Path::new("/tmp/out.mp4"))
            .await
            .unwrap();
        assert_eq!(
            meta,
            VideoMetadata {
                duration_secs: 4,
                width: 640,
                height: 360
            }
        );
    }

    #[tokio::test]
    async fn probe_failure_is_thumbnail_failed() {
        let dir = TempDir::new().unwrap();
        let tools = stub_tools(dir.path(), "exit 1");

        let err = extract_metadata(&tools, Path::new("/tmp/out.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::ThumbnailFailed { .. }));
    }

    #[tokio::test]
    async fn garbage_probe_output_is_thumbnail_failed() {
        let dir = TempDir::new().unwrap();
        let tools = stub_tools(dir.path(), r#"echo "N/A""#);

        let err = extract_metadata(&tools, Path::new("/tmp/out.mp4"))
            .await
            .unwrap_err();
        match err {
            ConvertError::ThumbnailFailed { reason } => {
                assert!(reason.contains("duration"), "got: {reason}");
            }
            other => panic!("expected ThumbnailFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn thumbnail_seeks_to_the_midpoint_and_requires_a_file() {
        let dir = TempDir::new().unwrap();
        // Records its args, then copies nothing: the missing-file check must fire
        let args_log = dir.path().join("args.txt");
        let tools = MediaTools {
            ffmpeg: script(
                dir.path(),
                "ffmpeg",
                &format!("echo \"$@\" > {}", args_log.display()),
            ),
            ffprobe: script(dir.path(), "ffprobe", "exit 0"),
        };

        let dest = dir.path().join("thumb.jpg");
        let err = extract_thumbnail(&tools, Path::new("/tmp/out.mp4"), 9, &dest)
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::ThumbnailFailed { .. }));

        let recorded = std::fs::read_to_string(&args_log).unwrap();
        assert!(recorded.contains("-ss 4"), "midpoint of 9s is 4s: {recorded}");
        assert!(recorded.contains("force_divisible_by=2"));
        assert!(recorded.contains("scale=90:90"));
    }

    #[tokio::test]
    async fn thumbnail_succeeds_when_the_stub_writes_the_frame() {
        let dir = TempDir::new().unwrap();
        let tools = MediaTools {
            // Last argument is the destination
            ffmpeg: script(
                dir.path(),
                "ffmpeg",
                r#"for a in "$@"; do out="$a"; done; echo frame > "$out""#,
            ),
            ffprobe: script(dir.path(), "ffprobe", "exit 0"),
        };

        let dest = dir.path().join("thumb.jpg");
        extract_thumbnail(&tools, Path::new("/tmp/out.mp4"), 10, &dest)
            .await
            .unwrap();
        assert!(dest.exists());
    }
}
