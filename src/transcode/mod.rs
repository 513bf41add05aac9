//! Transcode runner: launch and supervise the external conversion process
//!
//! The runner owns exactly one transcoder process per work item. Progress is
//! inferred from the output file's growth only; the tool's stdout is never
//! parsed, and there is no helper process watching PIDs. Output growth is an
//! approximation of progress (it tracks muxer flushes, not frames), which is
//! good enough for a status line.

mod probe;

pub use probe::{extract_metadata, extract_thumbnail};

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::{ConvertConfig, ToolsConfig};
use crate::error::{ConvertError, Error, Result};
use crate::platform::messages;
use crate::progress::ProgressReporter;
use crate::types::{RequestId, TargetKind};
use crate::utils::human_bytes;

/// Resolved paths to the external media tools
#[derive(Clone, Debug)]
pub struct MediaTools {
    /// Transcoder binary
    pub ffmpeg: PathBuf,
    /// Read-only inspection binary
    pub ffprobe: PathBuf,
}

impl MediaTools {
    /// Resolve tool paths from configuration, searching PATH where allowed
    ///
    /// Both tools are required; a relay without a transcoder cannot do
    /// anything useful, so this fails at startup rather than per request.
    pub fn resolve(config: &ToolsConfig) -> Result<Self> {
        let ffmpeg = Self::resolve_one("ffmpeg", config.ffmpeg_path.as_deref(), config.search_path)?;
        let ffprobe =
            Self::resolve_one("ffprobe", config.ffprobe_path.as_deref(), config.search_path)?;
        Ok(Self { ffmpeg, ffprobe })
    }

    fn resolve_one(name: &str, explicit: Option<&Path>, search_path: bool) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }
        if search_path {
            if let Ok(found) = which::which(name) {
                return Ok(found);
            }
        }
        Err(Error::ExternalTool(format!(
            "{} not configured and not found in PATH",
            name
        )))
    }
}

/// Build the transcoder invocation for a target kind
///
/// Video: re-encode to H.264, keep audio when present, pad odd dimensions to
/// even (libx264 requires them), optimize the container for progressive
/// playback, and hand the tool its own wall-clock limit. Image: decode a
/// single frame to png under a much shorter limit.
fn build_command(
    tools: &MediaTools,
    convert: &ConvertConfig,
    target: TargetKind,
    input: &Path,
    output: &Path,
) -> Command {
    let mut cmd = Command::new(&tools.ffmpeg);
    cmd.arg("-y")
        .arg("-threads")
        .arg(convert.ffmpeg_threads.to_string())
        .arg("-i")
        .arg(input);

    match target {
        TargetKind::Video => {
            cmd.arg("-map")
                .arg("V:0?")
                .arg("-map")
                .arg("0:a?")
                .arg("-c:v")
                .arg("libx264")
                .arg("-vf")
                .arg("pad=ceil(iw/2)*2:ceil(ih/2)*2")
                .arg("-max_muxing_queue_size")
                .arg("9999")
                .arg("-movflags")
                .arg("+faststart")
                .arg("-preset")
                .arg("slow")
                .arg("-timelimit")
                .arg(convert.video_time_budget_secs.to_string());
        }
        TargetKind::Image => {
            cmd.arg("-frames:v")
                .arg("1")
                .arg("-timelimit")
                .arg(convert.image_time_budget_secs.to_string());
        }
    }

    cmd.arg(output)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    cmd
}

/// Run the transcoder for one work item and return the output size in bytes
///
/// While the process is alive, the output file's size is sampled at the
/// configured interval, rendered as "<output> / <input>" through the
/// reporter, and checked against the ceiling; a breach kills the process
/// immediately rather than waiting for natural exit. A supervisory deadline
/// (the tool's own budget plus grace) force-kills a process that ignored
/// its `-timelimit`.
pub async fn run_transcode(
    tools: &MediaTools,
    convert: &ConvertConfig,
    request_id: &RequestId,
    target: TargetKind,
    input: &Path,
    output: &Path,
    input_size: u64,
    reporter: &mut ProgressReporter,
) -> std::result::Result<u64, ConvertError> {
    let mut child = build_command(tools, convert, target, input, output)
        .spawn()
        .map_err(|e| ConvertError::ConversionFailed {
            reason: format!("failed to launch transcoder: {}", e),
        })?;

    debug!(request_id = %request_id, %target, ?input, "transcoder started");
    reporter
        .update(&messages::converting(&format!(
            "0 B / {}",
            human_bytes(input_size)
        )))
        .await;

    let deadline = tokio::time::Instant::now() + convert.watchdog_deadline(target);
    let mut poll = tokio::time::interval(convert.poll_interval());
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick of a tokio interval fires immediately; consume it so
    // the first size sample happens one interval in.
    poll.tick().await;

    let status = loop {
        tokio::select! {
            status = child.wait() => {
                break status.map_err(|e| ConvertError::ConversionFailed {
                    reason: format!("wait on transcoder failed: {}", e),
                })?;
            }
            _ = tokio::time::sleep_until(deadline) => {
                warn!(request_id = %request_id, "transcoder ignored its time limit, killing");
                kill_and_reap(&mut child).await;
                return Err(ConvertError::ConversionFailed {
                    reason: "transcoder exceeded the supervisory deadline".to_string(),
                });
            }
            _ = poll.tick() => {
                if let Ok(meta) = tokio::fs::metadata(output).await {
                    let observed = meta.len();
                    if observed >= convert.size_ceiling {
                        warn!(
                            request_id = %request_id,
                            observed,
                            ceiling = convert.size_ceiling,
                            "output reached ceiling mid-transcode, killing"
                        );
                        kill_and_reap(&mut child).await;
                        return Err(ConvertError::SizeExceeded {
                            limit: convert.size_ceiling,
                        });
                    }
                    reporter
                        .update(&messages::converting(&format!(
                            "{} / {}",
                            human_bytes(observed),
                            human_bytes(input_size)
                        )))
                        .await;
                }
            }
        }
    };

    if !status.success() {
        return Err(ConvertError::ConversionFailed {
            reason: match status.code() {
                Some(code) => format!("transcoder exited with status {}", code),
                None => "transcoder killed by signal".to_string(),
            },
        });
    }

    // A clean exit that produced nothing is still a failed conversion
    let output_size = match tokio::fs::metadata(output).await {
        Ok(meta) => meta.len(),
        Err(_) => {
            return Err(ConvertError::ConversionFailed {
                reason: "transcoder exited cleanly but produced no output".to_string(),
            });
        }
    };

    // The last poll may have been up to one interval before exit
    if output_size >= convert.size_ceiling {
        return Err(ConvertError::SizeExceeded {
            limit: convert.size_ceiling,
        });
    }

    debug!(request_id = %request_id, output_size, "transcode complete");
    Ok(output_size)
}

/// Kill the owned process and wait for it so no zombie is left behind
async fn kill_and_reap(child: &mut tokio::process::Child) {
    if let Err(e) = child.start_kill() {
        debug!(error = %e, "kill signal failed (process likely already gone)");
    }
    child.wait().await.ok();
}
