//! Shared helpers for relay integration tests
//!
//! The tests run the real pipeline end to end against two local mock
//! servers (one playing the media host, one the Bot API) and shell-script
//! stand-ins for ffmpeg/ffprobe, so no network access and no real
//! transcoder are needed.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use media_relay::{Config, PlatformConfig, ToolsConfig, WorkerConfig};

/// Token used by every test; Bot API paths embed it
pub const BOT_TOKEN: &str = "123:TESTTOKEN";

/// Write an executable shell script and return its path
#[cfg(unix)]
pub fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// ffmpeg stand-in that copies its input to its output
///
/// The input is the argument after `-i` and the output is the last
/// argument, which matches every invocation the relay makes (transcode
/// and thumbnail alike).
#[cfg(unix)]
pub fn copying_ffmpeg(dir: &Path) -> PathBuf {
    script(
        dir,
        "ffmpeg",
        r#"input=""
prev=""
for a in "$@"; do
  [ "$prev" = "-i" ] && input="$a"
  prev="$a"
done
cp "$input" "$prev""#,
    )
}

/// ffprobe stand-in answering the duration and dimension queries
#[cfg(unix)]
pub fn answering_ffprobe(dir: &Path) -> PathBuf {
    script(
        dir,
        "ffprobe",
        r#"case "$*" in
  *format=duration*) echo "10.2" ;;
  *width,height*) echo "640x360" ;;
  *) exit 1 ;;
esac"#,
    )
}

/// Start a Bot API mock that accepts every method the relay calls
pub async fn mock_bot_api() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/bot[^/]+/sendMessage$"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"ok": true, "result": {"message_id": 100}})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/bot[^/]+/editMessageText$"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"ok": true, "result": {"message_id": 100}})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/bot[^/]+/deleteMessage$"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true, "result": true})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/bot[^/]+/sendVideo$"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"ok": true, "result": {"message_id": 101}})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/bot[^/]+/sendDocument$"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"ok": true, "result": {"message_id": 102}})),
        )
        .mount(&server)
        .await;

    server
}

/// How many requests the Bot API mock received for `api_method`
pub async fn bot_calls(server: &MockServer, api_method: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path().ends_with(&format!("/{api_method}")))
        .count()
}

/// Relay configuration wired to the mock Bot API and the stub tools
pub fn test_config(
    bot_api_uri: &str,
    temp_dir: &Path,
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
) -> Config {
    Config {
        platform: PlatformConfig {
            bot_token: BOT_TOKEN.to_string(),
            api_base_url: bot_api_uri.to_string(),
            ..Default::default()
        },
        tools: ToolsConfig {
            ffmpeg_path: Some(ffmpeg),
            ffprobe_path: Some(ffprobe),
            search_path: false,
        },
        worker: WorkerConfig {
            temp_dir: temp_dir.to_path_buf(),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Number of entries left in the relay's temp directory
pub fn temp_entries(temp_dir: &Path) -> usize {
    std::fs::read_dir(temp_dir).unwrap().count()
}
