//! Bot API client

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use super::PlatformClient;
use super::updates::Update;
use crate::config::PlatformConfig;
use crate::error::{Error, Result};
use crate::types::{ChatId, MessageId, VideoMetadata};

/// Extra slack on top of the long-poll timeout before the HTTP request
/// itself is considered dead
const POLL_REQUEST_SLACK: Duration = Duration::from_secs(10);

/// Envelope every Bot API response arrives in
///
/// `result` carries no serde default attribute: the derive would bound the
/// impl on `T: Default`, and a missing `Option` field is `None` anyway.
#[derive(Debug, serde::Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

/// The subset of a message object the client needs back from sends
#[derive(Debug, serde::Deserialize)]
struct ApiMessage {
    message_id: i64,
}

/// getFile result
#[derive(Debug, serde::Deserialize)]
struct ApiFile {
    #[serde(default)]
    file_path: Option<String>,
}

/// Stateless Bot API client
///
/// Cheap to clone and safe to share across workers; every call is an
/// independent HTTP request. The base URL is configurable so tests can run
/// against a local mock server.
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    token: String,
    base_url: String,
}

impl TelegramClient {
    /// Create a client from the platform configuration and a shared HTTP client
    pub fn new(config: &PlatformConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            token: config.bot_token.clone(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    /// POST a JSON payload to a Bot API method and unwrap the envelope
    async fn call<T: DeserializeOwned>(&self, method: &str, payload: &impl Serialize) -> Result<T> {
        let response = self
            .http
            .post(self.method_url(method))
            .json(payload)
            .send()
            .await?;
        Self::unwrap_envelope(method, response).await
    }

    async fn unwrap_envelope<T: DeserializeOwned>(
        method: &str,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| Error::Platform(format!("{}: malformed response: {}", method, e)))?;

        if !body.ok {
            return Err(Error::Platform(format!(
                "{}: {} (HTTP {})",
                method,
                body.description.as_deref().unwrap_or("no description"),
                status
            )));
        }
        body.result
            .ok_or_else(|| Error::Platform(format!("{}: ok response without result", method)))
    }

    /// Build a multipart file part from a local path
    async fn file_part(path: &Path, fallback_name: &str, mime: &str) -> Result<reqwest::multipart::Part> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| fallback_name.to_string());
        Ok(reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime)?)
    }

    /// Long-poll for updates after `offset`
    ///
    /// Blocks server-side for up to the configured poll timeout; the HTTP
    /// request gets a little extra slack before it is abandoned.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>> {
        let response = self
            .http
            .post(self.method_url("getUpdates"))
            .json(&json!({ "offset": offset, "timeout": timeout_secs }))
            .timeout(Duration::from_secs(timeout_secs) + POLL_REQUEST_SLACK)
            .send()
            .await?;
        Self::unwrap_envelope("getUpdates", response).await
    }
}

#[async_trait]
impl PlatformClient for TelegramClient {
    async fn send_message(
        &self,
        chat: ChatId,
        reply_to: Option<MessageId>,
        text: &str,
    ) -> Result<MessageId> {
        let mut payload = json!({
            "chat_id": chat.0,
            "text": text,
            "parse_mode": "HTML",
        });
        if let Some(reply) = reply_to {
            payload["reply_to_message_id"] = json!(reply.0);
        }
        let message: ApiMessage = self.call("sendMessage", &payload).await?;
        Ok(MessageId(message.message_id))
    }

    async fn edit_message_text(&self, chat: ChatId, message: MessageId, text: &str) -> Result<()> {
        let payload = json!({
            "chat_id": chat.0,
            "message_id": message.0,
            "text": text,
            "parse_mode": "HTML",
        });
        // editMessageText returns the edited message object; its contents
        // are of no interest here
        self.call::<serde_json::Value>("editMessageText", &payload)
            .await?;
        Ok(())
    }

    async fn delete_message(&self, chat: ChatId, message: MessageId) -> Result<()> {
        let payload = json!({ "chat_id": chat.0, "message_id": message.0 });
        self.call::<serde_json::Value>("deleteMessage", &payload)
            .await?;
        Ok(())
    }

    async fn resolve_file_url(&self, file_id: &str) -> Result<String> {
        let file: ApiFile = self.call("getFile", &json!({ "file_id": file_id })).await?;
        let path = file
            .file_path
            .ok_or_else(|| Error::Platform("getFile: response carried no file_path".to_string()))?;
        Ok(format!("{}/file/bot{}/{}", self.base_url, self.token, path))
    }

    async fn send_video(
        &self,
        chat: ChatId,
        reply_to: MessageId,
        video: &Path,
        meta: &VideoMetadata,
        thumbnail: Option<&Path>,
    ) -> Result<()> {
        debug!(?video, ?meta, "uploading video");

        let mut form = reqwest::multipart::Form::new()
            .text("chat_id", chat.0.to_string())
            .text("reply_to_message_id", reply_to.0.to_string())
            .text("supports_streaming", "true")
            .text("duration", meta.duration_secs.to_string())
            .text("width", meta.width.to_string())
            .text("height", meta.height.to_string())
            .part(
                "video",
                Self::file_part(video, "video.mp4", "video/mp4").await?,
            );
        if let Some(thumb) = thumbnail {
            form = form.part(
                "thumbnail",
                Self::file_part(thumb, "thumb.jpg", "image/jpeg").await?,
            );
        }

        let response = self
            .http
            .post(self.method_url("sendVideo"))
            .multipart(form)
            .send()
            .await?;
        Self::unwrap_envelope::<ApiMessage>("sendVideo", response).await?;
        Ok(())
    }

    async fn send_document(
        &self,
        chat: ChatId,
        reply_to: MessageId,
        document: &Path,
    ) -> Result<()> {
        debug!(?document, "uploading document");

        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat.0.to_string())
            .text("reply_to_message_id", reply_to.0.to_string())
            .part(
                "document",
                Self::file_part(document, "converted.png", "image/png").await?,
            );

        let response = self
            .http
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await?;
        Self::unwrap_envelope::<ApiMessage>("sendDocument", response).await?;
        Ok(())
    }
}
