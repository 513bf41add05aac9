//! Worker orchestration: dispatch inbound messages into bounded conversions
//!
//! [`MediaRelay`] is the long-lived service object. It is cheap to clone
//! (Arc fields throughout) and every conversion runs on its own task,
//! gated by a semaphore so at most `max_concurrent_conversions` external
//! transcoder processes exist at once.

mod pipeline;

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{ConvertError, Error, Result};
use crate::inbound::InboundClassifier;
use crate::platform::messages;
use crate::platform::{IncomingMessage, IncomingSticker, PlatformClient, TelegramClient};
use crate::transcode::MediaTools;
use crate::types::{ChatId, ConversionRequest, MessageId, TargetKind};

/// Delay before retrying after a failed long poll
const POLL_RETRY_DELAY: std::time::Duration = std::time::Duration::from_secs(3);

/// Media conversion relay service
///
/// Construct once with [`MediaRelay::new`], then either drive the built-in
/// platform polling loop with [`MediaRelay::run`] or submit requests
/// directly through [`MediaRelay::convert`].
#[derive(Clone)]
pub struct MediaRelay {
    config: Arc<Config>,
    http: reqwest::Client,
    telegram: TelegramClient,
    platform: Arc<dyn PlatformClient>,
    tools: Arc<MediaTools>,
    classifier: InboundClassifier,
    worker_limit: Arc<Semaphore>,
}

impl MediaRelay {
    /// Build a relay from validated configuration
    ///
    /// Fails fast on invalid config, unresolvable tool paths, or an
    /// uncreatable temp directory; nothing is deferred to request time.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        std::fs::create_dir_all(&config.worker.temp_dir).map_err(|e| Error::Config {
            message: format!(
                "cannot create temp dir {}: {}",
                config.worker.temp_dir.display(),
                e
            ),
            key: Some("worker.temp_dir".to_string()),
        })?;

        let http = Self::http_client()?;
        let telegram = TelegramClient::new(&config.platform, http.clone());
        let tools = Arc::new(MediaTools::resolve(&config.tools)?);
        let classifier = InboundClassifier::new(&config.allow)?;
        let worker_limit = Arc::new(Semaphore::new(config.worker.max_concurrent_conversions));

        Ok(Self {
            config: Arc::new(config),
            http,
            platform: Arc::new(telegram.clone()),
            telegram,
            tools,
            classifier,
            worker_limit,
        })
    }

    /// Replace the platform client used for status and delivery
    ///
    /// The polling loop still talks to the real platform; this swaps the
    /// seam the pipeline reports and uploads through.
    pub fn with_platform(mut self, platform: Arc<dyn PlatformClient>) -> Self {
        self.platform = platform;
        self
    }

    /// Shared HTTP client for source downloads
    ///
    /// Compressed transfer encodings are refused so Content-Length, when
    /// present, describes the bytes that will actually arrive.
    fn http_client() -> Result<reqwest::Client> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT_ENCODING,
            reqwest::header::HeaderValue::from_static("identity"),
        );
        reqwest::Client::builder()
            .user_agent(concat!("media-relay/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(Error::Network)
    }

    /// Run one conversion request to completion on the calling task
    ///
    /// All user-visible reporting happens through the platform client; the
    /// returned error is for the caller's own logging and tests.
    pub async fn convert(&self, request: &ConversionRequest) -> std::result::Result<(), ConvertError> {
        pipeline::run_conversion(self, request).await
    }

    /// Spawn a conversion onto its own task, gated by the worker limit
    ///
    /// The permit is acquired before the pipeline starts, so a full pool
    /// queues requests rather than running them; queued requests hold no
    /// resources beyond the task itself.
    pub fn spawn_conversion(&self, request: ConversionRequest) {
        let relay = self.clone();
        tokio::spawn(async move {
            let permit = match relay.worker_limit.clone().acquire_owned().await {
                Ok(p) => p,
                // Closed only when the relay is torn down
                Err(_) => return,
            };
            let outcome = relay.convert(&request).await;
            drop(permit);
            if let Err(e) = outcome {
                debug!(request_id = %request.id, error = %e, "conversion ended in error");
            }
        });
    }

    /// Dispatch one inbound message
    ///
    /// Commands get a reply, media gets a spawned conversion, everything
    /// else is ignored without a response.
    pub async fn handle_message(&self, message: &IncomingMessage) {
        let chat = ChatId(message.chat.id);
        let reply_to = MessageId(message.message_id);

        if let Some(text) = message.text.as_deref() {
            if text.starts_with("/start") || text.starts_with("/help") {
                let reply = if text.starts_with("/start") {
                    messages::START
                } else {
                    messages::HELP
                };
                if let Err(e) = self.platform.send_message(chat, None, reply).await {
                    warn!(error = %e, "failed to answer command");
                }
                return;
            }
            if let Some((url, target)) = self.classifier.classify_text(text) {
                self.spawn_conversion(ConversionRequest::new(url, None, None, target, chat, reply_to));
            }
            return;
        }

        let attachment = message.video.as_ref().or(message.document.as_ref());
        if let Some(doc) = attachment {
            let Some(mime) = doc.mime_type.as_deref() else {
                return;
            };
            let Some(target) = self.classifier.classify_mime(mime) else {
                return;
            };
            self.spawn_upload(
                chat,
                reply_to,
                &doc.file_id,
                Some(mime.to_string()),
                doc.file_size,
                target,
            )
            .await;
            return;
        }

        if let Some(sticker) = &message.sticker {
            self.handle_sticker(chat, reply_to, sticker).await;
        }
    }

    /// Stickers are media too: video stickers become mp4, static ones png
    ///
    /// Animated (vector) stickers have no raster content to transcode and
    /// get an explanatory reply instead of a silent drop.
    async fn handle_sticker(&self, chat: ChatId, reply_to: MessageId, sticker: &IncomingSticker) {
        if sticker.is_animated {
            if let Err(e) = self
                .platform
                .send_message(chat, Some(reply_to), messages::error::ANIMATED_STICKER)
                .await
            {
                warn!(error = %e, "failed to reject animated sticker");
            }
            return;
        }
        let (target, mime) = if sticker.is_video {
            (TargetKind::Video, "video/webm")
        } else {
            (TargetKind::Image, "image/webp")
        };
        self.spawn_upload(
            chat,
            reply_to,
            &sticker.file_id,
            Some(mime.to_string()),
            sticker.file_size,
            target,
        )
        .await;
    }

    /// Resolve a platform file id to a URL and spawn its conversion
    async fn spawn_upload(
        &self,
        chat: ChatId,
        reply_to: MessageId,
        file_id: &str,
        declared_mime: Option<String>,
        declared_size: Option<u64>,
        target: TargetKind,
    ) {
        let url = match self.platform.resolve_file_url(file_id).await {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "cannot resolve uploaded file");
                if let Err(e) = self
                    .platform
                    .send_message(chat, Some(reply_to), messages::error::DOWNLOAD_FAILED)
                    .await
                {
                    warn!(error = %e, "failed to report unresolvable upload");
                }
                return;
            }
        };
        self.spawn_conversion(ConversionRequest::new(
            url,
            declared_mime,
            declared_size,
            target,
            chat,
            reply_to,
        ));
    }

    /// Long-poll the platform for updates until `shutdown` fires
    ///
    /// Each batch advances the offset past the highest update id seen, so
    /// a message is dispatched at most once. Poll failures back off briefly
    /// and retry; they never terminate the loop.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        info!(
            workers = self.config.worker.max_concurrent_conversions,
            ceiling = self.config.convert.size_ceiling,
            "relay polling for updates"
        );
        let mut offset: i64 = 0;

        loop {
            let updates = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("shutdown requested, stopping update loop");
                    return Ok(());
                }
                result = self
                    .telegram
                    .get_updates(offset, self.config.platform.poll_timeout_secs) => result,
            };

            let updates = match updates {
                Ok(u) => u,
                Err(e) => {
                    error!(error = %e, "update poll failed, backing off");
                    tokio::select! {
                        _ = shutdown.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(POLL_RETRY_DELAY) => continue,
                    }
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                if let Some(message) = &update.message {
                    self.handle_message(message).await;
                }
            }
        }
    }

    /// The effective configuration this relay was built with
    pub fn config(&self) -> &Config {
        &self.config
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use crate::config::{PlatformConfig, ToolsConfig};
    use crate::platform::IncomingChat;
    use crate::types::VideoMetadata;

    /// Records every message sent; all other calls succeed trivially
    #[derive(Default)]
    struct RecordingClient {
        sends: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PlatformClient for RecordingClient {
        async fn send_message(
            &self,
            _chat: ChatId,
            _reply_to: Option<MessageId>,
            text: &str,
        ) -> Result<MessageId> {
            self.sends.lock().unwrap().push(text.to_string());
            Ok(MessageId(1))
        }

        async fn edit_message_text(
            &self,
            _chat: ChatId,
            _message: MessageId,
            _text: &str,
        ) -> Result<()> {
            Ok(())
        }

        async fn delete_message(&self, _chat: ChatId, _message: MessageId) -> Result<()> {
            Ok(())
        }

        async fn resolve_file_url(&self, file_id: &str) -> Result<String> {
            Ok(format!("http://files.invalid/{file_id}"))
        }

        async fn send_video(
            &self,
            _chat: ChatId,
            _reply_to: MessageId,
            _video: &Path,
            _meta: &VideoMetadata,
            _thumbnail: Option<&Path>,
        ) -> Result<()> {
            Ok(())
        }

        async fn send_document(
            &self,
            _chat: ChatId,
            _reply_to: MessageId,
            _document: &Path,
        ) -> Result<()> {
            Ok(())
        }
    }

    fn relay_with(client: Arc<RecordingClient>) -> MediaRelay {
        let config = Config {
            platform: PlatformConfig {
                bot_token: "123:TEST".to_string(),
                ..Default::default()
            },
            tools: ToolsConfig {
                ffmpeg_path: Some(PathBuf::from("/bin/true")),
                ffprobe_path: Some(PathBuf::from("/bin/true")),
                search_path: false,
            },
            ..Default::default()
        };
        MediaRelay::new(config).unwrap().with_platform(client)
    }

    fn text_message(text: &str) -> IncomingMessage {
        IncomingMessage {
            message_id: 7,
            chat: IncomingChat { id: 42 },
            text: Some(text.to_string()),
            document: None,
            video: None,
            sticker: None,
        }
    }

    #[tokio::test]
    async fn commands_are_answered_from_the_catalogue() {
        let client = Arc::new(RecordingClient::default());
        let relay = relay_with(client.clone());

        relay.handle_message(&text_message("/start")).await;
        relay.handle_message(&text_message("/help")).await;

        assert_eq!(
            client.sends.lock().unwrap().as_slice(),
            [messages::START, messages::HELP]
        );
    }

    #[tokio::test]
    async fn plain_chatter_gets_no_reply() {
        let client = Arc::new(RecordingClient::default());
        let relay = relay_with(client.clone());

        relay.handle_message(&text_message("good morning")).await;
        relay
            .handle_message(&text_message("see http://example.com/page"))
            .await;

        assert!(client.sends.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn animated_stickers_are_rejected_with_their_dedicated_text() {
        let client = Arc::new(RecordingClient::default());
        let relay = relay_with(client.clone());

        let message = IncomingMessage {
            message_id: 7,
            chat: IncomingChat { id: 42 },
            text: None,
            document: None,
            video: None,
            sticker: Some(IncomingSticker {
                file_id: "TGS".to_string(),
                is_animated: true,
                is_video: false,
                file_size: None,
            }),
        };
        relay.handle_message(&message).await;

        assert_eq!(
            client.sends.lock().unwrap().as_slice(),
            [messages::error::ANIMATED_STICKER]
        );
    }

    #[tokio::test]
    async fn attachments_without_a_declared_type_are_ignored() {
        let client = Arc::new(RecordingClient::default());
        let relay = relay_with(client.clone());

        let message = IncomingMessage {
            message_id: 7,
            chat: IncomingChat { id: 42 },
            text: None,
            document: Some(crate::platform::IncomingDocument {
                file_id: "DOC".to_string(),
                mime_type: None,
                file_size: Some(10),
            }),
            video: None,
            sticker: None,
        };
        relay.handle_message(&message).await;

        assert!(client.sends.lock().unwrap().is_empty());
    }
}
