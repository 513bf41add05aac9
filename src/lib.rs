//! # media-relay
//!
//! Chat-bot media conversion relay: accept a media link or upload from a
//! messaging platform, convert it with an external transcoder (ffmpeg), and
//! send the result back to the requesting chat.
//!
//! ## Design Philosophy
//!
//! media-relay is designed to be:
//! - **Bounded** - A byte ceiling, wall-clock budgets, and a worker cap keep
//!   every conversion finite
//! - **Sensible defaults** - Works out of the box with only a bot token
//! - **Library-first** - The polling loop is optional; requests can be
//!   submitted directly to the relay
//! - **Best-effort reporting** - Progress messages may fail without ever
//!   disturbing a running conversion
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_relay::{Config, MediaRelay, PlatformConfig, run_with_shutdown};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         platform: PlatformConfig {
//!             bot_token: "123456:ABC-DEF".to_string(),
//!             ..Default::default()
//!         },
//!         ..Default::default()
//!     };
//!
//!     let relay = MediaRelay::new(config)?;
//!
//!     // Poll for chat updates until SIGTERM/SIGINT
//!     run_with_shutdown(relay).await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Inbound request classification
pub mod inbound;
/// Messaging-platform client and text catalogue
pub mod platform;
/// Status-message progress reporting
pub mod progress;
/// Transcode runner and media probing
pub mod transcode;
/// Transfer sink
pub mod transfer;
/// Core types
pub mod types;
/// Utility functions
pub mod utils;
/// Worker orchestration and the conversion pipeline
pub mod worker;

// Re-export commonly used types
pub use config::{
    AllowListConfig, Config, ConvertConfig, PlatformConfig, ToolsConfig, WorkerConfig,
};
pub use error::{ConvertError, Error, Result};
pub use platform::{PlatformClient, TelegramClient};
pub use transcode::MediaTools;
pub use types::{
    ChatId, ConversionRequest, MessageId, RequestId, TargetKind, VideoMetadata, WorkState,
};
pub use worker::MediaRelay;

use tokio_util::sync::CancellationToken;

/// Run the relay's polling loop with graceful signal handling.
///
/// Drives [`MediaRelay::run`] until a termination signal arrives, then
/// cancels the loop and returns.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal
///   registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_shutdown(relay: MediaRelay) -> Result<()> {
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        signal_token.cancel();
    });
    relay.run(shutdown).await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
