//! Transfer sink: stream remote bytes to a local file under a byte ceiling
//!
//! The single download primitive of the pipeline. Chunks are appended in
//! order with no gaps, so a consumer may read the destination while it is
//! still growing; this module only guarantees monotonically growing content
//! and never truncates a file it has started writing (except to discard it
//! entirely on abort).

use futures::{Stream, StreamExt};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::ConvertError;
use crate::utils;

/// Write a stream of byte chunks to `dest`, enforcing `ceiling` mid-stream.
///
/// If `declared_len` is present and already at or over the ceiling, aborts
/// before a single byte is written. Without a declared length, a running
/// counter aborts the transfer the moment it reaches the ceiling and the
/// partial destination is discarded. Any fault on the source stream or the
/// destination file also discards the partial destination.
///
/// On success the destination holds exactly the source bytes and the final
/// byte count is returned.
pub async fn sink_to_file<S, C, E>(
    stream: S,
    declared_len: Option<u64>,
    dest: &Path,
    ceiling: u64,
) -> Result<u64, ConvertError>
where
    S: Stream<Item = Result<C, E>>,
    C: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut stream = std::pin::pin!(stream);
    if let Some(len) = declared_len {
        if len >= ceiling {
            debug!(declared = len, ceiling, "declared size at ceiling, refusing transfer");
            return Err(ConvertError::SizeExceeded { limit: ceiling });
        }
    }

    let mut file = match tokio::fs::File::create(dest).await {
        Ok(f) => f,
        Err(e) => {
            return Err(ConvertError::TransferFailed {
                reason: format!("cannot create {}: {}", dest.display(), e),
            });
        }
    };

    let mut written: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                drop(file);
                utils::remove_file_quiet(dest).await;
                return Err(ConvertError::TransferFailed {
                    reason: format!("source read failed: {}", e),
                });
            }
        };

        written += chunk.as_ref().len() as u64;
        if written >= ceiling {
            drop(file);
            utils::remove_file_quiet(dest).await;
            debug!(written, ceiling, "transfer reached ceiling, discarding partial file");
            return Err(ConvertError::SizeExceeded { limit: ceiling });
        }

        if let Err(e) = file.write_all(chunk.as_ref()).await {
            drop(file);
            utils::remove_file_quiet(dest).await;
            return Err(ConvertError::TransferFailed {
                reason: format!("write to {} failed: {}", dest.display(), e),
            });
        }
    }

    if let Err(e) = file.flush().await {
        drop(file);
        utils::remove_file_quiet(dest).await;
        return Err(ConvertError::TransferFailed {
            reason: format!("flush of {} failed: {}", dest.display(), e),
        });
    }

    Ok(written)
}
