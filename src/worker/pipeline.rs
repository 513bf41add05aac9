//! Conversion pipeline: the state machine of a single work item
//!
//! Starting → Downloading → Converting → (ExtractingMetadata →
//! GeneratingThumbnail)? → Uploading → Done, with every failure absorbed
//! into a terminal [`ConvertError`]. Download and transcode run strictly in
//! sequence: the overlapped producer/consumer variant saves some latency
//! but makes the transcoder's end-of-input detection fragile, so the simple
//! strategy is used throughout.

use tracing::{debug, warn};

use super::MediaRelay;
use crate::error::ConvertError;
use crate::platform::messages;
use crate::progress::ProgressReporter;
use crate::transcode;
use crate::transfer;
use crate::types::{ConversionRequest, TargetKind, WorkItem, WorkState};

/// Run one conversion to a terminal state
///
/// Owns the status message and every temp path for the request's lifetime.
/// On success the status message is deleted; on failure it is rewritten
/// with the reason-specific text (best-effort). Temp files are released on
/// every exit path. If even the initial status message cannot be posted,
/// the request is dropped silently; there is no recipient for errors.
pub(super) async fn run_conversion(
    relay: &MediaRelay,
    request: &ConversionRequest,
) -> Result<(), ConvertError> {
    debug!(
        request_id = %request.id,
        target = %request.target,
        url = %request.source_url,
        state = %WorkState::Starting,
        "worker starting"
    );

    let status = match relay
        .platform
        .send_message(request.chat, Some(request.reply_to), messages::STARTING)
        .await
    {
        Ok(id) => id,
        Err(e) => {
            warn!(
                request_id = %request.id,
                error = %e,
                "cannot post status message, dropping request"
            );
            return Ok(());
        }
    };

    let mut reporter = ProgressReporter::new(relay.platform.clone(), request.chat, status);
    let mut work = WorkItem::new(request, &relay.config.worker.temp_dir);

    let result = execute(relay, request, &mut work, &mut reporter).await;

    match &result {
        Ok(()) => {
            debug!(
                request_id = %request.id,
                input_size = work.input_size,
                output_size = work.output_size,
                state = %WorkState::Done,
                "conversion complete"
            );
            reporter.delete().await;
        }
        Err(err) => {
            warn!(request_id = %request.id, error = %err, "conversion failed");
            reporter.update(err.user_message()).await;
        }
    }

    work.cleanup().await;
    result
}

/// The fallible middle of the pipeline; `run_conversion` handles the
/// terminal bookkeeping around it
async fn execute(
    relay: &MediaRelay,
    request: &ConversionRequest,
    work: &mut WorkItem,
    reporter: &mut ProgressReporter,
) -> Result<(), ConvertError> {
    // Downloading
    debug!(request_id = %request.id, state = %WorkState::Downloading, "fetching source");
    reporter.update(messages::DOWNLOADING).await;

    let response = relay
        .http
        .get(&request.source_url)
        .send()
        .await
        .map_err(|e| ConvertError::TransferFailed {
            reason: format!("request failed: {}", e),
        })?;
    if !response.status().is_success() {
        return Err(ConvertError::TransferFailed {
            reason: format!("HTTP {}", response.status()),
        });
    }

    let transport_mime = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_ascii_lowercase());
    validate_content_type(relay, request, transport_mime.as_deref())?;

    let declared_len = request.declared_size.or_else(|| response.content_length());
    let observed = transfer::sink_to_file(
        response.bytes_stream(),
        declared_len,
        &work.input_path,
        relay.config.convert.size_ceiling,
    )
    .await?;
    work.input_size = request.declared_size.unwrap_or(observed);

    // Converting
    debug!(
        request_id = %request.id,
        input_size = work.input_size,
        state = %WorkState::Converting,
        "starting transcode"
    );
    work.output_size = transcode::run_transcode(
        &relay.tools,
        &relay.config.convert,
        &request.id,
        request.target,
        &work.input_path,
        &work.output_path,
        work.input_size,
        reporter,
    )
    .await?;

    match request.target {
        TargetKind::Video => {
            debug!(request_id = %request.id, state = %WorkState::ExtractingMetadata, "probing output");
            let meta = transcode::extract_metadata(&relay.tools, &work.output_path).await?;

            debug!(request_id = %request.id, state = %WorkState::GeneratingThumbnail, "grabbing preview frame");
            reporter.update(messages::GENERATING_THUMBNAIL).await;
            transcode::extract_thumbnail(
                &relay.tools,
                &work.output_path,
                meta.duration_secs,
                &work.thumbnail_path,
            )
            .await?;

            debug!(request_id = %request.id, state = %WorkState::Uploading, "sending video");
            reporter.update(messages::UPLOADING).await;
            relay
                .platform
                .send_video(
                    request.chat,
                    request.reply_to,
                    &work.output_path,
                    &meta,
                    Some(&work.thumbnail_path),
                )
                .await
                .map_err(|e| ConvertError::UploadFailed {
                    reason: e.to_string(),
                })?;
        }
        TargetKind::Image => {
            debug!(request_id = %request.id, state = %WorkState::Uploading, "sending document");
            reporter.update(messages::UPLOADING).await;
            relay
                .platform
                .send_document(request.chat, request.reply_to, &work.output_path)
                .await
                .map_err(|e| ConvertError::UploadFailed {
                    reason: e.to_string(),
                })?;
        }
    }

    Ok(())
}

/// Validate the source's content kind against the allow-list for the target
///
/// Either the transport-reported or the platform-declared type may satisfy
/// the check; having neither at all means the media kind is unknowable.
fn validate_content_type(
    relay: &MediaRelay,
    request: &ConversionRequest,
    transport_mime: Option<&str>,
) -> Result<(), ConvertError> {
    let declared_mime = request.declared_mime.as_deref();
    if transport_mime.is_none() && declared_mime.is_none() {
        return Err(ConvertError::HeaderMissing);
    }

    let allow = &relay.config.allow;
    let accepted = transport_mime
        .map(|m| allow.mime_matches(request.target, m))
        .unwrap_or(false)
        || declared_mime
            .map(|m| allow.mime_matches(request.target, m))
            .unwrap_or(false);
    if !accepted {
        return Err(ConvertError::UnsupportedType {
            transport: transport_mime.map(String::from),
            declared: declared_mime.map(String::from),
        });
    }
    Ok(())
}
