//! Utility functions for identifiers, byte formatting, and file handling

use rand::Rng;
use std::path::Path;

/// Alphabet for temp-file identifiers: uppercase ASCII and digits
const ID_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Random identifier of `len` characters drawn from [`ID_CHARSET`]
pub fn random_id(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ID_CHARSET[rng.gen_range(0..ID_CHARSET.len())] as char)
        .collect()
}

/// Render a byte count for humans ("512 B", "1.5 KB", "50.0 MB")
///
/// Used for the "<output> / <input>" progress line, so it stays short.
pub fn human_bytes(n: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if n < 1024 {
        return format!("{} B", n);
    }
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

/// Lowercased file extension of a URL's last path segment, if any
///
/// Query strings and fragments are stripped by the URL parser, so
/// `.../clip.webm?token=x` still yields `webm`.
pub fn url_file_extension(raw: &str) -> Option<String> {
    let parsed = url::Url::parse(raw).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    let ext = Path::new(last).extension()?.to_str()?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}

/// Delete a file, logging at debug if it cannot be removed
///
/// Missing files are expected on many cleanup paths (e.g. the thumbnail of
/// an image conversion) and are not worth logging.
pub async fn remove_file_quiet(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::debug!(?path, error = %e, "unable to remove temp file");
        }
    }
}
