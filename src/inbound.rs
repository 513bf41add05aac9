//! Inbound request normalization
//!
//! Two inbound shapes reach the relay: a text message containing a media
//! link, and an uploaded file with a platform-declared MIME type. Both
//! normalize to a source URL plus a target kind; everything else is ignored
//! without a reply, exactly like unrecognized chatter.

use regex::Regex;

use crate::config::AllowListConfig;
use crate::error::{Error, Result};
use crate::types::TargetKind;
use crate::utils;

/// Bare URL matcher; extension filtering happens against the allow-lists
const URL_PATTERN: &str = r"https?://[^\s<>]+";

/// Classifies raw inbound content against the configured allow-lists
#[derive(Clone, Debug)]
pub struct InboundClassifier {
    url_re: Regex,
    allow: AllowListConfig,
}

impl InboundClassifier {
    /// Build a classifier for the given allow-lists
    pub fn new(allow: &AllowListConfig) -> Result<Self> {
        let url_re = Regex::new(URL_PATTERN)
            .map_err(|e| Error::Other(format!("invalid URL pattern: {}", e)))?;
        Ok(Self {
            url_re,
            allow: allow.clone(),
        })
    }

    /// First URL in `text` whose file extension is allow-listed, with the
    /// target kind that extension maps to
    pub fn classify_text(&self, text: &str) -> Option<(String, TargetKind)> {
        for candidate in self.url_re.find_iter(text) {
            let url = candidate.as_str().trim_end_matches(['.', ',', ')', ']', '!', '?']);
            if let Some(ext) = utils::url_file_extension(url) {
                if let Some(target) = self.allow.target_for_extension(&ext) {
                    return Some((url.to_string(), target));
                }
            }
        }
        None
    }

    /// Target kind for a platform-declared MIME type, if accepted
    pub fn classify_mime(&self, mime: &str) -> Option<TargetKind> {
        self.allow.target_for_mime(mime)
    }
}
