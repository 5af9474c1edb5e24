//! Acquisition constraints: MIME acceptance and size ceilings

use crate::error::{MediaError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Coarse media category used for acceptance filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MimeClass {
    Image,
    Video,
}

impl MimeClass {
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.split('/').next()? {
            "image" => Some(MimeClass::Image),
            "video" => Some(MimeClass::Video),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MimeClass::Image => "image",
            MimeClass::Video => "video",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AcceptEntry {
    /// `image/*`
    TopLevel(String),
    /// `image/png`
    Exact(String),
}

/// Drop-zone style accept list, e.g. `image/*,video/*`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AcceptPattern {
    entries: Vec<AcceptEntry>,
}

impl AcceptPattern {
    pub fn images() -> Self {
        Self { entries: vec![AcceptEntry::TopLevel("image".to_string())] }
    }

    pub fn videos() -> Self {
        Self { entries: vec![AcceptEntry::TopLevel("video".to_string())] }
    }

    pub fn images_and_videos() -> Self {
        Self {
            entries: vec![
                AcceptEntry::TopLevel("image".to_string()),
                AcceptEntry::TopLevel("video".to_string()),
            ],
        }
    }

    /// Check a concrete MIME type against the pattern
    pub fn accepts(&self, mime: &str) -> bool {
        let mime = mime.trim().to_ascii_lowercase();
        let top = mime.split('/').next().unwrap_or_default();
        self.entries.iter().any(|entry| match entry {
            AcceptEntry::TopLevel(t) => t == top,
            AcceptEntry::Exact(m) => *m == mime,
        })
    }

    /// MIME classes this pattern can possibly admit
    pub fn classes(&self) -> Vec<MimeClass> {
        let mut classes = Vec::new();
        for entry in &self.entries {
            let class = match entry {
                AcceptEntry::TopLevel(t) => MimeClass::from_mime(&format!("{}/", t)),
                AcceptEntry::Exact(m) => MimeClass::from_mime(m),
            };
            if let Some(class) = class {
                if !classes.contains(&class) {
                    classes.push(class);
                }
            }
        }
        classes
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromStr for AcceptPattern {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self> {
        let mut entries = Vec::new();
        for raw in s.split(',') {
            let item = raw.trim().to_ascii_lowercase();
            if item.is_empty() {
                continue;
            }
            let (top, sub) = item.split_once('/').ok_or_else(|| {
                MediaError::Config(format!("Invalid accept entry: {}", item))
            })?;
            if top.is_empty() || sub.is_empty() {
                return Err(MediaError::Config(format!("Invalid accept entry: {}", item)));
            }
            if sub == "*" {
                entries.push(AcceptEntry::TopLevel(top.to_string()));
            } else {
                entries.push(AcceptEntry::Exact(item.clone()));
            }
        }
        if entries.is_empty() {
            return Err(MediaError::Config("Accept pattern is empty".to_string()));
        }
        Ok(Self { entries })
    }
}

impl fmt::Display for AcceptPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .entries
            .iter()
            .map(|entry| match entry {
                AcceptEntry::TopLevel(t) => format!("{}/*", t),
                AcceptEntry::Exact(m) => m.clone(),
            })
            .collect();
        write!(f, "{}", parts.join(","))
    }
}

impl TryFrom<String> for AcceptPattern {
    type Error = MediaError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<AcceptPattern> for String {
    fn from(pattern: AcceptPattern) -> Self {
        pattern.to_string()
    }
}

/// Determine a file's MIME type
///
/// The declared type wins when present. Otherwise the bytes are sniffed with
/// `infer`, then `tree_magic_mini`.
pub fn detect_mime(declared: Option<&str>, bytes: &[u8]) -> Option<String> {
    if let Some(declared) = declared.map(str::trim).filter(|d| !d.is_empty()) {
        return Some(declared.to_ascii_lowercase());
    }

    if let Some(kind) = infer::get(bytes) {
        debug!("Sniffed MIME via infer: {}", kind.mime_type());
        return Some(kind.mime_type().to_string());
    }

    let sniffed = tree_magic_mini::from_u8(bytes);
    debug!("Sniffed MIME via tree_magic_mini: {}", sniffed);
    match sniffed {
        "application/octet-stream" | "text/plain" | "all/all" | "all/allfiles" => None,
        other => Some(other.to_string()),
    }
}

/// Check a candidate file against a screen's constraints
pub fn validate_file(
    pattern: &AcceptPattern,
    max_bytes: u64,
    mime: Option<&str>,
    size: u64,
) -> Result<MimeClass> {
    let mime = mime.ok_or_else(|| {
        MediaError::UnsupportedMedia("Could not determine file type".to_string())
    })?;

    if !pattern.accepts(mime) {
        return Err(MediaError::UnsupportedMedia(format!(
            "{} is not accepted (expected {})",
            mime, pattern
        )));
    }

    let class = MimeClass::from_mime(mime)
        .ok_or_else(|| MediaError::UnsupportedMedia(format!("{} is not an image or video", mime)))?;

    if size > max_bytes {
        return Err(MediaError::FileTooLarge { size, limit: max_bytes });
    }

    Ok(class)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

    #[test]
    fn test_parse_accept_pattern() {
        let pattern: AcceptPattern = "image/*, video/mp4".parse().unwrap();
        assert!(pattern.accepts("image/jpeg"));
        assert!(pattern.accepts("IMAGE/PNG"));
        assert!(pattern.accepts("video/mp4"));
        assert!(!pattern.accepts("video/webm"));
        assert!(!pattern.accepts("application/pdf"));
        assert_eq!(pattern.to_string(), "image/*,video/mp4");
    }

    #[test]
    fn test_invalid_accept_pattern() {
        assert!("".parse::<AcceptPattern>().is_err());
        assert!("image".parse::<AcceptPattern>().is_err());
        assert!("/*".parse::<AcceptPattern>().is_err());
    }

    #[test]
    fn test_pattern_classes() {
        assert_eq!(AcceptPattern::images().classes(), vec![MimeClass::Image]);
        assert_eq!(
            AcceptPattern::images_and_videos().classes(),
            vec![MimeClass::Image, MimeClass::Video]
        );
    }

    #[test]
    fn test_pattern_serde_as_string() {
        let json = serde_json::to_string(&AcceptPattern::images_and_videos()).unwrap();
        assert_eq!(json, "\"image/*,video/*\"");
        let back: AcceptPattern = serde_json::from_str(&json).unwrap();
        assert_eq!(back, AcceptPattern::images_and_videos());
    }

    #[test]
    fn test_detect_mime_prefers_declared() {
        assert_eq!(detect_mime(Some("Image/JPEG"), PNG_MAGIC).as_deref(), Some("image/jpeg"));
    }

    #[test]
    fn test_detect_mime_sniffs_bytes() {
        assert_eq!(detect_mime(None, PNG_MAGIC).as_deref(), Some("image/png"));
        assert_eq!(detect_mime(Some("  "), PNG_MAGIC).as_deref(), Some("image/png"));
    }

    #[test]
    fn test_validate_file() {
        let images = AcceptPattern::images();
        assert_eq!(validate_file(&images, 100, Some("image/png"), 100).unwrap(), MimeClass::Image);

        assert!(matches!(
            validate_file(&images, 100, Some("video/mp4"), 10),
            Err(MediaError::UnsupportedMedia(_))
        ));
        assert!(matches!(
            validate_file(&images, 100, Some("image/png"), 101),
            Err(MediaError::FileTooLarge { size: 101, limit: 100 })
        ));
        assert!(matches!(
            validate_file(&images, 100, None, 1),
            Err(MediaError::UnsupportedMedia(_))
        ));
    }

    #[test]
    fn test_non_media_type_rejected_even_if_pattern_matches() {
        let pattern: AcceptPattern = "application/pdf".parse().unwrap();
        assert!(matches!(
            validate_file(&pattern, 100, Some("application/pdf"), 1),
            Err(MediaError::UnsupportedMedia(_))
        ));
    }
}
