//! Engine configuration
//!
//! Every editing screen is the same engine run with a different
//! [`ScreenConfig`]. The four presets match the screens of the web client;
//! an [`EngineConfig`] JSON file can override any of them along with the
//! service location.

use crate::error::{MediaError, Result};
use crate::overlay::Dimensions;
use crate::validation::AcceptPattern;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const MB: u64 = 1024 * 1024;

/// Processing service endpoint a screen submits to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Adjust,
    StyleTransfer,
    Detect,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Adjust => "/adjust",
            Endpoint::StyleTransfer => "/style-transfer",
            Endpoint::Detect => "/detect",
        }
    }
}

/// What a successful response carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseShape {
    /// Processed media, offered as a download
    Blob,
    /// JSON detection list
    Detections,
}

/// Per-screen behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenConfig {
    pub name: String,
    pub accept: AcceptPattern,
    pub max_bytes: u64,
    pub endpoint: Endpoint,
    pub response: ResponseShape,
    /// Download name is `<prefix>_<original name>`
    pub download_prefix: String,
    pub failure_message: String,
    pub allow_camera: bool,
    pub allow_recording: bool,
    /// Bounding box the detection canvas is fitted into
    pub max_canvas: Dimensions,
}

impl ScreenConfig {
    pub fn image_editor() -> Self {
        Self {
            name: "image_editor".to_string(),
            accept: AcceptPattern::images(),
            max_bytes: 10 * MB,
            endpoint: Endpoint::Adjust,
            response: ResponseShape::Blob,
            download_prefix: "processed".to_string(),
            failure_message: "Failed to process image. Please try again.".to_string(),
            allow_camera: true,
            allow_recording: false,
            max_canvas: Dimensions::new(800, 600),
        }
    }

    pub fn video_editor() -> Self {
        Self {
            name: "video_editor".to_string(),
            accept: AcceptPattern::videos(),
            max_bytes: 100 * MB,
            failure_message: "Failed to process video. Please try again.".to_string(),
            allow_camera: false,
            allow_recording: true,
            ..Self::image_editor()
        }
    }

    pub fn style_transfer() -> Self {
        Self {
            name: "style_transfer".to_string(),
            endpoint: Endpoint::StyleTransfer,
            download_prefix: "styled".to_string(),
            failure_message: "Failed to process style transfer. Please try again.".to_string(),
            ..Self::image_editor()
        }
    }

    pub fn object_detection() -> Self {
        Self {
            name: "object_detection".to_string(),
            accept: AcceptPattern::images_and_videos(),
            max_bytes: 100 * MB,
            endpoint: Endpoint::Detect,
            response: ResponseShape::Detections,
            download_prefix: "detected".to_string(),
            failure_message: "Failed to process detection. Please try again.".to_string(),
            ..Self::image_editor()
        }
    }

    /// Style-transfer screens refuse to submit without a style
    pub fn requires_style(&self) -> bool {
        self.endpoint == Endpoint::StyleTransfer
    }

    pub fn validate(&self) -> Result<()> {
        if self.accept.is_empty() {
            return Err(MediaError::Config(format!("{}: accept pattern is empty", self.name)));
        }
        if self.max_bytes == 0 {
            return Err(MediaError::Config(format!("{}: max_bytes must be non-zero", self.name)));
        }
        let expected = match self.endpoint {
            Endpoint::Detect => ResponseShape::Detections,
            Endpoint::Adjust | Endpoint::StyleTransfer => ResponseShape::Blob,
        };
        if self.response != expected {
            return Err(MediaError::Config(format!(
                "{}: endpoint {:?} returns {:?}, not {:?}",
                self.name, self.endpoint, expected, self.response
            )));
        }
        if self.max_canvas.width == 0 || self.max_canvas.height == 0 {
            return Err(MediaError::Config(format!("{}: max_canvas must be non-zero", self.name)));
        }
        Ok(())
    }
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self::image_editor()
    }
}

/// Location of the processing service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub base_url: String,
    /// No timeout unless configured; responses may arrive arbitrarily late
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: None,
        }
    }
}

impl ServiceConfig {
    pub fn endpoint_url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), endpoint.path())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| MediaError::Config(format!("Invalid base_url {}: {}", self.base_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(MediaError::Config(format!("Unsupported scheme: {}", url.scheme())));
        }
        if self.timeout_secs == Some(0) {
            return Err(MediaError::Config("timeout_secs must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Which preset a screen is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenKind {
    ImageEditor,
    VideoEditor,
    StyleTransfer,
    ObjectDetection,
}

/// Full engine configuration, loadable from JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default = "ScreenConfig::image_editor")]
    pub image_editor: ScreenConfig,
    #[serde(default = "ScreenConfig::video_editor")]
    pub video_editor: ScreenConfig,
    #[serde(default = "ScreenConfig::style_transfer")]
    pub style_transfer: ScreenConfig,
    #[serde(default = "ScreenConfig::object_detection")]
    pub object_detection: ScreenConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            image_editor: ScreenConfig::image_editor(),
            video_editor: ScreenConfig::video_editor(),
            style_transfer: ScreenConfig::style_transfer(),
            object_detection: ScreenConfig::object_detection(),
        }
    }
}

impl EngineConfig {
    /// Load and validate a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&text)
            .map_err(|e| MediaError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn screen(&self, kind: ScreenKind) -> &ScreenConfig {
        match kind {
            ScreenKind::ImageEditor => &self.image_editor,
            ScreenKind::VideoEditor => &self.video_editor,
            ScreenKind::StyleTransfer => &self.style_transfer,
            ScreenKind::ObjectDetection => &self.object_detection,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.service.validate()?;
        for screen in [
            &self.image_editor,
            &self.video_editor,
            &self.style_transfer,
            &self.object_detection,
        ] {
            screen.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_presets_are_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn test_preset_constraints() {
        let image = ScreenConfig::image_editor();
        assert_eq!(image.max_bytes, 10_485_760);
        assert!(image.accept.accepts("image/png"));
        assert!(!image.accept.accepts("video/mp4"));

        let detect = ScreenConfig::object_detection();
        assert_eq!(detect.max_bytes, 104_857_600);
        assert!(detect.accept.accepts("video/mp4"));
        assert_eq!(detect.response, ResponseShape::Detections);

        let video = ScreenConfig::video_editor();
        assert!(video.allow_recording);
        assert!(!video.accept.accepts("image/png"));

        assert!(ScreenConfig::style_transfer().requires_style());
        assert!(!image.requires_style());
    }

    #[test]
    fn test_endpoint_url() {
        let service = ServiceConfig {
            base_url: "http://10.0.0.5:9000/".to_string(),
            timeout_secs: None,
        };
        assert_eq!(service.endpoint_url(Endpoint::StyleTransfer), "http://10.0.0.5:9000/style-transfer");
        assert_eq!(ServiceConfig::default().endpoint_url(Endpoint::Detect), "http://localhost:8000/detect");
    }

    #[test]
    fn test_mismatched_response_shape_rejected() {
        let mut config = ScreenConfig::object_detection();
        config.response = ResponseShape::Blob;
        assert!(matches!(config.validate(), Err(MediaError::Config(_))));
    }

    #[test]
    fn test_invalid_service_url_rejected() {
        let service = ServiceConfig {
            base_url: "ftp://example.com".to_string(),
            timeout_secs: None,
        };
        assert!(service.validate().is_err());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "service": {{ "base_url": "http://processing:8000", "timeout_secs": 30 }},
                "image_editor": {{
                    "name": "image_editor",
                    "accept": "image/png,image/jpeg",
                    "max_bytes": 2048,
                    "endpoint": "adjust",
                    "response": "blob",
                    "download_prefix": "processed",
                    "failure_message": "nope",
                    "allow_camera": false,
                    "allow_recording": false,
                    "max_canvas": {{ "width": 640, "height": 480 }}
                }}
            }}"#
        )
        .unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.service.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.image_editor.max_bytes, 2048);
        assert!(!config.image_editor.accept.accepts("image/gif"));
        assert_eq!(config.object_detection, ScreenConfig::object_detection());
    }

    #[test]
    fn test_load_rejects_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(EngineConfig::load(file.path()), Err(MediaError::Config(_))));
    }
}
