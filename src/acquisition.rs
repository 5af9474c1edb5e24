//! Media acquisition
//!
//! Uploads, camera stills and recordings all end up as one [`PreparedMedia`]
//! after passing the screen's MIME and size constraints. Turning that into the
//! screen's active [`MediaAsset`] (new preview URL, next generation) is the
//! screen's job, so a rejected file never touches existing state.

use crate::blob::{MediaBlob, ObjectUrl};
use crate::config::ScreenConfig;
use crate::error::{MediaError, Result};
use crate::overlay::Dimensions;
use crate::validation::{detect_mime, validate_file, MimeClass};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info, warn};

/// A file handed over by the picker or a drop
#[derive(Debug, Clone, PartialEq)]
pub struct MediaFile {
    pub name: String,
    /// Type as declared by the picker; sniffed from the bytes when absent
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl MediaFile {
    pub fn new(name: impl Into<String>, mime_type: Option<&str>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.map(str::to_string),
            bytes,
        }
    }

    /// Read a file from disk; its type is sniffed from content
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self { name, mime_type: None, bytes })
    }
}

/// How a piece of media entered the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionOrigin {
    Upload,
    CameraStill,
    Recording,
}

/// Input to `acquire`
#[derive(Debug, Clone)]
pub enum MediaSource {
    /// Files from the picker or a drop; exactly one is allowed
    Files(Vec<MediaFile>),
    CameraStill(MediaBlob),
    Recording(MediaBlob),
}

impl MediaSource {
    pub fn file(file: MediaFile) -> Self {
        MediaSource::Files(vec![file])
    }
}

/// Validated media, not yet installed on a screen
#[derive(Debug, Clone)]
pub struct PreparedMedia {
    pub blob: MediaBlob,
    pub class: MimeClass,
    pub natural_size: Option<Dimensions>,
    pub origin: AcquisitionOrigin,
}

/// Validate a source against the screen's constraints.
///
/// Returns `Ok(None)` for an empty drop.
pub fn prepare(config: &ScreenConfig, source: MediaSource) -> Result<Option<PreparedMedia>> {
    let (blob, origin) = match source {
        MediaSource::Files(mut files) => {
            if files.len() > 1 {
                warn!("Rejected drop of {} files on {}", files.len(), config.name);
                return Err(MediaError::UnsupportedMedia(
                    "Only one file can be selected".to_string(),
                ));
            }
            let Some(file) = files.pop() else {
                debug!("Empty drop on {}", config.name);
                return Ok(None);
            };
            let mime = detect_mime(file.mime_type.as_deref(), &file.bytes);
            validate_file(&config.accept, config.max_bytes, mime.as_deref(), file.bytes.len() as u64)
                .inspect_err(|e| warn!("Rejected {} on {}: {}", file.name, config.name, e))?;
            let mime = mime.unwrap_or_default();
            (MediaBlob::new(file.name, mime, file.bytes), AcquisitionOrigin::Upload)
        }
        MediaSource::CameraStill(blob) => (blob, AcquisitionOrigin::CameraStill),
        MediaSource::Recording(blob) => (blob, AcquisitionOrigin::Recording),
    };

    let class = validate_file(&config.accept, config.max_bytes, Some(blob.mime_type()), blob.len())
        .inspect_err(|e| warn!("Rejected {} on {}: {}", blob.name(), config.name, e))?;

    let natural_size = match class {
        MimeClass::Image => probe_image_size(blob.bytes()),
        MimeClass::Video => None,
    };

    info!(
        "Accepted {} ({}, {} bytes) on {}",
        blob.name(),
        blob.mime_type(),
        blob.len(),
        config.name
    );

    Ok(Some(PreparedMedia { blob, class, natural_size, origin }))
}

/// Read image dimensions from the header without a full decode
pub fn probe_image_size(bytes: &[u8]) -> Option<Dimensions> {
    let reader = image::ImageReader::new(Cursor::new(bytes)).with_guessed_format().ok()?;
    let (width, height) = reader.into_dimensions().ok()?;
    Some(Dimensions::new(width, height))
}

/// The screen's active media
#[derive(Debug)]
pub struct MediaAsset {
    blob: MediaBlob,
    class: MimeClass,
    preview: ObjectUrl,
    natural_size: Option<Dimensions>,
    origin: AcquisitionOrigin,
    generation: u64,
}

impl MediaAsset {
    pub(crate) fn new(prepared: PreparedMedia, preview: ObjectUrl, generation: u64) -> Self {
        Self {
            blob: prepared.blob,
            class: prepared.class,
            preview,
            natural_size: prepared.natural_size,
            origin: prepared.origin,
            generation,
        }
    }

    pub fn blob(&self) -> &MediaBlob {
        &self.blob
    }

    pub fn name(&self) -> &str {
        self.blob.name()
    }

    pub fn mime_type(&self) -> &str {
        self.blob.mime_type()
    }

    pub fn class(&self) -> MimeClass {
        self.class
    }

    pub fn preview(&self) -> &ObjectUrl {
        &self.preview
    }

    /// Known for decodable images up front, for video only after metadata load
    pub fn natural_size(&self) -> Option<Dimensions> {
        self.natural_size
    }

    pub(crate) fn set_natural_size(&mut self, size: Dimensions) {
        self.natural_size = Some(size);
    }

    pub fn origin(&self) -> AcquisitionOrigin {
        self.origin
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
