//! Processing service client
//!
//! Screens talk to the backend through [`ProcessingService`]. The HTTP
//! implementation posts multipart forms to the three endpoints; tests and
//! offline runs can plug in anything else that implements the trait.

use crate::adjustment::AdjustmentVector;
use crate::blob::MediaBlob;
use crate::config::{Endpoint, ServiceConfig};
use crate::error::{MediaError, Result};
use crate::overlay::Detection;
use crate::session::ProcessingOutput;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, info, warn};

const FALLBACK_MIME: &str = "application/octet-stream";

/// One submission to the processing service
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingRequest {
    Adjust { media: MediaBlob, params: AdjustmentVector },
    StyleTransfer { content: MediaBlob, style: String },
    Detect { media: MediaBlob },
}

impl ProcessingRequest {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            ProcessingRequest::Adjust { .. } => Endpoint::Adjust,
            ProcessingRequest::StyleTransfer { .. } => Endpoint::StyleTransfer,
            ProcessingRequest::Detect { .. } => Endpoint::Detect,
        }
    }

    /// The media being submitted
    pub fn media(&self) -> &MediaBlob {
        match self {
            ProcessingRequest::Adjust { media, .. } => media,
            ProcessingRequest::StyleTransfer { content, .. } => content,
            ProcessingRequest::Detect { media } => media,
        }
    }
}

/// Backend that turns media into a processed result
#[async_trait]
pub trait ProcessingService: Send + Sync {
    /// Any failure (transport, status, payload) is a [`MediaError::SubmissionFailed`]
    async fn process(&self, request: ProcessingRequest) -> Result<ProcessingOutput>;
}

#[derive(Deserialize)]
struct DetectResponse {
    results: Vec<Detection>,
}

/// reqwest-backed client for the processing service
pub struct HttpProcessingClient {
    http: reqwest::Client,
    service: ServiceConfig,
}

impl HttpProcessingClient {
    pub fn new(service: ServiceConfig) -> Result<Self> {
        service.validate()?;
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = service.timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| MediaError::Config(format!("Failed to build HTTP client: {}", e)))?;
        info!("🌐 Processing service at {}", service.base_url);
        Ok(Self { http, service })
    }

    pub fn service(&self) -> &ServiceConfig {
        &self.service
    }

    fn form(request: &ProcessingRequest) -> Result<Form> {
        let form = match request {
            ProcessingRequest::Adjust { media, params } => {
                let params = params
                    .to_json()
                    .map_err(|e| MediaError::SubmissionFailed(format!("Failed to encode params: {}", e)))?;
                Form::new().part("file", file_part(media)?).text("params", params)
            }
            ProcessingRequest::StyleTransfer { content, style } => Form::new()
                .part("content_file", file_part(content)?)
                .text("style_name", style.clone()),
            ProcessingRequest::Detect { media } => Form::new().part("file", file_part(media)?),
        };
        Ok(form)
    }
}

fn file_part(blob: &MediaBlob) -> Result<Part> {
    let mime = if blob.mime_type().is_empty() {
        FALLBACK_MIME
    } else {
        blob.mime_type()
    };
    Part::bytes(blob.bytes().to_vec())
        .file_name(blob.name().to_string())
        .mime_str(mime)
        .map_err(|e| MediaError::SubmissionFailed(format!("Invalid MIME type {}: {}", mime, e)))
}

/// Media type from a Content-Type header value, without parameters
fn media_type(header: Option<&str>) -> Option<String> {
    let essence = header?.split(';').next()?.trim();
    if essence.is_empty() {
        None
    } else {
        Some(essence.to_ascii_lowercase())
    }
}

#[async_trait]
impl ProcessingService for HttpProcessingClient {
    async fn process(&self, request: ProcessingRequest) -> Result<ProcessingOutput> {
        let endpoint = request.endpoint();
        let url = self.service.endpoint_url(endpoint);
        let form = Self::form(&request)?;
        debug!("POST {} ({} bytes)", url, request.media().len());

        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| MediaError::SubmissionFailed(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            warn!("{} returned {}", url, status);
            return Err(MediaError::SubmissionFailed(format!("{} returned {}", url, status)));
        }

        let content_type = media_type(
            response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
        );
        let body = response
            .bytes()
            .await
            .map_err(|e| MediaError::SubmissionFailed(format!("Failed to read response: {}", e)))?;

        match endpoint {
            Endpoint::Detect => {
                let parsed: DetectResponse = serde_json::from_slice(&body)
                    .map_err(|e| MediaError::SubmissionFailed(format!("Malformed detection payload: {}", e)))?;
                info!("✅ {} detections from {}", parsed.results.len(), url);
                Ok(ProcessingOutput::Detections(parsed.results))
            }
            Endpoint::Adjust | Endpoint::StyleTransfer => {
                let media = request.media();
                let mime = content_type.unwrap_or_else(|| media.mime_type().to_string());
                info!("✅ {} returned {} bytes ({})", url, body.len(), mime);
                Ok(ProcessingOutput::Media(MediaBlob::new(media.name(), mime, body.to_vec())))
            }
        }
    }
}
