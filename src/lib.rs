//! media_workflow - client-side engine for media editing screens
//!
//! Acquire an image or video (upload, camera still, recording), tune
//! adjustments or pick a style, submit to the processing service over HTTP and
//! present the result: a processed download, mirrored playback, or a detection
//! overlay.

pub mod acquisition;
pub mod adjustment;
pub mod blob;
pub mod camera;
pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod overlay;
pub mod playback;
pub mod screen;
pub mod session;
pub mod validation;

pub use acquisition::{MediaAsset, MediaFile, MediaSource};
pub use adjustment::{AdjustmentVector, Parameter, Style, STYLE_CATALOG};
pub use blob::{MediaBlob, ObjectUrl, UrlRegistry};
pub use camera::{CameraDevice, CameraStream};
pub use client::{HttpProcessingClient, ProcessingRequest, ProcessingService};
pub use config::{EngineConfig, ScreenConfig, ScreenKind, ServiceConfig};
pub use error::{MediaError, Result};
pub use overlay::{Detection, Dimensions, OverlaySurface};
pub use playback::{PlaybackSurface, SurfaceId, TransportCommand, TransportEvent};
pub use screen::{Screen, ScreenEvent};
pub use session::{Completion, ProcessingOutput, ProcessingResult, SessionStatus};
