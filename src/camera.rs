//! Camera access: still capture and live recording
//!
//! The camera stream is held through a [`StreamGuard`]. Stop, cancel and
//! teardown all funnel into `StreamGuard::release`, which stops every track
//! once and is a no-op afterwards.

use crate::blob::MediaBlob;
use crate::error::{MediaError, Result};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;
use tracing::{debug, info};

pub const STILL_FILE_NAME: &str = "webcam-capture.jpg";
pub const STILL_MIME: &str = "image/jpeg";
pub const RECORDING_FILE_NAME: &str = "recorded-video.webm";
pub const RECORDING_MIME: &str = "video/webm";

/// Source of camera streams
#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// Request access and open a live stream.
    ///
    /// Refusal surfaces as [`MediaError::PermissionDenied`].
    async fn open(&self) -> Result<Box<dyn CameraStream>>;
}

/// An open camera stream made of one or more tracks
pub trait CameraStream: Send {
    fn track_count(&self) -> usize;
    fn stop_track(&mut self, index: usize);
    /// Current viewfinder frame
    fn grab_frame(&mut self) -> Result<RgbImage>;
}

/// Exclusive hold on a camera stream
pub struct StreamGuard {
    stream: Option<Box<dyn CameraStream>>,
}

impl StreamGuard {
    pub fn new(stream: Box<dyn CameraStream>) -> Self {
        Self { stream: Some(stream) }
    }

    pub async fn acquire(device: &dyn CameraDevice) -> Result<Self> {
        let stream = device.open().await?;
        info!("📷 Camera stream opened ({} tracks)", stream.track_count());
        Ok(Self::new(stream))
    }

    pub fn is_active(&self) -> bool {
        self.stream.is_some()
    }

    pub fn stream_mut(&mut self) -> Result<&mut (dyn CameraStream + 'static)> {
        self.stream.as_deref_mut().ok_or(MediaError::CameraInactive)
    }

    /// Stop every track. Returns false if already released.
    pub fn release(&mut self) -> bool {
        let Some(mut stream) = self.stream.take() else {
            return false;
        };
        let tracks = stream.track_count();
        for index in 0..tracks {
            stream.stop_track(index);
        }
        info!("📷 Camera stream released ({} tracks stopped)", tracks);
        true
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Live viewfinder for still capture
pub struct Viewfinder {
    guard: StreamGuard,
}

impl Viewfinder {
    pub async fn open(device: &dyn CameraDevice) -> Result<Self> {
        Ok(Self {
            guard: StreamGuard::acquire(device).await?,
        })
    }

    pub fn is_open(&self) -> bool {
        self.guard.is_active()
    }

    /// Grab the current frame as a JPEG and close the viewfinder
    pub fn capture(&mut self) -> Result<MediaBlob> {
        let frame = self.guard.stream_mut()?.grab_frame()?;
        let jpeg = encode_jpeg(frame)?;
        self.guard.release();
        debug!("Captured still ({} bytes)", jpeg.len());
        Ok(MediaBlob::new(STILL_FILE_NAME, STILL_MIME, jpeg))
    }

    pub fn cancel(&mut self) {
        self.guard.release();
    }
}

fn encode_jpeg(frame: RgbImage) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(frame)
        .write_to(&mut out, ImageFormat::Jpeg)
        .map_err(|e| MediaError::Codec(format!("Failed to encode frame: {}", e)))?;
    Ok(out.into_inner())
}

/// Chunked recording from a camera stream
///
/// Every non-empty chunk pushed before [`Recorder::stop`] is part of the
/// output, in arrival order. Chunks pushed after stop are dropped.
pub struct Recorder {
    guard: StreamGuard,
    chunks: Vec<Vec<u8>>,
    stopped: bool,
}

impl Recorder {
    pub async fn start(device: &dyn CameraDevice) -> Result<Self> {
        let guard = StreamGuard::acquire(device).await?;
        info!("⏺ Recording started");
        Ok(Self {
            guard,
            chunks: Vec::new(),
            stopped: false,
        })
    }

    pub fn is_recording(&self) -> bool {
        !self.stopped
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Accept one data chunk from the recorder
    pub fn push_chunk(&mut self, chunk: Vec<u8>) {
        if self.stopped {
            debug!("Dropping {} byte chunk after stop", chunk.len());
            return;
        }
        if chunk.is_empty() {
            return;
        }
        self.chunks.push(chunk);
    }

    /// Join the chunks into one video and release the camera
    pub fn stop(&mut self) -> Result<MediaBlob> {
        if self.stopped {
            return Err(MediaError::CameraInactive);
        }
        self.stopped = true;
        self.guard.release();

        let chunks = std::mem::take(&mut self.chunks);
        let count = chunks.len();
        let video = chunks.concat();
        info!("⏹ Recording stopped: {} chunks, {} bytes", count, video.len());

        Ok(MediaBlob::new(RECORDING_FILE_NAME, RECORDING_MIME, video))
    }

    /// Stop without producing output
    pub fn cancel(&mut self) {
        self.stopped = true;
        self.chunks.clear();
        self.guard.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakeStream {
        tracks: usize,
        stops: Arc<AtomicUsize>,
    }

    impl CameraStream for FakeStream {
        fn track_count(&self) -> usize {
            self.tracks
        }

        fn stop_track(&mut self, _index: usize) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }

        fn grab_frame(&mut self) -> Result<RgbImage> {
            Ok(RgbImage::from_pixel(4, 3, image::Rgb([200, 10, 10])))
        }
    }

    struct FakeCamera {
        tracks: usize,
        stops: Arc<AtomicUsize>,
        deny: bool,
    }

    impl FakeCamera {
        fn new(tracks: usize) -> Self {
            Self { tracks, stops: Arc::new(AtomicUsize::new(0)), deny: false }
        }
    }

    #[async_trait]
    impl CameraDevice for FakeCamera {
        async fn open(&self) -> Result<Box<dyn CameraStream>> {
            if self.deny {
                return Err(MediaError::PermissionDenied("NotAllowedError".to_string()));
            }
            Ok(Box::new(FakeStream { tracks: self.tracks, stops: Arc::clone(&self.stops) }))
        }
    }

    #[tokio::test]
    async fn test_stop_with_zero_chunks_releases_every_track() {
        let camera = FakeCamera::new(2);
        let mut recorder = Recorder::start(&camera).await.unwrap();

        let blob = recorder.stop().unwrap();
        assert!(blob.is_empty());
        assert_eq!(blob.name(), RECORDING_FILE_NAME);
        assert_eq!(blob.mime_type(), RECORDING_MIME);
        assert_eq!(camera.stops.load(Ordering::SeqCst), 2);

        drop(recorder);
        assert_eq!(camera.stops.load(Ordering::SeqCst), 2, "release must be idempotent");
    }

    #[tokio::test]
    async fn test_chunks_before_stop_are_joined_in_order() {
        let camera = FakeCamera::new(1);
        let mut recorder = Recorder::start(&camera).await.unwrap();
        recorder.push_chunk(vec![1, 2]);
        recorder.push_chunk(vec![]);
        recorder.push_chunk(vec![3]);
        assert_eq!(recorder.chunk_count(), 2);

        let blob = recorder.stop().unwrap();
        recorder.push_chunk(vec![4]);
        assert_eq!(blob.bytes(), &[1, 2, 3]);
        assert_eq!(recorder.chunk_count(), 0);
        assert!(matches!(recorder.stop(), Err(MediaError::CameraInactive)));
    }

    #[tokio::test]
    async fn test_permission_denied() {
        let mut camera = FakeCamera::new(1);
        camera.deny = true;
        assert!(matches!(Recorder::start(&camera).await, Err(MediaError::PermissionDenied(_))));
        assert!(matches!(Viewfinder::open(&camera).await, Err(MediaError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn test_capture_encodes_jpeg_and_closes() {
        let camera = FakeCamera::new(1);
        let mut viewfinder = Viewfinder::open(&camera).await.unwrap();
        let blob = viewfinder.capture().unwrap();

        assert_eq!(blob.name(), STILL_FILE_NAME);
        assert_eq!(blob.mime_type(), STILL_MIME);
        assert_eq!(&blob.bytes()[..2], &[0xFF, 0xD8]);
        assert!(!viewfinder.is_open());
        assert_eq!(camera.stops.load(Ordering::SeqCst), 1);

        assert!(matches!(viewfinder.capture(), Err(MediaError::CameraInactive)));
    }

    #[tokio::test]
    async fn test_cancel_twice_is_safe() {
        let camera = FakeCamera::new(3);
        let mut viewfinder = Viewfinder::open(&camera).await.unwrap();
        viewfinder.cancel();
        viewfinder.cancel();
        drop(viewfinder);
        assert_eq!(camera.stops.load(Ordering::SeqCst), 3);
    }
}
