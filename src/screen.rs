//! The editing screen engine
//!
//! A [`Screen`] is one editing screen of the client: it owns the active media
//! asset, the adjustment state, the processing session, the camera, playback
//! mirroring and the detection overlay. What differs between the image,
//! video, style and detection screens is carried entirely by its
//! [`ScreenConfig`].
//!
//! Observers follow the screen through a broadcast channel of
//! [`ScreenEvent`]s and a watch channel holding the current
//! [`SessionStatus`].

use crate::acquisition::{prepare, MediaAsset, MediaSource};
use crate::adjustment::{AdjustmentState, AdjustmentVector, Parameter, Style};
use crate::blob::{MediaBlob, UrlRegistry};
use crate::camera::{CameraDevice, Recorder, Viewfinder};
use crate::client::{ProcessingRequest, ProcessingService};
use crate::config::{Endpoint, ResponseShape, ScreenConfig};
use crate::error::{MediaError, Result};
use crate::metrics::{Metrics, Timer};
use crate::overlay::{BoxPlacement, Dimensions, OverlayRenderer, OverlaySurface};
use crate::playback::{PlaybackSurface, PlaybackSynchronizer, TransportCommand, TransportEvent};
use crate::session::{Completion, ProcessingOutput, ProcessingResult, ProcessingSession, SessionStatus, Ticket};
use crate::validation::MimeClass;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 64;
pub const MISSING_STYLE_MESSAGE: &str = "Please select both an image and a style";

/// Notification for the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum ScreenEvent {
    MediaAcquired { generation: u64, name: String, class: MimeClass },
    StatusChanged(SessionStatus),
    AdjustmentsChanged(AdjustmentVector),
    StyleChanged(Option<&'static str>),
    /// The detection canvas must be redrawn
    OverlayInvalidated,
    PlaybackAttached,
    PlaybackDetached,
}

pub struct Screen {
    config: ScreenConfig,
    registry: Arc<UrlRegistry>,
    metrics: Arc<Metrics>,
    asset: Option<MediaAsset>,
    generation: u64,
    adjustments: AdjustmentState,
    session: ProcessingSession,
    submit_timer: Option<Timer>,
    viewfinder: Option<Viewfinder>,
    recorder: Option<Recorder>,
    playback: PlaybackSynchronizer,
    overlay: OverlayRenderer,
    events: broadcast::Sender<ScreenEvent>,
    status: watch::Sender<SessionStatus>,
}

impl Screen {
    pub fn new(config: ScreenConfig, registry: Arc<UrlRegistry>) -> Result<Self> {
        Self::with_metrics(config, registry, Metrics::new())
    }

    pub fn with_metrics(config: ScreenConfig, registry: Arc<UrlRegistry>, metrics: Arc<Metrics>) -> Result<Self> {
        config.validate()?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (status, _) = watch::channel(SessionStatus::Idle);
        info!("🖼  Screen {} ready (accepts {})", config.name, config.accept);
        Ok(Self {
            overlay: OverlayRenderer::new(config.max_canvas),
            config,
            registry,
            metrics,
            asset: None,
            generation: 0,
            adjustments: AdjustmentState::new(),
            session: ProcessingSession::new(),
            submit_timer: None,
            viewfinder: None,
            recorder: None,
            playback: PlaybackSynchronizer::new(),
            events,
            status,
        })
    }

    pub fn config(&self) -> &ScreenConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScreenEvent> {
        self.events.subscribe()
    }

    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    pub fn asset(&self) -> Option<&MediaAsset> {
        self.asset.as_ref()
    }

    /// Bumped on every successful acquisition
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn adjustments(&self) -> &AdjustmentVector {
        self.adjustments.vector()
    }

    pub fn style(&self) -> Option<&'static Style> {
        self.adjustments.style()
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }

    pub fn result(&self) -> Option<&ProcessingResult> {
        self.session.result()
    }

    pub fn error(&self) -> Option<&str> {
        self.session.error()
    }

    fn emit(&self, event: ScreenEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn publish_status(&self, previous: SessionStatus) {
        let current = self.session.status();
        if current != previous {
            self.status.send_replace(current);
            self.emit(ScreenEvent::StatusChanged(current));
        }
    }

    fn detach_playback(&mut self) {
        if self.playback.is_attached() {
            self.playback.detach();
            self.emit(ScreenEvent::PlaybackDetached);
        }
    }

    // ---- acquisition ----

    /// Install new media.
    ///
    /// On success the previous asset and result are released, adjustments go
    /// back to defaults and any in-flight response becomes stale. On error
    /// nothing changes. An empty drop returns `Ok(None)`.
    pub fn acquire(&mut self, source: MediaSource) -> Result<Option<&MediaAsset>> {
        let Some(prepared) = prepare(&self.config, source)? else {
            return Ok(None);
        };

        let previous = self.session.status();
        self.generation += 1;
        let preview = self.registry.create(&prepared.blob);
        let asset = MediaAsset::new(prepared, preview, self.generation);
        let (name, class) = (asset.name().to_string(), asset.class());

        // Replacing drops the old preview URL
        self.asset = Some(asset);
        self.adjustments.reset();
        self.session.invalidate();
        self.detach_playback();
        self.playback.reset();

        info!("📥 {} generation {}: {} ({})", self.config.name, self.generation, name, class.as_str());
        self.emit(ScreenEvent::MediaAcquired { generation: self.generation, name, class });
        self.emit(ScreenEvent::AdjustmentsChanged(*self.adjustments.vector()));
        self.emit(ScreenEvent::OverlayInvalidated);
        self.publish_status(previous);

        Ok(self.asset.as_ref())
    }

    /// The presentation layer finished loading the media and knows its size
    pub fn on_metadata_loaded(&mut self, size: Dimensions) {
        if let Some(asset) = self.asset.as_mut() {
            asset.set_natural_size(size);
            debug!("{}: natural size {}x{}", self.config.name, size.width, size.height);
            self.emit(ScreenEvent::OverlayInvalidated);
        }
    }

    // ---- adjustments ----

    pub fn set_parameter(&mut self, parameter: Parameter, value: f32) {
        self.adjustments.set_parameter(parameter, value);
        self.emit(ScreenEvent::AdjustmentsChanged(*self.adjustments.vector()));
    }

    pub fn reset_adjustments(&mut self) {
        self.adjustments.reset();
        self.emit(ScreenEvent::AdjustmentsChanged(*self.adjustments.vector()));
    }

    pub fn select_style(&mut self, id: &str) -> Result<&'static Style> {
        let style = self.adjustments.select_style(id)?;
        self.session.clear_error();
        self.emit(ScreenEvent::StyleChanged(Some(style.id)));
        Ok(style)
    }

    pub fn clear_style(&mut self) {
        self.adjustments.clear_style();
        self.emit(ScreenEvent::StyleChanged(None));
    }

    // ---- processing ----

    /// Start a submission and hand back the request to send.
    ///
    /// `Ok(None)` when there is nothing to submit or a submission is already
    /// in flight. A missing style fails with `ValidationFailed` and never
    /// reaches the network.
    pub fn begin_submit(&mut self) -> Result<Option<(Ticket, ProcessingRequest)>> {
        let Some(asset) = self.asset.as_ref() else {
            debug!("{}: submit without media ignored", self.config.name);
            self.metrics.record_skipped();
            return Ok(None);
        };
        let media = asset.blob().clone();

        if self.session.status() == SessionStatus::Submitting {
            debug!("{}: request already in flight", self.config.name);
            self.metrics.record_skipped();
            return Ok(None);
        }

        let style = self.adjustments.style();
        if self.config.requires_style() && style.is_none() {
            self.session.set_error(MISSING_STYLE_MESSAGE);
            return Err(MediaError::ValidationFailed(MISSING_STYLE_MESSAGE.to_string()));
        }

        let previous = self.session.status();
        let Some(ticket) = self.session.begin(self.generation) else {
            self.metrics.record_skipped();
            return Ok(None);
        };

        let request = match self.config.endpoint {
            Endpoint::Adjust => ProcessingRequest::Adjust {
                media,
                params: *self.adjustments.vector(),
            },
            Endpoint::StyleTransfer => ProcessingRequest::StyleTransfer {
                content: media,
                style: style.map(|s| s.id.to_string()).unwrap_or_default(),
            },
            Endpoint::Detect => ProcessingRequest::Detect { media },
        };

        self.metrics.record_submission();
        self.submit_timer = Some(Timer::new());
        info!(
            "🚀 {} submitting generation {} to {}",
            self.config.name,
            ticket.generation(),
            self.config.endpoint.path()
        );
        self.publish_status(previous);
        Ok(Some((ticket, request)))
    }

    /// Apply the response for `ticket`
    pub fn complete_submit(&mut self, ticket: Ticket, outcome: Result<ProcessingOutput>) -> Completion {
        let previous = self.session.status();
        let latency = self.submit_timer.take().map(|t| t.elapsed_ms()).unwrap_or(0);

        let outcome = match outcome {
            Ok(output) if self.accepts_output(&output) => Ok(output),
            Ok(_) => {
                warn!("{}: response shape does not match {:?}", self.config.name, self.config.response);
                Err(self.config.failure_message.clone())
            }
            Err(e) => {
                warn!("{}: submission failed: {}", self.config.name, e);
                Err(self.config.failure_message.clone())
            }
        };

        let registry = &self.registry;
        let suggested_file_name = self
            .asset
            .as_ref()
            .map(|a| format!("{}_{}", self.config.download_prefix, a.name()))
            .unwrap_or_else(|| self.config.download_prefix.clone());

        let completion = self.session.complete(ticket, self.generation, outcome, |output| match output {
            ProcessingOutput::Media(output) => ProcessingResult::Media {
                url: registry.create(&output),
                suggested_file_name,
                output,
            },
            ProcessingOutput::Detections(detections) => ProcessingResult::Detections(detections),
        });

        match completion {
            Completion::Applied(SessionStatus::Succeeded) => {
                self.metrics.record_outcome(true, latency);
                self.on_result_ready();
            }
            Completion::Applied(_) => self.metrics.record_outcome(false, latency),
            Completion::Discarded => self.metrics.record_discarded(),
        }
        self.publish_status(previous);
        completion
    }

    fn accepts_output(&self, output: &ProcessingOutput) -> bool {
        matches!(
            (self.config.response, output),
            (ResponseShape::Blob, ProcessingOutput::Media(_))
                | (ResponseShape::Detections, ProcessingOutput::Detections(_))
        )
    }

    fn on_result_ready(&mut self) {
        let is_video = self.asset.as_ref().map(|a| a.class()) == Some(MimeClass::Video);
        match self.session.result() {
            Some(ProcessingResult::Media { .. }) if is_video => {
                self.playback.attach();
                self.emit(ScreenEvent::PlaybackAttached);
            }
            Some(ProcessingResult::Detections(_)) => self.emit(ScreenEvent::OverlayInvalidated),
            _ => {}
        }
    }

    /// Begin, send and complete in one go
    pub async fn submit(&mut self, service: &dyn ProcessingService) -> Result<Option<Completion>> {
        let Some((ticket, request)) = self.begin_submit()? else {
            return Ok(None);
        };
        let outcome = service.process(request).await;
        Ok(Some(self.complete_submit(ticket, outcome)))
    }

    // ---- download ----

    /// The processed media under its download name
    pub fn download(&self) -> Option<MediaBlob> {
        match self.session.result()? {
            ProcessingResult::Media { output, suggested_file_name, .. } => {
                Some(output.renamed(suggested_file_name.as_str()))
            }
            ProcessingResult::Detections(_) => None,
        }
    }

    /// Write the processed media into `dir`
    pub async fn save_download(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let blob = self
            .download()
            .ok_or_else(|| MediaError::ValidationFailed("No processed media to download".to_string()))?;
        let path = dir.as_ref().join(blob.name());
        tokio::fs::write(&path, blob.bytes()).await?;
        info!("💾 Saved {} ({} bytes)", path.display(), blob.len());
        Ok(path)
    }

    // ---- camera ----

    pub fn camera_open(&self) -> bool {
        self.viewfinder.as_ref().is_some_and(|v| v.is_open())
    }

    /// Show the live viewfinder
    pub async fn open_camera(&mut self, device: &dyn CameraDevice) -> Result<()> {
        if !self.config.allow_camera {
            return Err(MediaError::ValidationFailed(format!(
                "Camera capture is not available on {}",
                self.config.name
            )));
        }
        if self.camera_open() {
            return Ok(());
        }
        if self.is_recording() {
            return Err(MediaError::RecordingInProgress);
        }
        self.viewfinder = Some(Viewfinder::open(device).await?);
        Ok(())
    }

    /// Take a still from the viewfinder and acquire it
    pub fn capture_still(&mut self) -> Result<Option<&MediaAsset>> {
        let mut viewfinder = self.viewfinder.take().ok_or(MediaError::CameraInactive)?;
        let blob = viewfinder.capture()?;
        self.acquire(MediaSource::CameraStill(blob))
    }

    pub fn cancel_camera(&mut self) {
        if let Some(mut viewfinder) = self.viewfinder.take() {
            viewfinder.cancel();
        }
    }

    // ---- recording ----

    pub fn is_recording(&self) -> bool {
        self.recorder.as_ref().is_some_and(|r| r.is_recording())
    }

    pub async fn start_recording(&mut self, device: &dyn CameraDevice) -> Result<()> {
        if !self.config.allow_recording {
            return Err(MediaError::ValidationFailed(format!(
                "Recording is not available on {}",
                self.config.name
            )));
        }
        if self.is_recording() {
            return Err(MediaError::RecordingInProgress);
        }
        self.cancel_camera();
        self.recorder = Some(Recorder::start(device).await?);
        Ok(())
    }

    /// Hand a recorded chunk to the active recorder
    pub fn record_chunk(&mut self, chunk: Vec<u8>) {
        match self.recorder.as_mut() {
            Some(recorder) => recorder.push_chunk(chunk),
            None => debug!("{}: chunk with no recorder dropped", self.config.name),
        }
    }

    /// Finish recording and acquire the video
    pub fn stop_recording(&mut self) -> Result<Option<&MediaAsset>> {
        let mut recorder = self.recorder.take().ok_or(MediaError::CameraInactive)?;
        let video = recorder.stop()?;
        self.acquire(MediaSource::Recording(video))
    }

    // ---- overlay ----

    /// Canvas size the overlay will use for the current asset
    pub fn overlay_canvas(&self) -> Result<Dimensions> {
        self.overlay.canvas_for(self.natural_size()?)
    }

    fn natural_size(&self) -> Result<Dimensions> {
        let asset = self
            .asset
            .as_ref()
            .ok_or_else(|| MediaError::ValidationFailed("No media selected".to_string()))?;
        asset
            .natural_size()
            .ok_or_else(|| MediaError::ValidationFailed("Media dimensions are not known yet".to_string()))
    }

    /// Draw the source and current detections onto `surface`
    pub fn render_overlay(&self, surface: &mut dyn OverlaySurface) -> Result<Vec<BoxPlacement>> {
        let natural = self.natural_size()?;
        let detections = self
            .session
            .result()
            .and_then(ProcessingResult::detections)
            .unwrap_or_default();
        self.overlay.render(surface, natural, detections)
    }

    // ---- playback ----

    pub fn playback(&self) -> &PlaybackSynchronizer {
        &self.playback
    }

    pub fn playback_event(&mut self, event: TransportEvent) -> Option<TransportCommand> {
        self.playback.on_event(event)
    }

    pub fn drive_playback<'a>(
        &mut self,
        event: TransportEvent,
        original: &'a mut dyn PlaybackSurface,
        processed: &'a mut dyn PlaybackSurface,
    ) -> Option<TransportCommand> {
        self.playback.drive(event, original, processed)
    }

    // ---- teardown ----

    /// Release the camera, every object URL and the session state
    pub fn teardown(&mut self) {
        self.cancel_camera();
        if let Some(mut recorder) = self.recorder.take() {
            recorder.cancel();
        }
        let previous = self.session.status();
        self.session.reset();
        self.detach_playback();
        if self.asset.take().is_some() {
            debug!("{}: torn down", self.config.name);
        }
        self.publish_status(previous);
    }
}

impl Drop for Screen {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::MediaFile;
    use crate::overlay::Detection;

    fn jpeg(name: &str) -> MediaSource {
        MediaSource::file(MediaFile::new(name, Some("image/jpeg"), vec![0xFF, 0xD8, 0xFF, 0xE0]))
    }

    fn detection_screen() -> Screen {
        Screen::new(ScreenConfig::object_detection(), UrlRegistry::new()).unwrap()
    }

    #[test]
    fn test_acquire_resets_and_bumps_generation() {
        let registry = UrlRegistry::new();
        let mut screen = Screen::new(ScreenConfig::image_editor(), Arc::clone(&registry)).unwrap();

        screen.acquire(jpeg("a.jpg")).unwrap();
        screen.set_parameter(Parameter::Hue, 0.4);
        screen.acquire(jpeg("b.jpg")).unwrap();

        assert_eq!(screen.generation(), 2);
        assert!(screen.adjustments().is_default());
        assert_eq!(screen.asset().unwrap().name(), "b.jpg");
        assert_eq!(registry.live_count(), 1);
        assert_eq!(registry.released_count(), 1);
    }

    #[test]
    fn test_rejected_file_leaves_state() {
        let mut screen = Screen::new(ScreenConfig::image_editor(), UrlRegistry::new()).unwrap();
        screen.acquire(jpeg("a.jpg")).unwrap();
        screen.set_parameter(Parameter::Brightness, 1.5);

        let clip = MediaSource::file(MediaFile::new("c.mp4", Some("video/mp4"), vec![0; 8]));
        assert!(matches!(screen.acquire(clip), Err(MediaError::UnsupportedMedia(_))));
        assert_eq!(screen.generation(), 1);
        assert_eq!(screen.adjustments().brightness, 1.5);
    }

    #[test]
    fn test_style_required_before_submit() {
        let mut screen = Screen::new(ScreenConfig::style_transfer(), UrlRegistry::new()).unwrap();
        screen.acquire(jpeg("a.jpg")).unwrap();

        assert!(matches!(screen.begin_submit(), Err(MediaError::ValidationFailed(_))));
        assert_eq!(screen.status(), SessionStatus::Idle);
        assert_eq!(screen.error(), Some(MISSING_STYLE_MESSAGE));

        screen.select_style("monet").unwrap();
        let (_, request) = screen.begin_submit().unwrap().unwrap();
        assert!(matches!(request, ProcessingRequest::StyleTransfer { ref style, .. } if style == "monet"));
    }

    #[test]
    fn test_submit_without_media_is_noop() {
        let mut screen = Screen::new(ScreenConfig::image_editor(), UrlRegistry::new()).unwrap();
        assert!(screen.begin_submit().unwrap().is_none());
        assert_eq!(screen.metrics().snapshot().skipped, 1);
    }

    #[test]
    fn test_wrong_response_shape_fails() {
        let mut screen = detection_screen();
        screen.acquire(jpeg("a.jpg")).unwrap();
        let (ticket, _) = screen.begin_submit().unwrap().unwrap();

        let blob = MediaBlob::new("x.png", "image/png", vec![1]);
        let completion = screen.complete_submit(ticket, Ok(ProcessingOutput::Media(blob)));
        assert_eq!(completion, Completion::Applied(SessionStatus::Failed));
        assert_eq!(screen.error(), Some("Failed to process detection. Please try again."));
    }

    #[test]
    fn test_render_needs_dimensions() {
        let mut screen = detection_screen();
        let mut surface = crate::overlay::CommandSurface::new();
        assert!(screen.render_overlay(&mut surface).is_err());

        let clip = MediaSource::file(MediaFile::new("c.mp4", Some("video/mp4"), vec![0; 8]));
        screen.acquire(clip).unwrap();
        assert!(matches!(screen.render_overlay(&mut surface), Err(MediaError::ValidationFailed(_))));

        screen.on_metadata_loaded(Dimensions::new(1600, 900));
        assert_eq!(screen.overlay_canvas().unwrap(), Dimensions::new(800, 450));

        let (ticket, _) = screen.begin_submit().unwrap().unwrap();
        let hits = vec![Detection { bbox: [160.0, 90.0, 320.0, 180.0], class_label: "car".into(), confidence: 0.9 }];
        screen.complete_submit(ticket, Ok(ProcessingOutput::Detections(hits)));

        let placements = screen.render_overlay(&mut surface).unwrap();
        assert_eq!(placements.len(), 1);
        assert_eq!(placements[0].rect.x, 80.0);
        assert_eq!(placements[0].rect.width, 80.0);
    }

    #[test]
    fn test_status_watch_follows_session() {
        let mut screen = Screen::new(ScreenConfig::image_editor(), UrlRegistry::new()).unwrap();
        let status = screen.watch_status();
        screen.acquire(jpeg("a.jpg")).unwrap();

        let (ticket, _) = screen.begin_submit().unwrap().unwrap();
        assert_eq!(*status.borrow(), SessionStatus::Submitting);

        screen.complete_submit(ticket, Err(MediaError::SubmissionFailed("503".into())));
        assert_eq!(*status.borrow(), SessionStatus::Failed);
    }

    #[test]
    fn test_teardown_releases_everything() {
        let registry = UrlRegistry::new();
        let mut screen = Screen::new(ScreenConfig::image_editor(), Arc::clone(&registry)).unwrap();
        screen.acquire(jpeg("a.jpg")).unwrap();
        let (ticket, _) = screen.begin_submit().unwrap().unwrap();
        let out = MediaBlob::new("a.jpg", "image/jpeg", vec![9]);
        screen.complete_submit(ticket, Ok(ProcessingOutput::Media(out)));
        assert_eq!(registry.live_count(), 2);

        drop(screen);
        assert_eq!(registry.live_count(), 0);
        assert_eq!(registry.created_count(), registry.released_count());
    }
}
