//! Playback mirroring between the original and processed video surfaces
//!
//! Surfaces are treated as actors: they report [`TransportEvent`]s and receive
//! [`TransportCommand`]s. Every command the synchronizer sends is expected to
//! come back as an event from its target; those echoes are counted per surface
//! and per kind and swallowed, so mirroring never ping-pongs.
//!
//! Play and pause go both ways. Position only flows original → processed.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceId {
    Original,
    Processed,
}

impl SurfaceId {
    pub fn other(&self) -> SurfaceId {
        match self {
            SurfaceId::Original => SurfaceId::Processed,
            SurfaceId::Processed => SurfaceId::Original,
        }
    }

    fn index(&self) -> usize {
        match self {
            SurfaceId::Original => 0,
            SurfaceId::Processed => 1,
        }
    }
}

/// Something a surface reported
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TransportEvent {
    Play(SurfaceId),
    Pause(SurfaceId),
    /// Periodic position report, in seconds
    TimeUpdate { surface: SurfaceId, position: f64 },
}

/// Something a surface should do
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TransportCommand {
    Play(SurfaceId),
    Pause(SurfaceId),
    Seek { surface: SurfaceId, position: f64 },
}

impl TransportCommand {
    pub fn target(&self) -> SurfaceId {
        match self {
            TransportCommand::Play(s) | TransportCommand::Pause(s) => *s,
            TransportCommand::Seek { surface, .. } => *surface,
        }
    }
}

/// A video element the synchronizer can drive
pub trait PlaybackSurface {
    fn play(&mut self);
    fn pause(&mut self);
    fn seek(&mut self, position: f64);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Play,
    Pause,
}

impl Kind {
    fn index(&self) -> usize {
        match self {
            Kind::Play => 0,
            Kind::Pause => 1,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct PlaybackSynchronizer {
    attached: bool,
    playing: [bool; 2],
    /// Echoes still expected, by surface then kind
    pending: [[u32; 2]; 2],
    processed_position: Option<f64>,
}

impl PlaybackSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn is_playing(&self, surface: SurfaceId) -> bool {
        self.playing[surface.index()]
    }

    /// A processed video appeared
    pub fn attach(&mut self) {
        self.clear_processed();
        self.attached = true;
        debug!("Processed surface attached");
    }

    /// The processed video went away
    pub fn detach(&mut self) {
        if self.attached {
            debug!("Processed surface detached");
        }
        self.clear_processed();
        self.attached = false;
    }

    /// New media on the original surface: forget both surfaces' transport state
    pub fn reset(&mut self) {
        self.playing = [false; 2];
        self.pending = [[0; 2]; 2];
        self.processed_position = None;
        self.attached = false;
    }

    fn clear_processed(&mut self) {
        let idx = SurfaceId::Processed.index();
        self.playing[idx] = false;
        self.pending[idx] = [0; 2];
        self.processed_position = None;
    }

    /// Feed one event; returns the command to mirror, if any
    pub fn on_event(&mut self, event: TransportEvent) -> Option<TransportCommand> {
        match event {
            TransportEvent::Play(from) => self.on_transport(from, Kind::Play),
            TransportEvent::Pause(from) => self.on_transport(from, Kind::Pause),
            TransportEvent::TimeUpdate { surface: SurfaceId::Processed, position } => {
                if self.attached {
                    self.processed_position = Some(position);
                }
                None
            }
            TransportEvent::TimeUpdate { surface: SurfaceId::Original, position } => {
                if !self.attached || self.processed_position == Some(position) {
                    return None;
                }
                self.processed_position = Some(position);
                Some(TransportCommand::Seek { surface: SurfaceId::Processed, position })
            }
        }
    }

    fn on_transport(&mut self, from: SurfaceId, kind: Kind) -> Option<TransportCommand> {
        if from == SurfaceId::Processed && !self.attached {
            return None;
        }
        let playing = kind == Kind::Play;
        self.playing[from.index()] = playing;

        let expected = &mut self.pending[from.index()][kind.index()];
        if *expected > 0 {
            *expected -= 1;
            trace!("Swallowed {:?} echo from {:?}", kind, from);
            return None;
        }

        let to = from.other();
        if !self.attached || self.playing[to.index()] == playing {
            return None;
        }
        self.playing[to.index()] = playing;
        self.pending[to.index()][kind.index()] += 1;
        Some(match kind {
            Kind::Play => TransportCommand::Play(to),
            Kind::Pause => TransportCommand::Pause(to),
        })
    }

    /// Feed an event and apply the resulting command to the right surface
    pub fn drive<'a>(
        &mut self,
        event: TransportEvent,
        original: &'a mut dyn PlaybackSurface,
        processed: &'a mut dyn PlaybackSurface,
    ) -> Option<TransportCommand> {
        let command = self.on_event(event)?;
        let surface = match command.target() {
            SurfaceId::Original => original,
            SurfaceId::Processed => processed,
        };
        match command {
            TransportCommand::Play(_) => surface.play(),
            TransportCommand::Pause(_) => surface.pause(),
            TransportCommand::Seek { position, .. } => surface.seek(position),
        }
        Some(command)
    }
}
