//! Processing session state machine
//!
//! ```text
//! Idle ──begin──▶ Submitting ──complete──▶ Succeeded | Failed
//!  ▲                  │                          │
//!  └── stale response ┘          begin ──────────┘ (back to Submitting)
//! ```
//!
//! Only one submission may be in flight. Each submission carries a [`Ticket`]
//! stamped with the asset generation it was made for; a response whose
//! generation is no longer current is dropped without touching the result.

use crate::blob::{MediaBlob, ObjectUrl};
use crate::overlay::Detection;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionStatus {
    #[default]
    Idle,
    Submitting,
    Succeeded,
    Failed,
}

/// What the service sent back, before it is attached to a screen
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingOutput {
    Media(MediaBlob),
    Detections(Vec<Detection>),
}

/// Result held by the session for the current asset
#[derive(Debug)]
pub enum ProcessingResult {
    Media {
        output: MediaBlob,
        url: ObjectUrl,
        suggested_file_name: String,
    },
    Detections(Vec<Detection>),
}

impl ProcessingResult {
    pub fn detections(&self) -> Option<&[Detection]> {
        match self {
            ProcessingResult::Detections(d) => Some(d),
            ProcessingResult::Media { .. } => None,
        }
    }

    pub fn output_url(&self) -> Option<&ObjectUrl> {
        match self {
            ProcessingResult::Media { url, .. } => Some(url),
            ProcessingResult::Detections(_) => None,
        }
    }
}

/// Handle for one in-flight submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    id: u64,
    generation: u64,
}

impl Ticket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// How a completion was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied(SessionStatus),
    /// Response belonged to a superseded asset or an unknown ticket
    Discarded,
}

#[derive(Debug, Default)]
pub struct ProcessingSession {
    status: SessionStatus,
    in_flight: Option<Ticket>,
    issued: u64,
    result: Option<ProcessingResult>,
    error: Option<String>,
}

impl ProcessingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn result(&self) -> Option<&ProcessingResult> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn in_flight(&self) -> Option<Ticket> {
        self.in_flight
    }

    /// Start a submission for `generation`. `None` while one is in flight.
    pub fn begin(&mut self, generation: u64) -> Option<Ticket> {
        if self.status == SessionStatus::Submitting {
            debug!("Submission already in flight, ignoring");
            return None;
        }
        self.issued += 1;
        let ticket = Ticket { id: self.issued, generation };
        self.in_flight = Some(ticket);
        self.status = SessionStatus::Submitting;
        self.error = None;
        debug!("Submission #{} started for generation {}", ticket.id, generation);
        Some(ticket)
    }

    /// Resolve the in-flight submission.
    ///
    /// `build` turns the raw output into a held result and only runs when the
    /// response is still current.
    pub fn complete<F>(
        &mut self,
        ticket: Ticket,
        current_generation: u64,
        outcome: Result<ProcessingOutput, String>,
        build: F,
    ) -> Completion
    where
        F: FnOnce(ProcessingOutput) -> ProcessingResult,
    {
        if self.in_flight != Some(ticket) {
            warn!("Completion for unknown submission #{} ignored", ticket.id);
            return Completion::Discarded;
        }
        self.in_flight = None;

        if ticket.generation != current_generation {
            info!(
                "Discarding response for stale generation {} (current {})",
                ticket.generation, current_generation
            );
            self.status = SessionStatus::Idle;
            return Completion::Discarded;
        }

        match outcome {
            Ok(output) => {
                // Replacing the old result drops its object URL.
                self.result = Some(build(output));
                self.status = SessionStatus::Succeeded;
                info!("Submission #{} succeeded", ticket.id);
            }
            Err(message) => {
                warn!("Submission #{} failed: {}", ticket.id, message);
                self.error = Some(message);
                self.status = SessionStatus::Failed;
            }
        }
        Completion::Applied(self.status)
    }

    /// New media arrived: drop the result and error.
    ///
    /// An in-flight submission stays in flight; its response will be
    /// discarded as stale when it lands.
    pub fn invalidate(&mut self) {
        self.result = None;
        self.error = None;
        if self.status != SessionStatus::Submitting {
            self.status = SessionStatus::Idle;
        }
    }

    /// Record an error that never reached the network
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Release everything held; used on teardown
    pub fn reset(&mut self) {
        self.result = None;
        self.error = None;
        self.in_flight = None;
        self.status = SessionStatus::Idle;
    }
}
