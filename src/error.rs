use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Unsupported media: {0}")]
    UnsupportedMedia(String),

    #[error("File too large: {size} bytes exceeds the {limit} byte limit")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Camera permission denied: {0}")]
    PermissionDenied(String),

    #[error("Submission failed: {0}")]
    SubmissionFailed(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("A recording is already in progress")]
    RecordingInProgress,

    #[error("No active camera stream")]
    CameraInactive,

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Acquisition-time errors leave the screen untouched and are reported immediately.
    pub fn is_acquisition_error(&self) -> bool {
        matches!(
            self,
            MediaError::UnsupportedMedia(_)
                | MediaError::FileTooLarge { .. }
                | MediaError::PermissionDenied(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MediaError>;
