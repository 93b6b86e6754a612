use thiserror::Error;
use vr_media::RecorderError;
use vr_voice::VoiceError;

pub type ControlResult<T> = Result<T, ControlError>;

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("not found: {0}")]
    NotFound(&'static str),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("failed precondition: {0}")]
    FailedPrecondition(&'static str),

    #[error(transparent)]
    Voice(#[from] VoiceError),

    #[error(transparent)]
    Recorder(#[from] RecorderError),
}
