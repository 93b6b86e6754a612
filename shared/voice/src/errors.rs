use thiserror::Error;

pub type VoiceResult<T> = Result<T, VoiceError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VoiceError {
    #[error("empty audio buffer")]
    EmptyBuffer,

    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),

    #[error("invalid id: {0}")]
    InvalidId(&'static str),

    #[error("processor closed")]
    ProcessorClosed,
}
