use thiserror::Error;

pub type RecorderResult<T> = Result<T, RecorderError>;

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("wav: {0}")]
    Wav(#[from] hound::Error),

    #[error("recorder needs a tokio runtime")]
    NoRuntime,

    #[error("recorder consumer is not running")]
    ConsumerStopped,
}
