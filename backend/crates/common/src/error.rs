use thiserror::Error;

#[derive(Debug, Error)]
pub enum PulseError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("validation error: {0}")]
    Validation(String),
}

pub type PulseResult<T> = Result<T, PulseError>;
