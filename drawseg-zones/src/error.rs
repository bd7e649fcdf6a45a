//! Error types for drawseg-zones

use crate::prompts::ZoneType;
use drawseg_core::Error as CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ZoneError {
    #[error("Invalid prompt configuration: {0}")]
    InvalidPrompt(String),

    #[error("Duplicate zone type in prompt set: {0}")]
    DuplicateZoneType(ZoneType),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl From<ZoneError> for CoreError {
    fn from(err: ZoneError) -> Self {
        match err {
            ZoneError::Core(inner) => inner,
            ZoneError::Io(io) => CoreError::Io(io),
            other => CoreError::Zone(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ZoneError>;
