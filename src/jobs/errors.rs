use thiserror::Error;

use crate::entities::ErrorKind;
use crate::fetcher::FetchError;
use crate::generator::GenerationError;

/// Everything that can end a single job attempt.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Extracted text is too short")]
    ExtractionTooShort { chars: usize, min: usize },

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("Unsupported job type: {0}")]
    UnsupportedJobType(String),

    #[error("Invalid job payload: {0}")]
    InvalidPayload(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Fetch(_) => ErrorKind::Fetch,
            PipelineError::ExtractionTooShort { .. } => ErrorKind::ExtractionTooShort,
            PipelineError::Generation(e) => e.kind(),
            PipelineError::UnsupportedJobType(_) => ErrorKind::UnsupportedJobType,
            PipelineError::InvalidPayload(_) => ErrorKind::InvalidPayload,
            PipelineError::Persistence(_) => ErrorKind::Persistence,
        }
    }
}
