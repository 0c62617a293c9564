use async_trait::async_trait;

use crate::entities::Job;
use crate::jobs::PipelineError;

/// Trait for handling specific job types
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    /// Execute one attempt of a claimed job. Job bookkeeping stays with the
    /// runner; the handler only touches the rows its payload names.
    async fn run(&self, job: &Job) -> Result<(), PipelineError>;

    /// Get the job kind this handler processes
    fn kind(&self) -> &'static str;
}
