// Error taxonomy: synchronous submission rejections and per-job pipeline
// failures. No error here is retried; every pipeline failure is terminal for
// its job and only its job.

use crate::types::UserId;

/// Rejections surfaced synchronously at submission time. Jobs that hit these
/// never enter the queue.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("queue for user {user} is full ({max} jobs)")]
    QueueFull { user: UserId, max: usize },

    #[error("unknown effect: {0}")]
    InvalidEffect(String),

    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: u64, max: u64 },
}

/// Stage-tagged failures inside one job's pipeline run. The worker reports
/// the failure, releases the job's scratch, and moves on to the next job.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("download failed: {0}")]
    Download(#[source] anyhow::Error),

    #[error("decode failed: {0}")]
    Decode(#[source] anyhow::Error),

    #[error("transform failed: {0}")]
    Transform(#[source] anyhow::Error),

    #[error("encode failed: {0}")]
    Encode(#[source] anyhow::Error),
}

impl PipelineError {
    /// Short stage tag for logs.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Download(_) => "download",
            PipelineError::Decode(_) => "decode",
            PipelineError::Transform(_) => "transform",
            PipelineError::Encode(_) => "encode",
        }
    }
}
