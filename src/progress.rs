// Progress reporting: the collaborator contract plus the checkpoint
// percentages the pipeline announces as a job moves through its stages.
//
// Updates are best-effort by design: a progress message that cannot be
// delivered never fails the job.

use async_trait::async_trait;
use tracing::warn;

use crate::types::Destination;

/// Checkpoint percentages, in stage order. Percentages are coarse
/// checkpoints, not a continuous stream, and only move forward.
pub mod checkpoint {
    pub const DOWNLOADING: u8 = 10;
    pub const LOADING: u8 = 30;
    pub const APPLYING: u8 = 50;
    pub const EXPORTING: u8 = 80;
    pub const UPLOADING: u8 = 95;
    pub const DONE: u8 = 100;
}

/// Collaborator receiving percentage/status checkpoints during processing.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn report(
        &self,
        destination: &Destination,
        percent: u8,
        status: &str,
    ) -> anyhow::Result<()>;
}

/// Report a checkpoint, logging and swallowing any delivery error.
pub(crate) async fn report_best_effort(
    reporter: &dyn ProgressReporter,
    destination: &Destination,
    percent: u8,
    status: &str,
) {
    if let Err(e) = reporter.report(destination, percent, status).await {
        warn!("⚠️ progress update dropped at {}% ({}): {:#}", percent, status, e);
    }
}

/// Render the 10-cell text progress bar for a percentage.
pub fn render_bar(percent: u8) -> String {
    const CELLS: usize = 10;
    let filled = CELLS * percent.min(100) as usize / 100;
    format!("[{}{}]", "█".repeat(filled), "░".repeat(CELLS - filled))
}
