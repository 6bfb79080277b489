// remixd — per-user audio effects job service.
//
// Accepts audio clips from many independent users, applies a chosen effect,
// and returns the re-encoded clip, reporting progress while the work is in
// flight. Submissions queue per user: at most one worker drains a user's
// queue at a time, jobs run in FIFO order, and a failed job never stalls the
// jobs behind it. Transport, UI, and file transfer live behind the
// collaborator traits (`PayloadSource`, `ProgressReporter`, `ResultSink`).

pub mod audio;
pub mod config;
pub mod error;
pub mod log;
pub mod progress;
pub mod queue;
pub mod types;

pub use audio::buffer::AudioBuffer;
pub use audio::effects::{EffectDefinition, EffectKind, EffectRegistry};
pub use audio::pipeline::{suggested_filename, AudioPipeline, ProcessedClip};
pub use config::ServiceConfig;
pub use error::{PipelineError, SubmitError};
pub use progress::ProgressReporter;
pub use queue::coordinator::{PayloadSource, QueueCoordinator, ResultSink};
pub use queue::store::{EnqueueOutcome, UserQueueStore};
pub use types::{Destination, Job, PayloadRef, QueueStatus, SubmitReceipt, UserId};
