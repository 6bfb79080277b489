// Core job and identity types shared by the queue and the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one submitting user. Queues and worker exclusivity are scoped
/// to this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque routing handle for progress updates and results. The transport
/// layer decides what it means (chat id, session id, callback url).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination(pub String);

impl Destination {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

/// Handle the payload source resolves to raw bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadRef {
    /// Transport-specific identifier for the raw bytes.
    pub id: String,
    /// Original filename when known; used for the decode hint and the
    /// suggested output name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Declared size when known; checked against the configured cap at
    /// submission time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

impl PayloadRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            filename: None,
            size_bytes: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = Some(size_bytes);
        self
    }
}

/// One unit of work: apply one effect to one payload for one user.
///
/// Owned exclusively by the queue until a worker dequeues it; dropped once
/// the worker finishes it, success or failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub user: UserId,
    pub payload: PayloadRef,
    pub effect_id: String,
    pub destination: Destination,
    pub enqueued_at: DateTime<Utc>,
}

impl Job {
    pub fn new(
        user: UserId,
        payload: PayloadRef,
        effect_id: impl Into<String>,
        destination: Destination,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user,
            payload,
            effect_id: effect_id.into(),
            destination,
            enqueued_at: Utc::now(),
        }
    }
}

/// Advisory snapshot of one user's queue; subject to races with concurrent
/// mutation, used for status reporting only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub depth: usize,
    pub is_active: bool,
}

/// Returned by a successful submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    /// 1-based position in the user's queue at enqueue time.
    pub position: usize,
}
