// Per-user queue state: a bounded FIFO of pending jobs plus the active flag
// that enforces one worker per user.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::types::{Job, QueueStatus, UserId};

#[derive(Debug, Default)]
struct UserQueueState {
    jobs: VecDeque<Job>,
    active: bool,
}

/// Outcome of an enqueue attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Appended at the tail; position is 1-based.
    Accepted { position: usize },
    /// Queue already at the configured maximum; left unchanged.
    Rejected,
}

/// Owns every user's queue state behind one lock. Injected into the
/// coordinator so tests can run isolated instances side by side.
///
/// State is created lazily on first touch and retained for the process
/// lifetime; empty queues are cheap to keep.
#[derive(Debug)]
pub struct UserQueueStore {
    users: Mutex<HashMap<UserId, UserQueueState>>,
    max_depth: usize,
}

impl UserQueueStore {
    pub fn new(max_depth: usize) -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            max_depth,
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Append a job, or reject it when the user's queue is at capacity.
    pub fn enqueue(&self, job: Job) -> EnqueueOutcome {
        let mut users = self.users.lock().unwrap();
        let state = users.entry(job.user).or_default();
        if state.jobs.len() >= self.max_depth {
            return EnqueueOutcome::Rejected;
        }
        state.jobs.push_back(job);
        EnqueueOutcome::Accepted {
            position: state.jobs.len(),
        }
    }

    /// Set the active flag if it was clear. Check and set happen under one
    /// lock: for concurrent callers on the same user, exactly one wins.
    pub fn try_activate(&self, user: UserId) -> bool {
        let mut users = self.users.lock().unwrap();
        let state = users.entry(user).or_default();
        if state.active {
            false
        } else {
            state.active = true;
            true
        }
    }

    /// Remove and return the head of the queue.
    pub fn dequeue(&self, user: UserId) -> Option<Job> {
        let mut users = self.users.lock().unwrap();
        users.get_mut(&user).and_then(|state| state.jobs.pop_front())
    }

    /// Pop the head, or clear the active flag when the queue is empty.
    ///
    /// Doing both under one lock closes the window where a job enqueued
    /// between "queue observed empty" and "flag cleared" could strand until
    /// the next submission. The worker loop uses only this operation.
    pub fn dequeue_or_deactivate(&self, user: UserId) -> Option<Job> {
        let mut users = self.users.lock().unwrap();
        let state = users.entry(user).or_default();
        match state.jobs.pop_front() {
            Some(job) => Some(job),
            None => {
                state.active = false;
                None
            }
        }
    }

    /// Clear the active flag. Must be called exactly once per successful
    /// `try_activate`, on every exit path.
    pub fn deactivate(&self, user: UserId) {
        let mut users = self.users.lock().unwrap();
        if let Some(state) = users.get_mut(&user) {
            state.active = false;
        }
    }

    pub fn size(&self, user: UserId) -> usize {
        let users = self.users.lock().unwrap();
        users.get(&user).map_or(0, |state| state.jobs.len())
    }

    pub fn is_active(&self, user: UserId) -> bool {
        let users = self.users.lock().unwrap();
        users.get(&user).is_some_and(|state| state.active)
    }

    /// Advisory snapshot for status queries.
    pub fn status(&self, user: UserId) -> QueueStatus {
        let users = self.users.lock().unwrap();
        users.get(&user).map_or(
            QueueStatus {
                depth: 0,
                is_active: false,
            },
            |state| QueueStatus {
                depth: state.jobs.len(),
                is_active: state.active,
            },
        )
    }
}
