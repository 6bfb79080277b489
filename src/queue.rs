// The per-user job queue: bounded FIFO storage plus the coordinator that
// keeps exactly one worker draining each active user's queue.

pub mod coordinator;
pub mod store;
