// Service tunables for the queue and the pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for a coordinator instance. Reference defaults match the
/// shipped product: 10 queued jobs per user, 20 MB payloads, 192 kbps output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Maximum pending jobs per user; submissions beyond this are rejected,
    /// never blocked.
    pub max_queue_depth: usize,
    /// Maximum accepted payload size in bytes, enforced at submission when
    /// the payload reference declares a size.
    pub max_payload_bytes: u64,
    /// Fixed bitrate for the re-encoded output, independent of input bitrate.
    pub mp3_bitrate_kbps: u32,
    /// Root for per-job scratch directories; the system temp dir when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scratch_root: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_queue_depth: 10,
            max_payload_bytes: 20 * 1024 * 1024,
            mp3_bitrate_kbps: 192,
            scratch_root: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_values() {
        let config = ServiceConfig::default();
        assert_eq!(config.max_queue_depth, 10);
        assert_eq!(config.max_payload_bytes, 20 * 1024 * 1024);
        assert_eq!(config.mp3_bitrate_kbps, 192);
        assert!(config.scratch_root.is_none());
    }
}
