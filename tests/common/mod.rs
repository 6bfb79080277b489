// Shared fixtures and collaborator fakes for the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;

use async_trait::async_trait;
use remixd::{Destination, PayloadRef, ProgressReporter, PayloadSource, ResultSink};
use tokio::sync::Semaphore;

/// Synthesize a mono 16-bit PCM WAV clip (a quiet 440 Hz tone).
pub fn wav_bytes(frames: usize, sample_rate: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec).unwrap();
        for i in 0..frames {
            let sample =
                0.4 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sample_rate as f32).sin();
            writer.write_sample((sample * 32767.0) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    bytes
}

/// In-memory payload source keyed by payload id.
#[derive(Default)]
pub struct StaticPayloads {
    clips: Mutex<HashMap<String, Vec<u8>>>,
}

impl StaticPayloads {
    pub fn insert(&self, id: &str, bytes: Vec<u8>) {
        self.clips.lock().unwrap().insert(id.to_string(), bytes);
    }
}

#[async_trait]
impl PayloadSource for StaticPayloads {
    async fn fetch(&self, payload: &PayloadRef) -> anyhow::Result<Vec<u8>> {
        self.clips
            .lock()
            .unwrap()
            .get(&payload.id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("missing payload {}", payload.id))
    }
}

/// Payload source that consumes one gate permit per fetch, letting tests
/// hold jobs in flight until they release the gate.
pub struct GatedPayloads {
    pub inner: StaticPayloads,
    pub gate: Semaphore,
}

impl GatedPayloads {
    pub fn new() -> Self {
        Self {
            inner: StaticPayloads::default(),
            gate: Semaphore::new(0),
        }
    }

    pub fn release(&self, permits: usize) {
        self.gate.add_permits(permits);
    }
}

#[async_trait]
impl PayloadSource for GatedPayloads {
    async fn fetch(&self, payload: &PayloadRef) -> anyhow::Result<Vec<u8>> {
        self.gate
            .acquire()
            .await
            .map_err(|_| anyhow::anyhow!("gate closed"))?
            .forget();
        self.inner.fetch(payload).await
    }
}

/// Records every progress checkpoint it receives.
#[derive(Default)]
pub struct RecordingProgress {
    pub events: Mutex<Vec<(String, u8, String)>>,
}

impl RecordingProgress {
    pub fn percents_for(&self, destination: &str) -> Vec<u8> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(dest, _, _)| dest == destination)
            .map(|(_, percent, _)| *percent)
            .collect()
    }
}

#[async_trait]
impl ProgressReporter for RecordingProgress {
    async fn report(
        &self,
        destination: &Destination,
        percent: u8,
        status: &str,
    ) -> anyhow::Result<()> {
        self.events
            .lock()
            .unwrap()
            .push((destination.0.clone(), percent, status.to_string()));
        Ok(())
    }
}

/// One delivered outcome, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Success {
        destination: String,
        filename: String,
        byte_count: usize,
    },
    Failure {
        destination: String,
        message: String,
    },
}

/// Records successes and failures in the order they arrive.
#[derive(Default)]
pub struct RecordingSink {
    pub deliveries: Mutex<Vec<Delivery>>,
}

impl RecordingSink {
    pub fn all(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }

    pub fn success_filenames(&self) -> Vec<String> {
        self.all()
            .into_iter()
            .filter_map(|d| match d {
                Delivery::Success { filename, .. } => Some(filename),
                Delivery::Failure { .. } => None,
            })
            .collect()
    }

    pub fn failure_count(&self) -> usize {
        self.all()
            .iter()
            .filter(|d| matches!(d, Delivery::Failure { .. }))
            .count()
    }
}

#[async_trait]
impl ResultSink for RecordingSink {
    async fn deliver_success(
        &self,
        destination: &Destination,
        bytes: Vec<u8>,
        filename: &str,
        _caption: &str,
    ) -> anyhow::Result<()> {
        self.deliveries.lock().unwrap().push(Delivery::Success {
            destination: destination.0.clone(),
            filename: filename.to_string(),
            byte_count: bytes.len(),
        });
        Ok(())
    }

    async fn deliver_failure(
        &self,
        destination: &Destination,
        message: &str,
    ) -> anyhow::Result<()> {
        self.deliveries.lock().unwrap().push(Delivery::Failure {
            destination: destination.0.clone(),
            message: message.to_string(),
        });
        Ok(())
    }
}
