// Decoded audio and the sample-level helpers the effect catalog builds on.

use std::time::Duration;

use super::dsp;

/// Interleaved f32 samples plus the format needed to interpret them.
///
/// Every transformation returns a new buffer; no buffer is ever shared
/// between in-flight jobs.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        debug_assert!(channels > 0, "channel count must be non-zero");
        debug_assert!(sample_rate > 0, "sample rate must be non-zero");
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    pub fn silent(frames: usize, sample_rate: u32, channels: u16) -> Self {
        Self::new(vec![0.0; frames * channels as usize], sample_rate, channels)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of sample frames (one sample per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Frames corresponding to a millisecond interval at this buffer's rate.
    pub fn frames_for_ms(&self, ms: u32) -> usize {
        (self.sample_rate as u64 * ms as u64 / 1000) as usize
    }

    /// Apply a flat gain in dB to every sample.
    pub fn apply_gain_db(&mut self, gain_db: f32) {
        let gain = dsp::db_to_linear(gain_db);
        for sample in &mut self.samples {
            *sample = dsp::validate_sample(*sample * gain);
        }
    }

    /// Additively mix `other` on top of `self`, starting `offset_frames` into
    /// this buffer. The buffer grows to fit the overlay's tail (unlike a
    /// truncating mix); the sum saturates at full scale.
    pub fn overlay(&mut self, other: &AudioBuffer, offset_frames: usize) {
        debug_assert_eq!(self.channels, other.channels, "channel layouts must match");
        let offset = offset_frames * self.channels as usize;
        let needed = offset + other.samples.len();
        if self.samples.len() < needed {
            self.samples.resize(needed, 0.0);
        }
        for (i, &sample) in other.samples.iter().enumerate() {
            let mixed = self.samples[offset + i] + sample;
            self.samples[offset + i] = mixed.clamp(-1.0, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_and_duration_account_for_channels() {
        let buffer = AudioBuffer::silent(4410, 44100, 2);
        assert_eq!(buffer.frames(), 4410);
        assert_eq!(buffer.samples().len(), 8820);
        assert!((buffer.duration().as_secs_f64() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn gain_scales_samples() {
        let mut buffer = AudioBuffer::new(vec![0.5, -0.5], 44100, 1);
        buffer.apply_gain_db(-6.0);
        let expected = 0.5 * 10f32.powf(-6.0 / 20.0);
        assert!((buffer.samples()[0] - expected).abs() < 1e-6);
        assert!((buffer.samples()[1] + expected).abs() < 1e-6);
    }

    #[test]
    fn overlay_extends_and_mixes() {
        let mut base = AudioBuffer::new(vec![0.2, 0.2, 0.2], 1000, 1);
        let copy = AudioBuffer::new(vec![0.1, 0.1, 0.1], 1000, 1);
        base.overlay(&copy, 2);
        assert_eq!(base.frames(), 5);
        assert!((base.samples()[2] - 0.3).abs() < 1e-6);
        assert!((base.samples()[4] - 0.1).abs() < 1e-6);
    }

    #[test]
    fn overlay_saturates_at_full_scale() {
        let mut base = AudioBuffer::new(vec![0.9], 1000, 1);
        let copy = AudioBuffer::new(vec![0.9], 1000, 1);
        base.overlay(&copy, 0);
        assert_eq!(base.samples()[0], 1.0);
    }
}
