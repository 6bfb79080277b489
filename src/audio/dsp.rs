// DSP primitives behind the effect catalog: biquad filters, offline
// dynamic-range compression, and the numeric guards that keep IIR state
// stable across arbitrary input.

use super::buffer::AudioBuffer;

/// Below this magnitude a sample is flushed to zero to keep filter delay
/// lines out of denormal territory.
const DENORMAL_THRESHOLD: f32 = 1e-15;
const MIN_DB: f32 = -100.0;
const MAX_DB: f32 = 40.0;
const MIN_LOG_INPUT: f32 = 1e-10;

/// Butterworth Q for the catalog's low/high-pass filters.
const FILTER_Q: f32 = std::f32::consts::FRAC_1_SQRT_2;

#[inline]
fn flush_denormal(x: f32) -> f32 {
    if x.abs() < DENORMAL_THRESHOLD || !x.is_finite() {
        0.0
    } else {
        x
    }
}

/// Clamp non-finite values to silence and flush denormals.
#[inline]
pub fn validate_sample(x: f32) -> f32 {
    if x.is_finite() {
        flush_denormal(x)
    } else {
        0.0
    }
}

#[inline]
fn safe_log10(x: f32) -> f32 {
    x.max(MIN_LOG_INPUT).log10()
}

/// dB to linear gain, clamped to a sane range.
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db.clamp(MIN_DB, MAX_DB) / 20.0)
}

/// Second-order IIR filter (RBJ cookbook coefficients), normalized so the
/// process step is a plain direct-form-I update.
#[derive(Debug)]
pub struct BiquadFilter {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl BiquadFilter {
    pub fn low_pass(sample_rate: u32, freq: f32, q: f32) -> Self {
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate as f32;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / (2.0 * q);

        let b0 = (1.0 - cos_w0) / 2.0;
        let b1 = 1.0 - cos_w0;
        let b2 = (1.0 - cos_w0) / 2.0;
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        Self::normalized(b0, b1, b2, a0, a1, a2)
    }

    pub fn high_pass(sample_rate: u32, freq: f32, q: f32) -> Self {
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate as f32;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / (2.0 * q);

        let b0 = (1.0 + cos_w0) / 2.0;
        let b1 = -(1.0 + cos_w0);
        let b2 = (1.0 + cos_w0) / 2.0;
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        Self::normalized(b0, b1, b2, a0, a1, a2)
    }

    fn normalized(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    pub fn process(&mut self, input: f32) -> f32 {
        let input = validate_sample(input);
        let output = self.b0 * input + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;

        self.x2 = flush_denormal(self.x1);
        self.x1 = input;
        self.y2 = flush_denormal(self.y1);
        self.y1 = validate_sample(output);

        self.y1
    }

    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

/// Run a fresh filter per channel over an interleaved buffer. IIR state must
/// not leak between channels.
fn run_per_channel(buffer: &mut AudioBuffer, make: impl Fn(u32) -> BiquadFilter) {
    let channels = buffer.channels() as usize;
    let sample_rate = buffer.sample_rate();
    let mut filters: Vec<BiquadFilter> = (0..channels).map(|_| make(sample_rate)).collect();
    for frame in buffer.samples_mut().chunks_mut(channels) {
        for (ch, sample) in frame.iter_mut().enumerate() {
            *sample = filters[ch].process(*sample);
        }
    }
}

/// Low-pass the buffer in place at the given cutoff.
pub fn low_pass(buffer: &mut AudioBuffer, cutoff_hz: f32) {
    run_per_channel(buffer, |rate| BiquadFilter::low_pass(rate, cutoff_hz, FILTER_Q));
}

/// High-pass the buffer in place at the given cutoff.
pub fn high_pass(buffer: &mut AudioBuffer, cutoff_hz: f32) {
    run_per_channel(buffer, |rate| BiquadFilter::high_pass(rate, cutoff_hz, FILTER_Q));
}

/// Offline dynamic-range compressor: envelope follower in dB with gain
/// reduction above threshold. The envelope is shared across channels.
#[derive(Debug)]
pub struct Compressor {
    threshold_db: f32,
    ratio: f32,
    attack_coeff: f32,
    release_coeff: f32,
    envelope_db: f32,
}

impl Compressor {
    /// Defaults follow the catalog's phone effect: -20 dB threshold, 4:1
    /// ratio, 5 ms attack, 50 ms release.
    pub fn new(sample_rate: u32) -> Self {
        let per_channel_rate = sample_rate as f32;
        Self {
            threshold_db: -20.0,
            ratio: 4.0,
            attack_coeff: coeff_for_ms(5.0, per_channel_rate),
            release_coeff: coeff_for_ms(50.0, per_channel_rate),
            envelope_db: MIN_DB,
        }
    }

    pub fn process(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            let input = validate_sample(*sample);
            let level_db = (20.0 * safe_log10(input.abs())).clamp(MIN_DB, MAX_DB);

            let coeff = if level_db > self.envelope_db {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.envelope_db =
                validate_sample(level_db + (self.envelope_db - level_db) * coeff).max(MIN_DB);

            let reduction_db = if self.envelope_db > self.threshold_db {
                let over = self.envelope_db - self.threshold_db;
                (over - over / self.ratio).clamp(0.0, 60.0)
            } else {
                0.0
            };

            *sample = validate_sample(input * db_to_linear(-reduction_db));
        }
    }
}

fn coeff_for_ms(ms: f32, sample_rate: f32) -> f32 {
    (-1.0 / (ms * 0.001 * sample_rate)).exp()
}

/// Compress the buffer in place with the catalog defaults.
pub fn compress_dynamic_range(buffer: &mut AudioBuffer) {
    let mut compressor = Compressor::new(buffer.sample_rate());
    compressor.process(buffer.samples_mut());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32, frames: usize, amplitude: f32) -> Vec<f32> {
        (0..frames)
            .map(|i| {
                amplitude
                    * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin()
            })
            .collect()
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn low_pass_attenuates_high_frequencies() {
        let sample_rate = 44100;
        let mut low = AudioBuffer::new(sine(100.0, sample_rate, 44100, 0.5), sample_rate, 1);
        let mut high = AudioBuffer::new(sine(8000.0, sample_rate, 44100, 0.5), sample_rate, 1);
        low_pass(&mut low, 400.0);
        low_pass(&mut high, 400.0);
        // 100 Hz passes nearly untouched, 8 kHz is heavily attenuated.
        assert!(rms(low.samples()) > 0.3);
        assert!(rms(high.samples()) < 0.01);
    }

    #[test]
    fn high_pass_attenuates_low_frequencies() {
        let sample_rate = 44100;
        let mut low = AudioBuffer::new(sine(50.0, sample_rate, 44100, 0.5), sample_rate, 1);
        high_pass(&mut low, 3000.0);
        assert!(rms(low.samples()) < 0.01);
    }

    #[test]
    fn filter_state_does_not_leak_between_channels() {
        // Left channel carries a signal, right channel is silent; after
        // filtering the right channel must still be silent.
        let sample_rate = 8000;
        let frames = 800;
        let left = sine(200.0, sample_rate, frames, 0.5);
        let mut interleaved = Vec::with_capacity(frames * 2);
        for sample in left {
            interleaved.push(sample);
            interleaved.push(0.0);
        }
        let mut buffer = AudioBuffer::new(interleaved, sample_rate, 2);
        low_pass(&mut buffer, 1000.0);
        let right_energy: f32 = buffer.samples().iter().skip(1).step_by(2).map(|s| s.abs()).sum();
        assert_eq!(right_energy, 0.0);
    }

    #[test]
    fn compressor_reduces_loud_signals_more_than_quiet_ones() {
        let sample_rate = 44100;
        let loud = sine(440.0, sample_rate, 44100, 0.9);
        let quiet = sine(440.0, sample_rate, 44100, 0.05);

        let mut loud_out = loud.clone();
        Compressor::new(sample_rate).process(&mut loud_out);
        let mut quiet_out = quiet.clone();
        Compressor::new(sample_rate).process(&mut quiet_out);

        let loud_ratio = rms(&loud_out) / rms(&loud);
        let quiet_ratio = rms(&quiet_out) / rms(&quiet);
        assert!(loud_ratio < quiet_ratio);
        assert!(loud_ratio < 1.0);
    }

    #[test]
    fn validate_sample_flushes_junk() {
        assert_eq!(validate_sample(f32::NAN), 0.0);
        assert_eq!(validate_sample(f32::INFINITY), 0.0);
        assert_eq!(validate_sample(1e-20), 0.0);
        assert_eq!(validate_sample(0.5), 0.5);
    }
}
