// Offline sample rate conversion for the speed and pitch effects.
//
// Wraps rubato's fixed-input resampler for whole-buffer use: deinterleave,
// feed fixed-size chunks (zero-padding the tail), flush until the internal
// delay has drained, then trim the delay and padding from the output.

use anyhow::{bail, Context, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};

use super::buffer::AudioBuffer;

const CHUNK_FRAMES: usize = 1024;

/// Resample a whole buffer to `target_rate`, preserving channel count and
/// duration.
pub fn resample(input: &AudioBuffer, target_rate: u32) -> Result<AudioBuffer> {
    let source_rate = input.sample_rate();
    let channels = input.channels() as usize;
    let frames = input.frames();

    if source_rate == target_rate {
        return Ok(input.clone());
    }
    if frames == 0 {
        return Ok(AudioBuffer::new(Vec::new(), target_rate, input.channels()));
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let mut resampler = FastFixedIn::<f32>::new(
        ratio,
        1.1,
        PolynomialDegree::Septic,
        CHUNK_FRAMES,
        channels,
    )
    .context("failed to construct resampler")?;
    let delay = resampler.output_delay();
    let expected_frames = (frames as f64 * ratio).round() as usize;

    // Deinterleave into per-channel lanes.
    let mut planar: Vec<Vec<f32>> = vec![Vec::with_capacity(frames); channels];
    for frame in input.samples().chunks(channels) {
        for (ch, &sample) in frame.iter().enumerate() {
            planar[ch].push(sample);
        }
    }

    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(expected_frames + delay); channels];
    let mut position = 0;
    while position < frames {
        let needed = resampler.input_frames_next();
        let end = (position + needed).min(frames);
        let chunk: Vec<Vec<f32>> = planar
            .iter()
            .map(|lane| {
                let mut lane_chunk = lane[position..end].to_vec();
                lane_chunk.resize(needed, 0.0);
                lane_chunk
            })
            .collect();
        let processed = resampler
            .process(&chunk, None)
            .context("resampling failed")?;
        for (ch, lane) in processed.into_iter().enumerate() {
            output[ch].extend_from_slice(&lane);
        }
        position = end;
    }

    // Push silence through until the delayed tail of the signal has emerged.
    while output[0].len() < expected_frames + delay {
        let needed = resampler.input_frames_next();
        let silence = vec![vec![0.0f32; needed]; channels];
        let processed = resampler
            .process(&silence, None)
            .context("resampler flush failed")?;
        if processed[0].is_empty() {
            bail!("resampler produced no output while flushing");
        }
        for (ch, lane) in processed.into_iter().enumerate() {
            output[ch].extend_from_slice(&lane);
        }
    }

    // Reinterleave, skipping the resampler delay and dropping the padding.
    let mut samples = Vec::with_capacity(expected_frames * channels);
    for frame in 0..expected_frames {
        for lane in output.iter() {
            samples.push(lane[delay + frame]);
        }
    }

    Ok(AudioBuffer::new(samples, target_rate, input.channels()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32, frames: usize) -> AudioBuffer {
        let samples = (0..frames)
            .map(|i| {
                0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin()
            })
            .collect();
        AudioBuffer::new(samples, sample_rate, 1)
    }

    #[test]
    fn identity_rate_is_a_clone() {
        let input = sine(440.0, 44100, 4410);
        let out = resample(&input, 44100).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn downsampling_halves_frame_count() {
        let input = sine(440.0, 44100, 44100);
        let out = resample(&input, 22050).unwrap();
        assert_eq!(out.sample_rate(), 22050);
        assert_eq!(out.frames(), 22050);
        // Duration is preserved.
        assert!((out.duration().as_secs_f64() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn upsampling_preserves_duration() {
        let input = sine(440.0, 22050, 22050);
        let out = resample(&input, 48000).unwrap();
        assert_eq!(out.frames(), 48000);
        assert!((out.duration().as_secs_f64() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn stereo_lanes_survive_resampling() {
        let frames = 8000;
        let mut interleaved = Vec::with_capacity(frames * 2);
        for i in 0..frames {
            let s = 0.4 * (2.0 * std::f32::consts::PI * 220.0 * i as f32 / 8000.0).sin();
            interleaved.push(s);
            interleaved.push(0.0);
        }
        let input = AudioBuffer::new(interleaved, 8000, 2);
        let out = resample(&input, 16000).unwrap();
        assert_eq!(out.channels(), 2);
        let right_energy: f32 = out.samples().iter().skip(1).step_by(2).map(|s| s.abs()).sum();
        let left_energy: f32 = out.samples().iter().step_by(2).map(|s| s.abs()).sum();
        assert!(left_energy > 1.0);
        assert!(right_energy < left_energy * 1e-3);
    }

    #[test]
    fn empty_input_stays_empty() {
        let input = AudioBuffer::new(Vec::new(), 44100, 1);
        let out = resample(&input, 22050).unwrap();
        assert_eq!(out.frames(), 0);
        assert_eq!(out.sample_rate(), 22050);
    }
}
