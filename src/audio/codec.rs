// Decoding and encoding at the pipeline's edges.
//
// Symphonia handles container probing and decoding to interleaved f32; LAME
// re-encodes the processed clip as MP3 at a fixed bitrate.

use std::fs::File;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::warn;

use super::buffer::AudioBuffer;

/// Decode an audio file into an interleaved f32 buffer.
pub fn decode_file(path: &Path, extension_hint: Option<&str>) -> Result<AudioBuffer> {
    let file = File::open(path).context("failed to open scratch input")?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension_hint {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .context("unsupported container format")?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .context("no supported audio tracks")?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .context("stream is missing a sample rate")?;
    let channels = track
        .codec_params
        .channels
        .context("stream is missing a channel layout")?
        .count() as u16;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("unsupported codec")?;

    let mut samples = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e).context("failed to read packet"),
        };
        if packet.track_id() != track_id {
            continue;
        }
        match decoder.decode(&packet) {
            Ok(decoded) => {
                let capacity = decoded.capacity() as u64;
                let spec = *decoded.spec();
                let buf = sample_buf.get_or_insert_with(|| SampleBuffer::new(capacity, spec));
                buf.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buf.samples());
            }
            // Recoverable: skip the corrupt packet and keep decoding.
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("⚠️ skipping corrupt packet: {}", e);
            }
            Err(e) => return Err(e).context("decoder failure"),
        }
    }

    if samples.is_empty() {
        bail!("decoded no audio samples");
    }
    Ok(AudioBuffer::new(samples, sample_rate, channels))
}

/// Encode an interleaved f32 buffer to MP3 at the given bitrate.
pub fn encode_mp3(buffer: &AudioBuffer, bitrate_kbps: u32) -> Result<Vec<u8>> {
    let channels = buffer.channels();
    if channels == 0 || channels > 2 {
        bail!("unsupported channel count for MP3 output: {channels}");
    }

    let mut lame = lame::Lame::new().ok_or_else(|| anyhow!("failed to create LAME encoder"))?;
    lame.set_channels(channels as u8)
        .map_err(|e| anyhow!("failed to set LAME channels: {:?}", e))?;
    lame.set_sample_rate(buffer.sample_rate())
        .map_err(|e| anyhow!("failed to set LAME sample rate: {:?}", e))?;
    lame.set_kilobitrate(bitrate_kbps as i32)
        .map_err(|e| anyhow!("failed to set LAME bitrate: {:?}", e))?;
    lame.set_quality(2)
        .map_err(|e| anyhow!("failed to set LAME quality: {:?}", e))?;
    lame.init_params()
        .map_err(|e| anyhow!("failed to initialize LAME parameters: {:?}", e))?;

    let pcm: Vec<i16> = buffer
        .samples()
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
        .collect();

    // LAME's recommended worst-case output size.
    let mut mp3_buffer = vec![0u8; pcm.len() * 2 + 7200];
    let written = if channels == 1 {
        lame.encode(&pcm, &[], &mut mp3_buffer)
            .map_err(|e| anyhow!("LAME mono encoding error: {:?}", e))?
    } else {
        let left: Vec<i16> = pcm.iter().step_by(2).copied().collect();
        let right: Vec<i16> = pcm.iter().skip(1).step_by(2).copied().collect();
        lame.encode(&left, &right, &mut mp3_buffer)
            .map_err(|e| anyhow!("LAME stereo encoding error: {:?}", e))?
    };

    if written == 0 {
        bail!("encoder produced no output");
    }
    mp3_buffer.truncate(written);
    Ok(mp3_buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.mp3");
        std::fs::write(&path, b"definitely not audio").unwrap();
        assert!(decode_file(&path, Some("mp3")).is_err());
    }

    #[test]
    fn encode_rejects_unsupported_layouts() {
        let buffer = AudioBuffer::new(vec![0.0; 6], 44100, 6);
        assert!(encode_mp3(&buffer, 192).is_err());
    }
}
