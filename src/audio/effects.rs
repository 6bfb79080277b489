// The effect catalog: a fixed, table-driven registry of pure transformations
// over `AudioBuffer`.
//
// Cutoffs, delays, and attenuation values are catalog constants kept
// bit-for-bit with the shipped product; none are user-configurable.

use anyhow::{bail, Result};

use super::buffer::AudioBuffer;
use super::{dsp, resample};

/// Algorithm tag plus fixed parameters for one catalog entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectKind {
    /// Low-pass at the given cutoff, then -3 dB.
    Muffled { cutoff_hz: f32 },
    /// Low-pass at 300 Hz, then -6 dB.
    Underwater,
    /// Band-pass (high-pass 300 Hz, low-pass 3000 Hz), compression, -2 dB.
    Phone,
    /// Delayed copy attenuated by `20 * (1 - decay)` dB mixed onto the
    /// original at the same sample alignment.
    Echo { delay_ms: u32, decay: f32 },
    /// Five delayed, decayed copies overlaid onto the original.
    Reverb,
    /// Resample-reinterpret by the factor; duration and pitch change jointly.
    SpeedChange { factor: f32 },
    /// Speed change with factor `2^(semitones / 12)`.
    PitchShift { semitones: i32 },
    /// Pitch -5, speed x0.7, reverb, -3 dB, strictly in that order.
    Nightmare,
}

/// One catalog entry: stable id, display label, transformation tag.
#[derive(Debug, Clone, Copy)]
pub struct EffectDefinition {
    pub id: &'static str,
    pub label: &'static str,
    pub kind: EffectKind,
}

const REVERB_DELAYS_MS: [u32; 5] = [50, 100, 150, 200, 250];
const REVERB_DECAYS: [f32; 5] = [0.3, 0.25, 0.2, 0.15, 0.1];

/// Catalog in presentation order. `list` and selection menus rely on this
/// order being stable across calls.
const CATALOG: &[EffectDefinition] = &[
    EffectDefinition {
        id: "muffled_light",
        label: "🔇 Muffled (Light)",
        kind: EffectKind::Muffled { cutoff_hz: 1500.0 },
    },
    EffectDefinition {
        id: "muffled_medium",
        label: "🔇 Muffled (Medium)",
        kind: EffectKind::Muffled { cutoff_hz: 800.0 },
    },
    EffectDefinition {
        id: "muffled_heavy",
        label: "🔇 Muffled (Heavy)",
        kind: EffectKind::Muffled { cutoff_hz: 400.0 },
    },
    EffectDefinition {
        id: "underwater",
        label: "🌊 Underwater",
        kind: EffectKind::Underwater,
    },
    EffectDefinition {
        id: "phone",
        label: "📞 Phone/Radio",
        kind: EffectKind::Phone,
    },
    EffectDefinition {
        id: "echo",
        label: "🔊 Echo",
        kind: EffectKind::Echo {
            delay_ms: 300,
            decay: 0.5,
        },
    },
    EffectDefinition {
        id: "reverb",
        label: "🎭 Reverb (Hall)",
        kind: EffectKind::Reverb,
    },
    EffectDefinition {
        id: "speed_fast",
        label: "⚡ Speed Up (1.5x)",
        kind: EffectKind::SpeedChange { factor: 1.5 },
    },
    EffectDefinition {
        id: "speed_slow",
        label: "🐌 Slow Down (0.7x)",
        kind: EffectKind::SpeedChange { factor: 0.7 },
    },
    EffectDefinition {
        id: "pitch_up",
        label: "⬆️ Pitch Up",
        kind: EffectKind::PitchShift { semitones: 3 },
    },
    EffectDefinition {
        id: "pitch_down",
        label: "⬇️ Pitch Down",
        kind: EffectKind::PitchShift { semitones: -3 },
    },
    EffectDefinition {
        id: "nightmare",
        label: "👻 Nightmare Mode",
        kind: EffectKind::Nightmare,
    },
];

/// Read-only view over the fixed catalog. No dynamic registration.
#[derive(Debug, Default, Clone, Copy)]
pub struct EffectRegistry;

impl EffectRegistry {
    pub fn new() -> Self {
        Self
    }

    /// Find a catalog entry. `None` is surfaced as `InvalidEffect` upstream,
    /// before any transformation runs.
    pub fn lookup(&self, effect_id: &str) -> Option<&'static EffectDefinition> {
        CATALOG.iter().find(|effect| effect.id == effect_id)
    }

    /// All `(id, label)` pairs in catalog order, stable across calls.
    pub fn list(&self) -> impl Iterator<Item = (&'static str, &'static str)> {
        CATALOG.iter().map(|effect| (effect.id, effect.label))
    }

    pub fn len(&self) -> usize {
        CATALOG.len()
    }

    pub fn is_empty(&self) -> bool {
        CATALOG.is_empty()
    }
}

/// Apply one effect, producing a new buffer.
pub fn apply(kind: EffectKind, input: &AudioBuffer) -> Result<AudioBuffer> {
    match kind {
        EffectKind::Muffled { cutoff_hz } => {
            let mut out = input.clone();
            dsp::low_pass(&mut out, cutoff_hz);
            out.apply_gain_db(-3.0);
            Ok(out)
        }
        EffectKind::Underwater => {
            let mut out = input.clone();
            dsp::low_pass(&mut out, 300.0);
            out.apply_gain_db(-6.0);
            Ok(out)
        }
        EffectKind::Phone => {
            let mut out = input.clone();
            dsp::high_pass(&mut out, 300.0);
            dsp::low_pass(&mut out, 3000.0);
            dsp::compress_dynamic_range(&mut out);
            out.apply_gain_db(-2.0);
            Ok(out)
        }
        EffectKind::Echo { delay_ms, decay } => Ok(echo(input, delay_ms, decay)),
        EffectKind::Reverb => Ok(reverb(input)),
        EffectKind::SpeedChange { factor } => speed_change(input, factor),
        EffectKind::PitchShift { semitones } => {
            speed_change(input, 2.0_f32.powf(semitones as f32 / 12.0))
        }
        EffectKind::Nightmare => {
            let pitched = speed_change(input, 2.0_f32.powf(-5.0 / 12.0))?;
            let slowed = speed_change(&pitched, 0.7)?;
            let mut out = reverb(&slowed);
            out.apply_gain_db(-3.0);
            Ok(out)
        }
    }
}

/// One delayed copy, attenuated by `20 * (1 - decay)` dB, mixed onto the
/// original. The output grows by the delay interval.
fn echo(input: &AudioBuffer, delay_ms: u32, decay: f32) -> AudioBuffer {
    let mut copy = input.clone();
    copy.apply_gain_db(-(20.0 * (1.0 - decay)));
    let mut out = input.clone();
    let offset = out.frames_for_ms(delay_ms);
    out.overlay(&copy, offset);
    out
}

/// Five delayed, decayed copies at fixed offsets, each attenuated by
/// `20 / decay` dB, successively overlaid onto a mix seeded by the original.
fn reverb(input: &AudioBuffer) -> AudioBuffer {
    let mut out = input.clone();
    for (&delay_ms, &decay) in REVERB_DELAYS_MS.iter().zip(REVERB_DECAYS.iter()) {
        let mut copy = input.clone();
        copy.apply_gain_db(-(20.0 / decay));
        let offset = input.frames_for_ms(delay_ms);
        out.overlay(&copy, offset);
    }
    out
}

/// Reinterpret the sample stream at `rate * factor`, then resample back to
/// the original rate. This is the original product's semantics: duration and
/// pitch change jointly (factor 1.5 means 1.5x faster and higher-pitched).
fn speed_change(input: &AudioBuffer, factor: f32) -> Result<AudioBuffer> {
    if !(factor.is_finite() && factor > 0.0) {
        bail!("invalid speed factor: {factor}");
    }
    let rate = input.sample_rate();
    let reinterpreted = AudioBuffer::new(
        input.samples().to_vec(),
        (rate as f64 * factor as f64).round() as u32,
        input.channels(),
    );
    resample::resample(&reinterpreted, rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_finds_every_catalog_entry() {
        let registry = EffectRegistry::new();
        for (id, _) in registry.list() {
            assert!(registry.lookup(id).is_some(), "missing {id}");
        }
        assert_eq!(registry.len(), 12);
    }

    #[test]
    fn lookup_unknown_is_none() {
        assert!(EffectRegistry::new().lookup("chipmunk").is_none());
    }

    #[test]
    fn list_order_is_stable() {
        let registry = EffectRegistry::new();
        let first: Vec<_> = registry.list().collect();
        let second: Vec<_> = registry.list().collect();
        assert_eq!(first, second);
        assert_eq!(first[0].0, "muffled_light");
        assert_eq!(first[11].0, "nightmare");
    }
}
