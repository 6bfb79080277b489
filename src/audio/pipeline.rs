// The per-job processing pipeline: scratch setup, decode, transform, encode.
//
// Stage boundaries double as progress checkpoints. CPU-bound stages run on
// the blocking pool so queue submissions and progress delivery stay
// responsive while a large clip is being processed.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use tempfile::TempDir;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ServiceConfig;
use crate::error::PipelineError;
use crate::progress::{checkpoint, report_best_effort, ProgressReporter};
use crate::types::Job;

use super::buffer::AudioBuffer;
use super::codec;
use super::effects::{self, EffectDefinition, EffectRegistry};

/// Output of a successful pipeline run, ready for the result sink.
#[derive(Debug)]
pub struct ProcessedClip {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub caption: String,
}

/// Job-scoped scratch directory. Dropping the guard removes the directory,
/// on every exit path.
struct JobScratch {
    dir: TempDir,
}

impl JobScratch {
    fn create(root: Option<&Path>, job_id: &Uuid) -> Result<Self> {
        let prefix = format!("remixd_{job_id}_");
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let dir = match root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .context("failed to create scratch directory")?;
        Ok(Self { dir })
    }

    fn input_path(&self) -> PathBuf {
        self.dir.path().join("input")
    }
}

/// Decode → transform → encode for one job at a time. Stateless across jobs;
/// safe to share behind an `Arc`.
pub struct AudioPipeline {
    registry: EffectRegistry,
    bitrate_kbps: u32,
    scratch_root: Option<PathBuf>,
}

impl AudioPipeline {
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            registry: EffectRegistry::new(),
            bitrate_kbps: config.mp3_bitrate_kbps,
            scratch_root: config.scratch_root.clone(),
        }
    }

    pub fn registry(&self) -> &EffectRegistry {
        &self.registry
    }

    /// Run one job's raw bytes through the full pipeline.
    ///
    /// Progress failures are swallowed; a stage failure aborts the remaining
    /// stages and discards partial output. The scratch directory is removed
    /// whichever way this returns.
    pub async fn process(
        &self,
        job: &Job,
        effect: &'static EffectDefinition,
        input_bytes: Vec<u8>,
        progress: &dyn ProgressReporter,
    ) -> Result<ProcessedClip, PipelineError> {
        let scratch = JobScratch::create(self.scratch_root.as_deref(), &job.id)
            .map_err(PipelineError::Decode)?;
        debug!("📂 job {} scratch at {:?}", job.id, scratch.dir.path());

        report_best_effort(
            progress,
            &job.destination,
            checkpoint::LOADING,
            "Loading audio",
        )
        .await;
        let decoded = self
            .decode_stage(&scratch, &job.payload.filename, input_bytes)
            .await?;

        report_best_effort(
            progress,
            &job.destination,
            checkpoint::APPLYING,
            &format!("Applying {}", effect.label),
        )
        .await;
        let kind = effect.kind;
        let transformed = tokio::task::spawn_blocking(move || effects::apply(kind, &decoded))
            .await
            .map_err(|e| PipelineError::Transform(stage_panic(e)))?
            .map_err(PipelineError::Transform)?;

        report_best_effort(
            progress,
            &job.destination,
            checkpoint::EXPORTING,
            "Exporting",
        )
        .await;
        let bitrate = self.bitrate_kbps;
        let bytes = tokio::task::spawn_blocking(move || codec::encode_mp3(&transformed, bitrate))
            .await
            .map_err(|e| PipelineError::Encode(stage_panic(e)))?
            .map_err(PipelineError::Encode)?;

        let filename = suggested_filename(job.payload.filename.as_deref(), effect.id);
        info!(
            "🎛️ job {} processed: {} -> {} bytes ({})",
            job.id,
            job.payload.id,
            bytes.len(),
            filename
        );

        Ok(ProcessedClip {
            bytes,
            filename,
            caption: format!("✅ Effect applied: {} 🎵", effect.label),
        })
    }

    async fn decode_stage(
        &self,
        scratch: &JobScratch,
        original_name: &Option<String>,
        input_bytes: Vec<u8>,
    ) -> Result<AudioBuffer, PipelineError> {
        let path = scratch.input_path();
        let hint = original_name
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_string());
        tokio::task::spawn_blocking(move || -> Result<AudioBuffer> {
            std::fs::write(&path, &input_bytes).context("failed to write scratch input")?;
            codec::decode_file(&path, hint.as_deref())
        })
        .await
        .map_err(|e| PipelineError::Decode(stage_panic(e)))?
        .map_err(PipelineError::Decode)
    }
}

fn stage_panic(e: tokio::task::JoinError) -> anyhow::Error {
    anyhow!("pipeline stage panicked: {e}")
}

/// `{base}_{effect_id}.mp3`, base taken from the payload filename with its
/// extension dropped and unsafe characters collapsed to underscores.
pub fn suggested_filename(original: Option<&str>, effect_id: &str) -> String {
    let base = original
        .map(Path::new)
        .and_then(|p| p.file_stem())
        .and_then(|s| s.to_str())
        .map(sanitize_base)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "audio".to_string());
    format!("{base}_{effect_id}.mp3")
}

fn sanitize_base(name: &str) -> String {
    static UNSAFE_CHARS: OnceLock<Regex> = OnceLock::new();
    let re = UNSAFE_CHARS.get_or_init(|| {
        Regex::new(r"[^A-Za-z0-9._-]+").expect("filename sanitizer pattern is valid")
    });
    re.replace_all(name, "_").trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggested_filename_sanitizes_and_appends_effect() {
        assert_eq!(
            suggested_filename(Some("My Song.ogg"), "echo"),
            "My_Song_echo.mp3"
        );
        assert_eq!(
            suggested_filename(Some("voice note (2).m4a"), "phone"),
            "voice_note_2_phone.mp3"
        );
    }

    #[test]
    fn suggested_filename_falls_back_to_audio() {
        assert_eq!(suggested_filename(None, "reverb"), "audio_reverb.mp3");
        assert_eq!(suggested_filename(Some("???"), "reverb"), "audio_reverb.mp3");
    }
}
