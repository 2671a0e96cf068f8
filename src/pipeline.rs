//! Pipeline orchestrator.
//!
//! One run moves strictly forward through Preprocess, Transcribe, and
//! Postprocess; failure is reachable from any stage. All temporary artifacts
//! live in a per-run workspace created during Preprocess and released
//! unconditionally when the run exits, whichever stage it terminated in.

use crate::backend::{
    create_backend, BackendKind, JobStore, TranscribeOptions, TranscriptionBackend,
    TranscriptionInput,
};
use crate::config::Settings;
use crate::correction::{correct_transcript, CorrectionModel, OpenAiCorrector};
use crate::error::{Result, SaumError};
use crate::executor::{execute_chunks, ConcurrencyPolicy};
use crate::keyterms::KeytermExtractor;
use crate::media::{fetch_remote, optimize, probe_duration, split, AudioArtifact};
use crate::plan::{plan_chunks, resolve_chunk_seconds, should_chunk};
use crate::stitch::{merge_segments, stitch};
use crate::timestamp::renormalize;
use crate::transcript::{word_count, ChunkResult, PipelineResult, RunMetadata};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Stage of one pipeline run. Failure is implicit and reachable from any of
/// the first three.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Preprocess,
    Transcribe,
    Postprocess,
    Done,
}

impl std::fmt::Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStage::Preprocess => write!(f, "preprocess"),
            RunStage::Transcribe => write!(f, "transcribe"),
            RunStage::Postprocess => write!(f, "postprocess"),
            RunStage::Done => write!(f, "done"),
        }
    }
}

/// Where the source audio comes from.
#[derive(Debug, Clone)]
pub enum MediaSource {
    /// A file already on disk.
    LocalFile(PathBuf),
    /// A direct media URL fetched into the workspace during Preprocess.
    RemoteUrl(String),
}

impl MediaSource {
    /// Classify CLI input: an http(s) URL or a local path.
    pub fn parse(input: &str) -> Result<Self> {
        if input.starts_with("http://") || input.starts_with("https://") {
            return Ok(MediaSource::RemoteUrl(input.to_string()));
        }
        let path = PathBuf::from(input);
        if path.exists() {
            Ok(MediaSource::LocalFile(path))
        } else {
            Err(SaumError::InvalidInput(format!(
                "Source '{}' is neither a URL nor an existing file",
                input
            )))
        }
    }
}

/// Per-run configuration, read-only during execution except for the duration
/// back-filled by Preprocess.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub provider: BackendKind,
    pub language: Option<String>,
    pub keyterms: bool,
    pub correction: bool,
    pub optimize: bool,
    /// Split even when the duration is under the chunking threshold.
    pub force_chunking: bool,
    pub customization: Option<String>,
    /// Filled in by Preprocess once the duration is known.
    pub duration_seconds: Option<f64>,
}

impl RunConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            provider: settings.transcription.provider,
            language: settings.transcription.language.clone(),
            keyterms: settings.transcription.keyterms,
            correction: settings.correction.enabled,
            optimize: settings.optimization.enabled,
            force_chunking: false,
            customization: settings.transcription.customization.clone(),
            duration_seconds: None,
        }
    }
}

/// Per-run temporary storage. Created once during Preprocess; `release`
/// is the single cleanup action for everything the run materialized
/// (fetched sources, optimized audio, chunk files).
struct Workspace {
    dir: Option<tempfile::TempDir>,
}

impl Workspace {
    fn create(base: &Path) -> Result<Self> {
        std::fs::create_dir_all(base)?;
        let dir = tempfile::Builder::new().prefix("run_").tempdir_in(base)?;
        debug!("Created workspace {}", dir.path().display());
        Ok(Self { dir: Some(dir) })
    }

    fn path(&self) -> &Path {
        self.dir
            .as_ref()
            .expect("workspace used after release")
            .path()
    }

    /// Delete the workspace. A failed deletion is logged and ignored; cleanup
    /// problems never change a run's result.
    fn release(mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                warn!("Workspace cleanup failed for {}: {}", path.display(), e);
            }
        }
    }
}

/// The transcription pipeline.
pub struct Pipeline {
    settings: Settings,
    backend: Arc<dyn TranscriptionBackend>,
    corrector: Arc<dyn CorrectionModel>,
    keyterm_extractor: KeytermExtractor,
    jobs: Arc<JobStore>,
}

impl Pipeline {
    /// Build a pipeline from settings, with a private job store.
    pub fn new(settings: Settings) -> Result<Self> {
        Self::with_job_store(settings, Arc::new(JobStore::new()))
    }

    /// Build a pipeline sharing an existing job store (the serve path, where
    /// several concurrent runs are fed by one webhook receiver).
    pub fn with_job_store(settings: Settings, jobs: Arc<JobStore>) -> Result<Self> {
        let backend: Arc<dyn TranscriptionBackend> =
            create_backend(settings.transcription.provider, &settings, Arc::clone(&jobs))?.into();
        let corrector: Arc<dyn CorrectionModel> =
            Arc::new(OpenAiCorrector::new(&settings.correction.model));

        Ok(Self {
            settings,
            backend,
            corrector,
            keyterm_extractor: KeytermExtractor::new(),
            jobs,
        })
    }

    /// Build a pipeline with explicit components (used by tests).
    pub fn with_components(
        settings: Settings,
        backend: Arc<dyn TranscriptionBackend>,
        corrector: Arc<dyn CorrectionModel>,
        jobs: Arc<JobStore>,
    ) -> Self {
        Self {
            settings,
            backend,
            corrector,
            keyterm_extractor: KeytermExtractor::new(),
            jobs,
        }
    }

    /// The job store backing this pipeline's async backends.
    pub fn job_store(&self) -> Arc<JobStore> {
        Arc::clone(&self.jobs)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Whether the configured provider delivers results through the webhook
    /// receiver (and therefore needs a listener running).
    pub fn needs_webhook_listener(&self) -> bool {
        self.settings.transcription.provider == BackendKind::Deepgram
    }

    /// Run the full pipeline for one source.
    #[instrument(skip_all)]
    pub async fn run(&self, source: MediaSource, config: RunConfig) -> Result<PipelineResult> {
        let workspace = Workspace::create(&self.settings.temp_dir())?;
        let result = self.run_inner(source, config, &workspace).await;
        workspace.release();
        result
    }

    async fn run_inner(
        &self,
        source: MediaSource,
        mut config: RunConfig,
        workspace: &Workspace,
    ) -> Result<PipelineResult> {
        let mut metadata = RunMetadata::default();

        // --- Preprocess ---
        info!("Stage: {}", RunStage::Preprocess);

        let source_path = match source {
            MediaSource::LocalFile(path) => path,
            MediaSource::RemoteUrl(url) => fetch_remote(&url, workspace.path()).await?,
        };

        let audio_path = if config.optimize {
            match optimize(&source_path, workspace.path(), &self.settings.optimization).await {
                Ok(optimized) => {
                    metadata.optimized = true;
                    optimized
                }
                Err(e) => {
                    warn!("Audio optimization failed, using unoptimized input: {}", e);
                    source_path.clone()
                }
            }
        } else {
            source_path.clone()
        };

        let duration = probe_duration(&audio_path).await?;
        config.duration_seconds = Some(duration);
        metadata.duration_seconds = duration;

        let chunked =
            config.force_chunking || should_chunk(duration, &self.settings.chunking);
        info!(
            "Duration {:.1}s, {}",
            duration,
            if chunked { "chunking" } else { "single call" }
        );

        // Whole-file keyterms only for unchunked runs; chunked runs extract
        // per chunk instead.
        let mut file_keyterms: Vec<String> = Vec::new();
        if config.keyterms && !chunked {
            let input = TranscriptionInput::from_path(&audio_path).await?;
            file_keyterms = self.extract_keyterms_degraded(&input).await;
        }

        // --- Transcribe ---
        info!("Stage: {}", RunStage::Transcribe);

        let chunk_results = if !chunked {
            let input = TranscriptionInput::from_path(&audio_path).await?;
            self.backend.validate(&input)?;

            let options = TranscribeOptions {
                language: config.language.clone(),
                keyterms: file_keyterms.clone(),
                customization: config.customization.clone(),
            };
            let transcript = self.backend.transcribe(&input, &options).await?;

            let mut result = ChunkResult::new(transcript.text, 0.0, duration);
            result.model = Some(transcript.model);
            result.was_truncated = transcript.was_truncated;
            result.segments = transcript.segments;
            result.keyterms = (!file_keyterms.is_empty()).then(|| file_keyterms.clone());
            vec![result]
        } else {
            let chunk_seconds = resolve_chunk_seconds(duration, &self.settings.chunking);
            let specs = plan_chunks(
                duration,
                chunk_seconds,
                self.settings.chunking.overlap_seconds,
            );
            info!(
                "Planned {} chunks of {}s with {}s overlap",
                specs.len(),
                chunk_seconds,
                self.settings.chunking.overlap_seconds
            );

            let artifacts = split(&audio_path, &specs, workspace.path()).await?;

            let policy = ConcurrencyPolicy::from_settings(&self.settings.transcription);
            let progress = Arc::new(AtomicU64::new(0));

            let pb = ProgressBar::new(specs.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("  {spinner:.green} Chunks    [{bar:30.cyan/blue}] {pos}/{len}")
                    .unwrap()
                    .progress_chars("█▓░"),
            );
            let ticker = tokio::spawn({
                let pb = pb.clone();
                let progress = Arc::clone(&progress);
                async move {
                    loop {
                        pb.set_position(progress.load(Ordering::Relaxed));
                        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                    }
                }
            });

            let result = execute_chunks(artifacts, policy, Some(progress), |artifact| {
                self.transcribe_chunk(artifact, &config)
            })
            .await;

            ticker.abort();
            pb.finish_and_clear();
            result?
        };

        let text = stitch(&chunk_results, &self.settings.stitch);
        let segments = merge_segments(&chunk_results);

        metadata.chunk_count = chunk_results.len();
        metadata.chunked = chunked;
        metadata.was_truncated = chunk_results.iter().any(|c| c.was_truncated);
        for chunk in &chunk_results {
            if let Some(model) = &chunk.model {
                if !metadata.models.contains(model) {
                    metadata.models.push(model.clone());
                }
            }
            if let Some(terms) = &chunk.keyterms {
                for term in terms {
                    if !metadata.keyterms.iter().any(|t| t.eq_ignore_ascii_case(term)) {
                        metadata.keyterms.push(term.clone());
                    }
                }
            }
        }

        // --- Postprocess ---
        info!("Stage: {}", RunStage::Postprocess);

        let final_text = if config.correction {
            let outcome =
                correct_transcript(&text, self.corrector.as_ref(), &self.settings.correction)
                    .await;
            metadata.correction_count = outcome.correction_count;
            metadata.correction_ms = outcome.elapsed_ms;
            if outcome.failed_windows > 0 {
                warn!(
                    "{} of {} correction windows fell back to uncorrected text",
                    outcome.failed_windows, outcome.window_count
                );
            }
            outcome.text
        } else {
            text
        };

        metadata.word_count = word_count(&final_text);
        info!("Stage: {}", RunStage::Done);

        Ok(PipelineResult {
            text: final_text,
            segments,
            metadata,
        })
    }

    /// Transcribe one chunk: optional chunk-local keyterm extraction, backend
    /// call, then renormalization onto the global timeline.
    async fn transcribe_chunk(
        &self,
        artifact: AudioArtifact,
        config: &RunConfig,
    ) -> Result<ChunkResult> {
        let input = TranscriptionInput::from_path(&artifact.path).await?;
        self.backend.validate(&input)?;

        let keyterms = if config.keyterms {
            self.extract_keyterms_degraded(&input).await
        } else {
            Vec::new()
        };

        let options = TranscribeOptions {
            language: config.language.clone(),
            keyterms: keyterms.clone(),
            customization: config.customization.clone(),
        };

        let spec = &artifact.spec;
        let transcript = self.backend.transcribe(&input, &options).await?;

        let mut result = ChunkResult::new(transcript.text, spec.start, spec.end);
        result.has_overlap_before = spec.has_overlap_before;
        result.has_overlap_after = spec.has_overlap_after;
        result.model = Some(transcript.model);
        result.was_truncated = transcript.was_truncated;
        result.segments = transcript.segments;
        result.keyterms = (!keyterms.is_empty()).then_some(keyterms);

        Ok(renormalize(&result, spec.start))
    }

    /// Keyterm extraction with graceful degradation: a failure means no
    /// hints, never a failed chunk.
    async fn extract_keyterms_degraded(&self, input: &TranscriptionInput) -> Vec<String> {
        match self.keyterm_extractor.extract(input).await {
            Ok(terms) => terms,
            Err(e) => {
                warn!("Keyterm extraction failed, continuing without hints: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_source_parse() {
        assert!(matches!(
            MediaSource::parse("https://example.com/a.mp3").unwrap(),
            MediaSource::RemoteUrl(_)
        ));
        assert!(MediaSource::parse("/definitely/not/a/real/file.mp3").is_err());
    }

    #[test]
    fn test_media_source_parse_local_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let source = MediaSource::parse(file.path().to_str().unwrap()).unwrap();
        assert!(matches!(source, MediaSource::LocalFile(_)));
    }

    #[test]
    fn test_workspace_release_removes_directory() {
        let base = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(base.path()).unwrap();
        let path = workspace.path().to_path_buf();

        std::fs::write(path.join("chunk_0000.mp3"), b"fake").unwrap();
        assert!(path.exists());

        workspace.release();
        assert!(!path.exists());
    }

    #[test]
    fn test_run_config_from_settings() {
        let mut settings = Settings::default();
        settings.transcription.keyterms = true;
        settings.correction.enabled = true;
        settings.transcription.language = Some("no".to_string());

        let config = RunConfig::from_settings(&settings);
        assert!(config.keyterms);
        assert!(config.correction);
        assert_eq!(config.language.as_deref(), Some("no"));
        assert!(!config.force_chunking);
        assert!(config.duration_seconds.is_none());
    }

    #[test]
    fn test_run_stage_display() {
        assert_eq!(RunStage::Preprocess.to_string(), "preprocess");
        assert_eq!(RunStage::Done.to_string(), "done");
    }
}
