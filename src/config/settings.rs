//! Configuration settings for Saum.

use crate::backend::BackendKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub transcription: TranscriptionSettings,
    pub chunking: ChunkingSettings,
    pub optimization: OptimizationSettings,
    pub stitch: StitchSettings,
    pub correction: CorrectionSettings,
    pub deepgram: DeepgramSettings,
    pub webhook: WebhookSettings,
}


/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for temporary files (one workspace per run is created below it).
    pub temp_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            temp_dir: "/tmp/saum".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// How many chunk transcriptions may be in flight at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyMode {
    /// One chunk at a time, in order.
    Sequential,
    /// A fixed-size pool of in-flight chunks (the default).
    #[default]
    Bounded,
    /// Every chunk dispatched at once.
    Parallel,
}

impl std::str::FromStr for ConcurrencyMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sequential" => Ok(ConcurrencyMode::Sequential),
            "bounded" => Ok(ConcurrencyMode::Bounded),
            "parallel" | "unbounded" => Ok(ConcurrencyMode::Parallel),
            _ => Err(format!("Unknown concurrency mode: {}", s)),
        }
    }
}

/// Transcription service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    /// Transcription provider (whisper, gpt4o, deepgram).
    pub provider: BackendKind,
    /// Model identifier passed to the provider.
    pub model: String,
    /// Target language hint (ISO 639-1), if known.
    pub language: Option<String>,
    /// Concurrency mode for chunked runs.
    pub concurrency: ConcurrencyMode,
    /// Pool size when concurrency is bounded.
    pub max_concurrent_chunks: usize,
    /// Extract keyterms from the audio and feed them back as accuracy hints.
    pub keyterms: bool,
    /// Free-form vocabulary/context supplied to the backend (names, jargon).
    pub customization: Option<String>,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            provider: BackendKind::Whisper,
            model: "whisper-1".to_string(),
            language: None,
            concurrency: ConcurrencyMode::Bounded,
            max_concurrent_chunks: 3,
            keyterms: false,
            customization: None,
        }
    }
}

/// One step of the adaptive chunk-duration table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AdaptiveStep {
    /// Upper bound (inclusive) of total duration this step applies to, in seconds.
    pub max_duration_seconds: u32,
    /// Chunk duration used for files up to that bound, in seconds.
    pub chunk_seconds: u32,
}

/// Audio chunking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Files longer than this are split before transcription.
    pub threshold_seconds: u32,
    /// Safety buffer added to the threshold so files landing exactly on the
    /// boundary are not split.
    pub threshold_buffer_seconds: u32,
    /// Chunk duration in seconds. 0 selects a duration adaptively from the
    /// total duration via `adaptive_steps`.
    pub chunk_seconds: u32,
    /// Overlap carried across each interior seam, in seconds.
    pub overlap_seconds: u32,
    /// Monotonic step table mapping total duration to chunk duration,
    /// consulted when `chunk_seconds` is 0. Longer files get longer chunks to
    /// bound per-call latency without exploding the chunk count.
    pub adaptive_steps: Vec<AdaptiveStep>,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            threshold_seconds: 600,
            threshold_buffer_seconds: 10,
            chunk_seconds: 600,
            overlap_seconds: 20,
            adaptive_steps: vec![
                AdaptiveStep {
                    max_duration_seconds: 1200,
                    chunk_seconds: 300,
                },
                AdaptiveStep {
                    max_duration_seconds: 3600,
                    chunk_seconds: 600,
                },
                AdaptiveStep {
                    max_duration_seconds: 7200,
                    chunk_seconds: 900,
                },
            ],
        }
    }
}

/// Audio optimization (pre-transcription) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationSettings {
    /// Run the ffmpeg optimization pass before transcription.
    pub enabled: bool,
    /// Loudness normalization target in LUFS.
    pub loudness_target_lufs: f64,
    /// Apply FFT-based denoising.
    pub denoise: bool,
    /// Trim trailing silence.
    pub trim_silence: bool,
    /// Output sample rate in Hz (mono downmix is always applied).
    pub sample_rate: u32,
}

impl Default for OptimizationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            loudness_target_lufs: -16.0,
            denoise: true,
            trim_silence: true,
            sample_rate: 16_000,
        }
    }
}

/// Seam deduplication settings.
///
/// The window sizes are empirically chosen; changing them changes stitching
/// behavior, so they are configuration rather than constants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct StitchSettings {
    /// Words taken from each side of a seam as the match search window.
    pub search_window_words: usize,
    /// Longest word sequence attempted when searching for the overlap.
    pub max_match_words: usize,
    /// Shortest word sequence accepted as a real overlap match.
    pub min_match_words: usize,
    /// Words discarded from the right chunk when no match is found.
    pub fallback_skip_words: usize,
}

impl Default for StitchSettings {
    fn default() -> Self {
        Self {
            search_window_words: 200,
            max_match_words: 15,
            min_match_words: 4,
            fallback_skip_words: 5,
        }
    }
}

/// Correction pass settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionSettings {
    /// Run the correction pass over the stitched transcript.
    pub enabled: bool,
    /// Chat model used for correction.
    pub model: String,
    /// Transcripts up to this many words are corrected in a single call.
    pub single_call_word_limit: usize,
    /// Window size in words for re-chunked correction.
    pub window_words: usize,
    /// Words shared between consecutive correction windows.
    pub overlap_words: usize,
    /// Words of neighboring text passed as context hints on each side.
    pub context_words: usize,
}

impl Default for CorrectionSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            model: "gpt-4o-mini".to_string(),
            single_call_word_limit: 2000,
            window_words: 1000,
            overlap_words: 100,
            context_words: 150,
        }
    }
}

/// Deepgram backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeepgramSettings {
    /// Deepgram model identifier.
    pub model: String,
    /// Request speaker diarization.
    pub diarize: bool,
    /// API base URL (overridable for testing).
    pub base_url: String,
}

impl Default for DeepgramSettings {
    fn default() -> Self {
        Self {
            model: "nova-2".to_string(),
            diarize: true,
            base_url: "https://api.deepgram.com/v1".to_string(),
        }
    }
}

/// Webhook receiver and async-job polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookSettings {
    /// Bind address for the webhook listener.
    pub host: String,
    /// Bind port for the webhook listener.
    pub port: u16,
    /// Externally reachable base URL handed to async backends as the callback
    /// target. Defaults to http://{host}:{port} when unset.
    pub public_base_url: Option<String>,
    /// Interval between job-store polls, in milliseconds.
    pub poll_interval_ms: u64,
    /// Maximum wall-clock wait for an async job, in seconds.
    pub poll_timeout_seconds: u64,
    /// Job-store entries older than this are evicted, in seconds.
    pub job_ttl_seconds: u64,
    /// Period of the background eviction sweep, in seconds.
    pub sweep_interval_seconds: u64,
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8977,
            public_base_url: None,
            poll_interval_ms: 2000,
            poll_timeout_seconds: 600,
            job_ttl_seconds: 3600,
            sweep_interval_seconds: 300,
        }
    }
}

impl WebhookSettings {
    /// The callback URL async backends should deliver results to.
    pub fn callback_url(&self) -> String {
        match &self.public_base_url {
            Some(base) => format!("{}/webhooks/transcription", base.trim_end_matches('/')),
            None => format!("http://{}:{}/webhooks/transcription", self.host, self.port),
        }
    }

    /// Maximum number of poll attempts implied by the interval and timeout.
    pub fn max_poll_attempts(&self) -> u32 {
        let interval = self.poll_interval_ms.max(1);
        ((self.poll_timeout_seconds * 1000).div_ceil(interval)).max(1) as u32
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::SaumError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("saum")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded temp directory path.
    pub fn temp_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.temp_dir)
    }
}
