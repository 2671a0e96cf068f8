//! Transcription backend abstraction.
//!
//! Each vendor adapter sits behind [`TranscriptionBackend`], described by a
//! [`BackendCapabilities`] record and validated against it before any network
//! call. The set of backends is closed: [`BackendKind`] enumerates them and
//! [`create_backend`] is the registry keyed by it.
//!
//! Two execution shapes share the interface: synchronous adapters (OpenAI
//! Whisper, GPT-4o transcribe) block until the transcript returns; the
//! asynchronous adapter (Deepgram with callback delivery) submits, then polls
//! the shared [`JobStore`] until the webhook receiver writes the result in.

mod deepgram;
mod gpt4o;
mod jobs;
mod whisper;

pub use deepgram::DeepgramBackend;
pub use gpt4o::Gpt4oBackend;
pub use jobs::{JobState, JobStore, JobSummary};
pub use whisper::WhisperBackend;

use crate::config::Settings;
use crate::error::{Result, SaumError};
use crate::transcript::SpeakerSegment;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// OpenAI Whisper (synchronous, segment timestamps).
    #[default]
    Whisper,
    /// OpenAI GPT-4o transcribe (synchronous, plain text).
    Gpt4o,
    /// Deepgram prerecorded with callback delivery (asynchronous, diarized).
    Deepgram,
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "whisper" | "openai" => Ok(BackendKind::Whisper),
            "gpt4o" | "gpt-4o" => Ok(BackendKind::Gpt4o),
            "deepgram" => Ok(BackendKind::Deepgram),
            _ => Err(format!("Unknown transcription provider: {}", s)),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Whisper => write!(f, "whisper"),
            BackendKind::Gpt4o => write!(f, "gpt4o"),
            BackendKind::Deepgram => write!(f, "deepgram"),
        }
    }
}

/// What a backend accepts and can do.
#[derive(Debug, Clone)]
pub struct BackendCapabilities {
    /// MIME types the backend accepts.
    pub mime_types: &'static [&'static str],
    /// Maximum input size per call, in bytes.
    pub max_input_bytes: u64,
    /// Whether the backend can label speakers.
    pub supports_diarization: bool,
    /// Whether the backend can translate while transcribing.
    pub supports_translation: bool,
}

/// The unit of work handed to a backend: either the whole file or one chunk.
#[derive(Debug, Clone)]
pub struct TranscriptionInput {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub file_name: String,
}

impl TranscriptionInput {
    /// Read a file into an input, guessing the MIME type from the extension.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.mp3")
            .to_string();
        Ok(Self {
            bytes,
            mime_type: crate::media::mime_for_path(path).to_string(),
            file_name,
        })
    }
}

/// Per-call options assembled by the pipeline.
#[derive(Debug, Clone, Default)]
pub struct TranscribeOptions {
    /// Target language hint (ISO 639-1).
    pub language: Option<String>,
    /// Accuracy hints extracted from this input's audio.
    pub keyterms: Vec<String>,
    /// Free-form vocabulary/context from the run configuration.
    pub customization: Option<String>,
}

impl TranscribeOptions {
    /// Collapse keyterms and customization into one vocabulary hint string.
    pub fn hint_text(&self) -> Option<String> {
        let mut parts: Vec<String> = Vec::new();
        if let Some(custom) = self.customization.as_deref() {
            if !custom.trim().is_empty() {
                parts.push(custom.trim().to_string());
            }
        }
        if !self.keyterms.is_empty() {
            parts.push(self.keyterms.join(", "));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(". "))
        }
    }
}

/// What a backend hands back for one input.
#[derive(Debug, Clone)]
pub struct BackendTranscript {
    /// Transcript text (chunk-local timeline for chunked calls).
    pub text: String,
    /// Per-utterance segments, when the backend produced them.
    pub segments: Option<Vec<SpeakerSegment>>,
    /// Model that served the call.
    pub model: String,
    /// Whether the backend reported truncating its output.
    pub was_truncated: bool,
}

/// Trait implemented by every vendor adapter.
#[async_trait]
pub trait TranscriptionBackend: Send + Sync {
    /// Which backend this is.
    fn kind(&self) -> BackendKind;

    /// Capability record used for pre-call validation.
    fn capabilities(&self) -> &BackendCapabilities;

    /// Check an input against this backend's capabilities before any network
    /// call, collapsing vendor-specific limits into the shared error taxonomy.
    fn validate(&self, input: &TranscriptionInput) -> Result<()> {
        let caps = self.capabilities();
        if !caps.mime_types.contains(&input.mime_type.as_str()) {
            return Err(SaumError::UnsupportedMediaType {
                backend: self.kind().to_string(),
                mime_type: input.mime_type.clone(),
            });
        }
        if input.bytes.len() as u64 > caps.max_input_bytes {
            return Err(SaumError::InputTooLarge {
                backend: self.kind().to_string(),
                size: input.bytes.len() as u64,
                limit: caps.max_input_bytes,
            });
        }
        Ok(())
    }

    /// Transcribe one input. Timestamps in the result are relative to the
    /// input's own timeline.
    async fn transcribe(
        &self,
        input: &TranscriptionInput,
        options: &TranscribeOptions,
    ) -> Result<BackendTranscript>;
}

/// Construct the adapter for `kind`.
///
/// The job store is only used by asynchronous backends but is threaded through
/// uniformly so callers need no per-backend wiring.
pub fn create_backend(
    kind: BackendKind,
    settings: &Settings,
    jobs: Arc<JobStore>,
) -> Result<Box<dyn TranscriptionBackend>> {
    match kind {
        BackendKind::Whisper => Ok(Box::new(WhisperBackend::new(
            &settings.transcription.model,
        ))),
        BackendKind::Gpt4o => {
            let model = if settings.transcription.model.starts_with("gpt-4o") {
                settings.transcription.model.clone()
            } else {
                "gpt-4o-transcribe".to_string()
            };
            Ok(Box::new(Gpt4oBackend::new(&model)))
        }
        BackendKind::Deepgram => {
            let api_key = std::env::var("DEEPGRAM_API_KEY").map_err(|_| {
                SaumError::Config(
                    "DEEPGRAM_API_KEY not set. Set it with: export DEEPGRAM_API_KEY='...'"
                        .to_string(),
                )
            })?;
            Ok(Box::new(DeepgramBackend::new(
                api_key,
                &settings.deepgram,
                &settings.webhook,
                jobs,
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeBackend {
        caps: BackendCapabilities,
    }

    #[async_trait]
    impl TranscriptionBackend for FakeBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::Whisper
        }

        fn capabilities(&self) -> &BackendCapabilities {
            &self.caps
        }

        async fn transcribe(
            &self,
            _input: &TranscriptionInput,
            _options: &TranscribeOptions,
        ) -> Result<BackendTranscript> {
            unreachable!("validation tests never call transcribe")
        }
    }

    fn fake() -> FakeBackend {
        FakeBackend {
            caps: BackendCapabilities {
                mime_types: &["audio/mpeg", "audio/wav"],
                max_input_bytes: 100,
                supports_diarization: false,
                supports_translation: false,
            },
        }
    }

    fn input(mime: &str, size: usize) -> TranscriptionInput {
        TranscriptionInput {
            bytes: vec![0u8; size],
            mime_type: mime.to_string(),
            file_name: "a.mp3".to_string(),
        }
    }

    #[test]
    fn test_validate_accepts_supported_input() {
        assert!(fake().validate(&input("audio/mpeg", 100)).is_ok());
    }

    #[test]
    fn test_validate_rejects_unsupported_mime() {
        let err = fake().validate(&input("video/x-matroska", 10)).unwrap_err();
        assert!(matches!(err, SaumError::UnsupportedMediaType { .. }));
    }

    #[test]
    fn test_validate_rejects_oversized_input() {
        let err = fake().validate(&input("audio/wav", 101)).unwrap_err();
        match err {
            SaumError::InputTooLarge { size, limit, .. } => {
                assert_eq!(size, 101);
                assert_eq!(limit, 100);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_backend_kind_parsing() {
        assert_eq!("whisper".parse::<BackendKind>().unwrap(), BackendKind::Whisper);
        assert_eq!("Deepgram".parse::<BackendKind>().unwrap(), BackendKind::Deepgram);
        assert!("siri".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_hint_text_combines_customization_and_keyterms() {
        let options = TranscribeOptions {
            language: None,
            keyterms: vec!["Kubernetes".to_string(), "etcd".to_string()],
            customization: Some("Weekly infra sync".to_string()),
        };
        assert_eq!(
            options.hint_text().unwrap(),
            "Weekly infra sync. Kubernetes, etcd"
        );
        assert!(TranscribeOptions::default().hint_text().is_none());
    }
}
