//! OpenAI Whisper adapter (synchronous, segment timestamps).

use super::{
    BackendCapabilities, BackendKind, BackendTranscript, TranscribeOptions, TranscriptionBackend,
    TranscriptionInput,
};
use crate::error::{Result, SaumError};
use crate::openai::create_client;
use crate::transcript::SpeakerSegment;
use async_openai::types::{AudioResponseFormat, CreateTranscriptionRequestArgs};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// MIME types the OpenAI audio endpoints accept.
pub(crate) const OPENAI_AUDIO_MIME_TYPES: &[&str] = &[
    "audio/mpeg",
    "audio/mp4",
    "audio/wav",
    "audio/webm",
    "audio/flac",
    "audio/ogg",
    "video/mp4",
    "video/webm",
];

/// Per-call upload limit of the OpenAI audio endpoints (25 MB).
pub(crate) const OPENAI_MAX_INPUT_BYTES: u64 = 25 * 1024 * 1024;

static CAPABILITIES: BackendCapabilities = BackendCapabilities {
    mime_types: OPENAI_AUDIO_MIME_TYPES,
    max_input_bytes: OPENAI_MAX_INPUT_BYTES,
    supports_diarization: false,
    supports_translation: true,
};

/// OpenAI Whisper-based backend.
pub struct WhisperBackend {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
}

impl WhisperBackend {
    pub fn new(model: &str) -> Self {
        Self {
            client: create_client(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl TranscriptionBackend for WhisperBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Whisper
    }

    fn capabilities(&self) -> &BackendCapabilities {
        &CAPABILITIES
    }

    #[instrument(skip_all, fields(file = %input.file_name))]
    async fn transcribe(
        &self,
        input: &TranscriptionInput,
        options: &TranscribeOptions,
    ) -> Result<BackendTranscript> {
        debug!("Transcribing {} bytes with {}", input.bytes.len(), self.model);

        let mut request_builder = CreateTranscriptionRequestArgs::default();
        request_builder
            .file(async_openai::types::AudioInput::from_vec_u8(
                input.file_name.clone(),
                input.bytes.clone(),
            ))
            .model(&self.model)
            .response_format(AudioResponseFormat::VerboseJson);

        if let Some(lang) = options.language.as_deref() {
            request_builder.language(lang);
        }
        if let Some(hint) = options.hint_text() {
            request_builder.prompt(hint);
        }

        let request = request_builder
            .build()
            .map_err(|e| SaumError::Transcription(format!("Failed to build request: {}", e)))?;

        let response = self
            .client
            .audio()
            .transcribe_verbose_json(request)
            .await
            .map_err(|e| SaumError::OpenAI(format!("Whisper API error: {}", e)))?;

        let segments: Option<Vec<SpeakerSegment>> = response.segments.map(|segs| {
            segs.iter()
                .map(|s| SpeakerSegment {
                    speaker: None,
                    start: s.start as f64,
                    end: s.end as f64,
                    text: s.text.trim().to_string(),
                })
                .collect()
        });

        Ok(BackendTranscript {
            text: response.text.trim().to_string(),
            segments,
            model: self.model.clone(),
            was_truncated: false,
        })
    }
}
