//! OpenAI GPT-4o transcribe adapter (synchronous, plain text).
//!
//! Higher text accuracy than Whisper but no timestamps, so chunked runs rely
//! entirely on the planner's window offsets for alignment.

use super::{
    BackendCapabilities, BackendKind, BackendTranscript, TranscribeOptions, TranscriptionBackend,
    TranscriptionInput,
};
use crate::error::{Result, SaumError};
use crate::openai::create_client;
use async_openai::types::{AudioResponseFormat, CreateTranscriptionRequestArgs};
use async_trait::async_trait;
use tracing::{debug, instrument};

static CAPABILITIES: BackendCapabilities = BackendCapabilities {
    mime_types: super::whisper::OPENAI_AUDIO_MIME_TYPES,
    max_input_bytes: super::whisper::OPENAI_MAX_INPUT_BYTES,
    supports_diarization: false,
    supports_translation: false,
};

/// GPT-4o-transcribe backend.
pub struct Gpt4oBackend {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
}

impl Gpt4oBackend {
    pub fn new(model: &str) -> Self {
        Self {
            client: create_client(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl TranscriptionBackend for Gpt4oBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Gpt4o
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
            .response_format(AudioResponseFormat::Json);

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
            .transcribe(request)
            .await
            .map_err(|e| SaumError::OpenAI(format!("{} API error: {}", self.model, e)))?;

        Ok(BackendTranscript {
            text: response.text.trim().to_string(),
            segments: None,
            model: self.model.clone(),
            was_truncated: false,
        })
    }
}
