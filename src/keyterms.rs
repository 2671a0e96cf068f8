//! Keyterm extraction from audio.
//!
//! An auxiliary model listens to a chunk (or the whole file, for unchunked
//! runs) and names the proper nouns and domain terms it hears; those terms
//! are fed back into the transcription call as vocabulary hints. This is an
//! optional enhancement step: any failure degrades to "no hints".

use crate::backend::TranscriptionInput;
use crate::error::{Result, SaumError};
use crate::openai::create_client;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartAudio,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs, InputAudio,
    InputAudioFormat, ResponseFormat,
};
use base64::Engine;
use tracing::{debug, instrument};

const SYSTEM_PROMPT: &str = "You listen to audio and extract the terms a speech-to-text system is \
most likely to get wrong: proper nouns, names, acronyms, product names, and domain jargon. \
Return JSON: {\"terms\": [\"...\"]}. Return at most 20 terms. Return {\"terms\": []} if there \
are none.";

/// Audio-capable chat model used to pull keyterms out of a clip.
pub struct KeytermExtractor {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
}

impl KeytermExtractor {
    pub fn new() -> Self {
        Self::with_model("gpt-4o-audio-preview")
    }

    pub fn with_model(model: &str) -> Self {
        Self {
            client: create_client(),
            model: model.to_string(),
        }
    }

    /// Extract keyterms from `input`'s audio.
    #[instrument(skip_all, fields(file = %input.file_name))]
    pub async fn extract(&self, input: &TranscriptionInput) -> Result<Vec<String>> {
        let Some(format) = audio_format(&input.mime_type) else {
            debug!(
                "Skipping keyterm extraction, {} is not accepted as chat audio",
                input.mime_type
            );
            return Ok(Vec::new());
        };

        let encoded = base64::engine::general_purpose::STANDARD.encode(&input.bytes);

        let audio_part = ChatCompletionRequestUserMessageContentPart::InputAudio(
            ChatCompletionRequestMessageContentPartAudio {
                input_audio: InputAudio {
                    data: encoded,
                    format,
                },
            },
        );

        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_PROMPT)
                .build()
                .map_err(|e| SaumError::Transcription(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(vec![audio_part])
                .build()
                .map_err(|e| SaumError::Transcription(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(0.0)
            .response_format(ResponseFormat::JsonObject)
            .build()
            .map_err(|e| SaumError::Transcription(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| SaumError::OpenAI(format!("Keyterm extraction error: {}", e)))?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .unwrap_or_default();

        let terms = parse_terms(content);
        debug!("Extracted {} keyterms", terms.len());
        Ok(terms)
    }
}

impl Default for KeytermExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a MIME type to the chat audio formats the API accepts.
fn audio_format(mime_type: &str) -> Option<InputAudioFormat> {
    match mime_type {
        "audio/mpeg" => Some(InputAudioFormat::Mp3),
        "audio/wav" => Some(InputAudioFormat::Wav),
        _ => None,
    }
}

/// Parse the model's JSON reply into a deduplicated term list.
fn parse_terms(content: &str) -> Vec<String> {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(content) else {
        return Vec::new();
    };

    let Some(raw_terms) = value["terms"].as_array() else {
        return Vec::new();
    };

    let mut terms: Vec<String> = Vec::new();
    for term in raw_terms.iter().filter_map(|t| t.as_str()) {
        let term = term.trim();
        if term.is_empty() {
            continue;
        }
        if !terms.iter().any(|t| t.eq_ignore_ascii_case(term)) {
            terms.push(term.to_string());
        }
    }
    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_terms() {
        let terms = parse_terms(r#"{"terms": ["Kubernetes", "etcd", "kubernetes", " ", "Raft"]}"#);
        assert_eq!(terms, vec!["Kubernetes", "etcd", "Raft"]);
    }

    #[test]
    fn test_parse_terms_tolerates_garbage() {
        assert!(parse_terms("not json").is_empty());
        assert!(parse_terms(r#"{"terms": "oops"}"#).is_empty());
        assert!(parse_terms(r#"{"other": []}"#).is_empty());
    }

    #[test]
    fn test_audio_format_mapping() {
        assert!(matches!(audio_format("audio/mpeg"), Some(InputAudioFormat::Mp3)));
        assert!(matches!(audio_format("audio/wav"), Some(InputAudioFormat::Wav)));
        assert!(audio_format("video/mp4").is_none());
    }
}
