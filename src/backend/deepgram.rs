//! Deepgram prerecorded adapter (asynchronous, webhook delivery).
//!
//! Submission posts the audio with a callback URL and returns a request id
//! immediately; Deepgram later POSTs the result to the webhook receiver,
//! which writes it into the shared [`JobStore`]. This adapter then polls the
//! store on a fixed interval up to the configured wall-clock budget.

use super::{
    BackendCapabilities, BackendKind, BackendTranscript, JobState, JobStore, TranscribeOptions,
    TranscriptionBackend, TranscriptionInput,
};
use crate::config::{DeepgramSettings, WebhookSettings};
use crate::error::{Result, SaumError};
use crate::transcript::SpeakerSegment;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

static CAPABILITIES: BackendCapabilities = BackendCapabilities {
    mime_types: &[
        "audio/mpeg",
        "audio/wav",
        "audio/flac",
        "audio/ogg",
        "audio/opus",
        "audio/mp4",
        "audio/aac",
        "video/mp4",
        "video/webm",
    ],
    max_input_bytes: 2 * 1024 * 1024 * 1024,
    supports_diarization: true,
    supports_translation: false,
};

/// Acknowledgement returned by a callback submission.
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    request_id: String,
}

/// Deepgram backend with callback delivery.
pub struct DeepgramBackend {
    http: reqwest::Client,
    api_key: String,
    model: String,
    diarize: bool,
    base_url: String,
    callback_url: String,
    jobs: Arc<JobStore>,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

impl DeepgramBackend {
    pub fn new(
        api_key: String,
        settings: &DeepgramSettings,
        webhook: &WebhookSettings,
        jobs: Arc<JobStore>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model: settings.model.clone(),
            diarize: settings.diarize,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            callback_url: webhook.callback_url(),
            jobs,
            poll_interval: Duration::from_millis(webhook.poll_interval_ms),
            max_poll_attempts: webhook.max_poll_attempts(),
        }
    }

    /// Submit audio for transcription; returns the normalized job id.
    async fn submit(&self, input: &TranscriptionInput, options: &TranscribeOptions) -> Result<String> {
        let mut query: Vec<(String, String)> = vec![
            ("model".to_string(), self.model.clone()),
            ("punctuate".to_string(), "true".to_string()),
            ("smart_format".to_string(), "true".to_string()),
            ("diarize".to_string(), self.diarize.to_string()),
            ("callback".to_string(), self.callback_url.clone()),
        ];
        if let Some(lang) = options.language.as_deref() {
            query.push(("language".to_string(), lang.to_string()));
        }
        for term in &options.keyterms {
            query.push(("keywords".to_string(), term.clone()));
        }

        let response = self
            .http
            .post(format!("{}/listen", self.base_url))
            .query(&query)
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", input.mime_type.clone())
            .body(input.bytes.clone())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SaumError::Backend(format!(
                "Deepgram submission failed ({}): {}",
                status,
                body.trim()
            )));
        }

        let ack: SubmitResponse = response.json().await?;
        Ok(ack.request_id.trim().to_ascii_lowercase())
    }

    /// Poll the job store until the webhook delivers, up to the attempt budget.
    async fn await_delivery(&self, job_id: &str) -> Result<serde_json::Value> {
        for attempt in 1..=self.max_poll_attempts {
            tokio::time::sleep(self.poll_interval).await;

            match self.jobs.state(job_id).await {
                Some(JobState::Completed(payload)) => {
                    debug!("Job {} delivered after {} polls", job_id, attempt);
                    self.jobs.remove(job_id).await;
                    return Ok(payload);
                }
                Some(JobState::Failed(reason)) => {
                    self.jobs.remove(job_id).await;
                    return Err(SaumError::Backend(format!(
                        "Deepgram job {} failed: {}",
                        job_id, reason
                    )));
                }
                Some(JobState::Pending) | Some(JobState::Processing) | None => {}
            }
        }

        self.jobs.remove(job_id).await;
        Err(SaumError::PollTimeout {
            job_id: job_id.to_string(),
            attempts: self.max_poll_attempts,
            waited_seconds: self.poll_interval.as_secs_f64() * self.max_poll_attempts as f64,
        })
    }
}

#[async_trait]
impl TranscriptionBackend for DeepgramBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Deepgram
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
        let job_id = self.submit(input, options).await?;
        info!("Submitted Deepgram job {}", job_id);

        self.jobs.create(&job_id).await;
        self.jobs.mark_processing(&job_id).await;

        let payload = self.await_delivery(&job_id).await?;
        parse_callback_payload(&payload, &self.model)
    }
}

/// Parse a delivered callback payload into a transcript.
///
/// Diarized words are folded into per-speaker utterance segments; a speaker
/// change starts a new segment.
pub(crate) fn parse_callback_payload(
    payload: &serde_json::Value,
    model: &str,
) -> Result<BackendTranscript> {
    let alternative = payload["results"]["channels"][0]["alternatives"]
        .get(0)
        .ok_or_else(|| {
            SaumError::Backend("Deepgram payload is missing results.channels[0].alternatives".into())
        })?;

    let text = alternative["transcript"]
        .as_str()
        .unwrap_or_default()
        .trim()
        .to_string();

    let segments = alternative["words"].as_array().and_then(|words| {
        let mut segments: Vec<SpeakerSegment> = Vec::new();

        for word in words {
            let token = word["punctuated_word"]
                .as_str()
                .or_else(|| word["word"].as_str())?
                .to_string();
            let start = word["start"].as_f64()?;
            let end = word["end"].as_f64()?;
            let speaker = word["speaker"].as_u64().map(|s| s as u32);

            match segments.last_mut() {
                Some(current) if current.speaker == speaker => {
                    current.end = end;
                    current.text.push(' ');
                    current.text.push_str(&token);
                }
                _ => segments.push(SpeakerSegment {
                    speaker,
                    start,
                    end,
                    text: token,
                }),
            }
        }

        if segments.is_empty() {
            None
        } else {
            Some(segments)
        }
    });

    Ok(BackendTranscript {
        text,
        segments,
        model: model.to_string(),
        was_truncated: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_payload() -> serde_json::Value {
        json!({
            "metadata": { "request_id": "ABC-123" },
            "results": {
                "channels": [{
                    "alternatives": [{
                        "transcript": "hello there general kenobi",
                        "confidence": 0.98,
                        "words": [
                            { "word": "hello", "punctuated_word": "Hello", "start": 0.1, "end": 0.4, "speaker": 0 },
                            { "word": "there", "punctuated_word": "there.", "start": 0.4, "end": 0.7, "speaker": 0 },
                            { "word": "general", "punctuated_word": "General", "start": 1.0, "end": 1.3, "speaker": 1 },
                            { "word": "kenobi", "punctuated_word": "Kenobi.", "start": 1.3, "end": 1.8, "speaker": 1 }
                        ]
                    }]
                }]
            }
        })
    }

    #[test]
    fn test_parse_callback_payload_groups_by_speaker() {
        let transcript = parse_callback_payload(&sample_payload(), "nova-2").unwrap();

        assert_eq!(transcript.text, "hello there general kenobi");
        assert_eq!(transcript.model, "nova-2");

        let segments = transcript.segments.unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].speaker, Some(0));
        assert_eq!(segments[0].text, "Hello there.");
        assert_eq!(segments[1].speaker, Some(1));
        assert_eq!(segments[1].text, "General Kenobi.");
        assert_eq!(segments[1].start, 1.0);
        assert_eq!(segments[1].end, 1.8);
    }

    #[test]
    fn test_parse_callback_payload_without_words() {
        let payload = json!({
            "results": { "channels": [{ "alternatives": [{ "transcript": "plain text" }] }] }
        });
        let transcript = parse_callback_payload(&payload, "nova-2").unwrap();
        assert_eq!(transcript.text, "plain text");
        assert!(transcript.segments.is_none());
    }

    #[test]
    fn test_parse_callback_payload_rejects_malformed() {
        let payload = json!({ "results": {} });
        assert!(parse_callback_payload(&payload, "nova-2").is_err());
    }
}
