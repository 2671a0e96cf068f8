//! Correction pass over the stitched transcript.
//!
//! The correction model has its own input-size limit, so long transcripts are
//! re-chunked into word-count windows independent of the audio chunking.
//! Consecutive windows share a fixed word overlap; because both windows see
//! exactly the same input text at the seam, the duplicated words are removed
//! with a fixed-count strip rather than the fuzzy matching the audio-level
//! stitcher needs. Per-window failures fall back to that window's original
//! text; correction never fails a run.

use crate::config::CorrectionSettings;
use crate::error::{Result, SaumError};
use crate::openai::create_client;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, ResponseFormat,
};
use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Neighboring text passed to the model as hints, never part of the output.
#[derive(Debug, Clone, Default)]
pub struct CorrectionContext {
    pub previous_context: Option<String>,
    pub next_context: Option<String>,
}

/// One corrected window.
#[derive(Debug, Clone)]
pub struct Corrected {
    pub text: String,
    /// Corrections the model reported; when absent the caller derives a
    /// count from a word-level diff.
    pub correction_count: Option<u32>,
}

/// Trait for correction model adapters.
///
/// Called once per window; calls with different contexts are not idempotent
/// and must not be assumed to be.
#[async_trait]
pub trait CorrectionModel: Send + Sync {
    async fn correct(&self, text: &str, ctx: &CorrectionContext) -> Result<Corrected>;
}

/// Aggregated outcome of one correction pass.
#[derive(Debug, Clone)]
pub struct CorrectionOutcome {
    pub text: String,
    pub correction_count: u32,
    pub elapsed_ms: u64,
    pub window_count: usize,
    /// Windows that failed and kept their pre-correction text.
    pub failed_windows: usize,
}

/// Word-index ranges of the correction windows over a `total`-word transcript.
///
/// Windows are `window_words` long with `overlap_words` shared between
/// consecutive windows, so the count is `ceil((total - overlap) / (window -
/// overlap))` for transcripts longer than one window.
fn plan_windows(total: usize, window_words: usize, overlap_words: usize) -> Vec<(usize, usize)> {
    if total == 0 {
        return Vec::new();
    }
    let window = window_words.max(2);
    let overlap = overlap_words.min(window - 1);
    let stride = window - overlap;

    let mut windows = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + window).min(total);
        windows.push((start, end));
        if end == total {
            return windows;
        }
        start += stride;
    }
}

/// Run the correction pass over `text`.
#[instrument(skip_all)]
pub async fn correct_transcript(
    text: &str,
    model: &dyn CorrectionModel,
    settings: &CorrectionSettings,
) -> CorrectionOutcome {
    let started = Instant::now();
    let words: Vec<&str> = text.split_whitespace().collect();

    if words.len() <= settings.single_call_word_limit {
        let outcome = match model.correct(text, &CorrectionContext::default()).await {
            Ok(corrected) => {
                let count = corrected
                    .correction_count
                    .unwrap_or_else(|| word_diff_count(text, &corrected.text));
                CorrectionOutcome {
                    text: corrected.text,
                    correction_count: count,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                    window_count: 1,
                    failed_windows: 0,
                }
            }
            Err(e) => {
                warn!("Correction failed, keeping original text: {}", e);
                CorrectionOutcome {
                    text: text.to_string(),
                    correction_count: 0,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                    window_count: 1,
                    failed_windows: 1,
                }
            }
        };
        return outcome;
    }

    let windows = plan_windows(words.len(), settings.window_words, settings.overlap_words);
    info!(
        "Correcting {} words in {} windows",
        words.len(),
        windows.len()
    );

    let mut output = String::new();
    let mut correction_count: u32 = 0;
    let mut failed_windows = 0usize;

    for (i, &(start, end)) in windows.iter().enumerate() {
        let window_text = words[start..end].join(" ");

        let ctx = CorrectionContext {
            previous_context: (start > 0).then(|| {
                words[start.saturating_sub(settings.context_words)..start].join(" ")
            }),
            next_context: (end < words.len()).then(|| {
                words[end..(end + settings.context_words).min(words.len())].join(" ")
            }),
        };

        let (corrected_text, window_corrections) = match model.correct(&window_text, &ctx).await {
            Ok(corrected) => {
                let count = corrected
                    .correction_count
                    .unwrap_or_else(|| word_diff_count(&window_text, &corrected.text));
                (corrected.text, count)
            }
            Err(e) => {
                warn!("Correction window {} failed, keeping its input: {}", i, e);
                failed_windows += 1;
                (window_text.clone(), 0)
            }
        };

        correction_count += window_corrections;

        // Every window after the first repeats `overlap_words` of input at its
        // head; strip that many corrected words before appending.
        let appended = if i == 0 {
            corrected_text
        } else {
            strip_leading_words(&corrected_text, settings.overlap_words)
        };

        if !appended.is_empty() {
            if !output.is_empty() {
                output.push(' ');
            }
            output.push_str(&appended);
        }

        debug!(
            "Correction window {}/{} done ({} corrections)",
            i + 1,
            windows.len(),
            window_corrections
        );
    }

    CorrectionOutcome {
        text: output,
        correction_count,
        elapsed_ms: started.elapsed().as_millis() as u64,
        window_count: windows.len(),
        failed_windows,
    }
}

/// Drop the first `n` whitespace-separated words.
fn strip_leading_words(text: &str, n: usize) -> String {
    text.split_whitespace()
        .skip(n)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Rough count of corrections as a positional word diff.
fn word_diff_count(before: &str, after: &str) -> u32 {
    let before: Vec<&str> = before.split_whitespace().collect();
    let after: Vec<&str> = after.split_whitespace().collect();

    let changed = before
        .iter()
        .zip(after.iter())
        .filter(|(b, a)| b != a)
        .count();
    (changed + before.len().abs_diff(after.len())) as u32
}

const SYSTEM_PROMPT: &str = "You fix speech-to-text transcription errors: misheard words, broken \
sentence boundaries, wrong homophones, and garbled names. Keep the speaker's wording and any \
inline [MM:SS] timestamps exactly where they are; never summarize, never add content. Text \
under PREVIOUS or NEXT headings is context only and must not appear in your output. Return \
JSON: {\"corrected_text\": \"...\", \"corrections\": <number of changes>}.";

/// OpenAI chat-completions correction model.
pub struct OpenAiCorrector {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
}

impl OpenAiCorrector {
    pub fn new(model: &str) -> Self {
        Self {
            client: create_client(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl CorrectionModel for OpenAiCorrector {
    async fn correct(&self, text: &str, ctx: &CorrectionContext) -> Result<Corrected> {
        let mut user_prompt = String::new();
        if let Some(prev) = &ctx.previous_context {
            user_prompt.push_str("PREVIOUS:\n");
            user_prompt.push_str(prev);
            user_prompt.push_str("\n\n");
        }
        if let Some(next) = &ctx.next_context {
            user_prompt.push_str("NEXT:\n");
            user_prompt.push_str(next);
            user_prompt.push_str("\n\n");
        }
        user_prompt.push_str("TEXT TO CORRECT:\n");
        user_prompt.push_str(text);

        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_PROMPT)
                .build()
                .map_err(|e| SaumError::Correction(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_prompt)
                .build()
                .map_err(|e| SaumError::Correction(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(0.0)
            .response_format(ResponseFormat::JsonObject)
            .build()
            .map_err(|e| SaumError::Correction(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| SaumError::OpenAI(format!("Correction API error: {}", e)))?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .ok_or_else(|| SaumError::Correction("Empty correction response".into()))?;

        parse_correction_response(content)
            .ok_or_else(|| SaumError::Correction("Unparseable correction response".into()))
    }
}

/// Parse the model's JSON reply.
fn parse_correction_response(content: &str) -> Option<Corrected> {
    let value: serde_json::Value = serde_json::from_str(content).ok()?;
    let text = value["corrected_text"].as_str()?.to_string();
    let correction_count = value["corrections"].as_u64().map(|c| c as u32);
    Some(Corrected {
        text,
        correction_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Returns its input unchanged, recording every call.
    struct IdentityModel {
        calls: AtomicUsize,
        contexts: Mutex<Vec<CorrectionContext>>,
    }

    impl IdentityModel {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                contexts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CorrectionModel for IdentityModel {
        async fn correct(&self, text: &str, ctx: &CorrectionContext) -> Result<Corrected> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.contexts.lock().unwrap().push(ctx.clone());
            Ok(Corrected {
                text: text.to_string(),
                correction_count: Some(0),
            })
        }
    }

    /// Fails on one window, identity elsewhere.
    struct FlakyModel {
        fail_on_call: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CorrectionModel for FlakyModel {
        async fn correct(&self, text: &str, _ctx: &CorrectionContext) -> Result<Corrected> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == self.fail_on_call {
                Err(SaumError::Correction("window exploded".into()))
            } else {
                Ok(Corrected {
                    text: text.to_string(),
                    correction_count: Some(1),
                })
            }
        }
    }

    fn numbered_words(n: usize) -> String {
        (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    fn settings(limit: usize, window: usize, overlap: usize) -> CorrectionSettings {
        CorrectionSettings {
            enabled: true,
            single_call_word_limit: limit,
            window_words: window,
            overlap_words: overlap,
            context_words: 150,
            ..Default::default()
        }
    }

    #[test]
    fn test_window_count_formula() {
        // ceil((w - o) / (c - o))
        for &(w, c, o) in &[(2500usize, 1000usize, 100usize), (1001, 1000, 100), (5000, 800, 50)] {
            let windows = plan_windows(w, c, o);
            let expected = (w - o).div_ceil(c - o);
            assert_eq!(windows.len(), expected, "w={w} c={c} o={o}");
            assert_eq!(windows.last().unwrap().1, w);
        }
    }

    #[test]
    fn test_windows_share_exact_overlap() {
        let windows = plan_windows(2500, 1000, 100);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].1 - pair[1].0, 100);
        }
    }

    #[tokio::test]
    async fn test_short_transcript_corrected_in_one_call() {
        let model = IdentityModel::new();
        let text = numbered_words(500);

        let outcome = correct_transcript(&text, &model, &settings(2000, 1000, 100)).await;

        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.window_count, 1);
        assert_eq!(outcome.text, text);
        let contexts = model.contexts.lock().unwrap();
        assert!(contexts[0].previous_context.is_none());
        assert!(contexts[0].next_context.is_none());
    }

    #[tokio::test]
    async fn test_windowed_correction_preserves_word_count() {
        let model = IdentityModel::new();
        let text = numbered_words(2500);

        let outcome = correct_transcript(&text, &model, &settings(2000, 1000, 100)).await;

        assert_eq!(outcome.window_count, 3);
        assert_eq!(outcome.text, text);
        assert_eq!(outcome.failed_windows, 0);
    }

    #[tokio::test]
    async fn test_interior_windows_carry_context_hints() {
        let model = IdentityModel::new();
        let text = numbered_words(2500);

        correct_transcript(&text, &model, &settings(2000, 1000, 100)).await;

        let contexts = model.contexts.lock().unwrap();
        assert_eq!(contexts.len(), 3);
        assert!(contexts[0].previous_context.is_none());
        assert!(contexts[0].next_context.is_some());
        assert!(contexts[1].previous_context.is_some());
        assert!(contexts[1].next_context.is_some());
        assert!(contexts[2].previous_context.is_some());
        assert!(contexts[2].next_context.is_none());

        // 150 words of hint on each side of the middle window.
        let prev = contexts[1].previous_context.as_ref().unwrap();
        assert_eq!(prev.split_whitespace().count(), 150);
        assert!(prev.ends_with("w899"));
    }

    #[tokio::test]
    async fn test_window_failure_keeps_original_text_and_continues() {
        let model = FlakyModel {
            fail_on_call: 1,
            calls: AtomicUsize::new(0),
        };
        let text = numbered_words(2500);

        let outcome = correct_transcript(&text, &model, &settings(2000, 1000, 100)).await;

        // The failed middle window fell back to its input, so the assembled
        // text is still complete and in order.
        assert_eq!(outcome.text, text);
        assert_eq!(outcome.failed_windows, 1);
        assert_eq!(outcome.correction_count, 2);
    }

    #[tokio::test]
    async fn test_single_call_failure_is_not_fatal() {
        let model = FlakyModel {
            fail_on_call: 0,
            calls: AtomicUsize::new(0),
        };
        let text = numbered_words(100);

        let outcome = correct_transcript(&text, &model, &settings(2000, 1000, 100)).await;
        assert_eq!(outcome.text, text);
        assert_eq!(outcome.failed_windows, 1);
    }

    #[test]
    fn test_word_diff_count() {
        assert_eq!(word_diff_count("a b c", "a b c"), 0);
        assert_eq!(word_diff_count("a b c", "a x c"), 1);
        assert_eq!(word_diff_count("a b c", "a b c d e"), 2);
    }

    #[test]
    fn test_parse_correction_response() {
        let parsed =
            parse_correction_response(r#"{"corrected_text": "fixed", "corrections": 3}"#).unwrap();
        assert_eq!(parsed.text, "fixed");
        assert_eq!(parsed.correction_count, Some(3));
        assert!(parse_correction_response("garbage").is_none());
    }
}
