//! Transcribe command implementation.

use crate::backend::BackendKind;
use crate::cli::output::format_duration;
use crate::cli::{preflight, Output};
use crate::config::Settings;
use crate::pipeline::{MediaSource, Pipeline, RunConfig};
use crate::transcript::{format_timestamp, PipelineResult};
use crate::webhook;
use anyhow::Result;
use std::time::Duration;

/// Run the transcribe command.
#[allow(clippy::too_many_arguments)]
pub async fn run_transcribe(
    input: &str,
    provider: Option<&str>,
    language: Option<&str>,
    output: Option<String>,
    format: &str,
    chunk: bool,
    no_optimize: bool,
    correct: bool,
    keyterms: bool,
    customization: Option<&str>,
    mut settings: Settings,
) -> Result<()> {
    // Apply command-line overrides before building the pipeline.
    if let Some(provider) = provider {
        settings.transcription.provider = provider
            .parse::<BackendKind>()
            .map_err(|e| anyhow::anyhow!(e))?;
    }
    if let Some(language) = language {
        settings.transcription.language = Some(language.to_string());
    }
    if let Some(customization) = customization {
        settings.transcription.customization = Some(customization.to_string());
    }
    if correct {
        settings.correction.enabled = true;
    }
    if keyterms {
        settings.transcription.keyterms = true;
    }
    if no_optimize {
        settings.optimization.enabled = false;
    }

    if let Err(e) = preflight::check(&settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'saum doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let source = MediaSource::parse(input)?;
    let pipeline = Pipeline::new(settings.clone())?;

    // Async providers deliver through the webhook receiver; make sure one is
    // listening and kept clean before any job is submitted.
    if pipeline.needs_webhook_listener() {
        let jobs = pipeline.job_store();
        webhook::spawn_listener(&settings.webhook.host, settings.webhook.port, jobs.clone())
            .await?;
        jobs.spawn_eviction_sweep(
            Duration::from_secs(settings.webhook.sweep_interval_seconds),
            Duration::from_secs(settings.webhook.job_ttl_seconds),
        );
    }

    let mut config = RunConfig::from_settings(&settings);
    config.force_chunking = chunk;

    Output::info(&format!("Transcribing: {}", input));

    let result = match pipeline.run(source, config).await {
        Ok(result) => result,
        Err(e) => {
            Output::error(&format!("Transcription failed: {}", e));
            return Err(e.into());
        }
    };

    print_summary(&result);

    let rendered = match format {
        "json" => serde_json::to_string_pretty(&result)?,
        "text" => render_text(&result),
        other => {
            return Err(anyhow::anyhow!("Unknown output format: {}", other));
        }
    };

    match output {
        Some(path) => {
            std::fs::write(&path, rendered)?;
            Output::success(&format!("Transcript written to {}", path));
        }
        None => {
            println!("{}", rendered);
        }
    }

    Ok(())
}

fn print_summary(result: &PipelineResult) {
    let meta = &result.metadata;
    Output::success("Transcription complete");
    Output::kv("Duration", &format_duration(meta.duration_seconds));
    Output::kv("Chunks", &meta.chunk_count.to_string());
    Output::kv("Words", &meta.word_count.to_string());
    if !meta.models.is_empty() {
        Output::kv("Models", &meta.models.join(", "));
    }
    if meta.correction_count > 0 {
        Output::kv(
            "Corrections",
            &format!("{} in {}ms", meta.correction_count, meta.correction_ms),
        );
    }
    if !meta.keyterms.is_empty() {
        Output::kv("Keyterms", &meta.keyterms.join(", "));
    }
    if meta.was_truncated {
        Output::warning("One or more chunks reported truncated output.");
    }
}

/// Render the result as plain text, speaker-labeled when segments exist.
fn render_text(result: &PipelineResult) -> String {
    match &result.segments {
        Some(segments) if !segments.is_empty() => segments
            .iter()
            .map(|s| {
                let speaker = s
                    .speaker
                    .map(|id| format!("Speaker {}", id))
                    .unwrap_or_else(|| "Speaker".to_string());
                format!("[{}] {}: {}", format_timestamp(s.start), speaker, s.text)
            })
            .collect::<Vec<_>>()
            .join("\n"),
        _ => result.text.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::{RunMetadata, SpeakerSegment};

    #[test]
    fn test_render_text_with_speakers() {
        let result = PipelineResult {
            text: "flat".to_string(),
            segments: Some(vec![
                SpeakerSegment { speaker: Some(0), start: 0.0, end: 4.0, text: "Hei.".into() },
                SpeakerSegment { speaker: Some(1), start: 4.0, end: 9.0, text: "Hallo.".into() },
            ]),
            metadata: RunMetadata::default(),
        };

        let rendered = render_text(&result);
        assert_eq!(rendered, "[00:00] Speaker 0: Hei.\n[00:04] Speaker 1: Hallo.");
    }

    #[test]
    fn test_render_text_without_segments() {
        let result = PipelineResult {
            text: "just the text".to_string(),
            segments: None,
            metadata: RunMetadata::default(),
        };
        assert_eq!(render_text(&result), "just the text");
    }
}
