//! Data models for transcription results.

use serde::{Deserialize, Serialize};

/// A per-utterance unit returned by backends that support diarization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerSegment {
    /// Speaker identifier assigned by the backend, if diarization ran.
    pub speaker: Option<u32>,
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
    /// Utterance text.
    pub text: String,
}

/// The transcription of one chunk, on whatever timeline the producer used.
///
/// Results come out of the executor chunk-local (timestamps near zero) and are
/// renormalized onto the global timeline before stitching; renormalization
/// produces a new value rather than mutating this one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkResult {
    /// Transcript text, possibly containing inline [MM:SS] markers.
    pub text: String,
    /// Window start on the global timeline, in seconds.
    pub start: f64,
    /// Window end on the global timeline, in seconds.
    pub end: f64,
    /// Whether this chunk shares a seam with the previous chunk.
    pub has_overlap_before: bool,
    /// Whether this chunk shares a seam with the next chunk.
    pub has_overlap_after: bool,
    /// Model that produced this chunk.
    pub model: Option<String>,
    /// Whether the backend reported truncating its output.
    pub was_truncated: bool,
    /// Per-utterance segments, when the backend returned them.
    pub segments: Option<Vec<SpeakerSegment>>,
    /// Keyterms extracted from this chunk's audio, when enabled.
    pub keyterms: Option<Vec<String>>,
}

impl ChunkResult {
    /// Create a plain result with no structured data.
    pub fn new(text: String, start: f64, end: f64) -> Self {
        Self {
            text,
            start,
            end,
            has_overlap_before: false,
            has_overlap_after: false,
            model: None,
            was_truncated: false,
            segments: None,
            keyterms: None,
        }
    }
}

/// Aggregated metadata for one pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Total source duration in seconds.
    pub duration_seconds: f64,
    /// Number of audio chunks transcribed (1 for unchunked runs).
    pub chunk_count: usize,
    /// Whether the audio was split before transcription.
    pub chunked: bool,
    /// Models used across chunks, deduplicated, in first-use order.
    pub models: Vec<String>,
    /// Whether any chunk reported truncated output.
    pub was_truncated: bool,
    /// Total corrections applied by the correction pass.
    pub correction_count: u32,
    /// Wall-clock time spent in the correction pass, in milliseconds.
    pub correction_ms: u64,
    /// Word count of the final transcript.
    pub word_count: usize,
    /// Keyterms extracted during the run, deduplicated.
    pub keyterms: Vec<String>,
    /// Whether the optimization pass was applied (false means it was skipped
    /// or failed and the unoptimized input was used).
    pub optimized: bool,
}

/// Terminal artifact of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Final stitched (and possibly corrected) transcript.
    pub text: String,
    /// Merged speaker segments on the global timeline, when available.
    pub segments: Option<Vec<SpeakerSegment>>,
    /// Run metadata.
    pub metadata: RunMetadata,
}

/// Format seconds as MM:SS or H:MM:SS.
pub fn format_timestamp(seconds: f64) -> String {
    let total_seconds = seconds.round().max(0.0) as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// Count whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "00:00");
        assert_eq!(format_timestamp(65.0), "01:05");
        assert_eq!(format_timestamp(754.0), "12:34");
        assert_eq!(format_timestamp(4354.0), "1:12:34");
    }

    #[test]
    fn test_format_timestamp_rounds() {
        assert_eq!(format_timestamp(59.6), "01:00");
        assert_eq!(format_timestamp(59.4), "00:59");
    }

    #[test]
    fn test_word_count() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("  one  two\nthree "), 3);
    }
}
