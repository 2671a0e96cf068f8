//! Seam deduplication and transcript stitching.
//!
//! Adjacent chunks share an overlap region, so the words around each seam are
//! transcribed twice. For every pair that declares a seam on both sides, the
//! longest word sequence from the head of the right chunk that also occurs
//! verbatim near the tail of the left chunk marks the duplicated content; the
//! right chunk is cut just past that match and only the remainder is kept.
//!
//! When the transcriptions disagree too much for a match (the minimum is 4
//! words), a fixed skip of a few words is applied instead. Discarding nothing
//! would duplicate the seam and discarding everything would lose data; the
//! small bounded skip is the deliberate middle ground.

use crate::config::StitchSettings;
use crate::transcript::{ChunkResult, SpeakerSegment};
use tracing::{debug, instrument};

/// Byte ranges of whitespace-separated words in `text`.
fn word_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;

    for (i, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if let Some(s) = start.take() {
                spans.push((s, i));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }
    spans
}

/// Find the cut offset in `right_text` that removes the seam duplication.
///
/// Slides a window of decreasing length (longest first, earliest position
/// first) across the head of the right text, looking for a word sequence that
/// occurs verbatim in the tail of the left text. Returns the byte offset just
/// past the matched sequence, or None when no match of the minimum length
/// exists.
fn find_overlap_cut(
    left_text: &str,
    right_text: &str,
    settings: &StitchSettings,
) -> Option<usize> {
    let left_spans = word_spans(left_text);
    let right_spans = word_spans(right_text);

    let left_window_start = left_spans.len().saturating_sub(settings.search_window_words);
    let left_words: Vec<&str> = left_spans[left_window_start..]
        .iter()
        .map(|&(s, e)| &left_text[s..e])
        .collect();

    let right_window_len = right_spans.len().min(settings.search_window_words);
    let right_words: Vec<&str> = right_spans[..right_window_len]
        .iter()
        .map(|&(s, e)| &right_text[s..e])
        .collect();

    let max_len = settings.max_match_words.min(right_words.len());
    let min_len = settings.min_match_words.max(1);

    for len in (min_len..=max_len).rev() {
        for start in 0..=(right_words.len() - len) {
            let needle = &right_words[start..start + len];
            if left_words.windows(len).any(|window| window == needle) {
                let (_, match_end) = right_spans[start + len - 1];
                return Some(match_end);
            }
        }
    }

    None
}

/// Join chunk results into one continuous transcript, removing duplicated
/// seam content.
///
/// Pairs without a declared seam on both sides are concatenated with a
/// paragraph break and no dedup attempt, so stitching non-overlapping chunks
/// is plain concatenation.
#[instrument(skip_all, fields(chunks = chunks.len()))]
pub fn stitch(chunks: &[ChunkResult], settings: &StitchSettings) -> String {
    let mut output = String::new();

    for (index, chunk) in chunks.iter().enumerate() {
        let text = chunk.text.trim();

        if index == 0 {
            output.push_str(text);
            continue;
        }

        let has_seam = chunks[index - 1].has_overlap_after && chunk.has_overlap_before;
        if !has_seam {
            output.push_str("\n\n");
            output.push_str(text);
            continue;
        }

        match find_overlap_cut(&output, text, settings) {
            Some(cut) => {
                debug!("Seam match found, cutting {} bytes of duplicate", cut);
                let remainder = text[cut..].trim_start();
                if !remainder.is_empty() {
                    output.push(' ');
                    output.push_str(remainder);
                }
            }
            None => {
                let spans = word_spans(text);
                let skip = settings
                    .fallback_skip_words
                    .min(spans.len().saturating_sub(1));
                debug!("No seam match, falling back to a {}-word skip", skip);
                if let Some(&(start, _)) = spans.get(skip) {
                    output.push(' ');
                    output.push_str(&text[start..]);
                }
            }
        }
    }

    output
}

/// Merge structured segments across chunks on the global timeline.
///
/// Chunks are already renormalized, so overlap duplicates show up as segments
/// that end before the merged timeline's high-water mark; those are dropped.
pub fn merge_segments(chunks: &[ChunkResult]) -> Option<Vec<SpeakerSegment>> {
    let mut merged: Vec<SpeakerSegment> = Vec::new();
    let mut any = false;
    let mut high_water = f64::NEG_INFINITY;

    for chunk in chunks {
        let Some(segments) = &chunk.segments else {
            continue;
        };
        any = true;
        for segment in segments {
            if segment.end > high_water {
                high_water = segment.end;
                merged.push(segment.clone());
            }
        }
    }

    if any {
        Some(merged)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str, before: bool, after: bool) -> ChunkResult {
        let mut result = ChunkResult::new(text.to_string(), 0.0, 0.0);
        result.has_overlap_before = before;
        result.has_overlap_after = after;
        result
    }

    fn settings() -> StitchSettings {
        StitchSettings::default()
    }

    #[test]
    fn test_no_seams_is_plain_concatenation() {
        let chunks = vec![
            chunk("first part here", false, false),
            chunk("second part here", false, false),
            chunk("third part here", false, false),
        ];
        assert_eq!(
            stitch(&chunks, &settings()),
            "first part here\n\nsecond part here\n\nthird part here"
        );
    }

    #[test]
    fn test_exact_overlap_appears_once() {
        // Ten shared words at the seam.
        let shared = "the quick brown fox jumps over the lazy sleeping dog";
        let left = format!("earlier content goes here and then {}", shared);
        let right = format!("{} and the story continues afterwards", shared);

        let chunks = vec![chunk(&left, false, true), chunk(&right, true, false)];
        let output = stitch(&chunks, &settings());

        assert_eq!(output.matches("quick brown fox").count(), 1);
        assert!(output.starts_with("earlier content"));
        assert!(output.ends_with("and the story continues afterwards"));
    }

    #[test]
    fn test_partial_match_cuts_after_longest_match() {
        // The right chunk re-transcribed the overlap slightly differently but
        // shares a 5-word run.
        let left = "alpha beta gamma delta one two three four five end";
        let right = "one two three four five different tail text here";

        let chunks = vec![chunk(left, false, true), chunk(right, true, false)];
        let output = stitch(&chunks, &settings());

        assert_eq!(output.matches("one two three four five").count(), 1);
        assert!(output.ends_with("different tail text here"));
    }

    #[test]
    fn test_three_word_match_is_below_minimum() {
        // Only a 3-word run in common; the 4-word minimum means fallback.
        let left = "aa bb cc dd ee ff gg one two three";
        let right = "one two three xx yy zz ww vv uu tt";

        let chunks = vec![chunk(left, false, true), chunk(right, true, false)];
        let output = stitch(&chunks, &settings());

        // Fallback skipped exactly 5 words of the right chunk.
        assert!(output.ends_with("zz ww vv uu tt"));
        assert!(!output.contains("xx"));
    }

    #[test]
    fn test_fallback_skips_at_most_five_words() {
        let left: String = (0..30).map(|i| format!("l{} ", i)).collect();
        let right = "r0 r1 r2 r3 r4 r5 r6 r7 r8 r9";

        let chunks = vec![chunk(left.trim(), false, true), chunk(right, true, false)];
        let output = stitch(&chunks, &settings());

        // Never the whole chunk, never zero.
        assert!(!output.contains("r4"));
        assert!(output.contains("r5"));
        assert!(output.ends_with("r5 r6 r7 r8 r9"));
    }

    #[test]
    fn test_fallback_never_discards_a_whole_short_chunk() {
        let left = "some longer left chunk content without overlap words";
        let right = "tiny tail";

        let chunks = vec![chunk(left, false, true), chunk(right, true, false)];
        let output = stitch(&chunks, &settings());

        assert!(output.ends_with("tail"));
    }

    #[test]
    fn test_seam_requires_both_flags() {
        // Left declares a seam but right does not: no dedup, paragraph break.
        let shared = "one two three four five six";
        let left = format!("start {}", shared);
        let right = format!("{} finish", shared);

        let chunks = vec![chunk(&left, false, true), chunk(&right, false, false)];
        let output = stitch(&chunks, &settings());

        assert_eq!(output.matches(shared).count(), 2);
        assert!(output.contains("\n\n"));
    }

    #[test]
    fn test_merge_segments_drops_overlap_duplicates() {
        let mut left = chunk("", false, true);
        left.segments = Some(vec![
            SpeakerSegment { speaker: Some(0), start: 0.0, end: 5.0, text: "a".into() },
            SpeakerSegment { speaker: Some(1), start: 5.0, end: 11.0, text: "b".into() },
        ]);
        let mut right = chunk("", true, false);
        right.segments = Some(vec![
            // Re-transcription of the overlap region, already covered.
            SpeakerSegment { speaker: Some(1), start: 5.5, end: 10.5, text: "b'".into() },
            SpeakerSegment { speaker: Some(0), start: 11.0, end: 15.0, text: "c".into() },
        ]);

        let merged = merge_segments(&[left, right]).unwrap();
        let texts: Vec<&str> = merged.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_merge_segments_none_when_no_chunk_has_them() {
        let chunks = vec![chunk("a", false, false), chunk("b", false, false)];
        assert!(merge_segments(&chunks).is_none());
    }
}
