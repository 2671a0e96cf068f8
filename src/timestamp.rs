//! Timestamp renormalization: rewrites chunk-local timestamps onto the
//! global timeline of the original file.
//!
//! Two representations are handled: inline `[MM:SS]` / `[H:MM:SS]` markers
//! embedded in flat text, and numeric start/end fields on structured
//! segments. A marker that fails to parse is left untouched and logged;
//! zeroing it would corrupt downstream seeking.

use crate::transcript::{format_timestamp, ChunkResult};
use regex::{Captures, Regex};
use std::sync::OnceLock;
use tracing::warn;

fn marker_regex() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| {
        Regex::new(r"\[(?:(\d{1,2}):)?(\d{1,2}):(\d{2})\]").expect("valid timestamp regex")
    })
}

/// Shift every timestamp in `result` by `offset_seconds` (the chunk's start
/// on the global timeline), producing a new result.
///
/// Inline markers are shifted by the rounded offset and re-rendered, choosing
/// the hour-inclusive form only when the shifted value has a non-zero hour
/// component. Structured segment fields get the exact offset added.
pub fn renormalize(result: &ChunkResult, offset_seconds: f64) -> ChunkResult {
    let mut shifted = result.clone();

    shifted.text = shift_inline_markers(&result.text, offset_seconds);

    if let Some(segments) = &mut shifted.segments {
        for segment in segments.iter_mut() {
            segment.start += offset_seconds;
            segment.end += offset_seconds;
        }
    }

    shifted
}

/// Shift `[MM:SS]` / `[H:MM:SS]` markers in flat text by the rounded offset.
pub fn shift_inline_markers(text: &str, offset_seconds: f64) -> String {
    let offset = offset_seconds.round() as i64;

    marker_regex()
        .replace_all(text, |caps: &Captures| {
            match parse_marker(caps) {
                Some(total) => {
                    let shifted = (total + offset).max(0) as f64;
                    format!("[{}]", format_timestamp(shifted))
                }
                None => {
                    warn!("Leaving unparseable timestamp marker {:?} unchanged", &caps[0]);
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}

/// Total seconds of a matched marker, or None when a field is out of range.
fn parse_marker(caps: &Captures) -> Option<i64> {
    let hours: i64 = match caps.get(1) {
        Some(h) => h.as_str().parse().ok()?,
        None => 0,
    };
    let minutes: i64 = caps[2].parse().ok()?;
    let seconds: i64 = caps[3].parse().ok()?;

    if seconds > 59 {
        return None;
    }
    // Minutes above 59 only make sense when no hour field is present.
    if caps.get(1).is_some() && minutes > 59 {
        return None;
    }

    Some(hours * 3600 + minutes * 60 + seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::SpeakerSegment;

    #[test]
    fn test_zero_offset_round_trip() {
        assert_eq!(shift_inline_markers("[12:34] hello", 0.0), "[12:34] hello");
        assert_eq!(shift_inline_markers("[00:00] start", 0.0), "[00:00] start");
    }

    #[test]
    fn test_hour_form_appears_only_when_needed() {
        assert_eq!(shift_inline_markers("[12:34]", 3600.0), "[1:12:34]");
        assert_eq!(shift_inline_markers("[02:00]", 600.0), "[12:00]");
        assert_eq!(shift_inline_markers("[1:02:03]", 60.0), "[1:03:03]");
    }

    #[test]
    fn test_multiple_markers_in_one_text() {
        let text = "intro [00:10] middle [09:50] end";
        assert_eq!(
            shift_inline_markers(text, 580.0),
            "intro [09:50] middle [19:30] end"
        );
    }

    #[test]
    fn test_offset_is_rounded() {
        assert_eq!(shift_inline_markers("[00:10]", 579.6), "[09:50]");
        assert_eq!(shift_inline_markers("[00:10]", 580.4), "[09:50]");
    }

    #[test]
    fn test_unparseable_marker_left_unchanged() {
        // 75 is not a valid seconds field; the marker must survive as-is.
        assert_eq!(shift_inline_markers("a [12:75] b", 60.0), "a [12:75] b");
        // Not a timestamp shape at all.
        assert_eq!(shift_inline_markers("[notes] b", 60.0), "[notes] b");
    }

    #[test]
    fn test_renormalize_shifts_structured_segments_exactly() {
        let mut result = ChunkResult::new("hi [00:05]".to_string(), 580.0, 1220.0);
        result.segments = Some(vec![SpeakerSegment {
            speaker: Some(0),
            start: 1.25,
            end: 3.5,
            text: "hi".to_string(),
        }]);

        let shifted = renormalize(&result, 580.0);

        assert_eq!(shifted.text, "hi [09:45]");
        let segments = shifted.segments.unwrap();
        assert_eq!(segments[0].start, 581.25);
        assert_eq!(segments[0].end, 583.5);
        // The original is untouched.
        assert_eq!(result.segments.as_ref().unwrap()[0].start, 1.25);
    }
}
