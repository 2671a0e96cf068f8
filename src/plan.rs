//! Chunk planning for long audio files.
//!
//! Walks the timeline in fixed strides and extends each window into its
//! neighbors by the configured overlap, so that the stitcher can later remove
//! the duplicated words at each seam. Planning is pure: the windows are
//! materialized as audio by [`crate::media::split`].

use crate::config::{AdaptiveStep, ChunkingSettings};
use serde::{Deserialize, Serialize};

/// Chunk duration used when the total duration exceeds every adaptive step.
const ADAPTIVE_CEILING_CHUNK_SECONDS: u32 = 1200;

/// One planned chunk window on the global timeline.
///
/// Windows are monotonically non-decreasing in `start`; `end > start` always
/// holds. `total` is identical across all entries of one plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkSpec {
    /// Position of this chunk in the plan.
    pub index: usize,
    /// Number of chunks in the plan.
    pub total: usize,
    /// Window start on the global timeline, in seconds.
    pub start: f64,
    /// Window end on the global timeline, in seconds.
    pub end: f64,
    /// Whether this window shares a seam with the previous chunk.
    pub has_overlap_before: bool,
    /// Whether this window shares a seam with the next chunk.
    pub has_overlap_after: bool,
}

impl ChunkSpec {
    /// Window length in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Decide whether a file of `duration_seconds` should be split at all.
///
/// True iff the duration reaches the threshold plus a small safety buffer, so
/// files landing exactly on the threshold are transcribed in one call.
pub fn should_chunk(duration_seconds: f64, settings: &ChunkingSettings) -> bool {
    duration_seconds
        >= (settings.threshold_seconds + settings.threshold_buffer_seconds) as f64
}

/// Resolve the chunk duration for a file of `duration_seconds`.
///
/// A configured non-zero `chunk_seconds` wins; otherwise the adaptive step
/// table is consulted (shorter chunks for short files, longer chunks for
/// multi-hour files).
pub fn resolve_chunk_seconds(duration_seconds: f64, settings: &ChunkingSettings) -> u32 {
    if settings.chunk_seconds > 0 {
        return settings.chunk_seconds;
    }
    adaptive_chunk_seconds(duration_seconds, &settings.adaptive_steps)
}

fn adaptive_chunk_seconds(duration_seconds: f64, steps: &[AdaptiveStep]) -> u32 {
    for step in steps {
        if duration_seconds <= step.max_duration_seconds as f64 {
            return step.chunk_seconds;
        }
    }
    ADAPTIVE_CEILING_CHUNK_SECONDS
}

/// Plan overlapping chunk windows over `duration_seconds`.
///
/// The timeline is walked in non-overlapping strides of `chunk_seconds`; each
/// window then extends backward by `overlap_seconds` (except the first) and
/// forward by `overlap_seconds` (except the last, and never past the total
/// duration). A 25-minute file with 10-minute chunks and a 20-second overlap
/// yields windows [0,620], [580,1220], [1180,1500].
pub fn plan_chunks(
    duration_seconds: f64,
    chunk_seconds: u32,
    overlap_seconds: u32,
) -> Vec<ChunkSpec> {
    if duration_seconds <= 0.0 || chunk_seconds == 0 {
        return Vec::new();
    }

    let stride = chunk_seconds as f64;
    let overlap = overlap_seconds as f64;

    if duration_seconds <= stride {
        return vec![ChunkSpec {
            index: 0,
            total: 1,
            start: 0.0,
            end: duration_seconds,
            has_overlap_before: false,
            has_overlap_after: false,
        }];
    }

    let total = (duration_seconds / stride).ceil() as usize;
    let mut specs = Vec::with_capacity(total);

    for index in 0..total {
        let core_start = index as f64 * stride;
        let core_end = (core_start + stride).min(duration_seconds);

        let is_first = index == 0;
        let is_last = index == total - 1;

        let start = if is_first {
            core_start
        } else {
            (core_start - overlap).max(0.0)
        };
        let end = if is_last {
            core_end
        } else {
            (core_end + overlap).min(duration_seconds)
        };

        specs.push(ChunkSpec {
            index,
            total,
            start,
            end,
            has_overlap_before: !is_first && overlap_seconds > 0,
            has_overlap_after: !is_last && overlap_seconds > 0,
        });
    }

    specs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(threshold: u32, buffer: u32) -> ChunkingSettings {
        ChunkingSettings {
            threshold_seconds: threshold,
            threshold_buffer_seconds: buffer,
            ..Default::default()
        }
    }

    #[test]
    fn test_should_chunk_boundary() {
        let s = settings(600, 10);
        assert!(!should_chunk(600.0, &s));
        assert!(!should_chunk(609.9, &s));
        assert!(should_chunk(610.0, &s));
        assert!(should_chunk(3600.0, &s));
    }

    #[test]
    fn test_plan_25_minute_example() {
        let specs = plan_chunks(1500.0, 600, 20);

        assert_eq!(specs.len(), 3);
        assert_eq!((specs[0].start, specs[0].end), (0.0, 620.0));
        assert_eq!((specs[1].start, specs[1].end), (580.0, 1220.0));
        assert_eq!((specs[2].start, specs[2].end), (1180.0, 1500.0));

        assert!(!specs[0].has_overlap_before);
        assert!(specs[0].has_overlap_after);
        assert!(specs[1].has_overlap_before);
        assert!(specs[1].has_overlap_after);
        assert!(specs[2].has_overlap_before);
        assert!(!specs[2].has_overlap_after);

        for spec in &specs {
            assert_eq!(spec.total, 3);
            assert!(spec.end > spec.start);
        }
    }

    #[test]
    fn test_plan_coverage_accounting() {
        let duration = 4321.0;
        let overlap = 15u32;
        let specs = plan_chunks(duration, 600, overlap);

        let covered: f64 = specs.iter().map(|s| s.duration()).sum();
        let seams = (specs.len() - 1) as f64;
        // Each interior seam is covered twice, once from each side.
        let expected = duration + seams * 2.0 * overlap as f64;
        assert!((covered - expected).abs() < 1e-6);

        for pair in specs.windows(2) {
            assert!(pair[1].start >= pair[0].start);
        }
    }

    #[test]
    fn test_plan_single_chunk_has_no_seams() {
        let specs = plan_chunks(90.0, 600, 20);
        assert_eq!(specs.len(), 1);
        assert!(!specs[0].has_overlap_before);
        assert!(!specs[0].has_overlap_after);
        assert_eq!(specs[0].end, 90.0);
    }

    #[test]
    fn test_plan_zero_overlap_clears_seam_flags() {
        let specs = plan_chunks(1500.0, 600, 0);
        assert_eq!(specs.len(), 3);
        for spec in &specs {
            assert!(!spec.has_overlap_before);
            assert!(!spec.has_overlap_after);
        }
        assert_eq!((specs[1].start, specs[1].end), (600.0, 1200.0));
    }

    #[test]
    fn test_adaptive_steps_are_monotonic() {
        let s = ChunkingSettings {
            chunk_seconds: 0,
            ..Default::default()
        };
        let short = resolve_chunk_seconds(900.0, &s);
        let medium = resolve_chunk_seconds(3000.0, &s);
        let long = resolve_chunk_seconds(7000.0, &s);
        let very_long = resolve_chunk_seconds(20_000.0, &s);

        assert_eq!(short, 300);
        assert_eq!(medium, 600);
        assert_eq!(long, 900);
        assert_eq!(very_long, ADAPTIVE_CEILING_CHUNK_SECONDS);
        assert!(short <= medium && medium <= long && long <= very_long);
    }

    #[test]
    fn test_configured_chunk_seconds_wins_over_adaptive() {
        let s = ChunkingSettings {
            chunk_seconds: 450,
            ..Default::default()
        };
        assert_eq!(resolve_chunk_seconds(10_000.0, &s), 450);
    }
}
