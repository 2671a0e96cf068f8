//! Chunk executor: runs the per-chunk transcription operation under a
//! configurable concurrency policy.
//!
//! This is the only place where multiple backend calls may be in flight at
//! once. A single chunk failure rejects the whole call (a silently missing
//! chunk would leave an undetectable hole in the final transcript), and
//! dropping the stream on that path cancels whatever was still in flight.

use crate::config::{ConcurrencyMode, TranscriptionSettings};
use crate::error::{Result, SaumError};
use crate::media::AudioArtifact;
use crate::transcript::ChunkResult;
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// How chunk operations are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyPolicy {
    /// One chunk at a time, in plan order.
    Sequential,
    /// At most this many chunks in flight; a slot is refilled as each
    /// completes. The default.
    Bounded(usize),
    /// Every chunk dispatched at once.
    Unbounded,
}

impl ConcurrencyPolicy {
    /// Resolve the policy from transcription settings.
    pub fn from_settings(settings: &TranscriptionSettings) -> Self {
        match settings.concurrency {
            ConcurrencyMode::Sequential => ConcurrencyPolicy::Sequential,
            ConcurrencyMode::Bounded => {
                ConcurrencyPolicy::Bounded(settings.max_concurrent_chunks.max(1))
            }
            ConcurrencyMode::Parallel => ConcurrencyPolicy::Unbounded,
        }
    }

    fn in_flight_limit(&self, chunk_count: usize) -> usize {
        match self {
            ConcurrencyPolicy::Sequential => 1,
            ConcurrencyPolicy::Bounded(n) => (*n).max(1),
            ConcurrencyPolicy::Unbounded => chunk_count.max(1),
        }
    }
}

/// Run `op` for every artifact under `policy`, failing fast on the first
/// chunk error.
///
/// Results are returned in plan order regardless of completion order. The
/// optional counter is incremented once per completed chunk so callers can
/// drive progress reporting without threading UI state in here.
pub async fn execute_chunks<F, Fut>(
    artifacts: Vec<AudioArtifact>,
    policy: ConcurrencyPolicy,
    progress: Option<Arc<AtomicU64>>,
    op: F,
) -> Result<Vec<ChunkResult>>
where
    F: Fn(AudioArtifact) -> Fut,
    Fut: Future<Output = Result<ChunkResult>>,
{
    let chunk_count = artifacts.len();
    if chunk_count == 0 {
        return Ok(Vec::new());
    }

    let limit = policy.in_flight_limit(chunk_count);
    info!(
        "Executing {} chunks with up to {} in flight",
        chunk_count, limit
    );

    let mut results: Vec<(usize, ChunkResult)> = Vec::with_capacity(chunk_count);

    let mut in_flight = stream::iter(artifacts.into_iter())
        .map(|artifact| {
            let spec = artifact.spec.clone();
            let fut = op(artifact);
            async move {
                let result = fut.await;
                (spec, result)
            }
        })
        .buffer_unordered(limit);

    while let Some((spec, result)) = in_flight.next().await {
        if let Some(counter) = &progress {
            counter.fetch_add(1, Ordering::Relaxed);
        }
        match result {
            Ok(chunk) => {
                debug!("Chunk {} complete", spec.index);
                results.push((spec.index, chunk));
            }
            Err(e) => {
                return Err(SaumError::ChunkTranscription {
                    index: spec.index,
                    start: spec.start,
                    end: spec.end,
                    message: e.to_string(),
                });
            }
        }
    }

    results.sort_by_key(|(index, _)| *index);
    Ok(results.into_iter().map(|(_, chunk)| chunk).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::ChunkSpec;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn artifacts(n: usize) -> Vec<AudioArtifact> {
        (0..n)
            .map(|index| AudioArtifact {
                spec: ChunkSpec {
                    index,
                    total: n,
                    start: index as f64 * 100.0,
                    end: (index as f64 + 1.0) * 100.0,
                    has_overlap_before: index > 0,
                    has_overlap_after: index + 1 < n,
                },
                path: PathBuf::from(format!("/nonexistent/chunk_{index}.mp3")),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_bounded_policy_caps_in_flight_calls() {
        let active = Arc::new(AtomicUsize::new(0));
        let high_water = Arc::new(AtomicUsize::new(0));

        let result = execute_chunks(
            artifacts(8),
            ConcurrencyPolicy::Bounded(3),
            None,
            |artifact| {
                let active = Arc::clone(&active);
                let high_water = Arc::clone(&high_water);
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    high_water.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(ChunkResult::new(
                        format!("chunk {}", artifact.spec.index),
                        artifact.spec.start,
                        artifact.spec.end,
                    ))
                }
            },
        )
        .await
        .unwrap();

        assert_eq!(result.len(), 8);
        assert!(high_water.load(Ordering::SeqCst) <= 3);
        assert!(high_water.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_sequential_policy_runs_one_at_a_time() {
        let active = Arc::new(AtomicUsize::new(0));
        let high_water = Arc::new(AtomicUsize::new(0));

        execute_chunks(
            artifacts(4),
            ConcurrencyPolicy::Sequential,
            None,
            |artifact| {
                let active = Arc::clone(&active);
                let high_water = Arc::clone(&high_water);
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    high_water.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(ChunkResult::new(String::new(), artifact.spec.start, artifact.spec.end))
                }
            },
        )
        .await
        .unwrap();

        assert_eq!(high_water.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_results_come_back_in_plan_order() {
        let result = execute_chunks(
            artifacts(6),
            ConcurrencyPolicy::Unbounded,
            None,
            |artifact| async move {
                // Later chunks finish first.
                let delay = 30 - artifact.spec.index as u64 * 5;
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok(ChunkResult::new(
                    format!("{}", artifact.spec.index),
                    artifact.spec.start,
                    artifact.spec.end,
                ))
            },
        )
        .await
        .unwrap();

        let order: Vec<&str> = result.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(order, vec!["0", "1", "2", "3", "4", "5"]);
    }

    #[tokio::test]
    async fn test_single_failure_rejects_the_whole_call() {
        let progress = Arc::new(AtomicU64::new(0));

        let err = execute_chunks(
            artifacts(5),
            ConcurrencyPolicy::Bounded(2),
            Some(Arc::clone(&progress)),
            |artifact| async move {
                if artifact.spec.index == 2 {
                    Err(SaumError::Transcription("backend exploded".into()))
                } else {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Ok(ChunkResult::new(String::new(), artifact.spec.start, artifact.spec.end))
                }
            },
        )
        .await
        .unwrap_err();

        match err {
            SaumError::ChunkTranscription { index, start, end, message } => {
                assert_eq!(index, 2);
                assert_eq!(start, 200.0);
                assert_eq!(end, 300.0);
                assert!(message.contains("backend exploded"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_plan_is_a_no_op() {
        let result = execute_chunks(
            Vec::new(),
            ConcurrencyPolicy::Bounded(3),
            None,
            |artifact| async move {
                Ok(ChunkResult::new(String::new(), artifact.spec.start, artifact.spec.end))
            },
        )
        .await
        .unwrap();
        assert!(result.is_empty());
    }
}
