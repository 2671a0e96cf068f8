//! Shared job store for asynchronous transcription backends.
//!
//! Async backends return a job id at submission time and deliver the result
//! out-of-band through the webhook receiver, which writes it in here. The
//! submitting side polls [`JobStore::state`] on a fixed interval. This is the
//! only cross-run shared mutable state in the pipeline; entries are evicted by
//! a periodic sweep so the store does not grow without bound.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Lifecycle state of one transcription job.
#[derive(Debug, Clone)]
pub enum JobState {
    /// Submitted, no delivery yet.
    Pending,
    /// The backend acknowledged it is working on the job.
    Processing,
    /// Terminal: result payload delivered via webhook.
    Completed(serde_json::Value),
    /// Terminal: the backend reported a failure.
    Failed(String),
}

#[derive(Debug, Clone)]
struct JobEntry {
    state: JobState,
    created_at: Instant,
    delivered_at: Option<DateTime<Utc>>,
}

/// Serializable summary of one tracked job.
#[derive(Debug, Clone, serde::Serialize)]
pub struct JobSummary {
    pub id: String,
    pub state: &'static str,
    pub age_seconds: u64,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Concurrent map of in-flight and recently completed async jobs.
///
/// Keys are normalized (ASCII case-folded) job ids, so the id the vendor
/// echoes in a webhook matches the id the submission returned regardless of
/// casing differences between the two paths.
#[derive(Debug, Default)]
pub struct JobStore {
    inner: RwLock<HashMap<String, JobEntry>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn normalize(id: &str) -> String {
        id.trim().to_ascii_lowercase()
    }

    /// Register a freshly submitted job as pending.
    ///
    /// A no-op when the id is already tracked: the webhook can deliver in the
    /// window between submission and registration, and that result must not
    /// be clobbered.
    pub async fn create(&self, id: &str) {
        let key = Self::normalize(id);
        let mut inner = self.inner.write().await;
        inner.entry(key).or_insert_with(|| JobEntry {
            state: JobState::Pending,
            created_at: Instant::now(),
            delivered_at: None,
        });
    }

    /// Mark a job as being processed by the backend.
    pub async fn mark_processing(&self, id: &str) {
        let key = Self::normalize(id);
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner.get_mut(&key) {
            if matches!(entry.state, JobState::Pending) {
                entry.state = JobState::Processing;
            }
        }
    }

    /// Terminal completion with the delivered payload.
    ///
    /// Unknown ids are stored anyway: with several pipeline runs sharing one
    /// receiver, a delivery can race the submitting run's `create`.
    pub async fn complete(&self, id: &str, payload: serde_json::Value) {
        let key = Self::normalize(id);
        let mut inner = self.inner.write().await;
        let entry = inner.entry(key.clone()).or_insert_with(|| JobEntry {
            state: JobState::Pending,
            created_at: Instant::now(),
            delivered_at: None,
        });
        if matches!(entry.state, JobState::Completed(_) | JobState::Failed(_)) {
            warn!("Ignoring duplicate delivery for job {}", key);
            return;
        }
        entry.state = JobState::Completed(payload);
        entry.delivered_at = Some(Utc::now());
        debug!("Job {} completed", key);
    }

    /// Terminal failure with the backend's reason.
    pub async fn fail(&self, id: &str, reason: &str) {
        let key = Self::normalize(id);
        let mut inner = self.inner.write().await;
        let entry = inner.entry(key.clone()).or_insert_with(|| JobEntry {
            state: JobState::Pending,
            created_at: Instant::now(),
            delivered_at: None,
        });
        if matches!(entry.state, JobState::Completed(_) | JobState::Failed(_)) {
            return;
        }
        entry.state = JobState::Failed(reason.to_string());
        entry.delivered_at = Some(Utc::now());
        debug!("Job {} failed: {}", key, reason);
    }

    /// Current state of a job, if known.
    pub async fn state(&self, id: &str) -> Option<JobState> {
        let key = Self::normalize(id);
        let inner = self.inner.read().await;
        inner.get(&key).map(|entry| entry.state.clone())
    }

    /// Drop the entry for a job (after the poller has consumed its result).
    pub async fn remove(&self, id: &str) {
        let key = Self::normalize(id);
        let mut inner = self.inner.write().await;
        inner.remove(&key);
    }

    /// Number of tracked jobs.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Serializable view of every tracked job, sorted by id.
    pub async fn snapshot(&self) -> Vec<JobSummary> {
        let inner = self.inner.read().await;
        let mut jobs: Vec<JobSummary> = inner
            .iter()
            .map(|(id, entry)| JobSummary {
                id: id.clone(),
                state: match entry.state {
                    JobState::Pending => "pending",
                    JobState::Processing => "processing",
                    JobState::Completed(_) => "completed",
                    JobState::Failed(_) => "failed",
                },
                age_seconds: entry.created_at.elapsed().as_secs(),
                delivered_at: entry.delivered_at,
            })
            .collect();
        jobs.sort_by(|a, b| a.id.cmp(&b.id));
        jobs
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Evict entries older than `ttl`, regardless of state. Returns how many
    /// were removed.
    pub async fn evict_stale(&self, ttl: Duration) -> usize {
        let mut inner = self.inner.write().await;
        let before = inner.len();
        inner.retain(|_, entry| entry.created_at.elapsed() < ttl);
        let evicted = before - inner.len();
        if evicted > 0 {
            info!("Evicted {} stale transcription jobs", evicted);
        }
        evicted
    }

    /// Spawn the background eviction sweep. The task runs for the lifetime of
    /// the process, independent of any single pipeline run.
    pub fn spawn_eviction_sweep(
        self: &Arc<Self>,
        period: Duration,
        ttl: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                store.evict_stale(ttl).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_lifecycle_with_case_folded_ids() {
        let store = JobStore::new();
        store.create("Job-ABC").await;

        assert!(matches!(
            store.state("job-abc").await,
            Some(JobState::Pending)
        ));

        store.mark_processing("JOB-abc").await;
        assert!(matches!(
            store.state("job-abc").await,
            Some(JobState::Processing)
        ));

        store.complete("job-ABC", json!({"ok": true})).await;
        match store.state("Job-Abc").await {
            Some(JobState::Completed(payload)) => assert_eq!(payload["ok"], true),
            other => panic!("unexpected state: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_terminal_states_are_sticky() {
        let store = JobStore::new();
        store.create("a").await;
        store.fail("a", "upstream 500").await;
        store.complete("a", json!({"late": true})).await;

        assert!(matches!(store.state("a").await, Some(JobState::Failed(_))));
    }

    #[tokio::test]
    async fn test_delivery_before_create_is_kept() {
        let store = JobStore::new();
        store.complete("early", json!({"n": 1})).await;

        // The submitting side registers after the delivery raced it in; the
        // payload must survive.
        store.create("EARLY").await;
        assert!(matches!(
            store.state("early").await,
            Some(JobState::Completed(_))
        ));
    }

    #[tokio::test]
    async fn test_snapshot_reports_states() {
        let store = JobStore::new();
        store.create("b").await;
        store.create("a").await;
        store.complete("b", json!({})).await;

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].id, "a");
        assert_eq!(snapshot[0].state, "pending");
        assert!(snapshot[0].delivered_at.is_none());
        assert_eq!(snapshot[1].id, "b");
        assert_eq!(snapshot[1].state, "completed");
        assert!(snapshot[1].delivered_at.is_some());
    }

    #[tokio::test]
    async fn test_eviction() {
        let store = JobStore::new();
        store.create("a").await;
        store.create("b").await;
        assert_eq!(store.len().await, 2);

        // Nothing is older than an hour.
        assert_eq!(store.evict_stale(Duration::from_secs(3600)).await, 0);
        // Everything is older than zero.
        assert_eq!(store.evict_stale(Duration::ZERO).await, 2);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_concurrent_deliveries_do_not_cross() {
        let store = Arc::new(JobStore::new());
        store.create("run-one").await;
        store.create("run-two").await;

        let s1 = Arc::clone(&store);
        let s2 = Arc::clone(&store);
        let t1 = tokio::spawn(async move { s1.complete("run-one", json!({"run": 1})).await });
        let t2 = tokio::spawn(async move { s2.complete("run-two", json!({"run": 2})).await });
        t1.await.unwrap();
        t2.await.unwrap();

        match store.state("run-one").await {
            Some(JobState::Completed(payload)) => assert_eq!(payload["run"], 1),
            other => panic!("unexpected state: {:?}", other),
        }
        match store.state("run-two").await {
            Some(JobState::Completed(payload)) => assert_eq!(payload["run"], 2),
            other => panic!("unexpected state: {:?}", other),
        }
    }
}
