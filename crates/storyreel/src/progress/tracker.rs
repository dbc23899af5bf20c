//! Per-job progress records for pollers, with an optional broadcast feed.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::Instant;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Processing,
    Completed,
    Failed,
}

/// Snapshot of one generation run's progress.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressRecord {
    /// Overall completion in `[0, 100]`.
    pub percentage: f32,
    pub current_step: String,
    pub status: ProgressStatus,
    /// Serialized as fractional seconds.
    #[serde(default, with = "eta_secs", skip_serializing_if = "Option::is_none")]
    pub estimated_time_remaining: Option<Duration>,
    pub updated_at: DateTime<Utc>,
}

mod eta_secs {
    use std::time::Duration;

    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(eta: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match eta {
            Some(eta) => serializer.serialize_some(&eta.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Option::<f64>::deserialize(deserializer)?
            .map(|secs| Duration::try_from_secs_f64(secs).map_err(de::Error::custom))
            .transpose()
    }
}

/// A record change, as sent to subscribers.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub job_id: String,
    pub record: Arc<ProgressRecord>,
}

struct Entry {
    record: Arc<ProgressRecord>,
    started: Instant,
}

/// Holds one progress record per job.
///
/// Every write replaces the job's record as a whole, so readers always observe a
/// consistent snapshot. Within a run the percentage never decreases.
pub struct ProgressTracker {
    entries: RwLock<HashMap<String, Entry>>,
    sender: broadcast::Sender<ProgressUpdate>,
    initial_estimate: Duration,
}

impl ProgressTracker {
    pub fn new(initial_estimate: Duration) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            entries: RwLock::new(HashMap::new()),
            sender,
            initial_estimate,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Entry>> {
        match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Progress tracker lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Entry>> {
        match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Progress tracker lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Subscribe to record changes. Slow receivers may observe `Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressUpdate> {
        self.sender.subscribe()
    }

    fn publish(&self, job_id: &str, record: &Arc<ProgressRecord>) {
        // No receivers is fine.
        let _ = self.sender.send(ProgressUpdate {
            job_id: job_id.to_string(),
            record: Arc::clone(record),
        });
    }

    /// Starts a new run for `job_id` at 0%, replacing any previous record.
    pub fn begin(&self, job_id: &str, step: &str) -> Arc<ProgressRecord> {
        let record = Arc::new(ProgressRecord {
            percentage: 0.0,
            current_step: step.to_string(),
            status: ProgressStatus::Processing,
            estimated_time_remaining: Some(self.initial_estimate),
            updated_at: Utc::now(),
        });
        self.write().insert(
            job_id.to_string(),
            Entry {
                record: Arc::clone(&record),
                started: Instant::now(),
            },
        );
        self.publish(job_id, &record);
        record
    }

    /// Moves a running job forward.
    ///
    /// Values below the current percentage keep the current percentage; the step
    /// label is still updated. Returns `None` if the job has no running record.
    pub fn advance(&self, job_id: &str, percentage: f32, step: &str) -> Option<Arc<ProgressRecord>> {
        let record = {
            let mut entries = self.write();
            let entry = entries.get_mut(job_id)?;
            if entry.record.status != ProgressStatus::Processing {
                return None;
            }

            let percentage = percentage.clamp(0.0, 100.0).max(entry.record.percentage);
            let eta = self.estimate_remaining(entry.started.elapsed(), percentage);
            let record = Arc::new(ProgressRecord {
                percentage,
                current_step: step.to_string(),
                status: ProgressStatus::Processing,
                estimated_time_remaining: Some(eta),
                updated_at: Utc::now(),
            });
            entry.record = Arc::clone(&record);
            record
        };
        self.publish(job_id, &record);
        Some(record)
    }

    pub fn complete(&self, job_id: &str) -> Option<Arc<ProgressRecord>> {
        self.finish(job_id, ProgressStatus::Completed, "Completed".to_string())
    }

    /// Marks the run failed, keeping the last percentage.
    pub fn fail(&self, job_id: &str, reason: &str) -> Option<Arc<ProgressRecord>> {
        self.finish(job_id, ProgressStatus::Failed, format!("Failed: {}", reason))
    }

    fn finish(
        &self,
        job_id: &str,
        status: ProgressStatus,
        step: String,
    ) -> Option<Arc<ProgressRecord>> {
        let record = {
            let mut entries = self.write();
            let entry = entries.get_mut(job_id)?;
            let percentage = match status {
                ProgressStatus::Completed => 100.0,
                _ => entry.record.percentage,
            };
            let record = Arc::new(ProgressRecord {
                percentage,
                current_step: step,
                status,
                estimated_time_remaining: None,
                updated_at: Utc::now(),
            });
            entry.record = Arc::clone(&record);
            record
        };
        self.publish(job_id, &record);
        Some(record)
    }

    pub fn get(&self, job_id: &str) -> Option<Arc<ProgressRecord>> {
        self.read().get(job_id).map(|e| Arc::clone(&e.record))
    }

    pub fn remove(&self, job_id: &str) -> Option<Arc<ProgressRecord>> {
        self.write().remove(job_id).map(|e| e.record)
    }

    fn estimate_remaining(&self, elapsed: Duration, percentage: f32) -> Duration {
        if percentage <= 0.0 {
            return self.initial_estimate;
        }
        let p = f64::from(percentage);
        elapsed.mul_f64((100.0 - p) / p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> ProgressTracker {
        ProgressTracker::new(Duration::from_secs(300))
    }

    #[tokio::test]
    async fn test_begin_sets_initial_estimate() {
        let tracker = tracker();
        let record = tracker.begin("job", "Starting");
        assert_eq!(record.percentage, 0.0);
        assert_eq!(record.status, ProgressStatus::Processing);
        assert_eq!(record.estimated_time_remaining, Some(Duration::from_secs(300)));
    }

    #[tokio::test]
    async fn test_advance_never_decreases() {
        let tracker = tracker();
        tracker.begin("job", "Starting");
        tracker.advance("job", 40.0, "Images");
        let record = tracker.advance("job", 25.0, "Still images").unwrap();

        assert_eq!(record.percentage, 40.0);
        assert_eq!(record.current_step, "Still images");
    }

    #[tokio::test]
    async fn test_advance_clamps_to_range() {
        let tracker = tracker();
        tracker.begin("job", "Starting");
        let record = tracker.advance("job", 250.0, "Over").unwrap();
        assert_eq!(record.percentage, 100.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eta_scales_with_elapsed_time() {
        let tracker = tracker();
        tracker.begin("job", "Starting");
        tokio::time::advance(Duration::from_secs(10)).await;

        let record = tracker.advance("job", 25.0, "Quarter").unwrap();
        assert_eq!(record.estimated_time_remaining, Some(Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn test_fail_keeps_percentage() {
        let tracker = tracker();
        tracker.begin("job", "Starting");
        tracker.advance("job", 60.0, "Voice");
        let record = tracker.fail("job", "voice synthesis failed").unwrap();

        assert_eq!(record.percentage, 60.0);
        assert_eq!(record.status, ProgressStatus::Failed);
        assert_eq!(record.current_step, "Failed: voice synthesis failed");
        assert!(tracker.advance("job", 80.0, "ignored").is_none());
    }

    #[tokio::test]
    async fn test_complete() {
        let tracker = tracker();
        tracker.begin("job", "Starting");
        let record = tracker.complete("job").unwrap();
        assert_eq!(record.percentage, 100.0);
        assert_eq!(record.status, ProgressStatus::Completed);
        assert!(record.estimated_time_remaining.is_none());
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let tracker = tracker();
        assert!(tracker.get("missing").is_none());
        assert!(tracker.advance("missing", 10.0, "x").is_none());
        assert!(tracker.fail("missing", "x").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_json_uses_seconds() {
        let tracker = tracker();
        tracker.begin("job", "Starting");
        tokio::time::advance(Duration::from_secs(3)).await;
        let record = tracker.advance("job", 50.0, "Voice").unwrap();

        let json = serde_json::to_value(record.as_ref()).unwrap();
        assert_eq!(json["current_step"], "Voice");
        assert_eq!(json["status"], "processing");
        assert_eq!(json["estimated_time_remaining"], 3.0);

        let back: ProgressRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back.estimated_time_remaining, Some(Duration::from_secs(3)));

        let done = tracker.complete("job").unwrap();
        let json = serde_json::to_value(done.as_ref()).unwrap();
        assert!(json.get("estimated_time_remaining").is_none());
    }

    #[tokio::test]
    async fn test_subscribe_receives_updates() {
        let tracker = tracker();
        let mut rx = tracker.subscribe();

        tracker.begin("job", "Starting");
        tracker.advance("job", 10.0, "Scenes");

        let first = rx.recv().await.unwrap();
        assert_eq!(first.job_id, "job");
        assert_eq!(first.record.percentage, 0.0);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.record.percentage, 10.0);
    }
}
