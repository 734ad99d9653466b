//! Job definition, options and lifecycle operations.

use crate::backoff::Backoff;
use crate::cache::JobSnapshot;
use crate::error::{QueueError, QueueResult};
use crate::events::JobEvent;
use crate::queue::Queue;
use crate::recurring::{IntoInterval, RecurringId, is_reserved};
use crate::store::EnqueueOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

/// Job data payload.
pub type JobData = Value;

/// Current time in milliseconds since the Unix epoch.
pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Client-side job status.
///
/// This mirrors the last known state; other processes may have moved the
/// stored job on since.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Built locally, not yet processed
    #[default]
    Created,
    /// Handler completed
    Succeeded,
    /// Handler failed and will not be retried
    Failed,
    /// Handler failed and the job is queued for another attempt
    Retrying,
}

/// Scheduling options persisted with the job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobOptions {
    /// Creation instant, ms since epoch
    pub timestamp: i64,

    /// Failure stack traces, oldest first
    pub stacktraces: Vec<String>,

    /// Due instant for delayed jobs, ms since epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<i64>,

    /// Maximum number of retries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,

    /// Handler timeout in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Retry backoff
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff: Option<Backoff>,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            timestamp: now_ms(),
            stacktraces: Vec::new(),
            delay: None,
            retries: None,
            timeout: None,
            backoff: None,
        }
    }
}

#[derive(Serialize)]
struct RecordRef<'a> {
    data: &'a Value,
    options: &'a JobOptions,
    status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<u32>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Record {
    data: Value,
    options: JobOptions,
    status: JobStatus,
    #[serde(default)]
    count: Option<u32>,
}

/// Values accepted by [`Job::delay_until`].
pub trait IntoTimestamp {
    /// Resolve to ms since the Unix epoch.
    fn into_timestamp(self) -> QueueResult<i64>;
}

impl IntoTimestamp for DateTime<Utc> {
    fn into_timestamp(self) -> QueueResult<i64> {
        self.timestamp_millis().into_timestamp()
    }
}

impl IntoTimestamp for i64 {
    fn into_timestamp(self) -> QueueResult<i64> {
        if self < 0 {
            return Err(QueueError::InvalidDelay(self.to_string()));
        }
        Ok(self)
    }
}

impl IntoTimestamp for f64 {
    fn into_timestamp(self) -> QueueResult<i64> {
        if !self.is_finite() || self < 0.0 || self > i64::MAX as f64 {
            return Err(QueueError::InvalidDelay(self.to_string()));
        }
        Ok(self as i64)
    }
}

impl IntoTimestamp for &str {
    fn into_timestamp(self) -> QueueResult<i64> {
        let text = self.trim();
        if let Ok(ms) = text.parse::<i64>() {
            return ms.into_timestamp();
        }
        DateTime::parse_from_rfc3339(text)
            .map_err(|e| QueueError::InvalidDelay(format!("{text:?}: {e}")))?
            .with_timezone(&Utc)
            .into_timestamp()
    }
}

impl IntoTimestamp for String {
    fn into_timestamp(self) -> QueueResult<i64> {
        self.as_str().into_timestamp()
    }
}

/// A job to be processed.
#[derive(Clone)]
pub struct Job {
    queue: Queue,

    id: String,

    /// Job payload data
    pub data: JobData,

    options: JobOptions,

    /// Last known status
    pub status: JobStatus,

    progress: Value,

    /// Retry count, present once the job has been retried
    pub count: Option<u32>,
}

impl Job {
    /// Create a new job in `created` status.
    ///
    /// An empty `id` lets the store allocate one on save. The id is taken
    /// as given: unlike [`Job::set_id`], an `r:` prefix is not rejected, so
    /// recurring ids can be rebuilt here.
    pub fn new(queue: &Queue, id: impl Into<String>, data: JobData, options: JobOptions) -> Self {
        Self {
            queue: queue.clone(),
            id: id.into(),
            data,
            options,
            status: JobStatus::Created,
            progress: Value::from(0),
            count: None,
        }
    }

    /// Fetch a job from the store. `Ok(None)` if no record exists.
    pub async fn from_id(queue: &Queue, id: &str) -> QueueResult<Option<Self>> {
        let record = queue.store().get_job(queue.keys(), id).await?;
        record
            .map(|record| Self::from_data(queue, id, &record))
            .transpose()
    }

    /// Decode a stored record.
    ///
    /// Records are only ever written by [`Job::to_data`]; anything that does
    /// not decode is reported as [`QueueError::Corrupted`].
    pub fn from_data(queue: &Queue, id: impl Into<String>, data: &str) -> QueueResult<Self> {
        let id = id.into();
        let record: Record = serde_json::from_str(data).map_err(|e| QueueError::Corrupted {
            id: id.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            queue: queue.clone(),
            id,
            data: record.data,
            options: record.options,
            status: record.status,
            progress: Value::from(0),
            count: record.count,
        })
    }

    /// Queue-free copy of the job's state.
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id.clone(),
            data: self.data.clone(),
            options: self.options.clone(),
            status: self.status,
            progress: self.progress.clone(),
            count: self.count,
        }
    }

    /// Rebuild a job from a snapshot.
    pub fn from_snapshot(queue: &Queue, snapshot: JobSnapshot) -> Self {
        Self {
            queue: queue.clone(),
            id: snapshot.id,
            data: snapshot.data,
            options: snapshot.options,
            status: snapshot.status,
            progress: snapshot.progress,
            count: snapshot.count,
        }
    }

    /// Encode the persisted fields.
    pub fn to_data(&self) -> QueueResult<String> {
        let record = RecordRef {
            data: &self.data,
            options: &self.options,
            status: self.status,
            count: self.count,
        };
        Ok(serde_json::to_string(&record)?)
    }

    /// Job id; empty until saved unless assigned.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Scheduling options.
    pub fn options(&self) -> &JobOptions {
        &self.options
    }

    /// Last reported progress.
    pub fn progress(&self) -> &Value {
        &self.progress
    }

    /// Queue this job belongs to.
    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// Record a failure stack trace.
    pub fn add_stacktrace(&mut self, trace: impl Into<String>) {
        self.options.stacktraces.push(trace.into());
    }

    /// Whether the id encodes a recurrence interval.
    pub fn is_recurring(&self) -> bool {
        RecurringId::parse(&self.id).is_some()
    }

    /// Recurrence interval in milliseconds, for recurring jobs.
    pub fn interval(&self) -> Option<u64> {
        RecurringId::parse(&self.id).map(|id| id.interval_ms)
    }

    /// Assign the job id.
    pub fn set_id(&mut self, id: impl Into<String>) -> QueueResult<&mut Self> {
        let id = id.into();
        if is_reserved(&id) {
            return Err(QueueError::ReservedId(id));
        }
        self.id = id;
        Ok(self)
    }

    /// Make this a recurring job.
    ///
    /// The id becomes `r:<intervalMillis>:<id>`. Without an explicit delay
    /// the job is scheduled 1ms from now so it goes through the delayed path.
    pub fn set_interval(&mut self, interval: impl IntoInterval) -> QueueResult<&mut Self> {
        let interval_ms = interval.into_interval_ms()?;
        if self.queue.config().auto_removes() {
            return Err(QueueError::RecurringWithAutoRemove);
        }
        let recurring = RecurringId::new(interval_ms, self.id.as_str())?;

        self.id = recurring.to_string();
        if self.options.delay.is_none() {
            self.options.delay = Some(now_ms() + 1);
        }
        Ok(self)
    }

    /// Set the maximum number of retries (`0..=u32::MAX`).
    pub fn retries(&mut self, retries: i64) -> QueueResult<&mut Self> {
        let retries = u32::try_from(retries).map_err(|_| QueueError::InvalidRetries(retries))?;
        self.options.retries = Some(retries);
        Ok(self)
    }

    /// Delay the job until `instant`.
    ///
    /// Instants that are not strictly in the future leave the delay
    /// unchanged.
    pub fn delay_until(&mut self, instant: impl IntoTimestamp) -> QueueResult<&mut Self> {
        let timestamp = instant.into_timestamp()?;
        if timestamp > now_ms() {
            self.options.delay = Some(timestamp);
        } else {
            debug!(job_id = %self.id, timestamp, "Ignoring delay in the past");
        }
        Ok(self)
    }

    /// Set the handler timeout in milliseconds.
    pub fn timeout(&mut self, ms: i64) -> QueueResult<&mut Self> {
        let ms = u64::try_from(ms).map_err(|_| QueueError::InvalidTimeout(ms))?;
        self.options.timeout = Some(ms);
        Ok(self)
    }

    /// Set the retry backoff.
    pub fn backoff(&mut self, strategy: &str, delay: i64) -> QueueResult<&mut Self> {
        if !self.queue.backoff_strategies().contains(strategy) {
            return Err(QueueError::UnknownBackoffStrategy(strategy.to_string()));
        }
        let delay = u64::try_from(delay)
            .ok()
            .filter(|d| *d > 0)
            .ok_or(QueueError::InvalidBackoffDelay(delay))?;
        self.options.backoff = Some(Backoff::new(strategy, delay));
        Ok(self)
    }

    /// Persist the job.
    ///
    /// On [`EnqueueOutcome::Created`] the job takes the stored id. On
    /// [`EnqueueOutcome::Duplicate`] nothing changes.
    pub async fn save(&mut self) -> QueueResult<EnqueueOutcome> {
        let encoded = self.to_data()?;
        let store = self.queue.store();
        let keys = self.queue.keys();

        let outcome = match self.options.delay {
            Some(delay) => store.add_delayed_job(keys, &self.id, &encoded, delay).await?,
            None => store.add_job(keys, &self.id, &encoded).await?,
        };

        match &outcome {
            EnqueueOutcome::Created(id) => {
                debug!(queue = %self.queue.name(), job_id = %id, delay = ?self.options.delay, "Saved job");
                self.id = id.clone();
                if let Some(delay) = self.options.delay {
                    self.queue.notify_delayed(delay);
                }
                self.queue.register(self);
            }
            EnqueueOutcome::Duplicate => {
                warn!(queue = %self.queue.name(), job_id = %self.id, "Job id already exists");
            }
        }

        Ok(outcome)
    }

    /// Remove the job from the store.
    pub async fn remove(&self) -> QueueResult<bool> {
        self.require_id()?;
        self.queue.remove_job(&self.id).await
    }

    /// Move a failed job back to the head of the waiting list.
    pub async fn retry(&self) -> QueueResult<()> {
        self.require_id()?;
        debug!(queue = %self.queue.name(), job_id = %self.id, "Retrying job");
        self.queue
            .store()
            .retry_job(self.queue.keys(), &self.id)
            .await
    }

    /// Whether the job is in one of the queue's sets, e.g. `failed`.
    pub async fn is_in_set(&self, set: &str) -> QueueResult<bool> {
        self.require_id()?;
        let key = self.queue.config().key(set);
        self.queue.store().is_member(&key, &self.id).await
    }

    /// Record progress and announce it on the queue's events channel.
    ///
    /// Null is rejected. A failed publication is returned as an error but
    /// the new progress is kept.
    pub async fn report_progress(&mut self, progress: impl Into<Value>) -> QueueResult<()> {
        let progress = progress.into();
        if progress.is_null() {
            return Err(QueueError::InvalidProgress);
        }
        self.progress = progress;

        let event = serde_json::to_string(&JobEvent::progress(self.id.as_str(), self.progress.clone()))?;
        if let Err(e) = self
            .queue
            .events()
            .publish(&self.queue.keys().events, &event)
            .await
        {
            warn!(job_id = %self.id, error = %e, "Failed to publish progress");
            return Err(e);
        }
        Ok(())
    }

    fn require_id(&self) -> QueueResult<()> {
        if self.id.is_empty() {
            return Err(QueueError::NotSaved);
        }
        Ok(())
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("queue", &self.queue.name())
            .field("id", &self.id)
            .field("data", &self.data)
            .field("options", &self.options)
            .field("status", &self.status)
            .field("progress", &self.progress)
            .field("count", &self.count)
            .finish()
    }
}
