//! Queue-scoped cache of saved jobs.
//!
//! Jobs saved through a queue that stores jobs are registered here by id.
//! The cache is bounded; when full, the least recently registered or read
//! job is evicted.
//!
//! Entries are [`JobSnapshot`]s, which do not hold the queue, so a cached
//! job never keeps its own queue alive.

use crate::job::{JobData, JobOptions, JobStatus};
use lru::LruCache;
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::num::NonZeroUsize;

/// Capacity used when none is configured.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Job state as of its last save, detached from the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSnapshot {
    /// Stored id
    pub id: String,
    /// Job payload data
    pub data: JobData,
    /// Scheduling options
    pub options: JobOptions,
    /// Last known status
    pub status: JobStatus,
    /// Last reported progress
    pub progress: Value,
    /// Retry count
    pub count: Option<u32>,
}

/// Bounded id → job map.
pub struct JobCache {
    jobs: Mutex<LruCache<String, JobSnapshot>>,
}

impl JobCache {
    /// Create a cache holding at most `capacity` jobs (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            jobs: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Register a job snapshot under its id. Returns the evicted job, if any.
    pub fn insert(&self, job: JobSnapshot) -> Option<JobSnapshot> {
        let id = job.id.clone();
        match self.jobs.lock().push(id.clone(), job) {
            Some((evicted, job)) if evicted != id => Some(job),
            _ => None,
        }
    }

    /// Snapshot of a registered job.
    pub fn get(&self, id: &str) -> Option<JobSnapshot> {
        self.jobs.lock().get(id).cloned()
    }

    /// Drop a registered job.
    pub fn remove(&self, id: &str) -> Option<JobSnapshot> {
        self.jobs.lock().pop(id)
    }

    /// Whether a job is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.jobs.lock().contains(id)
    }

    /// Number of registered jobs.
    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    /// Maximum number of jobs held.
    pub fn capacity(&self) -> usize {
        self.jobs.lock().cap().get()
    }
}

impl Default for JobCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl fmt::Debug for JobCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(id: &str) -> JobSnapshot {
        JobSnapshot {
            id: id.to_string(),
            data: json!({ "id": id }),
            options: JobOptions::default(),
            status: JobStatus::Created,
            progress: json!(0),
            count: None,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let cache = JobCache::new(4);

        assert!(cache.insert(snapshot("a")).is_none());
        assert!(cache.contains("a"));
        assert_eq!(cache.get("a").unwrap().data, json!({"id": "a"}));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let cache = JobCache::new(2);

        cache.insert(snapshot("a"));
        cache.insert(snapshot("b"));
        cache.get("a");

        let evicted = cache.insert(snapshot("c")).unwrap();
        assert_eq!(evicted.id, "b");
        assert!(cache.contains("a"));
        assert!(cache.contains("c"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_reinsert_replaces_without_eviction() {
        let cache = JobCache::new(1);

        cache.insert(snapshot("a"));
        let mut updated = snapshot("a");
        updated.status = JobStatus::Retrying;
        assert!(cache.insert(updated).is_none());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a").unwrap().status, JobStatus::Retrying);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let cache = JobCache::new(0);
        assert_eq!(cache.capacity(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_remove() {
        let cache = JobCache::default();
        cache.insert(snapshot("a"));

        assert!(cache.remove("a").is_some());
        assert!(!cache.contains("a"));
        assert_eq!(cache.capacity(), DEFAULT_CAPACITY);
    }
}
