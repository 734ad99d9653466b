//! Contract with the atomic store executor.
//!
//! Every operation here must run as one indivisible unit on the store side.
//! The client holds no locks; concurrent producers and workers rely solely
//! on this atomicity.

use crate::error::QueueResult;
use crate::queue::QueueKeys;
use async_trait::async_trait;

/// Result of an enqueue operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The job was written under this id.
    Created(String),
    /// A job with the candidate id already exists; nothing was written.
    Duplicate,
}

impl EnqueueOutcome {
    /// Id of the created job.
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Created(id) => Some(id),
            Self::Duplicate => None,
        }
    }

    /// Whether the job was created.
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }

    /// Map a store reply where a missing id means nothing was created.
    pub fn from_reply(reply: Option<String>) -> Self {
        match reply {
            Some(id) => Self::Created(id),
            None => Self::Duplicate,
        }
    }
}

/// Atomic operations a job needs from the store.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Enqueue a job for immediate processing.
    ///
    /// Atomically: take the next value of `keys.id` when `candidate_id` is
    /// empty, write `job` into `keys.jobs` unless the id exists, push the id
    /// onto `keys.waiting`.
    async fn add_job(
        &self,
        keys: &QueueKeys,
        candidate_id: &str,
        job: &str,
    ) -> QueueResult<EnqueueOutcome>;

    /// Enqueue a job due at `delay` (ms since epoch).
    ///
    /// Same as [`JobStore::add_job`], but the id is added to `keys.delayed`
    /// scored by `delay`. When it becomes the earliest delayed job, `delay`
    /// is announced on `keys.earlier_delayed`.
    async fn add_delayed_job(
        &self,
        keys: &QueueKeys,
        candidate_id: &str,
        job: &str,
        delay: i64,
    ) -> QueueResult<EnqueueOutcome>;

    /// Read the encoded job record.
    async fn get_job(&self, keys: &QueueKeys, id: &str) -> QueueResult<Option<String>>;

    /// Delete the record and drop the id from every queue structure.
    async fn remove_job(&self, keys: &QueueKeys, id: &str) -> QueueResult<bool>;

    /// Move the id from `keys.failed` to the head of `keys.waiting`.
    async fn retry_job(&self, keys: &QueueKeys, id: &str) -> QueueResult<()>;

    /// Whether `id` is a member of the set stored at `set_key`.
    async fn is_member(&self, set_key: &str, id: &str) -> QueueResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_reply() {
        let created = EnqueueOutcome::from_reply(Some("5".to_string()));
        assert!(created.is_created());
        assert_eq!(created.id(), Some("5"));

        let duplicate = EnqueueOutcome::from_reply(None);
        assert!(!duplicate.is_created());
        assert_eq!(duplicate.id(), None);
    }
}
