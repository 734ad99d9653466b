//! In-process store executor.
//!
//! Mirrors the Redis data layout (counters, hashes, lists, sorted sets,
//! sets, channels) behind a single lock, so each operation is atomic the
//! same way the Lua scripts are. Used for tests and single-process setups.

use crate::error::{QueueError, QueueResult};
use crate::events::EventPublisher;
use crate::queue::QueueKeys;
use crate::store::{EnqueueOutcome, JobStore};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::trace;

#[derive(Debug, Default)]
struct State {
    counters: HashMap<String, u64>,
    hashes: HashMap<String, HashMap<String, String>>,
    lists: HashMap<String, VecDeque<String>>,
    sorted_sets: HashMap<String, BTreeSet<(i64, String)>>,
    sets: HashMap<String, HashSet<String>>,
    published: Vec<(String, String)>,
}

impl State {
    fn next_id(&mut self, key: &str, candidate_id: &str) -> String {
        if !candidate_id.is_empty() {
            return candidate_id.to_string();
        }
        let counter = self.counters.entry(key.to_string()).or_default();
        *counter += 1;
        counter.to_string()
    }

    fn insert_record(&mut self, key: &str, id: &str, job: &str) -> bool {
        let hash = self.hashes.entry(key.to_string()).or_default();
        if hash.contains_key(id) {
            return false;
        }
        hash.insert(id.to_string(), job.to_string());
        true
    }

    fn zadd(&mut self, key: &str, score: i64, member: &str) {
        let set = self.sorted_sets.entry(key.to_string()).or_default();
        set.retain(|(_, m)| m != member);
        set.insert((score, member.to_string()));
    }

    fn lrem(&mut self, key: &str, member: &str) {
        if let Some(list) = self.lists.get_mut(key) {
            list.retain(|m| m != member);
        }
    }

    fn srem(&mut self, key: &str, member: &str) {
        if let Some(set) = self.sets.get_mut(key) {
            set.remove(member);
        }
    }
}

/// Job store kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    fail_store: AtomicBool,
    fail_publish: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent store commands fail.
    pub fn set_fail_store(&self, fail: bool) {
        self.fail_store.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent publications fail.
    pub fn set_fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Add a member to a set.
    pub fn add_to_set(&self, key: &str, member: &str) {
        self.state
            .lock()
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
    }

    /// Members of a set, sorted.
    pub fn set_members(&self, key: &str) -> Vec<String> {
        let state = self.state.lock();
        let mut members: Vec<String> = state
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        members.sort();
        members
    }

    /// Contents of a list, head first.
    pub fn list(&self, key: &str) -> Vec<String> {
        self.state
            .lock()
            .lists
            .get(key)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Contents of a sorted set as `(score, member)`, lowest score first.
    pub fn sorted_set(&self, key: &str) -> Vec<(i64, String)> {
        self.state
            .lock()
            .sorted_sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Stored record for a hash field.
    pub fn hash_field(&self, key: &str, field: &str) -> Option<String> {
        self.state.lock().hashes.get(key)?.get(field).cloned()
    }

    /// Overwrite a hash field.
    pub fn set_hash_field(&self, key: &str, field: &str, value: &str) {
        self.state
            .lock()
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
    }

    /// Every `(channel, message)` published so far.
    pub fn published(&self) -> Vec<(String, String)> {
        self.state.lock().published.clone()
    }

    fn command(&self, name: &str) -> QueueResult<()> {
        if self.fail_store.load(Ordering::SeqCst) {
            return Err(QueueError::Store(format!("{name} failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn add_job(
        &self,
        keys: &QueueKeys,
        candidate_id: &str,
        job: &str,
    ) -> QueueResult<EnqueueOutcome> {
        self.command("addJob")?;
        let mut state = self.state.lock();
        let id = state.next_id(&keys.id, candidate_id);
        if !state.insert_record(&keys.jobs, &id, job) {
            return Ok(EnqueueOutcome::Duplicate);
        }
        state
            .lists
            .entry(keys.waiting.clone())
            .or_default()
            .push_front(id.clone());

        trace!(job_id = %id, "addJob");
        Ok(EnqueueOutcome::Created(id))
    }

    async fn add_delayed_job(
        &self,
        keys: &QueueKeys,
        candidate_id: &str,
        job: &str,
        delay: i64,
    ) -> QueueResult<EnqueueOutcome> {
        self.command("addDelayedJob")?;
        let mut state = self.state.lock();
        let id = state.next_id(&keys.id, candidate_id);
        if !state.insert_record(&keys.jobs, &id, job) {
            return Ok(EnqueueOutcome::Duplicate);
        }
        state.zadd(&keys.delayed, delay, &id);

        let earliest = state
            .sorted_sets
            .get(&keys.delayed)
            .and_then(|set| set.first())
            .is_some_and(|(_, head)| *head == id);
        if earliest {
            state
                .published
                .push((keys.earlier_delayed.clone(), delay.to_string()));
        }

        trace!(job_id = %id, delay, "addDelayedJob");
        Ok(EnqueueOutcome::Created(id))
    }

    async fn get_job(&self, keys: &QueueKeys, id: &str) -> QueueResult<Option<String>> {
        self.command("HGET")?;
        Ok(self.hash_field(&keys.jobs, id))
    }

    async fn remove_job(&self, keys: &QueueKeys, id: &str) -> QueueResult<bool> {
        self.command("removeJob")?;
        let mut state = self.state.lock();
        state.srem(&keys.succeeded, id);
        state.srem(&keys.failed, id);
        state.lrem(&keys.waiting, id);
        state.lrem(&keys.active, id);
        if let Some(delayed) = state.sorted_sets.get_mut(&keys.delayed) {
            delayed.retain(|(_, m)| m != id);
        }
        Ok(state
            .hashes
            .get_mut(&keys.jobs)
            .and_then(|jobs| jobs.remove(id))
            .is_some())
    }

    async fn retry_job(&self, keys: &QueueKeys, id: &str) -> QueueResult<()> {
        self.command("MULTI")?;
        let mut state = self.state.lock();
        state.srem(&keys.failed, id);
        state
            .lists
            .entry(keys.waiting.clone())
            .or_default()
            .push_front(id.to_string());
        Ok(())
    }

    async fn is_member(&self, set_key: &str, id: &str) -> QueueResult<bool> {
        self.command("SISMEMBER")?;
        Ok(self
            .state
            .lock()
            .sets
            .get(set_key)
            .is_some_and(|set| set.contains(id)))
    }
}

#[async_trait]
impl EventPublisher for MemoryStore {
    async fn publish(&self, channel: &str, message: &str) -> QueueResult<u64> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(QueueError::Store(format!("publish to {channel} failed")));
        }
        self.state
            .lock()
            .published
            .push((channel.to_string(), message.to_string()));
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::QueueConfig;

    fn keys() -> QueueKeys {
        QueueKeys::new(&QueueConfig::new("memory://", "test"))
    }

    #[tokio::test]
    async fn test_add_job_allocates_sequential_ids() {
        let store = MemoryStore::new();
        let keys = keys();

        let first = store.add_job(&keys, "", "{}").await.unwrap();
        let second = store.add_job(&keys, "", "{}").await.unwrap();

        assert_eq!(first, EnqueueOutcome::Created("1".into()));
        assert_eq!(second, EnqueueOutcome::Created("2".into()));
        assert_eq!(store.list(&keys.waiting), vec!["2", "1"]);
    }

    #[tokio::test]
    async fn test_add_job_duplicate_id() {
        let store = MemoryStore::new();
        let keys = keys();

        store.add_job(&keys, "abc", "first").await.unwrap();
        let outcome = store.add_job(&keys, "abc", "second").await.unwrap();

        assert_eq!(outcome, EnqueueOutcome::Duplicate);
        assert_eq!(store.hash_field(&keys.jobs, "abc").as_deref(), Some("first"));
        assert_eq!(store.list(&keys.waiting), vec!["abc"]);
    }

    #[tokio::test]
    async fn test_add_delayed_job_orders_by_due_instant() {
        let store = MemoryStore::new();
        let keys = keys();

        store.add_delayed_job(&keys, "late", "{}", 2_000).await.unwrap();
        store.add_delayed_job(&keys, "later", "{}", 3_000).await.unwrap();
        store.add_delayed_job(&keys, "soon", "{}", 1_000).await.unwrap();

        let ids: Vec<String> = store
            .sorted_set(&keys.delayed)
            .into_iter()
            .map(|(_, id)| id)
            .collect();
        assert_eq!(ids, vec!["soon", "late", "later"]);

        // Only jobs that became the earliest are announced.
        let announced: Vec<String> = store
            .published()
            .into_iter()
            .filter(|(channel, _)| *channel == keys.earlier_delayed)
            .map(|(_, delay)| delay)
            .collect();
        assert_eq!(announced, vec!["2000", "1000"]);
        assert!(store.list(&keys.waiting).is_empty());
    }

    #[tokio::test]
    async fn test_remove_job_clears_structures() {
        let store = MemoryStore::new();
        let keys = keys();

        store.add_job(&keys, "7", "{}").await.unwrap();
        store.add_to_set(&keys.failed, "7");

        assert!(store.remove_job(&keys, "7").await.unwrap());
        assert!(store.list(&keys.waiting).is_empty());
        assert!(store.set_members(&keys.failed).is_empty());
        assert!(store.get_job(&keys, "7").await.unwrap().is_none());
        assert!(!store.remove_job(&keys, "7").await.unwrap());
    }

    #[tokio::test]
    async fn test_retry_moves_failed_to_waiting_head() {
        let store = MemoryStore::new();
        let keys = keys();

        store.add_job(&keys, "1", "{}").await.unwrap();
        store.add_to_set(&keys.failed, "9");
        store.retry_job(&keys, "9").await.unwrap();

        assert!(!store.is_member(&keys.failed, "9").await.unwrap());
        assert_eq!(store.list(&keys.waiting), vec!["9", "1"]);
    }

    #[tokio::test]
    async fn test_publish_failure_switch() {
        let store = MemoryStore::new();
        store.publish("chan", "a").await.unwrap();

        store.set_fail_publish(true);
        assert!(store.publish("chan", "b").await.is_err());
        assert_eq!(store.published(), vec![("chan".to_string(), "a".to_string())]);
    }

    #[tokio::test]
    async fn test_store_failure_switch() {
        let store = MemoryStore::new();
        let keys = keys();
        store.set_fail_store(true);

        let err = store.add_job(&keys, "", "{}").await.unwrap_err();
        assert!(matches!(err, QueueError::Store(ref msg) if msg == "addJob failed"));
        assert!(store.retry_job(&keys, "1").await.is_err());
        assert!(store.list(&keys.waiting).is_empty());

        store.set_fail_store(false);
        let outcome = store.add_job(&keys, "", "{}").await.unwrap();
        assert_eq!(outcome, EnqueueOutcome::Created("1".into()));
    }
}
