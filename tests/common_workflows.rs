//! Integration tests for common comb workflows.
//!
//! These tests walk a producer and a simulated worker through the
//! job lifecycle against the in-memory store.

use comb::prelude::*;
use std::sync::Arc;

fn queue(name: &str) -> (Queue, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let queue = Queue::with_store(QueueConfig::new("memory://", name), store.clone());
    (queue, store)
}

// =============================================================================
// Producer Workflows
// =============================================================================

#[tokio::test]
async fn test_produce_configure_and_fetch() {
    let (queue, _) = queue("emails");

    let mut job = queue.create_job(json!({"to": "user@example.com", "subject": "Welcome"}));
    job.retries(3)
        .unwrap()
        .timeout(30_000)
        .unwrap()
        .backoff("exponential", 1_000)
        .unwrap();

    let outcome = job.save().await.unwrap();
    let id = outcome.id().unwrap().to_string();
    assert_eq!(job.id(), id);

    let fetched = queue.get_job(&id).await.unwrap().unwrap();
    assert_eq!(fetched.data, job.data);
    assert_eq!(fetched.options().retries, Some(3));
    assert_eq!(fetched.options().timeout, Some(30_000));
    assert_eq!(fetched.options().backoff, Some(Backoff::new("exponential", 1_000)));
    assert_eq!(fetched.status, JobStatus::Created);
    assert_eq!(fetched.count, None);
}

#[tokio::test]
async fn test_ids_are_sequential_per_queue() {
    let (emails, store) = queue("emails");
    let reports = Queue::with_store(QueueConfig::new("memory://", "reports"), store);

    let mut ids = Vec::new();
    for target in [&emails, &emails, &reports] {
        let mut job = target.create_job(json!({}));
        job.save().await.unwrap();
        ids.push(job.id().to_string());
    }

    assert_eq!(ids, vec!["1", "2", "1"]);
}

#[tokio::test]
async fn test_recurring_and_plain_ids_share_jobs_table() {
    let (queue, store) = queue("reports");

    let mut plain = queue.create_job(json!("plain"));
    plain.set_id("daily").unwrap();
    plain.save().await.unwrap();

    let mut recurring = queue.create_job(json!("recurring"));
    recurring.set_id("daily").unwrap().set_interval("1d").unwrap();
    assert!(recurring.save().await.unwrap().is_created());

    assert_eq!(plain.id(), "daily");
    assert_eq!(recurring.id(), "r:86400000:daily");
    assert_eq!(recurring.interval(), Some(86_400_000));
    assert!(store.hash_field(&queue.keys().jobs, "daily").is_some());
    assert!(store.hash_field(&queue.keys().jobs, "r:86400000:daily").is_some());
}

// =============================================================================
// Worker-side Workflows
// =============================================================================

#[tokio::test]
async fn test_failed_job_retry_and_progress() {
    let (queue, store) = queue("emails");
    let keys = queue.keys().clone();

    let mut job = queue.create_job(json!({"attempt": 1}));
    job.save().await.unwrap();

    // A worker picks the job up, reports progress, then fails it.
    let mut claimed = queue.get_job(job.id()).await.unwrap().unwrap();
    claimed.report_progress(json!({"percent": 50})).await.unwrap();
    store.add_to_set(&keys.failed, claimed.id());

    assert!(job.is_in_set("failed").await.unwrap());

    job.retry().await.unwrap();
    assert!(!job.is_in_set("failed").await.unwrap());
    assert_eq!(store.list(&keys.waiting).first().map(String::as_str), Some(job.id()));

    let events: Vec<JobEvent> = store
        .published()
        .into_iter()
        .filter(|(channel, _)| *channel == keys.events)
        .map(|(_, message)| serde_json::from_str(&message).unwrap())
        .collect();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, job.id());
    assert_eq!(events[0].data, json!({"percent": 50}));
}

#[tokio::test]
async fn test_callback_adapter_reports_save_outcome() {
    let (queue, _) = queue("emails");
    let mut job = queue.create_job(json!({}));

    let mut reported = None;
    let outcome = comb::callback::with_callback(job.save(), |err, outcome| {
        assert!(err.is_none());
        reported = outcome.and_then(|o| o.id()).map(str::to_string);
    })
    .await
    .unwrap();

    assert_eq!(reported.as_deref(), outcome.id());
}
