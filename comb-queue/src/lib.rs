//! Job entity and enqueue contract for comb.
//!
//! Provides:
//! - 📦 Redis-backed persistence through atomic Lua scripts
//! - ⏰ Delayed and recurring jobs
//! - 🔄 Retry limits, timeouts and named backoff strategies
//! - 📊 Progress notifications
//! - 🧪 An in-memory store with the same atomic contract
//!
//! ## Quick Start - Job Creation
//!
//! ```
//! use comb_queue::{JobStatus, MemoryStore, Queue, QueueConfig};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let queue = Queue::with_store(
//!     QueueConfig::new("redis://localhost:6379", "emails"),
//!     Arc::new(MemoryStore::new()),
//! );
//!
//! let mut job = queue.create_job(json!({"to": "user@example.com"}));
//! job.retries(3).unwrap().timeout(30_000).unwrap();
//!
//! assert_eq!(job.status, JobStatus::Created);
//! assert_eq!(job.options().retries, Some(3));
//! ```
//!
//! ## Recurring Jobs
//!
//! ```
//! use comb_queue::{MemoryStore, Queue, QueueConfig};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let queue = Queue::with_store(
//!     QueueConfig::new("redis://localhost:6379", "reports"),
//!     Arc::new(MemoryStore::new()),
//! );
//!
//! let mut job = queue.create_job(json!({}));
//! job.set_id("nightly").unwrap().set_interval("1d").unwrap();
//!
//! assert_eq!(job.id(), "r:86400000:nightly");
//! assert!(job.options().delay.is_some());
//! ```
//!
//! ## Complete Example
//!
//! ```no_run
//! use comb_queue::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), QueueError> {
//!     let queue = Queue::new("redis://localhost:6379", "default").await?;
//!
//!     let mut job = queue.create_job(serde_json::json!({"subject": "Hello"}));
//!     job.backoff("exponential", 1000)?;
//!
//!     match job.save().await? {
//!         EnqueueOutcome::Created(id) => println!("enqueued {id}"),
//!         EnqueueOutcome::Duplicate => println!("already queued"),
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod backoff;
pub mod cache;
pub mod callback;
pub mod error;
pub mod events;
pub mod job;
pub mod memory;
pub mod queue;
pub mod recurring;
pub mod redis_store;
pub mod store;
pub mod timer;

pub use backoff::{Backoff, BackoffStrategies, BackoffStrategy};
pub use cache::{JobCache, JobSnapshot};
pub use error::{QueueError, QueueResult};
pub use events::{EventPublisher, JobEvent, JobEventKind};
pub use job::{IntoTimestamp, Job, JobData, JobOptions, JobStatus};
pub use memory::MemoryStore;
pub use queue::{Queue, QueueConfig, QueueKeys};
pub use recurring::{IntoInterval, RecurringId};
pub use redis_store::RedisStore;
pub use store::{EnqueueOutcome, JobStore};
pub use timer::DelayedTimer;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::backoff::{Backoff, BackoffStrategies, BackoffStrategy};
    pub use crate::error::{QueueError, QueueResult};
    pub use crate::events::{EventPublisher, JobEvent};
    pub use crate::job::{Job, JobData, JobOptions, JobStatus};
    pub use crate::queue::{Queue, QueueConfig};
    pub use crate::store::{EnqueueOutcome, JobStore};
}
