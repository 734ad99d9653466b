//! Queue handle: configuration, key layout and shared collaborators.

use crate::backoff::{BackoffStrategies, BackoffStrategy};
use crate::cache::{DEFAULT_CAPACITY, JobCache};
use crate::error::{QueueError, QueueResult};
use crate::events::EventPublisher;
use crate::job::{Job, JobData, JobOptions};
use crate::redis_store::RedisStore;
use crate::store::JobStore;
use crate::timer::DelayedTimer;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis connection URL
    pub redis_url: String,

    /// Queue name
    pub queue_name: String,

    /// Key prefix for Redis keys
    pub key_prefix: String,

    /// Workers delete jobs that succeed
    pub remove_on_success: bool,

    /// Workers delete jobs that fail
    pub remove_on_failure: bool,

    /// Keep saved jobs in the queue's job cache
    pub store_jobs: bool,

    /// Run a local delayed-job timer
    pub activate_delayed_jobs: bool,

    /// Maximum number of jobs kept in the job cache
    pub job_cache_capacity: usize,

    /// Known backoff strategies
    pub backoff_strategies: BackoffStrategies,
}

impl QueueConfig {
    /// Create a new queue configuration.
    pub fn new(redis_url: impl Into<String>, queue_name: impl Into<String>) -> Self {
        Self {
            redis_url: redis_url.into(),
            queue_name: queue_name.into(),
            key_prefix: "comb".to_string(),
            remove_on_success: false,
            remove_on_failure: false,
            store_jobs: true,
            activate_delayed_jobs: false,
            job_cache_capacity: DEFAULT_CAPACITY,
            backoff_strategies: BackoffStrategies::default(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Reads `COMB_REDIS_URL` (falling back to `REDIS_URL`), `COMB_KEY_PREFIX`,
    /// `COMB_REMOVE_ON_SUCCESS`, `COMB_REMOVE_ON_FAILURE`, `COMB_STORE_JOBS`,
    /// `COMB_ACTIVATE_DELAYED_JOBS` and `COMB_JOB_CACHE_CAPACITY`.
    pub fn from_env(queue_name: impl Into<String>) -> QueueResult<Self> {
        let redis_url = std::env::var("COMB_REDIS_URL")
            .or_else(|_| std::env::var("REDIS_URL"))
            .unwrap_or_else(|_| "redis://localhost:6379".to_string());

        let mut config = Self::new(redis_url, queue_name);

        if let Ok(prefix) = std::env::var("COMB_KEY_PREFIX") {
            config = config.with_key_prefix(prefix);
        }
        if let Some(flag) = env_flag("COMB_REMOVE_ON_SUCCESS")? {
            config.remove_on_success = flag;
        }
        if let Some(flag) = env_flag("COMB_REMOVE_ON_FAILURE")? {
            config.remove_on_failure = flag;
        }
        if let Some(flag) = env_flag("COMB_STORE_JOBS")? {
            config.store_jobs = flag;
        }
        if let Some(flag) = env_flag("COMB_ACTIVATE_DELAYED_JOBS")? {
            config.activate_delayed_jobs = flag;
        }
        if let Ok(capacity) = std::env::var("COMB_JOB_CACHE_CAPACITY") {
            config.job_cache_capacity = capacity.parse().map_err(|_| {
                QueueError::Config(format!("COMB_JOB_CACHE_CAPACITY is not a number: {capacity}"))
            })?;
        }

        Ok(config)
    }

    /// Set the key prefix.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Remove jobs from the store once they succeed.
    pub fn with_remove_on_success(mut self, remove: bool) -> Self {
        self.remove_on_success = remove;
        self
    }

    /// Remove jobs from the store once they fail.
    pub fn with_remove_on_failure(mut self, remove: bool) -> Self {
        self.remove_on_failure = remove;
        self
    }

    /// Keep saved jobs in the queue's job cache.
    pub fn with_store_jobs(mut self, store: bool) -> Self {
        self.store_jobs = store;
        self
    }

    /// Run a local delayed-job timer.
    pub fn with_activate_delayed_jobs(mut self, activate: bool) -> Self {
        self.activate_delayed_jobs = activate;
        self
    }

    /// Bound the job cache.
    pub fn with_job_cache_capacity(mut self, capacity: usize) -> Self {
        self.job_cache_capacity = capacity;
        self
    }

    /// Register an additional backoff strategy.
    pub fn with_backoff_strategy(
        mut self,
        name: impl Into<String>,
        strategy: impl BackoffStrategy + 'static,
    ) -> Self {
        self.backoff_strategies.register(name, strategy);
        self
    }

    /// Whether workers delete finished jobs.
    pub fn auto_removes(&self) -> bool {
        self.remove_on_success || self.remove_on_failure
    }

    /// Build Redis key.
    pub fn key(&self, suffix: &str) -> String {
        format!("{}:{}:{}", self.key_prefix, self.queue_name, suffix)
    }
}

fn env_flag(name: &str) -> QueueResult<Option<bool>> {
    match std::env::var(name) {
        Ok(value) => match value.to_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(Some(true)),
            "0" | "false" | "no" => Ok(Some(false)),
            _ => Err(QueueError::Config(format!("{name} is not a boolean: {value}"))),
        },
        Err(_) => Ok(None),
    }
}

/// Resolved Redis keys for one queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueKeys {
    /// Job id sequence counter
    pub id: String,
    /// Hash of id → encoded job
    pub jobs: String,
    /// List of ids ready to run
    pub waiting: String,
    /// List of ids being processed
    pub active: String,
    /// Sorted set of delayed ids scored by due instant
    pub delayed: String,
    /// Channel announcing a new earliest delayed job
    pub earlier_delayed: String,
    /// Set of succeeded ids
    pub succeeded: String,
    /// Set of failed ids
    pub failed: String,
    /// Job event channel
    pub events: String,
}

impl QueueKeys {
    /// Resolve every key for a configuration.
    pub fn new(config: &QueueConfig) -> Self {
        Self {
            id: config.key("id"),
            jobs: config.key("jobs"),
            waiting: config.key("waiting"),
            active: config.key("active"),
            delayed: config.key("delayed"),
            earlier_delayed: config.key("earlierDelayed"),
            succeeded: config.key("succeeded"),
            failed: config.key("failed"),
            events: config.key("events"),
        }
    }
}

/// Job queue backed by a shared store.
#[derive(Clone)]
pub struct Queue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    config: QueueConfig,
    keys: QueueKeys,
    store: Arc<dyn JobStore>,
    events: Arc<dyn EventPublisher>,
    jobs: Option<JobCache>,
    timer: Option<Arc<DelayedTimer>>,
}

impl Queue {
    /// Create a new queue.
    pub async fn new(
        redis_url: impl Into<String>,
        queue_name: impl Into<String>,
    ) -> QueueResult<Self> {
        let config = QueueConfig::new(redis_url, queue_name);
        Self::with_config(config).await
    }

    /// Create a Redis-backed queue with custom configuration.
    pub async fn with_config(config: QueueConfig) -> QueueResult<Self> {
        info!(queue = %config.queue_name, "Initializing job queue");
        let store = Arc::new(RedisStore::connect(&config.redis_url).await?);
        let queue = Self::with_store(config, store);
        info!(queue = %queue.name(), "Job queue ready");
        Ok(queue)
    }

    /// Create a queue over any store executor that also publishes events.
    pub fn with_store<S>(config: QueueConfig, store: Arc<S>) -> Self
    where
        S: JobStore + EventPublisher + 'static,
    {
        let events: Arc<dyn EventPublisher> = store.clone();
        Self::with_parts(config, store, events)
    }

    /// Create a queue from separate store and event collaborators.
    pub fn with_parts(
        config: QueueConfig,
        store: Arc<dyn JobStore>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        debug!(
            queue = %config.queue_name,
            prefix = %config.key_prefix,
            store_jobs = config.store_jobs,
            "Queue config"
        );
        let keys = QueueKeys::new(&config);
        let jobs = config
            .store_jobs
            .then(|| JobCache::new(config.job_cache_capacity));
        let timer = config
            .activate_delayed_jobs
            .then(|| Arc::new(DelayedTimer::new()));

        Self {
            inner: Arc::new(QueueInner {
                config,
                keys,
                store,
                events,
                jobs,
                timer,
            }),
        }
    }

    /// Queue name.
    pub fn name(&self) -> &str {
        &self.inner.config.queue_name
    }

    /// Queue configuration.
    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    /// Resolved Redis keys.
    pub fn keys(&self) -> &QueueKeys {
        &self.inner.keys
    }

    /// Store executor.
    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.inner.store
    }

    /// Event transport.
    pub fn events(&self) -> &Arc<dyn EventPublisher> {
        &self.inner.events
    }

    /// Registered backoff strategies.
    pub fn backoff_strategies(&self) -> &BackoffStrategies {
        &self.inner.config.backoff_strategies
    }

    /// Local delayed-job timer, when activated.
    pub fn delayed_timer(&self) -> Option<&Arc<DelayedTimer>> {
        self.inner.timer.as_ref()
    }

    /// Cache of saved jobs, when the queue stores jobs.
    pub fn job_cache(&self) -> Option<&JobCache> {
        self.inner.jobs.as_ref()
    }

    /// Create an unsaved job with default options.
    pub fn create_job(&self, data: JobData) -> Job {
        Job::new(self, "", data, JobOptions::default())
    }

    /// Fetch a job by id. `Ok(None)` if no record exists.
    pub async fn get_job(&self, id: &str) -> QueueResult<Option<Job>> {
        Job::from_id(self, id).await
    }

    /// Remove a job from every queue structure. Returns whether a record
    /// was deleted.
    pub async fn remove_job(&self, id: &str) -> QueueResult<bool> {
        debug!(queue = %self.name(), job_id = %id, "Removing job");
        let removed = self.inner.store.remove_job(&self.inner.keys, id).await?;
        if let Some(jobs) = &self.inner.jobs {
            jobs.remove(id);
        }
        Ok(removed)
    }

    /// Job as of its last save through this queue, when cached.
    pub fn cached_job(&self, id: &str) -> Option<Job> {
        let snapshot = self.inner.jobs.as_ref()?.get(id)?;
        Some(Job::from_snapshot(self, snapshot))
    }

    pub(crate) fn register(&self, job: &Job) {
        if let Some(jobs) = &self.inner.jobs
            && let Some(evicted) = jobs.insert(job.snapshot())
        {
            debug!(queue = %self.name(), job_id = %evicted.id, "Evicted job from cache");
        }
    }

    pub(crate) fn notify_delayed(&self, delay: i64) {
        if let Some(timer) = &self.inner.timer {
            timer.schedule(delay);
        }
    }
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("config", &self.inner.config)
            .field("jobs", &self.inner.jobs)
            .field("timer", &self.inner.timer)
            .finish_non_exhaustive()
    }
}
