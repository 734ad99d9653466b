//! Redis store executor.
//!
//! Enqueue and removal run as Lua scripts, retry as a `MULTI/EXEC`
//! transaction, so each operation is atomic on the server.

use crate::error::{QueueError, QueueResult};
use crate::events::EventPublisher;
use crate::queue::QueueKeys;
use crate::store::{EnqueueOutcome, JobStore};
use async_trait::async_trait;
use redis::{AsyncCommands, Client, Script, aio::ConnectionManager};
use std::fmt;
use tracing::{debug, trace};

const ADD_JOB: &str = include_str!("lua/add_job.lua");
const ADD_DELAYED_JOB: &str = include_str!("lua/add_delayed_job.lua");
const REMOVE_JOB: &str = include_str!("lua/remove_job.lua");

/// Job store backed by a Redis connection manager.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    add_job: Script,
    add_delayed_job: Script,
    remove_job: Script,
}

impl RedisStore {
    /// Connect to Redis.
    pub async fn connect(redis_url: &str) -> QueueResult<Self> {
        let client = Client::open(redis_url).map_err(|e| QueueError::Config(e.to_string()))?;
        let connection = ConnectionManager::new(client).await?;
        debug!(url = %redis_url, "Connected job store");
        Ok(Self::new(connection))
    }

    /// Wrap an existing connection manager.
    pub fn new(connection: ConnectionManager) -> Self {
        Self {
            connection,
            add_job: Script::new(ADD_JOB),
            add_delayed_job: Script::new(ADD_DELAYED_JOB),
            remove_job: Script::new(REMOVE_JOB),
        }
    }
}

#[async_trait]
impl JobStore for RedisStore {
    async fn add_job(
        &self,
        keys: &QueueKeys,
        candidate_id: &str,
        job: &str,
    ) -> QueueResult<EnqueueOutcome> {
        let mut conn = self.connection.clone();
        let reply: Option<String> = self
            .add_job
            .key(&keys.id)
            .key(&keys.jobs)
            .key(&keys.waiting)
            .arg(candidate_id)
            .arg(job)
            .invoke_async(&mut conn)
            .await?;

        trace!(candidate = %candidate_id, reply = ?reply, "addJob");
        Ok(EnqueueOutcome::from_reply(reply))
    }

    async fn add_delayed_job(
        &self,
        keys: &QueueKeys,
        candidate_id: &str,
        job: &str,
        delay: i64,
    ) -> QueueResult<EnqueueOutcome> {
        let mut conn = self.connection.clone();
        let reply: Option<String> = self
            .add_delayed_job
            .key(&keys.id)
            .key(&keys.jobs)
            .key(&keys.delayed)
            .key(&keys.earlier_delayed)
            .arg(candidate_id)
            .arg(job)
            .arg(delay)
            .invoke_async(&mut conn)
            .await?;

        trace!(candidate = %candidate_id, delay, reply = ?reply, "addDelayedJob");
        Ok(EnqueueOutcome::from_reply(reply))
    }

    async fn get_job(&self, keys: &QueueKeys, id: &str) -> QueueResult<Option<String>> {
        let mut conn = self.connection.clone();
        let record: Option<String> = conn.hget(&keys.jobs, id).await?;
        Ok(record)
    }

    async fn remove_job(&self, keys: &QueueKeys, id: &str) -> QueueResult<bool> {
        let mut conn = self.connection.clone();
        let deleted: i64 = self
            .remove_job
            .key(&keys.succeeded)
            .key(&keys.failed)
            .key(&keys.waiting)
            .key(&keys.active)
            .key(&keys.delayed)
            .key(&keys.jobs)
            .arg(id)
            .invoke_async(&mut conn)
            .await?;
        Ok(deleted > 0)
    }

    async fn retry_job(&self, keys: &QueueKeys, id: &str) -> QueueResult<()> {
        let mut conn = self.connection.clone();
        let _: () = redis::pipe()
            .atomic()
            .srem(&keys.failed, id)
            .ignore()
            .lpush(&keys.waiting, id)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn is_member(&self, set_key: &str, id: &str) -> QueueResult<bool> {
        let mut conn = self.connection.clone();
        let member: bool = conn.sismember(set_key, id).await?;
        Ok(member)
    }
}

#[async_trait]
impl EventPublisher for RedisStore {
    async fn publish(&self, channel: &str, message: &str) -> QueueResult<u64> {
        let mut conn = self.connection.clone();
        let receivers: u64 = redis::cmd("PUBLISH")
            .arg(channel)
            .arg(message)
            .query_async(&mut conn)
            .await?;

        debug!(channel = %channel, receivers, "Published job event");
        Ok(receivers)
    }
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}
