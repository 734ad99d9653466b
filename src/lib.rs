// comb - a Redis-backed distributed job queue for Rust
//
// This library re-exports the job entity, its scheduling options and the
// atomic enqueue contract shared by producers and workers.

// Re-export core functionality
pub use comb_queue::*;

// Re-export the queue crate itself
pub use comb_queue;

// Re-export async-trait for custom store executors
pub use async_trait::async_trait;

// Prelude for common imports
pub mod prelude {
    pub use comb_queue::prelude::*;
    pub use comb_queue::{MemoryStore, RedisStore};

    pub use async_trait::async_trait;
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::json;
}
