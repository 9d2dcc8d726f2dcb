//! Storage backends for policies, cooldown markers, history and counters.

pub mod error;
pub mod memory;
pub mod redis;
pub mod sqlite;
pub mod traits;

pub use memory::InMemoryKeyValueStore;
pub use self::redis::{RedisKeyValueStore, RedisStoreConfig};
pub use sqlite::SqlitePolicyStore;
