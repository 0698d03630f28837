//! Cache abstractions shared by the rate resolver and the report pipeline.

use async_trait::async_trait;
use std::time::Duration;

/// A keyed, time-boxed cache.
///
/// Entries put with a `ttl` stop being returned once it elapses. `remove`
/// invalidates a single key, `clear` every key.
#[async_trait]
pub trait Cache<K, V>: Send + Sync
where
    K: Send + Sync,
    V: Send + Sync,
{
    async fn get(&self, key: &K) -> Option<V>;

    async fn put(&self, key: K, value: V, ttl: Option<Duration>);

    async fn remove(&self, key: &K);

    async fn clear(&self);
}
