use std::future::Future;

use dashmap::DashMap;
use futures::future::{self, BoxFuture, Either, FutureExt, Ready};

/// What [`MemoizingCache::get_or_compute`] hands back.
///
/// A hit is an already-resolved [`Ready`] value, so no state machine is
/// allocated or polled beyond the first `poll`. Only a miss boxes a future.
pub type Lookup<'a, E> = Either<Ready<Result<i64, E>>, BoxFuture<'a, Result<i64, E>>>;

/// A concurrent key/value store with a compute-on-miss contract.
///
/// Memoization is best-effort: two callers missing on the same key at the
/// same time may both run their compute and the last write wins. Under
/// sequential access a key is computed exactly once.
#[derive(Debug, Default)]
pub struct MemoizingCache {
    entries: DashMap<String, i64>,
}

impl MemoizingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value without computing anything.
    pub fn seed(&self, key: impl Into<String>, value: i64) {
        self.entries.insert(key.into(), value);
    }

    /// Synchronous lookup.
    pub fn get(&self, key: &str) -> Option<i64> {
        self.entries.get(key).map(|entry| *entry.value())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the cached value for `key`, computing and storing it on a miss.
    ///
    /// `compute` is only called on a miss. If it fails the error is returned
    /// and nothing is stored.
    pub fn get_or_compute<'a, F, Fut, E>(&'a self, key: &str, compute: F) -> Lookup<'a, E>
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = Result<i64, E>> + Send + 'a,
        E: Send + 'a,
    {
        if let Some(value) = self.get(key) {
            log::debug!("cache hit for '{}'", key);
            return Either::Left(future::ready(Ok(value)));
        }

        log::debug!("cache miss for '{}', computing", key);
        Either::Right(self.compute_and_store(key.to_string(), compute))
    }

    /// Recomputes `key` unconditionally and overwrites whatever was there.
    pub fn refresh<'a, F, Fut, E>(&'a self, key: &str, compute: F) -> BoxFuture<'a, Result<i64, E>>
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = Result<i64, E>> + Send + 'a,
        E: Send + 'a,
    {
        self.compute_and_store(key.to_string(), compute)
    }

    fn compute_and_store<'a, F, Fut, E>(&'a self, key: String, compute: F) -> BoxFuture<'a, Result<i64, E>>
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = Result<i64, E>> + Send + 'a,
        E: Send + 'a,
    {
        async move {
            let value = compute().await?;
            // Last write wins if another caller raced us on the same key.
            self.entries.insert(key, value);
            Ok(value)
        }
        .boxed()
    }
}
