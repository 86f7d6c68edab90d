use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Small LRU cache whose entries expire after a fixed time-to-live.
/// Used for third-party API responses that change rarely.
#[derive(Clone)]
pub struct ResponseCache<V: Clone> {
    cache: Arc<Mutex<LruCache<String, (Instant, V)>>>,
    ttl: Duration,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Arc::new(Mutex::new(LruCache::new(cap))),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, (Instant, V)>> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.lock().put(key.into(), (Instant::now(), value));
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let mut cache = self.lock();
        match cache.get(key) {
            Some((stored_at, value)) if stored_at.elapsed() < self.ttl => Some(value.clone()),
            Some(_) => {
                cache.pop(key);
                None
            }
            None => None,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
