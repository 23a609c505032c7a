use std::time::Duration;

use dnsrelay_proto::packet::record::Record;
use lru_cache::LruCache;
use tokio::sync::Mutex;

use crate::name::QKey;

/// Bounded answer cache with a literal per-second TTL sweep, rather than an
/// expiry-instant comparison: every record's `ttl` field is decremented by
/// one each tick, and a record (or its whole entry, once empty) is evicted
/// the moment its ttl reaches zero. This mirrors how the cache this project
/// started from expired entries.
pub struct AnswerCache {
    inner: Mutex<LruCache<QKey, Vec<Record>>>,
}

impl AnswerCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub async fn get(&self, key: &QKey) -> Option<Vec<Record>> {
        self.inner.lock().await.get_mut(key).cloned()
    }

    pub async fn insert(&self, key: QKey, records: Vec<Record>) {
        if records.is_empty() {
            return;
        }
        self.inner.lock().await.insert(key, records);
    }

    /// Decrements every cached record's ttl by one second, dropping records
    /// (and empty entries) whose ttl has run out.
    pub async fn tick(&self) {
        let mut inner = self.inner.lock().await;
        let keys: Vec<QKey> = inner.iter().map(|(key, _)| key.clone()).collect();
        for key in keys {
            let Some(records) = inner.get_mut(&key) else {
                continue;
            };
            records.retain_mut(|record| {
                let ttl = record.ttl_mut();
                if *ttl == 0 {
                    false
                } else {
                    *ttl -= 1;
                    true
                }
            });
            if records.is_empty() {
                inner.remove(&key);
            }
        }
    }

    pub async fn run_ticker(&self) {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            interval.tick().await;
            self.tick().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dnsrelay_proto::packet::question::DnsClass;
    use dnsrelay_proto::packet::QueryType;
    use std::net::Ipv4Addr;

    use crate::name::Name;

    fn key(name: &str) -> QKey {
        QKey::new(Name::canonicalize(name), QueryType::A, DnsClass::Internet)
    }

    fn record(domain: &str, ttl: u32) -> Record {
        Record::A {
            domain: domain.into(),
            addr: Ipv4Addr::new(1, 2, 3, 4),
            ttl,
        }
    }

    #[tokio::test]
    async fn should_return_what_was_inserted() {
        let cache = AnswerCache::new(10);
        cache
            .insert(key("perdu.com."), vec![record("perdu.com.", 60)])
            .await;
        let found = cache.get(&key("perdu.com.")).await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn should_expire_after_ttl_ticks() {
        let cache = AnswerCache::new(10);
        cache
            .insert(key("perdu.com."), vec![record("perdu.com.", 3)])
            .await;

        cache.tick().await;
        cache.tick().await;
        assert!(cache.get(&key("perdu.com.")).await.is_some());

        cache.tick().await;
        assert!(cache.get(&key("perdu.com.")).await.is_none());
    }

    #[tokio::test]
    async fn should_evict_least_recently_used_when_over_capacity() {
        let cache = AnswerCache::new(2);
        cache
            .insert(key("a.com."), vec![record("a.com.", 60)])
            .await;
        cache
            .insert(key("b.com."), vec![record("b.com.", 60)])
            .await;
        // touch "a" so "b" becomes the least recently used entry
        let _ = cache.get(&key("a.com.")).await;
        cache
            .insert(key("c.com."), vec![record("c.com.", 60)])
            .await;

        assert!(cache.get(&key("b.com.")).await.is_none());
        assert!(cache.get(&key("a.com.")).await.is_some());
        assert!(cache.get(&key("c.com.")).await.is_some());
    }
}
