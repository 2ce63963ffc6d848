use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// TTL for search results and quote snapshots.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);
/// TTL for intraday bars.
pub const INTRADAY_TTL: Duration = Duration::from_secs(60);

struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

/// In-process JSON cache with per-entry expiry.
#[derive(Clone, Default)]
pub struct TtlCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl TtlCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stock_key(symbol: &str, kind: &str) -> String {
        format!("stock:{symbol}:{kind}")
    }

    pub fn search_key(query: &str) -> String {
        format!("search:{}", query.to_lowercase())
    }

    /// Historical bars at daily or coarser resolution stay fresh longer.
    pub fn historical_ttl(interval: &str) -> Duration {
        match interval {
            "1d" | "5d" | "1wk" | "1mo" | "3mo" => DEFAULT_TTL,
            _ => INTRADAY_TTL,
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = {
            let entries = self.entries.read().await;
            let entry = entries.get(key)?;
            if entry.expires_at <= Instant::now() {
                None
            } else {
                Some(entry.value.clone())
            }
        };
        let Some(value) = value else {
            self.entries.write().await.remove(key);
            return None;
        };
        match serde_json::from_value(value) {
            Ok(v) => {
                debug!(key, "cache hit");
                Some(v)
            }
            Err(e) => {
                warn!(key, error = %e, "dropping undecodable cache entry");
                self.entries.write().await.remove(key);
                None
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: impl Into<String>, value: &T, ttl: Duration) -> bool {
        let value = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "value not cacheable");
                return false;
            }
        };
        self.entries.write().await.insert(
            key.into(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        true
    }

    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Evict expired entries every `period` until the cache is dropped.
    ///
    /// Reads only evict the key they touch, so without the sweep every
    /// distinct search term stays resident.
    pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let entries = Arc::downgrade(&self.entries);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tick.tick().await;
            loop {
                tick.tick().await;
                let Some(entries) = entries.upgrade() else {
                    debug!("cache dropped; sweeper exiting");
                    return;
                };
                let purged = TtlCache { entries }.purge_expired().await;
                if purged > 0 {
                    debug!(purged, "expired cache entries swept");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = TtlCache::new();
        cache.set("k", &vec![1, 2, 3], Duration::from_secs(60)).await;
        assert_eq!(cache.get::<Vec<i32>>("k").await, Some(vec![1, 2, 3]));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.get::<Vec<i32>>("k").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_evicts_keys_nobody_reads_again() {
        let cache = TtlCache::new();
        let sweeper = cache.spawn_sweeper(Duration::from_secs(30));
        for q in ["tata", "infy", "reliance"] {
            cache.set(TtlCache::search_key(q), &q, INTRADAY_TTL).await;
        }
        cache.set(TtlCache::stock_key("TCS.NS", "info"), &1, DEFAULT_TTL).await;
        assert_eq!(cache.len().await, 4);

        tokio::time::sleep(Duration::from_secs(91)).await;
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get::<i32>(&TtlCache::stock_key("TCS.NS", "info")).await, Some(1));

        drop(cache);
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(sweeper.is_finished());
    }

    #[test]
    fn historical_ttl_depends_on_interval() {
        assert_eq!(TtlCache::historical_ttl("1d"), DEFAULT_TTL);
        assert_eq!(TtlCache::historical_ttl("5m"), INTRADAY_TTL);
    }
}
