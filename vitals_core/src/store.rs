use crate::error::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

pub fn raw_key(metric: &str) -> String {
    format!("vitals:raw:{}", metric)
}

pub fn rollup_key(metric: &str, window: &str, kind: &str) -> String {
    format!("vitals:agg:{}:{}:{}", metric, window, kind)
}

/// Durable sorted-set style store the engine mirrors into. Scores are
/// millisecond timestamps.
#[async_trait]
pub trait MetricStore: Send + Sync {
    async fn append(&self, key: &str, timestamp: i64, row: serde_json::Value) -> Result<()>;

    /// Rows with `from <= score <= to`, in score order.
    async fn range_query(&self, key: &str, from: i64, to: i64) -> Result<Vec<serde_json::Value>>;

    async fn expire(&self, key: &str, ttl_seconds: i64) -> Result<()>;

    /// Deletes rows with `from <= score <= to` and returns how many went.
    async fn delete_range(&self, key: &str, from: i64, to: i64) -> Result<usize>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Human-readable target description for logs.
    fn describe(&self) -> String {
        "external store".to_string()
    }
}

pub type DynStore = Arc<dyn MetricStore>;

#[derive(Debug, Default)]
struct StoredKey {
    rows: BTreeMap<(i64, u64), serde_json::Value>,
    expires_at: Option<Instant>,
}

impl StoredKey {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// Process-local store used for the `memory://` target and in tests.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    keys: RwLock<HashMap<String, StoredKey>>,
    sequence: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .keys
            .read()
            .await
            .iter()
            .filter(|(_, stored)| !stored.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    pub async fn row_count(&self, key: &str) -> usize {
        let now = Instant::now();
        self.keys
            .read()
            .await
            .get(key)
            .filter(|stored| !stored.is_expired(now))
            .map(|stored| stored.rows.len())
            .unwrap_or(0)
    }

    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.keys
            .read()
            .await
            .get(key)
            .and_then(|stored| stored.expires_at)
            .map(|deadline| deadline.saturating_duration_since(now))
    }
}

#[async_trait]
impl MetricStore for InMemoryStore {
    async fn append(&self, key: &str, timestamp: i64, row: serde_json::Value) -> Result<()> {
        let now = Instant::now();
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let mut keys = self.keys.write().await;
        let stored = keys.entry(key.to_string()).or_default();
        if stored.is_expired(now) {
            *stored = StoredKey::default();
        }
        stored.rows.insert((timestamp, seq), row);
        Ok(())
    }

    async fn range_query(&self, key: &str, from: i64, to: i64) -> Result<Vec<serde_json::Value>> {
        if from > to {
            return Ok(Vec::new());
        }
        let now = Instant::now();
        let keys = self.keys.read().await;
        let rows = match keys.get(key) {
            Some(stored) if !stored.is_expired(now) => stored
                .rows
                .range((from, 0)..=(to, u64::MAX))
                .map(|(_, row)| row.clone())
                .collect(),
            _ => Vec::new(),
        };
        Ok(rows)
    }

    async fn expire(&self, key: &str, ttl_seconds: i64) -> Result<()> {
        let ttl = Duration::from_secs(ttl_seconds.max(0) as u64);
        if let Some(stored) = self.keys.write().await.get_mut(key) {
            stored.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn delete_range(&self, key: &str, from: i64, to: i64) -> Result<usize> {
        if from > to {
            return Ok(0);
        }
        let mut keys = self.keys.write().await;
        let Some(stored) = keys.get_mut(key) else {
            return Ok(0);
        };

        let doomed: Vec<(i64, u64)> = stored
            .rows
            .range((from, 0)..=(to, u64::MAX))
            .map(|(score, _)| *score)
            .collect();
        for score in &doomed {
            stored.rows.remove(score);
        }
        if stored.rows.is_empty() {
            keys.remove(key);
        }
        Ok(doomed.len())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.keys.write().await.remove(key);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory://".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_append_and_range_query() {
        let store = InMemoryStore::new();
        store.append("k", 30, json!({"v": 3})).await.unwrap();
        store.append("k", 10, json!({"v": 1})).await.unwrap();
        store.append("k", 20, json!({"v": 2})).await.unwrap();
        store.append("k", 20, json!({"v": 22})).await.unwrap();

        let rows = store.range_query("k", 10, 20).await.unwrap();
        let values: Vec<i64> = rows.iter().map(|r| r["v"].as_i64().unwrap()).collect();
        assert_eq!(values, vec![1, 2, 22]);
        assert!(store.range_query("missing", 0, 100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_range_counts_rows() {
        let store = InMemoryStore::new();
        for ts in 0..10 {
            store.append("k", ts, json!(ts)).await.unwrap();
        }

        assert_eq!(store.delete_range("k", 0, 4).await.unwrap(), 5);
        assert_eq!(store.row_count("k").await, 5);
        assert_eq!(store.delete_range("k", 0, 100).await.unwrap(), 5);
        assert!(store.keys().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_hides_key() {
        let store = InMemoryStore::new();
        store.append("k", 1, json!(1)).await.unwrap();
        store.expire("k", 60).await.unwrap();

        assert_eq!(store.row_count("k").await, 1);
        assert!(store.ttl("k").await.is_some());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(store.row_count("k").await, 0);
        assert!(store.range_query("k", 0, 10).await.unwrap().is_empty());

        store.append("k", 2, json!(2)).await.unwrap();
        assert_eq!(store.row_count("k").await, 1);
    }

    #[test]
    fn test_key_layout() {
        assert_eq!(raw_key("queue_depth"), "vitals:raw:queue_depth");
        assert_eq!(rollup_key("queue_depth", "5m", "p95"), "vitals:agg:queue_depth:5m:p95");
    }
}
