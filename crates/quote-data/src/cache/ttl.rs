//! 엔드포인트별 TTL을 가진 인메모리 캐시.
//!
//! 항목은 읽을 때 만료를 확인하고(lazy), 백그라운드 정리 작업이 주기적으로
//! 만료된 항목을 제거합니다. 용량 제한은 없습니다.
//!
//! 시간은 `tokio::time::Instant`로 측정하므로 테스트에서 시간을 멈추거나
//! 앞당길 수 있습니다.

use dashmap::DashMap;
use quote_core::CacheKey;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// 캐시 항목. 갱신 시 통째로 교체되며 제자리 수정되지 않습니다.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    /// `now - stored_at > ttl` 이면 만료.
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) > self.ttl
    }
}

/// 캐시 통계.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

/// TTL 캐시.
///
/// 서로 다른 키의 읽기/쓰기는 샤드 단위 잠금으로 서로 막지 않습니다.
#[derive(Debug, Default)]
pub struct TtlCache {
    entries: DashMap<CacheKey, CacheEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
}

enum Lookup {
    Fresh(Value),
    Expired,
    Missing,
}

impl TtlCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 유효한 값을 반환합니다. 만료된 항목은 이 시점에 제거됩니다.
    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        let now = Instant::now();
        // 샤드 읽기 잠금은 이 블록 안에서 해제
        let lookup = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => Lookup::Fresh(entry.value.clone()),
            Some(_) => Lookup::Expired,
            None => Lookup::Missing,
        };

        match lookup {
            Lookup::Fresh(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Lookup::Expired => {
                // 그 사이 새 값이 쓰였을 수 있으므로 여전히 만료된 경우에만 제거
                self.entries.remove_if(key, |_, entry| entry.is_expired(now));
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(cache_key = %key, "Cache entry expired");
                None
            }
            Lookup::Missing => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// 통계와 만료 정리 없이 유효한 값만 확인합니다.
    pub fn peek(&self, key: &CacheKey) -> Option<Value> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone())
    }

    /// 값을 저장합니다. 기존 항목은 교체됩니다.
    pub fn set(&self, key: CacheKey, value: Value, ttl: Duration) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    pub fn remove(&self, key: &CacheKey) -> Option<Value> {
        self.entries.remove(key).map(|(_, entry)| entry.value)
    }

    /// 저장된 항목 수 (아직 정리되지 않은 만료 항목 포함).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 만료된 항목을 모두 제거하고 제거한 개수를 반환합니다.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };

        CacheStats {
            entries: self.entries.len(),
            hits,
            misses,
            hit_rate,
        }
    }

    /// 주기적으로 만료 항목을 정리하는 백그라운드 작업을 시작합니다.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // 첫 tick은 즉시 반환
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("Cache sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let removed = self.purge_expired();
                        if removed > 0 {
                            debug!(removed, remaining = self.len(), "Expired cache entries purged");
                        }
                    }
                }
            }
        })
    }
}
