//! 프로세스 전역 메트릭 집계.
//!
//! 원자적 카운터로 요청/에러/프로세스 수 등을 누적하고, 같은 값을
//! `metrics` 파사드로도 내보내 Prometheus 익스포터가 렌더링할 수 있게 합니다.
//! 카운터는 초기화되지 않습니다.

use chrono::{DateTime, Utc};
use metrics::counter;
use quote_core::{success_rate, ErrorKind, EndpointClass, MetricsSnapshot, RouteTier};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::time::Instant;

/// 메트릭 집계기.
#[derive(Debug)]
pub struct MetricsAggregator {
    started: Instant,
    started_at: DateTime<Utc>,
    requests: AtomicU64,
    errors: AtomicU64,
    processes: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    coalesced: AtomicU64,
    retries: AtomicU64,
    timeouts: AtomicU64,
    rate_limited: AtomicU64,
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            started_at: Utc::now(),
            requests: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            processes: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            rate_limited: AtomicU64::new(0),
        }
    }

    pub fn record_request(&self, endpoint: EndpointClass) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        counter!("quote_requests_total", "endpoint" => endpoint.as_str()).increment(1);
    }

    /// 에러 카운트. 타임아웃과 요청 한도 초과는 별도 카운터도 증가시킵니다.
    pub fn record_error(&self, endpoint: EndpointClass, kind: ErrorKind) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        counter!(
            "quote_errors_total",
            "endpoint" => endpoint.as_str(),
            "kind" => kind.as_str()
        )
        .increment(1);

        if kind == ErrorKind::Timeout {
            self.timeouts.fetch_add(1, Ordering::Relaxed);
            counter!("quote_timeouts_total").increment(1);
        }
    }

    pub fn record_rate_limited(&self, tier: RouteTier) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
        counter!("quote_rate_limited_total", "tier" => tier.as_str()).increment(1);
    }

    /// 스크래퍼 프로세스 실행 (재시도 포함 시도마다 1).
    pub fn record_process(&self, endpoint: EndpointClass) {
        self.processes.fetch_add(1, Ordering::Relaxed);
        counter!("quote_processes_total", "endpoint" => endpoint.as_str()).increment(1);
    }

    pub fn record_cache_hit(&self, endpoint: EndpointClass) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
        counter!("quote_cache_hits_total", "endpoint" => endpoint.as_str()).increment(1);
    }

    pub fn record_cache_miss(&self, endpoint: EndpointClass) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
        counter!("quote_cache_misses_total", "endpoint" => endpoint.as_str()).increment(1);
    }

    pub fn record_coalesced(&self, endpoint: EndpointClass) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
        counter!("quote_coalesced_total", "endpoint" => endpoint.as_str()).increment(1);
    }

    pub fn record_retry(&self, endpoint: EndpointClass) {
        self.retries.fetch_add(1, Ordering::Relaxed);
        counter!("quote_retries_total", "endpoint" => endpoint.as_str()).increment(1);
    }

    /// 읽기 전용 스냅샷.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let request_count = self.requests.load(Ordering::Relaxed);
        let error_count = self.errors.load(Ordering::Relaxed);

        MetricsSnapshot {
            uptime_secs: self.started.elapsed().as_secs(),
            request_count,
            error_count,
            success_rate: success_rate(request_count, error_count),
            process_count: self.processes.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            coalesced_count: self.coalesced.load(Ordering::Relaxed),
            retry_count: self.retries.load(Ordering::Relaxed),
            timeout_count: self.timeouts.load(Ordering::Relaxed),
            rate_limited_count: self.rate_limited.load(Ordering::Relaxed),
            started_at: self.started_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_empty_snapshot() {
        let metrics = MetricsAggregator::new();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.request_count, 0);
        assert_eq!(snapshot.success_rate, 0.0);
    }

    #[test]
    fn test_success_rate_and_kinds() {
        let metrics = MetricsAggregator::new();
        for _ in 0..4 {
            metrics.record_request(EndpointClass::Quote);
        }
        metrics.record_error(EndpointClass::Quote, ErrorKind::Timeout);
        metrics.record_rate_limited(RouteTier::Strict);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.request_count, 4);
        assert_eq!(snapshot.error_count, 1);
        assert_eq!(snapshot.timeout_count, 1);
        assert_eq!(snapshot.rate_limited_count, 1);
        assert_eq!(snapshot.success_rate, 0.75);
    }

    #[tokio::test(start_paused = true)]
    async fn test_uptime() {
        let metrics = MetricsAggregator::new();
        tokio::time::advance(Duration::from_secs(90)).await;
        assert_eq!(metrics.snapshot().uptime_secs, 90);
    }
}
