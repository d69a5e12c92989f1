//! 데이터 서비스.
//!
//! 요청 한 건의 처리 순서:
//! 정규화 → 요청 한도 → 캐시 → 병합 → 재시도 → 스크래퍼 실행 → 캐시 반영.
//!
//! HTTP 경계와 CLI는 이 서비스의 [`DataService::fetch`]만 호출합니다.

use quote_core::{
    AppConfig, CacheConfig, FetchError, FetchRequest, FetchResult, MetricsSnapshot,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, Instrument};

use crate::cache::{CacheStats, TtlCache};
use crate::coalescer::{Coalescer, JoinRole};
use crate::limiter::{RateLimitResult, RateLimiter};
use crate::metrics::MetricsAggregator;
use crate::process::{JobRunner, ProcessSupervisor};
use crate::retry::{with_retry_notify, RetryPolicy};

/// 시세 데이터 서비스.
pub struct DataService {
    cache_config: CacheConfig,
    retry: RetryPolicy,
    cache: Arc<TtlCache>,
    limiter: Arc<RateLimiter>,
    coalescer: Coalescer<Value>,
    metrics: Arc<MetricsAggregator>,
    runner: Arc<dyn JobRunner>,
}

impl DataService {
    /// 실제 스크래퍼 프로세스를 사용하는 서비스를 생성합니다.
    pub fn new(config: &AppConfig) -> Self {
        let supervisor = ProcessSupervisor::new(config.scraper.clone());
        Self::with_runner(config, Arc::new(supervisor))
    }

    /// 작업 실행기를 지정해 서비스를 생성합니다.
    pub fn with_runner(config: &AppConfig, runner: Arc<dyn JobRunner>) -> Self {
        Self {
            cache_config: config.cache.clone(),
            retry: RetryPolicy::from(&config.retry),
            cache: Arc::new(TtlCache::new()),
            limiter: Arc::new(RateLimiter::new(config.rate_limit.clone())),
            coalescer: Coalescer::new(),
            metrics: Arc::new(MetricsAggregator::new()),
            runner,
        }
    }

    /// 요청을 처리합니다.
    ///
    /// `client`는 클라이언트별 요청 한도가 켜져 있을 때만 사용됩니다.
    #[instrument(skip(self, request), fields(endpoint = %request.endpoint))]
    pub async fn fetch(&self, request: &FetchRequest, client: &str) -> FetchResult<Value> {
        self.metrics.record_request(request.endpoint);

        let result = self.fetch_inner(request, client).await;
        if let Err(e) = &result {
            self.metrics.record_error(request.endpoint, e.kind());
            debug!(kind = %e.kind(), error = %e, "Fetch failed");
        }
        result
    }

    async fn fetch_inner(&self, request: &FetchRequest, client: &str) -> FetchResult<Value> {
        let normalized = request.normalize(self.cache_config.max_symbols)?;
        let endpoint = normalized.endpoint;
        let tier = normalized.route_tier();

        // 한도 초과 요청은 캐시와 병합 경로에 들어가지 않음
        if let RateLimitResult::Limited { retry_after_secs } = self.limiter.admit(tier, client) {
            self.metrics.record_rate_limited(tier);
            return Err(FetchError::RateLimited {
                tier,
                retry_after_secs,
            });
        }

        let key = normalized.key;
        if let Some(value) = self.cache.get(&key) {
            self.metrics.record_cache_hit(endpoint);
            debug!(cache_key = %key, "Cache hit");
            return Ok(value);
        }

        let producer = {
            let runner = Arc::clone(&self.runner);
            let metrics = Arc::clone(&self.metrics);
            let policy = self.retry.clone();
            let symbols = normalized.symbols;
            let span = quote_core::fetch_span!("scrape", endpoint, key);

            move || {
                async move {
                    with_retry_notify(
                        &policy,
                        |_| {
                            metrics.record_process(endpoint);
                            let runner = Arc::clone(&runner);
                            let symbols = symbols.clone();
                            async move { runner.run(endpoint, &symbols).await }
                        },
                        |_, _, _| metrics.record_retry(endpoint),
                    )
                    .await
                }
                .instrument(span)
            }
        };

        let commit = {
            let cache = Arc::clone(&self.cache);
            let key = key.clone();
            let ttl = self.cache_config.ttl_for(endpoint);
            move |value: &Value| {
                cache.set(key, value.clone(), ttl);
            }
        };

        let fetch = self
            .coalescer
            .fetch_or_join_with(key.clone(), || self.cache.peek(&key), producer, commit)
            .await;

        match fetch.role {
            JoinRole::Cached => self.metrics.record_cache_hit(endpoint),
            JoinRole::Leader => {
                self.metrics.record_cache_miss(endpoint);
                if fetch.result.is_ok() {
                    info!(cache_key = %key, "Fetched and cached");
                }
            }
            JoinRole::Follower => self.metrics.record_coalesced(endpoint),
        }

        fetch.result
    }

    /// 메트릭 스냅샷.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// 진행 중인 페치 수.
    pub fn pending_fetches(&self) -> usize {
        self.coalescer.pending_count()
    }

    /// 캐시 정리와 유휴 요청 한도 윈도우 정리를 백그라운드에서 실행합니다.
    pub fn spawn_maintenance(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let interval = self.cache_config.sweep_interval();
        let sweeper = Arc::clone(&self.cache).spawn_sweeper(interval, cancel.clone());
        let limiter = Arc::clone(&self.limiter);

        tokio::spawn(async move {
            purge_idle_windows(limiter, interval, cancel).await;
            let _ = sweeper.await;
        })
    }
}

async fn purge_idle_windows(
    limiter: Arc<RateLimiter>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let purged = limiter.purge_idle();
                if purged > 0 {
                    debug!(purged, "Idle rate limit windows purged");
                }
            }
        }
    }
}
