//! 동시 요청 부하 점검.
//!
//! 같은 요청을 N개 동시에 보내 병합, 캐시, 요청 한도 동작을 확인합니다.

use futures::future::join_all;
use quote_core::{FetchRequest, MetricsSnapshot};
use quote_data::{CacheStats, DataService};
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::time::Instant;
use tracing::info;

use super::fetch::CLI_CLIENT;

/// 부하 점검 결과.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BurstReport {
    pub requested: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// 에러 종류별 건수
    pub errors: BTreeMap<String, usize>,
    pub elapsed_ms: u128,
    pub metrics: MetricsSnapshot,
    pub cache: CacheStats,
}

/// 같은 요청을 `count`개 동시에 실행합니다.
pub async fn run_burst(service: &DataService, request: &FetchRequest, count: usize) -> BurstReport {
    let started = Instant::now();
    let results = join_all((0..count).map(|_| service.fetch(request, CLI_CLIENT))).await;

    let mut errors = BTreeMap::new();
    let mut succeeded = 0;
    for result in &results {
        match result {
            Ok(_) => succeeded += 1,
            Err(e) => *errors.entry(e.kind().as_str().to_string()).or_insert(0) += 1,
        }
    }

    let report = BurstReport {
        requested: count,
        succeeded,
        failed: count - succeeded,
        errors,
        elapsed_ms: started.elapsed().as_millis(),
        metrics: service.metrics_snapshot(),
        cache: service.cache_stats(),
    };

    info!(
        requested = report.requested,
        succeeded = report.succeeded,
        failed = report.failed,
        processes = report.metrics.process_count,
        "Burst completed"
    );

    report
}
