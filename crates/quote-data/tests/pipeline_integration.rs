//! 데이터 서비스 파이프라인 통합 테스트.
//!
//! 가짜 작업 실행기로 캐시, 병합, 재시도, 요청 한도의 상호작용을 검증하고,
//! unix에서는 실제 `sh` 프로세스로 전체 경로를 확인합니다.

use async_trait::async_trait;
use futures::future::join_all;
use quote_core::{AppConfig, EndpointClass, FetchError, FetchRequest, FetchResult, RouteTier};
use quote_data::{validate_payload, DataService, JobRunner};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 미리 정한 원시 출력을 돌려주고 검증까지 수행하는 가짜 실행기.
struct ScriptedRunner {
    calls: AtomicUsize,
    delay: Duration,
    outputs: Mutex<Vec<FetchResult<Value>>>,
    fallback: FetchResult<Value>,
}

impl ScriptedRunner {
    fn new(fallback: FetchResult<Value>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Duration::from_millis(100),
            outputs: Mutex::new(Vec::new()),
            fallback,
        }
    }

    /// 앞쪽 호출에서 순서대로 돌려줄 결과.
    fn with_outputs(self, outputs: Vec<FetchResult<Value>>) -> Self {
        let mut reversed = outputs;
        reversed.reverse();
        *self.outputs.lock().unwrap() = reversed;
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobRunner for ScriptedRunner {
    async fn run(&self, endpoint: EndpointClass, _symbols: &[String]) -> FetchResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let output = self
            .outputs
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| self.fallback.clone());
        validate_payload(endpoint, output?)
    }
}

fn batch_output() -> Value {
    json!({
        "symbols": ["AAA", "BBB"],
        "results": [
            {"symbol": "AAA", "price": 10, "change_percent": 5},
            {"symbol": "BBB", "price": -1}
        ],
        "count": 2
    })
}

fn service_with(config: AppConfig, runner: Arc<ScriptedRunner>) -> DataService {
    DataService::with_runner(&config, runner)
}

#[tokio::test(start_paused = true)]
async fn batch_is_validated_cached_and_served_from_cache() {
    let runner = Arc::new(ScriptedRunner::new(Ok(batch_output())));
    let service = service_with(AppConfig::default(), runner.clone());
    let request = FetchRequest::new(EndpointClass::Batch, ["BBB", "AAA"]);

    let payload = service.fetch(&request, "client").await.unwrap();
    let results = payload["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["symbol"], json!("AAA"));
    assert_eq!(payload["count"], json!(1));

    // 30초 TTL 안에서는 프로세스를 다시 띄우지 않음
    tokio::time::advance(Duration::from_secs(29)).await;
    let again = service
        .fetch(&FetchRequest::new(EndpointClass::Batch, ["aaa", "bbb"]), "client")
        .await
        .unwrap();
    assert_eq!(again, payload);
    assert_eq!(runner.calls(), 1);

    tokio::time::advance(Duration::from_secs(2)).await;
    service.fetch(&request, "client").await.unwrap();
    assert_eq!(runner.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_identical_requests_spawn_once() {
    let runner = Arc::new(ScriptedRunner::new(Ok(json!({"symbol": "AAPL", "price": 190.0}))));
    let service = service_with(AppConfig::default(), runner.clone());
    let request = FetchRequest::single(EndpointClass::Quote, "AAPL");

    let results = join_all((0..10).map(|_| service.fetch(&request, "client"))).await;

    assert_eq!(runner.calls(), 1);
    assert!(results.iter().all(|r| r.as_ref().unwrap()["price"] == json!(190.0)));

    let snapshot = service.metrics_snapshot();
    assert_eq!(snapshot.request_count, 10);
    assert_eq!(snapshot.process_count, 1);
    assert_eq!(snapshot.coalesced_count, 9);
    assert_eq!(snapshot.cache_misses, 1);
    assert_eq!(service.pending_fetches(), 0);
}

#[tokio::test(start_paused = true)]
async fn coalesced_subscribers_share_the_same_error() {
    let mut config = AppConfig::default();
    config.retry.max_attempts = 1;
    let runner = Arc::new(ScriptedRunner::new(Ok(json!({"results": []}))));
    let service = service_with(config, runner.clone());
    let request = FetchRequest::new(EndpointClass::Batch, ["AAA", "BBB"]);

    let results = join_all((0..5).map(|_| service.fetch(&request, "client"))).await;

    assert_eq!(runner.calls(), 1);
    let first = results[0].clone().unwrap_err();
    assert!(matches!(first, FetchError::NoValidData(_)));
    assert!(results.iter().all(|r| r.as_ref().unwrap_err() == &first));

    let snapshot = service.metrics_snapshot();
    assert_eq!(snapshot.error_count, 5);
    assert_eq!(snapshot.success_rate, 0.0);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_then_cached() {
    let runner = Arc::new(
        ScriptedRunner::new(Ok(json!({"symbol": "AAPL", "price": 1.0}))).with_outputs(vec![
            Err(FetchError::ProcessError {
                code: Some(1),
                stderr: "429 Too Many Requests".to_string(),
            }),
            Ok(json!("garbage")),
        ]),
    );
    let service = service_with(AppConfig::default(), runner.clone());

    let payload = service
        .fetch(&FetchRequest::single(EndpointClass::Quote, "AAPL"), "client")
        .await
        .unwrap();

    assert_eq!(payload["symbol"], json!("AAPL"));
    assert_eq!(runner.calls(), 3);
    let snapshot = service.metrics_snapshot();
    assert_eq!(snapshot.retry_count, 2);
    assert_eq!(snapshot.process_count, 3);
    assert_eq!(snapshot.error_count, 0);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_return_last_error() {
    let runner = Arc::new(ScriptedRunner::new(Err(FetchError::LaunchError(
        "python3: not found".to_string(),
    ))));
    let service = service_with(AppConfig::default(), runner.clone());

    let err = service
        .fetch(&FetchRequest::single(EndpointClass::Overview, "AAPL"), "client")
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::LaunchError(_)));
    assert_eq!(runner.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn strict_tier_rejects_eleventh_request_before_cache() {
    let runner = Arc::new(ScriptedRunner::new(Ok(json!({
        "sectors": [{"sector": "Technology", "symbol": "XLK", "price": 200.0}],
        "count": 1
    }))));
    let service = service_with(AppConfig::default(), runner.clone());
    let request = FetchRequest::new::<_, String>(EndpointClass::Sectors, Vec::new());

    for _ in 0..10 {
        service.fetch(&request, "client").await.unwrap();
    }
    let err = service.fetch(&request, "client").await.unwrap_err();
    assert_eq!(
        err,
        FetchError::RateLimited {
            tier: RouteTier::Strict,
            retry_after_secs: 60
        }
    );
    assert_eq!(runner.calls(), 1);

    // 다른 등급은 영향을 받지 않음
    assert!(service
        .fetch(&FetchRequest::single(EndpointClass::Daily, "AAPL"), "client")
        .await
        .is_err_and(|e| !matches!(e, FetchError::RateLimited { .. })));

    tokio::time::advance(Duration::from_secs(60)).await;
    assert!(service.fetch(&request, "client").await.is_ok());
    assert_eq!(service.metrics_snapshot().rate_limited_count, 1);
}

#[cfg(unix)]
mod subprocess {
    use super::*;

    fn shell_config(script: &str, timeout_secs: u64) -> AppConfig {
        let mut config = AppConfig::default();
        config.scraper.program = "sh".to_string();
        config.scraper.args = vec!["-c".to_string(), script.to_string(), "scraper".to_string()];
        config.scraper.timeout_secs = timeout_secs;
        config.scraper.kill_grace_ms = 200;
        config.retry.base_delay_ms = 10;
        config.retry.max_jitter_ms = 0;
        config
    }

    #[tokio::test]
    async fn real_process_end_to_end() {
        let script = r#"printf '{"symbols":%s,"results":[{"symbol":"AAA","price":10,"change_percent":5},{"symbol":"BBB","price":-1}],"count":2}' "$1""#;
        let service = DataService::new(&shell_config(script, 5));
        let request = FetchRequest::new(EndpointClass::Batch, ["AAA", "BBB"]);

        let payload = service.fetch(&request, "client").await.unwrap();
        assert_eq!(payload["symbols"], json!(["AAA", "BBB"]));
        assert_eq!(payload["results"].as_array().unwrap().len(), 1);

        service.fetch(&request, "client").await.unwrap();
        assert_eq!(service.metrics_snapshot().process_count, 1);
    }

    #[tokio::test]
    async fn hung_process_times_out_without_retry() {
        let service = DataService::new(&shell_config("exec sleep 30", 1));
        let request = FetchRequest::single(EndpointClass::Quote, "AAPL");

        let results = join_all((0..3).map(|_| service.fetch(&request, "client"))).await;
        for result in results {
            assert_eq!(result, Err(FetchError::Timeout { after_ms: 1000 }));
        }

        let snapshot = service.metrics_snapshot();
        assert_eq!(snapshot.process_count, 1);
        assert_eq!(snapshot.timeout_count, 3);
    }
}
