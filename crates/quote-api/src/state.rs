//! 애플리케이션 상태 관리.
//!
//! 모든 핸들러가 공유하는 상태를 정의합니다.

use quote_core::AppConfig;
use quote_data::DataService;
use std::sync::Arc;

/// 핸들러 간 공유되는 애플리케이션 상태.
#[derive(Clone)]
pub struct AppState {
    /// 시세 데이터 서비스
    pub service: Arc<DataService>,

    /// 애플리케이션 설정
    pub config: Arc<AppConfig>,

    /// 서버 시작 시간
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// API 버전
    pub version: String,
}

impl AppState {
    /// 새로운 AppState 생성.
    pub fn new(service: DataService, config: AppConfig) -> Self {
        Self {
            service: Arc::new(service),
            config: Arc::new(config),
            started_at: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// 서버 업타임(초).
    pub fn uptime_secs(&self) -> i64 {
        chrono::Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds()
    }

    /// 에러 응답에 내부 정보를 포함할지 여부.
    pub fn expose_error_details(&self) -> bool {
        self.config.security.expose_error_details
    }
}

#[cfg(any(test, feature = "test-utils"))]
mod test_support {
    use async_trait::async_trait;
    use quote_core::{EndpointClass, FetchError, FetchResult};
    use quote_data::JobRunner;
    use serde_json::{json, Value};

    /// 심볼로 고정된 응답을 만드는 테스트용 실행기.
    ///
    /// `FAIL`은 프로세스 실패, `SLOW`는 타임아웃을 흉내냅니다.
    pub struct StaticRunner;

    #[async_trait]
    impl JobRunner for StaticRunner {
        async fn run(&self, endpoint: EndpointClass, symbols: &[String]) -> FetchResult<Value> {
            let first = symbols.first().cloned().unwrap_or_default();
            match first.as_str() {
                "FAIL" => {
                    return Err(FetchError::ProcessError {
                        code: Some(1),
                        stderr: "Traceback: /opt/scraper/scraper.py".to_string(),
                    })
                }
                "SLOW" => return Err(FetchError::Timeout { after_ms: 60_000 }),
                _ => {}
            }

            Ok(match endpoint {
                EndpointClass::Batch => json!({
                    "symbols": symbols,
                    "results": symbols
                        .iter()
                        .map(|s| json!({ "symbol": s, "price": 10.0 }))
                        .collect::<Vec<_>>(),
                    "count": symbols.len()
                }),
                EndpointClass::Sectors => json!({
                    "sectors": [{ "sector": "Technology", "symbol": "XLK", "price": 200.0 }],
                    "count": 1
                }),
                EndpointClass::Search => json!({ "query": first, "results": [] , "count": 0 }),
                EndpointClass::Intraday | EndpointClass::Daily => {
                    json!({ "symbol": first, "data": [{ "close": 1.0 }], "count": 1 })
                }
                EndpointClass::Overview => json!({ "symbol": first, "company_name": "Test Co" }),
                EndpointClass::Quote => json!({ "symbol": first, "price": 10.0 }),
            })
        }
    }
}

/// 테스트용 AppState 생성.
///
/// 재시도 없이 즉시 응답하는 가짜 실행기를 사용합니다.
#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_state() -> AppState {
    create_test_state_with(AppConfig::default())
}

/// 설정을 지정한 테스트용 AppState 생성.
#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_state_with(mut config: AppConfig) -> AppState {
    config.retry.max_attempts = 1;
    let service = DataService::with_runner(&config, Arc::new(test_support::StaticRunner));
    AppState::new(service, config)
}
