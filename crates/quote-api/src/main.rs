//! 시세 데이터 API 서버.
//!
//! Axum 기반 REST API 서버를 시작합니다.
//! 시세 조회, 헬스 체크, Prometheus 메트릭 엔드포인트를 제공합니다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{http::StatusCode, middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use quote_api::metrics::setup_metrics_recorder;
use quote_api::middleware::metrics_layer;
use quote_api::routes::create_api_router;
use quote_api::state::AppState;
use quote_core::{init_logging, AppConfig, LogConfig};
use quote_data::DataService;

/// 설정 파일 경로 환경변수.
const CONFIG_PATH_ENV: &str = "QUOTE_CONFIG";

/// 기본 설정 파일 경로.
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// 요청 전체 타임아웃 계산.
///
/// 모든 재시도 시도가 끝날 때까지 기다린 뒤 여유 시간을 더합니다.
fn request_timeout(config: &AppConfig) -> Duration {
    let attempts = config.retry.max_attempts.max(1);
    let per_attempt = config
        .scraper
        .timeout()
        .saturating_add(config.scraper.kill_grace());
    let scraping = per_attempt.checked_mul(attempts).unwrap_or(Duration::MAX);
    let backoff = (0..attempts.saturating_sub(1))
        .map(|i| {
            config
                .retry
                .base_delay_ms
                .saturating_mul(1u64 << i.min(16))
                .saturating_add(config.retry.max_jitter_ms)
        })
        .fold(0u64, u64::saturating_add);
    scraping
        .saturating_add(Duration::from_millis(backoff))
        .saturating_add(Duration::from_secs(5))
}

/// CORS 레이어 설정.
///
/// CORS_ORIGINS 환경변수가 설정되어 있으면 해당 origin만 허용합니다.
/// 설정되지 않으면 개발 모드로 간주하여 모든 origin을 허용합니다.
fn cors_layer() -> CorsLayer {
    let allow_origin = match std::env::var("CORS_ORIGINS") {
        Ok(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();

            if origins.is_empty() {
                warn!("CORS_ORIGINS is set but contains no valid origins, allowing any");
                AllowOrigin::any()
            } else {
                info!("CORS configured with {} allowed origins", origins.len());
                AllowOrigin::list(origins)
            }
        }
        _ => {
            warn!("CORS_ORIGINS not set, allowing any origin (development mode)");
            AllowOrigin::any()
        }
    };

    // 읽기 전용 API
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([axum::http::Method::GET, axum::http::Method::OPTIONS])
        .allow_headers([axum::http::header::ACCEPT])
        .max_age(Duration::from_secs(3600))
}

/// /metrics 엔드포인트 핸들러.
async fn metrics_handler(
    axum::extract::State(handle): axum::extract::State<PrometheusHandle>,
) -> String {
    handle.render()
}

/// 전체 라우터 생성.
fn create_router(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let timeout = request_timeout(&state.config);
    info!(timeout_secs = timeout.as_secs(), "Request timeout configured");

    let metrics_router = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics_handle);

    Router::new()
        .merge(metrics_router)
        .merge(create_api_router().with_state(state))
        .layer(middleware::from_fn(metrics_layer))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::GATEWAY_TIMEOUT,
            timeout,
        ))
        .layer(cors_layer())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    let config_path =
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = AppConfig::load(&config_path)
        .with_context(|| format!("failed to load configuration from {}", config_path))?;

    init_logging(LogConfig::from_settings(&config.logging))
        .context("failed to initialize logging")?;

    info!(config = %config_path, "Starting quote API server...");

    let metrics_handle = setup_metrics_recorder().context("failed to install metrics recorder")?;
    info!("Prometheus metrics recorder initialized");

    let addr = format!("{}:{}", config.server.host, config.server.port)
        .parse::<SocketAddr>()
        .map_err(|e| {
            error!(
                host = %config.server.host,
                port = config.server.port,
                error = %e,
                "소켓 주소 설정이 유효하지 않습니다. QUOTE__SERVER__HOST, QUOTE__SERVER__PORT 환경변수를 확인하세요."
            );
            e
        })?;

    info!(
        program = %config.scraper.program,
        timeout_secs = config.scraper.timeout_secs,
        max_attempts = config.retry.max_attempts,
        strict_limit = config.rate_limit.strict_limit,
        standard_limit = config.rate_limit.standard_limit,
        "Scraper pipeline configured"
    );

    let service = DataService::new(&config);
    let state = Arc::new(AppState::new(service, config));
    info!(version = %state.version, "Application state initialized");

    // 전역 종료 토큰 (캐시 스위퍼, 한도 창 정리 태스크)
    let shutdown_token = CancellationToken::new();
    let maintenance = state.service.spawn_maintenance(shutdown_token.clone());

    let app = create_router(state, metrics_handle);

    info!(%addr, "API server listening");
    info!("Metrics available at http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_token.clone()))
        .await?;

    info!("Server shutdown initiated, cleaning up...");
    shutdown_token.cancel();

    if tokio::time::timeout(Duration::from_secs(10), maintenance)
        .await
        .is_err()
    {
        warn!("Cleanup timeout, forcing shutdown");
    }

    info!("Server stopped gracefully");

    Ok(())
}

/// Graceful shutdown 시그널 대기.
///
/// Ctrl+C 또는 SIGTERM 시그널을 수신하면 종료 토큰을 취소합니다.
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    shutdown_token.cancel();
    info!("Shutdown signal propagated to background tasks");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_timeout_covers_all_attempts() {
        let config = AppConfig::default();
        // 3회 * (60s + 2s) + 백오프 (1.5s + 2.5s) + 여유 5s
        assert_eq!(request_timeout(&config), Duration::from_millis(195_000));
    }

    #[test]
    fn test_request_timeout_saturates_on_huge_values() {
        let mut config = AppConfig::default();
        config.scraper.timeout_secs = u64::MAX;
        config.scraper.kill_grace_ms = u64::MAX;
        config.retry.max_attempts = 4;
        config.retry.base_delay_ms = u64::MAX;
        assert_eq!(request_timeout(&config), Duration::MAX);
    }
}
