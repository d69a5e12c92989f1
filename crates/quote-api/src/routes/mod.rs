//! API 라우트.
//!
//! 모든 REST API 엔드포인트를 정의하고 라우터를 구성합니다.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (liveness)
//! - `/health/ready` - 상세 헬스 체크 (readiness)
//! - `/health/metrics` - 수집 계층 메트릭 스냅샷
//! - `/api/v1/quote/{symbol}` - 단일 시세
//! - `/api/v1/quotes?symbols=` - 일괄 시세
//! - `/api/v1/intraday/{symbol}`, `/api/v1/daily/{symbol}` - 시계열
//! - `/api/v1/search?q=` - 심볼 검색
//! - `/api/v1/overview/{symbol}` - 기업 개요
//! - `/api/v1/sectors` - 섹터 성과

pub mod health;
pub mod quotes;

pub use health::{health_router, ComponentHealth, ComponentStatus, HealthResponse, MetricsResponse};
pub use quotes::{quotes_router, SearchQuery, SymbolsQuery};

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

/// 전체 API 라우터 생성.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/health", health_router())
        .nest("/api/v1", quotes_router())
}
