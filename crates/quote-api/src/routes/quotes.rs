//! 시세 조회 endpoint.
//!
//! 모든 핸들러는 요청을 [`FetchRequest`]로 바꿔 데이터 서비스에 넘기고,
//! 검증된 스크래퍼 페이로드를 그대로 반환합니다.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use quote_core::{EndpointClass, FetchRequest};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::middleware::ClientIdentity;
use crate::state::AppState;

/// `GET /quotes` 쿼리.
#[derive(Debug, Deserialize)]
pub struct SymbolsQuery {
    /// 쉼표로 구분된 심볼 목록
    #[serde(default)]
    pub symbols: Option<String>,
}

/// `GET /search` 쿼리.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: Option<String>,
}

async fn dispatch(
    state: &AppState,
    client: &ClientIdentity,
    request: FetchRequest,
) -> ApiResult<Json<Value>> {
    state
        .service
        .fetch(&request, client.as_str())
        .await
        .map(Json)
        .map_err(|e| ApiError::new(e, state.expose_error_details()))
}

/// 단일 심볼 시세.
///
/// GET /api/v1/quote/{symbol}
pub async fn get_quote(
    State(state): State<Arc<AppState>>,
    client: ClientIdentity,
    Path(symbol): Path<String>,
) -> ApiResult<Json<Value>> {
    dispatch(&state, &client, FetchRequest::single(EndpointClass::Quote, symbol)).await
}

/// 다중 심볼 일괄 시세.
///
/// GET /api/v1/quotes?symbols=AAPL,MSFT
pub async fn get_batch_quotes(
    State(state): State<Arc<AppState>>,
    client: ClientIdentity,
    Query(query): Query<SymbolsQuery>,
) -> ApiResult<Json<Value>> {
    let raw = query.symbols.unwrap_or_default();
    let request = FetchRequest::new(EndpointClass::Batch, raw.split(','));
    dispatch(&state, &client, request).await
}

/// 분봉 데이터.
///
/// GET /api/v1/intraday/{symbol}
pub async fn get_intraday(
    State(state): State<Arc<AppState>>,
    client: ClientIdentity,
    Path(symbol): Path<String>,
) -> ApiResult<Json<Value>> {
    dispatch(&state, &client, FetchRequest::single(EndpointClass::Intraday, symbol)).await
}

/// 일봉 데이터.
///
/// GET /api/v1/daily/{symbol}
pub async fn get_daily(
    State(state): State<Arc<AppState>>,
    client: ClientIdentity,
    Path(symbol): Path<String>,
) -> ApiResult<Json<Value>> {
    dispatch(&state, &client, FetchRequest::single(EndpointClass::Daily, symbol)).await
}

/// 심볼 검색.
///
/// GET /api/v1/search?q=apple
pub async fn search(
    State(state): State<Arc<AppState>>,
    client: ClientIdentity,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Value>> {
    let q = query.q.unwrap_or_default();
    dispatch(&state, &client, FetchRequest::single(EndpointClass::Search, q)).await
}

/// 기업 개요.
///
/// GET /api/v1/overview/{symbol}
pub async fn get_overview(
    State(state): State<Arc<AppState>>,
    client: ClientIdentity,
    Path(symbol): Path<String>,
) -> ApiResult<Json<Value>> {
    dispatch(&state, &client, FetchRequest::single(EndpointClass::Overview, symbol)).await
}

/// 섹터 ETF 성과.
///
/// GET /api/v1/sectors
pub async fn get_sectors(
    State(state): State<Arc<AppState>>,
    client: ClientIdentity,
) -> ApiResult<Json<Value>> {
    let request = FetchRequest::new(EndpointClass::Sectors, Vec::<String>::new());
    dispatch(&state, &client, request).await
}

/// 시세 라우터 생성.
pub fn quotes_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/quote/{symbol}", get(get_quote))
        .route("/quotes", get(get_batch_quotes))
        .route("/intraday/{symbol}", get(get_intraday))
        .route("/daily/{symbol}", get(get_daily))
        .route("/search", get(search))
        .route("/overview/{symbol}", get(get_overview))
        .route("/sectors", get(get_sectors))
}
