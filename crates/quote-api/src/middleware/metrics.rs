//! HTTP 요청 metrics middleware.

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use tokio::time::Instant;

use crate::metrics::{
    normalize_path, record_http_duration, record_http_request, record_http_response,
};

/// 메트릭 라벨로 쓸 경로.
///
/// 라우팅이 끝난 요청은 라우트 템플릿(`/api/v1/quote/{symbol}`)을 사용하고,
/// 매칭되지 않은 요청은 [`normalize_path`]로 심볼 세그먼트를 가립니다.
fn path_label(request: &Request) -> String {
    match request.extensions().get::<MatchedPath>() {
        Some(matched) => matched.as_str().to_string(),
        None => normalize_path(request.uri().path()),
    }
}

/// HTTP 메트릭을 수집하는 미들웨어 레이어.
///
/// - `http_requests_total`: 총 요청 수 (method, path 라벨)
/// - `http_responses_total`: 총 응답 수 (method, path, status 라벨)
/// - `http_request_duration_seconds`: 요청 처리 시간 히스토그램
///
/// 스크래퍼 대기 시간이 그대로 포함되므로 캐시 적중과 실제 수집이
/// 히스토그램에서 뚜렷하게 나뉩니다.
pub async fn metrics_layer(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().as_str().to_owned();
    let path = path_label(&request);

    record_http_request(&method, &path);
    let response = next.run(request).await;

    record_http_response(&method, &path, response.status().as_u16());
    record_http_duration(&method, &path, started.elapsed().as_secs_f64());

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    async fn echo_label(request: Request) -> String {
        path_label(&request)
    }

    #[tokio::test]
    async fn test_label_uses_route_template() {
        let app = Router::new().route("/api/v1/quote/{symbol}", get(echo_label));

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/api/v1/quote/AAPL")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"/api/v1/quote/{symbol}");
    }

    #[test]
    fn test_label_falls_back_to_normalized_path() {
        let request = HttpRequest::builder()
            .uri("/api/v1/daily/MSFT")
            .body(Body::empty())
            .unwrap();
        assert_eq!(path_label(&request), "/api/v1/daily/:symbol");
    }

    #[tokio::test]
    async fn test_layer_passes_responses_through() {
        let app = Router::new()
            .route("/health", get(|| async { "OK" }))
            .layer(middleware::from_fn(metrics_layer));

        let ok = app
            .clone()
            .oneshot(HttpRequest::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(ok.status(), StatusCode::OK);

        let missing = app
            .oneshot(HttpRequest::builder().uri("/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }
}
