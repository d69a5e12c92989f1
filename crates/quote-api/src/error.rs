//! 통합 API 에러 응답 타입.
//!
//! 코어의 `FetchError`를 HTTP 응답으로 변환하는 유일한 지점입니다.
//!
//! | 에러 | 상태 코드 | 코드 |
//! |------|-----------|------|
//! | `RateLimited` | 429 (+ `Retry-After`) | `RATE_LIMITED` |
//! | `LaunchError`, `ProcessError` | 502 | `UPSTREAM_ERROR` |
//! | `MalformedOutput`, `NoValidData` | 502 | `INVALID_DATA` |
//! | `Timeout` | 504 | `TIMEOUT` |
//! | `InvalidRequest` | 400 | `INVALID_REQUEST` |
//! | `Internal` | 500 | `INTERNAL_ERROR` |

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use quote_core::FetchError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 통합 API 에러 응답.
///
/// # 예시
///
/// ```json
/// {
///   "code": "TIMEOUT",
///   "message": "Scraper timed out after 60000ms",
///   "details": { "kind": "timeout" },
///   "timestamp": 1738300800
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// 에러 코드 (예: "UPSTREAM_ERROR", "INVALID_REQUEST")
    pub code: String,
    /// 사람이 읽을 수 있는 에러 메시지
    pub message: String,
    /// 추가 에러 상세 정보 (선택적)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// 에러 발생 타임스탬프 (Unix timestamp)
    pub timestamp: i64,
}

impl ApiErrorResponse {
    /// 기본 에러 생성 (타임스탬프 포함).
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    /// 상세 정보를 추가합니다.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl std::fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// 핸들러에서 반환하는 에러.
///
/// `expose_details`가 false면 프로세스 stderr와 종료 코드 같은 내부
/// 정보는 응답에서 제외됩니다.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub error: FetchError,
    pub expose_details: bool,
}

impl ApiError {
    pub fn new(error: FetchError, expose_details: bool) -> Self {
        Self {
            error,
            expose_details,
        }
    }

    /// HTTP 상태 코드.
    pub fn status(&self) -> StatusCode {
        match &self.error {
            FetchError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            FetchError::LaunchError(_)
            | FetchError::ProcessError { .. }
            | FetchError::MalformedOutput(_)
            | FetchError::NoValidData(_) => StatusCode::BAD_GATEWAY,
            FetchError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            FetchError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            FetchError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 응답 본문.
    pub fn body(&self) -> ApiErrorResponse {
        let mut details = serde_json::json!({ "kind": self.error.kind() });
        if let Some(retry_after) = self.error.retry_after_secs() {
            details["retry_after"] = Value::from(retry_after);
        }
        if self.expose_details {
            if let FetchError::ProcessError { code, stderr } = &self.error {
                details["exit_code"] = serde_json::json!(code);
                details["stderr"] = Value::from(stderr.clone());
            }
        }

        ApiErrorResponse::new(
            self.error.public_code(),
            self.error.public_message(self.expose_details),
        )
        .with_details(details)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = (status, Json(self.body())).into_response();

        if let Some(retry_after) = self.error.retry_after_secs() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        }

        response
    }
}

/// API 핸들러 Result 타입 별칭.
pub type ApiResult<T> = Result<T, ApiError>;
