//! 클라이언트 식별 추출기.
//!
//! 클라이언트별 요청 한도가 켜져 있을 때 창을 나누는 키로 사용됩니다.

use axum::{extract::FromRequestParts, http::request::Parts, http::HeaderMap};
use std::convert::Infallible;

/// 식별할 수 없는 클라이언트에 사용하는 값.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// 요청한 클라이언트의 식별자.
///
/// X-Forwarded-For, X-Real-IP 헤더를 우선 확인합니다 (프록시/로드밸런서 뒤에 있을 경우).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity(pub String);

impl ClientIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 헤더에서 클라이언트 식별자를 추출합니다.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        // 첫 번째 IP 사용 (클라이언트 원본 IP)
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        let real_ip = || {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let ip = forwarded.or_else(real_ip).unwrap_or(UNKNOWN_CLIENT);
        ClientIdentity(ip.to_string())
    }
}

impl<S> FromRequestParts<S> for ClientIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIdentity::from_headers(&parts.headers))
    }
}
