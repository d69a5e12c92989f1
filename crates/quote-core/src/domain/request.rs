//! 시세 요청.

use serde::{Deserialize, Serialize};

use crate::error::FetchResult;
use crate::types::{normalize_symbols, CacheKey, EndpointClass, RouteTier};

/// 호출자가 전달하는 원시 요청.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    /// 엔드포인트 클래스
    pub endpoint: EndpointClass,
    /// 요청 심볼 (검색은 질의 문자열 하나)
    #[serde(default)]
    pub symbols: Vec<String>,
}

impl FetchRequest {
    /// 새 요청을 생성합니다.
    pub fn new<I, S>(endpoint: EndpointClass, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            endpoint,
            symbols: symbols.into_iter().map(Into::into).collect(),
        }
    }

    /// 단일 심볼 요청.
    pub fn single(endpoint: EndpointClass, symbol: impl Into<String>) -> Self {
        Self::new(endpoint, [symbol.into()])
    }

    /// 심볼을 정규화하여 캐시 키를 가진 요청으로 변환합니다.
    pub fn normalize(&self, max_symbols: usize) -> FetchResult<NormalizedRequest> {
        let symbols = normalize_symbols(self.endpoint, &self.symbols, max_symbols)?;
        let key = CacheKey::new(self.endpoint, &symbols);
        Ok(NormalizedRequest {
            endpoint: self.endpoint,
            symbols,
            key,
        })
    }
}

/// 정규화가 끝난 요청.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRequest {
    pub endpoint: EndpointClass,
    pub symbols: Vec<String>,
    pub key: CacheKey,
}

impl NormalizedRequest {
    pub fn route_tier(&self) -> RouteTier {
        self.endpoint.route_tier()
    }
}
