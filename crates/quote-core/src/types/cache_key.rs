//! 캐시 키.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::EndpointClass;

/// 정규화된 요청에서 만든 결정적 캐시 키.
///
/// 형식은 `"<endpoint>:<SYM1>,<SYM2>"` 입니다 (예: `batch:AAA,BBB`).
/// 심볼은 이미 정규화(정렬, 중복 제거)되어 있어야 합니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// 엔드포인트와 정규화된 심볼로 키를 만듭니다.
    pub fn new<S: AsRef<str>>(endpoint: EndpointClass, normalized: &[S]) -> Self {
        let joined = normalized
            .iter()
            .map(|s| s.as_ref())
            .collect::<Vec<_>>()
            .join(",");
        Self(format!("{}:{}", endpoint.as_str(), joined))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 키의 엔드포인트 부분.
    pub fn endpoint(&self) -> Option<EndpointClass> {
        self.0.split(':').next().and_then(|e| e.parse().ok())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
