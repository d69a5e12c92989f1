//! 엔드포인트 클래스와 라우트 등급 정의.
//!
//! 엔드포인트 클래스마다 기본 캐시 TTL, 심볼 개수 규칙,
//! 요청 한도 등급이 정해져 있습니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// 요청 형태의 분류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointClass {
    /// 실시간 시세 (단일 또는 다중 심볼)
    Quote,
    /// 분봉 데이터
    Intraday,
    /// 일봉 데이터
    Daily,
    /// 심볼 검색
    Search,
    /// 기업 개요
    Overview,
    /// 섹터 ETF 성과
    Sectors,
    /// 다중 심볼 일괄 시세
    Batch,
}

/// 엔드포인트가 요구하는 심볼 개수.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolArity {
    /// 심볼을 받지 않음 (전달되면 무시)
    None,
    /// 정확히 하나
    One,
    /// 하나 이상
    Many,
}

/// 요청 한도 등급.
///
/// 스크래핑 부하가 큰 엔드포인트는 `Strict` 창을 사용합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteTier {
    /// 무거운 스크래핑 엔드포인트
    Strict,
    /// 그 외 모든 엔드포인트
    Standard,
}

impl EndpointClass {
    /// 모든 엔드포인트 클래스.
    pub fn all() -> [EndpointClass; 7] {
        [
            EndpointClass::Quote,
            EndpointClass::Intraday,
            EndpointClass::Daily,
            EndpointClass::Search,
            EndpointClass::Overview,
            EndpointClass::Sectors,
            EndpointClass::Batch,
        ]
    }

    /// 스크래퍼에 전달되는 이름.
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointClass::Quote => "quote",
            EndpointClass::Intraday => "intraday",
            EndpointClass::Daily => "daily",
            EndpointClass::Search => "search",
            EndpointClass::Overview => "overview",
            EndpointClass::Sectors => "sectors",
            EndpointClass::Batch => "batch",
        }
    }

    /// 기본 캐시 TTL.
    pub fn default_ttl(&self) -> Duration {
        match self {
            EndpointClass::Quote => Duration::from_secs(15),
            EndpointClass::Intraday => Duration::from_secs(60),
            EndpointClass::Daily => Duration::from_secs(1800),
            EndpointClass::Search => Duration::from_secs(3600),
            EndpointClass::Overview => Duration::from_secs(3600),
            EndpointClass::Sectors => Duration::from_secs(600),
            EndpointClass::Batch => Duration::from_secs(30),
        }
    }

    /// 심볼 개수 규칙.
    pub fn arity(&self) -> SymbolArity {
        match self {
            EndpointClass::Quote | EndpointClass::Batch => SymbolArity::Many,
            EndpointClass::Intraday
            | EndpointClass::Daily
            | EndpointClass::Search
            | EndpointClass::Overview => SymbolArity::One,
            EndpointClass::Sectors => SymbolArity::None,
        }
    }

    /// 요청 한도 등급.
    pub fn route_tier(&self) -> RouteTier {
        match self {
            EndpointClass::Batch | EndpointClass::Sectors => RouteTier::Strict,
            _ => RouteTier::Standard,
        }
    }

    /// 심볼 대신 자유 텍스트 질의를 받는지 여부.
    pub fn takes_query(&self) -> bool {
        matches!(self, EndpointClass::Search)
    }
}

impl fmt::Display for EndpointClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EndpointClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "quote" => Ok(EndpointClass::Quote),
            "intraday" => Ok(EndpointClass::Intraday),
            "daily" => Ok(EndpointClass::Daily),
            "search" => Ok(EndpointClass::Search),
            "overview" => Ok(EndpointClass::Overview),
            "sectors" => Ok(EndpointClass::Sectors),
            "batch" => Ok(EndpointClass::Batch),
            _ => Err(format!("Unknown endpoint: {}", s)),
        }
    }
}

impl RouteTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteTier::Strict => "strict",
            RouteTier::Standard => "standard",
        }
    }
}

impl fmt::Display for RouteTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
