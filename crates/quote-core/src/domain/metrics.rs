//! 메트릭 스냅샷.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 프로세스 전역 카운터의 읽기 전용 스냅샷.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// 가동 시간 (초)
    pub uptime_secs: u64,
    pub request_count: u64,
    pub error_count: u64,
    /// 성공률 (0.0 ~ 1.0). 요청이 없으면 0.0
    pub success_rate: f64,
    /// 실행한 스크래퍼 프로세스 수
    pub process_count: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// 기존 페치에 합류한 요청 수
    pub coalesced_count: u64,
    pub retry_count: u64,
    pub timeout_count: u64,
    pub rate_limited_count: u64,
    /// 시작 시각
    pub started_at: DateTime<Utc>,
}

/// 성공률 계산. 요청이 없으면 0.0을 반환합니다.
pub fn success_rate(request_count: u64, error_count: u64) -> f64 {
    if request_count == 0 {
        return 0.0;
    }
    request_count.saturating_sub(error_count) as f64 / request_count as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate() {
        assert_eq!(success_rate(0, 0), 0.0);
        assert_eq!(success_rate(4, 1), 0.75);
        assert_eq!(success_rate(10, 0), 1.0);
    }
}
