//! 시세 수집 및 캐싱 계층.
//!
//! 이 crate는 다음을 제공합니다:
//! - 엔드포인트별 TTL 캐시
//! - 라우트 등급별 고정 윈도우 요청 한도
//! - 진행 중인 동일 요청 병합 (coalescing)
//! - 지수 백오프 + 지터 재시도
//! - 외부 스크래퍼 프로세스 감독 (마감 시간, 강제 종료, 출력 검증)
//! - 프로세스 전역 메트릭 집계
//!
//! 외부에서는 [`DataService`] 하나만 사용하면 됩니다.

pub mod cache;
pub mod coalescer;
pub mod limiter;
pub mod metrics;
pub mod process;
pub mod retry;
pub mod service;

pub use cache::{CacheStats, TtlCache};
pub use coalescer::{CoalescedFetch, Coalescer, JoinRole};
pub use limiter::{RateLimitResult, RateLimiter};
pub use metrics::MetricsAggregator;
pub use process::{validate_payload, JobRunner, ProcessSupervisor};
pub use retry::{with_retry, with_retry_notify, RetryPolicy};
pub use service::DataService;
