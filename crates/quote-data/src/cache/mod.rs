//! 캐싱 레이어.
//!
//! - TTL 캐시: 스크래퍼 결과를 엔드포인트별 유효 기간 동안 보관

pub mod ttl;

pub use ttl::{CacheStats, TtlCache};
