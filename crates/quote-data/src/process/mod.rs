//! 외부 스크래퍼 프로세스 실행.
//!
//! - [`ProcessSupervisor`]: 프로세스 생성, 출력 수집, 마감 시간 강제
//! - [`validation`]: 엔드포인트별 출력 검증

pub mod supervisor;
pub mod validation;

pub use supervisor::ProcessSupervisor;
pub use validation::validate_payload;

use async_trait::async_trait;
use quote_core::{EndpointClass, FetchResult};
use serde_json::Value;

/// 스크래핑 작업 실행기.
///
/// 정규화된 심볼로 한 번의 작업을 실행하고 검증된 페이로드를 반환합니다.
/// 실제 구현은 [`ProcessSupervisor`]이며, 테스트에서는 가짜 구현으로
/// 대체할 수 있습니다.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, endpoint: EndpointClass, symbols: &[String]) -> FetchResult<Value>;
}
