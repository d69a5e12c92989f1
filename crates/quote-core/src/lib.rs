//! # Quote Core
//!
//! 시세 수집 계층 전반에서 사용하는 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - 엔드포인트 클래스 및 라우트 등급 정의
//! - 심볼 정규화와 캐시 키
//! - 스크래핑 작업(`ScrapeJob`) 상태 머신
//! - 닫힌 에러 분류 (`FetchError`)
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
