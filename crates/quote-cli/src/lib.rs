//! CLI 도구 모음.
//!
//! 이 crate는 다음 기능을 제공합니다:
//! - 단일 요청 수집 (`fetch`)
//! - 동시 요청 부하 점검 (`burst`)
//! - 유효 설정 출력 (`config`)

pub mod commands;
