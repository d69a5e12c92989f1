//! 시세 수집 계층의 에러 타입.
//!
//! 모든 계층(리미터, 캐시, 코얼레서, 재시도, 프로세스 감독자)이 같은
//! 닫힌 에러 분류를 사용하며, 전송 계층 표현(HTTP 상태 코드 등)으로의
//! 변환은 가장 바깥 경계에서만 수행합니다.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::RouteTier;

/// 시세 요청 처리 에러.
///
/// 코얼레싱된 모든 구독자가 동일한 에러를 받아야 하므로 `Clone`입니다.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// 요청 한도 초과 (캐시/페치 경로에 진입하지 않음)
    #[error("Rate limit exceeded for {tier} routes, retry after {retry_after_secs}s")]
    RateLimited {
        tier: RouteTier,
        retry_after_secs: u64,
    },

    /// 스크래퍼 프로세스 실행 실패 (실행 파일 없음, 권한 등)
    #[error("Scraper launch error: {0}")]
    LaunchError(String),

    /// 스크래퍼가 0이 아닌 코드로 종료
    #[error("Scraper process error (exit {}): {stderr}", exit_code_label(.code))]
    ProcessError { code: Option<i32>, stderr: String },

    /// 정상 종료했으나 출력이 JSON이 아니거나 구조가 잘못됨
    #[error("Malformed scraper output: {0}")]
    MalformedOutput(String),

    /// 마감 시간 초과, 프로세스 강제 종료됨
    #[error("Scraper timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    /// 파싱은 됐지만 모든 항목이 검증에 실패
    #[error("No valid data: {0}")]
    NoValidData(String),

    /// 잘못된 요청 (심볼 누락, 형식 오류 등)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// 내부 에러
    #[error("Internal error: {0}")]
    Internal(String),
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "signal".to_string(),
    }
}

/// 에러 종류 태그.
///
/// 메트릭 라벨과 경계 응답의 `kind` 필드에 사용됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RateLimited,
    LaunchError,
    ProcessError,
    MalformedOutput,
    Timeout,
    NoValidData,
    InvalidRequest,
    Internal,
}

impl ErrorKind {
    /// 안정적인 snake_case 이름.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::LaunchError => "launch_error",
            ErrorKind::ProcessError => "process_error",
            ErrorKind::MalformedOutput => "malformed_output",
            ErrorKind::Timeout => "timeout",
            ErrorKind::NoValidData => "no_valid_data",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 시세 작업을 위한 Result 타입.
pub type FetchResult<T> = Result<T, FetchError>;

impl FetchError {
    /// 에러 종류 태그를 반환합니다.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::RateLimited { .. } => ErrorKind::RateLimited,
            FetchError::LaunchError(_) => ErrorKind::LaunchError,
            FetchError::ProcessError { .. } => ErrorKind::ProcessError,
            FetchError::MalformedOutput(_) => ErrorKind::MalformedOutput,
            FetchError::Timeout { .. } => ErrorKind::Timeout,
            FetchError::NoValidData(_) => ErrorKind::NoValidData,
            FetchError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            FetchError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// 같은 정책으로 새 시도를 하면 성공할 수 있는 일시적 실패인지 확인합니다.
    ///
    /// `Timeout`은 여기 포함되지 않습니다. 타임아웃 재시도 여부는
    /// 재시도 정책의 `retry_on_timeout` 설정이 결정합니다.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchError::LaunchError(_)
                | FetchError::ProcessError { .. }
                | FetchError::MalformedOutput(_)
                | FetchError::NoValidData(_)
        )
    }

    /// 타임아웃 에러인지 확인합니다.
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout { .. })
    }

    /// 경계에서 사용하는 공개 에러 코드.
    ///
    /// 프로세스 관련 실패는 `UPSTREAM_ERROR`, 출력 품질 문제는
    /// `INVALID_DATA`로 묶입니다.
    pub fn public_code(&self) -> &'static str {
        match self {
            FetchError::RateLimited { .. } => "RATE_LIMITED",
            FetchError::LaunchError(_) | FetchError::ProcessError { .. } => "UPSTREAM_ERROR",
            FetchError::MalformedOutput(_) | FetchError::NoValidData(_) => "INVALID_DATA",
            FetchError::Timeout { .. } => "TIMEOUT",
            FetchError::InvalidRequest(_) => "INVALID_REQUEST",
            FetchError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 사용자에게 보여줄 메시지.
    ///
    /// `expose_details`가 false(하드닝 모드)이면 프로세스 stderr, 종료 코드,
    /// 파서 메시지 같은 내부 정보를 제외합니다.
    pub fn public_message(&self, expose_details: bool) -> String {
        if expose_details {
            return self.to_string();
        }
        match self {
            FetchError::RateLimited { .. }
            | FetchError::Timeout { .. }
            | FetchError::InvalidRequest(_) => self.to_string(),
            FetchError::LaunchError(_) => "Data source is unavailable".to_string(),
            FetchError::ProcessError { .. } => "Data source failed to respond".to_string(),
            FetchError::MalformedOutput(_) => "Data source returned malformed data".to_string(),
            FetchError::NoValidData(_) => "Data source returned no valid data".to_string(),
            FetchError::Internal(_) => "Internal error".to_string(),
        }
    }

    /// `RateLimited`일 때 재시도까지 남은 시간(초).
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            FetchError::RateLimited {
                retry_after_secs, ..
            } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::MalformedOutput(err.to_string())
    }
}
