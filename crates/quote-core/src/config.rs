//! 설정 관리.
//!
//! 이 모듈은 애플리케이션 설정을 정의하고 관리합니다.
//! 모든 필드는 serde 기본값을 가지므로 설정 파일 없이도 동작합니다.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::types::{EndpointClass, RouteTier, DEFAULT_MAX_SYMBOLS};

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// 서버 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 스크래퍼 프로세스 설정
    #[serde(default)]
    pub scraper: ScraperConfig,
    /// 재시도 정책
    #[serde(default)]
    pub retry: RetryConfig,
    /// 요청 한도
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// 캐시 설정
    #[serde(default)]
    pub cache: CacheConfig,
    /// 보안 설정
    #[serde(default)]
    pub security: SecurityConfig,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    #[serde(default = "default_host")]
    pub host: String,
    /// 리스닝할 포트
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 로그 레벨
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// 스크래퍼 프로세스 설정.
///
/// 실행 형식: `<program> <args...> <심볼 JSON 배열> <endpoint>`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    /// 실행 파일
    #[serde(default = "default_program")]
    pub program: String,
    /// 심볼 인자 앞에 붙는 고정 인자 (예: 스크립트 경로)
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    /// 작업 마감 시간 (초)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// 종료 신호 후 강제 종료까지의 유예 시간 (밀리초)
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,
    /// stdout 최대 크기 (바이트)
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
    /// 작업 디렉토리
    #[serde(default)]
    pub working_dir: Option<String>,
}

fn default_program() -> String {
    "python3".to_string()
}

fn default_args() -> Vec<String> {
    vec!["scripts/scraper.py".to_string()]
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_kill_grace_ms() -> u64 {
    2000
}

fn default_max_output_bytes() -> usize {
    8 * 1024 * 1024
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            timeout_secs: default_timeout_secs(),
            kill_grace_ms: default_kill_grace_ms(),
            max_output_bytes: default_max_output_bytes(),
            working_dir: None,
        }
    }
}

impl ScraperConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}

/// 재시도 정책 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// 최대 시도 횟수 (첫 시도 포함)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// 기본 지연 (밀리초)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// 최대 지터 (밀리초)
    #[serde(default = "default_max_jitter_ms")]
    pub max_jitter_ms: u64,
    /// 타임아웃도 재시도할지 여부
    #[serde(default)]
    pub retry_on_timeout: bool,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_jitter_ms() -> u64 {
    500
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_jitter_ms: default_max_jitter_ms(),
            retry_on_timeout: false,
        }
    }
}

/// 요청 한도 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// 윈도우 크기 (초)
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// strict 등급 윈도우당 허용 수
    #[serde(default = "default_strict_limit")]
    pub strict_limit: u32,
    /// standard 등급 윈도우당 허용 수
    #[serde(default = "default_standard_limit")]
    pub standard_limit: u32,
    /// 클라이언트별 윈도우 사용 여부
    #[serde(default)]
    pub per_client: bool,
}

fn default_window_secs() -> u64 {
    60
}

fn default_strict_limit() -> u32 {
    10
}

fn default_standard_limit() -> u32 {
    60
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            strict_limit: default_strict_limit(),
            standard_limit: default_standard_limit(),
            per_client: false,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// 등급별 허용 수.
    pub fn limit_for(&self, tier: RouteTier) -> u32 {
        match tier {
            RouteTier::Strict => self.strict_limit,
            RouteTier::Standard => self.standard_limit,
        }
    }
}

/// 캐시 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// 만료 항목 정리 주기 (초)
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// 엔드포인트별 TTL 오버라이드 (초). 키는 엔드포인트 이름
    #[serde(default)]
    pub ttl_overrides: HashMap<String, u64>,
    /// 요청당 최대 심볼 수
    #[serde(default = "default_max_symbols")]
    pub max_symbols: usize,
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_max_symbols() -> usize {
    DEFAULT_MAX_SYMBOLS
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            ttl_overrides: HashMap::new(),
            max_symbols: default_max_symbols(),
        }
    }
}

impl CacheConfig {
    /// 엔드포인트의 유효 TTL (오버라이드가 없으면 기본값).
    ///
    /// 오버라이드 키는 `validate`와 같은 규칙(대소문자 무시)으로 해석합니다.
    pub fn ttl_for(&self, endpoint: EndpointClass) -> Duration {
        self.ttl_overrides
            .iter()
            .find(|(name, _)| name.parse::<EndpointClass>().ok() == Some(endpoint))
            .map(|(_, secs)| Duration::from_secs(*secs))
            .unwrap_or_else(|| endpoint.default_ttl())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// 스크래퍼 마감 시간 상한 (초). 마감 시각 계산이 넘치지 않도록 제한합니다.
pub const MAX_SCRAPER_TIMEOUT_SECS: u64 = 3600;

/// 종료 유예 시간 상한 (밀리초).
pub const MAX_KILL_GRACE_MS: u64 = 60_000;

/// 최대 시도 횟수 상한.
pub const MAX_RETRY_ATTEMPTS: u32 = 10;

/// 보안 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SecurityConfig {
    /// 에러 응답에 내부 정보(stderr, 종료 코드) 포함 여부
    #[serde(default)]
    pub expose_error_details: bool,
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일은 선택 사항이며, 환경 변수(`QUOTE__SECTION__FIELD`)가 파일 값을
    /// 덮어씁니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            // 파일에서 로드
            .add_source(config::File::from(path.as_ref()).required(false))
            // 환경 변수로 오버라이드
            .add_source(
                config::Environment::with_prefix("QUOTE")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> Result<Self, config::ConfigError> {
        Self::load("config/default.toml")
    }

    /// 설정 값을 검증합니다.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        let invalid = |msg: &str| Err(config::ConfigError::Message(msg.to_string()));

        if self.scraper.program.trim().is_empty() {
            return invalid("scraper.program must not be empty");
        }
        if self.scraper.timeout_secs == 0 {
            return invalid("scraper.timeout_secs must be greater than 0");
        }
        if self.scraper.timeout_secs > MAX_SCRAPER_TIMEOUT_SECS {
            return Err(config::ConfigError::Message(format!(
                "scraper.timeout_secs must be at most {}",
                MAX_SCRAPER_TIMEOUT_SECS
            )));
        }
        if self.scraper.kill_grace_ms > MAX_KILL_GRACE_MS {
            return Err(config::ConfigError::Message(format!(
                "scraper.kill_grace_ms must be at most {}",
                MAX_KILL_GRACE_MS
            )));
        }
        if self.scraper.max_output_bytes == 0 {
            return invalid("scraper.max_output_bytes must be greater than 0");
        }
        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts must be at least 1");
        }
        if self.retry.max_attempts > MAX_RETRY_ATTEMPTS {
            return Err(config::ConfigError::Message(format!(
                "retry.max_attempts must be at most {}",
                MAX_RETRY_ATTEMPTS
            )));
        }
        if self.rate_limit.window_secs == 0 {
            return invalid("rate_limit.window_secs must be greater than 0");
        }
        if self.rate_limit.strict_limit == 0 || self.rate_limit.standard_limit == 0 {
            return invalid("rate_limit limits must be greater than 0");
        }
        if self.cache.max_symbols == 0 {
            return invalid("cache.max_symbols must be greater than 0");
        }
        if self.cache.sweep_interval_secs == 0 {
            return invalid("cache.sweep_interval_secs must be greater than 0");
        }
        for name in self.cache.ttl_overrides.keys() {
            if name.parse::<EndpointClass>().is_err() {
                return Err(config::ConfigError::Message(format!(
                    "cache.ttl_overrides has unknown endpoint: {}",
                    name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert_eq!(config.retry.max_jitter_ms, 500);
        assert!(!config.retry.retry_on_timeout);
        assert_eq!(config.rate_limit.limit_for(RouteTier::Strict), 10);
        assert_eq!(config.rate_limit.limit_for(RouteTier::Standard), 60);
        assert_eq!(config.scraper.timeout(), Duration::from_secs(60));
        assert_eq!(config.scraper.max_output_bytes, 8 * 1024 * 1024);
        assert!(!config.security.expose_error_details);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ttl_override() {
        let mut cache = CacheConfig::default();
        assert_eq!(cache.ttl_for(EndpointClass::Batch), Duration::from_secs(30));
        cache.ttl_overrides.insert("batch".to_string(), 5);
        assert_eq!(cache.ttl_for(EndpointClass::Batch), Duration::from_secs(5));
        assert_eq!(cache.ttl_for(EndpointClass::Quote), Duration::from_secs(15));
    }

    #[test]
    fn test_ttl_override_key_is_case_insensitive() {
        let mut config = AppConfig::default();
        config.cache.ttl_overrides.insert("Batch".to_string(), 7);
        config.cache.ttl_overrides.insert(" SEARCH ".to_string(), 9);
        assert!(config.validate().is_ok());
        assert_eq!(config.cache.ttl_for(EndpointClass::Batch), Duration::from_secs(7));
        assert_eq!(config.cache.ttl_for(EndpointClass::Search), Duration::from_secs(9));
        assert_eq!(config.cache.ttl_for(EndpointClass::Quote), Duration::from_secs(15));
    }

    #[test]
    fn test_validate_rejects_oversized_durations() {
        let mut config = AppConfig::default();
        config.scraper.timeout_secs = u64::MAX;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.scraper.timeout_secs = MAX_SCRAPER_TIMEOUT_SECS;
        assert!(config.validate().is_ok());

        let mut config = AppConfig::default();
        config.scraper.kill_grace_ms = u64::MAX;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.retry.max_attempts = u32::MAX;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.cache.ttl_overrides.insert("candles".to_string(), 5);
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.scraper.program = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial_toml_shape() {
        let json = serde_json::json!({
            "rate_limit": { "strict_limit": 5 },
            "cache": { "ttl_overrides": { "quote": 1 } }
        });
        let config: AppConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.rate_limit.strict_limit, 5);
        assert_eq!(config.rate_limit.standard_limit, 60);
        assert_eq!(config.cache.ttl_for(EndpointClass::Quote), Duration::from_secs(1));
    }
}
