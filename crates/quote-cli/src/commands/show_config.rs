//! 유효 설정 출력.

use anyhow::Result;
use quote_core::AppConfig;

/// 파일과 환경 변수를 합친 최종 설정을 JSON으로 직렬화합니다.
pub fn effective_config_json(config: &AppConfig) -> Result<String> {
    Ok(serde_json::to_string_pretty(config)?)
}
