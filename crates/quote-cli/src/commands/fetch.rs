//! 단일 요청 수집.

use anyhow::Result;
use quote_core::FetchRequest;
use quote_data::DataService;
use serde_json::Value;
use tracing::info;

/// CLI에서 사용하는 클라이언트 식별자.
pub const CLI_CLIENT: &str = "cli";

/// 요청 한 건을 처리하고 페이로드를 반환합니다.
pub async fn fetch_once(service: &DataService, request: &FetchRequest) -> Result<Value> {
    let payload = service.fetch(request, CLI_CLIENT).await?;
    info!(endpoint = %request.endpoint, "Fetch completed");
    Ok(payload)
}
