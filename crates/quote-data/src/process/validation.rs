//! 스크래퍼 출력 검증.
//!
//! 엔드포인트별 규칙으로 레코드를 검사합니다. 배열 형태의 결과는 잘못된
//! 항목만 걸러내고 `count`를 다시 계산하며, 남는 항목이 없으면
//! `NoValidData`를 반환합니다.

use quote_core::{EndpointClass, FetchError, FetchResult};
use serde_json::{Map, Value};
use tracing::debug;

/// 값의 참/거짓 판정. `null`, `false`, `0`, 빈 문자열/배열/객체는 거짓.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn has_error_marker(record: &Map<String, Value>) -> bool {
    record.get("error").map(is_truthy).unwrap_or(false)
}

fn non_empty_str(record: &Map<String, Value>, field: &str) -> bool {
    matches!(record.get(field), Some(Value::String(s)) if !s.is_empty())
}

/// 시세 레코드: 비어 있지 않은 `symbol`, 양수 `price`, 에러 표시 없음.
pub fn is_valid_quote(record: &Value) -> bool {
    let Some(record) = record.as_object() else {
        return false;
    };
    let price_ok = record
        .get("price")
        .and_then(Value::as_f64)
        .map(|price| price > 0.0)
        .unwrap_or(false);

    non_empty_str(record, "symbol") && price_ok && !has_error_marker(record)
}

/// 기업 개요 레코드: 비어 있지 않은 `symbol`과 `company_name`, 에러 표시 없음.
pub fn is_valid_overview(record: &Value) -> bool {
    let Some(record) = record.as_object() else {
        return false;
    };
    non_empty_str(record, "symbol")
        && non_empty_str(record, "company_name")
        && !has_error_marker(record)
}

/// 검색 결과 항목: 비어 있지 않은 `symbol`.
pub fn is_valid_search_result(record: &Value) -> bool {
    record
        .as_object()
        .map(|record| non_empty_str(record, "symbol"))
        .unwrap_or(false)
}

/// 배열 필드를 걸러내고 `count`를 갱신합니다. 반환값은 남은 항목 수.
fn filter_array(
    payload: &mut Map<String, Value>,
    field: &str,
    is_valid: fn(&Value) -> bool,
) -> Option<usize> {
    let Some(Value::Array(items)) = payload.get_mut(field) else {
        return None;
    };
    let before = items.len();
    items.retain(is_valid);
    let kept = items.len();
    if kept != before {
        debug!(field, dropped = before - kept, kept, "Dropped invalid records");
    }
    payload.insert("count".to_string(), Value::from(kept));
    Some(kept)
}

/// 배열 필드가 없을 때: 에러 표시가 있으면 `NoValidData`, 아니면 구조 오류.
fn missing_array(payload: &Map<String, Value>, field: &str) -> FetchError {
    if has_error_marker(payload) {
        FetchError::NoValidData(error_text(payload))
    } else {
        FetchError::MalformedOutput(format!("missing `{}` array", field))
    }
}

fn error_text(payload: &Map<String, Value>) -> String {
    match payload.get("error") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "no records passed validation".to_string(),
    }
}

fn require_filtered(
    payload: &mut Map<String, Value>,
    field: &str,
    is_valid: fn(&Value) -> bool,
) -> FetchResult<()> {
    match filter_array(payload, field, is_valid) {
        Some(0) => Err(FetchError::NoValidData(format!(
            "no valid records in `{}`",
            field
        ))),
        Some(_) => Ok(()),
        None => Err(missing_array(payload, field)),
    }
}

/// 시계열/검색 응답: 에러 표시와 빈 배열이 함께 오면 `NoValidData`.
fn check_series(payload: &Map<String, Value>, field: &str) -> FetchResult<()> {
    match payload.get(field) {
        Some(Value::Array(items)) => {
            if items.is_empty() && has_error_marker(payload) {
                Err(FetchError::NoValidData(error_text(payload)))
            } else {
                Ok(())
            }
        }
        _ => Err(missing_array(payload, field)),
    }
}

/// 엔드포인트 규칙으로 스크래퍼 출력을 검증하고 정리된 페이로드를 반환합니다.
pub fn validate_payload(endpoint: EndpointClass, payload: Value) -> FetchResult<Value> {
    let Value::Object(mut payload) = payload else {
        return Err(FetchError::MalformedOutput(
            "scraper output is not a JSON object".to_string(),
        ));
    };

    match endpoint {
        EndpointClass::Batch => require_filtered(&mut payload, "results", is_valid_quote)?,
        EndpointClass::Quote => {
            // 다중 심볼 quote는 batch 형태로 응답
            if payload.contains_key("results") {
                require_filtered(&mut payload, "results", is_valid_quote)?;
            } else if !is_valid_quote(&Value::Object(payload.clone())) {
                return Err(FetchError::NoValidData(error_text(&payload)));
            }
        }
        EndpointClass::Overview => {
            if !is_valid_overview(&Value::Object(payload.clone())) {
                return Err(FetchError::NoValidData(error_text(&payload)));
            }
        }
        EndpointClass::Sectors => require_filtered(&mut payload, "sectors", is_valid_quote)?,
        EndpointClass::Intraday | EndpointClass::Daily => check_series(&payload, "data")?,
        EndpointClass::Search => {
            check_series(&payload, "results")?;
            // 빈 결과는 정상이지만, 결과가 있었는데 모두 걸러지면 실패
            let had_results = payload
                .get("results")
                .and_then(Value::as_array)
                .is_some_and(|items| !items.is_empty());
            if had_results {
                require_filtered(&mut payload, "results", is_valid_search_result)?;
            } else {
                filter_array(&mut payload, "results", is_valid_search_result);
            }
        }
    }

    Ok(Value::Object(payload))
}
