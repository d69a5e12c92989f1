//! 심볼 정규화.
//!
//! 같은 심볼 집합을 다른 순서나 대소문자로 요청해도 동일한 캐시 키가
//! 만들어지도록 입력을 정리합니다.

use std::collections::BTreeSet;

use crate::error::{FetchError, FetchResult};
use crate::types::{EndpointClass, SymbolArity};

/// 요청당 기본 최대 심볼 수.
pub const DEFAULT_MAX_SYMBOLS: usize = 50;

/// 심볼 최대 길이.
pub const MAX_SYMBOL_LEN: usize = 16;

/// 검색 질의 최대 길이.
pub const MAX_QUERY_LEN: usize = 64;

/// 심볼로 허용되는 문자인지 확인합니다.
fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '^' | '=' | '-')
}

/// 단일 심볼이 형식에 맞는지 검사합니다.
pub fn is_valid_symbol(symbol: &str) -> bool {
    !symbol.is_empty() && symbol.len() <= MAX_SYMBOL_LEN && symbol.chars().all(is_symbol_char)
}

fn is_valid_query(query: &str) -> bool {
    let len = query.chars().count();
    len > 0 && len <= MAX_QUERY_LEN && query.chars().all(|c| !c.is_control())
}

/// 엔드포인트 규칙에 따라 심볼 목록을 정규화합니다.
///
/// 공백 제거, 빈 항목 제거, 대문자 변환(검색 제외), 중복 제거, 정렬 순으로
/// 처리한 뒤 엔드포인트의 심볼 개수 규칙을 검사합니다. `sectors`는 심볼을
/// 받지 않으므로 입력과 무관하게 빈 목록을 반환합니다.
pub fn normalize_symbols<S: AsRef<str>>(
    endpoint: EndpointClass,
    raw: &[S],
    max_symbols: usize,
) -> FetchResult<Vec<String>> {
    let arity = endpoint.arity();
    if arity == SymbolArity::None {
        return Ok(Vec::new());
    }

    let set: BTreeSet<String> = raw
        .iter()
        .map(|s| s.as_ref().trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            if endpoint.takes_query() {
                s.to_string()
            } else {
                s.to_uppercase()
            }
        })
        .collect();

    if set.is_empty() {
        return Err(FetchError::InvalidRequest(format!(
            "{} requires at least one symbol",
            endpoint
        )));
    }

    if arity == SymbolArity::One && set.len() != 1 {
        return Err(FetchError::InvalidRequest(format!(
            "{} accepts exactly one symbol, got {}",
            endpoint,
            set.len()
        )));
    }

    if set.len() > max_symbols {
        return Err(FetchError::InvalidRequest(format!(
            "Too many symbols: {} (max {})",
            set.len(),
            max_symbols
        )));
    }

    for entry in &set {
        let valid = if endpoint.takes_query() {
            is_valid_query(entry)
        } else {
            is_valid_symbol(entry)
        };
        if !valid {
            return Err(FetchError::InvalidRequest(format!(
                "Invalid symbol format: {}",
                entry
            )));
        }
    }

    Ok(set.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_sorts_and_dedupes() {
        let symbols =
            normalize_symbols(EndpointClass::Batch, &[" bbb", "AAA", "aaa", ""], 50).unwrap();
        assert_eq!(symbols, vec!["AAA".to_string(), "BBB".to_string()]);
    }

    #[test]
    fn test_search_keeps_case() {
        let symbols = normalize_symbols(EndpointClass::Search, &["  Apple Inc "], 50).unwrap();
        assert_eq!(symbols, vec!["Apple Inc".to_string()]);
    }

    #[test]
    fn test_sectors_ignores_symbols() {
        let symbols = normalize_symbols(EndpointClass::Sectors, &["XLK", "XLF"], 50).unwrap();
        assert!(symbols.is_empty());
    }

    #[test]
    fn test_arity_violations() {
        assert!(matches!(
            normalize_symbols::<&str>(EndpointClass::Quote, &[], 50),
            Err(FetchError::InvalidRequest(_))
        ));
        assert!(matches!(
            normalize_symbols(EndpointClass::Daily, &["AAPL", "MSFT"], 50),
            Err(FetchError::InvalidRequest(_))
        ));
        // 중복 제거 후 하나면 허용
        assert!(normalize_symbols(EndpointClass::Daily, &["aapl", "AAPL"], 50).is_ok());
    }

    #[test]
    fn test_symbol_format_and_limit() {
        assert!(is_valid_symbol("BRK.B"));
        assert!(is_valid_symbol("^GSPC"));
        assert!(is_valid_symbol("EURUSD=X"));
        assert!(!is_valid_symbol("AA PL"));
        assert!(!is_valid_symbol("SEVENTEENCHARSXXX"));

        assert!(normalize_symbols(EndpointClass::Quote, &["A;B"], 50).is_err());
        assert!(normalize_symbols(EndpointClass::Quote, &["A", "B", "C"], 2).is_err());
    }
}
