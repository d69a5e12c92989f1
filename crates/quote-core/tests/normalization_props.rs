//! 심볼 정규화와 캐시 키의 속성 테스트.

use proptest::prelude::*;
use quote_core::{normalize_symbols, CacheKey, EndpointClass, FetchRequest};

fn symbol_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9.^=-]{1,16}"
}

proptest! {
    #[test]
    fn key_is_order_independent(symbols in prop::collection::vec(symbol_strategy(), 1..10)) {
        let mut reversed = symbols.clone();
        reversed.reverse();

        let a = FetchRequest::new(EndpointClass::Batch, symbols).normalize(50).unwrap();
        let b = FetchRequest::new(EndpointClass::Batch, reversed).normalize(50).unwrap();
        prop_assert_eq!(a.key, b.key);
    }

    #[test]
    fn key_is_case_insensitive(symbols in prop::collection::vec(symbol_strategy(), 1..10)) {
        let lower: Vec<String> = symbols.iter().map(|s| s.to_lowercase()).collect();
        let upper: Vec<String> = symbols.iter().map(|s| s.to_uppercase()).collect();

        let a = FetchRequest::new(EndpointClass::Quote, lower).normalize(50).unwrap();
        let b = FetchRequest::new(EndpointClass::Quote, upper).normalize(50).unwrap();
        prop_assert_eq!(a.key, b.key);
    }

    #[test]
    fn normalized_symbols_are_sorted_and_unique(
        symbols in prop::collection::vec(symbol_strategy(), 1..20)
    ) {
        let normalized = normalize_symbols(EndpointClass::Batch, &symbols, 50).unwrap();
        prop_assert!(normalized.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(normalized.iter().all(|s| s.chars().all(|c| !c.is_ascii_lowercase())));
    }

    #[test]
    fn duplicates_do_not_change_key(symbols in prop::collection::vec(symbol_strategy(), 1..10)) {
        let mut doubled = symbols.clone();
        doubled.extend(symbols.iter().cloned());

        let a = normalize_symbols(EndpointClass::Batch, &symbols, 50).unwrap();
        let b = normalize_symbols(EndpointClass::Batch, &doubled, 50).unwrap();
        prop_assert_eq!(
            CacheKey::new(EndpointClass::Batch, &a),
            CacheKey::new(EndpointClass::Batch, &b)
        );
    }
}

#[test]
fn sectors_key_ignores_input() {
    let a = FetchRequest::new(EndpointClass::Sectors, ["XLK"]).normalize(50).unwrap();
    let b = FetchRequest::new::<_, String>(EndpointClass::Sectors, Vec::new())
        .normalize(50)
        .unwrap();
    assert_eq!(a.key, b.key);
    assert_eq!(a.key.as_str(), "sectors:");
}
