//! API 서버용 HTTP middleware.
//!
//! 요청 처리 파이프라인에 적용되는 middleware와 추출기 모듈.

mod client;
mod metrics;

pub use client::ClientIdentity;
pub use metrics::metrics_layer;
