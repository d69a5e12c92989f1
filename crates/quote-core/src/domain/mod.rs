//! 시세 수집 운영을 위한 도메인 모델.

mod job;
mod metrics;
mod request;

pub use job::*;
pub use metrics::*;
pub use request::*;
