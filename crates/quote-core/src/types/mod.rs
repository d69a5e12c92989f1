//! 시세 수집 계층 전반에서 사용되는 공통 타입.

mod cache_key;
mod endpoint;
mod symbol;

pub use cache_key::*;
pub use endpoint::*;
pub use symbol::*;
