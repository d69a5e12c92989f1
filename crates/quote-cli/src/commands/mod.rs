//! CLI 명령어 구현 모듈.

pub mod burst;
pub mod fetch;
pub mod show_config;

pub use burst::{run_burst, BurstReport};
pub use fetch::fetch_once;
pub use show_config::effective_config_json;
