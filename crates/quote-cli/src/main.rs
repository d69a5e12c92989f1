//! 시세 수집 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 단일 시세
//! quote fetch -e quote AAPL
//!
//! # 일괄 시세
//! quote fetch -e batch AAPL MSFT NVDA
//!
//! # 동일 요청 20개 동시 실행 후 메트릭 출력
//! quote burst -e batch -n 20 AAPL MSFT
//!
//! # 유효 설정 출력
//! quote --config config/default.toml config
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use quote_core::{
    init_logging, AppConfig, EndpointClass, FetchRequest, LogConfig, LogFormat, LogOutput,
};
use quote_data::DataService;
use tracing::error;

use quote_cli::commands::{effective_config_json, fetch_once, run_burst};

#[derive(Parser)]
#[command(name = "quote")]
#[command(about = "Quote feed CLI - 스크래퍼 기반 시세 수집 도구", long_about = None)]
#[command(version)]
struct Cli {
    /// 설정 파일 경로 (기본: QUOTE_CONFIG 환경변수 또는 config/default.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// 로그 레벨 (RUST_LOG가 우선)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 요청 한 건을 수집해 JSON으로 출력
    Fetch {
        /// 엔드포인트 (quote, intraday, daily, search, overview, sectors, batch)
        #[arg(short, long)]
        endpoint: EndpointClass,

        /// 심볼 또는 검색어
        symbols: Vec<String>,
    },

    /// 같은 요청을 동시에 여러 번 보내고 결과 요약 출력
    Burst {
        /// 엔드포인트
        #[arg(short, long)]
        endpoint: EndpointClass,

        /// 동시 요청 수
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,

        /// 심볼 또는 검색어
        symbols: Vec<String>,
    },

    /// 유효 설정 출력
    Config,
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    // stdout은 JSON 출력 전용
    let config = LogConfig::new(level)
        .with_format(LogFormat::Compact)
        .with_output(LogOutput::Stderr);
    init_logging(config).context("failed to initialize logging")
}

fn load_config(path: Option<String>) -> anyhow::Result<AppConfig> {
    let path = path
        .or_else(|| std::env::var("QUOTE_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());
    AppConfig::load(&path).with_context(|| format!("failed to load configuration from {}", path))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    let config = load_config(cli.config)?;

    match cli.command {
        Commands::Fetch { endpoint, symbols } => {
            let service = DataService::new(&config);
            let request = FetchRequest::new(endpoint, symbols);

            match fetch_once(&service, &request).await {
                Ok(payload) => println!("{}", serde_json::to_string_pretty(&payload)?),
                Err(e) => {
                    error!("Fetch failed: {}", e);
                    return Err(e);
                }
            }
        }

        Commands::Burst {
            endpoint,
            count,
            symbols,
        } => {
            let service = DataService::new(&config);
            let request = FetchRequest::new(endpoint, symbols);

            let report = run_burst(&service, &request, count).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Config => {
            println!("{}", effective_config_json(&config)?);
        }
    }

    Ok(())
}
