//! Marlin 트레이딩 런타임 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 샘플 데이터를 만들고 백테스트 실행
//! marlin sample-data
//! marlin backtest
//!
//! # 실제 시세로 모의 거래 세션 실행
//! marlin paper -e kraken -p BTC/USD
//!
//! # 거래소 연결 상태 확인
//! marlin status -e coinbase -p BTC/USD
//! ```

use std::path::Path;

use clap::{Parser, Subcommand};
use marlin_core::{init_logging, AppConfig, LogConfig, OhlcvInterval, TradablePair};

mod commands;

use commands::backtest::run_backtest;
use commands::paper::run_paper;
use commands::sample::run_sample_data;
use commands::status::run_status;

#[derive(Parser)]
#[command(name = "marlin")]
#[command(about = "Marlin trading runtime - 멀티 거래소 트레이딩 런타임", long_about = None)]
#[command(version)]
struct Cli {
    /// 설정 파일 경로
    #[arg(short, long, default_value = "config/default.toml", global = true)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// CSV 캔들 데이터로 백테스트를 실행합니다
    Backtest {
        /// 캔들 CSV 디렉터리 (설정값 대체)
        #[arg(short, long)]
        data_dir: Option<String>,

        /// 최대 재생 스텝 수 (설정값 대체)
        #[arg(long)]
        steps: Option<u64>,
    },

    /// 실제 시세로 모의 거래 세션을 실행합니다
    Paper {
        /// 거래소 ID (기본: 설정의 첫 번째 거래소)
        #[arg(short, long)]
        exchange: Option<String>,

        /// 거래 페어 (예: BTC/USD)
        #[arg(short, long, default_value = "BTC/USD")]
        pair: String,

        /// 시세 폴링 주기 (초)
        #[arg(long, default_value = "5")]
        poll_secs: u64,
    },

    /// 거래소 연결 상태를 확인합니다
    Status {
        /// 거래소 ID (기본: 설정의 첫 번째 거래소)
        #[arg(short, long)]
        exchange: Option<String>,

        /// 거래 페어 (예: BTC/USD)
        #[arg(short, long, default_value = "BTC/USD")]
        pair: String,
    },

    /// 백테스트용 샘플 캔들 데이터를 생성합니다
    SampleData {
        /// 출력 디렉터리
        #[arg(short, long, default_value = "data/backtest")]
        dir: String,

        /// 쉼표로 구분한 페어 목록
        #[arg(short, long, default_value = "BTC/GBP,ETH/GBP")]
        pairs: String,

        /// 캔들 간격 (예: 1m, 5m, 1h)
        #[arg(short, long, default_value = "5m")]
        interval: String,

        /// 페어당 캔들 개수
        #[arg(long, default_value = "500")]
        candles: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::load_or_default(&cli.config);
    init_logging(&LogConfig::from_app(&config.logging))?;

    match cli.command {
        Commands::Backtest { data_dir, steps } => {
            run_backtest(config, data_dir, steps).await?;
        }
        Commands::Paper {
            exchange,
            pair,
            poll_secs,
        } => {
            let exchange_id = resolve_exchange_id(&config, exchange);
            let pair = parse_pair(&pair)?;
            run_paper(config, &exchange_id, &pair, poll_secs).await?;
        }
        Commands::Status { exchange, pair } => {
            let exchange_id = resolve_exchange_id(&config, exchange);
            let pair = parse_pair(&pair)?;
            run_status(&config, &exchange_id, &pair).await?;
        }
        Commands::SampleData {
            dir,
            pairs,
            interval,
            candles,
        } => {
            let pairs = pairs
                .split(',')
                .map(parse_pair)
                .collect::<anyhow::Result<Vec<_>>>()?;
            let interval = interval
                .parse::<OhlcvInterval>()
                .map_err(anyhow::Error::msg)?;
            run_sample_data(Path::new(&dir), &pairs, interval, candles)?;
        }
    }

    Ok(())
}

/// 명령줄 인자가 없으면 설정의 첫 번째 거래소 ID를 사용합니다.
fn resolve_exchange_id(config: &AppConfig, override_id: Option<String>) -> String {
    override_id.unwrap_or_else(|| {
        config
            .runner
            .exchange_ids
            .first()
            .cloned()
            .unwrap_or_else(|| "kraken".into())
    })
}

fn parse_pair(raw: &str) -> anyhow::Result<TradablePair> {
    raw.trim().parse::<TradablePair>().map_err(anyhow::Error::msg)
}
