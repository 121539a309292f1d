//! 설정 관리.
//!
//! 이 모듈은 애플리케이션 설정을 정의하고 관리합니다.

use crate::domain::Balances;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 실행 모드 설정
    #[serde(default)]
    pub runner: RunnerConfig,
    /// 모의 거래 원장 설정
    #[serde(default)]
    pub paper: PaperConfig,
    /// 백테스트 설정
    #[serde(default)]
    pub backtest: BacktestConfig,
    /// 거래소별 엔드포인트 설정
    #[serde(default)]
    pub exchanges: HashMap<String, ExchangeEndpoints>,
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 로그 레벨
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

/// 실행 모드.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// 실거래소에 직접 주문
    Live,
    /// 실거래소 시세 + 모의 주문
    LiveTest,
    /// 과거 데이터 재생 + 모의 주문
    Backtest,
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "live" => Ok(RunMode::Live),
            "livetest" => Ok(RunMode::LiveTest),
            "backtest" => Ok(RunMode::Backtest),
            _ => Err(format!("Unknown run mode: {}", s)),
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::Live => write!(f, "live"),
            RunMode::LiveTest => write!(f, "livetest"),
            RunMode::Backtest => write!(f, "backtest"),
        }
    }
}

/// 실행 모드 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunnerConfig {
    /// 실행 모드
    #[serde(default = "default_mode")]
    pub mode: RunMode,
    /// 사용할 거래소 ID 목록
    #[serde(default = "default_exchange_ids")]
    pub exchange_ids: Vec<String>,
    /// 거래당 자본 비율
    #[serde(default = "default_trade_percent")]
    pub trade_percent: Decimal,
    /// 기준 법정 통화
    #[serde(default = "default_fiat_currency")]
    pub fiat_currency: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            exchange_ids: default_exchange_ids(),
            trade_percent: default_trade_percent(),
            fiat_currency: default_fiat_currency(),
        }
    }
}

fn default_mode() -> RunMode {
    RunMode::Backtest
}

fn default_exchange_ids() -> Vec<String> {
    vec!["kraken".to_string()]
}

fn default_trade_percent() -> Decimal {
    Decimal::new(5, 2)
}

fn default_fiat_currency() -> String {
    "GBP".to_string()
}

/// 모의 거래 원장 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaperConfig {
    /// 거래 수수료 (퍼센트, 0.1은 0.1%)
    #[serde(default = "default_paper_fee")]
    pub fee: Decimal,
    /// 초기 잔고 (자산 심볼 -> 수량)
    #[serde(default)]
    pub balances: Balances,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            fee: default_paper_fee(),
            balances: Balances::new(),
        }
    }
}

fn default_paper_fee() -> Decimal {
    Decimal::new(1, 1)
}

/// 백테스트 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BacktestConfig {
    /// 과거 데이터 CSV 디렉토리
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// 기본 캔들 간격 (예: "1m", "5m", "1h")
    #[serde(default = "default_interval")]
    pub interval: String,
    /// 최대 재생 스텝 수 (0 = 데이터 끝까지)
    #[serde(default)]
    pub max_steps: u64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            interval: default_interval(),
            max_steps: 0,
        }
    }
}

fn default_data_dir() -> String {
    "data/backtest".to_string()
}

fn default_interval() -> String {
    "5m".to_string()
}

/// 거래소별 엔드포인트 오버라이드.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ExchangeEndpoints {
    /// 이 거래소 활성화 여부
    #[serde(default)]
    pub enabled: bool,
    /// REST API 기본 URL 오버라이드
    #[serde(default)]
    pub rest_base_url: Option<String>,
    /// WebSocket URL 오버라이드
    #[serde(default)]
    pub ws_base_url: Option<String>,
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            // 기본값으로 시작
            .set_default("runner.fiat_currency", "GBP")?
            .set_default("runner.trade_percent", "0.05")?
            // 파일에서 로드
            .add_source(config::File::from(path.as_ref()))
            // 환경 변수로 오버라이드
            .add_source(
                config::Environment::with_prefix("MARLIN")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// 설정 파일이 있으면 로드하고, 없으면 기본값을 사용합니다.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if path.exists() {
            match Self::load(path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config {}: {}, using defaults", path.display(), e);
                }
            }
        } else {
            tracing::warn!("Config file {} not found, using defaults", path.display());
        }
        Self::default()
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> Result<Self, config::ConfigError> {
        Self::load("config/default.toml")
    }
}
