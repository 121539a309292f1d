//! 로깅 초기화.
//!
//! 이 모듈은 tracing 기반 구조화 로깅을 설정합니다.

use crate::config::LoggingConfig;
use crate::error::{CoreError, CoreResult};
use std::str::FromStr;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// 로그 출력 형식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// 사람이 읽기 좋은 형식 (개발용)
    #[default]
    Pretty,
    /// JSON 형식 (운영용)
    Json,
    /// 간결한 한 줄 형식
    Compact,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 로그 레벨 필터 (예: "info", "marlin_core=debug,info")
    pub level: String,
    /// 출력 형식
    pub format: LogFormat,
    /// 스팬 종료 이벤트 기록 여부
    pub with_span_events: bool,
    /// 파일명/라인 번호 포함 여부
    pub with_file: bool,
    /// 타겟(모듈 경로) 포함 여부
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            with_span_events: false,
            with_file: false,
            with_target: true,
        }
    }
}

impl LogConfig {
    /// 환경 변수에서 로깅 설정을 읽습니다.
    ///
    /// `RUST_LOG`로 레벨을, `LOG_FORMAT`으로 형식을 지정합니다.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.level = level;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            if let Ok(parsed) = format.parse() {
                config.format = parsed;
            }
        }

        config
    }

    /// 애플리케이션 설정 섹션에서 로깅 설정을 만듭니다.
    pub fn from_app(config: &LoggingConfig) -> Self {
        Self {
            level: config.level.clone(),
            format: config.format.parse().unwrap_or_default(),
            ..Self::default()
        }
    }
}

/// 로깅을 초기화합니다.
///
/// `RUST_LOG` 환경 변수가 설정되어 있으면 설정의 레벨보다 우선합니다.
pub fn init_logging(config: &LogConfig) -> CoreResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let span_events = if config.with_span_events {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let fmt_layer = match config.format {
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .with_file(config.with_file)
            .with_target(config.with_target)
            .with_span_events(span_events)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_file(config.with_file)
            .with_target(config.with_target)
            .with_span_events(span_events)
            .boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_file(config.with_file)
            .with_target(config.with_target)
            .with_span_events(span_events)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| CoreError::InvalidConfig(format!("Failed to initialize logging: {}", e)))?;

    tracing::info!(
        level = %config.level,
        format = ?config.format,
        "Logging initialized"
    );

    Ok(())
}

/// 기본 설정으로 로깅을 초기화합니다. 이미 초기화된 경우 무시합니다.
pub fn init_default() {
    let _ = init_logging(&LogConfig::from_env());
}
