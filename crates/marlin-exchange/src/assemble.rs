//! 실행 모드별 거래소 조립.
//!
//! 설정된 실행 모드에 따라 커넥터를 그대로 쓰거나(LIVE), 모의 원장으로
//! 감싸거나(LIVETEST), 과거 데이터 재생기로 대체합니다(BACKTEST).
//! 호출자는 어느 모드든 동일한 [`Exchange`] 인터페이스를 받습니다.

use crate::backtest::{load_csv_dir, BacktestExchange, BacktestNavigator};
use crate::connector::{CoinbaseClient, CoinbaseConfig, KrakenClient, KrakenConfig};
use crate::error::ExchangeError;
use crate::paper::PaperExchange;
use crate::traits::{Exchange, ExchangeResult};
use marlin_core::{AppConfig, OhlcvInterval, PaperConfig, RunMode};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// LIVE 모드: 커넥터를 그대로 사용합니다. 주문이 실제로 나갑니다.
pub fn assemble_live(connector: Arc<dyn Exchange>) -> Arc<dyn Exchange> {
    connector
}

/// LIVETEST 모드: 시장 데이터는 실거래소, 주문은 모의 원장.
pub fn assemble_live_test(connector: Arc<dyn Exchange>, paper: &PaperConfig) -> Arc<dyn Exchange> {
    Arc::new(PaperExchange::new(connector, paper))
}

/// BACKTEST 모드: 과거 데이터 재생기 + 모의 원장.
pub fn assemble_back_test(
    navigator: Arc<BacktestNavigator>,
    paper: &PaperConfig,
) -> Arc<BacktestExchange> {
    Arc::new(BacktestExchange::new(navigator, paper))
}

/// 설정과 거래소 ID로 완성된 거래소를 조립합니다.
///
/// LIVE/LIVETEST는 `id`에 해당하는 커넥터를 만들고 모드의 데코레이터를
/// 적용합니다. BACKTEST는 커넥터 대신 설정된 CSV 디렉토리에서 재생기를
/// 만듭니다.
///
/// # Errors
/// - 알 수 없는 거래소 ID는 `NotSupported`
/// - 백테스트 데이터 로드 실패는 `InvalidData`
pub fn assemble_exchange(config: &AppConfig, id: &str) -> ExchangeResult<Arc<dyn Exchange>> {
    let mode = config.runner.mode;
    info!(mode = %mode, exchange = id, "Assembling exchange");

    match mode {
        RunMode::Live => Ok(assemble_live(build_connector(config, id)?)),
        RunMode::LiveTest => Ok(assemble_live_test(
            build_connector(config, id)?,
            &config.paper,
        )),
        RunMode::Backtest => {
            let navigator = build_navigator(config)?;
            Ok(assemble_back_test(navigator, &config.paper) as Arc<dyn Exchange>)
        }
    }
}

/// 설정에서 백테스트 재생기를 만듭니다.
pub fn build_navigator(config: &AppConfig) -> ExchangeResult<Arc<BacktestNavigator>> {
    let interval = config
        .backtest
        .interval
        .parse::<OhlcvInterval>()
        .map_err(ExchangeError::InvalidData)?;
    let series = load_csv_dir(Path::new(&config.backtest.data_dir), interval)?;
    Ok(Arc::new(BacktestNavigator::new(series)?))
}

/// ID에 해당하는 커넥터를 만듭니다. 설정의 엔드포인트 오버라이드가
/// 적용되며, 자격 증명은 환경 변수에서 읽습니다.
pub fn build_connector(config: &AppConfig, id: &str) -> ExchangeResult<Arc<dyn Exchange>> {
    let rest_override = config
        .exchanges
        .get(id)
        .and_then(|e| e.rest_base_url.clone());

    match id {
        "kraken" => {
            let mut cfg = KrakenConfig::from_env().unwrap_or_else(KrakenConfig::public_only);
            if let Some(url) = rest_override {
                cfg = cfg.with_base_url(url);
            }
            Ok(Arc::new(KrakenClient::new(cfg)?))
        }
        "coinbase" => {
            let mut cfg = CoinbaseConfig::from_env().unwrap_or_else(CoinbaseConfig::public_only);
            if let Some(url) = rest_override {
                cfg = cfg.with_base_url(url);
            }
            Ok(Arc::new(CoinbaseClient::new(cfg)?))
        }
        other => Err(ExchangeError::NotSupported(format!(
            "exchange id {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marlin_core::Balances;
    use rust_decimal_macros::dec;
    use std::fs;

    fn config_for(mode: RunMode) -> AppConfig {
        let mut config = AppConfig::default();
        config.runner.mode = mode;
        config.paper.fee = dec!(0.1);
        config.paper.balances = Balances::from([("GBP".to_string(), dec!(100))]);
        config
    }

    #[test]
    fn test_live_is_pass_through() {
        let exchange = assemble_exchange(&config_for(RunMode::Live), "kraken").unwrap();
        assert_eq!(exchange.name(), "kraken");
    }

    #[test]
    fn test_live_test_wraps_with_paper() {
        let exchange = assemble_exchange(&config_for(RunMode::LiveTest), "coinbase").unwrap();
        assert_eq!(exchange.name(), "coinbase-paper");
    }

    #[test]
    fn test_unknown_exchange_id() {
        let err = assemble_exchange(&config_for(RunMode::Live), "mtgox").unwrap_err();
        assert!(matches!(err, ExchangeError::NotSupported(_)));
    }

    #[test]
    fn test_bad_backtest_interval() {
        let mut config = config_for(RunMode::Backtest);
        config.backtest.interval = "7m".to_string();

        let err = assemble_exchange(&config, "kraken").unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidData(_)));
    }

    #[tokio::test]
    async fn test_backtest_assembly_from_csv() {
        let dir = std::env::temp_dir().join(format!("marlin-assemble-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("BTC_GBP.csv"),
            "timestamp,open,high,low,close,volume\n\
             300,10,11,9,10,5\n\
             600,10,12,10,11,5\n",
        )
        .unwrap();

        let mut config = config_for(RunMode::Backtest);
        config.backtest.data_dir = dir.to_string_lossy().into_owned();
        config.backtest.interval = "5m".to_string();

        let exchange = assemble_exchange(&config, "kraken").unwrap();
        assert_eq!(exchange.name(), "backtest");
        assert_eq!(exchange.get_tradable_pairs().await.unwrap().len(), 1);
        assert_eq!(exchange.get_balances().await.unwrap()["GBP"], dec!(100));

        fs::remove_dir_all(&dir).ok();
    }
}
