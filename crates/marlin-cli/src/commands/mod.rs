//! CLI 명령어 구현 모듈.

pub mod backtest;
pub mod paper;
pub mod sample;
pub mod status;

use marlin_core::AppConfig;
use rust_decimal::Decimal;
use tracing::info;

/// 모의 원장 잔고가 비어 있으면 기준 법정 통화 10,000으로 시작합니다.
pub fn seed_paper_balances(config: &mut AppConfig) {
    if config.paper.balances.is_empty() {
        let fiat = config.runner.fiat_currency.clone();
        config
            .paper
            .balances
            .insert(fiat.clone(), Decimal::from(10_000));
        info!(currency = %fiat, "Seeded paper balance with 10000");
    }
}
