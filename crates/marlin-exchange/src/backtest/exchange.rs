//! 내비게이터와 모의 원장을 결합한 백테스트 거래소.

use crate::backtest::navigator::BacktestNavigator;
use crate::error::ExchangeError;
use crate::paper::PaperTrader;
use crate::traits::{Exchange, ExchangeResult, PriceOracle};
use async_trait::async_trait;
use marlin_core::{
    Balances, ExchangeStatus, OhlcvData, OhlcvInterval, OrderBookState, OrderDescription,
    PaperConfig, TradablePair, TradeDescription,
};
use rust_decimal::Decimal;
use std::sync::Arc;

/// 과거 데이터만으로 거래소 계약 전체를 제공하는 구현.
///
/// 시장 데이터는 내비게이터 커서에서, 주문과 잔고는 모의 원장에서
/// 나옵니다. [`advance`](Self::advance)가 시계를 한 스텝 전진시키고 그
/// 시점 가격으로 미체결 주문을 재평가합니다.
pub struct BacktestExchange {
    navigator: Arc<BacktestNavigator>,
    trader: PaperTrader,
}

impl BacktestExchange {
    pub fn new(navigator: Arc<BacktestNavigator>, config: &PaperConfig) -> Self {
        let oracle = Arc::clone(&navigator) as Arc<dyn PriceOracle>;
        Self {
            trader: PaperTrader::new(config, oracle),
            navigator,
        }
    }

    /// 백테스트 시계를 한 틱 전진시킵니다.
    ///
    /// 모든 쌍의 커서를 한 스텝 옮긴 뒤 새 가격으로 미체결 주문을
    /// 재평가하며, 이번 틱에 체결된 주문 목록을 반환합니다. 데이터 끝에
    /// 도달하면 [`ExchangeError::EndOfData`]로 종료됩니다.
    pub async fn advance(&self) -> ExchangeResult<Vec<OrderDescription>> {
        self.navigator.increment_data().await?;
        self.trader.fill_open_orders().await
    }

    /// 다음 전진이 데이터 끝을 지나게 되는지 확인합니다.
    pub async fn is_exhausted(&self) -> bool {
        self.navigator.is_exhausted().await
    }

    /// 내부 내비게이터 핸들.
    pub fn navigator(&self) -> &BacktestNavigator {
        &self.navigator
    }
}

#[async_trait]
impl Exchange for BacktestExchange {
    fn name(&self) -> &str {
        "backtest"
    }

    async fn get_status(&self) -> ExchangeResult<ExchangeStatus> {
        Ok(ExchangeStatus::Online)
    }

    async fn get_tradable_pairs(&self) -> ExchangeResult<Vec<TradablePair>> {
        Ok(self.navigator.pairs().await)
    }

    async fn get_24h_stats(&self, pair: &TradablePair) -> ExchangeResult<OhlcvData> {
        self.navigator.get_merged_ohlcv(pair, 86_400).await
    }

    /// 커서까지의 캔들을 요청 간격으로 반환합니다.
    ///
    /// 기준 간격 그대로면 통과시키고, 기준의 정수 배수면 커서에서 끝나는
    /// 완전한 그룹들을 병합해 만듭니다. 그 외 간격은 지원하지 않습니다.
    async fn get_ohlcv(
        &self,
        pair: &TradablePair,
        interval: OhlcvInterval,
        count: usize,
    ) -> ExchangeResult<Vec<OhlcvData>> {
        let base = self.navigator.interval(pair).await?;
        if interval == base {
            return self.navigator.get_ohlcv(pair, count).await;
        }
        if interval.as_secs() % base.as_secs() != 0 {
            return Err(ExchangeError::NotSupported(format!(
                "{} candles from {} base data",
                interval, base
            )));
        }

        let factor = (interval.as_secs() / base.as_secs()) as usize;
        let base_candles = self.navigator.get_ohlcv(pair, count * factor).await?;

        let mut merged = Vec::new();
        for chunk in base_candles.chunks(factor) {
            // 꼬리의 불완전한 그룹은 버림
            if chunk.len() < factor {
                break;
            }
            let ascending: Vec<OhlcvData> = chunk.iter().rev().cloned().collect();
            let candle = OhlcvData::merge_all(&ascending)
                .map_err(|e| ExchangeError::InvalidData(e.to_string()))?;
            merged.push(candle);
        }
        Ok(merged)
    }

    async fn get_price(&self, pair: &TradablePair) -> ExchangeResult<Decimal> {
        self.navigator.get_price(pair).await
    }

    async fn get_order_book(
        &self,
        pair: &TradablePair,
        depth: usize,
    ) -> ExchangeResult<OrderBookState> {
        self.navigator.get_order_book(pair, depth).await
    }

    async fn get_fee(&self, _pair: &TradablePair) -> ExchangeResult<Decimal> {
        Ok(self.trader.fee().await)
    }

    async fn get_balances(&self) -> ExchangeResult<Balances> {
        Ok(self.trader.balances().await)
    }

    async fn get_open_orders(&self) -> ExchangeResult<Vec<OrderDescription>> {
        Ok(self.trader.open_orders().await)
    }

    async fn get_closed_orders(&self) -> ExchangeResult<Vec<OrderDescription>> {
        Ok(self.trader.closed_orders().await)
    }

    async fn add_order(&self, trade: &TradeDescription) -> ExchangeResult<String> {
        self.trader.add_order(trade).await
    }

    async fn cancel_order(&self, order_id: &str) -> ExchangeResult<()> {
        self.trader.cancel_order(order_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::navigator::PairSeries;
    use chrono::DateTime;
    use marlin_core::{OrderType, TradeAction};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn btc_gbp() -> TradablePair {
        TradablePair::new("BTC", "GBP")
    }

    fn candles_with_closes(interval: OhlcvInterval, closes: &[Decimal]) -> Vec<OhlcvData> {
        let step = interval.as_secs() as i64;
        closes
            .iter()
            .enumerate()
            .map(|(i, close)| {
                OhlcvData::new(
                    DateTime::from_timestamp((i as i64 + 1) * step, 0).unwrap(),
                    *close,
                    *close + dec!(1),
                    *close - dec!(1),
                    *close,
                    dec!(10),
                )
            })
            .collect()
    }

    fn backtest_exchange(interval: OhlcvInterval, closes: &[Decimal]) -> BacktestExchange {
        let series = PairSeries::new(interval, candles_with_closes(interval, closes)).unwrap();
        let navigator =
            Arc::new(BacktestNavigator::new(HashMap::from([(btc_gbp(), series)])).unwrap());
        let config = PaperConfig {
            fee: dec!(0.1),
            balances: Balances::from([
                ("GBP".to_string(), dec!(100)),
                ("BTC".to_string(), dec!(1.5)),
            ]),
        };
        BacktestExchange::new(navigator, &config)
    }

    #[tokio::test]
    async fn test_limit_order_fills_as_clock_advances() {
        let exchange =
            backtest_exchange(OhlcvInterval::M5, &[dec!(40), dec!(30), dec!(20), dec!(10)]);

        let trade = TradeDescription::new(
            OrderType::Limit,
            btc_gbp(),
            TradeAction::Buy,
            dec!(20.0),
            dec!(2.0),
        );
        let id = exchange.add_order(&trade).await.unwrap();
        assert_eq!(id, "1");
        assert_eq!(exchange.get_open_orders().await.unwrap().len(), 1);

        // 40 -> 30: 아직 지정가 위
        assert!(exchange.advance().await.unwrap().is_empty());

        // 30 -> 20: 체결
        let filled = exchange.advance().await.unwrap();
        assert_eq!(filled.len(), 1);
        assert_eq!(filled[0].order_id, "1");

        let balances = exchange.get_balances().await.unwrap();
        assert_eq!(balances["GBP"], dec!(59.96));
        assert_eq!(balances["BTC"], dec!(3.5));

        // 20 -> 10: 남은 주문 없음, 이후 데이터 끝
        assert!(exchange.advance().await.unwrap().is_empty());
        assert!(exchange.is_exhausted().await);
        assert!(matches!(
            exchange.advance().await,
            Err(ExchangeError::EndOfData)
        ));
    }

    #[tokio::test]
    async fn test_ohlcv_resamples_to_multiples_of_base() {
        let exchange =
            backtest_exchange(OhlcvInterval::M5, &[dec!(10), dec!(20), dec!(30), dec!(40)]);
        exchange.navigator().increment_data().await.unwrap();
        exchange.navigator().increment_data().await.unwrap();
        exchange.navigator().increment_data().await.unwrap();

        // 기준 간격은 그대로 통과
        let base = exchange
            .get_ohlcv(&btc_gbp(), OhlcvInterval::M5, 2)
            .await
            .unwrap();
        assert_eq!(base.len(), 2);
        assert_eq!(base[0].close, dec!(40));

        // 3배 간격: 커서에서 끝나는 완전한 그룹 하나만
        let merged = exchange
            .get_ohlcv(&btc_gbp(), OhlcvInterval::M15, 5)
            .await
            .unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].open, dec!(20));
        assert_eq!(merged[0].close, dec!(40));
        assert_eq!(merged[0].volume, dec!(30));

        // 배수가 아닌 간격은 거부
        assert!(matches!(
            exchange.get_ohlcv(&btc_gbp(), OhlcvInterval::M1, 5).await,
            Err(ExchangeError::NotSupported(_))
        ));
    }

    #[tokio::test]
    async fn test_24h_stats_requires_a_full_day() {
        let exchange = backtest_exchange(OhlcvInterval::M5, &[dec!(10), dec!(20)]);

        let err = exchange.get_24h_stats(&btc_gbp()).await.unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::InsufficientHistory {
                requested: 288,
                available: 1
            }
        ));
    }

    #[tokio::test]
    async fn test_market_data_surface() {
        let exchange = backtest_exchange(OhlcvInterval::M5, &[dec!(10), dec!(20)]);

        assert_eq!(exchange.name(), "backtest");
        assert_eq!(exchange.get_status().await.unwrap(), ExchangeStatus::Online);
        assert_eq!(exchange.get_tradable_pairs().await.unwrap(), vec![btc_gbp()]);
        assert_eq!(exchange.get_price(&btc_gbp()).await.unwrap(), dec!(10));
        assert_eq!(exchange.get_fee(&btc_gbp()).await.unwrap(), dec!(0.1));

        let book = exchange.get_order_book(&btc_gbp(), 3).await.unwrap();
        assert_eq!(book.depth(), 1);
        assert_eq!(book.best_ask().unwrap().price, dec!(10));
    }
}
