//! 백테스트 데이터 내비게이터.
//!
//! 미리 로드된 시계열을 결정적이고 단계적인 시계로 재생합니다. 벽시계
//! 시간은 전혀 사용하지 않으며 [`BacktestNavigator::increment_data`]가
//! 유일한 시간 전진 수단입니다.

use crate::error::ExchangeError;
use crate::traits::{ExchangeResult, PriceOracle};
use async_trait::async_trait;
use chrono::Duration;
use marlin_core::{
    OhlcvData, OhlcvInterval, OrderBookEntry, OrderBookSide, OrderBookState, TradablePair,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// 단일 거래 쌍의 검증된 과거 캔들 시계열.
///
/// 생성 시점에 데이터 품질을 검증합니다: 타임스탬프는 순증가해야 하고,
/// 인접 캔들 사이 간격은 기준 간격을 넘을 수 없습니다. 누락 구간은
/// 보간하지 않고 [`ExchangeError::InvalidData`]로 거부합니다.
#[derive(Debug, Clone)]
pub struct PairSeries {
    interval: OhlcvInterval,
    candles: Vec<OhlcvData>,
}

impl PairSeries {
    pub fn new(interval: OhlcvInterval, candles: Vec<OhlcvData>) -> ExchangeResult<Self> {
        if candles.is_empty() {
            return Err(ExchangeError::InvalidData(
                "candle series is empty".to_string(),
            ));
        }

        let max_gap = Duration::seconds(interval.as_secs() as i64);
        for window in candles.windows(2) {
            let gap = window[1].timestamp - window[0].timestamp;
            if gap <= Duration::zero() {
                return Err(ExchangeError::InvalidData(format!(
                    "timestamps not strictly increasing at {}",
                    window[1].timestamp
                )));
            }
            if gap > max_gap {
                return Err(ExchangeError::InvalidData(format!(
                    "gap of {}s before {} exceeds the {} base interval",
                    gap.num_seconds(),
                    window[1].timestamp,
                    interval
                )));
            }
        }

        Ok(Self { interval, candles })
    }

    pub fn interval(&self) -> OhlcvInterval {
        self.interval
    }

    pub fn candles(&self) -> &[OhlcvData] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }
}

/// 쌍별 시계열과 커서.
#[derive(Debug)]
struct PairState {
    series: PairSeries,
    cursor: usize,
}

/// 과거 데이터를 커서 기반으로 재생하는 내비게이터.
///
/// 모든 쌍의 커서는 0(첫 캔들)에서 시작하고 [`increment_data`](Self::increment_data)로만
/// 전진합니다. 조회는 항상 커서 위치 이하의 데이터만 보므로 미래 참조
/// (lookahead)가 구조적으로 불가능합니다. 커서는 절대 되돌아가지 않으며,
/// 데이터 끝을 지나는 전진은 [`ExchangeError::EndOfData`]로 종료됩니다.
#[derive(Debug)]
pub struct BacktestNavigator {
    states: RwLock<HashMap<TradablePair, PairState>>,
}

impl BacktestNavigator {
    pub fn new(series: HashMap<TradablePair, PairSeries>) -> ExchangeResult<Self> {
        if series.is_empty() {
            return Err(ExchangeError::InvalidData(
                "no pair series loaded".to_string(),
            ));
        }

        let states = series
            .into_iter()
            .map(|(pair, series)| (pair, PairState { series, cursor: 0 }))
            .collect();

        Ok(Self {
            states: RwLock::new(states),
        })
    }

    /// 로드된 거래 쌍 목록.
    pub async fn pairs(&self) -> Vec<TradablePair> {
        self.states.read().await.keys().cloned().collect()
    }

    /// 쌍의 현재 커서 위치 (0부터).
    pub async fn position(&self, pair: &TradablePair) -> Option<usize> {
        self.states.read().await.get(pair).map(|state| state.cursor)
    }

    /// 다음 전진이 [`ExchangeError::EndOfData`]가 되는지 확인합니다.
    pub async fn is_exhausted(&self) -> bool {
        self.states
            .read()
            .await
            .values()
            .any(|state| state.cursor + 1 >= state.series.len())
    }

    /// 모든 쌍의 커서를 정확히 한 스텝 전진시킵니다.
    ///
    /// 어느 한 쌍이라도 마지막 캔들을 지나게 되면 아무 커서도 움직이지
    /// 않고 [`ExchangeError::EndOfData`]를 반환합니다. 부분 전진은 없으며
    /// 쌍들의 커서는 항상 같은 스텝 수만큼 전진한 상태를 유지합니다.
    pub async fn increment_data(&self) -> ExchangeResult<()> {
        let mut states = self.states.write().await;

        if states
            .values()
            .any(|state| state.cursor + 1 >= state.series.len())
        {
            return Err(ExchangeError::EndOfData);
        }
        for state in states.values_mut() {
            state.cursor += 1;
        }
        Ok(())
    }

    /// 커서 위치 캔들의 종가.
    pub async fn get_price(&self, pair: &TradablePair) -> ExchangeResult<Decimal> {
        let states = self.states.read().await;
        let state = Self::lookup(&states, pair)?;
        Ok(state.series.candles()[state.cursor].close)
    }

    /// 커서에서 끝나는 최근 캔들을 최신 순으로 최대 `count`개 반환합니다.
    ///
    /// 커서 너머의 캔들은 절대 포함되지 않습니다.
    pub async fn get_ohlcv(
        &self,
        pair: &TradablePair,
        count: usize,
    ) -> ExchangeResult<Vec<OhlcvData>> {
        let states = self.states.read().await;
        let state = Self::lookup(&states, pair)?;

        let visible = &state.series.candles()[..=state.cursor];
        Ok(visible.iter().rev().take(count).cloned().collect())
    }

    /// 커서에서 끝나는 `window_secs` 길이 구간을 하나의 캔들로 병합합니다.
    ///
    /// 필요한 캔들 수는 `window_secs / 기준 간격 초`입니다. 커서가 아직
    /// 그만큼의 이력을 쌓지 못했으면 짧은 구간을 돌려주는 대신
    /// [`ExchangeError::InsufficientHistory`]를 반환합니다.
    pub async fn get_merged_ohlcv(
        &self,
        pair: &TradablePair,
        window_secs: u64,
    ) -> ExchangeResult<OhlcvData> {
        let states = self.states.read().await;
        let state = Self::lookup(&states, pair)?;

        let interval_secs = state.series.interval().as_secs();
        let requested = (window_secs / interval_secs) as usize;
        if requested == 0 {
            return Err(ExchangeError::InvalidData(format!(
                "merge window of {}s is shorter than the {} base interval",
                window_secs,
                state.series.interval()
            )));
        }

        let available = state.cursor + 1;
        if available < requested {
            return Err(ExchangeError::InsufficientHistory {
                requested,
                available,
            });
        }

        let window = &state.series.candles()[available - requested..available];
        OhlcvData::merge_all(window).map_err(|e| ExchangeError::InvalidData(e.to_string()))
    }

    /// 커서 위치의 호가창 스냅샷.
    ///
    /// 과거 데이터에는 호가 깊이가 없으므로 종가에 캔들 거래량을 실은
    /// 단일 레벨을 라이브 경로와 동일한 정규화 재구성에 태워 반환합니다.
    pub async fn get_order_book(
        &self,
        pair: &TradablePair,
        depth: usize,
    ) -> ExchangeResult<OrderBookState> {
        let states = self.states.read().await;
        let state = Self::lookup(&states, pair)?;
        let candle = &state.series.candles()[state.cursor];

        let asks = vec![OrderBookEntry::new(
            OrderBookSide::Ask,
            candle.close,
            candle.volume,
        )];
        let bids = vec![OrderBookEntry::new(
            OrderBookSide::Bid,
            candle.close,
            candle.volume,
        )];
        Ok(OrderBookState::reconstruct(asks, bids, depth))
    }

    /// 쌍의 기준 간격.
    pub async fn interval(&self, pair: &TradablePair) -> ExchangeResult<OhlcvInterval> {
        let states = self.states.read().await;
        Ok(Self::lookup(&states, pair)?.series.interval())
    }

    fn lookup<'a>(
        states: &'a HashMap<TradablePair, PairState>,
        pair: &TradablePair,
    ) -> ExchangeResult<&'a PairState> {
        states.get(pair).ok_or_else(|| {
            ExchangeError::InvalidData(format!("no historical data loaded for {}", pair))
        })
    }
}

#[async_trait]
impl PriceOracle for BacktestNavigator {
    async fn price(&self, pair: &TradablePair) -> ExchangeResult<Decimal> {
        self.get_price(pair).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use rust_decimal_macros::dec;

    fn btc_gbp() -> TradablePair {
        TradablePair::new("BTC", "GBP")
    }

    fn eth_gbp() -> TradablePair {
        TradablePair::new("ETH", "GBP")
    }

    /// 300초 간격(M5)으로 종가만 다른 캔들 목록을 만듭니다.
    fn candles_with_closes(closes: &[Decimal]) -> Vec<OhlcvData> {
        closes
            .iter()
            .enumerate()
            .map(|(i, close)| {
                OhlcvData::new(
                    DateTime::from_timestamp((i as i64 + 1) * 300, 0).unwrap(),
                    *close,
                    *close + dec!(1),
                    *close - dec!(1),
                    *close,
                    dec!(10),
                )
            })
            .collect()
    }

    fn navigator_with_closes(closes: &[Decimal]) -> BacktestNavigator {
        let series = PairSeries::new(OhlcvInterval::M5, candles_with_closes(closes)).unwrap();
        BacktestNavigator::new(HashMap::from([(btc_gbp(), series)])).unwrap()
    }

    #[test]
    fn test_series_rejects_gap() {
        let mut candles = candles_with_closes(&[dec!(10), dec!(20), dec!(30)]);
        // 두 번째와 세 번째 사이에 캔들 하나 누락
        candles[2].timestamp = DateTime::from_timestamp(1500, 0).unwrap();

        let err = PairSeries::new(OhlcvInterval::M5, candles).unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidData(_)));
    }

    #[test]
    fn test_series_rejects_disorder() {
        let mut candles = candles_with_closes(&[dec!(10), dec!(20)]);
        candles[1].timestamp = candles[0].timestamp;

        assert!(matches!(
            PairSeries::new(OhlcvInterval::M5, candles),
            Err(ExchangeError::InvalidData(_))
        ));
    }

    #[test]
    fn test_series_rejects_empty() {
        assert!(PairSeries::new(OhlcvInterval::M5, Vec::new()).is_err());
    }

    #[tokio::test]
    async fn test_cursor_starts_at_first_candle() {
        let navigator = navigator_with_closes(&[dec!(10), dec!(20), dec!(30)]);

        assert_eq!(navigator.position(&btc_gbp()).await, Some(0));
        assert_eq!(navigator.get_price(&btc_gbp()).await.unwrap(), dec!(10));
        assert!(!navigator.is_exhausted().await);
    }

    #[tokio::test]
    async fn test_increment_advances_every_pair() {
        let btc = PairSeries::new(
            OhlcvInterval::M5,
            candles_with_closes(&[dec!(10), dec!(20), dec!(30)]),
        )
        .unwrap();
        let eth = PairSeries::new(
            OhlcvInterval::M5,
            candles_with_closes(&[dec!(1), dec!(2), dec!(3)]),
        )
        .unwrap();
        let navigator =
            BacktestNavigator::new(HashMap::from([(btc_gbp(), btc), (eth_gbp(), eth)])).unwrap();

        navigator.increment_data().await.unwrap();

        assert_eq!(navigator.position(&btc_gbp()).await, Some(1));
        assert_eq!(navigator.position(&eth_gbp()).await, Some(1));
        assert_eq!(navigator.get_price(&btc_gbp()).await.unwrap(), dec!(20));
        assert_eq!(navigator.get_price(&eth_gbp()).await.unwrap(), dec!(2));
    }

    #[tokio::test]
    async fn test_increment_past_end_is_terminal() {
        let navigator = navigator_with_closes(&[dec!(10), dec!(20), dec!(30)]);

        navigator.increment_data().await.unwrap();
        navigator.increment_data().await.unwrap();
        assert!(navigator.is_exhausted().await);

        // 끝을 지나는 전진은 실패하고 커서는 그대로
        assert!(matches!(
            navigator.increment_data().await,
            Err(ExchangeError::EndOfData)
        ));
        assert_eq!(navigator.position(&btc_gbp()).await, Some(2));
        assert_eq!(navigator.get_price(&btc_gbp()).await.unwrap(), dec!(30));

        // 반복해도 동일
        assert!(matches!(
            navigator.increment_data().await,
            Err(ExchangeError::EndOfData)
        ));
    }

    #[tokio::test]
    async fn test_ohlcv_never_looks_ahead() {
        let navigator =
            navigator_with_closes(&[dec!(10), dec!(20), dec!(30), dec!(40), dec!(50)]);
        navigator.increment_data().await.unwrap();

        // 커서=1이므로 5개를 요청해도 2개만 보임
        let candles = navigator.get_ohlcv(&btc_gbp(), 5).await.unwrap();
        assert_eq!(candles.len(), 2);

        // 최신 우선
        assert_eq!(candles[0].close, dec!(20));
        assert_eq!(candles[1].close, dec!(10));
    }

    #[tokio::test]
    async fn test_merged_window_at_cursor() {
        let navigator = navigator_with_closes(&[dec!(10), dec!(20), dec!(30), dec!(40)]);
        navigator.increment_data().await.unwrap();
        navigator.increment_data().await.unwrap();

        // 커서=2, 900초 = M5 캔들 3개
        let merged = navigator.get_merged_ohlcv(&btc_gbp(), 900).await.unwrap();
        assert_eq!(merged.open, dec!(10));
        assert_eq!(merged.close, dec!(30));
        assert_eq!(merged.high, dec!(31));
        assert_eq!(merged.low, dec!(9));
        assert_eq!(merged.volume, dec!(30));
    }

    #[tokio::test]
    async fn test_merged_window_short_history_fails() {
        let navigator = navigator_with_closes(&[dec!(10), dec!(20), dec!(30), dec!(40)]);
        navigator.increment_data().await.unwrap();

        // 커서=1이면 2개뿐인데 4개 필요
        let err = navigator
            .get_merged_ohlcv(&btc_gbp(), 1200)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::InsufficientHistory {
                requested: 4,
                available: 2
            }
        ));
    }

    #[tokio::test]
    async fn test_order_book_single_level_at_close() {
        let navigator = navigator_with_closes(&[dec!(10), dec!(20)]);
        navigator.increment_data().await.unwrap();

        let book = navigator.get_order_book(&btc_gbp(), 5).await.unwrap();
        assert_eq!(book.depth(), 1);
        assert_eq!(book.best_ask().unwrap().price, dec!(20));
        assert_eq!(book.best_ask().unwrap().volume, dec!(10));
        assert_eq!(book.best_bid().unwrap().price, dec!(20));
    }

    #[tokio::test]
    async fn test_unknown_pair_is_invalid_data() {
        let navigator = navigator_with_closes(&[dec!(10)]);

        assert!(matches!(
            navigator.get_price(&eth_gbp()).await,
            Err(ExchangeError::InvalidData(_))
        ));
    }
}
