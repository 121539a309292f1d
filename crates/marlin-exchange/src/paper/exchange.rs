//! 모의 거래 실행기와 LIVETEST 데코레이터.

use crate::paper::ledger::PaperLedger;
use crate::traits::{Exchange, ExchangeOracle, ExchangeResult, PriceOracle};
use async_trait::async_trait;
use marlin_core::{
    Balances, ExchangeStatus, OhlcvData, OhlcvInterval, OrderBookState, OrderDescription,
    PaperConfig, TradablePair, TradeDescription,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// 가격 오라클과 모의 원장을 묶은 비동기 실행기.
///
/// 주문 접수와 미체결 재평가가 하나의 뮤텍스를 공유하므로 주문 상태
/// 변경은 단일 임계 구역에서 일어납니다.
pub struct PaperTrader {
    ledger: Mutex<PaperLedger>,
    oracle: Arc<dyn PriceOracle>,
}

impl PaperTrader {
    pub fn new(config: &PaperConfig, oracle: Arc<dyn PriceOracle>) -> Self {
        Self {
            ledger: Mutex::new(PaperLedger::from_config(config)),
            oracle,
        }
    }

    /// 설정된 수수료 (퍼센트).
    pub async fn fee(&self) -> Decimal {
        self.ledger.lock().await.fee()
    }

    /// 현재 잔고 사본을 반환합니다.
    pub async fn balances(&self) -> Balances {
        self.ledger.lock().await.balances().clone()
    }

    /// 미체결 주문을 반환합니다.
    pub async fn open_orders(&self) -> Vec<OrderDescription> {
        self.ledger.lock().await.open_orders()
    }

    /// 체결 완료된 주문을 반환합니다.
    pub async fn closed_orders(&self) -> Vec<OrderDescription> {
        self.ledger.lock().await.closed_orders().to_vec()
    }

    /// 주문을 접수합니다.
    ///
    /// 현재 가격을 오라클에서 읽은 뒤 원장에 위임합니다. 오라클 실패는
    /// 그대로 전파되며 주문은 기록되지 않습니다.
    pub async fn add_order(&self, trade: &TradeDescription) -> ExchangeResult<String> {
        let oracle_price = self.oracle.price(&trade.pair).await?;

        let mut ledger = self.ledger.lock().await;
        let order_id = ledger.add_order(trade, oracle_price)?;
        info!(
            order_id = %order_id,
            pair = %trade.pair,
            action = %trade.action,
            volume = %trade.volume,
            "Paper order accepted"
        );
        Ok(order_id)
    }

    /// 미체결 주문을 취소합니다.
    pub async fn cancel_order(&self, order_id: &str) -> ExchangeResult<()> {
        self.ledger.lock().await.cancel_order(order_id)
    }

    /// 미체결 주문 전체를 현재 오라클 가격으로 재평가합니다.
    ///
    /// 가격 조회는 잠금 밖에서 수행하고 상태 변경은 잠금 안에서
    /// 일어납니다. 조회 사이에 새로 접수된 주문은 다음 재평가 때
    /// 처리됩니다.
    pub async fn fill_open_orders(&self) -> ExchangeResult<Vec<OrderDescription>> {
        let pairs = self.ledger.lock().await.open_pairs();
        if pairs.is_empty() {
            return Ok(Vec::new());
        }

        let mut prices = HashMap::new();
        for pair in pairs {
            let price = self.oracle.price(&pair).await?;
            prices.insert(pair, price);
        }

        let filled = self.ledger.lock().await.fill_open_orders(&prices);
        if !filled.is_empty() {
            info!(count = filled.len(), "Paper orders filled");
        }
        Ok(filled)
    }
}

/// LIVETEST 모드 데코레이터.
///
/// 시장 데이터 호출은 감싼 실거래소로 위임하고, 주문과 잔고는 모의
/// 원장에서 처리합니다. 호출자는 실거래소와 구분할 수 없습니다.
pub struct PaperExchange {
    name: String,
    inner: Arc<dyn Exchange>,
    trader: PaperTrader,
}

impl PaperExchange {
    pub fn new(inner: Arc<dyn Exchange>, config: &PaperConfig) -> Self {
        let oracle = Arc::new(ExchangeOracle::new(Arc::clone(&inner)));
        Self {
            name: format!("{}-paper", inner.name()),
            inner,
            trader: PaperTrader::new(config, oracle),
        }
    }

    /// 미체결 주문을 재평가합니다. 주기적으로 호출해야 지정가 주문이
    /// 체결됩니다.
    pub async fn fill_open_orders(&self) -> ExchangeResult<Vec<OrderDescription>> {
        self.trader.fill_open_orders().await
    }
}

#[async_trait]
impl Exchange for PaperExchange {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_status(&self) -> ExchangeResult<ExchangeStatus> {
        self.inner.get_status().await
    }

    async fn get_tradable_pairs(&self) -> ExchangeResult<Vec<TradablePair>> {
        self.inner.get_tradable_pairs().await
    }

    async fn get_24h_stats(&self, pair: &TradablePair) -> ExchangeResult<OhlcvData> {
        self.inner.get_24h_stats(pair).await
    }

    async fn get_ohlcv(
        &self,
        pair: &TradablePair,
        interval: OhlcvInterval,
        count: usize,
    ) -> ExchangeResult<Vec<OhlcvData>> {
        self.inner.get_ohlcv(pair, interval, count).await
    }

    async fn get_price(&self, pair: &TradablePair) -> ExchangeResult<Decimal> {
        self.inner.get_price(pair).await
    }

    async fn get_order_book(
        &self,
        pair: &TradablePair,
        depth: usize,
    ) -> ExchangeResult<OrderBookState> {
        self.inner.get_order_book(pair, depth).await
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
