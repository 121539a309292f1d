//! 거래소 trait 정의.

use async_trait::async_trait;
use marlin_core::{
    Balances, ExchangeStatus, OhlcvData, OhlcvInterval, OrderBookState, OrderDescription,
    TradablePair, TradeDescription,
};
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::ExchangeError;

/// 거래소 작업을 위한 Result 타입.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// 통합 거래소 인터페이스를 위한 Exchange trait.
///
/// 실거래소 커넥터, 모의 거래 데코레이터, 백테스트 거래소가 모두
/// 이 trait 하나로 표현됩니다. 호출자는 구현체를 구분할 수 없습니다.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// 거래소 이름 반환.
    fn name(&self) -> &str;

    // === 시장 데이터 ===

    /// 거래소 운영 상태 조회.
    async fn get_status(&self) -> ExchangeResult<ExchangeStatus>;

    /// 거래 가능한 쌍 목록 조회.
    async fn get_tradable_pairs(&self) -> ExchangeResult<Vec<TradablePair>>;

    /// 최근 24시간 통계를 하나의 캔들로 조회.
    async fn get_24h_stats(&self, pair: &TradablePair) -> ExchangeResult<OhlcvData>;

    /// 과거 캔들 조회. 최신 순으로 최대 `count`개를 반환합니다.
    async fn get_ohlcv(
        &self,
        pair: &TradablePair,
        interval: OhlcvInterval,
        count: usize,
    ) -> ExchangeResult<Vec<OhlcvData>>;

    /// 현재 가격 조회.
    async fn get_price(&self, pair: &TradablePair) -> ExchangeResult<Decimal>;

    /// 호가창 조회.
    ///
    /// 구현체는 요청한 `depth`보다 적게 잘라내면 안 됩니다. 이산적인
    /// 깊이 단계만 지원하는 거래소는 위로 올림한 뒤 잘라냅니다.
    async fn get_order_book(
        &self,
        pair: &TradablePair,
        depth: usize,
    ) -> ExchangeResult<OrderBookState>;

    /// 거래 수수료 조회 (퍼센트, 0.26은 0.26%).
    async fn get_fee(&self, pair: &TradablePair) -> ExchangeResult<Decimal>;

    // === 계좌/주문 ===

    /// 계좌 잔고 조회.
    async fn get_balances(&self) -> ExchangeResult<Balances>;

    /// 미체결 주문 조회.
    async fn get_open_orders(&self) -> ExchangeResult<Vec<OrderDescription>>;

    /// 체결 완료된 주문 조회.
    async fn get_closed_orders(&self) -> ExchangeResult<Vec<OrderDescription>>;

    /// 새 주문 제출. 주문 ID를 반환합니다.
    async fn add_order(&self, trade: &TradeDescription) -> ExchangeResult<String>;

    /// 주문 취소.
    async fn cancel_order(&self, order_id: &str) -> ExchangeResult<()>;
}

impl std::fmt::Debug for dyn Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exchange").field("name", &self.name()).finish()
    }
}

/// 체결 판정에 쓰이는 현재 가격의 단일 출처.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// 거래 쌍의 현재 가격 반환.
    async fn price(&self, pair: &TradablePair) -> ExchangeResult<Decimal>;
}

/// 임의의 `Exchange`를 가격 오라클로 쓰는 어댑터.
pub struct ExchangeOracle {
    exchange: Arc<dyn Exchange>,
}

impl ExchangeOracle {
    pub fn new(exchange: Arc<dyn Exchange>) -> Self {
        Self { exchange }
    }
}

#[async_trait]
impl PriceOracle for ExchangeOracle {
    async fn price(&self, pair: &TradablePair) -> ExchangeResult<Decimal> {
        self.exchange.get_price(pair).await
    }
}
