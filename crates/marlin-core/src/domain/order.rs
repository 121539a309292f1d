//! 주문 타입 및 관리.
//!
//! 이 모듈은 트레이딩 시스템의 주문 관련 타입을 정의합니다:
//! - `TradeAction` - 주문 방향 (매수/매도)
//! - `OrderType` - 주문 유형 (시장가, 지정가 등)
//! - `TradeDescription` - 주문 요청
//! - `OrderDescription` - 미체결/체결 주문 조회 모델
//! - `Balances` - 자산별 잔고 맵

use crate::error::{CoreError, CoreResult};
use crate::types::TradablePair;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 자산 심볼에서 보유 수량으로의 잔고 맵.
///
/// 맵 자체는 불변식을 강제하지 않습니다. 잔고의 비음수 보장은
/// 이를 소유한 원장의 책임입니다.
pub type Balances = HashMap<String, Decimal>;

/// 주문 방향 (매수 또는 매도).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    /// 매수
    Buy,
    /// 매도
    Sell,
}

impl TradeAction {
    /// 반대 방향을 반환합니다.
    pub fn opposite(&self) -> Self {
        match self {
            TradeAction::Buy => TradeAction::Sell,
            TradeAction::Sell => TradeAction::Buy,
        }
    }
}

impl std::fmt::Display for TradeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeAction::Buy => write!(f, "BUY"),
            TradeAction::Sell => write!(f, "SELL"),
        }
    }
}

/// 주문 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// 지정가 주문 - 지정 가격 이상/이하에서 체결
    Limit,
    /// 시장가 주문 - 현재 시장 가격으로 즉시 체결
    Market,
    /// 손절 주문
    StopLoss,
    /// 익절 주문
    TakeProfit,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Limit => write!(f, "LIMIT"),
            OrderType::Market => write!(f, "MARKET"),
            OrderType::StopLoss => write!(f, "STOP_LOSS"),
            OrderType::TakeProfit => write!(f, "TAKE_PROFIT"),
        }
    }
}

/// 주문 요청.
///
/// 시장가 주문의 경우 `asset_price`는 체결 시점의 시장 가격으로
/// 대체되며 요청 시 값은 무시됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeDescription {
    /// 주문 유형
    pub order_type: OrderType,
    /// 거래 페어
    pub pair: TradablePair,
    /// 주문 방향
    pub action: TradeAction,
    /// 자산 단가
    pub asset_price: Decimal,
    /// 주문 수량 (자산 단위)
    pub volume: Decimal,
}

impl TradeDescription {
    /// 새 주문 요청을 생성합니다.
    pub fn new(
        order_type: OrderType,
        pair: TradablePair,
        action: TradeAction,
        asset_price: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            order_type,
            pair,
            action,
            asset_price,
            volume,
        }
    }

    /// 총 비용으로부터 주문 수량을 계산해 주문 요청을 생성합니다.
    ///
    /// `volume = trade_cost / asset_price`.
    ///
    /// # Errors
    /// 가격이 0 이하이면 `CoreError::NonPositivePrice`를 반환합니다.
    pub fn by_cost(
        order_type: OrderType,
        pair: TradablePair,
        action: TradeAction,
        asset_price: Decimal,
        trade_cost: Decimal,
    ) -> CoreResult<Self> {
        if asset_price <= Decimal::ZERO {
            return Err(CoreError::NonPositivePrice(asset_price));
        }

        Ok(Self::new(
            order_type,
            pair,
            action,
            asset_price,
            trade_cost / asset_price,
        ))
    }

    /// 주문 명목 가치(가격 x 수량)를 반환합니다.
    pub fn notional(&self) -> Decimal {
        self.asset_price * self.volume
    }
}

/// 거래소가 보고하는 주문 조회 모델.
///
/// `symbol`은 거래소 고유 페어 문자열을 보고된 그대로 담습니다
/// (예: 크라켄의 "ETHUSD").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDescription {
    /// 거래소가 부여한 주문 ID
    pub order_id: String,
    /// 거래소 고유 페어 문자열
    pub symbol: String,
    /// 주문 방향
    pub action: TradeAction,
    /// 주문 가격
    pub price: Decimal,
    /// 주문 수량
    pub volume: Decimal,
}

impl OrderDescription {
    /// 새 주문 조회 모델을 생성합니다.
    pub fn new(
        order_id: impl Into<String>,
        symbol: impl Into<String>,
        action: TradeAction,
        price: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            symbol: symbol.into(),
            action,
            price,
            volume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_action_display_and_opposite() {
        assert_eq!(TradeAction::Buy.to_string(), "BUY");
        assert_eq!(TradeAction::Sell.to_string(), "SELL");
        assert_eq!(TradeAction::Buy.opposite(), TradeAction::Sell);
    }

    #[test]
    fn test_trade_by_cost() {
        let pair = TradablePair::new("BTC", "GBP");
        let trade = TradeDescription::by_cost(
            OrderType::Limit,
            pair,
            TradeAction::Buy,
            dec!(20),
            dec!(50),
        )
        .unwrap();

        assert_eq!(trade.volume, dec!(2.5));
        assert_eq!(trade.notional(), dec!(50));
    }

    #[test]
    fn test_trade_by_cost_rejects_non_positive_price() {
        let pair = TradablePair::new("BTC", "GBP");

        let zero = TradeDescription::by_cost(
            OrderType::Limit,
            pair.clone(),
            TradeAction::Buy,
            Decimal::ZERO,
            dec!(50),
        );
        assert!(matches!(zero, Err(CoreError::NonPositivePrice(_))));

        let negative = TradeDescription::by_cost(
            OrderType::Limit,
            pair,
            TradeAction::Buy,
            dec!(-1),
            dec!(50),
        );
        assert!(negative.is_err());
    }
}
