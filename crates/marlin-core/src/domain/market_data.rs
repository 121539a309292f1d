//! 시장 데이터 타입 및 구조체.
//!
//! 이 모듈은 시장 데이터 관련 타입을 정의합니다:
//! - `OhlcvData` - OHLCV 캔들 데이터와 병합 규칙
//! - `OrderBookEntry` / `OrderBookLevel` / `OrderBookState` - 호가창 데이터
//! - `ExchangeStatus` - 거래소 운영 상태

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// OHLCV 캔들 데이터.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OhlcvData {
    /// 캔들 시작 시간
    pub timestamp: DateTime<Utc>,
    /// 시가
    pub open: Decimal,
    /// 고가
    pub high: Decimal,
    /// 저가
    pub low: Decimal,
    /// 종가
    pub close: Decimal,
    /// 거래량 (자산 단위)
    pub volume: Decimal,
}

impl OhlcvData {
    /// 새 캔들을 생성합니다.
    pub fn new(
        timestamp: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// 이 캔들과 시간상 뒤따르는 캔들을 하나로 병합합니다.
    ///
    /// 병합 규칙: 시가 = 첫 시가, 종가 = 마지막 종가, 고가/저가 = 극값,
    /// 거래량 = 합, 타임스탬프 = 첫 타임스탬프. 결합 법칙이 성립하므로
    /// 연속 캔들 N개를 어떤 순서로 묶어도 결과가 같습니다.
    pub fn merge(&self, later: &OhlcvData) -> OhlcvData {
        OhlcvData {
            timestamp: self.timestamp,
            open: self.open,
            high: self.high.max(later.high),
            low: self.low.min(later.low),
            close: later.close,
            volume: self.volume + later.volume,
        }
    }

    /// 시간 오름차순으로 정렬된 캔들 목록을 하나로 병합합니다.
    ///
    /// # Errors
    /// 빈 목록이면 `CoreError::EmptyCandleSet`을 반환합니다.
    pub fn merge_all(candles: &[OhlcvData]) -> CoreResult<OhlcvData> {
        let (first, rest) = candles.split_first().ok_or(CoreError::EmptyCandleSet)?;
        Ok(rest.iter().fold(first.clone(), |acc, c| acc.merge(c)))
    }
}

/// 거래소 운영 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeStatus {
    /// 정상 운영
    Online,
    /// 주문 취소만 가능
    CancelOnly,
    /// 신규 지정가 주문만 가능
    PostOnly,
    /// 점검 중
    Maintenance,
}

impl fmt::Display for ExchangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeStatus::Online => write!(f, "online"),
            ExchangeStatus::CancelOnly => write!(f, "cancel_only"),
            ExchangeStatus::PostOnly => write!(f, "post_only"),
            ExchangeStatus::Maintenance => write!(f, "maintenance"),
        }
    }
}

/// 호가창 방향 (매도 호가 또는 매수 호가).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderBookSide {
    /// 매도 호가
    Ask,
    /// 매수 호가
    Bid,
}

/// 호가창의 단일 호가.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookEntry {
    /// 호가 방향
    pub side: OrderBookSide,
    /// 가격
    pub price: Decimal,
    /// 수량
    pub volume: Decimal,
    /// 호가 타임스탬프 (거래소가 제공하는 경우)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl OrderBookEntry {
    /// 새 호가를 생성합니다.
    pub fn new(side: OrderBookSide, price: Decimal, volume: Decimal) -> Self {
        Self {
            side,
            price,
            volume,
            timestamp: None,
        }
    }

    /// 타임스탬프를 설정합니다.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// 한쪽 방향만 존재하는 랭크를 채우는 빈 호가를 생성합니다.
    pub fn empty(side: OrderBookSide) -> Self {
        Self::new(side, Decimal::ZERO, Decimal::ZERO)
    }

    /// 빈(센티널) 호가인지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.price.is_zero() && self.volume.is_zero()
    }
}

/// 동일 깊이 랭크의 매도/매수 호가 쌍.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookLevel {
    /// 매도 호가
    pub ask: OrderBookEntry,
    /// 매수 호가
    pub bid: OrderBookEntry,
}

impl OrderBookLevel {
    /// 새 레벨을 생성합니다.
    pub fn new(ask: OrderBookEntry, bid: OrderBookEntry) -> Self {
        Self { ask, bid }
    }
}

/// 정규화된 호가창 스냅샷.
///
/// 레벨은 최우선 호가부터 정렬됩니다: 매도 호가는 가격 오름차순,
/// 매수 호가는 가격 내림차순. 레벨 수는 요청한 깊이를 넘지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookState {
    levels: Vec<OrderBookLevel>,
}

impl OrderBookState {
    /// 레벨 목록에서 호가창을 생성합니다.
    pub fn new(levels: Vec<OrderBookLevel>) -> Self {
        Self { levels }
    }

    /// 정렬되지 않은 원시 호가에서 정규화된 호가창을 구성합니다.
    ///
    /// 매도 호가를 가격 오름차순, 매수 호가를 가격 내림차순으로 정렬한 뒤
    /// 각 방향을 `depth`개로 자르고 랭크 순서로 짝을 맞춥니다. 한쪽 방향의
    /// 호가가 부족하면 해당 랭크는 빈 호가로 채워집니다. 결과 레벨 수는
    /// `min(depth, max(매도 수, 매수 수))`입니다.
    pub fn reconstruct(
        mut asks: Vec<OrderBookEntry>,
        mut bids: Vec<OrderBookEntry>,
        depth: usize,
    ) -> Self {
        asks.sort_by(|a, b| a.price.cmp(&b.price));
        bids.sort_by(|a, b| b.price.cmp(&a.price));
        asks.truncate(depth);
        bids.truncate(depth);

        let mut asks = asks.into_iter();
        let mut bids = bids.into_iter();
        let mut levels = Vec::new();

        loop {
            match (asks.next(), bids.next()) {
                (Some(ask), Some(bid)) => levels.push(OrderBookLevel::new(ask, bid)),
                (Some(ask), None) => {
                    levels.push(OrderBookLevel::new(ask, OrderBookEntry::empty(OrderBookSide::Bid)))
                }
                (None, Some(bid)) => {
                    levels.push(OrderBookLevel::new(OrderBookEntry::empty(OrderBookSide::Ask), bid))
                }
                (None, None) => break,
            }
        }

        Self { levels }
    }

    /// 호가창 레벨 목록을 반환합니다.
    pub fn levels(&self) -> &[OrderBookLevel] {
        &self.levels
    }

    /// 호가창 깊이(레벨 수)를 반환합니다.
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// 최우선 매도 호가를 반환합니다.
    pub fn best_ask(&self) -> Option<&OrderBookEntry> {
        self.levels.first().map(|l| &l.ask).filter(|e| !e.is_empty())
    }

    /// 최우선 매수 호가를 반환합니다.
    pub fn best_bid(&self) -> Option<&OrderBookEntry> {
        self.levels.first().map(|l| &l.bid).filter(|e| !e.is_empty())
    }

    /// 스프레드를 반환합니다.
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask.price - bid.price),
            _ => None,
        }
    }

    /// 중간 가격을 반환합니다.
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid.price + ask.price) / Decimal::from(2)),
            _ => None,
        }
    }
}
