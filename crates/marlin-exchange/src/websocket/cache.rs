//! 최신 시장 데이터 캐시.
//!
//! WebSocket으로 수신한 마지막 값을 보관합니다. 재연결 중에도 비우지
//! 않으므로 소비자는 마지막으로 알려진 값을 계속 읽을 수 있습니다.

use marlin_core::{
    OhlcvData, OhlcvInterval, OrderBookEntry, OrderBookSide, OrderBookState, TradablePair,
};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::{Notify, RwLock};

#[derive(Debug, Default)]
struct BookSides {
    asks: BTreeMap<Decimal, Decimal>,
    bids: BTreeMap<Decimal, Decimal>,
}

#[derive(Debug, Default)]
struct CacheInner {
    prices: HashMap<TradablePair, Decimal>,
    candles: HashMap<(TradablePair, OhlcvInterval), OhlcvData>,
    books: HashMap<TradablePair, BookSides>,
}

/// 거래 쌍별 최신 가격/캔들/호가창 저장소.
#[derive(Debug, Default)]
pub struct MarketCache {
    inner: RwLock<CacheInner>,
    notify: Notify,
}

impl MarketCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 가격을 갱신합니다.
    pub async fn set_price(&self, pair: &TradablePair, price: Decimal) {
        self.inner.write().await.prices.insert(pair.clone(), price);
        self.notify.notify_waiters();
    }

    /// 마지막으로 수신한 가격을 반환합니다.
    pub async fn price(&self, pair: &TradablePair) -> Option<Decimal> {
        self.inner.read().await.prices.get(pair).copied()
    }

    /// 첫 가격이 수신될 때까지 기다렸다가 반환합니다.
    pub async fn wait_price(&self, pair: &TradablePair) -> Decimal {
        loop {
            // 값 확인 전에 알림을 등록해야 갱신을 놓치지 않음
            let notified = self.notify.notified();
            if let Some(price) = self.price(pair).await {
                return price;
            }
            notified.await;
        }
    }

    /// 캔들을 갱신합니다.
    pub async fn set_candle(&self, pair: &TradablePair, interval: OhlcvInterval, candle: OhlcvData) {
        self.inner
            .write()
            .await
            .candles
            .insert((pair.clone(), interval), candle);
        self.notify.notify_waiters();
    }

    /// 마지막으로 수신한 캔들을 반환합니다.
    pub async fn candle(&self, pair: &TradablePair, interval: OhlcvInterval) -> Option<OhlcvData> {
        self.inner
            .read()
            .await
            .candles
            .get(&(pair.clone(), interval))
            .cloned()
    }

    /// 첫 캔들이 수신될 때까지 기다렸다가 반환합니다.
    pub async fn wait_candle(&self, pair: &TradablePair, interval: OhlcvInterval) -> OhlcvData {
        loop {
            let notified = self.notify.notified();
            if let Some(candle) = self.candle(pair, interval).await {
                return candle;
            }
            notified.await;
        }
    }

    /// 호가창 스냅샷을 반영합니다. 기존 양측 호가를 전부 교체합니다.
    pub async fn replace_book(
        &self,
        pair: &TradablePair,
        asks: &[(Decimal, Decimal)],
        bids: &[(Decimal, Decimal)],
    ) {
        let mut inner = self.inner.write().await;
        let book = inner.books.entry(pair.clone()).or_default();
        book.asks = asks.iter().copied().collect();
        book.bids = bids.iter().copied().collect();
        drop(inner);
        self.notify.notify_waiters();
    }

    /// 호가창 증분 갱신을 반영합니다. 수량 0은 해당 가격 레벨 삭제를
    /// 의미합니다. 스냅샷을 받은 적 없는 쌍의 갱신은 새 호가창을
    /// 만들지 않고 무시됩니다.
    pub async fn update_book(
        &self,
        pair: &TradablePair,
        asks: &[(Decimal, Decimal)],
        bids: &[(Decimal, Decimal)],
    ) {
        let mut inner = self.inner.write().await;
        let Some(book) = inner.books.get_mut(pair) else {
            return;
        };

        for &(price, volume) in asks {
            if volume.is_zero() {
                book.asks.remove(&price);
            } else {
                book.asks.insert(price, volume);
            }
        }
        for &(price, volume) in bids {
            if volume.is_zero() {
                book.bids.remove(&price);
            } else {
                book.bids.insert(price, volume);
            }
        }
        drop(inner);
        self.notify.notify_waiters();
    }

    /// 캐시된 호가로부터 호가창 상태를 재구성합니다.
    ///
    /// 스냅샷을 받은 적 없는 쌍은 `None`을 반환합니다.
    pub async fn order_book(&self, pair: &TradablePair, depth: usize) -> Option<OrderBookState> {
        let inner = self.inner.read().await;
        let book = inner.books.get(pair)?;

        let asks: Vec<OrderBookEntry> = book
            .asks
            .iter()
            .take(depth)
            .map(|(&price, &volume)| OrderBookEntry::new(OrderBookSide::Ask, price, volume))
            .collect();
        let bids: Vec<OrderBookEntry> = book
            .bids
            .iter()
            .rev()
            .take(depth)
            .map(|(&price, &volume)| OrderBookEntry::new(OrderBookSide::Bid, price, volume))
            .collect();

        Some(OrderBookState::reconstruct(asks, bids, depth))
    }

    /// 첫 호가창 스냅샷이 수신될 때까지 기다렸다가 반환합니다.
    pub async fn wait_order_book(&self, pair: &TradablePair, depth: usize) -> OrderBookState {
        loop {
            let notified = self.notify.notified();
            if let Some(book) = self.order_book(pair, depth).await {
                return book;
            }
            notified.await;
        }
    }
}
