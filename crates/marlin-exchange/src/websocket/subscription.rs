//! 구독 참조 카운트 및 상태 관리.
//!
//! 여러 소비자가 같은 채널을 구독해도 거래소에는 구독 프레임이
//! 한 번만 전송되도록 관심 수를 추적합니다.

use marlin_core::{OhlcvInterval, TradablePair};
use std::collections::HashMap;

/// 구독 가능한 채널 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WsChannel {
    /// 현재 가격 (티커)
    Price,
    /// 캔들 스트림
    Ohlcv(OhlcvInterval),
    /// 호가창 스트림
    OrderBook,
}

/// 하나의 구독 단위 (거래 쌍 + 채널).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WsSubscription {
    pub pair: TradablePair,
    pub channel: WsChannel,
}

impl WsSubscription {
    pub fn new(pair: TradablePair, channel: WsChannel) -> Self {
        Self { pair, channel }
    }

    /// 가격(티커) 구독.
    pub fn price(pair: TradablePair) -> Self {
        Self::new(pair, WsChannel::Price)
    }

    /// 캔들 구독.
    pub fn ohlcv(pair: TradablePair, interval: OhlcvInterval) -> Self {
        Self::new(pair, WsChannel::Ohlcv(interval))
    }

    /// 호가창 구독.
    pub fn order_book(pair: TradablePair) -> Self {
        Self::new(pair, WsChannel::OrderBook)
    }
}

/// 구독 수명 주기 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubscriptionState {
    /// 구독하지 않음
    #[default]
    Unsubscribed,
    /// 구독 요청 전송, 확인 대기 중
    Subscribing,
    /// 거래소가 구독을 확인함
    Subscribed,
    /// 구독 해제 요청 전송, 확인 대기 중
    Unsubscribing,
}

#[derive(Debug, Default)]
struct SubscriptionEntry {
    state: SubscriptionState,
    interest: usize,
}

/// 참조 카운트 기반 구독 레지스트리.
///
/// 관심 수가 0에서 1로 바뀔 때만 구독 프레임을, 1에서 0으로 바뀔 때만
/// 구독 해제 프레임을 전송해야 합니다. 호출자는 카운트 변경과 프레임
/// 전송 결정이 원자적이 되도록 레지스트리를 하나의 잠금 아래 두어야
/// 합니다.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: HashMap<WsSubscription, SubscriptionEntry>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 구독 관심을 추가합니다.
    ///
    /// 업스트림 구독 프레임을 전송해야 할 때만 `true`를 반환합니다.
    /// 구독 해제 확인을 기다리는 중이면 확인이 도착한 시점에
    /// [`confirm_unsubscribed`](Self::confirm_unsubscribed)가 재구독을
    /// 지시합니다.
    pub fn add_interest(&mut self, sub: &WsSubscription) -> bool {
        let entry = self.entries.entry(sub.clone()).or_default();
        entry.interest += 1;

        if entry.interest == 1 && entry.state == SubscriptionState::Unsubscribed {
            entry.state = SubscriptionState::Subscribing;
            true
        } else {
            false
        }
    }

    /// 구독 관심을 제거합니다.
    ///
    /// 업스트림 구독 해제 프레임을 전송해야 할 때만 `true`를 반환합니다.
    pub fn remove_interest(&mut self, sub: &WsSubscription) -> bool {
        let Some(entry) = self.entries.get_mut(sub) else {
            return false;
        };
        if entry.interest == 0 {
            return false;
        }

        entry.interest -= 1;
        if entry.interest > 0 {
            return false;
        }

        match entry.state {
            SubscriptionState::Subscribing | SubscriptionState::Subscribed => {
                entry.state = SubscriptionState::Unsubscribing;
                true
            }
            _ => false,
        }
    }

    /// 거래소의 구독 확인을 반영합니다.
    pub fn confirm_subscribed(&mut self, sub: &WsSubscription) {
        if let Some(entry) = self.entries.get_mut(sub) {
            if entry.state == SubscriptionState::Subscribing {
                entry.state = SubscriptionState::Subscribed;
            }
        }
    }

    /// 거래소의 구독 해제 확인을 반영합니다.
    ///
    /// 해제 확인을 기다리는 사이 관심이 다시 생겼다면 `true`를 반환하며,
    /// 호출자는 구독 프레임을 다시 전송해야 합니다.
    pub fn confirm_unsubscribed(&mut self, sub: &WsSubscription) -> bool {
        match self.entries.get_mut(sub) {
            Some(entry) if entry.interest > 0 => {
                entry.state = SubscriptionState::Subscribing;
                true
            }
            Some(_) => {
                self.entries.remove(sub);
                false
            }
            None => false,
        }
    }

    /// 재연결 처리: 관심이 남아 있는 모든 구독을 `Subscribing`으로
    /// 되돌리고 반환합니다. 호출자는 각 구독의 프레임을 다시 전송해야
    /// 합니다. 관심이 없는 항목은 제거됩니다.
    pub fn mark_all_subscribing(&mut self) -> Vec<WsSubscription> {
        self.entries.retain(|_, entry| entry.interest > 0);

        let mut subs = Vec::with_capacity(self.entries.len());
        for (sub, entry) in self.entries.iter_mut() {
            entry.state = SubscriptionState::Subscribing;
            subs.push(sub.clone());
        }
        subs
    }

    /// 현재 구독 상태를 반환합니다.
    pub fn state(&self, sub: &WsSubscription) -> SubscriptionState {
        self.entries
            .get(sub)
            .map(|entry| entry.state)
            .unwrap_or_default()
    }

    /// 현재 관심 수를 반환합니다.
    pub fn interest(&self, sub: &WsSubscription) -> usize {
        self.entries.get(sub).map(|entry| entry.interest).unwrap_or(0)
    }
}
