//! 거래소별 WebSocket 프레임 규약.

use crate::traits::ExchangeResult;
use crate::websocket::subscription::WsSubscription;
use marlin_core::{OhlcvData, OhlcvInterval, TradablePair};
use rust_decimal::Decimal;

/// 수신 프레임을 분류한 결과.
#[derive(Debug, Clone)]
pub enum WsEvent {
    /// 가격(티커) 갱신
    Price { pair: TradablePair, price: Decimal },
    /// 캔들 갱신
    Candle {
        pair: TradablePair,
        interval: OhlcvInterval,
        candle: OhlcvData,
    },
    /// 호가창 스냅샷. 양측 호가를 전부 교체합니다.
    BookSnapshot {
        pair: TradablePair,
        asks: Vec<(Decimal, Decimal)>,
        bids: Vec<(Decimal, Decimal)>,
    },
    /// 호가창 증분 갱신. 수량 0은 레벨 삭제입니다.
    BookUpdate {
        pair: TradablePair,
        asks: Vec<(Decimal, Decimal)>,
        bids: Vec<(Decimal, Decimal)>,
    },
    /// 구독 확인
    Subscribed(WsSubscription),
    /// 구독 해제 확인
    Unsubscribed(WsSubscription),
    /// 거래소가 보낸 에러 또는 해석할 수 없는 프레임
    Error(String),
    /// 하트비트/시스템 메시지
    Heartbeat,
    /// 처리 대상이 아닌 메시지
    Ignored,
}

/// 거래소별 WebSocket 프레임 직렬화/분류 규약.
///
/// 구현체는 순수해야 합니다. 네트워크 I/O와 상태 관리는
/// [`WsMarketStream`](crate::websocket::WsMarketStream)이 담당합니다.
pub trait WsProtocol: Send + Sync + 'static {
    /// WebSocket 엔드포인트 URL.
    fn endpoint(&self) -> String;

    /// 구독 요청 프레임을 직렬화합니다.
    fn subscribe_frame(&self, sub: &WsSubscription) -> ExchangeResult<String>;

    /// 구독 해제 요청 프레임을 직렬화합니다.
    fn unsubscribe_frame(&self, sub: &WsSubscription) -> ExchangeResult<String>;

    /// 수신 프레임을 분류합니다.
    ///
    /// 절대 실패하지 않습니다. 해석할 수 없는 프레임은
    /// [`WsEvent::Error`]로 분류되어 호출자가 기록하고 버립니다.
    fn classify(&self, raw: &str) -> WsEvent;
}
