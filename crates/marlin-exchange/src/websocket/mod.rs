//! WebSocket 구독 엔진.
//!
//! 거래소별 프레임 규약([`WsProtocol`])과 공통 엔진
//! ([`WsMarketStream`])을 분리합니다. 엔진이 구독 참조 카운트,
//! 재연결, 최신 값 캐시를 담당하고 규약 구현은 직렬화와 분류만
//! 수행합니다.

mod cache;
mod engine;
mod kraken;
mod protocol;
mod subscription;

pub use cache::MarketCache;
pub use engine::WsMarketStream;
pub use kraken::KrakenWsProtocol;
pub use protocol::{WsEvent, WsProtocol};
pub use subscription::{SubscriptionRegistry, SubscriptionState, WsChannel, WsSubscription};
