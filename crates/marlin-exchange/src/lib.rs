//! 거래소 연결 및 시장 데이터 처리.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - Exchange trait: 통합 거래소 인터페이스
//! - Kraken 커넥터 (REST + WebSocket) 및 Coinbase 커넥터 (REST)
//! - 모의 거래 원장: LIVETEST 모드와 백테스트가 공유하는 체결 시뮬레이터
//! - 과거 데이터 재생기: CSV 캔들을 시간 순으로 재생하는 백테스트 거래소
//! - 구독 레퍼런스 카운팅을 갖춘 WebSocket 시세 엔진
//! - 실행 모드별 거래소 조립

pub mod assemble;
pub mod backtest;
pub mod connector;
pub mod error;
pub mod paper;
pub mod traits;
pub mod websocket;

pub use assemble::{
    assemble_back_test, assemble_exchange, assemble_live, assemble_live_test, build_connector,
    build_navigator,
};
pub use backtest::{
    generate_sample_candles, load_csv_dir, BacktestExchange, BacktestNavigator, PairSeries,
};
pub use connector::{CoinbaseClient, CoinbaseConfig, KrakenClient, KrakenConfig};
pub use error::*;
pub use paper::{PaperExchange, PaperLedger, PaperOrder, PaperTrader};
pub use traits::*;
pub use websocket::{
    KrakenWsProtocol, MarketCache, SubscriptionRegistry, WsEvent, WsMarketStream, WsProtocol,
};
