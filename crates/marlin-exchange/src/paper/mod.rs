//! 모의 거래 (페이퍼 트레이딩).
//!
//! 실제 주문 없이 전략을 검증하기 위한 결정적 실행 계층입니다.
//! [`PaperLedger`]가 잔고와 주문 상태를 관리하고, [`PaperTrader`]가
//! 오라클 가격 조회와 동시성 제어를 더하며, [`PaperExchange`]는 실거래소
//! 위에 주문 계층만 모의로 바꿔 끼우는 데코레이터입니다.

mod exchange;
mod ledger;

pub use exchange::{PaperExchange, PaperTrader};
pub use ledger::{PaperLedger, PaperOrder};
