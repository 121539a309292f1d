//! 과거 데이터 백테스트.
//!
//! 시계열 재생은 세 층으로 나뉩니다:
//! - [`load_csv_dir`] / [`generate_sample_candles`] — 데이터 준비
//! - [`BacktestNavigator`] — 커서 기반 결정적 시계 (미래 참조 불가)
//! - [`BacktestExchange`] — 내비게이터와 모의 원장을 결합한 `Exchange` 구현

mod data;
mod exchange;
mod navigator;

pub use data::{generate_sample_candles, load_csv_dir};
pub use exchange::BacktestExchange;
pub use navigator::{BacktestNavigator, PairSeries};
