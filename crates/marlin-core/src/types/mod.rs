//! 기본 타입 정의.

pub mod interval;
pub mod pair;

pub use interval::OhlcvInterval;
pub use pair::TradablePair;
