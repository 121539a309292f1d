//! 핵심 도메인 에러 타입.
//!
//! 이 모듈은 네트워크와 무관한 순수 도메인 연산의 에러 타입을 정의합니다.

use rust_decimal::Decimal;
use thiserror::Error;

/// 핵심 도메인 에러.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// 가격이 0 이하
    #[error("가격은 0보다 커야 합니다: {0}")]
    NonPositivePrice(Decimal),

    /// 빈 캔들 목록 병합 시도
    #[error("빈 캔들 목록은 병합할 수 없습니다")]
    EmptyCandleSet,

    /// 잘못된 설정 값
    #[error("잘못된 설정 값: {0}")]
    InvalidConfig(String),
}

/// 핵심 도메인 연산을 위한 Result 타입.
pub type CoreResult<T> = Result<T, CoreError>;
