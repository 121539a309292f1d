//! CLI 도구 모음.
//!
//! 이 crate는 다음 기능을 제공합니다:
//! - 백테스트 실행기
//! - 모의 거래 세션 (실거래소 시세)
//! - 거래소 상태 점검
//! - 샘플 데이터 생성

pub mod commands;

pub use commands::*;
