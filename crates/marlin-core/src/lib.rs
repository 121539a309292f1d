//! # Marlin Core
//!
//! 트레이딩 런타임의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 시스템 전반에서 사용되는 기본 타입을 제공합니다:
//! - 거래 쌍 및 캔들 간격 정의
//! - OHLCV 시장 데이터 및 병합
//! - 주문서(오더북) 상태 모델
//! - 거래 및 주문 기술 구조체
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
