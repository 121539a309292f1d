//! OHLCV 캔들 간격 정의.
//!
//! 이 모듈은 캔들 데이터의 시간 간격 타입을 정의합니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// OHLCV 캔들 간격.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OhlcvInterval {
    /// 1분봉
    M1,
    /// 5분봉
    M5,
    /// 15분봉
    M15,
    /// 30분봉
    M30,
    /// 1시간봉
    H1,
    /// 4시간봉
    H4,
    /// 일봉
    D1,
}

impl OhlcvInterval {
    /// 이 간격의 기간을 반환합니다.
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.as_secs())
    }

    /// 이 간격의 초 단위 값을 반환합니다.
    pub fn as_secs(&self) -> u64 {
        match self {
            OhlcvInterval::M1 => 60,
            OhlcvInterval::M5 => 5 * 60,
            OhlcvInterval::M15 => 15 * 60,
            OhlcvInterval::M30 => 30 * 60,
            OhlcvInterval::H1 => 60 * 60,
            OhlcvInterval::H4 => 4 * 60 * 60,
            OhlcvInterval::D1 => 24 * 60 * 60,
        }
    }

    /// 크라켄 API 간격 값(분 단위)으로 변환합니다.
    pub fn to_kraken_minutes(&self) -> u32 {
        (self.as_secs() / 60) as u32
    }

    /// 간격 문자열 표현을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            OhlcvInterval::M1 => "1m",
            OhlcvInterval::M5 => "5m",
            OhlcvInterval::M15 => "15m",
            OhlcvInterval::M30 => "30m",
            OhlcvInterval::H1 => "1h",
            OhlcvInterval::H4 => "4h",
            OhlcvInterval::D1 => "1d",
        }
    }
}

impl fmt::Display for OhlcvInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OhlcvInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(OhlcvInterval::M1),
            "5m" => Ok(OhlcvInterval::M5),
            "15m" => Ok(OhlcvInterval::M15),
            "30m" => Ok(OhlcvInterval::M30),
            "1h" => Ok(OhlcvInterval::H1),
            "4h" => Ok(OhlcvInterval::H4),
            "1d" => Ok(OhlcvInterval::D1),
            _ => Err(format!("Invalid interval: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_secs() {
        assert_eq!(OhlcvInterval::M1.as_secs(), 60);
        assert_eq!(OhlcvInterval::M5.as_secs(), 300);
        assert_eq!(OhlcvInterval::D1.as_secs(), 86400);
    }

    #[test]
    fn test_interval_kraken_minutes() {
        assert_eq!(OhlcvInterval::M5.to_kraken_minutes(), 5);
        assert_eq!(OhlcvInterval::H1.to_kraken_minutes(), 60);
        assert_eq!(OhlcvInterval::D1.to_kraken_minutes(), 1440);
    }

    #[test]
    fn test_interval_round_trip() {
        assert_eq!("15m".parse::<OhlcvInterval>(), Ok(OhlcvInterval::M15));
        assert_eq!(OhlcvInterval::H4.to_string(), "4h");
        assert!("2h".parse::<OhlcvInterval>().is_err());
    }
}
