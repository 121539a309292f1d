//! 거래 가능 페어 정의.
//!
//! 이 모듈은 거래소에서 거래 가능한 (자산, 가격 단위) 페어 타입을 정의합니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 거래 가능한 상품 페어.
///
/// 자산 심볼과 가격 단위 심볼의 불변 쌍입니다.
/// 예: GBP로 가격이 매겨진 BTC는 `TradablePair::new("BTC", "GBP")`.
/// 동등성과 해시는 두 심볼 모두에 의해 결정됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradablePair {
    /// 거래 대상 자산 (예: BTC, ETH)
    asset: String,
    /// 가격 단위 자산 (예: USD, GBP)
    price_unit: String,
}

impl TradablePair {
    /// 새 페어를 생성합니다.
    pub fn new(asset: impl Into<String>, price_unit: impl Into<String>) -> Self {
        Self {
            asset: asset.into().to_uppercase(),
            price_unit: price_unit.into().to_uppercase(),
        }
    }

    /// 거래 대상 자산 심볼을 반환합니다.
    pub fn asset(&self) -> &str {
        &self.asset
    }

    /// 가격 단위 자산 심볼을 반환합니다.
    pub fn price_unit(&self) -> &str {
        &self.price_unit
    }

    /// 페어가 해당 심볼을 포함하는지 확인합니다.
    pub fn contains(&self, symbol: &str) -> bool {
        self.asset.eq_ignore_ascii_case(symbol) || self.price_unit.eq_ignore_ascii_case(symbol)
    }

    /// "ASSET/UNIT" 형식의 표준 문자열을 반환합니다.
    pub fn to_standard_string(&self) -> String {
        format!("{}/{}", self.asset, self.price_unit)
    }
}

impl fmt::Display for TradablePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.asset, self.price_unit)
    }
}

impl FromStr for TradablePair {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((asset, unit)) if !asset.is_empty() && !unit.is_empty() => {
                Ok(Self::new(asset, unit))
            }
            _ => Err(format!("Invalid pair format: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_pair_creation() {
        let pair = TradablePair::new("btc", "gbp");
        assert_eq!(pair.asset(), "BTC");
        assert_eq!(pair.price_unit(), "GBP");
    }

    #[test]
    fn test_pair_display() {
        let pair = TradablePair::new("ETH", "USD");
        assert_eq!(pair.to_string(), "ETH/USD");
        assert_eq!(pair.to_standard_string(), "ETH/USD");
    }

    #[test]
    fn test_pair_from_str() {
        let pair: TradablePair = "BTC/GBP".parse().unwrap();
        assert_eq!(pair.asset(), "BTC");
        assert_eq!(pair.price_unit(), "GBP");

        assert!("BTCGBP".parse::<TradablePair>().is_err());
        assert!("/GBP".parse::<TradablePair>().is_err());
    }

    #[test]
    fn test_pair_contains() {
        let pair = TradablePair::new("BTC", "GBP");
        assert!(pair.contains("BTC"));
        assert!(pair.contains("gbp"));
        assert!(!pair.contains("ETH"));
    }

    #[test]
    fn test_pair_hash_by_both_symbols() {
        // 같은 심볼 쌍은 같은 키, 순서가 다르면 다른 키
        let mut map = HashMap::new();
        map.insert(TradablePair::new("BTC", "GBP"), 1);
        map.insert(TradablePair::new("GBP", "BTC"), 2);

        assert_eq!(map.len(), 2);
        assert_eq!(map[&TradablePair::new("btc", "gbp")], 1);
    }
}
