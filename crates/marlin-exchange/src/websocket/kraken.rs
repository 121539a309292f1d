//! Kraken 공개 WebSocket 프레임 규약.
//!
//! 구독 요청은 `{"event":"subscribe","pair":[..],"subscription":{..}}`
//! 형태이고, 데이터 메시지는 `[channelID, data.., channelName, pair]`
//! 배열로 수신됩니다. 쌍 이름은 양방향에서 정규화됩니다: 나가는
//! 프레임은 BTC를 Kraken 표기 XBT로 바꾸고, 들어오는 wsname은 다시
//! BTC로 되돌립니다.

use crate::error::ExchangeError;
use crate::traits::ExchangeResult;
use crate::websocket::protocol::{WsEvent, WsProtocol};
use crate::websocket::subscription::{WsChannel, WsSubscription};
use chrono::DateTime;
use marlin_core::{OhlcvData, OhlcvInterval, TradablePair};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const KRAKEN_WS_URL: &str = "wss://ws.kraken.com";

/// 기본 호가창 구독 깊이. Kraken은 10/25/100/500/1000만 지원합니다.
const DEFAULT_BOOK_DEPTH: u32 = 10;

/// Kraken 공개 WebSocket 규약.
#[derive(Debug, Clone)]
pub struct KrakenWsProtocol {
    endpoint: String,
    book_depth: u32,
}

impl Default for KrakenWsProtocol {
    fn default() -> Self {
        Self::new()
    }
}

/// 구독/구독 해제 요청 프레임.
#[derive(Debug, Serialize)]
struct SubscribeRequest {
    event: String,
    pair: Vec<String>,
    subscription: SubscriptionPayload,
}

#[derive(Debug, Serialize)]
struct SubscriptionPayload {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    interval: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    depth: Option<u32>,
}

/// `subscriptionStatus` 확인 메시지.
#[derive(Debug, Deserialize)]
struct SubscriptionStatus {
    status: String,
    #[serde(default)]
    pair: Option<String>,
    #[serde(rename = "errorMessage", default)]
    error_message: Option<String>,
    #[serde(default)]
    subscription: Option<StatusSubscription>,
}

#[derive(Debug, Deserialize)]
struct StatusSubscription {
    name: String,
    #[serde(default)]
    interval: Option<u32>,
}

impl KrakenWsProtocol {
    pub fn new() -> Self {
        Self {
            endpoint: KRAKEN_WS_URL.to_string(),
            book_depth: DEFAULT_BOOK_DEPTH,
        }
    }

    /// 엔드포인트를 교체합니다 (테스트용).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// 호가창 구독 깊이를 설정합니다.
    pub fn with_book_depth(mut self, depth: u32) -> Self {
        self.book_depth = depth;
        self
    }

    fn frame(&self, event: &str, sub: &WsSubscription) -> ExchangeResult<String> {
        let subscription = match sub.channel {
            WsChannel::Price => SubscriptionPayload {
                name: "ticker".to_string(),
                interval: None,
                depth: None,
            },
            WsChannel::Ohlcv(interval) => SubscriptionPayload {
                name: "ohlc".to_string(),
                interval: Some(interval.to_kraken_minutes()),
                depth: None,
            },
            WsChannel::OrderBook => SubscriptionPayload {
                name: "book".to_string(),
                interval: None,
                depth: Some(self.book_depth),
            },
        };

        let request = SubscribeRequest {
            event: event.to_string(),
            pair: vec![to_ws_name(&sub.pair)],
            subscription,
        };
        serde_json::to_string(&request).map_err(|e| ExchangeError::ParseError(e.to_string()))
    }

    fn classify_status(&self, value: &Value, raw: &str) -> WsEvent {
        let status: SubscriptionStatus = match serde_json::from_value(value.clone()) {
            Ok(status) => status,
            Err(e) => return WsEvent::Error(format!("Malformed subscriptionStatus: {}", e)),
        };

        if status.status == "error" {
            return WsEvent::Error(
                status
                    .error_message
                    .unwrap_or_else(|| "Subscription error".to_string()),
            );
        }

        let (Some(pair), Some(subscription)) = (status.pair.as_deref(), status.subscription.as_ref())
        else {
            return WsEvent::Error(format!(
                "subscriptionStatus without pair: {}",
                preview(raw)
            ));
        };
        let Some(pair) = pair_from_ws_name(pair) else {
            return WsEvent::Error(format!("Unparseable pair in subscriptionStatus: {}", pair));
        };

        let channel = match subscription.name.as_str() {
            "ticker" => WsChannel::Price,
            "ohlc" => match subscription.interval.and_then(interval_from_minutes) {
                Some(interval) => WsChannel::Ohlcv(interval),
                None => {
                    return WsEvent::Error(format!(
                        "Unsupported ohlc interval in subscriptionStatus: {}",
                        preview(raw)
                    ))
                }
            },
            "book" => WsChannel::OrderBook,
            // 구독하지 않는 채널(trade, spread 등)의 확인
            _ => return WsEvent::Ignored,
        };

        let sub = WsSubscription::new(pair, channel);
        match status.status.as_str() {
            "subscribed" => WsEvent::Subscribed(sub),
            "unsubscribed" => WsEvent::Unsubscribed(sub),
            _ => WsEvent::Ignored,
        }
    }

    fn classify_data(&self, value: &Value, raw: &str) -> WsEvent {
        match self.parse_data(value) {
            Some(event) => event,
            None => WsEvent::Error(format!("Malformed data frame: {}", preview(raw))),
        }
    }

    fn parse_data(&self, value: &Value) -> Option<WsEvent> {
        let arr = value.as_array()?;
        if arr.len() < 4 {
            return None;
        }

        // 데이터 메시지는 [channelID, data.., channelName, pair] 형태
        let pair_str = arr.last()?.as_str()?;
        let channel = arr.get(arr.len() - 2)?.as_str()?;
        let pair = pair_from_ws_name(pair_str)?;

        if channel == "ticker" {
            // c = [종가, 수량]
            let data = arr.get(1)?;
            let price = parse_decimal_field(data.get("c")?.get(0)?)?;
            return Some(WsEvent::Price { pair, price });
        }

        if let Some(minutes) = channel.strip_prefix("ohlc-") {
            let interval = interval_from_minutes(minutes.parse().ok()?)?;
            // [time, etime, open, high, low, close, vwap, volume, count]
            let row = arr.get(1)?.as_array()?;
            if row.len() < 8 {
                return None;
            }
            let secs = row[0].as_str()?.parse::<f64>().ok()? as i64;
            let timestamp = DateTime::from_timestamp(secs, 0)?;
            let candle = OhlcvData::new(
                timestamp,
                parse_decimal_field(&row[2])?,
                parse_decimal_field(&row[3])?,
                parse_decimal_field(&row[4])?,
                parse_decimal_field(&row[5])?,
                parse_decimal_field(&row[7])?,
            );
            return Some(WsEvent::Candle {
                pair,
                interval,
                candle,
            });
        }

        if channel.starts_with("book") {
            // 스냅샷은 as/bs, 증분 갱신은 a/b 키를 사용.
            // 갱신은 [id, {"a":..}, {"b":..}, channel, pair]처럼 객체가
            // 두 개로 쪼개져 올 수 있음.
            let mut snapshot = false;
            let mut asks = Vec::new();
            let mut bids = Vec::new();
            for part in &arr[1..arr.len() - 2] {
                let obj = part.as_object()?;
                if let Some(rows) = obj.get("as") {
                    snapshot = true;
                    parse_book_rows(rows, &mut asks)?;
                }
                if let Some(rows) = obj.get("bs") {
                    snapshot = true;
                    parse_book_rows(rows, &mut bids)?;
                }
                if let Some(rows) = obj.get("a") {
                    parse_book_rows(rows, &mut asks)?;
                }
                if let Some(rows) = obj.get("b") {
                    parse_book_rows(rows, &mut bids)?;
                }
            }
            return Some(if snapshot {
                WsEvent::BookSnapshot { pair, asks, bids }
            } else {
                WsEvent::BookUpdate { pair, asks, bids }
            });
        }

        Some(WsEvent::Ignored)
    }
}

impl WsProtocol for KrakenWsProtocol {
    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    fn subscribe_frame(&self, sub: &WsSubscription) -> ExchangeResult<String> {
        self.frame("subscribe", sub)
    }

    fn unsubscribe_frame(&self, sub: &WsSubscription) -> ExchangeResult<String> {
        self.frame("unsubscribe", sub)
    }

    fn classify(&self, raw: &str) -> WsEvent {
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => return WsEvent::Error(format!("Malformed frame: {}", e)),
        };

        if value.is_array() {
            return self.classify_data(&value, raw);
        }

        match value.get("event").and_then(Value::as_str) {
            Some("heartbeat") | Some("pong") | Some("systemStatus") => WsEvent::Heartbeat,
            Some("subscriptionStatus") => self.classify_status(&value, raw),
            Some(_) => WsEvent::Ignored,
            None => WsEvent::Error(format!("Frame without event field: {}", preview(raw))),
        }
    }
}

/// 정규화된 거래 쌍을 Kraken wsname으로 바꿉니다.
fn to_ws_name(pair: &TradablePair) -> String {
    format!(
        "{}/{}",
        to_ws_asset(pair.asset()),
        to_ws_asset(pair.price_unit())
    )
}

fn to_ws_asset(asset: &str) -> &str {
    match asset {
        "BTC" => "XBT",
        other => other,
    }
}

fn from_ws_asset(asset: &str) -> &str {
    match asset {
        "XBT" => "BTC",
        other => other,
    }
}

/// `XBT/USD` 형태의 wsname을 정규화된 거래 쌍으로 해석합니다.
fn pair_from_ws_name(name: &str) -> Option<TradablePair> {
    let (asset, unit) = name.split_once('/')?;
    if asset.is_empty() || unit.is_empty() {
        return None;
    }
    Some(TradablePair::new(from_ws_asset(asset), from_ws_asset(unit)))
}

/// Kraken 분 단위 간격을 [`OhlcvInterval`]로 변환합니다.
fn interval_from_minutes(minutes: u32) -> Option<OhlcvInterval> {
    match minutes {
        1 => Some(OhlcvInterval::M1),
        5 => Some(OhlcvInterval::M5),
        15 => Some(OhlcvInterval::M15),
        30 => Some(OhlcvInterval::M30),
        60 => Some(OhlcvInterval::H1),
        240 => Some(OhlcvInterval::H4),
        1440 => Some(OhlcvInterval::D1),
        _ => None,
    }
}

fn parse_decimal_field(value: &Value) -> Option<Decimal> {
    value.as_str()?.parse().ok()
}

/// `[[price, volume, timestamp, ..], ..]` 형태의 호가 행을 수집합니다.
fn parse_book_rows(rows: &Value, out: &mut Vec<(Decimal, Decimal)>) -> Option<()> {
    for row in rows.as_array()? {
        let row = row.as_array()?;
        if row.len() < 2 {
            return None;
        }
        let price = parse_decimal_field(&row[0])?;
        let volume = parse_decimal_field(&row[1])?;
        out.push((price, volume));
    }
    Some(())
}

/// 로그에 남길 프레임 미리보기.
fn preview(raw: &str) -> String {
    raw.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn protocol() -> KrakenWsProtocol {
        KrakenWsProtocol::new()
    }

    fn btc_usd() -> TradablePair {
        TradablePair::new("BTC", "USD")
    }

    #[test]
    fn test_subscribe_frame_uses_kraken_ws_name() {
        let frame = protocol()
            .subscribe_frame(&WsSubscription::price(btc_usd()))
            .unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();

        assert_eq!(value["event"], "subscribe");
        assert_eq!(value["pair"][0], "XBT/USD");
        assert_eq!(value["subscription"]["name"], "ticker");
        assert!(value["subscription"].get("interval").is_none());
    }

    #[test]
    fn test_subscribe_frame_ohlc_carries_interval() {
        let frame = protocol()
            .subscribe_frame(&WsSubscription::ohlcv(btc_usd(), OhlcvInterval::M5))
            .unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();

        assert_eq!(value["subscription"]["name"], "ohlc");
        assert_eq!(value["subscription"]["interval"], 5);
    }

    #[test]
    fn test_subscribe_frame_book_carries_depth() {
        let frame = protocol()
            .with_book_depth(25)
            .subscribe_frame(&WsSubscription::order_book(btc_usd()))
            .unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();

        assert_eq!(value["subscription"]["name"], "book");
        assert_eq!(value["subscription"]["depth"], 25);
    }

    #[test]
    fn test_unsubscribe_frame() {
        let frame = protocol()
            .unsubscribe_frame(&WsSubscription::price(btc_usd()))
            .unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();

        assert_eq!(value["event"], "unsubscribe");
    }

    #[test]
    fn test_classify_heartbeat_and_system_status() {
        assert!(matches!(
            protocol().classify(r#"{"event":"heartbeat"}"#),
            WsEvent::Heartbeat
        ));
        assert!(matches!(
            protocol().classify(
                r#"{"connectionID":8628615390848610000,"event":"systemStatus","status":"online","version":"1.0.0"}"#
            ),
            WsEvent::Heartbeat
        ));
    }

    #[test]
    fn test_classify_subscription_ack() {
        let raw = r#"{"channelID":10001,"channelName":"ohlc-5","event":"subscriptionStatus","pair":"XBT/USD","status":"subscribed","subscription":{"interval":5,"name":"ohlc"}}"#;

        match protocol().classify(raw) {
            WsEvent::Subscribed(sub) => {
                assert_eq!(sub.pair, btc_usd());
                assert_eq!(sub.channel, WsChannel::Ohlcv(OhlcvInterval::M5));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_classify_subscription_error() {
        let raw = r#"{"errorMessage":"Subscription depth not supported","event":"subscriptionStatus","pair":"XBT/USD","status":"error","subscription":{"depth":42,"name":"book"}}"#;

        match protocol().classify(raw) {
            WsEvent::Error(msg) => assert_eq!(msg, "Subscription depth not supported"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_classify_ticker() {
        let raw = r#"[0,{"a":["5525.40000",1,"1.000"],"b":["5525.10000",1,"1.000"],"c":["5525.10000","0.00398000"],"v":["2634.11501494","3591.17907851"],"p":["5631.44067","5653.78939"],"t":[11493,16267],"l":["5505.00000","5505.00000"],"h":["5783.00000","5783.00000"],"o":["5760.70000","5763.40000"]},"ticker","XBT/USD"]"#;

        match protocol().classify(raw) {
            WsEvent::Price { pair, price } => {
                assert_eq!(pair, btc_usd());
                assert_eq!(price, dec!(5525.10000));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_classify_ohlc_candle() {
        let raw = r#"[42,["1542057314.748456","1542057360.435743","3586.70000","3586.70000","3586.60000","3586.60000","3586.68894","0.03373000",2],"ohlc-5","XBT/USD"]"#;

        match protocol().classify(raw) {
            WsEvent::Candle {
                pair,
                interval,
                candle,
            } => {
                assert_eq!(pair, btc_usd());
                assert_eq!(interval, OhlcvInterval::M5);
                assert_eq!(candle.open, dec!(3586.70000));
                assert_eq!(candle.close, dec!(3586.60000));
                assert_eq!(candle.volume, dec!(0.03373000));
                assert_eq!(candle.timestamp.timestamp(), 1542057314);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_classify_book_snapshot() {
        let raw = r#"[0,{"as":[["5541.30000","2.50700000","1534614248.123678"],["5541.80000","0.33000000","1534614098.345543"]],"bs":[["5541.20000","1.52900000","1534614248.765567"],["5539.90000","0.30000000","1534614241.769870"]]},"book-100","XBT/USD"]"#;

        match protocol().classify(raw) {
            WsEvent::BookSnapshot { pair, asks, bids } => {
                assert_eq!(pair, btc_usd());
                assert_eq!(asks.len(), 2);
                assert_eq!(asks[0], (dec!(5541.30000), dec!(2.50700000)));
                assert_eq!(bids[0], (dec!(5541.20000), dec!(1.52900000)));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_classify_book_update_with_split_sides() {
        let raw = r#"[1234,{"a":[["5541.30000","0.00000000","1534614335.345903"]]},{"b":[["5541.30000","0.40100000","1534614335.345903"]]},"book-10","XBT/USD"]"#;

        match protocol().classify(raw) {
            WsEvent::BookUpdate { asks, bids, .. } => {
                // 수량 0은 레벨 삭제로 전달됨
                assert_eq!(asks[0], (dec!(5541.30000), dec!(0.00000000)));
                assert_eq!(bids[0], (dec!(5541.30000), dec!(0.40100000)));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_classify_malformed_frame() {
        assert!(matches!(
            protocol().classify("{not json"),
            WsEvent::Error(_)
        ));
        assert!(matches!(
            protocol().classify(r#"[0,"ticker"]"#),
            WsEvent::Error(_)
        ));
    }

    #[test]
    fn test_classify_unknown_event_ignored() {
        assert!(matches!(
            protocol().classify(r#"{"event":"somethingNew"}"#),
            WsEvent::Ignored
        ));
    }

    #[test]
    fn test_ws_name_mapping() {
        assert_eq!(to_ws_name(&TradablePair::new("BTC", "USD")), "XBT/USD");
        assert_eq!(to_ws_name(&TradablePair::new("ETH", "BTC")), "ETH/XBT");
        assert_eq!(
            pair_from_ws_name("ETH/XBT"),
            Some(TradablePair::new("ETH", "BTC"))
        );
        assert_eq!(pair_from_ws_name("XBTUSD"), None);
    }
}
