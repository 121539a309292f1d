//! Kraken 거래소 커넥터.
//!
//! Kraken Spot REST API 구현. 공개 시장 데이터와 개인 계좌/주문
//! 엔드포인트를 모두 지원합니다. 실시간 스트리밍은
//! [`KrakenWsProtocol`](crate::websocket::KrakenWsProtocol)이 담당합니다.

use crate::error::ExchangeError;
use crate::traits::{Exchange, ExchangeResult};
use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use marlin_core::{
    Balances, ExchangeStatus, OhlcvData, OhlcvInterval, OrderBookEntry, OrderBookSide,
    OrderBookState, OrderDescription, OrderType, TradablePair, TradeAction, TradeDescription,
};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256, Sha512};
use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info};

type HmacSha512 = Hmac<Sha512>;

const DEFAULT_BASE_URL: &str = "https://api.kraken.com";

// ============================================================================
// 설정
// ============================================================================

/// Kraken 클라이언트 설정.
///
/// # 보안
/// - `Debug` 구현은 민감 정보(`api_key`, `api_secret`)를 마스킹합니다.
#[derive(Clone)]
pub struct KrakenConfig {
    /// API 키
    pub api_key: String,
    /// API 시크릿 (base64)
    pub api_secret: String,
    /// REST API 기본 URL
    pub base_url: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

impl fmt::Debug for KrakenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let masked_key = if self.api_key.len() > 8 {
            format!(
                "{}...{}",
                &self.api_key[..4],
                &self.api_key[self.api_key.len() - 4..]
            )
        } else {
            "***REDACTED***".to_string()
        };

        f.debug_struct("KrakenConfig")
            .field("api_key", &masked_key)
            .field("api_secret", &"***REDACTED***")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl KrakenConfig {
    /// 새 설정 생성.
    pub fn new(api_key: String, api_secret: String) -> Self {
        Self {
            api_key,
            api_secret,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }

    /// 공개 엔드포인트 전용 설정 (자격 증명 없음).
    pub fn public_only() -> Self {
        Self::new(String::new(), String::new())
    }

    /// 기본 URL 변경 (테스트용).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// 환경 변수에서 생성.
    pub fn from_env() -> Option<Self> {
        Some(Self::new(
            std::env::var("KRAKEN_API_KEY").ok()?,
            std::env::var("KRAKEN_API_SECRET").ok()?,
        ))
    }
}

// ============================================================================
// API 응답 타입
// ============================================================================

/// 모든 Kraken 응답을 감싸는 공통 봉투.
#[derive(Debug, Deserialize)]
struct KrakenResponse<T> {
    #[serde(default)]
    error: Vec<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct SystemStatusResult {
    status: String,
}

#[derive(Debug, Deserialize)]
struct AssetPairInfo {
    /// "XBT/USD" 형태의 웹소켓 쌍 이름. 다크풀 쌍에는 없습니다.
    wsname: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TickerInfo {
    /// 최근 체결 [가격, 수량]
    c: Vec<String>,
    /// 금일 시가
    o: String,
    /// 고가 [금일, 최근 24시간]
    h: Vec<String>,
    /// 저가 [금일, 최근 24시간]
    l: Vec<String>,
    /// 거래량 [금일, 최근 24시간]
    v: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DepthResult {
    asks: Vec<(String, String, i64)>,
    bids: Vec<(String, String, i64)>,
}

#[derive(Debug, Deserialize)]
struct FeeInfo {
    fee: String,
}

#[derive(Debug, Deserialize)]
struct TradeVolumeResult {
    #[serde(default)]
    fees: HashMap<String, FeeInfo>,
}

#[derive(Debug, Deserialize)]
struct OrderDescr {
    pair: String,
    #[serde(rename = "type")]
    side: String,
    price: String,
}

#[derive(Debug, Deserialize)]
struct OrderInfo {
    descr: OrderDescr,
    vol: String,
}

#[derive(Debug, Deserialize)]
struct OpenOrdersResult {
    open: HashMap<String, OrderInfo>,
}

#[derive(Debug, Deserialize)]
struct ClosedOrdersResult {
    closed: HashMap<String, OrderInfo>,
}

#[derive(Debug, Deserialize)]
struct AddOrderResult {
    txid: Vec<String>,
}

// ============================================================================
// Kraken 클라이언트
// ============================================================================

/// Kraken 거래소 클라이언트.
pub struct KrakenClient {
    config: KrakenConfig,
    client: Client,
}

impl KrakenClient {
    /// 새 Kraken 클라이언트 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `ExchangeError::NetworkError`를 반환합니다.
    pub fn new(config: KrakenConfig) -> ExchangeResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                ExchangeError::NetworkError(format!("failed to build HTTP client: {}", e))
            })?;

        Ok(Self { config, client })
    }

    /// 환경 변수에서 생성.
    pub fn from_env() -> Option<Self> {
        KrakenConfig::from_env().and_then(|config| Self::new(config).ok())
    }

    /// 현재 타임스탬프(밀리초) 반환. 논스로 사용합니다.
    fn nonce_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards")
            .as_millis() as u64
    }

    /// 개인 엔드포인트 요청 서명.
    ///
    /// `API-Sign = base64(HMAC-SHA512(base64(secret), path + SHA256(nonce + body)))`
    fn sign(&self, path: &str, nonce: &str, body: &str) -> ExchangeResult<String> {
        let secret = base64::engine::general_purpose::STANDARD
            .decode(&self.config.api_secret)
            .map_err(|_| {
                ExchangeError::Unauthorized("API secret is not valid base64".to_string())
            })?;

        let mut sha = Sha256::new();
        sha.update(nonce.as_bytes());
        sha.update(body.as_bytes());
        let digest = sha.finalize();

        let mut mac = HmacSha512::new_from_slice(&secret).expect("Invalid key");
        mac.update(path.as_bytes());
        mac.update(&digest);
        Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
    }

    /// 파라미터에서 쿼리 문자열 생성.
    fn build_query(params: &[(&str, String)]) -> String {
        params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// 공개 API 요청 (인증 불필요).
    async fn public_get<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> ExchangeResult<T> {
        let query = Self::build_query(params);
        let url = if query.is_empty() {
            format!("{}{}", self.config.base_url, path)
        } else {
            format!("{}{}?{}", self.config.base_url, path, query)
        };

        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ExchangeError::NetworkError(e.to_string()))?;

        self.handle_response(response).await
    }

    /// 서명된 개인 API 요청.
    async fn private_post<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> ExchangeResult<T> {
        if self.config.api_key.is_empty() || self.config.api_secret.is_empty() {
            return Err(ExchangeError::Unauthorized(
                "API credentials not configured".to_string(),
            ));
        }

        let nonce = Self::nonce_ms().to_string();
        let mut form: Vec<(&str, String)> = vec![("nonce", nonce.clone())];
        form.extend_from_slice(params);
        let body = Self::build_query(&form);
        let signature = self.sign(path, &nonce, &body)?;

        debug!("POST (signed) {}", path);

        let response = self
            .client
            .post(format!("{}{}", self.config.base_url, path))
            .header("API-Key", &self.config.api_key)
            .header("API-Sign", signature)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| ExchangeError::NetworkError(e.to_string()))?;

        self.handle_response(response).await
    }

    /// API 응답 처리.
    ///
    /// Kraken은 HTTP 상태와 무관하게 `{"error": [...], "result": ...}`
    /// 봉투를 사용하므로 `result` 접근 전에 에러 배열을 먼저 확인합니다.
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> ExchangeResult<T> {
        let body = response
            .text()
            .await
            .map_err(|e| ExchangeError::NetworkError(e.to_string()))?;

        let envelope: KrakenResponse<T> = serde_json::from_str(&body).map_err(|e| {
            error!("Failed to parse response: {} - Body: {}", e, body);
            ExchangeError::ParseError(e.to_string())
        })?;

        if let Some(message) = envelope.error.first() {
            return Err(ExchangeError::ApiError(message.clone()));
        }
        envelope
            .result
            .ok_or_else(|| ExchangeError::ParseError("response missing result".to_string()))
    }

    /// 거래 쌍을 Kraken REST 심볼로 변환. Kraken은 BTC를 XBT로 표기합니다.
    fn to_kraken_symbol(pair: &TradablePair) -> String {
        let asset = if pair.asset() == "BTC" {
            "XBT"
        } else {
            pair.asset()
        };
        format!("{}{}", asset, pair.price_unit())
    }

    /// Kraken 자산 코드를 표준 심볼로 변환 (ZUSD -> USD, XXBT -> BTC).
    fn from_kraken_asset(code: &str) -> String {
        let code = match code.len() {
            4 if code.starts_with('X') || code.starts_with('Z') => &code[1..],
            _ => code,
        };
        match code {
            "XBT" => "BTC".to_string(),
            _ => code.to_string(),
        }
    }

    fn parse_decimal(value: &str, field: &str) -> ExchangeResult<Decimal> {
        value.parse().map_err(|_| {
            ExchangeError::ParseError(format!("invalid decimal in {}: {}", field, value))
        })
    }

    /// 티커의 [금일, 최근 24시간] 배열에서 24시간 값을 읽습니다.
    fn last_24h(values: &[String], field: &str) -> ExchangeResult<Decimal> {
        let value = values.get(1).ok_or_else(|| {
            ExchangeError::ParseError(format!("ticker {} missing 24h value", field))
        })?;
        Self::parse_decimal(value, field)
    }

    fn parse_side(side: &str) -> ExchangeResult<TradeAction> {
        match side {
            "buy" => Ok(TradeAction::Buy),
            "sell" => Ok(TradeAction::Sell),
            other => Err(ExchangeError::ParseError(format!(
                "unknown order side: {}",
                other
            ))),
        }
    }

    /// OHLC 행 `[time, open, high, low, close, vwap, volume, count]` 파싱.
    fn parse_ohlc_row(row: &Value) -> ExchangeResult<OhlcvData> {
        let ts = row
            .get(0)
            .and_then(Value::as_i64)
            .ok_or_else(|| ExchangeError::ParseError("OHLC row missing timestamp".to_string()))?;
        let timestamp = DateTime::from_timestamp(ts, 0).ok_or_else(|| {
            ExchangeError::ParseError(format!("OHLC timestamp out of range: {}", ts))
        })?;

        let field = |index: usize, name: &str| -> ExchangeResult<Decimal> {
            row.get(index)
                .and_then(Value::as_str)
                .ok_or_else(|| ExchangeError::ParseError(format!("OHLC row missing {}", name)))
                .and_then(|s| Self::parse_decimal(s, name))
        };

        Ok(OhlcvData::new(
            timestamp,
            field(1, "open")?,
            field(2, "high")?,
            field(3, "low")?,
            field(4, "close")?,
            field(6, "volume")?,
        ))
    }

    /// Ticker 응답에서 첫 쌍의 정보를 꺼냅니다.
    async fn fetch_ticker(&self, pair: &TradablePair) -> ExchangeResult<TickerInfo> {
        let result: HashMap<String, TickerInfo> = self
            .public_get(
                "/0/public/Ticker",
                &[("pair", Self::to_kraken_symbol(pair))],
            )
            .await?;

        result
            .into_values()
            .next()
            .ok_or_else(|| ExchangeError::ParseError("Ticker response missing pair".to_string()))
    }

    fn order_descriptions(
        orders: HashMap<String, OrderInfo>,
    ) -> ExchangeResult<Vec<OrderDescription>> {
        orders
            .into_iter()
            .map(|(order_id, info)| {
                Ok(OrderDescription::new(
                    order_id,
                    info.descr.pair,
                    Self::parse_side(&info.descr.side)?,
                    Self::parse_decimal(&info.descr.price, "order price")?,
                    Self::parse_decimal(&info.vol, "order volume")?,
                ))
            })
            .collect()
    }
}

#[async_trait]
impl Exchange for KrakenClient {
    fn name(&self) -> &str {
        "kraken"
    }

    async fn get_status(&self) -> ExchangeResult<ExchangeStatus> {
        let result: SystemStatusResult = self.public_get("/0/public/SystemStatus", &[]).await?;

        Ok(match result.status.as_str() {
            "online" => ExchangeStatus::Online,
            "cancel_only" => ExchangeStatus::CancelOnly,
            "post_only" => ExchangeStatus::PostOnly,
            _ => ExchangeStatus::Maintenance,
        })
    }

    async fn get_tradable_pairs(&self) -> ExchangeResult<Vec<TradablePair>> {
        let result: HashMap<String, AssetPairInfo> =
            self.public_get("/0/public/AssetPairs", &[]).await?;

        Ok(result
            .into_values()
            .filter_map(|info| {
                let wsname = info.wsname?;
                let (asset, unit) = wsname.split_once('/')?;
                Some(TradablePair::new(
                    Self::from_kraken_asset(asset),
                    Self::from_kraken_asset(unit),
                ))
            })
            .collect())
    }

    async fn get_24h_stats(&self, pair: &TradablePair) -> ExchangeResult<OhlcvData> {
        let ticker = self.fetch_ticker(pair).await?;

        let close = ticker
            .c
            .first()
            .ok_or_else(|| ExchangeError::ParseError("ticker missing close price".to_string()))
            .and_then(|s| Self::parse_decimal(s, "close"))?;

        Ok(OhlcvData::new(
            Utc::now() - Duration::days(1),
            Self::parse_decimal(&ticker.o, "open")?,
            Self::last_24h(&ticker.h, "high")?,
            Self::last_24h(&ticker.l, "low")?,
            close,
            Self::last_24h(&ticker.v, "volume")?,
        ))
    }

    async fn get_ohlcv(
        &self,
        pair: &TradablePair,
        interval: OhlcvInterval,
        count: usize,
    ) -> ExchangeResult<Vec<OhlcvData>> {
        let result: HashMap<String, Value> = self
            .public_get(
                "/0/public/OHLC",
                &[
                    ("pair", Self::to_kraken_symbol(pair)),
                    ("interval", interval.to_kraken_minutes().to_string()),
                ],
            )
            .await?;

        // 결과 맵에는 쌍 키와 "last" 커서가 함께 들어있음
        let rows = result
            .iter()
            .find(|(key, _)| key.as_str() != "last")
            .and_then(|(_, value)| value.as_array())
            .ok_or_else(|| {
                ExchangeError::ParseError("OHLC response missing pair data".to_string())
            })?;

        let mut candles = rows
            .iter()
            .map(Self::parse_ohlc_row)
            .collect::<ExchangeResult<Vec<_>>>()?;

        // Kraken은 과거부터 반환, 계약은 최신 우선
        candles.reverse();
        candles.truncate(count);
        Ok(candles)
    }

    async fn get_price(&self, pair: &TradablePair) -> ExchangeResult<Decimal> {
        let ticker = self.fetch_ticker(pair).await?;
        ticker
            .c
            .first()
            .ok_or_else(|| ExchangeError::ParseError("ticker missing close price".to_string()))
            .and_then(|s| Self::parse_decimal(s, "price"))
    }

    async fn get_order_book(
        &self,
        pair: &TradablePair,
        depth: usize,
    ) -> ExchangeResult<OrderBookState> {
        let result: HashMap<String, DepthResult> = self
            .public_get(
                "/0/public/Depth",
                &[
                    ("pair", Self::to_kraken_symbol(pair)),
                    ("count", depth.to_string()),
                ],
            )
            .await?;

        let book = result.into_values().next().ok_or_else(|| {
            ExchangeError::ParseError("Depth response missing pair data".to_string())
        })?;

        let entry = |side: OrderBookSide,
                     (price, volume, ts): (String, String, i64)|
         -> ExchangeResult<OrderBookEntry> {
            let mut entry = OrderBookEntry::new(
                side,
                Self::parse_decimal(&price, "book price")?,
                Self::parse_decimal(&volume, "book volume")?,
            );
            if let Some(timestamp) = DateTime::from_timestamp(ts, 0) {
                entry = entry.with_timestamp(timestamp);
            }
            Ok(entry)
        };

        let asks = book
            .asks
            .into_iter()
            .map(|row| entry(OrderBookSide::Ask, row))
            .collect::<ExchangeResult<Vec<_>>>()?;
        let bids = book
            .bids
            .into_iter()
            .map(|row| entry(OrderBookSide::Bid, row))
            .collect::<ExchangeResult<Vec<_>>>()?;

        Ok(OrderBookState::reconstruct(asks, bids, depth))
    }

    async fn get_fee(&self, pair: &TradablePair) -> ExchangeResult<Decimal> {
        let result: TradeVolumeResult = self
            .private_post(
                "/0/private/TradeVolume",
                &[
                    ("pair", Self::to_kraken_symbol(pair)),
                    ("fee-info", "true".to_string()),
                ],
            )
            .await?;

        let fee = result.fees.into_values().next().ok_or_else(|| {
            ExchangeError::ParseError("TradeVolume response missing fee info".to_string())
        })?;
        Self::parse_decimal(&fee.fee, "fee")
    }

    async fn get_balances(&self) -> ExchangeResult<Balances> {
        let result: HashMap<String, String> = self.private_post("/0/private/Balance", &[]).await?;

        result
            .into_iter()
            .map(|(code, amount)| {
                Ok((
                    Self::from_kraken_asset(&code),
                    Self::parse_decimal(&amount, "balance")?,
                ))
            })
            .collect()
    }

    async fn get_open_orders(&self) -> ExchangeResult<Vec<OrderDescription>> {
        let result: OpenOrdersResult = self.private_post("/0/private/OpenOrders", &[]).await?;
        Self::order_descriptions(result.open)
    }

    async fn get_closed_orders(&self) -> ExchangeResult<Vec<OrderDescription>> {
        let result: ClosedOrdersResult = self.private_post("/0/private/ClosedOrders", &[]).await?;
        Self::order_descriptions(result.closed)
    }

    async fn add_order(&self, trade: &TradeDescription) -> ExchangeResult<String> {
        let ordertype = match trade.order_type {
            OrderType::Limit => "limit",
            OrderType::Market => "market",
            OrderType::StopLoss => "stop-loss",
            OrderType::TakeProfit => "take-profit",
        };

        let mut params = vec![
            ("pair", Self::to_kraken_symbol(&trade.pair)),
            ("type", trade.action.to_string().to_lowercase()),
            ("ordertype", ordertype.to_string()),
            ("volume", trade.volume.to_string()),
        ];
        if !matches!(trade.order_type, OrderType::Market) {
            params.push(("price", trade.asset_price.to_string()));
        }

        info!(
            "Placing {} {} order for {} {} @ {}",
            trade.action, ordertype, trade.volume, trade.pair, trade.asset_price
        );

        let result: AddOrderResult = self.private_post("/0/private/AddOrder", &params).await?;
        let txid = result.txid.into_iter().next().ok_or_else(|| {
            ExchangeError::ParseError("AddOrder response missing txid".to_string())
        })?;

        info!("Order placed successfully: {}", txid);
        Ok(txid)
    }

    async fn cancel_order(&self, order_id: &str) -> ExchangeResult<()> {
        let _: Value = self
            .private_post(
                "/0/private/CancelOrder",
                &[("txid", order_id.to_string())],
            )
            .await?;

        info!("Order {} cancelled", order_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server, ServerGuard};
    use rust_decimal_macros::dec;

    fn btc_usd() -> TradablePair {
        TradablePair::new("BTC", "USD")
    }

    async fn test_client(server: &ServerGuard) -> KrakenClient {
        // "a2V5"는 유효한 base64여야 서명이 동작함
        let config =
            KrakenConfig::new("key".to_string(), "a2V5".to_string()).with_base_url(server.url());
        KrakenClient::new(config).unwrap()
    }

    #[test]
    fn test_sign_matches_documented_example() {
        // Kraken API 문서의 공식 서명 예제
        let config = KrakenConfig::new(
            "key".to_string(),
            "kQH5HW/8p1uGOVjbgWA7FunAmGO8lsSUXNsu3eow76sz84Q18fWxnyRzBHCd3pd5nE9qa99HAZtuZuj6F1huXg==".to_string(),
        );
        let client = KrakenClient::new(config).unwrap();

        let signature = client
            .sign(
                "/0/private/AddOrder",
                "1616492376594",
                "nonce=1616492376594&ordertype=limit&pair=XBTUSD&price=37500&type=buy&volume=1.25",
            )
            .unwrap();

        assert_eq!(
            signature,
            "4/dpxb3iT4tp/ZCVEwSnEsLxx0bqyhLpdfOpc6fn7OR8+UClSV5n9E6aSS8MPtnRfPeXJTZlLdOOdFttlhTfvA=="
        );
    }

    #[test]
    fn test_config_debug_masks_credentials() {
        let config = KrakenConfig::new("ABCDEFGHIJKL".to_string(), "topsecret".to_string());
        let output = format!("{:?}", config);

        assert!(!output.contains("topsecret"));
        assert!(!output.contains("ABCDEFGHIJKL"));
        assert!(output.contains("ABCD...IJKL"));
    }

    #[test]
    fn test_asset_code_normalization() {
        assert_eq!(KrakenClient::from_kraken_asset("ZUSD"), "USD");
        assert_eq!(KrakenClient::from_kraken_asset("XXBT"), "BTC");
        assert_eq!(KrakenClient::from_kraken_asset("XETH"), "ETH");
        assert_eq!(KrakenClient::from_kraken_asset("SOL"), "SOL");
        assert_eq!(KrakenClient::to_kraken_symbol(&btc_usd()), "XBTUSD");
    }

    #[tokio::test]
    async fn test_error_envelope_checked_first() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/0/public/Ticker")
            .match_query(Matcher::Any)
            .with_body(r#"{"error":["This is an error"],"result":{}}"#)
            .create_async()
            .await;

        let client = test_client(&server).await;
        let err = client.get_price(&btc_usd()).await.unwrap_err();

        assert!(matches!(
            err,
            ExchangeError::ApiError(ref message) if message == "This is an error"
        ));
    }

    #[tokio::test]
    async fn test_get_status_online() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/0/public/SystemStatus")
            .with_body(
                r#"{"error":[],"result":{"status":"online","timestamp":"2022-07-05T16:44:53Z"}}"#,
            )
            .create_async()
            .await;

        let client = test_client(&server).await;
        assert_eq!(
            client.get_status().await.unwrap(),
            ExchangeStatus::Online
        );
    }

    #[tokio::test]
    async fn test_get_tradable_pairs() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/0/public/AssetPairs")
            .with_body(
                r#"{"error":[],"result":{
                    "XETHXXBT":{"wsname":"ETH/XBT","base":"XETH","quote":"XXBT"},
                    "XXBTZUSD":{"wsname":"XBT/USD","base":"XXBT","quote":"ZUSD"},
                    "DARKPOOL.d":{"base":"XXBT","quote":"ZUSD"}
                }}"#,
            )
            .create_async()
            .await;

        let client = test_client(&server).await;
        let pairs = client.get_tradable_pairs().await.unwrap();

        assert_eq!(pairs.len(), 2);
        assert!(pairs.contains(&TradablePair::new("ETH", "BTC")));
        assert!(pairs.contains(&TradablePair::new("BTC", "USD")));
    }

    #[tokio::test]
    async fn test_get_price() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/0/public/Ticker")
            .match_query(Matcher::Any)
            .with_body(
                r#"{"error":[],"result":{"XXBTZUSD":{
                    "a":["20140.10000","1","1.000"],
                    "b":["20137.10000","3","3.000"],
                    "c":["20137.2","0.00080000"],
                    "v":["2645.60session","2812.04050934"],
                    "p":["20218.93809","20221.98105"],
                    "t":[21232,22925],
                    "l":["19868.00000","19753.00000"],
                    "h":["20846.40000","20986.00000"],
                    "o":"20288.20000"
                }}}"#,
            )
            .create_async()
            .await;

        let client = test_client(&server).await;
        assert_eq!(client.get_price(&btc_usd()).await.unwrap(), dec!(20137.2));
    }

    #[tokio::test]
    async fn test_get_24h_stats() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/0/public/Ticker")
            .match_query(Matcher::Any)
            .with_body(
                r#"{"error":[],"result":{"XXBTZUSD":{
                    "c":["20137.2","0.00080000"],
                    "v":["2645.6","2812.04050934"],
                    "l":["19868.00000","19753.00000"],
                    "h":["20846.40000","20986.00000"],
                    "o":"20288.20000"
                }}}"#,
            )
            .create_async()
            .await;

        let client = test_client(&server).await;
        let stats = client.get_24h_stats(&btc_usd()).await.unwrap();

        assert_eq!(stats.open, dec!(20288.2));
        assert_eq!(stats.high, dec!(20986));
        assert_eq!(stats.low, dec!(19753));
        assert_eq!(stats.close, dec!(20137.2));
        assert_eq!(stats.volume, dec!(2812.04050934));
    }

    #[tokio::test]
    async fn test_get_ohlcv_most_recent_first() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/0/public/OHLC")
            .match_query(Matcher::Any)
            .with_body(
                r#"{"error":[],"result":{
                    "XXBTZUSD":[
                        [1657043100,"19693.4","19694.8","19666.7","19694.5","19684.1","8.42135430",172],
                        [1657043400,"19694.5","19757.8","19692.1","19707.8","19719.8","11.59346902",272],
                        [1657043700,"19703.5","19720.0","19682.1","19683.6","19694.6","3.38715290",131]
                    ],
                    "last":1657043400
                }}"#,
            )
            .create_async()
            .await;

        let client = test_client(&server).await;
        let candles = client
            .get_ohlcv(&btc_usd(), OhlcvInterval::M5, 3)
            .await
            .unwrap();

        assert_eq!(candles.len(), 3);
        // 최신 캔들이 먼저
        assert_eq!(candles[0].timestamp.timestamp(), 1657043700);
        assert_eq!(candles[0].open, dec!(19703.5));
        assert_eq!(candles[0].volume, dec!(3.38715290));
        assert_eq!(candles[2].timestamp.timestamp(), 1657043100);

        // count보다 많으면 잘라냄
        let truncated = client
            .get_ohlcv(&btc_usd(), OhlcvInterval::M5, 2)
            .await
            .unwrap();
        assert_eq!(truncated.len(), 2);
        assert_eq!(truncated[1].timestamp.timestamp(), 1657043400);
    }

    #[tokio::test]
    async fn test_get_order_book() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/0/public/Depth")
            .match_query(Matcher::Any)
            .with_body(
                r#"{"error":[],"result":{"XXBTZUSD":{
                    "asks":[["52523.00000","1.199",1616663113],["52536.00000","0.300",1616663112]],
                    "bids":[["52522.90000","0.753",1616663112],["52522.80000","0.006",1616663109]]
                }}}"#,
            )
            .create_async()
            .await;

        let client = test_client(&server).await;
        let book = client.get_order_book(&btc_usd(), 2).await.unwrap();

        assert_eq!(book.depth(), 2);
        assert_eq!(book.best_ask().unwrap().price, dec!(52523));
        assert_eq!(book.best_bid().unwrap().price, dec!(52522.9));
        assert_eq!(book.spread(), Some(dec!(0.1)));
        assert!(book.best_ask().unwrap().timestamp.is_some());
    }

    #[tokio::test]
    async fn test_get_fee() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/0/private/TradeVolume")
            .with_body(
                r#"{"error":[],"result":{
                    "currency":"ZUSD",
                    "volume":"200709587.4223",
                    "fees":{"XXBTZUSD":{"fee":"0.2000","minfee":"0.1000"}}
                }}"#,
            )
            .create_async()
            .await;

        let client = test_client(&server).await;
        assert_eq!(client.get_fee(&btc_usd()).await.unwrap(), dec!(0.20));
    }

    #[tokio::test]
    async fn test_get_balances_normalizes_assets() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/0/private/Balance")
            .with_body(
                r#"{"error":[],"result":{
                    "ZUSD":"171288.6158",
                    "XXBT":"1011.1908877900",
                    "XETH":"818.550"
                }}"#,
            )
            .create_async()
            .await;

        let client = test_client(&server).await;
        let balances = client.get_balances().await.unwrap();

        assert_eq!(balances["USD"], dec!(171288.6158));
        assert_eq!(balances["BTC"], dec!(1011.1908877900));
        assert_eq!(balances["ETH"], dec!(818.550));
    }

    #[tokio::test]
    async fn test_get_open_and_closed_orders() {
        let mut server = Server::new_async().await;
        let _open = server
            .mock("POST", "/0/private/OpenOrders")
            .with_body(
                r#"{"error":[],"result":{"open":{
                    "OB5VMBB4U2UDK2WRW":{"descr":{"pair":"ETHUSD","type":"sell","price":"1450.0"},"vol":"0.275"},
                    "OQCLMLBW3P3BUCMWZ":{"descr":{"pair":"XBTUSD","type":"buy","price":"30010.0"},"vol":"1.25"}
                }}}"#,
            )
            .create_async()
            .await;
        let _closed = server
            .mock("POST", "/0/private/ClosedOrders")
            .with_body(
                r#"{"error":[],"result":{"closed":{
                    "OQCLMLBW3P3BUCMWZ":{"descr":{"pair":"XBTUSD","type":"buy","price":"30010.0"},"vol":"1.25"}
                }}}"#,
            )
            .create_async()
            .await;

        let client = test_client(&server).await;

        let open = client.get_open_orders().await.unwrap();
        assert_eq!(open.len(), 2);
        let sell = open
            .iter()
            .find(|o| o.order_id == "OB5VMBB4U2UDK2WRW")
            .unwrap();
        assert_eq!(sell.symbol, "ETHUSD");
        assert_eq!(sell.action, TradeAction::Sell);
        assert_eq!(sell.price, dec!(1450.0));
        assert_eq!(sell.volume, dec!(0.275));

        let closed = client.get_closed_orders().await.unwrap();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].order_id, "OQCLMLBW3P3BUCMWZ");
    }

    #[tokio::test]
    async fn test_add_order_returns_txid() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/0/private/AddOrder")
            .with_body(
                r#"{"error":[],"result":{
                    "descr":{"order":"buy 1.25000000 XBTUSD @ limit 30010.0"},
                    "txid":["OUF4EMFRGI2MQMWZD"]
                }}"#,
            )
            .create_async()
            .await;

        let client = test_client(&server).await;
        let trade = TradeDescription::new(
            OrderType::Limit,
            btc_usd(),
            TradeAction::Buy,
            dec!(30010.0),
            dec!(1.25),
        );

        let txid = client.add_order(&trade).await.unwrap();
        assert_eq!(txid, "OUF4EMFRGI2MQMWZD");
    }

    #[tokio::test]
    async fn test_cancel_order() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/0/private/CancelOrder")
            .with_body(r#"{"error":[],"result":{"count":1}}"#)
            .create_async()
            .await;

        let client = test_client(&server).await;
        assert!(client.cancel_order("OUF4EMFRGI2MQMWZD").await.is_ok());
    }

    #[tokio::test]
    async fn test_private_call_without_credentials() {
        let server = Server::new_async().await;
        let config = KrakenConfig::public_only().with_base_url(server.url());
        let client = KrakenClient::new(config).unwrap();

        assert!(matches!(
            client.get_balances().await,
            Err(ExchangeError::Unauthorized(_))
        ));
    }
}
