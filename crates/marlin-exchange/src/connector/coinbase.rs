//! Coinbase 거래소 커넥터.
//!
//! Coinbase Exchange REST API 구현. 공개 시장 데이터와 개인 계좌/주문
//! 엔드포인트를 지원합니다.

use crate::error::ExchangeError;
use crate::traits::{Exchange, ExchangeResult};
use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use marlin_core::{
    Balances, ExchangeStatus, OhlcvData, OhlcvInterval, OrderBookEntry, OrderBookSide,
    OrderBookState, OrderDescription, OrderType, TradablePair, TradeDescription,
};
use reqwest::{Client, Method};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info};

type HmacSha256 = Hmac<Sha256>;

const DEFAULT_BASE_URL: &str = "https://api.exchange.coinbase.com";

// ============================================================================
// 설정
// ============================================================================

/// Coinbase 클라이언트 설정.
///
/// # 보안
/// - `Debug` 구현은 민감 정보(`api_key`, `api_secret`, `passphrase`)를 마스킹합니다.
#[derive(Clone)]
pub struct CoinbaseConfig {
    /// API 키
    pub api_key: String,
    /// API 시크릿 (base64)
    pub api_secret: String,
    /// API 패스프레이즈
    pub passphrase: String,
    /// REST API 기본 URL
    pub base_url: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

impl std::fmt::Debug for CoinbaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let masked_key = if self.api_key.len() > 8 {
            format!(
                "{}...{}",
                &self.api_key[..4],
                &self.api_key[self.api_key.len() - 4..]
            )
        } else {
            "***REDACTED***".to_string()
        };

        f.debug_struct("CoinbaseConfig")
            .field("api_key", &masked_key)
            .field("api_secret", &"***REDACTED***")
            .field("passphrase", &"***REDACTED***")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl CoinbaseConfig {
    /// 새 설정 생성.
    pub fn new(api_key: String, api_secret: String, passphrase: String) -> Self {
        Self {
            api_key,
            api_secret,
            passphrase,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }

    /// 공개 엔드포인트 전용 설정 (자격 증명 없음).
    pub fn public_only() -> Self {
        Self::new(String::new(), String::new(), String::new())
    }

    /// 기본 URL 변경 (테스트용).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// 환경 변수에서 생성.
    pub fn from_env() -> Option<Self> {
        Some(Self::new(
            std::env::var("COINBASE_API_KEY").ok()?,
            std::env::var("COINBASE_API_SECRET").ok()?,
            std::env::var("COINBASE_PASSPHRASE").ok()?,
        ))
    }
}

// ============================================================================
// API 응답 타입
// ============================================================================

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ProductInfo {
    base_currency: String,
    quote_currency: String,
}

#[derive(Debug, Deserialize)]
struct StatsResult {
    open: String,
    high: String,
    low: String,
    last: String,
    volume: String,
}

#[derive(Debug, Deserialize)]
struct TickerResult {
    price: String,
}

#[derive(Debug, Deserialize)]
struct BookResult {
    /// [가격, 수량, 주문 수]
    asks: Vec<(String, String, Value)>,
    bids: Vec<(String, String, Value)>,
}

#[derive(Debug, Deserialize)]
struct FeesResult {
    taker_fee_rate: String,
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    currency: String,
    balance: String,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct OrderRecord {
    id: String,
    product_id: String,
    side: String,
    /// 시장가 주문에는 가격 필드가 없음
    price: Option<String>,
    size: String,
}

// ============================================================================
// Coinbase 클라이언트
// ============================================================================

/// Coinbase 거래소 클라이언트.
pub struct CoinbaseClient {
    config: CoinbaseConfig,
    client: Client,
}

impl CoinbaseClient {
    /// 새 Coinbase 클라이언트 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `ExchangeError::NetworkError`를 반환합니다.
    pub fn new(config: CoinbaseConfig) -> ExchangeResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent("marlin")
            .build()
            .map_err(|e| {
                ExchangeError::NetworkError(format!("failed to build HTTP client: {}", e))
            })?;

        Ok(Self { config, client })
    }

    /// 환경 변수에서 생성.
    pub fn from_env() -> Option<Self> {
        CoinbaseConfig::from_env().and_then(|config| Self::new(config).ok())
    }

    fn timestamp_secs() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards")
            .as_secs()
    }

    /// 개인 엔드포인트 요청 서명.
    ///
    /// `CB-ACCESS-SIGN = base64(HMAC-SHA256(base64(secret), timestamp + method + path + body))`
    fn sign(&self, timestamp: &str, method: &str, path: &str, body: &str) -> ExchangeResult<String> {
        let secret = base64::engine::general_purpose::STANDARD
            .decode(&self.config.api_secret)
            .map_err(|_| {
                ExchangeError::Unauthorized("API secret is not valid base64".to_string())
            })?;

        let mut mac = HmacSha256::new_from_slice(&secret).expect("Invalid key");
        mac.update(timestamp.as_bytes());
        mac.update(method.as_bytes());
        mac.update(path.as_bytes());
        mac.update(body.as_bytes());
        Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
    }

    /// 공개 API 요청 (인증 불필요).
    async fn public_get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> ExchangeResult<T> {
        let url = format!("{}{}", self.config.base_url, path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ExchangeError::NetworkError(e.to_string()))?;

        self.handle_response(response).await
    }

    /// 서명된 개인 API 요청. `path`는 쿼리 문자열을 포함해야 합니다.
    async fn signed_request<T: for<'de> Deserialize<'de>>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> ExchangeResult<T> {
        if self.config.api_key.is_empty() || self.config.api_secret.is_empty() {
            return Err(ExchangeError::Unauthorized(
                "API credentials not configured".to_string(),
            ));
        }

        let body_text = body.as_ref().map(Value::to_string).unwrap_or_default();
        let timestamp = Self::timestamp_secs().to_string();
        let signature = self.sign(&timestamp, method.as_str(), path, &body_text)?;

        debug!("{} (signed) {}", method, path);

        let mut request = self
            .client
            .request(method, format!("{}{}", self.config.base_url, path))
            .header("CB-ACCESS-KEY", &self.config.api_key)
            .header("CB-ACCESS-SIGN", signature)
            .header("CB-ACCESS-TIMESTAMP", timestamp)
            .header("CB-ACCESS-PASSPHRASE", &self.config.passphrase);
        if body.is_some() {
            request = request
                .header("Content-Type", "application/json")
                .body(body_text);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ExchangeError::NetworkError(e.to_string()))?;

        self.handle_response(response).await
    }

    /// API 응답 처리. 실패 응답은 `{"message": ...}` 형태입니다.
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> ExchangeResult<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExchangeError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<ErrorMessage>(&body) {
                return Err(ExchangeError::ApiError(err.message));
            }
            return Err(ExchangeError::ApiError(format!("HTTP {}: {}", status, body)));
        }

        serde_json::from_str(&body).map_err(|e| {
            error!("Failed to parse response: {} - Body: {}", e, body);
            ExchangeError::ParseError(e.to_string())
        })
    }

    /// 거래 쌍을 Coinbase 상품 ID로 변환 ("BTC-USD").
    fn to_product_id(pair: &TradablePair) -> String {
        format!("{}-{}", pair.asset(), pair.price_unit())
    }

    /// Coinbase가 지원하는 캔들 간격(초). 30분/4시간 봉은 지원하지 않습니다.
    fn to_granularity(interval: OhlcvInterval) -> Option<u64> {
        match interval.as_secs() {
            secs @ (60 | 300 | 900 | 3600 | 86_400) => Some(secs),
            _ => None,
        }
    }

    fn parse_decimal(value: &str, field: &str) -> ExchangeResult<Decimal> {
        value.parse().map_err(|_| {
            ExchangeError::ParseError(format!("invalid decimal in {}: {}", field, value))
        })
    }

    fn parse_side(side: &str) -> ExchangeResult<marlin_core::TradeAction> {
        match side {
            "buy" => Ok(marlin_core::TradeAction::Buy),
            "sell" => Ok(marlin_core::TradeAction::Sell),
            other => Err(ExchangeError::ParseError(format!(
                "unknown order side: {}",
                other
            ))),
        }
    }

    /// 캔들 행 `[time, low, high, open, close, volume]` 파싱. 값은 숫자입니다.
    fn parse_candle_row(row: &Value) -> ExchangeResult<OhlcvData> {
        let ts = row
            .get(0)
            .and_then(Value::as_i64)
            .ok_or_else(|| ExchangeError::ParseError("candle row missing timestamp".to_string()))?;
        let timestamp = DateTime::from_timestamp(ts, 0).ok_or_else(|| {
            ExchangeError::ParseError(format!("candle timestamp out of range: {}", ts))
        })?;

        // f64를 거치면 정밀도가 깨지므로 숫자 리터럴을 문자열로 파싱
        let field = |index: usize, name: &str| -> ExchangeResult<Decimal> {
            match row.get(index) {
                Some(Value::Number(n)) => n.to_string().parse().map_err(|_| {
                    ExchangeError::ParseError(format!("invalid number in candle {}: {}", name, n))
                }),
                _ => Err(ExchangeError::ParseError(format!(
                    "candle row missing {}",
                    name
                ))),
            }
        };

        Ok(OhlcvData::new(
            timestamp,
            field(3, "open")?,
            field(2, "high")?,
            field(1, "low")?,
            field(4, "close")?,
            field(5, "volume")?,
        ))
    }

    async fn list_orders(&self, status: &str) -> ExchangeResult<Vec<OrderDescription>> {
        let records: Vec<OrderRecord> = self
            .signed_request(Method::GET, &format!("/orders?status={}", status), None)
            .await?;

        records
            .into_iter()
            .map(|record| {
                let price = match record.price {
                    Some(ref value) => Self::parse_decimal(value, "order price")?,
                    // 시장가 주문은 지정가가 없으므로 0으로 보고됨
                    None => Decimal::ZERO,
                };
                Ok(OrderDescription::new(
                    record.id,
                    record.product_id,
                    Self::parse_side(&record.side)?,
                    price,
                    Self::parse_decimal(&record.size, "order size")?,
                ))
            })
            .collect()
    }
}

#[async_trait]
impl Exchange for CoinbaseClient {
    fn name(&self) -> &str {
        "coinbase"
    }

    async fn get_status(&self) -> ExchangeResult<ExchangeStatus> {
        // 상태 엔드포인트가 없으므로 상품 목록 응답 성공을 가용 상태로 간주
        let _: Vec<Value> = self.public_get("/products").await?;
        Ok(ExchangeStatus::Online)
    }

    async fn get_tradable_pairs(&self) -> ExchangeResult<Vec<TradablePair>> {
        let products: Vec<ProductInfo> = self.public_get("/products").await?;

        Ok(products
            .into_iter()
            .map(|p| TradablePair::new(p.base_currency, p.quote_currency))
            .collect())
    }

    async fn get_24h_stats(&self, pair: &TradablePair) -> ExchangeResult<OhlcvData> {
        let stats: StatsResult = self
            .public_get(&format!("/products/{}/stats", Self::to_product_id(pair)))
            .await?;

        Ok(OhlcvData::new(
            Utc::now() - Duration::days(1),
            Self::parse_decimal(&stats.open, "open")?,
            Self::parse_decimal(&stats.high, "high")?,
            Self::parse_decimal(&stats.low, "low")?,
            Self::parse_decimal(&stats.last, "last")?,
            Self::parse_decimal(&stats.volume, "volume")?,
        ))
    }

    async fn get_ohlcv(
        &self,
        pair: &TradablePair,
        interval: OhlcvInterval,
        count: usize,
    ) -> ExchangeResult<Vec<OhlcvData>> {
        let granularity = Self::to_granularity(interval).ok_or_else(|| {
            ExchangeError::NotSupported(format!("{} candles on coinbase", interval))
        })?;

        let rows: Vec<Value> = self
            .public_get(&format!(
                "/products/{}/candles?granularity={}",
                Self::to_product_id(pair),
                granularity
            ))
            .await?;

        // Coinbase는 최신 캔들부터 반환
        let mut candles = rows
            .iter()
            .map(Self::parse_candle_row)
            .collect::<ExchangeResult<Vec<_>>>()?;
        candles.truncate(count);
        Ok(candles)
    }

    async fn get_price(&self, pair: &TradablePair) -> ExchangeResult<Decimal> {
        let ticker: TickerResult = self
            .public_get(&format!("/products/{}/ticker", Self::to_product_id(pair)))
            .await?;
        Self::parse_decimal(&ticker.price, "price")
    }

    async fn get_order_book(
        &self,
        pair: &TradablePair,
        depth: usize,
    ) -> ExchangeResult<OrderBookState> {
        // 레벨 1은 최우선 호가만, 레벨 2는 상위 50개 호가
        let level = if depth == 1 { 1 } else { 2 };
        let book: BookResult = self
            .public_get(&format!(
                "/products/{}/book?level={}",
                Self::to_product_id(pair),
                level
            ))
            .await?;

        let entry = |side: OrderBookSide,
                     (price, volume, _): (String, String, Value)|
         -> ExchangeResult<OrderBookEntry> {
            Ok(OrderBookEntry::new(
                side,
                Self::parse_decimal(&price, "book price")?,
                Self::parse_decimal(&volume, "book volume")?,
            ))
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

    async fn get_fee(&self, _pair: &TradablePair) -> ExchangeResult<Decimal> {
        let fees: FeesResult = self.signed_request(Method::GET, "/fees", None).await?;

        // 소수 비율(0.006)을 퍼센트(0.6)로 변환
        let rate = Self::parse_decimal(&fees.taker_fee_rate, "taker fee")?;
        Ok(rate * Decimal::ONE_HUNDRED)
    }

    async fn get_balances(&self) -> ExchangeResult<Balances> {
        let accounts: Vec<AccountInfo> =
            self.signed_request(Method::GET, "/accounts", None).await?;

        let mut balances = Balances::new();
        for account in accounts {
            let amount = Self::parse_decimal(&account.balance, "balance")?;
            if !amount.is_zero() {
                balances.insert(account.currency, amount);
            }
        }
        Ok(balances)
    }

    async fn get_open_orders(&self) -> ExchangeResult<Vec<OrderDescription>> {
        self.list_orders("open").await
    }

    async fn get_closed_orders(&self) -> ExchangeResult<Vec<OrderDescription>> {
        self.list_orders("done").await
    }

    async fn add_order(&self, trade: &TradeDescription) -> ExchangeResult<String> {
        let mut body = json!({
            "product_id": Self::to_product_id(&trade.pair),
            "side": trade.action.to_string().to_lowercase(),
            "size": trade.volume.to_string(),
        });

        // 손절/익절은 트리거가 달린 지정가 주문으로 표현됨
        match trade.order_type {
            OrderType::Market => {
                body["type"] = json!("market");
            }
            OrderType::Limit => {
                body["type"] = json!("limit");
                body["price"] = json!(trade.asset_price.to_string());
            }
            OrderType::StopLoss => {
                body["type"] = json!("limit");
                body["price"] = json!(trade.asset_price.to_string());
                body["stop"] = json!("loss");
                body["stop_price"] = json!(trade.asset_price.to_string());
            }
            OrderType::TakeProfit => {
                body["type"] = json!("limit");
                body["price"] = json!(trade.asset_price.to_string());
                body["stop"] = json!("entry");
                body["stop_price"] = json!(trade.asset_price.to_string());
            }
        }

        info!(
            "Placing {} {} order for {} {} @ {}",
            trade.action, trade.order_type, trade.volume, trade.pair, trade.asset_price
        );

        let order: OrderResponse = self
            .signed_request(Method::POST, "/orders", Some(body))
            .await?;

        info!("Order placed successfully: {}", order.id);
        Ok(order.id)
    }

    async fn cancel_order(&self, order_id: &str) -> ExchangeResult<()> {
        let _: Value = self
            .signed_request(Method::DELETE, &format!("/orders/{}", order_id), None)
            .await?;

        info!("Order {} cancelled", order_id);
        Ok(())
    }
}
