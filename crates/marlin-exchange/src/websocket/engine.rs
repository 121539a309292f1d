//! WebSocket 시장 데이터 엔진.
//!
//! 연결 수명, 재연결, 구독 참조 카운트, 최신 값 캐시를 하나로 묶습니다.
//! 소비자는 [`subscribe`](WsMarketStream::subscribe)로 관심을 등록하고
//! 캐시된 읽기 메서드로 마지막 값을 조회합니다.

use crate::error::ExchangeError;
use crate::traits::ExchangeResult;
use crate::websocket::cache::MarketCache;
use crate::websocket::protocol::{WsEvent, WsProtocol};
use crate::websocket::subscription::{SubscriptionRegistry, SubscriptionState, WsSubscription};
use futures::{SinkExt, StreamExt};
use marlin_core::{OhlcvData, OhlcvInterval, OrderBookState, TradablePair};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, error, info, warn};

/// 재연결 대기 시간 상한.
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

/// 첫 값 대기 기본 타임아웃.
const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// 거래소 WebSocket 시장 데이터 스트림.
///
/// [`start`](Self::start) 호출 후 백그라운드 태스크가 연결을 유지하며,
/// 끊기면 지수 백오프로 재연결하고 살아 있는 구독을 다시 전송합니다.
/// 캐시는 재연결 중에도 유지됩니다.
pub struct WsMarketStream<P: WsProtocol> {
    protocol: Arc<P>,
    registry: Arc<Mutex<SubscriptionRegistry>>,
    cache: Arc<MarketCache>,
    outbound_tx: mpsc::UnboundedSender<String>,
    outbound_rx: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
    shutdown_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<P: WsProtocol> WsMarketStream<P> {
    /// 새 스트림을 생성합니다. [`start`](Self::start) 전에는 연결하지
    /// 않습니다.
    pub fn new(protocol: P) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            protocol: Arc::new(protocol),
            registry: Arc::new(Mutex::new(SubscriptionRegistry::new())),
            cache: Arc::new(MarketCache::new()),
            outbound_tx,
            outbound_rx: Mutex::new(Some(outbound_rx)),
            shutdown_tx,
            task: Mutex::new(None),
        }
    }

    /// 연결 태스크를 시작합니다.
    pub async fn start(&self) -> ExchangeResult<()> {
        let outbound_rx = self
            .outbound_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| ExchangeError::WebSocket("Stream already started".to_string()))?;

        let handle = tokio::spawn(run_loop(
            Arc::clone(&self.protocol),
            Arc::clone(&self.registry),
            Arc::clone(&self.cache),
            outbound_rx,
            self.outbound_tx.clone(),
            self.shutdown_tx.subscribe(),
        ));
        *self.task.lock().await = Some(handle);
        Ok(())
    }

    /// 연결 태스크를 종료합니다.
    pub async fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.task.lock().await.take() {
            let _ = handle.await;
        }
        info!("WebSocket stream stopped");
    }

    /// 구독 관심을 등록합니다.
    ///
    /// 같은 구독의 첫 번째 관심일 때만 거래소로 구독 프레임이
    /// 전송됩니다.
    pub async fn subscribe(&self, sub: WsSubscription) -> ExchangeResult<()> {
        let frame = self.protocol.subscribe_frame(&sub)?;

        // 카운트 변경과 전송 결정을 레지스트리 잠금 아래에서 함께 수행
        let mut registry = self.registry.lock().await;
        if registry.add_interest(&sub) {
            debug!(subscription = ?sub, "Sending subscribe frame");
            self.send_frame(frame)?;
        }
        Ok(())
    }

    /// 구독 관심을 해제합니다.
    ///
    /// 마지막 관심이 사라질 때만 거래소로 구독 해제 프레임이
    /// 전송됩니다.
    pub async fn unsubscribe(&self, sub: &WsSubscription) -> ExchangeResult<()> {
        let frame = self.protocol.unsubscribe_frame(sub)?;

        let mut registry = self.registry.lock().await;
        if registry.remove_interest(sub) {
            debug!(subscription = ?sub, "Sending unsubscribe frame");
            self.send_frame(frame)?;
        }
        Ok(())
    }

    /// 마지막으로 수신한 가격을 반환합니다.
    pub async fn price(&self, pair: &TradablePair) -> Option<Decimal> {
        self.cache.price(pair).await
    }

    /// 첫 가격이 도착할 때까지 기다렸다가 반환합니다.
    pub async fn wait_price(&self, pair: &TradablePair) -> ExchangeResult<Decimal> {
        tokio::time::timeout(DEFAULT_WAIT_TIMEOUT, self.cache.wait_price(pair))
            .await
            .map_err(|_| ExchangeError::Timeout(format!("No price received for {}", pair)))
    }

    /// 마지막으로 수신한 캔들을 반환합니다.
    pub async fn ohlcv(&self, pair: &TradablePair, interval: OhlcvInterval) -> Option<OhlcvData> {
        self.cache.candle(pair, interval).await
    }

    /// 캐시된 호가로 재구성한 호가창을 반환합니다.
    pub async fn order_book(&self, pair: &TradablePair, depth: usize) -> Option<OrderBookState> {
        self.cache.order_book(pair, depth).await
    }

    /// 구독 상태를 반환합니다.
    pub async fn subscription_state(&self, sub: &WsSubscription) -> SubscriptionState {
        self.registry.lock().await.state(sub)
    }

    /// 구독 관심 수를 반환합니다.
    pub async fn interest(&self, sub: &WsSubscription) -> usize {
        self.registry.lock().await.interest(sub)
    }

    fn send_frame(&self, frame: String) -> ExchangeResult<()> {
        self.outbound_tx
            .send(frame)
            .map_err(|_| ExchangeError::Disconnected("WebSocket task stopped".to_string()))
    }

    #[cfg(test)]
    async fn take_outbound(&self) -> mpsc::UnboundedReceiver<String> {
        self.outbound_rx
            .lock()
            .await
            .take()
            .expect("outbound receiver already taken")
    }
}

/// 연결 유지 루프. 끊기면 백오프 후 재연결하고, 관심이 남아 있는
/// 구독을 다시 전송합니다.
async fn run_loop<P: WsProtocol>(
    protocol: Arc<P>,
    registry: Arc<Mutex<SubscriptionRegistry>>,
    cache: Arc<MarketCache>,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    outbound_tx: mpsc::UnboundedSender<String>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut delay = Duration::from_secs(1);

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let url = protocol.endpoint();
        info!("Connecting to WebSocket: {}", url);

        let ws = match connect_async(url).await {
            Ok((ws, _)) => ws,
            Err(e) => {
                warn!("WebSocket connect failed: {}, retrying in {:?}", e, delay);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown_rx.changed() => break,
                }
                delay = (delay * 2).min(MAX_RECONNECT_DELAY);
                continue;
            }
        };
        delay = Duration::from_secs(1);
        info!("WebSocket connected");

        // 이전 연결을 향해 쌓인 프레임은 더 이상 유효하지 않음
        while outbound_rx.try_recv().is_ok() {}

        let (mut write, mut read) = ws.split();

        // 관심이 남아 있는 구독 재전송
        let pending: Vec<WsSubscription> = registry.lock().await.mark_all_subscribing();
        let mut send_failed = false;
        for sub in &pending {
            match protocol.subscribe_frame(sub) {
                Ok(frame) => {
                    if let Err(e) = write.send(Message::Text(frame.into())).await {
                        warn!("Failed to resend subscription: {}", e);
                        send_failed = true;
                        break;
                    }
                }
                Err(e) => error!(subscription = ?sub, "Cannot serialize subscription: {}", e),
            }
        }
        if send_failed {
            continue;
        }
        if !pending.is_empty() {
            info!("Resent {} subscriptions", pending.len());
        }

        // 메시지 펌프
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    let _ = write.send(Message::Close(None)).await;
                    return;
                }
                frame = outbound_rx.recv() => {
                    match frame {
                        Some(frame) => {
                            if let Err(e) = write.send(Message::Text(frame.into())).await {
                                warn!("WebSocket send failed: {}", e);
                                break;
                            }
                        }
                        // 모든 핸들이 해제됨
                        None => return,
                    }
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            handle_frame(protocol.as_ref(), &registry, &cache, &outbound_tx, &text)
                                .await;
                        }
                        Some(Ok(Message::Ping(_))) => {
                            // Pong은 tungstenite에서 자동으로 처리됨
                            debug!("Received ping");
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            info!("WebSocket closed by server");
                            break;
                        }
                        Some(Err(e)) => {
                            error!("WebSocket error: {}", e);
                            break;
                        }
                        _ => {}
                    }
                }
            }
        }

        warn!("WebSocket disconnected, reconnecting");
    }
}

/// 수신 프레임 하나를 분류하고 반영합니다. 해석 불가능한 프레임은
/// 기록 후 버려지며 루프는 계속됩니다.
async fn handle_frame<P: WsProtocol>(
    protocol: &P,
    registry: &Arc<Mutex<SubscriptionRegistry>>,
    cache: &Arc<MarketCache>,
    outbound_tx: &mpsc::UnboundedSender<String>,
    text: &str,
) {
    match protocol.classify(text) {
        WsEvent::Price { pair, price } => {
            cache.set_price(&pair, price).await;
        }
        WsEvent::Candle {
            pair,
            interval,
            candle,
        } => {
            cache.set_candle(&pair, interval, candle).await;
        }
        WsEvent::BookSnapshot { pair, asks, bids } => {
            cache.replace_book(&pair, &asks, &bids).await;
        }
        WsEvent::BookUpdate { pair, asks, bids } => {
            cache.update_book(&pair, &asks, &bids).await;
        }
        WsEvent::Subscribed(sub) => {
            debug!(subscription = ?sub, "Subscription confirmed");
            registry.lock().await.confirm_subscribed(&sub);
        }
        WsEvent::Unsubscribed(sub) => {
            debug!(subscription = ?sub, "Unsubscription confirmed");
            let resubscribe = registry.lock().await.confirm_unsubscribed(&sub);
            if resubscribe {
                // 해제 확인을 기다리는 사이 관심이 다시 생긴 구독
                match protocol.subscribe_frame(&sub) {
                    Ok(frame) => {
                        let _ = outbound_tx.send(frame);
                    }
                    Err(e) => error!(subscription = ?sub, "Cannot serialize subscription: {}", e),
                }
            }
        }
        WsEvent::Error(msg) => {
            warn!("Discarding websocket frame: {}", msg);
        }
        WsEvent::Heartbeat => {}
        WsEvent::Ignored => {}
    }
}
