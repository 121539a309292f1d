//! 모의 거래 세션 명령어.
//!
//! 실거래소 시세를 사용하되 주문은 가상 원장에만 기록합니다.
//!
//! # 사용 예시
//!
//! ```bash
//! marlin paper -e kraken -p BTC/USD
//! marlin paper -e coinbase -p ETH/USD --poll-secs 10
//! ```

use anyhow::Result;
use marlin_core::{AppConfig, TradablePair};
use marlin_exchange::{build_connector, Exchange, PaperExchange};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::commands::seed_paper_balances;

/// Ctrl-C로 중단할 때까지 시세를 폴링하며 미체결 주문을 재평가합니다.
pub async fn run_paper(
    mut config: AppConfig,
    exchange_id: &str,
    pair: &TradablePair,
    poll_secs: u64,
) -> Result<()> {
    seed_paper_balances(&mut config);

    let connector = build_connector(&config, exchange_id)?;
    let exchange = Arc::new(PaperExchange::new(connector, &config.paper));

    let status = exchange.get_status().await?;
    println!("\n🧪 모의 거래 세션 시작: {} ({})", exchange.name(), status);
    println!("페어: {} / 폴링 주기: {}초", pair, poll_secs);
    println!("중단: Ctrl-C");

    let mut ticker = tokio::time::interval(Duration::from_secs(poll_secs.max(1)));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("\n세션을 종료합니다.");
                break;
            }
            _ = ticker.tick() => {
                match exchange.get_price(pair).await {
                    Ok(price) => info!(pair = %pair, price = %price, "Tick"),
                    Err(e) if e.is_retryable() => {
                        warn!(error = %e, "Price fetch failed, will retry");
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                }

                match exchange.fill_open_orders().await {
                    Ok(filled) => {
                        for order in &filled {
                            info!(
                                order_id = %order.order_id,
                                price = %order.price,
                                "Order filled"
                            );
                        }
                    }
                    Err(e) if e.is_retryable() => {
                        warn!(error = %e, "Fill evaluation failed, will retry");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }

    let balances = exchange.get_balances().await?;
    let mut assets: Vec<_> = balances.iter().collect();
    assets.sort_by(|a, b| a.0.cmp(b.0));

    println!("\n최종 잔고:");
    for (asset, amount) in assets {
        println!("  {}: {}", asset, amount);
    }

    Ok(())
}
