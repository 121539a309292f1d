//! 거래소 상태 점검 명령어.
//!
//! # 사용 예시
//!
//! ```bash
//! marlin status -e kraken -p BTC/USD
//! marlin status -e coinbase -p BTC/USD
//! ```

use anyhow::Result;
use marlin_core::{AppConfig, TradablePair};
use marlin_exchange::build_connector;

/// 커넥터로 공개 엔드포인트를 호출해 연결 상태를 확인합니다.
pub async fn run_status(config: &AppConfig, exchange_id: &str, pair: &TradablePair) -> Result<()> {
    let connector = build_connector(config, exchange_id)?;

    println!("\n🔍 {} 상태 확인 중...", connector.name());

    let status = connector.get_status().await?;
    println!("상태: {}", status);

    let price = connector.get_price(pair).await?;
    println!("{} 현재가: {}", pair, price);

    let stats = connector.get_24h_stats(pair).await?;
    println!(
        "24시간: 시가 {} / 고가 {} / 저가 {} / 거래량 {}",
        stats.open, stats.high, stats.low, stats.volume
    );

    let book = connector.get_order_book(pair, 1).await?;
    if let (Some(bid), Some(ask)) = (book.best_bid(), book.best_ask()) {
        println!(
            "호가: 매수 {} / 매도 {} (스프레드 {})",
            bid.price,
            ask.price,
            ask.price - bid.price
        );
    }

    println!("\n✅ {} 연결 정상", connector.name());
    Ok(())
}
