//! 백테스트용 샘플 캔들 데이터 생성 명령어.
//!
//! # 사용 예시
//!
//! ```bash
//! marlin sample-data -d data/backtest -p BTC/GBP,ETH/GBP -i 5m --candles 500
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use marlin_core::{OhlcvInterval, TradablePair};
use marlin_exchange::generate_sample_candles;
use rust_decimal::Decimal;
use tracing::info;

/// 랜덤 워크 캔들을 생성해 페어별 CSV 파일로 저장합니다.
pub fn run_sample_data(
    dir: &Path,
    pairs: &[TradablePair],
    interval: OhlcvInterval,
    count: usize,
) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create data directory: {}", dir.display()))?;

    println!("\n🎲 샘플 캔들 생성 중: {}개 페어 x {}개", pairs.len(), count);

    for pair in pairs {
        // 자산마다 다른 가격대에서 출발
        let start_price = match pair.asset() {
            "BTC" => Decimal::from(30_000),
            "ETH" => Decimal::from(2_000),
            _ => Decimal::from(100),
        };

        let candles = generate_sample_candles(interval, count, start_price, Decimal::new(2, 2));

        let path = dir.join(format!("{}_{}.csv", pair.asset(), pair.price_unit()));
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;

        writer.write_record(["timestamp", "open", "high", "low", "close", "volume"])?;
        for candle in &candles {
            writer.write_record([
                candle.timestamp.timestamp().to_string(),
                candle.open.to_string(),
                candle.high.to_string(),
                candle.low.to_string(),
                candle.close.to_string(),
                candle.volume.to_string(),
            ])?;
        }
        writer.flush()?;

        info!(pair = %pair, file = %path.display(), "Sample data written");
        println!("  {} -> {}", pair, path.display());
    }

    println!("\n✅ 샘플 데이터 생성 완료");
    Ok(())
}
