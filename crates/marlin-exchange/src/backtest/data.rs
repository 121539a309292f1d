//! 백테스트 데이터 파일 로딩과 샘플 데이터 생성.
//!
//! 데이터 디렉터리는 거래 쌍마다 CSV 파일 하나를 가집니다. 파일 이름은
//! `ASSET_UNIT.csv`(예: `BTC_GBP.csv`), 내용은 헤더
//! `timestamp,open,high,low,close,volume`와 유닉스 초 타임스탬프 오름차순
//! 행입니다.

use crate::backtest::navigator::PairSeries;
use crate::error::ExchangeError;
use crate::traits::ExchangeResult;
use chrono::{DateTime, Duration, Utc};
use marlin_core::{OhlcvData, OhlcvInterval, TradablePair};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// CSV 한 행.
#[derive(Debug, Deserialize)]
struct CandleRecord {
    timestamp: i64,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: Decimal,
}

/// 디렉터리의 모든 쌍 CSV를 읽어 검증된 시계열 맵을 만듭니다.
///
/// 파싱 실패와 데이터 품질 위반은 파일과 행 번호를 담은
/// [`ExchangeError::InvalidData`]로 반환됩니다. CSV가 하나도 없는
/// 디렉터리도 오류입니다.
pub fn load_csv_dir(
    dir: impl AsRef<Path>,
    interval: OhlcvInterval,
) -> ExchangeResult<HashMap<TradablePair, PairSeries>> {
    let dir = dir.as_ref();
    let entries = std::fs::read_dir(dir).map_err(|e| {
        ExchangeError::InvalidData(format!("failed to read data dir {}: {}", dir.display(), e))
    })?;

    let mut series = HashMap::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            ExchangeError::InvalidData(format!("failed to read data dir {}: {}", dir.display(), e))
        })?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("csv") {
            continue;
        }

        let pair = pair_from_file_name(&path)?;
        let candles = load_csv_file(&path)?;
        info!(pair = %pair, candles = candles.len(), file = %path.display(), "Loaded backtest data");

        let validated = PairSeries::new(interval, candles)
            .map_err(|e| ExchangeError::InvalidData(format!("{}: {}", path.display(), e)))?;
        series.insert(pair, validated);
    }

    if series.is_empty() {
        return Err(ExchangeError::InvalidData(format!(
            "no CSV data files in {}",
            dir.display()
        )));
    }
    Ok(series)
}

/// `ASSET_UNIT.csv` 파일 이름에서 거래 쌍을 읽습니다.
fn pair_from_file_name(path: &Path) -> ExchangeResult<TradablePair> {
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default();

    match stem.split_once('_') {
        Some((asset, unit)) if !asset.is_empty() && !unit.is_empty() => {
            Ok(TradablePair::new(asset, unit))
        }
        _ => Err(ExchangeError::InvalidData(format!(
            "data file name must be ASSET_UNIT.csv: {}",
            path.display()
        ))),
    }
}

fn load_csv_file(path: &Path) -> ExchangeResult<Vec<OhlcvData>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| {
        ExchangeError::InvalidData(format!("failed to open {}: {}", path.display(), e))
    })?;

    let mut candles = Vec::new();
    for (index, record) in reader.deserialize::<CandleRecord>().enumerate() {
        // 헤더가 1행이므로 첫 레코드는 2행
        let line = index + 2;
        let record = record.map_err(|e| {
            ExchangeError::InvalidData(format!("{} line {}: {}", path.display(), line, e))
        })?;

        let timestamp = DateTime::from_timestamp(record.timestamp, 0).ok_or_else(|| {
            ExchangeError::InvalidData(format!(
                "{} line {}: timestamp {} out of range",
                path.display(),
                line,
                record.timestamp
            ))
        })?;

        candles.push(OhlcvData::new(
            timestamp,
            record.open,
            record.high,
            record.low,
            record.close,
            record.volume,
        ));
    }
    Ok(candles)
}

/// 데모와 테스트용 무작위 행보 캔들을 생성합니다.
///
/// 종가가 다음 캔들의 시가로 이어지고 타임스탬프는 정확히 기준 간격
/// 만큼 증가하므로 결과는 항상 [`PairSeries`] 검증을 통과합니다.
pub fn generate_sample_candles(
    interval: OhlcvInterval,
    count: usize,
    start_price: Decimal,
    volatility: Decimal,
) -> Vec<OhlcvData> {
    use rand::Rng;

    let mut candles = Vec::with_capacity(count);
    let mut rng = rand::thread_rng();
    let mut current_price = start_price;

    let step = Duration::seconds(interval.as_secs() as i64);
    let mut timestamp = Utc::now() - step * count as i32;

    let volatility_f64 = volatility.to_string().parse::<f64>().unwrap_or(0.02);

    for _ in 0..count {
        let change_pct = (rng.gen::<f64>() - 0.5) * 2.0 * volatility_f64;
        let change = current_price * Decimal::from_f64_retain(change_pct).unwrap_or_default();

        let open = current_price;
        let close = current_price + change;

        let high_extra = current_price.abs()
            * Decimal::from_f64_retain(rng.gen::<f64>() * 0.01).unwrap_or_default();
        let low_extra = current_price.abs()
            * Decimal::from_f64_retain(rng.gen::<f64>() * 0.01).unwrap_or_default();

        let high = open.max(close) + high_extra;
        let low = open.min(close) - low_extra;
        let volume = Decimal::from_f64_retain(rng.gen_range(10.0..1000.0)).unwrap_or(dec!(100));

        candles.push(OhlcvData::new(timestamp, open, high, low, close, volume));

        current_price = close;
        timestamp += step;
    }

    candles
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    fn write_csv(dir: &Path, name: &str, body: &str) {
        let mut file = std::fs::File::create(dir.join(name)).unwrap();
        file.write_all(body.as_bytes()).unwrap();
    }

    #[test]
    fn test_load_csv_dir() {
        let dir = std::env::temp_dir().join(format!("marlin-data-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        write_csv(
            &dir,
            "BTC_GBP.csv",
            "timestamp,open,high,low,close,volume\n\
             300,10,11,9,10.5,1.5\n\
             600,10.5,12,10,11,2.0\n",
        );

        let series = load_csv_dir(&dir, OhlcvInterval::M5).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        let pair = TradablePair::new("BTC", "GBP");
        assert_eq!(series.len(), 1);
        assert_eq!(series[&pair].len(), 2);
        assert_eq!(series[&pair].candles()[1].close, dec!(11));
    }

    #[test]
    fn test_load_reports_file_and_line() {
        let dir = std::env::temp_dir().join(format!("marlin-bad-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        write_csv(
            &dir,
            "BTC_GBP.csv",
            "timestamp,open,high,low,close,volume\n\
             300,10,11,9,10.5,1.5\n\
             notanumber,10.5,12,10,11,2.0\n",
        );

        let err = load_csv_dir(&dir, OhlcvInterval::M5).unwrap_err();
        std::fs::remove_dir_all(&dir).unwrap();

        match err {
            ExchangeError::InvalidData(message) => {
                assert!(message.contains("BTC_GBP.csv"));
                assert!(message.contains("line 3"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_bad_file_name_rejected() {
        let dir = std::env::temp_dir().join(format!("marlin-name-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        write_csv(
            &dir,
            "BTCGBP.csv",
            "timestamp,open,high,low,close,volume\n300,10,11,9,10.5,1.5\n",
        );

        let err = load_csv_dir(&dir, OhlcvInterval::M5).unwrap_err();
        std::fs::remove_dir_all(&dir).unwrap();

        assert!(matches!(err, ExchangeError::InvalidData(_)));
    }

    #[test]
    fn test_generated_candles_pass_validation() {
        let candles = generate_sample_candles(OhlcvInterval::M5, 100, dec!(50000), dec!(0.02));

        assert_eq!(candles.len(), 100);
        assert!(PairSeries::new(OhlcvInterval::M5, candles).is_ok());
    }
}
