//! 백테스트 명령어.
//!
//! CSV 캔들 데이터를 시간 순으로 재생하며 모의 원장을 돌립니다.
//!
//! # 사용 예시
//!
//! ```bash
//! # 설정 파일의 데이터 디렉토리로 백테스트
//! marlin backtest
//!
//! # 데이터 디렉토리와 스텝 수 오버라이드
//! marlin backtest --data-dir data/backtest --steps 1000
//! ```

use anyhow::{Context, Result};
use marlin_core::{AppConfig, RunMode};
use marlin_exchange::{assemble_back_test, build_navigator, Exchange};
use rust_decimal::Decimal;
use tracing::info;

use crate::commands::seed_paper_balances;

/// 백테스트 세션을 실행하고 요약을 출력합니다.
pub async fn run_backtest(
    mut config: AppConfig,
    data_dir: Option<String>,
    steps: Option<u64>,
) -> Result<()> {
    config.runner.mode = RunMode::Backtest;
    if let Some(dir) = data_dir {
        config.backtest.data_dir = dir;
    }
    if let Some(limit) = steps {
        config.backtest.max_steps = limit;
    }
    seed_paper_balances(&mut config);

    println!("\n📊 백테스트 실행 중...");
    println!("데이터 디렉토리: {}", config.backtest.data_dir);
    println!("기본 간격: {}", config.backtest.interval);

    let navigator = build_navigator(&config).with_context(|| {
        format!(
            "failed to load backtest data from {}",
            config.backtest.data_dir
        )
    })?;
    let exchange = assemble_back_test(navigator, &config.paper);

    let pairs = exchange.get_tradable_pairs().await?;
    let mut start_prices = Vec::with_capacity(pairs.len());
    for pair in &pairs {
        start_prices.push((pair.clone(), exchange.get_price(pair).await?));
    }
    let initial_balances = exchange.get_balances().await?;

    let max_steps = config.backtest.max_steps;
    let mut replayed = 0u64;
    let mut fills = 0usize;
    while !exchange.is_exhausted().await {
        if max_steps > 0 && replayed >= max_steps {
            info!(steps = replayed, "Reached step limit");
            break;
        }
        fills += exchange.advance().await?.len();
        replayed += 1;
    }

    println!("\n✅ 백테스트 완료: {} 스텝 재생, {} 주문 체결", replayed, fills);
    for (pair, start) in &start_prices {
        let end = exchange.get_price(pair).await?;
        let change = if start.is_zero() {
            Decimal::ZERO
        } else {
            (end - start) / start * Decimal::ONE_HUNDRED
        };
        println!("  {}: {} -> {} ({}%)", pair, start, end, change.round_dp(2));
    }

    let final_balances = exchange.get_balances().await?;
    let mut assets: Vec<_> = final_balances.iter().collect();
    assets.sort_by(|a, b| a.0.cmp(b.0));

    println!("\n잔고:");
    for (asset, amount) in assets {
        let initial = initial_balances.get(asset).copied().unwrap_or_default();
        println!("  {}: {} (시작 {})", asset, amount, initial);
    }

    Ok(())
}
