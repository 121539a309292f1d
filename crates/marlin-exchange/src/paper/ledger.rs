//! 모의 거래 원장.
//!
//! 잔고, 미체결 주문, 체결 내역을 하나의 동기 상태 기계로 관리합니다.
//! 가격은 항상 호출자가 오라클에서 읽어 전달하므로 원장 자체는
//! 결정적입니다. 동시성 제어는 [`PaperTrader`](super::PaperTrader)가
//! 담당합니다.

use crate::error::ExchangeError;
use crate::traits::ExchangeResult;
use marlin_core::{
    Balances, OrderDescription, OrderType, PaperConfig, TradablePair, TradeAction,
    TradeDescription,
};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// 원장에 기록된 미체결 주문.
#[derive(Debug, Clone)]
pub struct PaperOrder {
    pub order_id: String,
    pub trade: TradeDescription,
}

/// 결정적 모의 거래 원장.
#[derive(Debug)]
pub struct PaperLedger {
    /// 거래 수수료 (퍼센트, 0.1은 0.1%)
    fee_percent: Decimal,
    balances: Balances,
    /// 미체결 주문 (접수 순서 유지)
    open: Vec<PaperOrder>,
    closed: Vec<OrderDescription>,
    next_order_id: u64,
}

impl PaperLedger {
    pub fn new(fee_percent: Decimal, balances: Balances) -> Self {
        Self {
            fee_percent,
            balances,
            open: Vec::new(),
            closed: Vec::new(),
            next_order_id: 1,
        }
    }

    pub fn from_config(config: &PaperConfig) -> Self {
        Self::new(config.fee, config.balances.clone())
    }

    /// 설정된 수수료를 반환합니다.
    pub fn fee(&self) -> Decimal {
        self.fee_percent
    }

    /// 현재 잔고를 반환합니다.
    pub fn balances(&self) -> &Balances {
        &self.balances
    }

    /// 미체결 주문을 반환합니다.
    pub fn open_orders(&self) -> Vec<OrderDescription> {
        self.open
            .iter()
            .map(|order| {
                OrderDescription::new(
                    order.order_id.clone(),
                    order.trade.pair.to_standard_string(),
                    order.trade.action,
                    order.trade.asset_price,
                    order.trade.volume,
                )
            })
            .collect()
    }

    /// 체결 완료된 주문을 반환합니다.
    pub fn closed_orders(&self) -> &[OrderDescription] {
        &self.closed
    }

    /// 미체결 주문들이 참조하는 거래 쌍 목록 (중복 제거).
    pub fn open_pairs(&self) -> Vec<TradablePair> {
        let mut pairs: Vec<TradablePair> = Vec::new();
        for order in &self.open {
            if !pairs.contains(&order.trade.pair) {
                pairs.push(order.trade.pair.clone());
            }
        }
        pairs
    }

    /// 새 주문을 접수합니다.
    ///
    /// 잔고 확인과 주문 기록은 하나의 단계입니다. 잔고가 부족하면
    /// 상태를 전혀 바꾸지 않고 [`ExchangeError::InsufficientFunds`]를
    /// 반환합니다. 접수된 주문은 즉시 체결을 시도하며, 체결 여부와
    /// 관계없이 부여된 주문 ID를 반환합니다.
    pub fn add_order(
        &mut self,
        trade: &TradeDescription,
        oracle_price: Decimal,
    ) -> ExchangeResult<String> {
        match trade.order_type {
            OrderType::Limit | OrderType::Market => {}
            other => {
                return Err(ExchangeError::NotSupported(format!(
                    "{} orders in paper trading",
                    other
                )))
            }
        }

        self.check_funds(trade, oracle_price)?;

        let order_id = self.generate_order_id();
        self.open.push(PaperOrder {
            order_id: order_id.clone(),
            trade: trade.clone(),
        });
        self.try_fill(self.open.len() - 1, oracle_price);

        Ok(order_id)
    }

    /// 미체결 주문을 현재 가격으로 재평가합니다.
    ///
    /// 접수 순서대로 순회하며, 각 주문은 체결 조건과 함께 *현재* 잔고를
    /// 다시 확인합니다. 앞선 체결이 자금을 소진해 잔고가 모자라게 된
    /// 주문은 에러 없이 미체결 상태로 남습니다. 체결된 주문 목록을
    /// 반환합니다.
    pub fn fill_open_orders(
        &mut self,
        prices: &HashMap<TradablePair, Decimal>,
    ) -> Vec<OrderDescription> {
        let mut filled = Vec::new();
        let mut index = 0;

        while index < self.open.len() {
            let pair = &self.open[index].trade.pair;
            let Some(&oracle_price) = prices.get(pair) else {
                index += 1;
                continue;
            };

            match self.try_fill(index, oracle_price) {
                // 체결된 주문은 목록에서 빠졌으므로 index 유지
                Some(description) => filled.push(description),
                None => index += 1,
            }
        }
        filled
    }

    /// 미체결 주문을 취소하고 제거합니다.
    pub fn cancel_order(&mut self, order_id: &str) -> ExchangeResult<()> {
        match self.open.iter().position(|order| order.order_id == order_id) {
            Some(index) => {
                self.open.remove(index);
                Ok(())
            }
            None => Err(ExchangeError::OrderNotFound(order_id.to_string())),
        }
    }

    fn generate_order_id(&mut self) -> String {
        let id = self.next_order_id;
        self.next_order_id += 1;
        id.to_string()
    }

    /// 체결에 적용될 가격. 시장가는 오라클 가격, 그 외에는 지정가.
    fn execution_price(trade: &TradeDescription, oracle_price: Decimal) -> Decimal {
        match trade.order_type {
            OrderType::Market => oracle_price,
            _ => trade.asset_price,
        }
    }

    /// 현재 오라클 가격에서 체결 조건이 충족되는지 확인합니다.
    fn fill_condition(trade: &TradeDescription, oracle_price: Decimal) -> bool {
        match trade.order_type {
            OrderType::Market => true,
            OrderType::Limit => match trade.action {
                TradeAction::Buy => oracle_price <= trade.asset_price,
                TradeAction::Sell => oracle_price >= trade.asset_price,
            },
            _ => false,
        }
    }

    /// 주문에 필요한 자산과 수량을 계산합니다.
    ///
    /// 매수는 명목가 + 수수료만큼의 가격 단위 자산, 매도는 팔 수량만큼의
    /// 자산 자체가 필요합니다.
    fn required_funds(
        trade: &TradeDescription,
        execution_price: Decimal,
        fee_percent: Decimal,
    ) -> (String, Decimal) {
        match trade.action {
            TradeAction::Buy => {
                let notional = execution_price * trade.volume;
                let cost = notional * (Decimal::ONE + fee_percent / Decimal::ONE_HUNDRED);
                (trade.pair.price_unit().to_string(), cost)
            }
            TradeAction::Sell => (trade.pair.asset().to_string(), trade.volume),
        }
    }

    fn check_funds(&self, trade: &TradeDescription, oracle_price: Decimal) -> ExchangeResult<()> {
        let execution_price = Self::execution_price(trade, oracle_price);
        let (asset, required) = Self::required_funds(trade, execution_price, self.fee_percent);
        let available = self.balances.get(&asset).copied().unwrap_or_default();

        if available < required {
            return Err(ExchangeError::InsufficientFunds {
                asset,
                required,
                available,
            });
        }
        Ok(())
    }

    fn has_funds(&self, trade: &TradeDescription, execution_price: Decimal) -> bool {
        let (asset, required) = Self::required_funds(trade, execution_price, self.fee_percent);
        self.balances.get(&asset).copied().unwrap_or_default() >= required
    }

    /// `index` 위치의 미체결 주문 체결을 시도합니다.
    ///
    /// 체결되면 주문은 미체결 목록에서 빠져 종결 목록으로 이동하고,
    /// 잔고가 정산됩니다. 조건 미충족이나 잔고 부족이면 주문은 그대로
    /// 남고 `None`을 반환합니다.
    fn try_fill(&mut self, index: usize, oracle_price: Decimal) -> Option<OrderDescription> {
        let trade = &self.open[index].trade;
        let execution_price = Self::execution_price(trade, oracle_price);

        if !Self::fill_condition(trade, oracle_price) {
            return None;
        }
        if !self.has_funds(trade, execution_price) {
            return None;
        }

        let order = self.open.remove(index);
        self.settle(&order.trade, execution_price);

        let description = OrderDescription::new(
            order.order_id,
            order.trade.pair.to_standard_string(),
            order.trade.action,
            execution_price,
            order.trade.volume,
        );
        self.closed.push(description.clone());
        Some(description)
    }

    /// 체결 대금을 잔고에 반영합니다.
    fn settle(&mut self, trade: &TradeDescription, execution_price: Decimal) {
        let notional = execution_price * trade.volume;
        let fee_multiplier = self.fee_percent / Decimal::ONE_HUNDRED;

        match trade.action {
            TradeAction::Buy => {
                let cost = notional * (Decimal::ONE + fee_multiplier);
                *self
                    .balances
                    .entry(trade.pair.price_unit().to_string())
                    .or_default() -= cost;
                *self.balances.entry(trade.pair.asset().to_string()).or_default() +=
                    trade.volume;
            }
            TradeAction::Sell => {
                let proceeds = notional * (Decimal::ONE - fee_multiplier);
                *self.balances.entry(trade.pair.asset().to_string()).or_default() -=
                    trade.volume;
                *self
                    .balances
                    .entry(trade.pair.price_unit().to_string())
                    .or_default() += proceeds;
            }
        }
    }
}
