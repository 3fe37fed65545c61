//! 执行规划
//!
//! 目标持仓与当前净持仓的差额转为订单指令，金额过小的调整直接忽略。

use super::ExecutionModel;
use crate::config::ExecutionConfig;
use crate::context::AlgorithmContext;
use crate::types::{OrderAction, OrderInstruction, PortfolioTarget};
use crate::Result;

/// 执行规划器
#[derive(Debug, Clone)]
pub struct ExecutionPlanner {
    name: String,
    config: ExecutionConfig,
}

impl ExecutionPlanner {
    pub fn new(config: ExecutionConfig) -> Self {
        Self {
            name: "ExecutionPlanner".to_string(),
            config,
        }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// 单个目标的订单，无需交易时返回 None
    pub fn plan(
        &self,
        target: &PortfolioTarget,
        context: &AlgorithmContext,
    ) -> Option<OrderInstruction> {
        let symbol = target.symbol();
        let Some(price) = context.price(symbol) else {
            tracing::debug!("No price for {}, no order planned", symbol);
            return None;
        };
        if !target.quantity().is_finite() {
            tracing::warn!("Target quantity for {} is not finite, skipped", symbol);
            return None;
        }

        let current = context.net_quantity(symbol);
        let delta = target.quantity() - current;
        let trade_value = (delta * price).abs();

        if delta == 0.0 || trade_value < self.config.min_trade_value {
            tracing::debug!(
                "Holding {}: trade value ${:.2} below ${:.2}",
                symbol,
                trade_value,
                self.config.min_trade_value
            );
            return None;
        }

        let action = if delta > 0.0 {
            OrderAction::Buy
        } else {
            OrderAction::Sell
        };

        Some(OrderInstruction {
            ticker: symbol.to_string(),
            action,
            quantity: delta.abs(),
            trade_value,
            cost_estimate: trade_value * self.config.slippage_rate,
            reasoning: format!(
                "Adjusting {} -> {} (${:.2} move)",
                current,
                target.quantity(),
                trade_value
            ),
        })
    }
}

impl Default for ExecutionPlanner {
    fn default() -> Self {
        Self::new(ExecutionConfig::default())
    }
}

impl ExecutionModel for ExecutionPlanner {
    fn execute(
        &self,
        targets: &[PortfolioTarget],
        context: &AlgorithmContext,
    ) -> Result<Vec<OrderInstruction>> {
        let orders: Vec<OrderInstruction> = targets
            .iter()
            .filter_map(|target| self.plan(target, context))
            .collect();

        for order in &orders {
            tracing::info!(
                "Order: {} {:.4} {} (${:.2}, est. cost ${:.2})",
                order.action,
                order.quantity,
                order.ticker,
                order.trade_value,
                order.cost_estimate
            );
        }
        Ok(orders)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
