//! 算法上下文
//!
//! 每个周期由编排器构建一次的只读快照：当前时间、股票池、持仓状态、
//! 行情与评分卡配置、活跃洞见以及历史数据访问入口。

use crate::history::{HistoryProvider, PriceHistory};
use crate::types::Insight;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// 单一标的持仓（多头、空头数量分开记录）
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    #[serde(default)]
    pub long: f64,
    #[serde(default)]
    pub short: f64,
}

impl Holding {
    pub fn long(quantity: f64) -> Self {
        Self {
            long: quantity,
            short: 0.0,
        }
    }

    pub fn short(quantity: f64) -> Self {
        Self {
            long: 0.0,
            short: quantity,
        }
    }

    /// 净持仓 = 多头 - 空头
    pub fn net(&self) -> f64 {
        self.long - self.short
    }
}

/// 组合状态
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    pub equity: f64,
    #[serde(default)]
    pub positions: HashMap<String, Holding>,
}

impl PortfolioState {
    pub fn new(equity: f64) -> Self {
        Self {
            equity,
            positions: HashMap::new(),
        }
    }

    pub fn with_position(mut self, symbol: impl Into<String>, holding: Holding) -> Self {
        self.positions.insert(symbol.into(), holding);
        self
    }
}

/// 量化评分卡
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scorecard {
    #[serde(default)]
    pub metrics: HashMap<String, f64>,
}

impl Scorecard {
    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }
}

/// 上下文配置：当前价格与评分卡
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    #[serde(default)]
    pub current_prices: HashMap<String, f64>,
    #[serde(default)]
    pub quant_scorecard: HashMap<String, Scorecard>,
}

impl MarketSnapshot {
    pub fn with_price(mut self, symbol: impl Into<String>, price: f64) -> Self {
        self.current_prices.insert(symbol.into(), price);
        self
    }

    pub fn with_scorecard(mut self, symbol: impl Into<String>, scorecard: Scorecard) -> Self {
        self.quant_scorecard.insert(symbol.into(), scorecard);
        self
    }
}

/// 证券变动
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityChanges {
    #[serde(default)]
    pub added: Vec<String>,
    #[serde(default)]
    pub removed: Vec<String>,
}

impl SecurityChanges {
    /// 比较前后两个股票池，结果按字母排序
    pub fn between(previous: &[String], current: &[String]) -> Self {
        let mut added: Vec<String> = current
            .iter()
            .filter(|symbol| !previous.contains(symbol))
            .cloned()
            .collect();
        let mut removed: Vec<String> = previous
            .iter()
            .filter(|symbol| !current.contains(symbol))
            .cloned()
            .collect();
        added.sort();
        added.dedup();
        removed.sort();
        removed.dedup();
        Self { added, removed }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// 算法上下文
#[derive(Clone)]
pub struct AlgorithmContext {
    time: DateTime<Utc>,
    universe: Vec<String>,
    portfolio_state: PortfolioState,
    config: MarketSnapshot,
    history: Option<Arc<dyn HistoryProvider>>,
    active_insights: Vec<Insight>,
}

impl AlgorithmContext {
    pub fn new(
        time: DateTime<Utc>,
        universe: Vec<String>,
        portfolio_state: PortfolioState,
        config: MarketSnapshot,
    ) -> Self {
        Self {
            time,
            universe,
            portfolio_state,
            config,
            history: None,
            active_insights: Vec::new(),
        }
    }

    /// 挂接历史数据提供者
    pub fn with_history(mut self, provider: Arc<dyn HistoryProvider>) -> Self {
        self.history = Some(provider);
        self
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn universe(&self) -> &[String] {
        &self.universe
    }

    pub fn portfolio_state(&self) -> &PortfolioState {
        &self.portfolio_state
    }

    pub fn config(&self) -> &MarketSnapshot {
        &self.config
    }

    pub fn equity(&self) -> f64 {
        self.portfolio_state.equity
    }

    /// 当前可用价格；缺失、非有限或非正价格视为不可解析
    pub fn price(&self, symbol: &str) -> Option<f64> {
        self.config
            .current_prices
            .get(symbol)
            .copied()
            .filter(|price| price.is_finite() && *price > 0.0)
    }

    /// 当前净持仓，无持仓为 0
    pub fn net_quantity(&self, symbol: &str) -> f64 {
        self.portfolio_state
            .positions
            .get(symbol)
            .map(Holding::net)
            .unwrap_or(0.0)
    }

    pub fn metric(&self, symbol: &str, name: &str) -> Option<f64> {
        self.config
            .quant_scorecard
            .get(symbol)
            .and_then(|scorecard| scorecard.metric(name))
    }

    /// 查询历史价格，没有提供者时返回 None
    pub fn get_history(&self, symbols: &[String], lookback: usize) -> Option<PriceHistory> {
        self.history
            .as_ref()
            .and_then(|provider| provider.get_history(symbols, lookback))
    }

    pub fn active_insights(&self) -> &[Insight] {
        &self.active_insights
    }

    /// 累积本周期新生成的洞见
    pub fn add_insights(&mut self, insights: &[Insight]) {
        self.active_insights.extend_from_slice(insights);
    }

    /// 丢弃已过期洞见
    pub fn clear_expired_insights(&mut self) {
        let now = self.time;
        self.active_insights.retain(|insight| !insight.is_expired(now));
    }
}

impl fmt::Debug for AlgorithmContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlgorithmContext")
            .field("time", &self.time)
            .field("universe", &self.universe)
            .field("portfolio_state", &self.portfolio_state)
            .field("config", &self.config)
            .field("has_history", &self.history.is_some())
            .field("active_insights", &self.active_insights.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MockHistoryProvider;
    use crate::types::InsightDirection;
    use chrono::{Duration, TimeZone};
    use ndarray::array;

    fn context() -> AlgorithmContext {
        AlgorithmContext::new(
            Utc.with_ymd_and_hms(2026, 1, 20, 12, 0, 0).unwrap(),
            vec!["AAPL".to_string(), "TSLA".to_string()],
            PortfolioState::new(100_000.0)
                .with_position("AAPL", Holding::long(100.0))
                .with_position("TSLA", Holding { long: 5.0, short: 20.0 }),
            MarketSnapshot::default()
                .with_price("AAPL", 150.0)
                .with_price("TSLA", 0.0)
                .with_scorecard("AAPL", Scorecard::default().with_metric("altman_z", 3.5)),
        )
    }

    #[test]
    fn test_price_lookup_rejects_non_positive() {
        let ctx = context();
        assert_eq!(ctx.price("AAPL"), Some(150.0));
        assert_eq!(ctx.price("TSLA"), None);
        assert_eq!(ctx.price("NVDA"), None);
    }

    #[test]
    fn test_net_quantity() {
        let ctx = context();
        assert_eq!(ctx.net_quantity("AAPL"), 100.0);
        assert_eq!(ctx.net_quantity("TSLA"), -15.0);
        assert_eq!(ctx.net_quantity("NVDA"), 0.0);
    }

    #[test]
    fn test_metric_lookup() {
        let ctx = context();
        assert_eq!(ctx.metric("AAPL", "altman_z"), Some(3.5));
        assert_eq!(ctx.metric("AAPL", "piotroski_f"), None);
        assert_eq!(ctx.metric("TSLA", "altman_z"), None);
    }

    #[test]
    fn test_history_without_provider() {
        let ctx = context();
        assert!(ctx.get_history(&["AAPL".to_string()], 63).is_none());
    }

    #[test]
    fn test_history_delegates_to_provider() {
        let mut provider = MockHistoryProvider::new();
        provider
            .expect_get_history()
            .withf(|symbols, lookback| {
                symbols.len() == 1 && symbols[0] == "AAPL" && *lookback == 63
            })
            .times(1)
            .returning(|symbols, _| {
                PriceHistory::new(symbols.to_vec(), array![[1.0], [1.1]]).ok()
            });

        let ctx = context().with_history(Arc::new(provider));
        let history = ctx.get_history(&["AAPL".to_string()], 63).unwrap();
        assert_eq!(history.columns(), &["AAPL".to_string()]);
    }

    #[test]
    fn test_insight_accumulation_and_expiry() {
        let mut ctx = context();
        let fresh = Insight::price(
            "AAPL",
            ctx.time(),
            Duration::days(1),
            InsightDirection::Up,
            0.05,
            0.8,
            "M1",
        )
        .unwrap();
        let stale = Insight::price(
            "TSLA",
            ctx.time() - Duration::days(2),
            Duration::days(1),
            InsightDirection::Up,
            0.03,
            0.6,
            "M2",
        )
        .unwrap();

        ctx.add_insights(&[fresh, stale]);
        assert_eq!(ctx.active_insights().len(), 2);

        ctx.clear_expired_insights();
        assert_eq!(ctx.active_insights().len(), 1);
        assert_eq!(ctx.active_insights()[0].symbol(), "AAPL");
    }

    #[test]
    fn test_security_changes_between_universes() {
        let previous = vec!["AAPL".to_string(), "TSLA".to_string(), "MSFT".to_string()];
        let current = vec!["NVDA".to_string(), "AAPL".to_string()];

        let changes = SecurityChanges::between(&previous, &current);

        assert_eq!(changes.added, vec!["NVDA".to_string()]);
        assert_eq!(changes.removed, vec!["MSFT".to_string(), "TSLA".to_string()]);
        assert!(SecurityChanges::between(&current, &current).is_empty());
    }
}
