//! 机构风险闸门
//!
//! 对每个目标依次执行：困境评分否决 → 集中度上限。价格不可解析时集中度检查无法进行，
//! 默认原样放行，可通过 `veto_unpriced` 改为清零。

use super::RiskManagementModel;
use crate::config::RiskManagementConfig;
use crate::context::AlgorithmContext;
use crate::types::PortfolioTarget;
use crate::Result;

/// 机构风险模型
#[derive(Debug, Clone)]
pub struct InstitutionalRiskModel {
    name: String,
    config: RiskManagementConfig,
}

impl InstitutionalRiskModel {
    pub fn new(config: RiskManagementConfig) -> Self {
        Self {
            name: "InstitutionalRisk".to_string(),
            config,
        }
    }

    pub fn config(&self) -> &RiskManagementConfig {
        &self.config
    }

    /// 调整单个目标，输出与输入同一标的
    pub fn adjust_target(
        &self,
        target: &PortfolioTarget,
        context: &AlgorithmContext,
    ) -> PortfolioTarget {
        let symbol = target.symbol();
        let mut quantity = target.quantity();

        // 评分为 0 视为缺失
        if let Some(score) = context.metric(symbol, &self.config.distress_metric) {
            if score != 0.0 && score < self.config.min_distress_score {
                tracing::warn!(
                    "RISK VETO: {} {}={:.2} < {:.2}, target forced to 0",
                    symbol,
                    self.config.distress_metric,
                    score,
                    self.config.min_distress_score
                );
                quantity = 0.0;
            }
        }

        match context.price(symbol) {
            Some(price) => {
                let limit = (context.equity() * self.config.max_concentration).max(0.0);
                let notional = (quantity * price).abs();
                if notional > limit {
                    let capped = (limit / price).floor() * quantity.signum();
                    tracing::warn!(
                        "RISK CAP: {} notional ${:.2} exceeds ${:.2} ({:.0}% of equity), {} -> {}",
                        symbol,
                        notional,
                        limit,
                        self.config.max_concentration * 100.0,
                        quantity,
                        capped
                    );
                    quantity = capped;
                }
            }
            None if self.config.veto_unpriced && quantity != 0.0 => {
                tracing::warn!("RISK VETO: {} has no usable price, target forced to 0", symbol);
                quantity = 0.0;
            }
            None => {
                tracing::debug!("No price for {}, concentration check skipped", symbol);
            }
        }

        target.with_quantity(quantity)
    }
}

impl Default for InstitutionalRiskModel {
    fn default() -> Self {
        Self::new(RiskManagementConfig::default())
    }
}

impl RiskManagementModel for InstitutionalRiskModel {
    fn adjust_targets(
        &self,
        targets: &[PortfolioTarget],
        context: &AlgorithmContext,
    ) -> Result<Vec<PortfolioTarget>> {
        Ok(targets
            .iter()
            .map(|target| self.adjust_target(target, context))
            .collect())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{MarketSnapshot, PortfolioState, Scorecard};
    use chrono::{TimeZone, Utc};

    fn context(snapshot: MarketSnapshot) -> AlgorithmContext {
        AlgorithmContext::new(
            Utc.with_ymd_and_hms(2026, 1, 20, 12, 0, 0).unwrap(),
            vec!["AAPL".to_string(), "TSLA".to_string()],
            PortfolioState::new(100_000.0),
            snapshot,
        )
    }

    fn with_z(symbol: &str, z: f64) -> MarketSnapshot {
        MarketSnapshot::default()
            .with_price(symbol, 100.0)
            .with_scorecard(symbol, Scorecard::default().with_metric("altman_z", z))
    }

    #[test]
    fn test_distressed_symbol_is_vetoed() {
        let model = InstitutionalRiskModel::default();
        let ctx = context(with_z("TSLA", 1.2));
        let target = PortfolioTarget::new("TSLA", 50.0).with_tag("MVO");

        let adjusted = model.adjust_target(&target, &ctx);

        assert_eq!(adjusted.quantity(), 0.0);
        assert_eq!(adjusted.symbol(), "TSLA");
        assert_eq!(adjusted.tag(), Some("MVO"));
    }

    #[test]
    fn test_zero_score_is_treated_as_missing() {
        let model = InstitutionalRiskModel::default();
        let ctx = context(with_z("TSLA", 0.0));
        let adjusted = model.adjust_target(&PortfolioTarget::new("TSLA", 50.0), &ctx);
        assert_eq!(adjusted.quantity(), 50.0);
    }

    #[test]
    fn test_healthy_score_passes() {
        let model = InstitutionalRiskModel::default();
        let ctx = context(with_z("AAPL", 1.8));
        let adjusted = model.adjust_target(&PortfolioTarget::new("AAPL", 50.0), &ctx);
        assert_eq!(adjusted.quantity(), 50.0);
    }

    #[test]
    fn test_concentration_cap_long_and_short() {
        let model = InstitutionalRiskModel::default();
        let ctx = context(MarketSnapshot::default().with_price("AAPL", 150.0));

        let long = model.adjust_target(&PortfolioTarget::new("AAPL", 500.0), &ctx);
        assert_eq!(long.quantity(), 133.0);
        assert!(long.quantity() * 150.0 <= 20_000.0);

        let short = model.adjust_target(&PortfolioTarget::new("AAPL", -500.0), &ctx);
        assert_eq!(short.quantity(), -133.0);
    }

    #[test]
    fn test_within_cap_is_untouched() {
        let model = InstitutionalRiskModel::default();
        let ctx = context(MarketSnapshot::default().with_price("AAPL", 150.0));
        let adjusted = model.adjust_target(&PortfolioTarget::new("AAPL", 120.5), &ctx);
        assert_eq!(adjusted.quantity(), 120.5);
    }

    #[test]
    fn test_unpriced_target_policy() {
        let ctx = context(MarketSnapshot::default());
        let target = PortfolioTarget::new("MSFT", 1_000.0);

        let lenient = InstitutionalRiskModel::default();
        assert_eq!(lenient.adjust_target(&target, &ctx).quantity(), 1_000.0);

        let strict = InstitutionalRiskModel::new(RiskManagementConfig {
            veto_unpriced: true,
            ..Default::default()
        });
        assert_eq!(strict.adjust_target(&target, &ctx).quantity(), 0.0);
    }

    #[test]
    fn test_adjust_targets_preserves_length_and_order() {
        let model = InstitutionalRiskModel::default();
        let ctx = context(with_z("TSLA", 1.0).with_price("AAPL", 150.0));
        let targets = vec![
            PortfolioTarget::new("AAPL", 10.0),
            PortfolioTarget::new("TSLA", 10.0),
            PortfolioTarget::new("NVDA", 10.0),
        ];

        let adjusted = model.adjust_targets(&targets, &ctx).unwrap();

        let symbols: Vec<_> = adjusted.iter().map(|t| t.symbol()).collect();
        assert_eq!(symbols, vec!["AAPL", "TSLA", "NVDA"]);
        assert_eq!(adjusted[1].quantity(), 0.0);
    }
}
