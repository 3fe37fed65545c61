//! 均值-方差组合构建
//!
//! 洞见 → 目标持仓。集合持有跨周期的活跃洞见；每次构建时标的按字母排序，
//! μ、Σ、w 都严格按该顺序索引，方便逐项核对中间结果。

use super::PortfolioConstructionModel;
use crate::config::PortfolioConstructionConfig;
use crate::context::{AlgorithmContext, SecurityChanges};
use crate::history::synthetic_returns;
use crate::insight_collection::InsightCollection;
use crate::linalg::{condition_number, sample_covariance};
use crate::optimizer::MinVarianceProblem;
use crate::types::{Insight, PortfolioTarget};
use crate::Result;
use ndarray::{Array1, Array2};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;

/// 求解成功的目标标签
pub const MVO_TAG: &str = "MVO";
/// 等权回退的目标标签
pub const FALLBACK_TAG: &str = "MVO Fallback";

/// 权重来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AllocationMethod {
    /// 二次规划求解
    MeanVariance,
    /// 数据不足或求解失败时的等权回退
    EqualWeightFallback,
}

impl AllocationMethod {
    fn tag(self) -> &'static str {
        match self {
            AllocationMethod::MeanVariance => MVO_TAG,
            AllocationMethod::EqualWeightFallback => FALLBACK_TAG,
        }
    }
}

/// 一次组合构建的审计记录
#[derive(Debug, Clone)]
pub struct ConstructionOutcome {
    /// 排序后的标的，所有向量/矩阵按此索引
    pub symbols: Vec<String>,
    /// 预期回报 μ
    pub expected_returns: Array1<f64>,
    /// 协方差 Σ（回退且未计算时为空）
    pub covariance: Option<Array2<f64>>,
    /// 权重 w
    pub weights: Array1<f64>,
    pub method: AllocationMethod,
    pub targets: Vec<PortfolioTarget>,
}

impl ConstructionOutcome {
    fn empty() -> Self {
        Self {
            symbols: Vec::new(),
            expected_returns: Array1::zeros(0),
            covariance: None,
            weights: Array1::zeros(0),
            method: AllocationMethod::EqualWeightFallback,
            targets: Vec::new(),
        }
    }

    /// 隐含净敞口 Σ(数量·价格/权益)
    pub fn implied_exposure(&self, context: &AlgorithmContext) -> f64 {
        let equity = context.equity();
        self.targets
            .iter()
            .filter_map(|target| {
                context
                    .price(target.symbol())
                    .map(|price| target.quantity() * price / equity)
            })
            .sum()
    }
}

/// 跨周期状态：集合变更与优化在同一把锁下完成
#[derive(Debug, Default)]
struct ConstructionState {
    insights: InsightCollection,
    removed_symbols: Vec<String>,
}

/// 均值-方差组合构建器
#[derive(Debug)]
pub struct MeanVarianceConstructor {
    name: String,
    config: PortfolioConstructionConfig,
    state: Mutex<ConstructionState>,
}

impl MeanVarianceConstructor {
    pub fn new(config: PortfolioConstructionConfig) -> Self {
        Self {
            name: "MeanVarianceOptimization".to_string(),
            config,
            state: Mutex::new(ConstructionState::default()),
        }
    }

    pub fn config(&self) -> &PortfolioConstructionConfig {
        &self.config
    }

    /// 集合中仍保留的洞见数量（含尚未清理的过期项）
    pub fn tracked_insights(&self) -> usize {
        self.state.lock().insights.len()
    }

    /// 构建目标并返回完整的中间结果
    pub fn construct(
        &self,
        new_insights: &[Insight],
        context: &AlgorithmContext,
    ) -> ConstructionOutcome {
        let mut state = self.state.lock();
        let now = context.time();

        state.insights.add(new_insights);
        state.insights.remove_expired(now);
        if !state.removed_symbols.is_empty() {
            let removed = std::mem::take(&mut state.removed_symbols);
            state.insights.clear(&removed);
            tracing::info!("Cleared insights for removed symbols: {:?}", removed);
        }

        let active = state.insights.get_active_insights(now);
        if active.is_empty() {
            tracing::debug!("No active insights, no targets created");
            return ConstructionOutcome::empty();
        }

        let (symbols, expected_returns) = expected_returns(&active);
        let n = symbols.len();
        let initial = Array1::from_elem(n, 1.0 / n as f64);

        let covariance = match self.covariance(&symbols, context) {
            Some(covariance) => covariance,
            None => {
                tracing::warn!(
                    "Insufficient return history for {:?}, using equal-weight fallback",
                    symbols
                );
                let targets = weights_to_targets(
                    &symbols,
                    &initial,
                    AllocationMethod::EqualWeightFallback,
                    context,
                );
                return ConstructionOutcome {
                    symbols,
                    expected_returns,
                    covariance: None,
                    weights: initial,
                    method: AllocationMethod::EqualWeightFallback,
                    targets,
                };
            }
        };

        let problem = MinVarianceProblem {
            covariance: &covariance,
            expected_returns: &expected_returns,
            target_return: self.config.target_return,
            lower_bound: self.config.min_weight,
            upper_bound: self.config.max_weight,
        };
        let (weights, method) = match problem.solve(&initial, self.config.max_iterations) {
            Ok(solution) => (solution.weights, AllocationMethod::MeanVariance),
            Err(e) => {
                tracing::warn!("MVO solver failed ({}), falling back to equal weights", e);
                (initial, AllocationMethod::EqualWeightFallback)
            }
        };

        let targets = weights_to_targets(&symbols, &weights, method, context);
        tracing::info!(
            "Portfolio construction: {} active insights, {} symbols, {} targets ({:?})",
            active.len(),
            n,
            targets.len(),
            method
        );

        ConstructionOutcome {
            symbols,
            expected_returns,
            covariance: Some(covariance),
            weights,
            method,
            targets,
        }
    }

    /// 样本协方差，病态时加对角正则
    fn covariance(&self, symbols: &[String], context: &AlgorithmContext) -> Option<Array2<f64>> {
        let returns = self.returns_matrix(symbols, context)?;
        let covariance = sample_covariance(&returns)?;

        let condition = condition_number(&covariance);
        if condition > 1.0 / f64::EPSILON {
            tracing::debug!(
                "Covariance is ill-conditioned (cond={:.3e}), adding {:e}·I",
                condition,
                self.config.regularization
            );
            let n = symbols.len();
            return Some(covariance + Array2::<f64>::eye(n) * self.config.regularization);
        }
        Some(covariance)
    }

    /// 按 `symbols` 顺序对齐的收益率矩阵
    fn returns_matrix(
        &self,
        symbols: &[String],
        context: &AlgorithmContext,
    ) -> Option<Array2<f64>> {
        match context.get_history(symbols, self.config.lookback) {
            Some(history) if !history.is_empty() => {
                let returns = history.returns(symbols);
                if returns.is_none() {
                    tracing::debug!("History is missing columns for some of {:?}", symbols);
                }
                returns
            }
            _ if self.config.synthetic_history => {
                tracing::debug!("No history available, using seeded synthetic returns");
                Some(synthetic_returns(
                    self.config.lookback,
                    symbols.len(),
                    self.config.synthetic_seed,
                    self.config.synthetic_volatility,
                ))
            }
            _ => None,
        }
    }
}

impl PortfolioConstructionModel for MeanVarianceConstructor {
    fn create_targets(
        &self,
        insights: &[Insight],
        context: &AlgorithmContext,
    ) -> Result<Vec<PortfolioTarget>> {
        Ok(self.construct(insights, context).targets)
    }

    fn on_securities_changed(&self, _context: &AlgorithmContext, changes: &SecurityChanges) {
        let mut state = self.state.lock();
        for symbol in &changes.removed {
            if !state.removed_symbols.contains(symbol) {
                state.removed_symbols.push(symbol.clone());
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// 排序后的标的及其平均洞见幅度
fn expected_returns(active: &[Insight]) -> (Vec<String>, Array1<f64>) {
    let mut magnitudes: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for insight in active {
        let entry = magnitudes.entry(insight.symbol()).or_insert((0.0, 0));
        entry.0 += insight.magnitude();
        entry.1 += 1;
    }

    let symbols = magnitudes.keys().map(|s| s.to_string()).collect();
    let mu = magnitudes
        .values()
        .map(|(sum, count)| sum / *count as f64)
        .collect::<Array1<f64>>();
    (symbols, mu)
}

/// 权重 → 目标数量，价格不可解析的标的跳过
fn weights_to_targets(
    symbols: &[String],
    weights: &Array1<f64>,
    method: AllocationMethod,
    context: &AlgorithmContext,
) -> Vec<PortfolioTarget> {
    let equity = context.equity();
    symbols
        .iter()
        .zip(weights.iter())
        .filter_map(|(symbol, weight)| match context.price(symbol) {
            Some(price) => {
                let quantity = equity * weight / price;
                Some(PortfolioTarget::new(symbol.clone(), quantity).with_tag(method.tag()))
            }
            None => {
                tracing::debug!("No price for {}, skipping target", symbol);
                None
            }
        })
        .collect()
}
