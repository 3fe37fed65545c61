//! MosesPipeline 四阶段策略流水线
//!
//! 1. Alpha Creation - 洞见生成
//! 2. Portfolio Construction - 投资组合构建
//! 3. Risk Management - 风险管理
//! 4. Execution - 订单规划

pub mod alpha;
pub mod execution;
pub mod portfolio;
pub mod risk;

pub use alpha::ExternalSignalAlphaModel;
pub use execution::ExecutionPlanner;
pub use portfolio::{AllocationMethod, ConstructionOutcome, MeanVarianceConstructor};
pub use risk::InstitutionalRiskModel;

use crate::config::PipelineConfig;
use crate::context::{AlgorithmContext, SecurityChanges};
use crate::types::{Insight, OrderInstruction, PortfolioTarget};
use crate::Result;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 第一阶段：Alpha模型
pub trait AlphaModel: Send + Sync {
    /// 生成本周期的洞见
    fn update(&self, context: &AlgorithmContext) -> Result<Vec<Insight>>;

    /// 获取模型名称
    fn name(&self) -> &str;
}

/// 第二阶段：投资组合构建
pub trait PortfolioConstructionModel: Send + Sync {
    fn create_targets(
        &self,
        insights: &[Insight],
        context: &AlgorithmContext,
    ) -> Result<Vec<PortfolioTarget>>;

    /// 股票池变动通知
    fn on_securities_changed(&self, _context: &AlgorithmContext, _changes: &SecurityChanges) {}

    fn name(&self) -> &str;
}

/// 第三阶段：风险管理，输出与输入一一对应
pub trait RiskManagementModel: Send + Sync {
    fn adjust_targets(
        &self,
        targets: &[PortfolioTarget],
        context: &AlgorithmContext,
    ) -> Result<Vec<PortfolioTarget>>;
    fn name(&self) -> &str;
}

/// 第四阶段：执行
pub trait ExecutionModel: Send + Sync {
    fn execute(
        &self,
        targets: &[PortfolioTarget],
        context: &AlgorithmContext,
    ) -> Result<Vec<OrderInstruction>>;
    fn name(&self) -> &str;
}

/// 算法框架
pub struct AlgorithmFramework {
    alpha_models: Vec<Arc<dyn AlphaModel>>,
    portfolio_constructor: Arc<dyn PortfolioConstructionModel>,
    risk_manager: Arc<dyn RiskManagementModel>,
    execution_model: Arc<dyn ExecutionModel>,
    /// 上一周期的股票池；锁在整个周期内持有
    previous_universe: Mutex<Option<Vec<String>>>,
    stats: RwLock<FrameworkStats>,
}

impl AlgorithmFramework {
    pub fn new(
        portfolio_constructor: Arc<dyn PortfolioConstructionModel>,
        risk_manager: Arc<dyn RiskManagementModel>,
        execution_model: Arc<dyn ExecutionModel>,
    ) -> Self {
        Self {
            alpha_models: Vec::new(),
            portfolio_constructor,
            risk_manager,
            execution_model,
            previous_universe: Mutex::new(None),
            stats: RwLock::new(FrameworkStats::default()),
        }
    }

    /// 默认组件：均值-方差构建、机构风险闸门、执行规划器
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            Arc::new(MeanVarianceConstructor::new(config.construction.clone())),
            Arc::new(InstitutionalRiskModel::new(config.risk.clone())),
            Arc::new(ExecutionPlanner::new(config.execution.clone())),
        )
    }

    pub fn with_alpha_model(mut self, model: Arc<dyn AlphaModel>) -> Self {
        self.alpha_models.push(model);
        self
    }

    pub fn alpha_model_names(&self) -> Vec<&str> {
        self.alpha_models.iter().map(|model| model.name()).collect()
    }

    /// 运行一个完整周期
    pub fn run_cycle(
        &self,
        context: &mut AlgorithmContext,
        external_insights: &[Insight],
    ) -> Result<CycleResult> {
        let start_time = Instant::now();
        let mut previous_universe = self.previous_universe.lock();

        if let Some(previous) = previous_universe.as_ref() {
            let changes = SecurityChanges::between(previous, context.universe());
            if !changes.is_empty() {
                tracing::info!(
                    "Universe changed: added {:?}, removed {:?}",
                    changes.added,
                    changes.removed
                );
                self.portfolio_constructor.on_securities_changed(context, &changes);
            }
        }
        *previous_universe = Some(context.universe().to_vec());

        let mut insights = Vec::new();
        for model in &self.alpha_models {
            match model.update(context) {
                Ok(generated) => insights.extend(generated),
                Err(e) => tracing::error!("Alpha model {} failed: {}", model.name(), e),
            }
        }
        insights.extend_from_slice(external_insights);

        context.add_insights(&insights);
        context.clear_expired_insights();

        let targets = self.portfolio_constructor.create_targets(&insights, context)?;
        let adjusted_targets = self.risk_manager.adjust_targets(&targets, context)?;
        let orders = self.execution_model.execute(&adjusted_targets, context)?;

        drop(previous_universe);

        let execution_time = start_time.elapsed();
        let mut stats = self.stats.write();
        stats.total_cycles += 1;
        stats.total_execution_time += execution_time;
        drop(stats);

        tracing::info!(
            "Cycle {}: {} insights, {} targets, {} orders in {:?}",
            context.time(),
            insights.len(),
            adjusted_targets.len(),
            orders.len(),
            execution_time
        );

        Ok(CycleResult {
            time: context.time(),
            insights_generated: insights.len(),
            targets,
            adjusted_targets,
            orders,
            execution_time,
        })
    }

    pub fn get_stats(&self) -> FrameworkStats {
        self.stats.read().clone()
    }
}

/// 周期执行结果
#[derive(Debug, Clone, Serialize)]
pub struct CycleResult {
    pub time: DateTime<Utc>,
    pub insights_generated: usize,
    pub targets: Vec<PortfolioTarget>,
    pub adjusted_targets: Vec<PortfolioTarget>,
    pub orders: Vec<OrderInstruction>,
    #[serde(skip)]
    pub execution_time: Duration,
}

/// 框架统计
#[derive(Debug, Clone, Default)]
pub struct FrameworkStats {
    pub total_cycles: u64,
    pub total_execution_time: Duration,
}

impl FrameworkStats {
    pub fn avg_execution_time(&self) -> Duration {
        if self.total_cycles > 0 {
            self.total_execution_time / self.total_cycles as u32
        } else {
            Duration::from_millis(0)
        }
    }
}
