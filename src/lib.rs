//! MosesPipeline - 确定性的洞见到订单流水线
//!
//! 洞见 (Insight) → 目标持仓 (PortfolioTarget) → 风险调整后目标 → 订单指令 (OrderInstruction)
//!
//! # 模块
//!
//! - **types / insight_collection**: 不可变的洞见与目标、按 (标的, 来源模型) 去重的洞见集合
//! - **context / history**: 每周期的算法上下文与历史价格访问
//! - **linalg / optimizer**: 协方差、条件数与有效集二次规划求解器
//! - **strategy**: 四个角色接口、默认实现与周期编排器
//! - **config / error**: YAML 配置与统一错误类型
//!
//! # 特性
//!
//! - **确定性**: 相同输入产生相同输出，合成历史数据使用固定种子
//! - **安全回退**: 数据不足或求解失败时退化为等权，不向外抛错
//! - **同步无副作用**: 不做 I/O，所有组件 `Send + Sync`

pub mod config;
pub mod context;
pub mod error;
pub mod history;
pub mod insight_collection;
pub mod linalg;
pub mod optimizer;
pub mod strategy;
pub mod types;

// 重新导出核心类型
pub use config::{ConfigManager, LoggingConfig, PipelineConfig};
pub use context::{
    AlgorithmContext, Holding, MarketSnapshot, PortfolioState, Scorecard, SecurityChanges,
};
pub use error::*;
pub use history::{HistoryProvider, InMemoryHistory, PriceHistory};
pub use insight_collection::InsightCollection;
pub use strategy::{
    AlgorithmFramework, AlphaModel, CycleResult, ExecutionModel, PortfolioConstructionModel,
    RiskManagementModel,
};
pub use types::*;

/// 框架信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const FRAMEWORK_NAME: &str = "MosesPipeline";

/// 初始化日志系统，重复调用时保留已安装的订阅者
pub fn initialize(logging: &LoggingConfig) -> Result<()> {
    let installed = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::from(logging.level))
        .with_target(logging.verbose)
        .with_file(logging.verbose)
        .with_line_number(logging.verbose)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("Initializing {} v{}", FRAMEWORK_NAME, VERSION);
    } else {
        tracing::debug!("Tracing subscriber already installed");
    }
    Ok(())
}
