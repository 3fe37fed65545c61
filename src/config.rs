//! MosesPipeline 配置管理系统
//!
//! 组合构建、风险闸门、执行规划和日志的参数，支持 YAML 文本驱动。
//! 所有字段都有默认值，YAML 中只需写出需要覆盖的部分。

use crate::{PipelineError, Result};
use serde::{Deserialize, Serialize};

/// 流水线配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// 组合构建配置
    pub construction: PortfolioConstructionConfig,
    /// 风险管理配置
    pub risk: RiskManagementConfig,
    /// 执行配置
    pub execution: ExecutionConfig,
    /// 日志配置
    pub logging: LoggingConfig,
}

/// 均值-方差组合构建配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioConstructionConfig {
    /// 历史回看周期数
    pub lookback: usize,
    /// 组合预期回报下限
    pub target_return: f64,
    /// 单一权重下界
    pub min_weight: f64,
    /// 单一权重上界
    pub max_weight: f64,
    /// 协方差病态时加到对角线上的正则项
    pub regularization: f64,
    /// 求解器最大迭代次数
    pub max_iterations: usize,
    /// 缺少历史数据时是否使用合成收益率
    pub synthetic_history: bool,
    /// 合成收益率种子
    pub synthetic_seed: u64,
    /// 合成收益率波动率
    pub synthetic_volatility: f64,
}

impl Default for PortfolioConstructionConfig {
    fn default() -> Self {
        Self {
            lookback: 63,
            target_return: 0.02,
            min_weight: -1.0,
            max_weight: 1.0,
            regularization: 1e-6,
            max_iterations: 500,
            synthetic_history: true,
            synthetic_seed: 42,
            synthetic_volatility: 0.01,
        }
    }
}

/// 风险管理配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskManagementConfig {
    /// 单一持仓占权益的最大比例
    pub max_concentration: f64,
    /// 困境评分下限，低于此值强制清零
    pub min_distress_score: f64,
    /// 评分卡中的困境指标名称
    pub distress_metric: String,
    /// 价格不可解析时是否清零（否则原样放行）
    pub veto_unpriced: bool,
}

impl Default for RiskManagementConfig {
    fn default() -> Self {
        Self {
            max_concentration: 0.20,
            min_distress_score: 1.8,
            distress_metric: "altman_z".to_string(),
            veto_unpriced: false,
        }
    }
}

/// 执行配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// 最小交易金额，低于此值不下单
    pub min_trade_value: f64,
    /// 滑点成本比例
    pub slippage_rate: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            min_trade_value: 500.0,
            slippage_rate: 0.0005,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: LogLevel,
    /// 是否输出调用位置等详细信息
    pub verbose: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            verbose: false,
        }
    }
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// 配置管理器
#[derive(Debug, Clone, Default)]
pub struct ConfigManager {
    config: PipelineConfig,
}

impl ConfigManager {
    /// 从 YAML 文本加载配置
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(content)
            .map_err(|e| PipelineError::config(&format!("Failed to parse config: {}", e)))?;
        Ok(Self { config })
    }

    /// 创建默认配置
    pub fn new_default() -> Self {
        Self::default()
    }

    /// 序列化为 YAML 文本
    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.config)?)
    }

    /// 获取配置
    pub fn get_config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 获取可变配置
    pub fn get_config_mut(&mut self) -> &mut PipelineConfig {
        &mut self.config
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        let construction = &self.config.construction;
        if construction.lookback < 2 {
            return Err(PipelineError::config("Lookback must be at least 2 periods"));
        }
        if !construction.target_return.is_finite() {
            return Err(PipelineError::config("Target return must be finite"));
        }
        if !(construction.min_weight <= 0.0 && construction.max_weight > 0.0) {
            return Err(PipelineError::config(
                "Weight bounds must satisfy min_weight <= 0 < max_weight",
            ));
        }
        if !(construction.regularization > 0.0 && construction.regularization.is_finite()) {
            return Err(PipelineError::config("Regularization must be positive"));
        }
        if construction.max_iterations == 0 {
            return Err(PipelineError::config("Solver needs at least one iteration"));
        }
        let volatility = construction.synthetic_volatility;
        if !(volatility > 0.0 && volatility.is_finite()) {
            return Err(PipelineError::config("Synthetic volatility must be positive"));
        }

        let risk = &self.config.risk;
        if !(risk.max_concentration > 0.0 && risk.max_concentration <= 1.0) {
            return Err(PipelineError::config("Max concentration must be between 0 and 1"));
        }
        if !risk.min_distress_score.is_finite() {
            return Err(PipelineError::config("Minimum distress score must be finite"));
        }
        if risk.distress_metric.trim().is_empty() {
            return Err(PipelineError::config("Distress metric name cannot be empty"));
        }

        let execution = &self.config.execution;
        if !(execution.min_trade_value >= 0.0 && execution.min_trade_value.is_finite()) {
            return Err(PipelineError::config("Minimum trade value must be non-negative"));
        }
        if !(execution.slippage_rate >= 0.0 && execution.slippage_rate < 1.0) {
            return Err(PipelineError::config("Slippage rate must be within [0, 1)"));
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }
}
