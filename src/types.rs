//! MosesPipeline 核心数据类型
//!
//! 流水线各阶段之间传递的不可变值类型：洞见(Insight)、投资组合目标(PortfolioTarget)
//! 以及执行阶段产出的订单指令(OrderInstruction)。

use crate::{PipelineError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 洞见方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightDirection {
    Flat,
    Up,
    Down,
}

/// 洞见类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightType {
    #[default]
    Price,
    Volatility,
}

/// Alpha洞见
///
/// 构造即校验：幅度必须为有限数、有效期必须为正、置信度在 [0, 1] 内。
/// 构造完成后不可修改，字段只能通过访问器读取：
///
/// ```compile_fail
/// use chrono::{Duration, Utc};
/// use moses_pipeline::{Insight, InsightDirection};
///
/// let mut insight = Insight::price(
///     "AAPL", Utc::now(), Duration::days(1), InsightDirection::Up, 0.05, 0.8, "ModelA",
/// ).unwrap();
/// insight.magnitude = 0.1;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "InsightRecord", into = "InsightRecord")]
pub struct Insight {
    symbol: String,
    generated_time: DateTime<Utc>,
    period: Duration,
    expiry_time: DateTime<Utc>,
    insight_type: InsightType,
    direction: InsightDirection,
    magnitude: f64,
    confidence: f64,
    weight: Option<f64>,
    source_model: String,
    tag: Option<String>,
}

/// 洞见的序列化形态，字段名严格固定，不接受未知字段
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct InsightRecord {
    symbol: String,
    generated_time: DateTime<Utc>,
    period_ns: i64,
    #[serde(default)]
    insight_type: InsightType,
    direction: InsightDirection,
    magnitude: f64,
    #[serde(default)]
    confidence: f64,
    source_model: String,
    #[serde(default)]
    weight: Option<f64>,
    #[serde(default)]
    tag: Option<String>,
}

impl Insight {
    /// 创建价格类洞见
    pub fn price(
        symbol: impl Into<String>,
        generated_time: DateTime<Utc>,
        period: Duration,
        direction: InsightDirection,
        magnitude: f64,
        confidence: f64,
        source_model: impl Into<String>,
    ) -> Result<Self> {
        Self::build(
            symbol.into(),
            generated_time,
            period,
            InsightType::Price,
            direction,
            magnitude,
            confidence,
            source_model.into(),
        )
    }

    /// 创建波动率类洞见
    pub fn volatility(
        symbol: impl Into<String>,
        generated_time: DateTime<Utc>,
        period: Duration,
        direction: InsightDirection,
        magnitude: f64,
        confidence: f64,
        source_model: impl Into<String>,
    ) -> Result<Self> {
        Self::build(
            symbol.into(),
            generated_time,
            period,
            InsightType::Volatility,
            direction,
            magnitude,
            confidence,
            source_model.into(),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        symbol: String,
        generated_time: DateTime<Utc>,
        period: Duration,
        insight_type: InsightType,
        direction: InsightDirection,
        magnitude: f64,
        confidence: f64,
        source_model: String,
    ) -> Result<Self> {
        if symbol.trim().is_empty() {
            return Err(PipelineError::validation("Insight symbol cannot be empty"));
        }
        if !magnitude.is_finite() {
            return Err(PipelineError::validation(
                "Magnitude must be a finite number (not NaN or Inf)",
            ));
        }
        if period <= Duration::zero() {
            return Err(PipelineError::validation("Period must be greater than zero"));
        }
        if period.num_nanoseconds().is_none() {
            return Err(PipelineError::validation("Period is out of range"));
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(PipelineError::validation(&format!(
                "Confidence must be within [0, 1], got {}",
                confidence
            )));
        }
        let expiry_time = generated_time
            .checked_add_signed(period)
            .ok_or_else(|| PipelineError::validation("Insight expiry is out of range"))?;

        Ok(Self {
            symbol,
            generated_time,
            period,
            expiry_time,
            insight_type,
            direction,
            magnitude,
            confidence,
            weight: None,
            source_model,
            tag: None,
        })
    }

    /// 附加标签，返回新实例
    pub fn with_tag(self, tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            ..self
        }
    }

    /// 附加权重，返回新实例
    pub fn with_weight(self, weight: f64) -> Result<Self> {
        if !weight.is_finite() {
            return Err(PipelineError::validation("Insight weight must be finite"));
        }
        Ok(Self {
            weight: Some(weight),
            ..self
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn generated_time(&self) -> DateTime<Utc> {
        self.generated_time
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn expiry_time(&self) -> DateTime<Utc> {
        self.expiry_time
    }

    pub fn insight_type(&self) -> InsightType {
        self.insight_type
    }

    pub fn direction(&self) -> InsightDirection {
        self.direction
    }

    pub fn magnitude(&self) -> f64 {
        self.magnitude
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn weight(&self) -> Option<f64> {
        self.weight
    }

    pub fn source_model(&self) -> &str {
        &self.source_model
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// 到期时刻本身即视为过期
    pub fn is_expired(&self, utc_time: DateTime<Utc>) -> bool {
        self.expiry_time <= utc_time
    }

    /// 计算洞见评分
    pub fn score(&self) -> f64 {
        self.magnitude * self.confidence
    }
}

impl TryFrom<InsightRecord> for Insight {
    type Error = PipelineError;

    fn try_from(record: InsightRecord) -> Result<Self> {
        let period = Duration::nanoseconds(record.period_ns);
        let insight = Self::build(
            record.symbol,
            record.generated_time,
            period,
            record.insight_type,
            record.direction,
            record.magnitude,
            record.confidence,
            record.source_model,
        )?;
        let insight = match record.weight {
            Some(weight) => insight.with_weight(weight)?,
            None => insight,
        };
        Ok(match record.tag {
            Some(tag) => insight.with_tag(tag),
            None => insight,
        })
    }
}

impl From<Insight> for InsightRecord {
    fn from(insight: Insight) -> Self {
        Self {
            symbol: insight.symbol,
            generated_time: insight.generated_time,
            // build() 保证有效期可用纳秒表示
            period_ns: insight.period.num_nanoseconds().unwrap_or(i64::MAX),
            insight_type: insight.insight_type,
            direction: insight.direction,
            magnitude: insight.magnitude,
            confidence: insight.confidence,
            source_model: insight.source_model,
            weight: insight.weight,
            tag: insight.tag,
        }
    }
}

/// 投资组合目标
///
/// 带符号的目标净持仓数量（正为多头，负为空头）。调整总是产生新实例：
///
/// ```compile_fail
/// use moses_pipeline::PortfolioTarget;
///
/// let mut target = PortfolioTarget::new("AAPL", 100.0);
/// target.quantity = 200.0;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortfolioTarget {
    symbol: String,
    quantity: f64,
    #[serde(default)]
    tag: Option<String>,
}

impl PortfolioTarget {
    pub fn new(symbol: impl Into<String>, quantity: f64) -> Self {
        Self {
            symbol: symbol.into(),
            quantity,
            tag: None,
        }
    }

    pub fn with_tag(self, tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            ..self
        }
    }

    /// 以新数量创建目标副本，保留标的与标签
    pub fn with_quantity(&self, quantity: f64) -> Self {
        Self {
            symbol: self.symbol.clone(),
            quantity,
            tag: self.tag.clone(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }
}

/// 订单动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderAction {
    Buy,
    Sell,
}

impl fmt::Display for OrderAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderAction::Buy => write!(f, "buy"),
            OrderAction::Sell => write!(f, "sell"),
        }
    }
}

/// 订单指令 - 执行阶段的输出，交由券商接口提交
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderInstruction {
    pub ticker: String,
    pub action: OrderAction,
    pub quantity: f64,
    pub trade_value: f64,
    pub cost_estimate: f64,
    pub reasoning: String,
}
