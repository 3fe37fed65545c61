//! 历史价格访问
//!
//! 历史数据由外部因子引擎/筛选器提供，这里只定义访问接口和列对齐、收益率计算。
//! 当没有真实历史时，组合构建使用固定种子的合成收益率。

use crate::{PipelineError, Result};
use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand::distributions::Distribution;
use statrs::distribution::Normal;
use std::collections::HashMap;

/// 历史数据提供者
#[cfg_attr(test, mockall::automock)]
pub trait HistoryProvider: Send + Sync {
    /// 获取指定标的最近 `lookback` 个周期的收盘价，可能没有数据
    fn get_history(&self, symbols: &[String], lookback: usize) -> Option<PriceHistory>;
}

/// 收盘价矩阵：每行一个时间点，每列一个标的
#[derive(Debug, Clone, PartialEq)]
pub struct PriceHistory {
    columns: Vec<String>,
    closes: Array2<f64>,
}

impl PriceHistory {
    /// 列数必须与列名一致
    pub fn new(columns: Vec<String>, closes: Array2<f64>) -> Result<Self> {
        if closes.ncols() != columns.len() {
            return Err(PipelineError::data(&format!(
                "Price matrix has {} columns but {} symbols were given",
                closes.ncols(),
                columns.len()
            )));
        }
        Ok(Self { columns, closes })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    /// 按 `symbols` 的顺序选取列并计算简单收益率
    ///
    /// 任一标的缺列时返回 None；含非有限值的行被丢弃。
    pub fn returns(&self, symbols: &[String]) -> Option<Array2<f64>> {
        let indices = symbols
            .iter()
            .map(|symbol| self.columns.iter().position(|c| c == symbol))
            .collect::<Option<Vec<_>>>()?;

        let aligned = self.closes.select(Axis(1), &indices);
        if aligned.nrows() < 2 {
            return Some(Array2::zeros((0, symbols.len())));
        }

        let rows: Vec<Vec<f64>> = (1..aligned.nrows())
            .map(|t| {
                aligned
                    .row(t)
                    .iter()
                    .zip(aligned.row(t - 1).iter())
                    .map(|(current, previous)| current / previous - 1.0)
                    .collect::<Vec<f64>>()
            })
            .filter(|row| row.iter().all(|r| r.is_finite()))
            .collect();

        let mut returns = Array2::zeros((rows.len(), symbols.len()));
        for (i, row) in rows.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                returns[[i, j]] = *value;
            }
        }
        Some(returns)
    }
}

/// 内存历史数据源，按标的保存收盘价序列
#[derive(Debug, Clone, Default)]
pub struct InMemoryHistory {
    closes: HashMap<String, Vec<f64>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: impl Into<String>, closes: Vec<f64>) {
        self.closes.insert(symbol.into(), closes);
    }
}

impl HistoryProvider for InMemoryHistory {
    /// 只返回拥有数据的标的列；所有序列按尾部对齐到最短长度
    fn get_history(&self, symbols: &[String], lookback: usize) -> Option<PriceHistory> {
        let available: Vec<(&String, &Vec<f64>)> = symbols
            .iter()
            .filter_map(|symbol| self.closes.get(symbol).map(|series| (symbol, series)))
            .collect();
        if available.is_empty() {
            return None;
        }

        // 收益率需要 lookback + 1 个价格点
        let rows = available
            .iter()
            .map(|(_, series)| series.len())
            .min()
            .unwrap_or(0)
            .min(lookback + 1);

        let mut closes = Array2::zeros((rows, available.len()));
        for (j, (_, series)) in available.iter().enumerate() {
            let tail = &series[series.len() - rows..];
            for (i, price) in tail.iter().enumerate() {
                closes[[i, j]] = *price;
            }
        }

        let columns = available.iter().map(|(symbol, _)| (*symbol).clone()).collect();
        match PriceHistory::new(columns, closes) {
            Ok(history) => Some(history),
            Err(e) => {
                tracing::warn!("Discarding in-memory history: {}", e);
                None
            }
        }
    }
}

/// 生成合成收益率
///
/// 使用局部的、固定种子的生成器，不触碰任何全局随机状态。
pub fn synthetic_returns(
    lookback: usize,
    num_symbols: usize,
    seed: u64,
    volatility: f64,
) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = match Normal::new(0.0, volatility) {
        Ok(normal) => normal,
        Err(e) => {
            tracing::warn!("Invalid synthetic volatility {}: {}", volatility, e);
            return Array2::zeros((lookback, num_symbols));
        }
    };
    Array2::from_shape_fn((lookback, num_symbols), |_| normal.sample(&mut rng))
}
