//! 洞见集合
//!
//! 按 (标的, 来源模型) 维护唯一的活跃洞见，负责洞见生命周期：
//! 新洞见替换旧洞见、到期清理、标的离开股票池时强制清除。

use crate::types::Insight;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};

/// 洞见键：(标的, 来源模型)
type InsightKey = (String, String);

/// 活跃洞见集合
#[derive(Debug, Clone, Default)]
pub struct InsightCollection {
    active: BTreeMap<InsightKey, Insight>,
}

impl InsightCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// 加入新洞见
    ///
    /// 同一键下只保留生成时间最新的洞见；时间相同则后处理者覆盖先处理者。
    pub fn add<'a, I>(&mut self, insights: I)
    where
        I: IntoIterator<Item = &'a Insight>,
    {
        for insight in insights {
            let key = (
                insight.symbol().to_string(),
                insight.source_model().to_string(),
            );
            match self.active.get(&key) {
                Some(existing) if insight.generated_time() < existing.generated_time() => {
                    tracing::debug!(
                        "Ignoring stale insight for {} from {}",
                        insight.symbol(),
                        insight.source_model()
                    );
                }
                _ => {
                    self.active.insert(key, insight.clone());
                }
            }
        }
    }

    /// 移除所有已过期洞见
    pub fn remove_expired(&mut self, utc_time: DateTime<Utc>) {
        let before = self.active.len();
        self.active.retain(|_, insight| !insight.is_expired(utc_time));
        let removed = before - self.active.len();
        if removed > 0 {
            tracing::debug!("Removed {} expired insights", removed);
        }
    }

    /// 强制清除离开股票池的标的的全部洞见，不论是否过期
    pub fn clear<S: AsRef<str>>(&mut self, symbols: &[S]) {
        let symbols: HashSet<&str> = symbols.iter().map(AsRef::as_ref).collect();
        self.active
            .retain(|(symbol, _), _| !symbols.contains(symbol.as_str()));
    }

    /// 获取当前有效洞见，按 (标的, 来源模型) 排序
    pub fn get_active_insights(&self, utc_time: DateTime<Utc>) -> Vec<Insight> {
        self.active
            .values()
            .filter(|insight| !insight.is_expired(utc_time))
            .cloned()
            .collect()
    }

    pub fn contains(&self, symbol: &str, source_model: &str) -> bool {
        self.active
            .contains_key(&(symbol.to_string(), source_model.to_string()))
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
