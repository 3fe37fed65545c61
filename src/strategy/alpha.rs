//! Alpha 适配器
//!
//! 洞见由外部协作方生成，这里只负责排队并在下一个周期交给流水线。

use super::AlphaModel;
use crate::context::AlgorithmContext;
use crate::types::Insight;
use crate::Result;
use parking_lot::Mutex;

/// 外部信号队列
///
/// `submit` 可在任意线程调用，`update` 一次性取走全部待处理洞见。
#[derive(Debug)]
pub struct ExternalSignalAlphaModel {
    name: String,
    pending: Mutex<Vec<Insight>>,
}

impl ExternalSignalAlphaModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn submit(&self, insight: Insight) {
        self.pending.lock().push(insight);
    }

    pub fn submit_all(&self, insights: impl IntoIterator<Item = Insight>) {
        self.pending.lock().extend(insights);
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }
}

impl AlphaModel for ExternalSignalAlphaModel {
    fn update(&self, context: &AlgorithmContext) -> Result<Vec<Insight>> {
        let drained = std::mem::take(&mut *self.pending.lock());
        let (live, expired): (Vec<Insight>, Vec<Insight>) = drained
            .into_iter()
            .partition(|insight| !insight.is_expired(context.time()));

        if !expired.is_empty() {
            tracing::debug!("{}: dropped {} expired insights", self.name, expired.len());
        }
        Ok(live)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
