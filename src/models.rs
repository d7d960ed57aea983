//! Dataset metadata models / 数据集元数据模型
//!
//! Dataset storage lives outside this crate; the search service only needs
//! lookup by collection id (spec). / 数据集存储在本 crate 之外，搜索服务只按 spec 查询。

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stored metadata for one archival collection / 单个馆藏的元数据
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    /// Collection id, matches the index group key / 馆藏标识，对应索引分组键
    pub spec: String,
    /// Display title of the finding aid / 检索工具标题
    pub label: String,
    /// Covered periods, preformatted / 覆盖时期
    #[serde(default)]
    pub period: Vec<String>,
    /// Full description text, searched by the description matcher / 完整描述文本
    #[serde(default)]
    pub description: String,
    /// Stored child-level total for the collection / 馆藏子层级总数
    #[serde(default)]
    pub clevels: u64,
}

/// Dataset metadata lookup seam / 数据集元数据查询接口
#[async_trait]
pub trait DatasetStore: Send + Sync {
    /// Look up one dataset by spec. Absence is an error, the assembler
    /// refuses to ship archives without metadata. / 按 spec 查询，缺失视为错误
    async fn get_dataset(&self, spec: &str) -> Result<Dataset>;
}

/// In-memory dataset store for embedding and tests / 内存数据集存储
#[derive(Default)]
pub struct MemoryDatasetStore {
    datasets: RwLock<HashMap<String, Dataset>>,
}

impl MemoryDatasetStore {
    pub fn new() -> Self {
        Self {
            datasets: RwLock::new(HashMap::new()),
        }
    }

    /// Register or replace one dataset / 注册或替换一个数据集
    pub fn insert(&self, dataset: Dataset) {
        self.datasets.write().insert(dataset.spec.clone(), dataset);
    }

    pub fn len(&self) -> usize {
        self.datasets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.read().is_empty()
    }
}

#[async_trait]
impl DatasetStore for MemoryDatasetStore {
    async fn get_dataset(&self, spec: &str) -> Result<Dataset> {
        self.datasets
            .read()
            .get(spec)
            .cloned()
            .ok_or_else(|| anyhow!("no dataset registered for spec '{}'", spec))
    }
}
