//! Search response payloads / 搜索响应载荷
//!
//! The wire shapes served to API consumers and stored in the response cache.
//! Field names follow the public contract, so serialization is part of the
//! interface here. / 对外与缓存共用的线格式，字段名属于公共契约。

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Assembled result of one search / 单次搜索的装配结果
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    /// Distinct archives matched / 命中的馆藏数
    #[serde(default)]
    pub archive_count: u64,
    /// Offset of the first hit on this page / 本页首个命中的偏移
    #[serde(default)]
    pub cursor: usize,
    #[serde(default)]
    pub total_pages: u64,
    /// Matching child-level documents / 命中的子层级文档数
    #[serde(default)]
    pub total_clevel_count: u64,
    /// Matching description documents / 命中的描述文档数
    #[serde(default)]
    pub total_description_count: u64,
    /// Sum of the published counts / 已发布计数之和
    #[serde(default)]
    pub total_hits: u64,
    #[serde(default)]
    pub archives: Vec<Archive>,
    /// Detail search only / 仅详情搜索
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub c_levels: Option<Vec<CLevelEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facets: Option<Vec<Facet>>,
    /// Raw engine response, attached on request / 按需附带的原始引擎响应
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explain: Option<Value>,
    /// Compiled request body, attached on request / 按需附带的已编译请求体
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<Value>,
}

/// One matched archive / 单个命中的馆藏
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Archive {
    #[serde(rename = "inventoryID")]
    pub inventory_id: String,
    pub title: String,
    #[serde(default)]
    pub period: Vec<String>,
    /// Matching child levels inside this archive / 该馆藏内命中的子层级数
    #[serde(default)]
    pub c_level_count: u64,
    /// Description matches for this archive / 该馆藏的描述命中数
    #[serde(default)]
    pub description_count: u64,
    /// Stored child-level total, independent of the query / 与查询无关的子层级总数
    #[serde(default)]
    pub clevels_total: u64,
}

/// One child-level row of a detail search / 详情搜索的单条子层级
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CLevelEntry {
    pub path: String,
    #[serde(rename = "unitID")]
    pub unit_id: String,
    pub label: String,
    #[serde(rename = "hubID")]
    pub hub_id: String,
    /// Position in the finding aid's own order / 在检索工具自身顺序中的位置
    #[serde(rename = "sortKey", default)]
    pub result_order: u64,
}

impl CLevelEntry {
    pub fn from_tree(tree: &TreeNode) -> Self {
        Self {
            path: tree.c_level.clone(),
            unit_id: tree.unit_id.clone(),
            label: tree.label.clone(),
            hub_id: tree.hub_id.clone(),
            result_order: tree.sort_key,
        }
    }
}

/// One facet with its value links / 单个分面及其取值链接
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Facet {
    /// Short display name, the field's trailing segment / 字段末段作为显示名
    pub name: String,
    pub field: String,
    /// Documents carrying this facet field / 含该分面字段的文档数
    pub total: u64,
    /// Documents beyond the returned buckets / 返回桶之外的文档数
    pub other_docs: u64,
    #[serde(default)]
    pub links: Vec<FacetLink>,
}

/// One clickable facet value / 单个可点击的分面取值
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetLink {
    /// Query string that toggles this value / 切换该取值的查询串
    pub url: String,
    pub is_selected: bool,
    pub value: String,
    pub display_string: String,
    pub count: u64,
}

/// Decoded `tree` node of a child-level document / 子层级文档的 `tree` 节点
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    #[serde(default)]
    pub c_level: String,
    #[serde(rename = "unitID", default)]
    pub unit_id: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "hubID", default)]
    pub hub_id: String,
    #[serde(default)]
    pub sort_key: u64,
    #[serde(rename = "inventoryID", default)]
    pub inventory_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// `_source` wrapper around the tree node / `_source` 中的 tree 外层
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArchiveDocument {
    #[serde(default)]
    pub tree: Option<TreeNode>,
}
