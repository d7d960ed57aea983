//! Search module - faceted search over archival finding aids / 搜索模块
//!
//! Pipeline / 流水线：
//! - request: raw HTTP params → typed, validated SearchRequest
//! - compile: SearchRequest → engine query body (cluster and detail shapes)
//! - facets: facet aggregations, post filters and drill-down links
//! - service: execute, assemble SearchResponse, consult the cache
//! - matcher + tokenizer: in-process refinement of description counts
//!
//! Call direction: service → compile/facets/matcher → index (unidirectional)
//! / 调用方向单向，下层不回调上层

pub mod cache;
pub mod compile;
pub mod facets;
pub mod filters;
pub mod matcher;
pub mod request;
pub mod response;
pub mod service;
pub mod tokenizer;

pub use cache::{CacheStats, ResponseCache};
pub use compile::{build_cluster_body, build_detail_body};
pub use facets::decode_facets;
pub use filters::{FilterKind, QueryFilter};
pub use matcher::{DescriptionIndex, DescriptionQuery};
pub use request::{RawParams, RequestKey, SearchRequest};
pub use response::{
    Archive, ArchiveDocument, CLevelEntry, Facet, FacetLink, SearchResponse, TreeNode,
};
pub use service::SearchService;

/// Field holding the collection identifier / 馆藏标识字段
pub const SPEC_FIELD: &str = "meta.spec";
/// Field holding the document type tags / 文档类型标签字段
pub const TAGS_FIELD: &str = "meta.tags";
/// Tag of child-level documents / 子层级文档标签
pub const ARCHIVE_TAG: &str = "ead";
/// Tag of archive description documents / 馆藏描述文档标签
pub const DESCRIPTION_TAG: &str = "eadDesc";

/// Nested path of metadata entries / 元数据条目嵌套路径
pub const ENTRIES_PATH: &str = "resources.entries";
/// Entry field label / 条目字段标签
pub const ENTRY_LABEL_FIELD: &str = "resources.entries.searchLabel";
/// Entry literal value, keyword-typed / 条目字面值
pub const ENTRY_VALUE_FIELD: &str = "resources.entries.@value.keyword";
/// Entry date range / 条目日期范围
pub const ENTRY_DATE_FIELD: &str = "resources.entries.dateRange";

/// Prefix of directly addressable tree fields / 树字段前缀
pub const TREE_FIELD_PREFIX: &str = "tree.";
/// Collection identifier on the tree header node / 树头节点上的馆藏标识
pub const INVENTORY_ID_FIELD: &str = "tree.inventoryID";
/// Document order within one archive / 单馆藏内的文档顺序
pub const SORT_KEY_FIELD: &str = "tree.sortKey";

/// Name of the collapse inner hit / 折叠内命中名称
pub const COLLAPSE_INNER_HIT: &str = "collapse";
/// Filtered counting aggregation / 过滤计数聚合
pub const COUNTS_AGG: &str = "counts";
/// Distinct collection count / 去重馆藏数
pub const SPEC_COUNT_AGG: &str = "specCount";
/// Per-tag counts under the post filter / 过滤后各标签计数
pub const TYPE_COUNT_AGG: &str = "typeCount";
/// Per-tag counts without the post filter / 未过滤各标签计数
pub const UNFILTERED_TYPE_COUNT_AGG: &str = "noFiltTypeCount";
