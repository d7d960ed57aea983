//! Error taxonomy for the search service / 搜索服务错误分类
//!
//! Every failure the service can surface is a variant here, so callers
//! dispatch on the kind instead of matching message strings.
//! 所有错误按类型封闭枚举，调用方按变体分发，不依赖字符串匹配。

use thiserror::Error;

/// Search service errors / 搜索服务错误
#[derive(Debug, Error)]
pub enum SearchError {
    /// A query parameter failed validation / 查询参数校验失败
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// A qf / qf.dateRange value could not be parsed / 过滤器解析失败
    #[error("unable to parse filter '{raw}'")]
    FilterParse { raw: String },

    /// A parsed filter could not be compiled into an engine query / 过滤器编译失败
    #[error("unable to compile filter on '{label}': {reason}")]
    FilterCompile { label: String, reason: String },

    /// A facet field could not be compiled into an aggregation / 聚合编译失败
    #[error("unable to compile facet aggregation for '{field}': {reason}")]
    FacetCompile { field: String, reason: String },

    /// The requested window starts past the last matching record / 请求页超出结果范围
    #[error("page start {cursor} requested is greater than records returned: {total}")]
    PageOutOfRange { cursor: usize, total: u64 },

    /// The document index rejected or failed the query / 索引引擎查询失败
    #[error("engine query failed")]
    EngineQuery(#[source] anyhow::Error),

    /// An aggregation was missing or had an unexpected shape / 聚合解码失败
    #[error("unable to decode aggregation '{name}': {reason}")]
    AggregationDecode { name: String, reason: String },

    /// A cached payload could not be decoded. The cache layer absorbs this
    /// as a miss; it never fails a request. / 缓存解码失败，按未命中处理
    #[error("unable to decode cached response")]
    CacheDecode(#[source] serde_json::Error),

    /// No dataset metadata exists for the collection id / 数据集元数据缺失
    #[error("dataset lookup failed for '{spec}'")]
    DatasetLookup {
        spec: String,
        #[source]
        source: anyhow::Error,
    },

    /// An in-process search step could not be executed. A zero-count match
    /// is a normal result, never this error. / 进程内搜索步骤失败（零命中不算错误）
    #[error("search execution failed: {reason}")]
    SearchExecution { reason: String },
}

impl SearchError {
    pub fn invalid_parameter(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub fn filter_parse(raw: &str) -> Self {
        Self::FilterParse {
            raw: raw.to_string(),
        }
    }

    pub fn filter_compile(label: &str, reason: impl Into<String>) -> Self {
        Self::FilterCompile {
            label: label.to_string(),
            reason: reason.into(),
        }
    }

    pub fn facet_compile(field: &str, reason: impl Into<String>) -> Self {
        Self::FacetCompile {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn aggregation_decode(name: &str, reason: impl Into<String>) -> Self {
        Self::AggregationDecode {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// True when the caller sent a bad request rather than the backend
    /// failing, so HTTP layers can map kinds to status codes.
    /// 判断是否为调用方错误，便于上层映射状态码。
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidParameter { .. }
                | Self::FilterParse { .. }
                | Self::PageOutOfRange { .. }
        )
    }
}
