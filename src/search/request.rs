//! Search request - recognized parameters, validation, cache key / 搜索请求
//!
//! Raw query parameters go through a fixed recognition table, in table order,
//! so parsing is deterministic regardless of arrival order. Unknown
//! parameters are ignored. / 原始参数按固定识别表顺序解析，未知参数忽略。
//!
//! The cache key hashes the canonical serialized request. Cache control and
//! diagnostic flags are excluded, they steer one request without changing
//! what is being asked. / 缓存键哈希规范化请求，缓存控制与诊断标志不参与。

use rustc_hash::FxHasher;
use serde::Serialize;
use std::fmt;
use std::hash::Hasher;

use crate::error::SearchError;

use super::filters::QueryFilter;

/// Default nested sort leaf under an entry / 条目下的默认嵌套排序叶子
pub const DEFAULT_NESTED_SORT_FIELD: &str = "@value.keyword";
/// Nested sort leaf selected by the `int.` sort prefix / `int.` 前缀选择的排序叶子
pub const INTEGER_NESTED_SORT_FIELD: &str = "integer";

const MAX_ROWS: usize = 100;
const MAX_FACET_SIZE: usize = 100;

/// Raw query parameters in arrival order, repeats kept / 按到达顺序保存的原始参数
#[derive(Debug, Clone, Default)]
pub struct RawParams {
    params: Vec<(String, String)>,
}

impl RawParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an URL query string, a leading `?` is tolerated / 解析查询字符串
    pub fn from_query_string(raw: &str) -> Self {
        let raw = raw.strip_prefix('?').unwrap_or(raw);
        let params = url::form_urlencoded::parse(raw.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Self { params }
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.params.push((name.into(), value.into()));
    }

    /// Builder form of [`append`](Self::append) / `append` 的构建器形式
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.append(name, value);
        self
    }

    pub fn first(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn all(&self, name: &str) -> Vec<&str> {
        self.params
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.iter().any(|(k, _)| k == name)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Cache key of one canonical request / 规范化请求的缓存键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestKey(u64);

impl RequestKey {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// One validated search request / 单个经过校验的搜索请求
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub page: usize,
    pub rows: usize,
    pub raw_query: String,
    pub filters: Vec<QueryFilter>,
    pub facet_fields: Vec<String>,
    pub facet_size: usize,
    /// `true` combines same-request facet filters with AND / 同请求过滤器按 AND 组合
    pub facet_and_bool_type: bool,
    pub sort_by: String,
    pub sort_asc: bool,
    pub nested_sort_field: String,
    /// Set by detail search before the key is taken / 详情搜索在取键前设置
    pub inventory_id: String,

    // 缓存控制与诊断标志，不进入缓存键
    #[serde(skip)]
    pub no_cache: bool,
    #[serde(skip)]
    pub cache_refresh: bool,
    #[serde(skip)]
    pub cache_reset: bool,
    #[serde(skip)]
    pub explain: bool,
    #[serde(skip)]
    pub echo_service: bool,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            page: 1,
            rows: 10,
            raw_query: String::new(),
            filters: Vec::new(),
            facet_fields: Vec::new(),
            facet_size: 50,
            facet_and_bool_type: false,
            sort_by: String::new(),
            sort_asc: false,
            nested_sort_field: DEFAULT_NESTED_SORT_FIELD.to_string(),
            inventory_id: String::new(),
            no_cache: false,
            cache_refresh: false,
            cache_reset: false,
            explain: false,
            echo_service: false,
        }
    }
}

type ParamSetter = fn(&mut SearchRequest, &RawParams, &str) -> Result<(), SearchError>;

/// Recognition table, applied in this order / 识别表，按此顺序应用
const RECOGNIZED_OPTIONS: &[(&str, ParamSetter)] = &[
    ("q", set_raw_query),
    ("query", set_raw_query),
    ("page", set_page),
    ("rows", set_rows),
    ("facet.field", set_facet_fields),
    ("facet.size", set_facet_size),
    ("FacetBoolType", set_facet_bool_type),
    ("qf", append_term_filters),
    ("qf[]", append_term_filters),
    ("qf.dateRange", append_date_range_filters),
    ("qf.dateRange[]", append_date_range_filters),
    ("sortBy", set_sort_by),
    ("noCache", set_no_cache),
    ("cacheRefresh", set_cache_refresh),
    ("cacheReset", set_cache_reset),
    ("explain", set_explain),
    ("service", set_echo_service),
];

fn parse_number(name: &str, raw: &str) -> Result<usize, SearchError> {
    raw.trim().parse().map_err(|_| {
        SearchError::invalid_parameter(name, format!("unable to parse '{}' as a number", raw))
    })
}

fn set_raw_query(req: &mut SearchRequest, params: &RawParams, name: &str) -> Result<(), SearchError> {
    if let Some(value) = params.first(name) {
        req.raw_query = value.to_string();
    }
    Ok(())
}

fn set_page(req: &mut SearchRequest, params: &RawParams, name: &str) -> Result<(), SearchError> {
    let page = parse_number(name, params.first(name).unwrap_or_default())?;
    if page == 0 {
        return Err(SearchError::invalid_parameter(
            name,
            "0 pages is not allowed. Paging starts at 1",
        ));
    }
    req.page = page;
    Ok(())
}

fn set_rows(req: &mut SearchRequest, params: &RawParams, name: &str) -> Result<(), SearchError> {
    let rows = parse_number(name, params.first(name).unwrap_or_default())?;
    req.rows = rows.min(MAX_ROWS);
    Ok(())
}

fn set_facet_fields(req: &mut SearchRequest, params: &RawParams, name: &str) -> Result<(), SearchError> {
    req.facet_fields = params.all(name).into_iter().map(str::to_string).collect();
    Ok(())
}

fn set_facet_size(req: &mut SearchRequest, params: &RawParams, name: &str) -> Result<(), SearchError> {
    let size = parse_number(name, params.first(name).unwrap_or_default())?;
    req.facet_size = size.min(MAX_FACET_SIZE);
    Ok(())
}

fn set_facet_bool_type(req: &mut SearchRequest, params: &RawParams, name: &str) -> Result<(), SearchError> {
    if let Some(value) = params.first(name) {
        if !value.is_empty() {
            req.facet_and_bool_type = value.eq_ignore_ascii_case("and");
        }
    }
    Ok(())
}

fn append_term_filters(req: &mut SearchRequest, params: &RawParams, name: &str) -> Result<(), SearchError> {
    for raw in params.all(name) {
        req.filters.push(QueryFilter::parse(raw)?);
    }
    Ok(())
}

fn append_date_range_filters(
    req: &mut SearchRequest,
    params: &RawParams,
    name: &str,
) -> Result<(), SearchError> {
    for raw in params.all(name) {
        req.filters.push(QueryFilter::parse_date_range(raw)?);
    }
    Ok(())
}

fn set_sort_by(req: &mut SearchRequest, params: &RawParams, name: &str) -> Result<(), SearchError> {
    let mut value = params.first(name).unwrap_or_default().to_string();
    if let Some(stripped) = value.strip_prefix('^') {
        req.sort_asc = true;
        value = stripped.to_string();
    }
    if let Some(stripped) = value.strip_prefix("int.") {
        req.nested_sort_field = INTEGER_NESTED_SORT_FIELD.to_string();
        value = stripped.to_string();
    }
    req.sort_by = value;
    Ok(())
}

fn flag_value(params: &RawParams, name: &str) -> bool {
    params
        .first(name)
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn set_no_cache(req: &mut SearchRequest, params: &RawParams, name: &str) -> Result<(), SearchError> {
    req.no_cache = flag_value(params, name);
    Ok(())
}

fn set_cache_refresh(req: &mut SearchRequest, params: &RawParams, name: &str) -> Result<(), SearchError> {
    req.cache_refresh = flag_value(params, name);
    Ok(())
}

fn set_cache_reset(req: &mut SearchRequest, params: &RawParams, name: &str) -> Result<(), SearchError> {
    req.cache_reset = flag_value(params, name);
    Ok(())
}

fn set_explain(req: &mut SearchRequest, params: &RawParams, name: &str) -> Result<(), SearchError> {
    req.explain = flag_value(params, name);
    Ok(())
}

fn set_echo_service(req: &mut SearchRequest, params: &RawParams, name: &str) -> Result<(), SearchError> {
    req.echo_service = flag_value(params, name);
    Ok(())
}

impl SearchRequest {
    /// Build a validated request from raw parameters / 从原始参数构建经校验的请求
    pub fn from_params(params: &RawParams) -> Result<Self, SearchError> {
        let mut request = Self::default();
        for (name, setter) in RECOGNIZED_OPTIONS {
            if params.contains(name) {
                setter(&mut request, params, name)?;
            }
        }
        Ok(request)
    }

    /// Queries with explicit operators skip the minimum-should-match rule
    /// / 带显式操作符的查询跳过 minimum-should-match
    pub fn is_advanced_search(&self) -> bool {
        self.raw_query.split_whitespace().any(|token| {
            matches!(token, "AND" | "OR" | "NOT")
                || token.starts_with('-')
                || token.starts_with('+')
                || token.starts_with('"')
                || token.ends_with('"')
        })
    }

    /// Description search stays on unless a filter leaves the description
    /// label / 只要过滤器都落在描述标签上，描述搜索保持开启
    pub fn description_search_enabled(&self, description_label: &str) -> bool {
        self.filters
            .iter()
            .all(|f| f.search_label == description_label)
    }

    /// Zero-based offset of the first hit on the requested page / 请求页首个命中的偏移
    pub fn cursor(&self) -> usize {
        if self.page == 1 || self.rows == 0 {
            return 0;
        }
        self.page.saturating_sub(1).saturating_mul(self.rows)
    }

    /// Page count for `total` records at the requested page size / 给定总数下的页数
    pub fn page_count(&self, total: u64) -> u64 {
        if self.rows == 0 || total == 0 {
            return 0;
        }
        let rows = self.rows as u64;
        if total < rows {
            return 1;
        }
        let mut pages = total / rows;
        if total % rows != 0 {
            pages += 1;
        }
        pages
    }

    /// Key of this request's canonical form / 本请求规范形式的键
    pub fn cache_key(&self) -> RequestKey {
        let mut hasher = FxHasher::default();
        if let Ok(bytes) = serde_json::to_vec(self) {
            hasher.write(&bytes);
        }
        RequestKey(hasher.finish())
    }

    /// Read and clear the reset flag, it acts once / 读取并清除重置标志
    pub fn take_cache_reset(&mut self) -> bool {
        let flag = self.cache_reset;
        self.cache_reset = false;
        flag
    }

    /// Read and clear the refresh flag, it acts once / 读取并清除刷新标志
    pub fn take_cache_refresh(&mut self) -> bool {
        let flag = self.cache_refresh;
        self.cache_refresh = false;
        flag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_query_string() {
        let params = RawParams::from_query_string("?q=rotterdam&qf%5B%5D=a:b&rows=20");
        assert_eq!(params.first("q"), Some("rotterdam"));
        assert_eq!(params.first("qf[]"), Some("a:b"));
        assert_eq!(params.first("rows"), Some("20"));
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_defaults() {
        let req = SearchRequest::from_params(&RawParams::new()).unwrap();
        assert_eq!(req.page, 1);
        assert_eq!(req.rows, 10);
        assert_eq!(req.facet_size, 50);
        assert_eq!(req.nested_sort_field, "@value.keyword");
        assert!(req.filters.is_empty());
        assert!(!req.facet_and_bool_type);
    }

    #[test]
    fn test_rows_and_facet_size_are_clamped() {
        let params = RawParams::new().with("rows", "150").with("facet.size", "200");
        let req = SearchRequest::from_params(&params).unwrap();
        assert_eq!(req.rows, 100);
        assert_eq!(req.facet_size, 100);

        let params = RawParams::new().with("rows", "25");
        assert_eq!(SearchRequest::from_params(&params).unwrap().rows, 25);
    }

    #[test]
    fn test_page_validation() {
        let zero = RawParams::new().with("page", "0");
        let err = SearchRequest::from_params(&zero).unwrap_err();
        assert!(err.to_string().contains("Paging starts at 1"));

        let junk = RawParams::new().with("page", "three");
        assert!(SearchRequest::from_params(&junk).is_err());

        let negative = RawParams::new().with("page", "-2");
        assert!(SearchRequest::from_params(&negative).is_err());

        let ok = RawParams::new().with("page", "4");
        assert_eq!(SearchRequest::from_params(&ok).unwrap().page, 4);
    }

    #[test]
    fn test_cursor() {
        let mut req = SearchRequest::default();
        assert_eq!(req.cursor(), 0);

        req.page = 3;
        req.rows = 10;
        assert_eq!(req.cursor(), 20);

        req.page = 2;
        req.rows = 0;
        assert_eq!(req.cursor(), 0);
    }

    #[test]
    fn test_page_count() {
        let mut req = SearchRequest::default();
        req.rows = 10;
        assert_eq!(req.page_count(0), 0);
        assert_eq!(req.page_count(5), 1);
        assert_eq!(req.page_count(10), 1);
        assert_eq!(req.page_count(11), 2);
        assert_eq!(req.page_count(95), 10);

        req.rows = 0;
        assert_eq!(req.page_count(95), 0);
    }

    #[test]
    fn test_advanced_search_detection() {
        let mut req = SearchRequest::default();
        for query in ["rotterdam AND delft", "\"exact phrase\"", "-excluded", "+required", "NOT this"] {
            req.raw_query = query.to_string();
            assert!(req.is_advanced_search(), "{} should be advanced", query);
        }
        for query in ["plain words", "android orchid", "anderson"] {
            req.raw_query = query.to_string();
            assert!(!req.is_advanced_search(), "{} should not be advanced", query);
        }
    }

    #[test]
    fn test_sort_by_prefixes() {
        let params = RawParams::new().with("sortBy", "^ead-rdf_date");
        let req = SearchRequest::from_params(&params).unwrap();
        assert!(req.sort_asc);
        assert_eq!(req.sort_by, "ead-rdf_date");
        assert_eq!(req.nested_sort_field, DEFAULT_NESTED_SORT_FIELD);

        let params = RawParams::new().with("sortBy", "^int.ead-rdf_age");
        let req = SearchRequest::from_params(&params).unwrap();
        assert!(req.sort_asc);
        assert_eq!(req.sort_by, "ead-rdf_age");
        assert_eq!(req.nested_sort_field, INTEGER_NESTED_SORT_FIELD);
    }

    #[test]
    fn test_facet_bool_type() {
        for (value, expected) in [("AND", true), ("and", true), ("or", false), ("OR", false)] {
            let params = RawParams::new().with("FacetBoolType", value);
            let req = SearchRequest::from_params(&params).unwrap();
            assert_eq!(req.facet_and_bool_type, expected, "value {}", value);
        }

        let empty = RawParams::new().with("FacetBoolType", "");
        assert!(!SearchRequest::from_params(&empty).unwrap().facet_and_bool_type);

        // 参数名大小写敏感，小写拼写不被识别
        let lowercase = RawParams::new().with("facetBoolType", "and");
        assert!(!SearchRequest::from_params(&lowercase).unwrap().facet_and_bool_type);
    }

    #[test]
    fn test_facet_field_assignment_replaces() {
        let params = RawParams::new()
            .with("facet.field", "tree.mimeType")
            .with("facet.field", "ead-rdf_genreform");
        let req = SearchRequest::from_params(&params).unwrap();
        assert_eq!(req.facet_fields, vec!["tree.mimeType", "ead-rdf_genreform"]);
    }

    #[test]
    fn test_filters_collected_from_both_spellings() {
        let params = RawParams::new()
            .with("qf", "a:b")
            .with("qf[]", "-c:d")
            .with("qf.dateRange[]", "ead-rdf_date:1600~1750");
        let req = SearchRequest::from_params(&params).unwrap();
        assert_eq!(req.filters.len(), 3);
        assert!(req.filters[1].exclude);
        assert!(req.filters[2].is_date_range());
    }

    #[test]
    fn test_unknown_params_are_ignored() {
        let params = RawParams::new().with("utm_source", "mailing").with("version", "2");
        assert!(SearchRequest::from_params(&params).is_ok());
    }

    #[test]
    fn test_cache_key_ignores_control_and_diagnostic_flags() {
        let base = SearchRequest::from_params(&RawParams::new().with("q", "rotterdam")).unwrap();
        let flagged = SearchRequest::from_params(
            &RawParams::new()
                .with("q", "rotterdam")
                .with("noCache", "true")
                .with("cacheRefresh", "true")
                .with("cacheReset", "true")
                .with("explain", "true")
                .with("service", "true"),
        )
        .unwrap();
        assert_eq!(base.cache_key(), flagged.cache_key());

        let other = SearchRequest::from_params(
            &RawParams::new().with("q", "rotterdam").with("rows", "20"),
        )
        .unwrap();
        assert_ne!(base.cache_key(), other.cache_key());
    }

    #[test]
    fn test_cache_key_ignores_parameter_arrival_order() {
        let forward = RawParams::new()
            .with("q", "rotterdam")
            .with("rows", "20")
            .with("qf[]", "ead-rdf_genreform:kaarten");
        let shuffled = RawParams::new()
            .with("qf[]", "ead-rdf_genreform:kaarten")
            .with("rows", "20")
            .with("q", "rotterdam");
        let forward = SearchRequest::from_params(&forward).unwrap();
        let shuffled = SearchRequest::from_params(&shuffled).unwrap();
        assert_eq!(forward.cache_key(), shuffled.cache_key());
    }

    #[test]
    fn test_cache_key_display_is_16_hex_chars() {
        let req = SearchRequest::default();
        let rendered = req.cache_key().to_string();
        assert_eq!(rendered.len(), 16);
        assert!(rendered.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_take_flags_clear_after_read() {
        let params = RawParams::new().with("cacheReset", "true").with("cacheRefresh", "TRUE");
        let mut req = SearchRequest::from_params(&params).unwrap();
        assert!(req.take_cache_reset());
        assert!(!req.take_cache_reset());
        assert!(req.take_cache_refresh());
        assert!(!req.take_cache_refresh());
    }

    #[test]
    fn test_description_search_enabled() {
        let mut req = SearchRequest::default();
        assert!(req.description_search_enabled("ead-rdf_periodDesc"));

        req.filters = vec![QueryFilter::parse("ead-rdf_periodDesc:1600-1700").unwrap()];
        assert!(req.description_search_enabled("ead-rdf_periodDesc"));

        req.filters.push(QueryFilter::parse("tree.hasDigitalObject:true").unwrap());
        assert!(!req.description_search_enabled("ead-rdf_periodDesc"));
    }
}
