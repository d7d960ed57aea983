//! Query DSL builders - typed request bodies for the search engine / 查询 DSL 构建器
//!
//! Every builder renders itself to JSON through `source()`, the full request
//! is assembled by [`SearchBody`]: / 所有构建器通过 `source()` 渲染为 JSON:
//! - query clauses: term / range / query_string / nested / bool
//! - sorting: field sort, optionally scoped to a nested path / 排序
//! - collapse: field collapsing with inner hits / 字段折叠
//! - aggregations: terms / cardinality / filter / nested / 聚合

use serde_json::{json, Map, Value};

/// A query clause that renders itself as engine JSON / 可渲染为引擎 JSON 的查询子句
pub trait Query {
    fn source(&self) -> Value;
}

impl Query for Box<dyn Query> {
    fn source(&self) -> Value {
        self.as_ref().source()
    }
}

/// Exact term match on a single field / 单字段精确匹配
pub struct TermQuery {
    field: String,
    value: Value,
}

impl TermQuery {
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

impl Query for TermQuery {
    fn source(&self) -> Value {
        json!({ "term": { &self.field: self.value.clone() } })
    }
}

/// Range match with optional bounds / 可选上下界的范围匹配
pub struct RangeQuery {
    field: String,
    gte: Option<Value>,
    lte: Option<Value>,
}

impl RangeQuery {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            gte: None,
            lte: None,
        }
    }

    pub fn gte(mut self, value: impl Into<Value>) -> Self {
        self.gte = Some(value.into());
        self
    }

    pub fn lte(mut self, value: impl Into<Value>) -> Self {
        self.lte = Some(value.into());
        self
    }
}

impl Query for RangeQuery {
    fn source(&self) -> Value {
        let mut bounds = Map::new();
        if let Some(gte) = &self.gte {
            bounds.insert("gte".to_string(), gte.clone());
        }
        if let Some(lte) = &self.lte {
            bounds.insert("lte".to_string(), lte.clone());
        }
        json!({ "range": { &self.field: bounds } })
    }
}

/// Lucene query string over weighted fields / 加权字段上的查询字符串
///
/// Fields carry their boost inline (`tree.title^6.0`), unboosted fields are
/// emitted bare. / 字段内联权重，无权重字段原样输出。
pub struct QueryStringQuery {
    query: String,
    fields: Vec<String>,
    minimum_should_match: Option<String>,
}

impl QueryStringQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            fields: Vec::new(),
            minimum_should_match: None,
        }
    }

    /// Add a search field without boost / 添加无权重字段
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(name.into());
        self
    }

    /// Add a search field with boost / 添加带权重字段
    pub fn field_with_boost(mut self, name: &str, boost: f64) -> Self {
        self.fields.push(format!("{}^{:?}", name, boost));
        self
    }

    pub fn minimum_should_match(mut self, msm: impl Into<String>) -> Self {
        self.minimum_should_match = Some(msm.into());
        self
    }
}

impl Query for QueryStringQuery {
    fn source(&self) -> Value {
        let mut body = Map::new();
        body.insert("query".to_string(), Value::String(self.query.clone()));
        if !self.fields.is_empty() {
            body.insert("fields".to_string(), json!(self.fields));
        }
        if let Some(msm) = &self.minimum_should_match {
            body.insert("minimum_should_match".to_string(), Value::String(msm.clone()));
        }
        json!({ "query_string": body })
    }
}

/// Query scoped to a nested document path / 嵌套文档路径上的查询
pub struct NestedQuery {
    path: String,
    query: Box<dyn Query>,
}

impl NestedQuery {
    pub fn new(path: impl Into<String>, query: impl Query + 'static) -> Self {
        Self {
            path: path.into(),
            query: Box::new(query),
        }
    }
}

impl Query for NestedQuery {
    fn source(&self) -> Value {
        json!({
            "nested": {
                "path": &self.path,
                "query": self.query.source(),
            }
        })
    }
}

/// Boolean combination of clauses / 布尔组合查询
///
/// Empty clause lists are omitted from the output, an entirely empty bool
/// renders as `{"bool":{}}` (match-all). / 空子句列表不输出。
#[derive(Default)]
pub struct BoolQuery {
    must: Vec<Box<dyn Query>>,
    should: Vec<Box<dyn Query>>,
    must_not: Vec<Box<dyn Query>>,
    filter: Vec<Box<dyn Query>>,
    minimum_should_match: Option<String>,
}

impl BoolQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn must(mut self, query: impl Query + 'static) -> Self {
        self.must.push(Box::new(query));
        self
    }

    pub fn should(mut self, query: impl Query + 'static) -> Self {
        self.should.push(Box::new(query));
        self
    }

    pub fn must_not(mut self, query: impl Query + 'static) -> Self {
        self.must_not.push(Box::new(query));
        self
    }

    pub fn filter(mut self, query: impl Query + 'static) -> Self {
        self.filter.push(Box::new(query));
        self
    }

    pub fn minimum_should_match(mut self, msm: impl Into<String>) -> Self {
        self.minimum_should_match = Some(msm.into());
        self
    }

    pub fn has_should(&self) -> bool {
        !self.should.is_empty()
    }
}

fn clause_sources(clauses: &[Box<dyn Query>]) -> Value {
    Value::Array(clauses.iter().map(|q| q.source()).collect())
}

impl Query for BoolQuery {
    fn source(&self) -> Value {
        let mut body = Map::new();
        if !self.must.is_empty() {
            body.insert("must".to_string(), clause_sources(&self.must));
        }
        if !self.should.is_empty() {
            body.insert("should".to_string(), clause_sources(&self.should));
        }
        if !self.must_not.is_empty() {
            body.insert("must_not".to_string(), clause_sources(&self.must_not));
        }
        if !self.filter.is_empty() {
            body.insert("filter".to_string(), clause_sources(&self.filter));
        }
        if let Some(msm) = &self.minimum_should_match {
            body.insert("minimum_should_match".to_string(), Value::String(msm.clone()));
        }
        json!({ "bool": body })
    }
}

/// Sort on one field, optionally inside a nested path / 单字段排序
pub struct FieldSort {
    field: String,
    ascending: bool,
    nested: Option<NestedSort>,
}

impl FieldSort {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ascending: true,
            nested: None,
        }
    }

    pub fn ascending(mut self, ascending: bool) -> Self {
        self.ascending = ascending;
        self
    }

    pub fn nested(mut self, nested: NestedSort) -> Self {
        self.nested = Some(nested);
        self
    }

    pub fn source(&self) -> Value {
        let mut body = Map::new();
        let order = if self.ascending { "asc" } else { "desc" };
        body.insert("order".to_string(), Value::String(order.to_string()));
        if let Some(nested) = &self.nested {
            body.insert("nested".to_string(), nested.source());
        }
        json!({ &self.field: body })
    }
}

/// Nested scope for a [`FieldSort`] / 排序的嵌套作用域
pub struct NestedSort {
    path: String,
    filter: Option<Box<dyn Query>>,
}

impl NestedSort {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            filter: None,
        }
    }

    pub fn filter(mut self, query: impl Query + 'static) -> Self {
        self.filter = Some(Box::new(query));
        self
    }

    fn source(&self) -> Value {
        let mut body = Map::new();
        body.insert("path".to_string(), Value::String(self.path.clone()));
        if let Some(filter) = &self.filter {
            body.insert("filter".to_string(), filter.source());
        }
        Value::Object(body)
    }
}

/// Field collapsing with a single inner-hit window / 字段折叠
pub struct CollapseBuilder {
    field: String,
    inner_hit: Option<InnerHit>,
    max_concurrent_group_searches: Option<u32>,
}

impl CollapseBuilder {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            inner_hit: None,
            max_concurrent_group_searches: None,
        }
    }

    pub fn inner_hit(mut self, inner_hit: InnerHit) -> Self {
        self.inner_hit = Some(inner_hit);
        self
    }

    pub fn max_concurrent_group_searches(mut self, max: u32) -> Self {
        self.max_concurrent_group_searches = Some(max);
        self
    }

    pub fn source(&self) -> Value {
        let mut body = Map::new();
        body.insert("field".to_string(), Value::String(self.field.clone()));
        if let Some(inner_hit) = &self.inner_hit {
            body.insert("inner_hits".to_string(), inner_hit.source());
        }
        if let Some(max) = self.max_concurrent_group_searches {
            body.insert("max_concurrent_group_searches".to_string(), json!(max));
        }
        Value::Object(body)
    }
}

/// Named inner-hit request inside a collapse / 折叠内的命名 inner hits
pub struct InnerHit {
    name: String,
    size: Option<u64>,
    sorts: Vec<FieldSort>,
}

impl InnerHit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: None,
            sorts: Vec::new(),
        }
    }

    pub fn size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn sort(mut self, sort: FieldSort) -> Self {
        self.sorts.push(sort);
        self
    }

    fn source(&self) -> Value {
        let mut body = Map::new();
        body.insert("name".to_string(), Value::String(self.name.clone()));
        if let Some(size) = self.size {
            body.insert("size".to_string(), json!(size));
        }
        if !self.sorts.is_empty() {
            let sorts: Vec<Value> = self.sorts.iter().map(|s| s.source()).collect();
            body.insert("sort".to_string(), Value::Array(sorts));
        }
        Value::Object(body)
    }
}

/// An aggregation that renders itself as engine JSON / 可渲染为引擎 JSON 的聚合
pub trait Aggregation {
    fn source(&self) -> Value;
}

impl Aggregation for Box<dyn Aggregation> {
    fn source(&self) -> Value {
        self.as_ref().source()
    }
}

fn sub_sources(subs: &[(String, Box<dyn Aggregation>)]) -> Value {
    let mut aggs = Map::new();
    for (name, agg) in subs {
        aggs.insert(name.clone(), agg.source());
    }
    Value::Object(aggs)
}

/// Bucket per distinct field value / 按字段值分桶
pub struct TermsAggregation {
    field: String,
    size: Option<usize>,
    subs: Vec<(String, Box<dyn Aggregation>)>,
}

impl TermsAggregation {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            size: None,
            subs: Vec::new(),
        }
    }

    pub fn size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    pub fn sub_aggregation(mut self, name: impl Into<String>, agg: impl Aggregation + 'static) -> Self {
        self.subs.push((name.into(), Box::new(agg)));
        self
    }
}

impl Aggregation for TermsAggregation {
    fn source(&self) -> Value {
        let mut terms = Map::new();
        terms.insert("field".to_string(), Value::String(self.field.clone()));
        if let Some(size) = self.size {
            terms.insert("size".to_string(), json!(size));
        }
        let mut body = Map::new();
        body.insert("terms".to_string(), Value::Object(terms));
        if !self.subs.is_empty() {
            body.insert("aggs".to_string(), sub_sources(&self.subs));
        }
        Value::Object(body)
    }
}

/// Approximate distinct count of a field / 字段近似去重计数
pub struct CardinalityAggregation {
    field: String,
}

impl CardinalityAggregation {
    pub fn new(field: impl Into<String>) -> Self {
        Self { field: field.into() }
    }
}

impl Aggregation for CardinalityAggregation {
    fn source(&self) -> Value {
        json!({ "cardinality": { "field": &self.field } })
    }
}

/// Single filtered bucket with sub-aggregations / 单过滤桶
pub struct FilterAggregation {
    filter: Box<dyn Query>,
    subs: Vec<(String, Box<dyn Aggregation>)>,
}

impl FilterAggregation {
    pub fn new(filter: impl Query + 'static) -> Self {
        Self {
            filter: Box::new(filter),
            subs: Vec::new(),
        }
    }

    pub fn sub_aggregation(mut self, name: impl Into<String>, agg: impl Aggregation + 'static) -> Self {
        self.subs.push((name.into(), Box::new(agg)));
        self
    }
}

impl Aggregation for FilterAggregation {
    fn source(&self) -> Value {
        let mut body = Map::new();
        body.insert("filter".to_string(), self.filter.source());
        if !self.subs.is_empty() {
            body.insert("aggs".to_string(), sub_sources(&self.subs));
        }
        Value::Object(body)
    }
}

/// Aggregation scoped to a nested document path / 嵌套路径上的聚合
pub struct NestedAggregation {
    path: String,
    subs: Vec<(String, Box<dyn Aggregation>)>,
}

impl NestedAggregation {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            subs: Vec::new(),
        }
    }

    pub fn sub_aggregation(mut self, name: impl Into<String>, agg: impl Aggregation + 'static) -> Self {
        self.subs.push((name.into(), Box::new(agg)));
        self
    }
}

impl Aggregation for NestedAggregation {
    fn source(&self) -> Value {
        let mut body = Map::new();
        body.insert("nested".to_string(), json!({ "path": &self.path }));
        if !self.subs.is_empty() {
            body.insert("aggs".to_string(), sub_sources(&self.subs));
        }
        Value::Object(body)
    }
}

/// Full search request body / 完整搜索请求体
#[derive(Default)]
pub struct SearchBody {
    query: Option<Box<dyn Query>>,
    post_filter: Option<Box<dyn Query>>,
    aggs: Vec<(String, Box<dyn Aggregation>)>,
    size: Option<usize>,
    from: Option<usize>,
    sorts: Vec<FieldSort>,
    collapse: Option<CollapseBuilder>,
    fetch_source: Option<bool>,
    source_includes: Vec<String>,
    track_total_hits: Option<bool>,
    explain: bool,
}

impl SearchBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, query: impl Query + 'static) -> Self {
        self.query = Some(Box::new(query));
        self
    }

    pub fn post_filter(mut self, query: impl Query + 'static) -> Self {
        self.post_filter = Some(Box::new(query));
        self
    }

    pub fn aggregation(mut self, name: impl Into<String>, agg: impl Aggregation + 'static) -> Self {
        self.aggs.push((name.into(), Box::new(agg)));
        self
    }

    pub fn size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    pub fn from(mut self, from: usize) -> Self {
        self.from = Some(from);
        self
    }

    pub fn sort(mut self, sort: FieldSort) -> Self {
        self.sorts.push(sort);
        self
    }

    pub fn collapse(mut self, collapse: CollapseBuilder) -> Self {
        self.collapse = Some(collapse);
        self
    }

    /// Toggle `_source` wholesale, overridden by `source_includes` / 整体开关 `_source`
    pub fn fetch_source(mut self, fetch: bool) -> Self {
        self.fetch_source = Some(fetch);
        self
    }

    /// Restrict `_source` to the given top-level fields / 限定返回字段
    pub fn source_includes(mut self, fields: &[&str]) -> Self {
        self.source_includes = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn track_total_hits(mut self, track: bool) -> Self {
        self.track_total_hits = Some(track);
        self
    }

    pub fn explain(mut self, explain: bool) -> Self {
        self.explain = explain;
        self
    }

    /// Render the request body / 渲染请求体
    pub fn build(&self) -> Value {
        let mut body = Map::new();
        if let Some(query) = &self.query {
            body.insert("query".to_string(), query.source());
        }
        if let Some(size) = self.size {
            body.insert("size".to_string(), json!(size));
        }
        // from=0 与不分页等价，省略以保持请求体紧凑
        if let Some(from) = self.from {
            if from > 0 {
                body.insert("from".to_string(), json!(from));
            }
        }
        if !self.sorts.is_empty() {
            let sorts: Vec<Value> = self.sorts.iter().map(|s| s.source()).collect();
            body.insert("sort".to_string(), Value::Array(sorts));
        }
        if let Some(collapse) = &self.collapse {
            body.insert("collapse".to_string(), collapse.source());
        }
        if !self.source_includes.is_empty() {
            body.insert("_source".to_string(), json!({ "includes": self.source_includes }));
        } else if let Some(fetch) = self.fetch_source {
            body.insert("_source".to_string(), Value::Bool(fetch));
        }
        if let Some(post_filter) = &self.post_filter {
            body.insert("post_filter".to_string(), post_filter.source());
        }
        if !self.aggs.is_empty() {
            let mut aggs = Map::new();
            for (name, agg) in &self.aggs {
                aggs.insert(name.clone(), agg.source());
            }
            body.insert("aggs".to_string(), Value::Object(aggs));
        }
        if let Some(track) = self.track_total_hits {
            body.insert("track_total_hits".to_string(), Value::Bool(track));
        }
        if self.explain {
            body.insert("explain".to_string(), Value::Bool(true));
        }
        Value::Object(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_term_query_shape() {
        let q = TermQuery::new("meta.tags", "ead");
        assert_eq!(q.source(), json!({ "term": { "meta.tags": "ead" } }));
    }

    #[test]
    fn test_range_query_emits_only_set_bounds() {
        let q = RangeQuery::new("resources.entries.dateRange").gte("1600");
        let body = q.source();
        assert_eq!(
            body.pointer("/range/resources.entries.dateRange/gte"),
            Some(&json!("1600"))
        );
        assert!(body
            .pointer("/range/resources.entries.dateRange/lte")
            .is_none());
    }

    #[test]
    fn test_query_string_boost_formatting() {
        let q = QueryStringQuery::new("rotterdam")
            .field_with_boost("tree.title", 6.0)
            .field_with_boost("tree.unitID", 1.5)
            .field("tree.rawContent")
            .minimum_should_match("2<70%");
        let body = q.source();
        assert_eq!(
            body.pointer("/query_string/fields"),
            Some(&json!(["tree.title^6.0", "tree.unitID^1.5", "tree.rawContent"]))
        );
        assert_eq!(
            body.pointer("/query_string/minimum_should_match"),
            Some(&json!("2<70%"))
        );
    }

    #[test]
    fn test_bool_query_omits_empty_clause_lists() {
        let empty = BoolQuery::new();
        assert_eq!(empty.source(), json!({ "bool": {} }));

        let q = BoolQuery::new()
            .must(TermQuery::new("meta.tags", "ead"))
            .must_not(TermQuery::new("tree.mimeType", "image/jpeg"));
        let body = q.source();
        assert_eq!(
            body.pointer("/bool/must"),
            Some(&json!([{ "term": { "meta.tags": "ead" } }]))
        );
        assert!(body.pointer("/bool/should").is_none());
        assert_eq!(
            body.pointer("/bool/must_not"),
            Some(&json!([{ "term": { "tree.mimeType": "image/jpeg" } }]))
        );
    }

    #[test]
    fn test_nested_sort_shape() {
        let sort = FieldSort::new("resources.entries.@value.keyword")
            .ascending(true)
            .nested(
                NestedSort::new("resources.entries")
                    .filter(TermQuery::new("resources.entries.searchLabel", "ead-rdf_date")),
            );
        let body = sort.source();
        assert_eq!(
            body.pointer("/resources.entries.@value.keyword/order"),
            Some(&json!("asc"))
        );
        assert_eq!(
            body.pointer("/resources.entries.@value.keyword/nested/path"),
            Some(&json!("resources.entries"))
        );
        assert_eq!(
            body.pointer("/resources.entries.@value.keyword/nested/filter/term/resources.entries.searchLabel"),
            Some(&json!("ead-rdf_date"))
        );
    }

    #[test]
    fn test_collapse_shape() {
        let collapse = CollapseBuilder::new("meta.spec")
            .inner_hit(
                InnerHit::new("collapse")
                    .size(1)
                    .sort(FieldSort::new("tree.inventoryID").ascending(true)),
            )
            .max_concurrent_group_searches(4);
        let body = collapse.source();
        assert_eq!(body.pointer("/field"), Some(&json!("meta.spec")));
        assert_eq!(body.pointer("/inner_hits/name"), Some(&json!("collapse")));
        assert_eq!(body.pointer("/inner_hits/size"), Some(&json!(1)));
        assert_eq!(
            body.pointer("/inner_hits/sort/0/tree.inventoryID/order"),
            Some(&json!("asc"))
        );
        assert_eq!(body.pointer("/max_concurrent_group_searches"), Some(&json!(4)));
    }

    #[test]
    fn test_nested_aggregation_with_subs() {
        let agg = NestedAggregation::new("resources.entries").sub_aggregation(
            "label",
            FilterAggregation::new(TermQuery::new("resources.entries.searchLabel", "ead-rdf_genreform"))
                .sub_aggregation("value", TermsAggregation::new("resources.entries.@value.keyword").size(50)),
        );
        let body = agg.source();
        assert_eq!(body.pointer("/nested/path"), Some(&json!("resources.entries")));
        assert_eq!(
            body.pointer("/aggs/label/filter/term/resources.entries.searchLabel"),
            Some(&json!("ead-rdf_genreform"))
        );
        assert_eq!(
            body.pointer("/aggs/label/aggs/value/terms/size"),
            Some(&json!(50))
        );
    }

    #[test]
    fn test_search_body_keys() {
        let body = SearchBody::new()
            .query(TermQuery::new("meta.tags", "ead"))
            .size(10)
            .from(0)
            .collapse(CollapseBuilder::new("meta.spec"))
            .post_filter(BoolQuery::new())
            .aggregation("specCount", CardinalityAggregation::new("meta.spec"))
            .fetch_source(false)
            .track_total_hits(true)
            .build();
        let obj = body.as_object().unwrap();
        assert!(obj.contains_key("query"));
        assert!(obj.contains_key("size"));
        assert!(!obj.contains_key("from"));
        assert!(obj.contains_key("collapse"));
        assert!(obj.contains_key("post_filter"));
        assert_eq!(
            body.pointer("/aggs/specCount/cardinality/field"),
            Some(&json!("meta.spec"))
        );
        assert_eq!(body.pointer("/_source"), Some(&json!(false)));
        assert_eq!(body.pointer("/track_total_hits"), Some(&json!(true)));

        let paged = SearchBody::new().from(20).build();
        assert_eq!(paged.pointer("/from"), Some(&json!(20)));
    }

    #[test]
    fn test_source_includes_overrides_fetch_source() {
        let body = SearchBody::new()
            .fetch_source(false)
            .source_includes(&["tree"])
            .build();
        assert_eq!(body.pointer("/_source/includes"), Some(&json!(["tree"])));
    }

    #[test]
    fn test_body_explain_flag() {
        let body = SearchBody::new().explain(true).build();
        assert_eq!(body.pointer("/explain"), Some(&json!(true)));
        let plain = SearchBody::new().build();
        assert!(plain.pointer("/explain").is_none());
    }
}
