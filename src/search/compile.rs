//! Request compilation - validated request to engine body / 请求编译
//!
//! Cluster bodies collapse child levels per archive and carry the counting
//! and facet aggregations. Detail bodies stay inside one archive and return
//! `tree` sources in inventory order. / 集群请求体按馆藏折叠并携带计数与分面聚合，
//! 详情请求体限定单个馆藏并按清册顺序返回 `tree`。

use serde_json::Value;

use crate::config::{AppConfig, IndexConfig};
use crate::error::SearchError;
use crate::index::query::{
    BoolQuery, CardinalityAggregation, CollapseBuilder, FieldSort, FilterAggregation, InnerHit,
    NestedSort, QueryStringQuery, SearchBody, TermQuery, TermsAggregation,
};

use super::facets::FacetBuilder;
use super::request::SearchRequest;
use super::{
    ARCHIVE_TAG, COLLAPSE_INNER_HIT, COUNTS_AGG, DESCRIPTION_TAG, ENTRIES_PATH, ENTRY_LABEL_FIELD,
    INVENTORY_ID_FIELD, SORT_KEY_FIELD, SPEC_COUNT_AGG, SPEC_FIELD, TAGS_FIELD, TREE_FIELD_PREFIX,
    TYPE_COUNT_AGG, UNFILTERED_TYPE_COUNT_AGG,
};

/// Text-search fields and their boosts / 文本搜索字段及权重
const QUERY_FIELDS: &[(&str, Option<f64>)] = &[
    ("tree.title", Some(6.0)),
    ("tree.inventoryID", Some(3.0)),
    ("tree.label", Some(2.0)),
    ("tree.agencyCode", Some(1.5)),
    ("tree.unitID", Some(1.5)),
    ("tree.description", Some(1.0)),
    ("tree.rawContent", None),
];

/// Document-type gate, description documents join only when enabled
/// / 文档类型门，描述文档仅在开启时加入
fn tag_query(include_description: bool) -> BoolQuery {
    let mut tags = BoolQuery::new().should(TermQuery::new(TAGS_FIELD, ARCHIVE_TAG));
    if include_description {
        tags = tags.should(TermQuery::new(TAGS_FIELD, DESCRIPTION_TAG));
    }
    tags
}

/// The user's text query over the weighted field set / 加权字段集上的文本查询
fn text_query(request: &SearchRequest, index: &IndexConfig) -> Option<QueryStringQuery> {
    if request.raw_query.is_empty() {
        return None;
    }
    let mut query = QueryStringQuery::new(request.raw_query.as_str());
    for (field, boost) in QUERY_FIELDS {
        query = match boost {
            Some(boost) => query.field_with_boost(field, *boost),
            None => query.field(*field),
        };
    }
    // 显式操作符的查询按用户写法执行
    if !request.is_advanced_search() {
        query = query.minimum_should_match(index.minimum_should_match.as_str());
    }
    Some(query)
}

/// Sort clause for the requested sort key / 请求排序键对应的排序子句
fn compile_sort(request: &SearchRequest) -> Option<FieldSort> {
    if request.sort_by.is_empty() {
        return None;
    }
    if request.sort_by == "_score" {
        return Some(FieldSort::new("_score").ascending(request.sort_asc));
    }
    // 含下划线的键是条目标签，排序走嵌套条目
    if request.sort_by.contains('_') {
        let field = format!("{}.{}", ENTRIES_PATH, request.nested_sort_field);
        return Some(
            FieldSort::new(field).ascending(request.sort_asc).nested(
                NestedSort::new(ENTRIES_PATH)
                    .filter(TermQuery::new(ENTRY_LABEL_FIELD, request.sort_by.as_str())),
            ),
        );
    }
    Some(FieldSort::new(request.sort_by.as_str()).ascending(request.sort_asc))
}

/// Compile the cluster search body / 编译集群搜索请求体
pub fn build_cluster_body(
    request: &SearchRequest,
    config: &AppConfig,
) -> Result<Value, SearchError> {
    let description_enabled = request.description_search_enabled(&config.search.description_label);

    let mut query = BoolQuery::new().must(tag_query(description_enabled));
    if let Some(text) = text_query(request, &config.index) {
        query = query.must(text);
    }

    let inner_hit = InnerHit::new(COLLAPSE_INNER_HIT)
        .size(config.search.collapse_inner_hits as u64)
        .sort(FieldSort::new(INVENTORY_ID_FIELD).ascending(true));
    let collapse = CollapseBuilder::new(SPEC_FIELD)
        .inner_hit(inner_hit)
        .max_concurrent_group_searches(config.search.collapse_max_concurrent as u32);

    let mut body = SearchBody::new()
        .query(query)
        .size(request.rows)
        .from(request.cursor())
        .fetch_source(false)
        .track_total_hits(config.index.track_total_hits)
        .collapse(collapse)
        .explain(request.explain);

    if let Some(sort) = compile_sort(request) {
        body = body.sort(sort);
    }

    let facets = FacetBuilder::new(request);
    for field in &request.facet_fields {
        body = body.aggregation(
            field.clone(),
            facets.facet_aggregation(field, request.facet_size)?,
        );
    }
    body = body.post_filter(facets.post_filter()?);

    // 计数聚合带过滤与不带过滤各一份
    let counts = FilterAggregation::new(facets.post_filter()?)
        .sub_aggregation(SPEC_COUNT_AGG, CardinalityAggregation::new(SPEC_FIELD))
        .sub_aggregation(TYPE_COUNT_AGG, TermsAggregation::new(TAGS_FIELD));
    body = body.aggregation(COUNTS_AGG, counts);
    body = body.aggregation(UNFILTERED_TYPE_COUNT_AGG, TermsAggregation::new(TAGS_FIELD));

    Ok(body.build())
}

/// Compile the detail search body for one archive / 编译单馆藏详情请求体
pub fn build_detail_body(
    request: &SearchRequest,
    config: &AppConfig,
) -> Result<Value, SearchError> {
    let mut query = BoolQuery::new().must(tag_query(false));
    if let Some(text) = text_query(request, &config.index) {
        query = query.must(text);
    }
    query = query.must(TermQuery::new(SPEC_FIELD, request.inventory_id.as_str()));

    let mut applied = BoolQuery::new();
    for filter in &request.filters {
        // tree 标签在详情里恒为正向约束
        if filter.search_label.starts_with(TREE_FIELD_PREFIX) {
            applied = applied.must(TermQuery::new(
                filter.search_label.as_str(),
                filter.value.as_str(),
            ));
        } else if filter.exclude {
            applied = applied.must_not(filter.to_query()?);
        } else {
            applied = applied.must(filter.to_query()?);
        }
    }
    query = query.must(applied);

    let body = SearchBody::new()
        .query(query)
        .size(request.rows)
        .from(request.cursor())
        .source_includes(&["tree"])
        .sort(FieldSort::new(SORT_KEY_FIELD).ascending(true))
        .track_total_hits(config.index.track_total_hits)
        .explain(request.explain);

    Ok(body.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::request::RawParams;
    use serde_json::json;

    fn compile(params: RawParams) -> Value {
        let request = SearchRequest::from_params(&params).unwrap();
        build_cluster_body(&request, &AppConfig::default()).unwrap()
    }

    #[test]
    fn test_tag_query_includes_descriptions_without_foreign_filters() {
        let body = compile(RawParams::new().with("q", "rotterdam"));
        let shoulds = body.pointer("/query/bool/must/0/bool/should").unwrap();
        assert_eq!(shoulds.as_array().unwrap().len(), 2);
        assert_eq!(shoulds[0].pointer("/term/meta.tags"), Some(&json!("ead")));
        assert_eq!(shoulds[1].pointer("/term/meta.tags"), Some(&json!("eadDesc")));
    }

    #[test]
    fn test_foreign_filter_disables_description_documents() {
        let body = compile(
            RawParams::new()
                .with("q", "rotterdam")
                .with("qf[]", "tree.hasDigitalObject:true"),
        );
        let shoulds = body.pointer("/query/bool/must/0/bool/should").unwrap();
        assert_eq!(shoulds.as_array().unwrap().len(), 1);
        assert_eq!(shoulds[0].pointer("/term/meta.tags"), Some(&json!("ead")));
    }

    #[test]
    fn test_text_query_boosts_and_msm() {
        let body = compile(RawParams::new().with("q", "kaart rotterdam"));
        let text = body.pointer("/query/bool/must/1/query_string").unwrap();
        assert_eq!(
            text.pointer("/fields"),
            Some(&json!([
                "tree.title^6.0",
                "tree.inventoryID^3.0",
                "tree.label^2.0",
                "tree.agencyCode^1.5",
                "tree.unitID^1.5",
                "tree.description^1.0",
                "tree.rawContent"
            ]))
        );
        assert_eq!(text.pointer("/minimum_should_match"), Some(&json!("2<70%")));
    }

    #[test]
    fn test_advanced_query_skips_msm() {
        let body = compile(RawParams::new().with("q", "kaart AND rotterdam"));
        assert!(body
            .pointer("/query/bool/must/1/query_string/minimum_should_match")
            .is_none());
    }

    #[test]
    fn test_empty_query_has_no_text_clause() {
        let body = compile(RawParams::new());
        let musts = body.pointer("/query/bool/must").unwrap().as_array().unwrap();
        assert_eq!(musts.len(), 1);
    }

    #[test]
    fn test_collapse_and_paging() {
        let body = compile(RawParams::new().with("page", "3").with("rows", "10"));
        assert_eq!(body.pointer("/collapse/field"), Some(&json!("meta.spec")));
        assert_eq!(body.pointer("/collapse/inner_hits/name"), Some(&json!("collapse")));
        assert_eq!(body.pointer("/collapse/inner_hits/size"), Some(&json!(1)));
        assert_eq!(
            body.pointer("/collapse/inner_hits/sort/0/tree.inventoryID/order"),
            Some(&json!("asc"))
        );
        assert_eq!(body.pointer("/collapse/max_concurrent_group_searches"), Some(&json!(4)));
        assert_eq!(body.pointer("/size"), Some(&json!(10)));
        assert_eq!(body.pointer("/from"), Some(&json!(20)));
        assert_eq!(body.pointer("/_source"), Some(&json!(false)));
        assert_eq!(body.pointer("/track_total_hits"), Some(&json!(true)));
    }

    #[test]
    fn test_count_aggregations() {
        let body = compile(RawParams::new().with("qf[]", "ead-rdf_genreform:kaarten"));
        assert_eq!(
            body.pointer("/aggs/counts/aggs/specCount/cardinality/field"),
            Some(&json!("meta.spec"))
        );
        assert_eq!(
            body.pointer("/aggs/counts/aggs/typeCount/terms/field"),
            Some(&json!("meta.tags"))
        );
        assert_eq!(
            body.pointer("/aggs/noFiltTypeCount/terms/field"),
            Some(&json!("meta.tags"))
        );
        // counts 桶与 post filter 使用同一份过滤
        assert_eq!(body.pointer("/aggs/counts/filter"), body.pointer("/post_filter"));
    }

    #[test]
    fn test_facet_aggregations_follow_request_fields() {
        let body = compile(
            RawParams::new()
                .with("facet.field", "tree.mimeType")
                .with("facet.size", "15"),
        );
        assert_eq!(
            body.pointer("/aggs/tree.mimeType/aggs/value/terms/size"),
            Some(&json!(15))
        );
    }

    #[test]
    fn test_sort_variants() {
        let none = compile(RawParams::new());
        assert!(none.pointer("/sort").is_none());

        let score = compile(RawParams::new().with("sortBy", "_score"));
        assert_eq!(score.pointer("/sort/0/_score/order"), Some(&json!("desc")));

        let nested = compile(RawParams::new().with("sortBy", "^ead-rdf_date"));
        assert_eq!(
            nested.pointer("/sort/0/resources.entries.@value.keyword/order"),
            Some(&json!("asc"))
        );
        assert_eq!(
            nested.pointer("/sort/0/resources.entries.@value.keyword/nested/filter/term/resources.entries.searchLabel"),
            Some(&json!("ead-rdf_date"))
        );

        let integer = compile(RawParams::new().with("sortBy", "int.ead-rdf_age"));
        assert!(integer
            .pointer("/sort/0/resources.entries.integer/order")
            .is_some());

        let literal = compile(RawParams::new().with("sortBy", "tree.sortKey"));
        assert_eq!(literal.pointer("/sort/0/tree.sortKey/order"), Some(&json!("desc")));
    }

    #[test]
    fn test_detail_body_shape() {
        let params = RawParams::new().with("q", "resoluties").with("rows", "20");
        let mut request = SearchRequest::from_params(&params).unwrap();
        request.inventory_id = "NL-HaNA_1.04.02".to_string();
        let body = build_detail_body(&request, &AppConfig::default()).unwrap();

        let musts = body.pointer("/query/bool/must").unwrap().as_array().unwrap();
        assert_eq!(musts.len(), 4);
        // 仅 ead 标签，详情不含描述文档
        assert_eq!(
            musts[0].pointer("/bool/should").unwrap().as_array().unwrap().len(),
            1
        );
        assert!(musts[1].pointer("/query_string").is_some());
        assert_eq!(musts[2].pointer("/term/meta.spec"), Some(&json!("NL-HaNA_1.04.02")));

        assert_eq!(body.pointer("/_source/includes"), Some(&json!(["tree"])));
        assert_eq!(body.pointer("/sort/0/tree.sortKey/order"), Some(&json!("asc")));
        assert_eq!(body.pointer("/size"), Some(&json!(20)));
        assert!(body.pointer("/collapse").is_none());
        assert!(body.pointer("/aggs").is_none());
    }

    #[test]
    fn test_detail_tree_filters_ignore_negation() {
        let params = RawParams::new()
            .with("qf[]", "-tree.mimeType:image/jpeg")
            .with("qf[]", "-ead-rdf_genreform:kaarten");
        let mut request = SearchRequest::from_params(&params).unwrap();
        request.inventory_id = "NL-HaNA_1.04.02".to_string();
        let body = build_detail_body(&request, &AppConfig::default()).unwrap();

        let applied = body.pointer("/query/bool/must/2/bool").unwrap();
        assert_eq!(
            applied.pointer("/must/0/term/tree.mimeType"),
            Some(&json!("image/jpeg"))
        );
        assert_eq!(
            applied
                .pointer("/must_not/0/nested/query/bool/must/0/term/resources.entries.searchLabel"),
            Some(&json!("ead-rdf_genreform"))
        );
    }

    #[test]
    fn test_explain_flag_reaches_body() {
        let body = compile(RawParams::new().with("explain", "true"));
        assert_eq!(body.pointer("/explain"), Some(&json!(true)));
    }
}
