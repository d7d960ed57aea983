//! Facets - aggregation building, result decoding, toggle links / 分面
//!
//! Facet values are counted on the result set with the *other* facets'
//! filters applied, so a facet never narrows itself. Combination is OR by
//! default, `FacetBoolType=and` switches to AND, negated filters always go
//! to must_not. / 分面计数排除自身过滤器，默认 OR 组合，取反过滤器恒走 must_not。

use crate::error::SearchError;
use crate::index::query::{
    BoolQuery, FilterAggregation, NestedAggregation, TermQuery, TermsAggregation,
};
use crate::index::{SearchResult, SingleBucketAggregate, TermsAggregate};

use super::filters::QueryFilter;
use super::request::SearchRequest;
use super::response::{Facet, FacetLink};
use super::{ENTRIES_PATH, ENTRY_LABEL_FIELD, ENTRY_VALUE_FIELD, TREE_FIELD_PREFIX};

/// Builds the post filter and per-facet aggregations of one request
/// / 构建单个请求的 post filter 与各分面聚合
pub struct FacetBuilder<'a> {
    filters: &'a [QueryFilter],
    and_combined: bool,
}

impl<'a> FacetBuilder<'a> {
    pub fn new(request: &'a SearchRequest) -> Self {
        Self {
            filters: &request.filters,
            and_combined: request.facet_and_bool_type,
        }
    }

    /// Combine the filters, skipping those on `excluded_label` / 组合过滤器并跳过指定标签
    fn combine(&self, excluded_label: Option<&str>) -> Result<BoolQuery, SearchError> {
        let mut combined = BoolQuery::new();
        for filter in self.filters {
            if let Some(label) = excluded_label {
                if filter.search_label == label {
                    continue;
                }
            }
            let clause = filter.to_query()?;
            if filter.exclude {
                combined = combined.must_not(clause);
            } else if self.and_combined {
                combined = combined.must(clause);
            } else {
                combined = combined.should(clause);
            }
        }
        if combined.has_should() {
            combined = combined.minimum_should_match("1");
        }
        Ok(combined)
    }

    /// Post filter over all active filters / 全部过滤器的 post filter
    pub fn post_filter(&self) -> Result<BoolQuery, SearchError> {
        self.combine(None)
    }

    /// Aggregation for one facet field, scoped to the other facets' filters
    /// / 单个分面字段的聚合，作用域为其他分面的过滤器
    pub fn facet_aggregation(
        &self,
        field: &str,
        size: usize,
    ) -> Result<FilterAggregation, SearchError> {
        if field.is_empty() {
            return Err(SearchError::facet_compile(field, "empty facet field"));
        }
        let siblings = self.combine(Some(field))?;

        if field.starts_with(TREE_FIELD_PREFIX) {
            return Ok(FilterAggregation::new(siblings)
                .sub_aggregation("value", TermsAggregation::new(field).size(size)));
        }

        let label_bucket = FilterAggregation::new(TermQuery::new(ENTRY_LABEL_FIELD, field))
            .sub_aggregation("value", TermsAggregation::new(ENTRY_VALUE_FIELD).size(size));
        let entries = NestedAggregation::new(ENTRIES_PATH).sub_aggregation("label", label_bucket);
        Ok(FilterAggregation::new(siblings).sub_aggregation("entries", entries))
    }
}

/// Display name of a facet field, its trailing path segment / 分面字段的末段显示名
fn facet_name(field: &str) -> String {
    field.rsplit('.').next().unwrap_or(field).to_string()
}

/// Query string that toggles `value` on `field`, keeping the rest of the
/// request / 切换指定分面取值的查询串，保留请求其余部分
fn facet_link(request: &SearchRequest, field: &str, value: &str, selected: bool) -> String {
    let mut parts: Vec<String> = Vec::new();
    if !request.raw_query.is_empty() {
        parts.push(format!("q={}", urlencoding::encode(&request.raw_query)));
    }
    for filter in &request.filters {
        // 选中态链接用于取消该过滤器
        if selected && !filter.exclude && filter.search_label == field && filter.value == value {
            continue;
        }
        parts.push(format!(
            "{}={}",
            urlencoding::encode(filter.param_name()),
            urlencoding::encode(&filter.to_string())
        ));
    }
    if !selected {
        parts.push(format!(
            "{}={}",
            urlencoding::encode("qf[]"),
            urlencoding::encode(&format!("{}:{}", field, value))
        ));
    }
    parts.join("&")
}

/// Decode the per-facet aggregations of an engine response / 解码响应中的分面聚合
pub fn decode_facets(
    result: &SearchResult,
    request: &SearchRequest,
) -> Result<Vec<Facet>, SearchError> {
    let mut facets = Vec::with_capacity(request.facet_fields.len());
    for field in &request.facet_fields {
        let outer: SingleBucketAggregate = result.decode_aggregation(field)?;

        let (total, values) = if field.starts_with(TREE_FIELD_PREFIX) {
            let values: TermsAggregate = outer.decode_sub("value")?;
            (outer.doc_count, values)
        } else {
            let entries: SingleBucketAggregate = outer.decode_sub("entries")?;
            let label: SingleBucketAggregate = entries.decode_sub("label")?;
            let values: TermsAggregate = label.decode_sub("value")?;
            (label.doc_count, values)
        };

        let links = values
            .buckets
            .iter()
            .map(|bucket| {
                let value = bucket.key_string();
                let is_selected = request
                    .filters
                    .iter()
                    .any(|f| !f.exclude && f.search_label == *field && f.value == value);
                FacetLink {
                    url: facet_link(request, field, &value, is_selected),
                    is_selected,
                    display_string: format!("{} ({})", value, bucket.doc_count),
                    count: bucket.doc_count,
                    value,
                }
            })
            .collect();

        facets.push(Facet {
            name: facet_name(field),
            field: field.clone(),
            total,
            other_docs: values.sum_other_doc_count,
            links,
        });
    }
    Ok(facets)
}
