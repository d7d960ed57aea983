//! Query filters - the `[-]label:value` grammar / 查询过滤器
//!
//! Filters arrive as `qf`/`qf[]` (term) and `qf.dateRange`/`qf.dateRange[]`
//! (range) parameters. A leading `-` negates. Labels with a `tree.` prefix
//! address the document root, everything else addresses the nested entry
//! list. / 前缀 `-` 表示排除，`tree.` 标签指向文档根，其余指向嵌套条目。

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SearchError;
use crate::index::query::{BoolQuery, NestedQuery, Query, RangeQuery, TermQuery};

use super::{ENTRIES_PATH, ENTRY_DATE_FIELD, ENTRY_LABEL_FIELD, ENTRY_VALUE_FIELD, TREE_FIELD_PREFIX};

/// How a filter value is matched / 过滤值的匹配方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterKind {
    Term,
    DateRange,
}

/// One parsed filter / 单个解析后的过滤器
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryFilter {
    pub search_label: String,
    pub value: String,
    #[serde(default)]
    pub exclude: bool,
    pub kind: FilterKind,
}

impl QueryFilter {
    /// Parse a term filter / 解析词项过滤器
    pub fn parse(raw: &str) -> Result<Self, SearchError> {
        Self::parse_kind(raw, FilterKind::Term)
    }

    /// Parse a date-range filter, the value must carry a `~` separator with at
    /// least one bound / 解析日期范围过滤器，值必须带 `~` 且至少一个边界
    pub fn parse_date_range(raw: &str) -> Result<Self, SearchError> {
        let filter = Self::parse_kind(raw, FilterKind::DateRange)?;
        match filter.value.split_once('~') {
            Some((min, max)) if !min.trim().is_empty() || !max.trim().is_empty() => Ok(filter),
            _ => Err(SearchError::filter_parse(raw)),
        }
    }

    fn parse_kind(raw: &str, kind: FilterKind) -> Result<Self, SearchError> {
        let (exclude, rest) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let (label, value) = rest
            .split_once(':')
            .ok_or_else(|| SearchError::filter_parse(raw))?;
        let label = label.trim();
        let value = value.trim();
        if label.is_empty() || value.is_empty() {
            return Err(SearchError::filter_parse(raw));
        }
        Ok(Self {
            search_label: label.to_string(),
            value: value.to_string(),
            exclude,
            kind,
        })
    }

    pub fn is_date_range(&self) -> bool {
        self.kind == FilterKind::DateRange
    }

    /// Query parameter this filter travels in / 该过滤器所属的查询参数
    pub fn param_name(&self) -> &'static str {
        match self.kind {
            FilterKind::Term => "qf[]",
            FilterKind::DateRange => "qf.dateRange[]",
        }
    }

    /// Range bounds, empty sides stay open / 范围边界，空侧保持开放
    pub fn date_bounds(&self) -> Result<(Option<&str>, Option<&str>), SearchError> {
        let (min, max) = self.value.split_once('~').ok_or_else(|| {
            SearchError::filter_compile(&self.search_label, "date range value has no '~' separator")
        })?;
        let min = min.trim();
        let max = max.trim();
        let lower = if min.is_empty() { None } else { Some(min) };
        let upper = if max.is_empty() { None } else { Some(max) };
        Ok((lower, upper))
    }

    /// Compile to an engine clause, negation is applied by the caller / 编译为引擎子句
    pub fn to_query(&self) -> Result<Box<dyn Query>, SearchError> {
        if self.search_label.starts_with(TREE_FIELD_PREFIX) {
            return match self.kind {
                FilterKind::Term => Ok(Box::new(TermQuery::new(
                    self.search_label.as_str(),
                    self.value.as_str(),
                ))),
                FilterKind::DateRange => {
                    let (lower, upper) = self.date_bounds()?;
                    let mut range = RangeQuery::new(self.search_label.as_str());
                    if let Some(lower) = lower {
                        range = range.gte(lower);
                    }
                    if let Some(upper) = upper {
                        range = range.lte(upper);
                    }
                    Ok(Box::new(range))
                }
            };
        }

        // 非 tree 标签走嵌套条目列表
        let value_clause: Box<dyn Query> = match self.kind {
            FilterKind::Term => Box::new(TermQuery::new(ENTRY_VALUE_FIELD, self.value.as_str())),
            FilterKind::DateRange => {
                let (lower, upper) = self.date_bounds()?;
                let mut range = RangeQuery::new(ENTRY_DATE_FIELD);
                if let Some(lower) = lower {
                    range = range.gte(lower);
                }
                if let Some(upper) = upper {
                    range = range.lte(upper);
                }
                Box::new(range)
            }
        };

        let inner = BoolQuery::new()
            .must(TermQuery::new(ENTRY_LABEL_FIELD, self.search_label.as_str()))
            .must(value_clause);
        Ok(Box::new(NestedQuery::new(ENTRIES_PATH, inner)))
    }
}

impl fmt::Display for QueryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = if self.exclude { "-" } else { "" };
        write!(f, "{}{}:{}", prefix, self.search_label, self.value)
    }
}
