//! Engine response decoding / 引擎响应解码
//!
//! Mirrors the wire shape of an engine search response closely enough for the
//! assemblers: hits with stored fields, collapse inner hits, and the
//! aggregation trees this crate requests. / 按装配所需镜像引擎响应的线格式。

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::SearchError;

/// Top-level engine search response / 引擎搜索响应
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub took: i64,
    #[serde(default)]
    pub timed_out: bool,
    #[serde(default)]
    pub hits: SearchHits,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregations: Option<Map<String, Value>>,
}

impl SearchResult {
    /// Total matching documents, zero when the engine omitted the count / 匹配总数
    pub fn total_hits(&self) -> u64 {
        self.hits.total.as_ref().map(|t| t.value).unwrap_or(0)
    }

    pub fn aggregation(&self, name: &str) -> Option<&Value> {
        self.aggregations.as_ref()?.get(name)
    }

    /// Decode one named aggregation, absence is an error / 解码命名聚合，缺失视为错误
    pub fn decode_aggregation<T: DeserializeOwned>(&self, name: &str) -> Result<T, SearchError> {
        let raw = self.aggregation(name).ok_or_else(|| {
            SearchError::aggregation_decode(name, "aggregation missing from engine response")
        })?;
        serde_json::from_value(raw.clone())
            .map_err(|e| SearchError::aggregation_decode(name, e.to_string()))
    }
}

/// Hit window with total / 命中窗口
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchHits {
    #[serde(default)]
    pub total: Option<TotalHits>,
    #[serde(default)]
    pub max_score: Option<f64>,
    #[serde(default)]
    pub hits: Vec<SearchHit>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TotalHits {
    #[serde(default)]
    pub value: u64,
    #[serde(default)]
    pub relation: String,
}

/// One hit, source optional because cluster search disables it / 单条命中
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "_index", default)]
    pub index: String,
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,
    #[serde(rename = "_source", default)]
    pub source: Option<Value>,
    #[serde(default)]
    pub fields: Map<String, Value>,
    #[serde(default)]
    pub inner_hits: HashMap<String, InnerHitsResult>,
    #[serde(default)]
    pub sort: Vec<Value>,
}

impl SearchHit {
    /// First string value of a stored field / 存储字段的首个字符串值
    pub fn field_string(&self, name: &str) -> Option<&str> {
        let value = self.fields.get(name)?;
        match value {
            Value::Array(items) => items.first()?.as_str(),
            other => other.as_str(),
        }
    }

    pub fn inner_hit(&self, name: &str) -> Option<&SearchHits> {
        self.inner_hits.get(name).map(|r| &r.hits)
    }

    /// Decode `_source` into a typed document / 将 `_source` 解码为类型化文档
    pub fn decode_source<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        match &self.source {
            Some(raw) => serde_json::from_value(raw.clone()).map(Some),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InnerHitsResult {
    #[serde(default)]
    pub hits: SearchHits,
}

/// `terms` aggregation payload / `terms` 聚合载荷
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TermsAggregate {
    #[serde(default)]
    pub doc_count_error_upper_bound: i64,
    #[serde(default)]
    pub sum_other_doc_count: u64,
    #[serde(default)]
    pub buckets: Vec<TermsBucket>,
}

impl TermsAggregate {
    /// Document count of the bucket with the given key, zero when absent / 指定桶的文档数
    pub fn bucket_count(&self, key: &str) -> u64 {
        self.buckets
            .iter()
            .find(|b| b.key_string() == key)
            .map(|b| b.doc_count)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TermsBucket {
    #[serde(default)]
    pub key: Value,
    #[serde(default)]
    pub key_as_string: Option<String>,
    #[serde(default)]
    pub doc_count: u64,
}

impl TermsBucket {
    /// Bucket key as text, boolean and numeric keys come back through
    /// `key_as_string` / 桶键文本形式，布尔和数值键走 `key_as_string`
    pub fn key_string(&self) -> String {
        if let Some(s) = &self.key_as_string {
            return s.clone();
        }
        match &self.key {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// `cardinality` aggregation payload / `cardinality` 聚合载荷
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CardinalityAggregate {
    #[serde(default)]
    pub value: f64,
}

impl CardinalityAggregate {
    pub fn count(&self) -> u64 {
        self.value as u64
    }
}

/// Payload of `filter` and `nested` aggregations, sub-aggregations stay raw
/// until asked for / `filter`/`nested` 聚合载荷，子聚合按需解码
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SingleBucketAggregate {
    #[serde(default)]
    pub doc_count: u64,
    #[serde(flatten)]
    pub aggregations: Map<String, Value>,
}

impl SingleBucketAggregate {
    pub fn decode_sub<T: DeserializeOwned>(&self, name: &str) -> Result<T, SearchError> {
        let raw = self.aggregations.get(name).ok_or_else(|| {
            SearchError::aggregation_decode(name, "sub-aggregation missing from engine response")
        })?;
        serde_json::from_value(raw.clone())
            .map_err(|e| SearchError::aggregation_decode(name, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_response() -> SearchResult {
        serde_json::from_value(json!({
            "took": 12,
            "timed_out": false,
            "hits": {
                "total": { "value": 2341, "relation": "eq" },
                "max_score": null,
                "hits": [
                    {
                        "_index": "eadlist",
                        "_id": "doc-1",
                        "fields": { "meta.spec": ["NL-HaNA_1.04.02"] },
                        "inner_hits": {
                            "collapse": {
                                "hits": {
                                    "total": { "value": 83, "relation": "eq" },
                                    "hits": [
                                        { "_id": "doc-1", "_source": { "tree": { "inventoryID": "" } } }
                                    ]
                                }
                            }
                        }
                    }
                ]
            },
            "aggregations": {
                "counts": {
                    "doc_count": 2341,
                    "specCount": { "value": 17.0 },
                    "typeCount": {
                        "buckets": [
                            { "key": "ead", "doc_count": 2200 },
                            { "key": "eadDesc", "doc_count": 141 }
                        ]
                    }
                },
                "tree.hasDigitalObject": {
                    "doc_count": 2341,
                    "value": {
                        "sum_other_doc_count": 0,
                        "buckets": [
                            { "key": 1, "key_as_string": "true", "doc_count": 420 }
                        ]
                    }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_total_and_field_access() {
        let resp = sample_response();
        assert_eq!(resp.total_hits(), 2341);

        let hit = &resp.hits.hits[0];
        assert_eq!(hit.field_string("meta.spec"), Some("NL-HaNA_1.04.02"));
        assert_eq!(hit.field_string("missing"), None);

        let inner = hit.inner_hit("collapse").unwrap();
        assert_eq!(inner.total.as_ref().unwrap().value, 83);
    }

    #[test]
    fn test_decode_counts_aggregation() {
        let resp = sample_response();
        let counts: SingleBucketAggregate = resp.decode_aggregation("counts").unwrap();
        assert_eq!(counts.doc_count, 2341);

        let spec_count: CardinalityAggregate = counts.decode_sub("specCount").unwrap();
        assert_eq!(spec_count.count(), 17);

        let type_count: TermsAggregate = counts.decode_sub("typeCount").unwrap();
        assert_eq!(type_count.bucket_count("ead"), 2200);
        assert_eq!(type_count.bucket_count("eadDesc"), 141);
        assert_eq!(type_count.bucket_count("absent"), 0);
    }

    #[test]
    fn test_boolean_bucket_key_uses_key_as_string() {
        let resp = sample_response();
        let facet: SingleBucketAggregate = resp.decode_aggregation("tree.hasDigitalObject").unwrap();
        let values: TermsAggregate = facet.decode_sub("value").unwrap();
        assert_eq!(values.buckets[0].key_string(), "true");
        assert_eq!(values.buckets[0].doc_count, 420);
    }

    #[test]
    fn test_missing_aggregation_is_an_error() {
        let resp = sample_response();
        let err = resp
            .decode_aggregation::<TermsAggregate>("noSuchAgg")
            .unwrap_err();
        assert!(err.to_string().contains("noSuchAgg"));
    }

    #[test]
    fn test_decode_source_absent_is_none() {
        let hit = SearchHit::default();
        let decoded: Option<Value> = hit.decode_source().unwrap();
        assert!(decoded.is_none());
    }
}
