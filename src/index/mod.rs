//! Index engine access / 索引引擎访问
//!
//! - query: typed request-body builders / 类型化请求体构建器
//! - response: wire-shape decoding / 响应解码
//! - http: the JSON-over-HTTP transport / HTTP 传输

pub mod http;
pub mod query;
pub mod response;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

pub use http::HttpSearchClient;
pub use response::{
    CardinalityAggregate, SearchHit, SearchHits, SearchResult, SingleBucketAggregate,
    TermsAggregate, TermsBucket, TotalHits,
};

/// Engine seam, one call per compiled request body / 引擎接口，每个请求体一次调用
#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn search(&self, index: &str, body: Value) -> Result<SearchResult>;
}
