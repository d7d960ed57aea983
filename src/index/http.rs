//! HTTP search client / HTTP 搜索客户端
//!
//! Thin JSON-over-HTTP transport to the index engine, one POST per search.
//! / 到索引引擎的轻量 JSON-over-HTTP 传输，每次搜索一个 POST。

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use crate::config::IndexConfig;

use super::response::SearchResult;
use super::SearchClient;

/// Search client backed by the engine's HTTP API / 基于引擎 HTTP API 的搜索客户端
pub struct HttpSearchClient {
    client: Client,
    base_url: Url,
}

impl HttpSearchClient {
    /// Create a client for the engine at `base_url` / 创建指向 `base_url` 的客户端
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(base_url)?;
        // join() 会吃掉不以 / 结尾的最后一段路径
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url: base })
    }

    pub fn from_config(config: &IndexConfig) -> Result<Self> {
        Self::new(&config.base_url, config.request_timeout())
    }
}

#[async_trait]
impl SearchClient for HttpSearchClient {
    async fn search(&self, index: &str, body: Value) -> Result<SearchResult> {
        let url = self.base_url.join(&format!("{}/_search", index))?;
        let response = self.client.post(url).json(&body).send().await?;

        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            Err(anyhow!("search request failed: {}: {}", status, detail))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let client = HttpSearchClient::new("http://localhost:9200", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url.as_str(), "http://localhost:9200/");

        let joined = client.base_url.join("eadlist/_search").unwrap();
        assert_eq!(joined.as_str(), "http://localhost:9200/eadlist/_search");
    }

    #[test]
    fn test_base_url_keeps_path_prefix() {
        let client =
            HttpSearchClient::new("http://localhost:9200/engine", Duration::from_secs(5)).unwrap();
        let joined = client.base_url.join("eadlist/_search").unwrap();
        assert_eq!(joined.as_str(), "http://localhost:9200/engine/eadlist/_search");
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        assert!(HttpSearchClient::new("not a url", Duration::from_secs(5)).is_err());
    }
}
