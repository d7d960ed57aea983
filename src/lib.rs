pub mod config;
pub mod error;
pub mod index;
pub mod models;
pub mod search;

pub use error::SearchError;
pub use search::{RawParams, SearchResponse, SearchService};

use std::sync::Arc;

// Build a search service against the configured engine endpoint / 按配置构建搜索服务
pub fn service_from_config(
    datasets: Arc<dyn models::DatasetStore>,
) -> anyhow::Result<SearchService> {
    let config = config::config();
    let client = index::HttpSearchClient::from_config(&config.index)?;
    Ok(SearchService::new(Arc::new(client), datasets, config))
}
