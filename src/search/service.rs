//! Search service - orchestrates both search operations / 搜索服务
//!
//! Cluster search: parse, consult the cache, compile, execute, assemble
//! archives from collapse groups and aggregations, refine description counts
//! in process, cache. Detail search does the same inside one archive.
//! / 集群搜索：解析、查缓存、编译、执行、装配、进程内精化描述计数、写缓存。
//! 详情搜索在单个馆藏内执行同样流程。

use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::SearchError;
use crate::index::{
    CardinalityAggregate, SearchClient, SearchResult, SingleBucketAggregate, TermsAggregate,
};
use crate::models::DatasetStore;

use super::cache::{CacheStats, ResponseCache};
use super::compile;
use super::facets::decode_facets;
use super::matcher::{DescriptionIndex, DescriptionQuery};
use super::request::{RawParams, SearchRequest};
use super::response::{Archive, ArchiveDocument, CLevelEntry, SearchResponse};
use super::{
    ARCHIVE_TAG, COLLAPSE_INNER_HIT, COUNTS_AGG, DESCRIPTION_TAG, SPEC_COUNT_AGG, SPEC_FIELD,
    TYPE_COUNT_AGG, UNFILTERED_TYPE_COUNT_AGG,
};

/// Faceted search over archival finding aids / 检索工具上的分面搜索
pub struct SearchService {
    client: Arc<dyn SearchClient>,
    datasets: Arc<dyn DatasetStore>,
    config: AppConfig,
    cache: ResponseCache,
}

impl SearchService {
    pub fn new(
        client: Arc<dyn SearchClient>,
        datasets: Arc<dyn DatasetStore>,
        config: AppConfig,
    ) -> Self {
        let cache = ResponseCache::new(config.cache.clone());
        Self {
            client,
            datasets,
            config,
            cache,
        }
    }

    /// Search across all archives, one row per archive / 跨馆藏搜索，每馆藏一行
    pub async fn cluster_search(&self, params: &RawParams) -> Result<SearchResponse, SearchError> {
        let req_id = Uuid::new_v4();
        match self.run_cluster_search(req_id, params).await {
            Ok(response) => Ok(response),
            Err(e) => {
                error!(req_id = %req_id, error = %e, "cluster search failed");
                Err(e)
            }
        }
    }

    async fn run_cluster_search(
        &self,
        req_id: Uuid,
        params: &RawParams,
    ) -> Result<SearchResponse, SearchError> {
        let mut request = SearchRequest::from_params(params)?;

        // 默认分面字段补齐后才取缓存键
        for field in &self.config.search.default_facet_fields {
            if !request.facet_fields.contains(field) {
                request.facet_fields.push(field.clone());
            }
        }

        if request.take_cache_reset() {
            info!(req_id = %req_id, "resetting response cache");
            self.cache.reset().await;
        }
        let refresh = request.take_cache_refresh();
        let key = request.cache_key();

        if !request.no_cache && !refresh {
            match self.cache.get_response(key).await {
                Some(cached) => {
                    debug!(req_id = %req_id, key = %key, "cluster search served from cache");
                    return Ok(cached);
                }
                None => debug!(req_id = %req_id, key = %key, "cache miss"),
            }
        }

        let body = compile::build_cluster_body(&request, &self.config)?;
        let result = self.execute(req_id, &body).await?;
        let mut response = self.assemble_cluster(req_id, &request, &result).await?;
        attach_diagnostics(req_id, &request, &body, &result, &mut response);

        if !request.no_cache {
            self.cache.store_response(key, &response).await;
        }
        Ok(response)
    }

    /// Search the child levels of one archive / 搜索单个馆藏的子层级
    pub async fn detail_search(
        &self,
        inventory_id: &str,
        params: &RawParams,
    ) -> Result<SearchResponse, SearchError> {
        let req_id = Uuid::new_v4();
        match self.run_detail_search(req_id, inventory_id, params).await {
            Ok(response) => Ok(response),
            Err(e) => {
                error!(req_id = %req_id, inventory_id, error = %e, "detail search failed");
                Err(e)
            }
        }
    }

    async fn run_detail_search(
        &self,
        req_id: Uuid,
        inventory_id: &str,
        params: &RawParams,
    ) -> Result<SearchResponse, SearchError> {
        let mut request = SearchRequest::from_params(params)?;
        request.inventory_id = inventory_id.to_string();

        if request.take_cache_reset() {
            info!(req_id = %req_id, inventory_id, "resetting response cache");
            self.cache.reset().await;
        }
        let refresh = request.take_cache_refresh();
        let key = request.cache_key();

        if !request.no_cache && !refresh {
            match self.cache.get_response(key).await {
                Some(cached) => {
                    debug!(req_id = %req_id, key = %key, "detail search served from cache");
                    return Ok(cached);
                }
                None => debug!(req_id = %req_id, key = %key, "cache miss"),
            }
        }

        let body = compile::build_detail_body(&request, &self.config)?;
        let result = self.execute(req_id, &body).await?;
        let mut response = self.assemble_detail(req_id, &request, &result)?;
        attach_diagnostics(req_id, &request, &body, &result, &mut response);

        if !request.no_cache {
            self.cache.store_response(key, &response).await;
        }
        Ok(response)
    }

    /// Counters of the response cache / 响应缓存计数
    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    async fn execute(&self, req_id: Uuid, body: &Value) -> Result<SearchResult, SearchError> {
        let started = Instant::now();
        let result = self
            .client
            .search(&self.config.index.index_name, body.clone())
            .await
            .map_err(SearchError::EngineQuery)?;
        debug!(
            req_id = %req_id,
            took_ms = started.elapsed().as_millis() as u64,
            engine_took_ms = result.took,
            total = result.total_hits(),
            "engine query finished"
        );
        Ok(result)
    }

    async fn assemble_cluster(
        &self,
        req_id: Uuid,
        request: &SearchRequest,
        result: &SearchResult,
    ) -> Result<SearchResponse, SearchError> {
        let description_enabled =
            request.description_search_enabled(&self.config.search.description_label);

        let counts: SingleBucketAggregate = result.decode_aggregation(COUNTS_AGG)?;
        let spec_count: CardinalityAggregate = counts.decode_sub(SPEC_COUNT_AGG)?;
        let type_count: TermsAggregate = counts.decode_sub(TYPE_COUNT_AGG)?;
        let unfiltered: TermsAggregate = result.decode_aggregation(UNFILTERED_TYPE_COUNT_AGG)?;

        let mut response = SearchResponse {
            archive_count: spec_count.count(),
            total_clevel_count: type_count.bucket_count(ARCHIVE_TAG),
            ..Default::default()
        };
        if description_enabled {
            response.total_description_count = unfiltered.bucket_count(DESCRIPTION_TAG);
        }
        // totalHits 只累加对外公布的计数
        response.total_hits = response.total_clevel_count + response.total_description_count;
        response.total_pages = request.page_count(response.archive_count);

        let cursor = request.cursor();
        if cursor as u64 > response.archive_count {
            return Err(SearchError::PageOutOfRange {
                cursor,
                total: response.archive_count,
            });
        }
        response.cursor = cursor;

        for hit in &result.hits.hits {
            let spec = match hit.field_string(SPEC_FIELD) {
                Some(spec) => spec.to_string(),
                None => {
                    warn!(req_id = %req_id, id = %hit.id, "hit without collection id field, skipping");
                    continue;
                }
            };
            let dataset = self
                .datasets
                .get_dataset(&spec)
                .await
                .map_err(|e| SearchError::DatasetLookup {
                    spec: spec.clone(),
                    source: e,
                })?;

            let mut archive = Archive {
                inventory_id: spec.clone(),
                title: dataset.label.clone(),
                period: dataset.period.clone(),
                c_level_count: 0,
                description_count: 0,
                clevels_total: dataset.clevels,
            };

            if let Some(inner) = hit.inner_hit(COLLAPSE_INNER_HIT) {
                archive.c_level_count = inner.total.as_ref().map(|t| t.value).unwrap_or(0);

                if let Some(first) = inner.hits.first() {
                    let document: Option<ArchiveDocument> =
                        first.decode_source().map_err(|e| SearchError::SearchExecution {
                            reason: format!("unable to decode collapse inner hit: {}", e),
                        })?;
                    if let Some(tree) = document.and_then(|d| d.tree) {
                        // 分组首文档带 inventoryID 的是馆藏描述节点，不算子层级
                        if !tree.inventory_id.is_empty() {
                            archive.c_level_count = archive.c_level_count.saturating_sub(1);
                            archive.description_count = 1;
                        }
                    }
                }
            }

            if !request.raw_query.trim().is_empty()
                && description_enabled
                && !dataset.description.is_empty()
            {
                let query = DescriptionQuery::parse(&request.raw_query)?;
                let index = DescriptionIndex::new(&dataset.description);
                archive.description_count = index.search(&query).total;
            }

            response.archives.push(archive);
        }

        let facets = decode_facets(result, request)?;
        if !facets.is_empty() {
            response.facets = Some(facets);
        }
        Ok(response)
    }

    fn assemble_detail(
        &self,
        req_id: Uuid,
        request: &SearchRequest,
        result: &SearchResult,
    ) -> Result<SearchResponse, SearchError> {
        let total_clevel_count = result.total_hits();

        let mut response = SearchResponse {
            total_clevel_count,
            total_hits: total_clevel_count,
            ..Default::default()
        };
        if response.total_hits > 0 {
            response.archive_count = 1;
            response.total_pages = request.page_count(total_clevel_count);
        }

        let cursor = request.cursor();
        if cursor as u64 > total_clevel_count {
            return Err(SearchError::PageOutOfRange {
                cursor,
                total: total_clevel_count,
            });
        }
        response.cursor = cursor;

        if total_clevel_count == 0 {
            return Ok(response);
        }

        let mut entries = Vec::with_capacity(result.hits.hits.len());
        for hit in &result.hits.hits {
            let document: Option<ArchiveDocument> =
                hit.decode_source().map_err(|e| SearchError::SearchExecution {
                    reason: format!("unable to decode hit source: {}", e),
                })?;
            match document.and_then(|d| d.tree) {
                Some(tree) => entries.push(CLevelEntry::from_tree(&tree)),
                None => {
                    warn!(req_id = %req_id, id = %hit.id, "hit without tree node, skipping");
                }
            }
        }
        response.c_levels = Some(entries);
        Ok(response)
    }
}

/// Attach the requested diagnostic payloads / 附加请求的诊断载荷
fn attach_diagnostics(
    req_id: Uuid,
    request: &SearchRequest,
    body: &Value,
    result: &SearchResult,
    response: &mut SearchResponse,
) {
    if request.echo_service {
        response.service = Some(body.clone());
    }
    if request.explain {
        match serde_json::to_value(result) {
            Ok(raw) => response.explain = Some(raw),
            Err(e) => warn!(req_id = %req_id, error = %e, "unable to attach engine response"),
        }
    }
}
