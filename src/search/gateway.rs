//! Query routing across the full-text index and the system-of-record.
//!
//! Three strategies:
//! - `index_first`: ask the index; on error or timeout fall back to the
//!   store and flag the response as degraded.
//! - `store_only`: bypass the index entirely.
//! - `hybrid`: query both concurrently and merge, ranking items found by
//!   both sources first (by store update recency), then store-only, then
//!   index-only. Store values win for overlapping fields since the index
//!   may lag behind.
//!
//! The index also lags soft deletions until the next sync cycle removes
//! the document, so index-served hits are checked against the
//! system-of-record before they reach the caller.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

use crate::config::SearchConfig;
use crate::error::Result;
use crate::models::{ContentItem, ContentKind, ContentStatus};
use crate::search::error::SearchError;
use crate::search::index::{IndexHit, IndexStore};
use crate::store::{ContentQuery, ContentStore};

/// Query routing strategy
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SearchStrategy {
    /// Index with store fallback
    #[default]
    IndexFirst,

    /// Store only, index never consulted
    StoreOnly,

    /// Both sources concurrently, merged
    Hybrid,
}

/// A search query as the caller poses it
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub text: String,
    pub kind: Option<ContentKind>,
    pub status: Option<ContentStatus>,
    pub limit: usize,
}

impl SearchRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: None,
            status: None,
            limit: 20,
        }
    }

    pub fn with_kind(mut self, kind: ContentKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_status(mut self, status: ContentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// A single result, from either source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: Uuid,
    pub kind: ContentKind,
    pub status: ContentStatus,
    pub title: String,
    pub slug: String,
    pub view_count: u64,
    pub updated_at: DateTime<Utc>,

    /// Relevance score when the index contributed the hit
    pub score: Option<f32>,
}

impl From<&ContentItem> for SearchHit {
    fn from(item: &ContentItem) -> Self {
        Self {
            id: item.id,
            kind: item.kind,
            status: item.status,
            title: item.title.clone(),
            slug: item.slug.clone(),
            view_count: item.view_count,
            updated_at: item.updated_at,
            score: None,
        }
    }
}

impl From<&IndexHit> for SearchHit {
    fn from(hit: &IndexHit) -> Self {
        Self {
            id: hit.id,
            kind: hit.kind,
            status: hit.status,
            title: hit.title.clone(),
            slug: hit.slug.clone(),
            view_count: hit.view_count,
            updated_at: hit.updated_at,
            score: Some(hit.score),
        }
    }
}

/// Search results plus routing metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,

    /// Strategy that produced the response
    pub strategy: SearchStrategy,

    /// True when a source failed and the response is partial or served
    /// from the fallback
    pub degraded: bool,

    /// Execution time in milliseconds
    pub search_time_ms: u64,
}

/// Routes queries per the configured [`SearchStrategy`]
pub struct SearchGateway {
    index: Arc<dyn IndexStore>,
    store: Arc<dyn ContentStore>,
    config: SearchConfig,
}

impl SearchGateway {
    pub fn new(
        index: Arc<dyn IndexStore>,
        store: Arc<dyn ContentStore>,
        config: SearchConfig,
    ) -> Self {
        Self {
            index,
            store,
            config,
        }
    }

    /// Execute a search with the configured strategy
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let start = std::time::Instant::now();

        let (hits, degraded) = match self.config.strategy {
            SearchStrategy::StoreOnly => (self.store_hits(request).await?, false),
            SearchStrategy::IndexFirst => self.index_first(request).await?,
            SearchStrategy::Hybrid => self.hybrid(request).await?,
        };

        Ok(SearchResponse {
            hits,
            strategy: self.config.strategy,
            degraded,
            search_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn index_first(&self, request: &SearchRequest) -> Result<(Vec<SearchHit>, bool)> {
        match self.index_hits(request).await {
            Ok(hits) => {
                let live = self.live_hits(hits).await?;
                Ok((live.iter().map(SearchHit::from).collect(), false))
            }
            Err(err) => {
                tracing::warn!(error = %err, "Index query failed, falling back to store");
                let hits = self.store_hits(request).await?;
                Ok((hits, true))
            }
        }
    }

    async fn hybrid(&self, request: &SearchRequest) -> Result<(Vec<SearchHit>, bool)> {
        let (index_result, store_result) =
            tokio::join!(self.index_hits(request), self.store_items(request));

        match (index_result, store_result) {
            (Ok(index_hits), Ok(store_items)) => {
                let index_hits = self.live_hits(index_hits).await?;
                Ok((
                    merge_hybrid(index_hits, store_items, request.limit),
                    false,
                ))
            }
            (Ok(index_hits), Err(err)) => {
                // The record is unreachable, so deletion status cannot be
                // checked; hits are served as indexed, flagged degraded.
                tracing::warn!(error = %err, "Store query failed, serving index results only");
                Ok((index_hits.iter().map(SearchHit::from).collect(), true))
            }
            (Err(err), Ok(store_items)) => {
                tracing::warn!(error = %err, "Index query failed, serving store results only");
                Ok((store_items.iter().map(SearchHit::from).collect(), true))
            }
            (Err(index_err), Err(store_err)) => {
                tracing::error!(
                    index_error = %index_err,
                    store_error = %store_err,
                    "Both search sources failed"
                );
                Err(store_err)
            }
        }
    }

    /// Drop index hits whose system-of-record row is gone or
    /// soft-deleted. The index holds stale documents between a soft
    /// delete and the cycle that removes them.
    async fn live_hits(&self, hits: Vec<IndexHit>) -> Result<Vec<IndexHit>> {
        let mut live = Vec::with_capacity(hits.len());
        for hit in hits {
            match self.store.get_content(&hit.id).await? {
                Some(row) if !row.is_deleted() => live.push(hit),
                _ => {
                    tracing::debug!(
                        content_id = %hit.id,
                        "Dropping index hit without a live record"
                    );
                }
            }
        }
        Ok(live)
    }

    /// Index query bounded by the fallback deadline
    async fn index_hits(&self, request: &SearchRequest) -> Result<Vec<IndexHit>> {
        let deadline = Duration::from_millis(self.config.fallback_timeout_ms);
        match tokio::time::timeout(deadline, self.index.query(request)).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(SearchError::Timeout(self.config.fallback_timeout_ms).into()),
        }
    }

    async fn store_items(&self, request: &SearchRequest) -> Result<Vec<ContentItem>> {
        let query = ContentQuery {
            text: request.text.clone(),
            kind: request.kind,
            status: request.status,
            limit: request.limit.min(self.config.max_results),
        };
        self.store.query_text(&query).await
    }

    async fn store_hits(&self, request: &SearchRequest) -> Result<Vec<SearchHit>> {
        Ok(self
            .store_items(request)
            .await?
            .iter()
            .map(SearchHit::from)
            .collect())
    }
}

/// Merge hybrid results. Ranking: items both sources agree on, then
/// store-only, then index-only; the first two groups are ordered by
/// store update recency, the index may rank only what it alone found.
/// When both sources carry an item, the store row supplies the fields.
fn merge_hybrid(
    index_hits: Vec<IndexHit>,
    store_items: Vec<ContentItem>,
    limit: usize,
) -> Vec<SearchHit> {
    let mut store_by_id: HashMap<Uuid, ContentItem> =
        store_items.into_iter().map(|item| (item.id, item)).collect();

    let mut both = Vec::new();
    let mut index_only = Vec::new();

    for index_hit in &index_hits {
        if let Some(item) = store_by_id.remove(&index_hit.id) {
            let mut hit = SearchHit::from(&item);
            hit.score = Some(index_hit.score);
            both.push(hit);
        } else {
            index_only.push(SearchHit::from(index_hit));
        }
    }

    // Both-group hits carry store fields, so sorting on updated_at is
    // sorting on the record's recency, not the index's stale copy
    both.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

    // What remains in the map was found by the store alone
    let mut store_only: Vec<SearchHit> = store_by_id.values().map(SearchHit::from).collect();
    store_only.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

    let mut merged = both;
    merged.extend(store_only);
    merged.extend(index_only);
    merged.truncate(limit);
    merged
}
