//! Search index management behind the [`IndexStore`] trait.
//!
//! The sync scheduler and the gateway only see the trait, so tests can
//! substitute a failing index without touching a filesystem.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tantivy::collector::{Count, TopDocs};
use tantivy::query::{AllQuery, BooleanQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::{Facet, IndexRecordOption, Schema, Value};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::SearchConfig;
use crate::models::{ContentKind, ContentStatus};
use crate::search::document::{build_content_schema, ContentDocument, SearchDocument};
use crate::search::error::{SearchError, SearchResult};
use crate::search::gateway::SearchRequest;

/// Per-batch outcome of a bulk upsert. A failed document never blocks
/// the rest of the batch.
#[derive(Debug, Default)]
pub struct UpsertReport {
    /// Document ids written and committed
    pub succeeded: Vec<String>,

    /// Document ids that failed, with the reason
    pub failed: Vec<(String, String)>,
}

impl UpsertReport {
    pub fn all_failed(documents: &[ContentDocument], reason: &str) -> Self {
        Self {
            succeeded: Vec::new(),
            failed: documents
                .iter()
                .map(|d| (d.document_id(), reason.to_string()))
                .collect(),
        }
    }
}

/// A single index match with its stored projection fields
#[derive(Debug, Clone)]
pub struct IndexHit {
    pub id: Uuid,
    pub kind: ContentKind,
    pub status: ContentStatus,
    pub title: String,
    pub slug: String,
    pub view_count: u64,
    pub updated_at: DateTime<Utc>,
    pub score: f32,
}

/// Index-side contract used by the sync scheduler and the gateway
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Upsert a batch of documents (delete-term then add), committing
    /// once at the end. Per-document failures are reported, not raised.
    async fn upsert_batch(&self, documents: &[ContentDocument]) -> SearchResult<UpsertReport>;

    /// Remove documents by id. Returns the number of deletions issued.
    async fn delete_by_ids(&self, document_ids: &[String]) -> SearchResult<usize>;

    /// Execute a text query with optional kind/status filters
    async fn query(&self, request: &SearchRequest) -> SearchResult<Vec<IndexHit>>;

    /// Total number of documents in the index
    async fn doc_count(&self) -> SearchResult<u64>;
}

/// Tantivy-backed [`IndexStore`]
pub struct TantivyIndex {
    index: Index,
    schema: Schema,
    writer: Arc<RwLock<IndexWriter>>,
    reader: IndexReader,
    config: SearchConfig,
}

impl TantivyIndex {
    /// Open the index at the configured path, creating it if absent
    pub fn new(config: SearchConfig) -> SearchResult<Self> {
        std::fs::create_dir_all(&config.index_path).map_err(|e| {
            SearchError::IndexInitFailed(format!("Failed to create index directory: {}", e))
        })?;

        let schema = build_content_schema();

        let index = if Self::index_exists(&config.index_path) {
            Index::open_in_dir(&config.index_path).map_err(|e| {
                SearchError::IndexInitFailed(format!("Failed to open existing index: {}", e))
            })?
        } else {
            Index::create_in_dir(&config.index_path, schema.clone()).map_err(|e| {
                SearchError::IndexInitFailed(format!("Failed to create new index: {}", e))
            })?
        };

        let writer = index
            .writer(config.writer_heap_bytes)
            .map_err(|e| SearchError::IndexInitFailed(format!("Failed to create writer: {}", e)))?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e| SearchError::IndexInitFailed(format!("Failed to create reader: {}", e)))?;

        Ok(Self {
            index,
            schema,
            writer: Arc::new(RwLock::new(writer)),
            reader,
            config,
        })
    }

    fn index_exists(path: &Path) -> bool {
        path.join("meta.json").exists()
    }

    fn build_query(&self, request: &SearchRequest) -> SearchResult<Box<dyn Query>> {
        let mut subqueries: Vec<(Occur, Box<dyn Query>)> = Vec::new();

        if !request.text.trim().is_empty() {
            let mut text_fields = Vec::new();
            for name in ["title", "body", "tags", "owner", "category", "topic"] {
                if let Ok(field) = self.schema.get_field(name) {
                    text_fields.push(field);
                }
            }
            let query_parser = QueryParser::for_index(&self.index, text_fields);
            let parsed = query_parser.parse_query(&request.text)?;
            subqueries.push((Occur::Must, parsed));
        }

        if let Some(kind) = request.kind {
            if let Ok(field) = self.schema.get_field("kind") {
                let facet = Facet::from(&format!("/kind/{}", kind));
                subqueries.push((
                    Occur::Must,
                    Box::new(TermQuery::new(
                        tantivy::Term::from_facet(field, &facet),
                        IndexRecordOption::Basic,
                    )),
                ));
            }
        }

        if let Some(status) = request.status {
            if let Ok(field) = self.schema.get_field("status") {
                let facet = Facet::from(&format!("/status/{}", status));
                subqueries.push((
                    Occur::Must,
                    Box::new(TermQuery::new(
                        tantivy::Term::from_facet(field, &facet),
                        IndexRecordOption::Basic,
                    )),
                ));
            }
        }

        if subqueries.is_empty() {
            Ok(Box::new(AllQuery))
        } else if subqueries.len() == 1 {
            Ok(subqueries.into_iter().next().map(|(_, q)| q).unwrap_or_else(|| Box::new(AllQuery)))
        } else {
            Ok(Box::new(BooleanQuery::from(subqueries)))
        }
    }

    fn doc_to_hit(&self, doc: &TantivyDocument, score: f32) -> Option<IndexHit> {
        let id = Uuid::from_str(&self.text_value(doc, "id")?).ok()?;
        let kind = ContentKind::from_str(&self.facet_value(doc, "kind")?).ok()?;
        let status = ContentStatus::from_str(&self.facet_value(doc, "status")?).ok()?;

        Some(IndexHit {
            id,
            kind,
            status,
            title: self.text_value(doc, "title").unwrap_or_default(),
            slug: self.text_value(doc, "slug").unwrap_or_default(),
            view_count: self.u64_value(doc, "view_count").unwrap_or(0),
            updated_at: self.date_value(doc, "updated_at").unwrap_or_else(Utc::now),
            score,
        })
    }

    fn text_value(&self, doc: &TantivyDocument, field_name: &str) -> Option<String> {
        self.schema.get_field(field_name).ok().and_then(|field| {
            doc.get_first(field)
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
        })
    }

    fn facet_value(&self, doc: &TantivyDocument, field_name: &str) -> Option<String> {
        self.schema.get_field(field_name).ok().and_then(|field| {
            doc.get_first(field).and_then(|v| {
                v.as_facet().map(|facet| {
                    // "/kind/QUESTION" -> "QUESTION"
                    facet.to_string().split('/').last().unwrap_or("").to_string()
                })
            })
        })
    }

    fn u64_value(&self, doc: &TantivyDocument, field_name: &str) -> Option<u64> {
        self.schema
            .get_field(field_name)
            .ok()
            .and_then(|field| doc.get_first(field).and_then(|v| v.as_u64()))
    }

    fn date_value(&self, doc: &TantivyDocument, field_name: &str) -> Option<DateTime<Utc>> {
        self.schema.get_field(field_name).ok().and_then(|field| {
            doc.get_first(field)
                .and_then(|v| v.as_datetime())
                .and_then(|dt| DateTime::from_timestamp(dt.into_timestamp_secs(), 0))
        })
    }
}

#[async_trait]
impl IndexStore for TantivyIndex {
    async fn upsert_batch(&self, documents: &[ContentDocument]) -> SearchResult<UpsertReport> {
        let mut writer = self.writer.write().await;
        let mut report = UpsertReport::default();

        for document in documents {
            let tantivy_doc = document.to_tantivy_doc(&self.schema);

            // Delete any existing document with the same id first
            if let Ok(id_field) = self.schema.get_field("id") {
                let term = tantivy::Term::from_field_text(id_field, &document.document_id());
                writer.delete_term(term);
            }

            match writer.add_document(tantivy_doc) {
                Ok(_) => report.succeeded.push(document.document_id()),
                Err(e) => report.failed.push((document.document_id(), e.to_string())),
            }
        }

        // One commit for the whole batch; a commit failure takes every
        // document in the batch down with it.
        if let Err(e) = writer.commit() {
            return Ok(UpsertReport::all_failed(
                documents,
                &format!("Failed to commit batch: {}", e),
            ));
        }
        drop(writer);

        // Reload so the shared reader sees this commit (read-your-writes)
        let _ = self.reader.reload();

        Ok(report)
    }

    async fn delete_by_ids(&self, document_ids: &[String]) -> SearchResult<usize> {
        let mut writer = self.writer.write().await;
        let mut deleted = 0;

        if let Ok(id_field) = self.schema.get_field("id") {
            for document_id in document_ids {
                let term = tantivy::Term::from_field_text(id_field, document_id);
                writer.delete_term(term);
                deleted += 1;
            }

            writer.commit().map_err(|e| {
                SearchError::DeletionFailed(format!("Failed to commit deletions: {}", e))
            })?;
        }
        drop(writer);

        // Reload so the shared reader sees this commit (read-your-writes)
        let _ = self.reader.reload();

        Ok(deleted)
    }

    async fn query(&self, request: &SearchRequest) -> SearchResult<Vec<IndexHit>> {
        let tantivy_query = self.build_query(request)?;
        let searcher = self.reader.searcher();

        let limit = request.limit.min(self.config.max_results).max(1);
        let top_docs = searcher
            .search(&*tantivy_query, &TopDocs::with_limit(limit))
            .map_err(|e| SearchError::SearchFailed(format!("Search execution failed: {}", e)))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let retrieved: TantivyDocument = searcher
                .doc(doc_address)
                .map_err(|e| SearchError::SearchFailed(format!("Failed to retrieve doc: {}", e)))?;
            if let Some(hit) = self.doc_to_hit(&retrieved, score) {
                hits.push(hit);
            }
        }

        Ok(hits)
    }

    async fn doc_count(&self) -> SearchResult<u64> {
        let searcher = self.reader.searcher();
        let count = searcher
            .search(&AllQuery, &Count)
            .map_err(|e| SearchError::SearchFailed(format!("Failed to count documents: {}", e)))?;
        Ok(count as u64)
    }
}
