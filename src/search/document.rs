//! Index document projection and schema

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tantivy::schema::*;
use tantivy::TantivyDocument;

use crate::store::ProjectionSource;

/// Trait for documents that can be indexed and searched
pub trait SearchDocument {
    /// Convert to Tantivy document
    fn to_tantivy_doc(&self, schema: &Schema) -> TantivyDocument;

    /// Get document ID
    fn document_id(&self) -> String;
}

/// Flattened content projection for the index. Reference ids are
/// resolved to display names at projection time so queries never touch
/// the relational store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentDocument {
    /// Content id (uuid as text)
    pub id: String,

    /// Content kind
    pub kind: String,

    /// Workflow status
    pub status: String,

    /// Title
    pub title: String,

    /// Body text
    pub body: String,

    /// URL-safe identifier
    pub slug: String,

    /// Owner display name
    pub owner: String,

    /// Category name, if categorized
    pub category: Option<String>,

    /// Topic name, if topical
    pub topic: Option<String>,

    /// Tag names
    pub tags: Vec<String>,

    /// Public read counter
    pub view_count: u64,

    /// Publication timestamp
    pub published_at: Option<DateTime<Utc>>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl From<&ProjectionSource> for ContentDocument {
    fn from(source: &ProjectionSource) -> Self {
        let item = &source.item;
        Self {
            id: item.id.to_string(),
            kind: item.kind.to_string(),
            status: item.status.to_string(),
            title: item.title.clone(),
            body: item.body.clone(),
            slug: item.slug.clone(),
            owner: source.owner.display_name.clone(),
            category: source.category.as_ref().map(|c| c.name.clone()),
            topic: source.topic.as_ref().map(|t| t.name.clone()),
            tags: source.tags.iter().map(|t| t.name.clone()).collect(),
            view_count: item.view_count,
            published_at: item.published_at,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

impl SearchDocument for ContentDocument {
    fn to_tantivy_doc(&self, schema: &Schema) -> TantivyDocument {
        let mut doc = TantivyDocument::new();

        if let Ok(field) = schema.get_field("id") {
            doc.add_text(field, &self.id);
        }

        if let Ok(field) = schema.get_field("kind") {
            doc.add_facet(field, Facet::from(&format!("/kind/{}", self.kind)));
        }

        if let Ok(field) = schema.get_field("status") {
            doc.add_facet(field, Facet::from(&format!("/status/{}", self.status)));
        }

        if let Ok(field) = schema.get_field("title") {
            doc.add_text(field, &self.title);
        }

        if let Ok(field) = schema.get_field("body") {
            doc.add_text(field, &self.body);
        }

        if let Ok(field) = schema.get_field("slug") {
            doc.add_text(field, &self.slug);
        }

        if let Ok(field) = schema.get_field("owner") {
            doc.add_text(field, &self.owner);
        }

        if let Some(ref category) = self.category {
            if let Ok(field) = schema.get_field("category") {
                doc.add_text(field, category);
            }
        }

        if let Some(ref topic) = self.topic {
            if let Ok(field) = schema.get_field("topic") {
                doc.add_text(field, topic);
            }
        }

        // Tags are multi-valued
        if let Ok(field) = schema.get_field("tags") {
            for tag in &self.tags {
                doc.add_text(field, tag);
            }
        }

        if let Ok(field) = schema.get_field("view_count") {
            doc.add_u64(field, self.view_count);
        }

        if let Some(published_at) = self.published_at {
            if let Ok(field) = schema.get_field("published_at") {
                doc.add_date(
                    field,
                    tantivy::DateTime::from_timestamp_secs(published_at.timestamp()),
                );
            }
        }

        if let Ok(field) = schema.get_field("created_at") {
            doc.add_date(
                field,
                tantivy::DateTime::from_timestamp_secs(self.created_at.timestamp()),
            );
        }

        if let Ok(field) = schema.get_field("updated_at") {
            doc.add_date(
                field,
                tantivy::DateTime::from_timestamp_secs(self.updated_at.timestamp()),
            );
        }

        doc
    }

    fn document_id(&self) -> String {
        self.id.clone()
    }
}

/// Build the search schema for content documents
pub fn build_content_schema() -> Schema {
    let mut schema_builder = Schema::builder();

    // ID - stored, indexed as a raw string for delete-term upserts
    schema_builder.add_text_field("id", STRING | STORED);

    // Kind and status - faceted for filtering
    schema_builder.add_facet_field("kind", INDEXED | STORED);
    schema_builder.add_facet_field("status", INDEXED | STORED);

    // Title and body - full-text indexed, stored
    schema_builder.add_text_field("title", TEXT | STORED);
    schema_builder.add_text_field("body", TEXT | STORED);

    // Slug - exact-match lookups
    schema_builder.add_text_field("slug", STRING | STORED);

    // Resolved reference names - full-text indexed
    schema_builder.add_text_field("owner", TEXT | STORED);
    schema_builder.add_text_field("category", TEXT | STORED);
    schema_builder.add_text_field("topic", TEXT | STORED);

    // Tags - multi-valued text field
    schema_builder.add_text_field("tags", TEXT | STORED);

    // View counter
    schema_builder.add_u64_field("view_count", INDEXED | STORED | FAST);

    // Timestamps
    schema_builder.add_date_field("published_at", INDEXED | STORED | FAST);
    schema_builder.add_date_field("created_at", INDEXED | STORED | FAST);
    schema_builder.add_date_field("updated_at", INDEXED | STORED | FAST);

    schema_builder.build()
}
