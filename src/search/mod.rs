//! Full-text search: index maintenance and the query gateway.
//!
//! The index is a derived projection of the system-of-record, refreshed
//! by the sync scheduler. Queries go through [`SearchGateway`], which
//! routes them per the configured [`SearchStrategy`] and degrades to the
//! store when the index is unavailable.

pub mod document;
pub mod error;
pub mod gateway;
pub mod index;

pub use document::{build_content_schema, ContentDocument, SearchDocument};
pub use error::{SearchError, SearchResult};
pub use gateway::{SearchGateway, SearchHit, SearchRequest, SearchResponse, SearchStrategy};
pub use index::{IndexHit, IndexStore, TantivyIndex, UpsertReport};
