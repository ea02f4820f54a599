//! Content workflow manager: editorial lifecycle, audit trail, and
//! search-index synchronization for user-generated content.
//!
//! The system-of-record ([`store`]) owns the rows and their dirty flags;
//! [`workflow`] drives status transitions and moderation; [`sync`]
//! reconciles dirty rows into the full-text index; [`search`] routes
//! queries across index and store.

pub mod config;
pub mod error;
pub mod models;
pub mod search;
pub mod slug;
pub mod store;
pub mod sync;
pub mod workflow;

pub use error::{AppError, Result};
