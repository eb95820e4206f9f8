//! Persistence contract for streams.
//!
//! Implementations: [`crate::memory::InMemoryStreamRepository`] and
//! [`crate::db::PgStreamRepository`]. Both must make `save` atomic: the
//! stream and everything it owns are written together or not at all.
//!
//! Dropping a pending future abandons the storage call; transactional
//! backends roll back whatever was in flight.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::id::StreamId;
use crate::model::Stream;

/// Opaque storage failure, passed through the command layer unchanged.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct StorageError(#[from] anyhow::Error);

impl StorageError {
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self(anyhow::Error::new(error))
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// One page of an ordered listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Zero-based.
    pub page_number: u32,
    pub page_size: u32,
    /// Matching items across all pages.
    pub total_items: u64,
    pub contents: Vec<T>,
}

impl<T> Page<T> {
    /// Offset of the first item of this page.
    pub fn offset(page_size: u32, page_number: u32) -> u64 {
        u64::from(page_size) * u64::from(page_number)
    }
}

#[async_trait]
pub trait StreamRepository: Send + Sync {
    /// `Ok(None)` when no stream has this id.
    async fn find_by_id(&self, id: &StreamId) -> StorageResult<Option<Stream>>;

    /// Removing a missing id is not an error.
    async fn delete_by_id(&self, id: &StreamId) -> StorageResult<()>;

    /// Inserts the stream, or fully replaces the one stored under its id.
    async fn save(&self, stream: &Stream) -> StorageResult<()>;

    /// Streams ordered by name. `search` is matched case-insensitively as a
    /// substring of the name.
    async fn find_page(
        &self,
        page_size: u32,
        page_number: u32,
        search: Option<&str>,
    ) -> StorageResult<Page<Stream>>;

    /// Every enabled stream, in no particular order.
    async fn find_all_enabled(&self) -> StorageResult<Vec<Stream>>;

    async fn exists_by_id(&self, id: &StreamId) -> StorageResult<bool>;
}
