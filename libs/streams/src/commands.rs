//! Stream commands.
//!
//! The single entry point for mutating or reading stream configuration.
//! Writes are validated before anything reaches the repository; reads are
//! passed straight through.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::id::StreamId;
use crate::model::Stream;
use crate::repository::{Page, StorageError, StreamRepository};
use crate::validation::{self, ValidationError};

/// Errors returned by [`StreamCommands`].
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type CommandResult<T> = Result<T, CommandError>;

#[async_trait]
pub trait StreamCommands: Send + Sync {
    /// Validates `stream`, then inserts or replaces it.
    ///
    /// On violations the repository is not touched.
    async fn save(&self, stream: &Stream) -> CommandResult<()>;

    async fn delete(&self, id: &StreamId) -> CommandResult<()>;

    async fn list(
        &self,
        page_size: u32,
        page_number: u32,
        search: Option<&str>,
    ) -> CommandResult<Page<Stream>>;

    async fn get(&self, id: &StreamId) -> CommandResult<Option<Stream>>;

    /// Every enabled stream, for building the live proxy configuration.
    async fn get_all_enabled(&self) -> CommandResult<Vec<Stream>>;

    async fn exists(&self, id: &StreamId) -> CommandResult<bool>;
}

/// [`StreamCommands`] over any [`StreamRepository`].
#[derive(Clone)]
pub struct StreamService {
    repository: Arc<dyn StreamRepository>,
}

impl StreamService {
    pub fn new(repository: Arc<dyn StreamRepository>) -> Self {
        Self { repository }
    }
}

impl std::fmt::Debug for StreamService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamService").finish_non_exhaustive()
    }
}

#[async_trait]
impl StreamCommands for StreamService {
    #[instrument(skip(self, stream), fields(stream_id = %stream.id, stream_name = %stream.name))]
    async fn save(&self, stream: &Stream) -> CommandResult<()> {
        if let Err(err) = validation::validate(stream) {
            warn!(violations = err.len(), "Rejected invalid stream");
            return Err(err.into());
        }

        self.repository.save(stream).await?;
        info!("Saved stream");
        Ok(())
    }

    #[instrument(skip(self), fields(stream_id = %id))]
    async fn delete(&self, id: &StreamId) -> CommandResult<()> {
        self.repository.delete_by_id(id).await?;
        info!("Deleted stream");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list(
        &self,
        page_size: u32,
        page_number: u32,
        search: Option<&str>,
    ) -> CommandResult<Page<Stream>> {
        let page = self
            .repository
            .find_page(page_size, page_number, search)
            .await?;
        debug!(
            total_items = page.total_items,
            returned = page.contents.len(),
            "Listed streams"
        );
        Ok(page)
    }

    #[instrument(skip(self), fields(stream_id = %id))]
    async fn get(&self, id: &StreamId) -> CommandResult<Option<Stream>> {
        Ok(self.repository.find_by_id(id).await?)
    }

    #[instrument(skip(self))]
    async fn get_all_enabled(&self) -> CommandResult<Vec<Stream>> {
        let streams = self.repository.find_all_enabled().await?;
        debug!(count = streams.len(), "Loaded enabled streams");
        Ok(streams)
    }

    #[instrument(skip(self), fields(stream_id = %id))]
    async fn exists(&self, id: &StreamId) -> CommandResult<bool> {
        Ok(self.repository.exists_by_id(id).await?)
    }
}
