//! In-memory stream repository.
//!
//! Streams live in a `HashMap` behind a `tokio::sync::RwLock`:
//! - reads proceed concurrently
//! - a save swaps the whole entry under the write lock, so readers never
//!   observe a partially written stream
//!
//! Nothing survives a restart.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::id::StreamId;
use crate::model::Stream;
use crate::repository::{Page, StorageResult, StreamRepository};

#[derive(Debug, Clone, Default)]
pub struct InMemoryStreamRepository {
    streams: Arc<RwLock<HashMap<StreamId, Stream>>>,
}

impl InMemoryStreamRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored streams.
    pub async fn len(&self) -> usize {
        self.streams.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.streams.read().await.is_empty()
    }
}

#[async_trait]
impl StreamRepository for InMemoryStreamRepository {
    async fn find_by_id(&self, id: &StreamId) -> StorageResult<Option<Stream>> {
        Ok(self.streams.read().await.get(id).cloned())
    }

    async fn delete_by_id(&self, id: &StreamId) -> StorageResult<()> {
        let removed = self.streams.write().await.remove(id);
        debug!(stream_id = %id, removed = removed.is_some(), "Deleted stream");
        Ok(())
    }

    async fn save(&self, stream: &Stream) -> StorageResult<()> {
        let previous = self
            .streams
            .write()
            .await
            .insert(stream.id, stream.clone());
        debug!(
            stream_id = %stream.id,
            replaced = previous.is_some(),
            "Saved stream"
        );
        Ok(())
    }

    async fn find_page(
        &self,
        page_size: u32,
        page_number: u32,
        search: Option<&str>,
    ) -> StorageResult<Page<Stream>> {
        let needle = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut matching: Vec<Stream> = self
            .streams
            .read()
            .await
            .values()
            .filter(|stream| match &needle {
                Some(needle) => stream.name.to_lowercase().contains(needle.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

        let total_items = matching.len() as u64;
        let offset = usize::try_from(Page::<Stream>::offset(page_size, page_number))
            .unwrap_or(usize::MAX);
        let contents = matching
            .into_iter()
            .skip(offset)
            .take(page_size as usize)
            .collect();

        Ok(Page {
            page_number,
            page_size,
            total_items,
            contents,
        })
    }

    async fn find_all_enabled(&self) -> StorageResult<Vec<Stream>> {
        Ok(self
            .streams
            .read()
            .await
            .values()
            .filter(|stream| stream.enabled)
            .cloned()
            .collect())
    }

    async fn exists_by_id(&self, id: &StreamId) -> StorageResult<bool> {
        Ok(self.streams.read().await.contains_key(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Address, Backend, FeatureSet, StreamType};

    fn stream(name: &str, enabled: bool) -> Stream {
        Stream {
            id: StreamId::new(),
            enabled,
            name: name.to_string(),
            stream_type: StreamType::Simple,
            binding: Address::tcp("0.0.0.0", 8000),
            default_backend: Backend::new(Address::tcp("127.0.0.1", 9000)),
            routes: Vec::new(),
            feature_set: FeatureSet::default(),
        }
    }

    #[tokio::test]
    async fn test_save_replaces_by_id() {
        let repo = InMemoryStreamRepository::new();
        let mut original = stream("edge", true);
        repo.save(&original).await.unwrap();

        original.name = "edge-renamed".to_string();
        repo.save(&original).await.unwrap();

        assert_eq!(repo.len().await, 1);
        let stored = repo.find_by_id(&original.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "edge-renamed");
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let repo = InMemoryStreamRepository::new();
        repo.delete_by_id(&StreamId::new()).await.unwrap();
        assert!(repo.is_empty().await);
    }

    #[tokio::test]
    async fn test_find_page_orders_filters_and_counts() {
        let repo = InMemoryStreamRepository::new();
        for name in ["Charlie", "alpha-dns", "Bravo", "DNS-udp", "echo"] {
            repo.save(&stream(name, true)).await.unwrap();
        }

        let first = repo.find_page(2, 0, None).await.unwrap();
        assert_eq!(first.total_items, 5);
        let names: Vec<_> = first.contents.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Bravo", "Charlie"]);

        let last = repo.find_page(2, 2, None).await.unwrap();
        let names: Vec<_> = last.contents.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["echo"]);

        let searched = repo.find_page(10, 0, Some("dns")).await.unwrap();
        assert_eq!(searched.total_items, 2);
        let names: Vec<_> = searched.contents.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["DNS-udp", "alpha-dns"]);

        let beyond = repo.find_page(10, 5, None).await.unwrap();
        assert_eq!(beyond.total_items, 5);
        assert!(beyond.contents.is_empty());
    }

    #[tokio::test]
    async fn test_find_all_enabled() {
        let repo = InMemoryStreamRepository::new();
        let on = stream("on", true);
        repo.save(&on).await.unwrap();
        repo.save(&stream("off", false)).await.unwrap();

        let enabled = repo.find_all_enabled().await.unwrap();
        assert_eq!(enabled, vec![on.clone()]);
        assert!(repo.exists_by_id(&on.id).await.unwrap());
        assert!(!repo.exists_by_id(&StreamId::new()).await.unwrap());
    }
}
