use std::sync::Arc;

use crate::remote::ObjectStore;

/// Maps storage paths to fetchable URLs. Every call is a fresh round trip; nothing is cached.
pub struct AssetResolver<O: ?Sized> {
    store: Arc<O>,
}

impl<O: ?Sized> Clone for AssetResolver<O> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<O: ObjectStore + ?Sized> AssetResolver<O> {
    pub fn new(store: Arc<O>) -> Self {
        Self { store }
    }

    /// `None` for a missing or empty path (no store call), and for anything the store cannot
    /// produce. Failures are logged, never returned.
    pub async fn resolve(&self, storage_path: Option<&str>) -> Option<String> {
        let path = storage_path.filter(|p| !p.is_empty())?;
        match self.store.url_for(path).await {
            Ok(Some(url)) => Some(url),
            Ok(None) => {
                tracing::error!(path, "background asset not found");
                None
            }
            Err(e) => {
                tracing::error!(path, error = %e, "background asset lookup failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{assets::data_uri::EncodedImage, remote::MemoryObjectStore};

    #[tokio::test]
    async fn empty_paths_never_hit_the_store() {
        let store = Arc::new(MemoryObjectStore::new());
        let resolver = AssetResolver::new(store.clone());
        assert_eq!(resolver.resolve(None).await, None);
        assert_eq!(resolver.resolve(Some("")).await, None);
        assert_eq!(store.reads(), 0);
    }

    #[tokio::test]
    async fn missing_path_is_none_not_error() {
        let store = Arc::new(MemoryObjectStore::new());
        let resolver = AssetResolver::new(store.clone());
        assert_eq!(resolver.resolve(Some("nonexistent/path")).await, None);
        assert_eq!(store.reads(), 1);
    }

    #[tokio::test]
    async fn every_resolve_is_a_round_trip() {
        let store = Arc::new(MemoryObjectStore::new());
        store
            .put("backgrounds/7", &EncodedImage::from_bytes("image/jpeg", &[0xff, 0xd8]))
            .await
            .unwrap();
        let resolver = AssetResolver::new(store.clone());
        for _ in 0..3 {
            assert_eq!(
                resolver.resolve(Some("backgrounds/7")).await.as_deref(),
                Some("memory://backgrounds/7")
            );
        }
        assert_eq!(store.reads(), 3);
    }
}
