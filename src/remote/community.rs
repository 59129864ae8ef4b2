use std::sync::Arc;

use crate::{
    assets::data_uri::EncodedImage,
    card::{BackgroundSpec, CardModel},
    export::file_stem,
    foundation::error::LyricodeResult,
    remote::{
        AssetReference, CommunityEntry, NewEntry, ObjectStore, RecordStore, StoredBackground,
        resolver::AssetResolver,
    },
};

/// A community entry with its background reference resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishedCard {
    pub entry: CommunityEntry,
    pub background_url: Option<String>,
}

/// What to fetch and what to call it when saving an entry's background.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackgroundDownload {
    pub url: String,
    pub filename: String,
}

/// Save, list and like against the shared stores.
///
/// Holds one feed cache. Any successful write invalidates it; the next [`CommunitySync::feed`]
/// replaces it wholesale.
pub struct CommunitySync<O, R> {
    objects: Arc<O>,
    records: Arc<R>,
    resolver: AssetResolver<O>,
    cache: tokio::sync::Mutex<Option<Arc<Vec<PublishedCard>>>>,
}

impl<O: ObjectStore, R: RecordStore> CommunitySync<O, R> {
    pub fn new(objects: Arc<O>, records: Arc<R>) -> Self {
        Self {
            resolver: AssetResolver::new(objects.clone()),
            objects,
            records,
            cache: tokio::sync::Mutex::new(None),
        }
    }

    pub fn resolver(&self) -> &AssetResolver<O> {
        &self.resolver
    }

    /// Upload `image` (when given), then create the record pointing at it.
    ///
    /// A failed upload creates nothing. A failed create after a good upload leaves the object
    /// behind; nothing rolls it back.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(kind = ?card.kind(), creator = creator_name)
    )]
    pub async fn save(
        &self,
        card: &CardModel,
        creator_name: &str,
        image: Option<&EncodedImage>,
    ) -> LyricodeResult<String> {
        let background = match image {
            Some(image) => {
                let path = format!("backgrounds/{}", chrono::Utc::now().timestamp_millis());
                let stored = self.objects.put(&path, image).await.inspect_err(|e| {
                    tracing::error!(error = %e, %path, "background upload failed");
                })?;
                StoredBackground::Asset(AssetReference::new(stored))
            }
            None => match card.background() {
                BackgroundSpec::Gradient(id) => StoredBackground::Gradient(*id),
                BackgroundSpec::None | BackgroundSpec::UploadedImage(_) => StoredBackground::Empty,
            },
        };

        let id = self
            .records
            .create(NewEntry {
                content: card.content().clone(),
                background,
                creator_name: creator_name.to_owned(),
                created_at: chrono::Utc::now(),
            })
            .await
            .inspect_err(|e| tracing::error!(error = %e, "community record not created"))?;
        self.invalidate().await;
        tracing::info!(%id, "card published");
        Ok(id)
    }

    /// Fresh listing with every background resolved concurrently, in store order.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn list(&self) -> LyricodeResult<Vec<PublishedCard>> {
        let entries = self
            .records
            .list()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "listing community entries failed"))?;
        let urls = futures::future::join_all(entries.iter().map(|e| {
            self.resolver
                .resolve(e.background.asset().map(AssetReference::storage_path))
        }))
        .await;
        Ok(entries
            .into_iter()
            .zip(urls)
            .map(|(entry, background_url)| PublishedCard {
                entry,
                background_url,
            })
            .collect())
    }

    /// Cached listing; refetched only after an invalidation.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn feed(&self) -> LyricodeResult<Arc<Vec<PublishedCard>>> {
        let mut cache = self.cache.lock().await;
        if let Some(cards) = cache.as_ref() {
            return Ok(cards.clone());
        }
        let cards = Arc::new(self.list().await?);
        *cache = Some(cards.clone());
        Ok(cards)
    }

    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }

    /// Adds one like and returns the count read before the increment, plus one.
    ///
    /// The value is an estimate: concurrent likers all see their own read. A missing entry
    /// returns `0` and increments nothing.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn like(&self, entry_id: &str) -> LyricodeResult<u64> {
        let entry = self
            .records
            .get(entry_id)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "reading liked entry failed"))?;
        let Some(entry) = entry else {
            tracing::debug!("like on missing entry");
            return Ok(0);
        };
        self.records
            .increment_likes(entry_id)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "like increment failed"))?;
        self.invalidate().await;
        Ok(entry.like_count + 1)
    }

    /// Resolves the entry's background again. `None` when it has no asset or the asset is gone.
    #[tracing::instrument(level = "debug", skip_all, fields(entry_id = %entry.id))]
    pub async fn download_background(&self, entry: &CommunityEntry) -> Option<BackgroundDownload> {
        let asset = entry.background.asset()?;
        let url = self.resolver.resolve(Some(asset.storage_path())).await?;
        Some(BackgroundDownload {
            url,
            filename: background_filename(entry.title()),
        })
    }
}

/// `{title or "lyrics"}-background.png`, with the title reduced to one path component.
pub fn background_filename(title: &str) -> String {
    format!("{}-background.png", file_stem(title, "lyrics"))
}
