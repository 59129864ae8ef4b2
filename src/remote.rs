//! Shared storage: uploaded background objects plus the community record collection.

pub mod community;
pub mod fs;
pub mod memory;
pub mod resolver;

use async_trait::async_trait;

use crate::{
    assets::data_uri::EncodedImage,
    background::GradientId,
    card::{BackgroundSpec, CardContent},
    foundation::error::LyricodeResult,
};

pub use community::{BackgroundDownload, CommunitySync, PublishedCard};
pub use fs::{FsObjectStore, FsRecordStore};
pub use memory::{MemoryObjectStore, MemoryRecordStore};
pub use resolver::AssetResolver;

/// Opaque key of an uploaded object. Created once at save time, never rewritten.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct AssetReference(String);

impl AssetReference {
    pub fn new(storage_path: impl Into<String>) -> Self {
        Self(storage_path.into())
    }

    pub fn storage_path(&self) -> &str {
        &self.0
    }
}

/// How a published card remembers its background. Raw image data is never stored here.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StoredBackground {
    #[default]
    Empty,
    Asset(AssetReference),
    Gradient(GradientId),
}

impl StoredBackground {
    pub fn asset(&self) -> Option<&AssetReference> {
        match self {
            Self::Asset(r) => Some(r),
            _ => None,
        }
    }

    /// What an editor would show for this entry before any asset is resolved.
    pub fn as_spec(&self) -> BackgroundSpec {
        match self {
            Self::Gradient(id) => BackgroundSpec::Gradient(*id),
            Self::Empty | Self::Asset(_) => BackgroundSpec::None,
        }
    }
}

/// A record as submitted, before the store assigns an id.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NewEntry {
    pub content: CardContent,
    pub background: StoredBackground,
    pub creator_name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CommunityEntry {
    pub id: String,
    pub content: CardContent,
    pub background: StoredBackground,
    pub creator_name: String,
    pub like_count: u64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl CommunityEntry {
    pub fn from_new(id: impl Into<String>, entry: NewEntry) -> Self {
        Self {
            id: id.into(),
            content: entry.content,
            background: entry.background,
            creator_name: entry.creator_name,
            like_count: 0,
            created_at: entry.created_at,
        }
    }

    /// Lyric title, empty for code entries.
    pub fn title(&self) -> &str {
        match &self.content {
            CardContent::Lyric(f) => &f.title,
            CardContent::Code(_) => "",
        }
    }
}

/// Blob storage for uploaded backgrounds.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store a data URI under `path` and return the stored path.
    async fn put(&self, path: &str, image: &EncodedImage) -> LyricodeResult<String>;

    /// Fetchable URL for `path`, `None` when nothing is stored there.
    async fn url_for(&self, path: &str) -> LyricodeResult<Option<String>>;
}

/// The community record collection.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create(&self, entry: NewEntry) -> LyricodeResult<String>;

    /// All entries in store order.
    async fn list(&self) -> LyricodeResult<Vec<CommunityEntry>>;

    async fn get(&self, id: &str) -> LyricodeResult<Option<CommunityEntry>>;

    /// Atomically bump `like_count` by one. Fails when `id` does not exist.
    async fn increment_likes(&self, id: &str) -> LyricodeResult<()>;
}
