use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::{
    assets::data_uri::EncodedImage,
    foundation::error::{LyricodeError, LyricodeResult},
    remote::{CommunityEntry, NewEntry, ObjectStore, RecordStore},
};

/// Normalize and validate store-relative object paths.
///
/// The result uses `/` separators, drops `.` segments, and rejects absolute paths or parent
/// traversals (`..`).
pub fn normalize_rel_path(source: &str) -> LyricodeResult<String> {
    let s = source.replace('\\', "/");
    if s.starts_with('/') {
        return Err(LyricodeError::validation("object paths must be relative"));
    }

    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return Err(LyricodeError::validation("object paths must not contain '..'"));
        }
        out.push(part);
    }

    if out.is_empty() {
        return Err(LyricodeError::validation("object path must contain a name"));
    }
    Ok(out.join("/"))
}

/// Objects stored as decoded files under a base directory, served as `file://` URLs.
#[derive(Clone, Debug)]
pub struct FsObjectStore {
    base_path: PathBuf,
}

impl FsObjectStore {
    pub async fn new(base_path: impl Into<PathBuf>) -> LyricodeResult<Self> {
        let base_path = base_path.into();
        tokio::fs::create_dir_all(&base_path).await.map_err(|e| {
            LyricodeError::persistence(format!(
                "create object dir '{}': {e}",
                base_path.display()
            ))
        })?;
        let base_path = tokio::fs::canonicalize(&base_path)
            .await
            .map_err(|e| LyricodeError::persistence(format!("resolve object dir: {e}")))?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn file_path(&self, path: &str) -> LyricodeResult<PathBuf> {
        Ok(self.base_path.join(normalize_rel_path(path)?))
    }

    /// Local file behind a URL this store handed out.
    pub fn path_for_url(&self, url: &str) -> Option<PathBuf> {
        let p = PathBuf::from(url.strip_prefix("file://")?);
        p.starts_with(&self.base_path).then_some(p)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, path: &str, image: &EncodedImage) -> LyricodeResult<String> {
        let dest = self.file_path(path)?;
        let bytes = image.decode_bytes()?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LyricodeError::persistence(format!("create object dir: {e}")))?;
        }
        tokio::fs::write(&dest, bytes)
            .await
            .map_err(|e| LyricodeError::persistence(format!("write object '{path}': {e}")))?;
        tracing::debug!(path, dest = %dest.display(), "object stored");
        Ok(path.to_owned())
    }

    async fn url_for(&self, path: &str) -> LyricodeResult<Option<String>> {
        let file = self.file_path(path)?;
        match tokio::fs::try_exists(&file).await {
            Ok(true) => Ok(Some(format!("file://{}", file.display()))),
            Ok(false) => Ok(None),
            Err(e) => Err(LyricodeError::persistence(format!(
                "stat object '{path}': {e}"
            ))),
        }
    }
}

/// Records kept as one JSON array on disk.
///
/// Every mutation is a read-modify-write under a single async lock, which makes
/// `increment_likes` atomic with respect to this process.
#[derive(Debug)]
pub struct FsRecordStore {
    file: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl FsRecordStore {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    async fn load(&self) -> LyricodeResult<Vec<CommunityEntry>> {
        match tokio::fs::read(&self.file).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(LyricodeError::persistence(format!(
                "read records '{}': {e}",
                self.file.display()
            ))),
        }
    }

    async fn store(&self, records: &[CommunityEntry]) -> LyricodeResult<()> {
        if let Some(parent) = self.file.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LyricodeError::persistence(format!("create record dir: {e}")))?;
        }
        let json = serde_json::to_vec_pretty(records)?;
        tokio::fs::write(&self.file, json).await.map_err(|e| {
            LyricodeError::persistence(format!("write records '{}': {e}", self.file.display()))
        })
    }
}

#[async_trait]
impl RecordStore for FsRecordStore {
    async fn create(&self, entry: NewEntry) -> LyricodeResult<String> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        let id = uuid::Uuid::new_v4().to_string();
        records.push(CommunityEntry::from_new(id.clone(), entry));
        self.store(&records).await?;
        Ok(id)
    }

    async fn list(&self) -> LyricodeResult<Vec<CommunityEntry>> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    async fn get(&self, id: &str) -> LyricodeResult<Option<CommunityEntry>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.into_iter().find(|e| e.id == id))
    }

    async fn increment_likes(&self, id: &str) -> LyricodeResult<()> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        let entry = records
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| LyricodeError::persistence(format!("no record '{id}'")))?;
        entry.like_count += 1;
        self.store(&records).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        card::{CardContent, LyricFields},
        remote::StoredBackground,
    };

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "lyricode-fs-{name}-{}",
            uuid::Uuid::new_v4().simple()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn rel_paths_are_normalized() {
        assert_eq!(normalize_rel_path("a/./b").unwrap(), "a/b");
        assert_eq!(normalize_rel_path("a\\b").unwrap(), "a/b");
        assert!(normalize_rel_path("/etc/passwd").is_err());
        assert!(normalize_rel_path("a/../b").is_err());
        assert!(normalize_rel_path("").is_err());
    }

    #[tokio::test]
    async fn objects_round_trip_to_file_urls() {
        let dir = temp_dir("objects");
        let store = FsObjectStore::new(&dir).await.unwrap();
        let img = EncodedImage::from_bytes("image/png", &[1, 2, 3]);

        store.put("backgrounds/42", &img).await.unwrap();
        let url = store.url_for("backgrounds/42").await.unwrap().unwrap();
        let file = store.path_for_url(&url).unwrap();
        assert_eq!(std::fs::read(file).unwrap(), vec![1, 2, 3]);
        assert_eq!(store.url_for("backgrounds/43").await.unwrap(), None);
        assert!(store.put("../escape", &img).await.is_err());
    }

    #[tokio::test]
    async fn records_persist_and_count_likes() {
        let dir = temp_dir("records");
        let file = dir.join("records.json");
        let store = FsRecordStore::new(&file);
        assert!(store.list().await.unwrap().is_empty());

        let id = store
            .create(NewEntry {
                content: CardContent::Lyric(LyricFields::default()),
                background: StoredBackground::Empty,
                creator_name: "ana".into(),
                created_at: chrono::Utc::now(),
            })
            .await
            .unwrap();
        store.increment_likes(&id).await.unwrap();
        store.increment_likes(&id).await.unwrap();

        let reopened = FsRecordStore::new(&file);
        assert_eq!(reopened.get(&id).await.unwrap().unwrap().like_count, 2);
        assert!(reopened.increment_likes("missing").await.is_err());
    }
}
