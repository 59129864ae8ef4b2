use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;

use crate::{
    assets::data_uri::EncodedImage,
    foundation::error::{LyricodeError, LyricodeResult},
    remote::{CommunityEntry, NewEntry, ObjectStore, RecordStore},
};

/// In-process object store. Counts round trips so callers can assert on them.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, EncodedImage>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent `put` fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn get(&self, path: &str) -> Option<EncodedImage> {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(path)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, path: &str, image: &EncodedImage) -> LyricodeResult<String> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(LyricodeError::persistence("object store rejected write"));
        }
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.to_owned(), image.clone());
        Ok(path.to_owned())
    }

    async fn url_for(&self, path: &str) -> LyricodeResult<Option<String>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let found = self
            .objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(path);
        Ok(found.then(|| format!("memory://{path}")))
    }
}

/// In-process record collection, kept in insertion order.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<Vec<CommunityEntry>>,
    lists: AtomicUsize,
    fail_creates: AtomicBool,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `list` calls served.
    pub fn lists(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    /// Insert a fully-formed entry, bypassing id generation.
    pub fn seed(&self, entry: CommunityEntry) {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry);
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create(&self, entry: NewEntry) -> LyricodeResult<String> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(LyricodeError::persistence("record store rejected create"));
        }
        let id = uuid::Uuid::new_v4().to_string();
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(CommunityEntry::from_new(id.clone(), entry));
        Ok(id)
    }

    async fn list(&self) -> LyricodeResult<Vec<CommunityEntry>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    async fn get(&self, id: &str) -> LyricodeResult<Option<CommunityEntry>> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|e| e.id == id)
            .cloned())
    }

    async fn increment_likes(&self, id: &str) -> LyricodeResult<()> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let entry = records
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| LyricodeError::persistence(format!("no record '{id}'")))?;
        entry.like_count += 1;
        Ok(())
    }
}
