//! File-backed document store.
//!
//! Documents live in a [`MemoryBackend`]; after every successful mutation
//! the affected collection is written to `<dir>/<collection>.json`. Files are
//! replaced atomically (write to a temporary file, then rename), so a crash
//! leaves either the old or the new snapshot on disk.
//!
//! ```text
//! store_dir/
//! ├── sensors.json            <- page documents of collection "sensors"
//! └── sensors_cursors.json    <- cursor documents
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Backend, CursorAdvance, MemoryBackend};
use crate::error::{BackendError, BackendResult};
use crate::model::{Cursor, Page, PageId, SeriesKey};

/// Extension of collection files.
const COLLECTION_EXTENSION: &str = "json";

/// On-disk representation of one collection.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", content = "documents", rename_all = "snake_case")]
enum CollectionFile<K> {
    Cursors(Vec<Cursor<K>>),
    Pages(Vec<Page<K>>),
}

/// A [`MemoryBackend`] persisted to a directory of JSON files.
pub struct FileBackend<K> {
    dir: PathBuf,
    inner: MemoryBackend<K>,
    /// Serializes snapshot writes so the newest snapshot always lands last.
    flush_lock: Mutex<()>,
}

impl<K> fmt::Debug for FileBackend<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileBackend")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

impl<K: SeriesKey> FileBackend<K> {
    /// Opens the store in `dir`, creating the directory if needed and
    /// loading every collection file found there.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Io`] if the directory cannot be created or
    /// read, and [`BackendError::Serialize`] if a collection file is corrupt.
    pub fn open<P: AsRef<Path>>(dir: P) -> BackendResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| io_error(&dir, e))?;

        let backend = Self {
            inner: MemoryBackend::new(),
            flush_lock: Mutex::new(()),
            dir,
        };
        backend.load_all()?;
        Ok(backend)
    }

    /// Directory holding the collection files.
    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn load_all(&self) -> BackendResult<()> {
        let entries = fs::read_dir(&self.dir).map_err(|e| io_error(&self.dir, e))?;
        for entry in entries {
            let path = entry.map_err(|e| io_error(&self.dir, e))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(COLLECTION_EXTENSION) {
                continue;
            }
            let Some(collection) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            let json = fs::read_to_string(&path).map_err(|e| io_error(&path, e))?;
            let file: CollectionFile<K> =
                serde_json::from_str(&json).map_err(|source| BackendError::Serialize {
                    collection: collection.to_string(),
                    source,
                })?;

            match file {
                CollectionFile::Cursors(documents) => {
                    debug!(collection, count = documents.len(), "loaded cursor collection");
                    self.inner.restore_cursors(collection, documents)?;
                }
                CollectionFile::Pages(documents) => {
                    debug!(collection, count = documents.len(), "loaded page collection");
                    self.inner.restore_pages(collection, documents)?;
                }
            }
        }
        Ok(())
    }

    fn collection_path(&self, collection: &str) -> BackendResult<PathBuf> {
        let valid = !collection.is_empty()
            && collection
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
            && !collection.starts_with('.');
        if !valid {
            return Err(BackendError::InvalidName {
                name: collection.to_string(),
            });
        }
        Ok(self
            .dir
            .join(format!("{collection}.{COLLECTION_EXTENSION}")))
    }

    fn flush_cursors(&self, collection: &str) -> BackendResult<()> {
        let path = self.collection_path(collection)?;
        let _guard = self.flush_lock.lock().map_err(|_| BackendError::Poisoned)?;
        let file = CollectionFile::Cursors(self.inner.snapshot_cursors(collection)?);
        write_atomic(&path, collection, &file)
    }

    fn flush_pages(&self, collection: &str) -> BackendResult<()> {
        let path = self.collection_path(collection)?;
        let _guard = self.flush_lock.lock().map_err(|_| BackendError::Poisoned)?;
        let file = CollectionFile::Pages(self.inner.snapshot_pages(collection)?);
        write_atomic(&path, collection, &file)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> BackendError {
    BackendError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn write_atomic<K: SeriesKey>(
    path: &Path,
    collection: &str,
    file: &CollectionFile<K>,
) -> BackendResult<()> {
    let json = serde_json::to_vec(file).map_err(|source| BackendError::Serialize {
        collection: collection.to_string(),
        source,
    })?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|e| io_error(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| io_error(path, e))
}

impl<K: SeriesKey> Backend<K> for FileBackend<K> {
    fn insert_cursor(&self, collection: &str, cursor: Cursor<K>) -> BackendResult<()> {
        self.collection_path(collection)?;
        self.inner.insert_cursor(collection, cursor)?;
        self.flush_cursors(collection)
    }

    fn find_cursor(&self, collection: &str, series_id: &K) -> BackendResult<Option<Cursor<K>>> {
        self.inner.find_cursor(collection, series_id)
    }

    fn advance_cursor(
        &self,
        collection: &str,
        series_id: &K,
        advance: CursorAdvance,
    ) -> BackendResult<Option<Cursor<K>>> {
        let cursor = self.inner.advance_cursor(collection, series_id, advance)?;
        if cursor.is_some() {
            self.flush_cursors(collection)?;
        }
        Ok(cursor)
    }

    fn set_cursor_page(
        &self,
        collection: &str,
        series_id: &K,
        page_id: PageId,
        next_slot: i64,
    ) -> BackendResult<bool> {
        let updated = self
            .inner
            .set_cursor_page(collection, series_id, page_id, next_slot)?;
        if updated {
            self.flush_cursors(collection)?;
        }
        Ok(updated)
    }

    fn set_cursor_value(
        &self,
        collection: &str,
        series_id: &K,
        timestamp: u64,
        value: Vec<u8>,
    ) -> BackendResult<bool> {
        let updated = self
            .inner
            .set_cursor_value(collection, series_id, timestamp, value)?;
        if updated {
            self.flush_cursors(collection)?;
        }
        Ok(updated)
    }

    fn list_cursors(&self, collection: &str) -> BackendResult<Vec<K>> {
        self.inner.list_cursors(collection)
    }

    fn insert_page(&self, collection: &str, page: Page<K>) -> BackendResult<()> {
        self.collection_path(collection)?;
        self.inner.insert_page(collection, page)?;
        self.flush_pages(collection)
    }

    fn find_page(&self, collection: &str, page_id: &PageId) -> BackendResult<Option<Page<K>>> {
        self.inner.find_page(collection, page_id)
    }

    fn close_page(
        &self,
        collection: &str,
        page_id: &PageId,
        end_time: u64,
    ) -> BackendResult<Option<Page<K>>> {
        let before = self.inner.close_page(collection, page_id, end_time)?;
        if before.is_some() {
            self.flush_pages(collection)?;
        }
        Ok(before)
    }

    fn write_slot(
        &self,
        collection: &str,
        page_id: &PageId,
        slot: usize,
        timestamp: u64,
        value: Vec<u8>,
    ) -> BackendResult<bool> {
        let written = self
            .inner
            .write_slot(collection, page_id, slot, timestamp, value)?;
        if written {
            self.flush_pages(collection)?;
        }
        Ok(written)
    }

    fn set_slot_value(
        &self,
        collection: &str,
        page_id: &PageId,
        slot: usize,
        timestamp: u64,
        value: Vec<u8>,
    ) -> BackendResult<bool> {
        let updated = self
            .inner
            .set_slot_value(collection, page_id, slot, timestamp, value)?;
        if updated {
            self.flush_pages(collection)?;
        }
        Ok(updated)
    }

    fn find_pages(
        &self,
        collection: &str,
        series_id: &K,
        min_time: u64,
        max_time: u64,
    ) -> BackendResult<Vec<Page<K>>> {
        self.inner
            .find_pages(collection, series_id, min_time, max_time)
    }
}
