//! In-memory backing store.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{Backend, CursorAdvance};
use crate::error::{BackendError, BackendResult};
use crate::model::{Cursor, Page, PageId, SeriesKey};

type CursorCollections<K> = HashMap<String, BTreeMap<K, Cursor<K>>>;
type PageCollections<K> = HashMap<String, HashMap<PageId, Page<K>>>;

/// Documents held in process memory.
///
/// Every single-document operation runs under one write lock, which makes it
/// atomic with respect to all other operations on the same backend.
pub struct MemoryBackend<K> {
    cursors: RwLock<CursorCollections<K>>,
    pages: RwLock<PageCollections<K>>,
}

impl<K> fmt::Debug for MemoryBackend<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryBackend").finish_non_exhaustive()
    }
}

impl<K: SeriesKey> Default for MemoryBackend<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: SeriesKey> MemoryBackend<K> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            cursors: RwLock::new(HashMap::new()),
            pages: RwLock::new(HashMap::new()),
        }
    }

    fn read_cursors(&self) -> BackendResult<RwLockReadGuard<'_, CursorCollections<K>>> {
        self.cursors.read().map_err(|_| BackendError::Poisoned)
    }

    fn write_cursors(&self) -> BackendResult<RwLockWriteGuard<'_, CursorCollections<K>>> {
        self.cursors.write().map_err(|_| BackendError::Poisoned)
    }

    fn read_pages(&self) -> BackendResult<RwLockReadGuard<'_, PageCollections<K>>> {
        self.pages.read().map_err(|_| BackendError::Poisoned)
    }

    fn write_pages(&self) -> BackendResult<RwLockWriteGuard<'_, PageCollections<K>>> {
        self.pages.write().map_err(|_| BackendError::Poisoned)
    }

    /// Applies `f` to one cursor under the write lock.
    fn modify_cursor<T>(
        &self,
        collection: &str,
        series_id: &K,
        f: impl FnOnce(&mut Cursor<K>) -> Option<T>,
    ) -> BackendResult<Option<T>> {
        let mut cursors = self.write_cursors()?;
        Ok(cursors
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(series_id))
            .and_then(f))
    }

    /// Applies `f` to one page under the write lock.
    fn modify_page<T>(
        &self,
        collection: &str,
        page_id: &PageId,
        f: impl FnOnce(&mut Page<K>) -> BackendResult<T>,
    ) -> BackendResult<Option<T>> {
        let mut pages = self.write_pages()?;
        match pages.get_mut(collection).and_then(|docs| docs.get_mut(page_id)) {
            Some(page) => f(page).map(Some),
            None => Ok(None),
        }
    }

    /// Copies all cursors of a collection, in key order.
    pub(crate) fn snapshot_cursors(&self, collection: &str) -> BackendResult<Vec<Cursor<K>>> {
        let cursors = self.read_cursors()?;
        Ok(cursors
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }

    /// Copies all pages of a collection, ordered by series then start time.
    pub(crate) fn snapshot_pages(&self, collection: &str) -> BackendResult<Vec<Page<K>>> {
        let pages = self.read_pages()?;
        let mut snapshot: Vec<Page<K>> = pages
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default();
        snapshot.sort_by(|a, b| {
            a.series_id
                .cmp(&b.series_id)
                .then(a.start_time.cmp(&b.start_time))
                .then(a.sequence.cmp(&b.sequence))
                .then(a.page_id.cmp(&b.page_id))
        });
        Ok(snapshot)
    }

    /// Replaces the cursors of a collection.
    pub(crate) fn restore_cursors(
        &self,
        collection: &str,
        documents: Vec<Cursor<K>>,
    ) -> BackendResult<()> {
        let docs = documents
            .into_iter()
            .map(|cursor| (cursor.series_id.clone(), cursor))
            .collect();
        self.write_cursors()?.insert(collection.to_string(), docs);
        Ok(())
    }

    /// Replaces the pages of a collection.
    pub(crate) fn restore_pages(
        &self,
        collection: &str,
        documents: Vec<Page<K>>,
    ) -> BackendResult<()> {
        let docs = documents
            .into_iter()
            .map(|page| (page.page_id, page))
            .collect();
        self.write_pages()?.insert(collection.to_string(), docs);
        Ok(())
    }
}

impl<K: SeriesKey> Backend<K> for MemoryBackend<K> {
    fn insert_cursor(&self, collection: &str, cursor: Cursor<K>) -> BackendResult<()> {
        let mut cursors = self.write_cursors()?;
        let docs = cursors.entry(collection.to_string()).or_default();
        if docs.contains_key(&cursor.series_id) {
            return Err(BackendError::DuplicateKey {
                collection: collection.to_string(),
            });
        }
        docs.insert(cursor.series_id.clone(), cursor);
        Ok(())
    }

    fn find_cursor(&self, collection: &str, series_id: &K) -> BackendResult<Option<Cursor<K>>> {
        let cursors = self.read_cursors()?;
        Ok(cursors
            .get(collection)
            .and_then(|docs| docs.get(series_id))
            .cloned())
    }

    fn advance_cursor(
        &self,
        collection: &str,
        series_id: &K,
        advance: CursorAdvance,
    ) -> BackendResult<Option<Cursor<K>>> {
        self.modify_cursor(collection, series_id, |cursor| {
            if cursor.last_value_time >= advance.timestamp {
                return None;
            }
            cursor.last_value = advance.value;
            cursor.last_value_time = advance.timestamp;
            cursor.next_slot -= 1;
            Some(cursor.clone())
        })
    }

    fn set_cursor_page(
        &self,
        collection: &str,
        series_id: &K,
        page_id: PageId,
        next_slot: i64,
    ) -> BackendResult<bool> {
        let updated = self.modify_cursor(collection, series_id, |cursor| {
            cursor.last_page = Some(page_id);
            cursor.next_slot = next_slot;
            Some(())
        })?;
        Ok(updated.is_some())
    }

    fn set_cursor_value(
        &self,
        collection: &str,
        series_id: &K,
        timestamp: u64,
        value: Vec<u8>,
    ) -> BackendResult<bool> {
        let updated = self.modify_cursor(collection, series_id, |cursor| {
            if cursor.last_value_time != timestamp {
                return None;
            }
            cursor.last_value = value;
            Some(())
        })?;
        Ok(updated.is_some())
    }

    fn list_cursors(&self, collection: &str) -> BackendResult<Vec<K>> {
        let cursors = self.read_cursors()?;
        Ok(cursors
            .get(collection)
            .map(|docs| docs.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn insert_page(&self, collection: &str, page: Page<K>) -> BackendResult<()> {
        let mut pages = self.write_pages()?;
        let docs = pages.entry(collection.to_string()).or_default();
        if docs.contains_key(&page.page_id) {
            return Err(BackendError::DuplicateKey {
                collection: collection.to_string(),
            });
        }
        docs.insert(page.page_id, page);
        Ok(())
    }

    fn find_page(&self, collection: &str, page_id: &PageId) -> BackendResult<Option<Page<K>>> {
        let pages = self.read_pages()?;
        Ok(pages
            .get(collection)
            .and_then(|docs| docs.get(page_id))
            .cloned())
    }

    fn close_page(
        &self,
        collection: &str,
        page_id: &PageId,
        end_time: u64,
    ) -> BackendResult<Option<Page<K>>> {
        self.modify_page(collection, page_id, |page| {
            let before = page.clone();
            page.end_time = end_time;
            Ok(before)
        })
    }

    fn write_slot(
        &self,
        collection: &str,
        page_id: &PageId,
        slot: usize,
        timestamp: u64,
        value: Vec<u8>,
    ) -> BackendResult<bool> {
        let written = self.modify_page(collection, page_id, |page| {
            let capacity = page.slots.len();
            let target = page
                .slots
                .get_mut(slot)
                .ok_or_else(|| BackendError::InvariantViolation {
                    reason: format!("slot {slot} outside page {page_id} of {capacity} slots"),
                })?;
            target.timestamp = timestamp;
            target.value = value;
            // a late write must not pull back a boundary set by a rollover
            page.end_time = page.end_time.max(timestamp);
            page.padding = None;
            Ok(())
        })?;
        Ok(written.is_some())
    }

    fn set_slot_value(
        &self,
        collection: &str,
        page_id: &PageId,
        slot: usize,
        timestamp: u64,
        value: Vec<u8>,
    ) -> BackendResult<bool> {
        let updated = self.modify_page(collection, page_id, |page| {
            match page.slots.get_mut(slot) {
                Some(target) if target.timestamp == timestamp => {
                    target.value = value;
                    Ok(true)
                }
                _ => Ok(false),
            }
        })?;
        Ok(updated.unwrap_or(false))
    }

    fn find_pages(
        &self,
        collection: &str,
        series_id: &K,
        min_time: u64,
        max_time: u64,
    ) -> BackendResult<Vec<Page<K>>> {
        let pages = self.read_pages()?;
        let mut found: Vec<Page<K>> = pages
            .get(collection)
            .map(|docs| {
                docs.values()
                    .filter(|page| {
                        &page.series_id == series_id
                            && page.start_time <= max_time
                            && page.end_time >= min_time
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        found.sort_by_key(|page| (page.start_time, page.sequence, page.page_id));
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CURSORS: &str = "test_cursors";
    const PAGES: &str = "test";

    fn backend_with_series(series: &str) -> MemoryBackend<String> {
        let backend = MemoryBackend::new();
        backend
            .insert_cursor(CURSORS, Cursor::new(series.to_string()))
            .unwrap();
        backend
    }

    fn advance(timestamp: u64) -> CursorAdvance {
        CursorAdvance {
            timestamp,
            value: vec![1],
        }
    }

    #[test]
    fn test_insert_cursor_rejects_duplicates() {
        let backend = backend_with_series("a");
        let err = backend
            .insert_cursor(CURSORS, Cursor::new("a".to_string()))
            .unwrap_err();
        assert!(matches!(err, BackendError::DuplicateKey { .. }));
    }

    #[test]
    fn test_collections_are_independent() {
        let backend = backend_with_series("a");
        assert!(backend.find_cursor(CURSORS, &"a".to_string()).unwrap().is_some());
        assert!(backend.find_cursor("other_cursors", &"a".to_string()).unwrap().is_none());
        backend
            .insert_cursor("other_cursors", Cursor::new("a".to_string()))
            .unwrap();
    }

    #[test]
    fn test_advance_cursor_requires_newer_timestamp() {
        let backend = backend_with_series("a");
        let key = "a".to_string();

        let cursor = backend.advance_cursor(CURSORS, &key, advance(10)).unwrap().unwrap();
        assert_eq!(cursor.next_slot, -1);
        assert_eq!(cursor.last_value_time, 10);

        assert!(backend.advance_cursor(CURSORS, &key, advance(10)).unwrap().is_none());
        assert!(backend.advance_cursor(CURSORS, &key, advance(5)).unwrap().is_none());

        let unchanged = backend.find_cursor(CURSORS, &key).unwrap().unwrap();
        assert_eq!(unchanged, cursor);
    }

    #[test]
    fn test_advance_cursor_zero_timestamp_never_matches() {
        let backend = backend_with_series("a");
        assert!(backend
            .advance_cursor(CURSORS, &"a".to_string(), advance(0))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_advance_missing_cursor() {
        let backend = MemoryBackend::<String>::new();
        assert!(backend
            .advance_cursor(CURSORS, &"a".to_string(), advance(1))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_set_cursor_value_is_conditional() {
        let backend = backend_with_series("a");
        let key = "a".to_string();
        backend.advance_cursor(CURSORS, &key, advance(10)).unwrap();

        assert!(!backend.set_cursor_value(CURSORS, &key, 9, vec![2]).unwrap());
        assert!(backend.set_cursor_value(CURSORS, &key, 10, vec![2]).unwrap());
        let cursor = backend.find_cursor(CURSORS, &key).unwrap().unwrap();
        assert_eq!(cursor.last_value, vec![2]);
    }

    #[test]
    fn test_close_page_returns_previous_document() {
        let backend = MemoryBackend::new();
        let page = Page::new("a".to_string(), 5, 7, 2, 0);
        let id = page.page_id;
        backend.insert_page(PAGES, page).unwrap();

        let before = backend.close_page(PAGES, &id, 20).unwrap().unwrap();
        assert_eq!(before.end_time, 7);
        assert_eq!(backend.find_page(PAGES, &id).unwrap().unwrap().end_time, 20);
        assert!(backend.close_page(PAGES, &PageId::generate(), 1).unwrap().is_none());
    }

    #[test]
    fn test_write_slot_clears_padding() {
        let backend = MemoryBackend::new();
        let page = Page::new("a".to_string(), 5, 5, 3, 40);
        let id = page.page_id;
        backend.insert_page(PAGES, page).unwrap();

        assert!(backend.write_slot(PAGES, &id, 2, 5, vec![9]).unwrap());
        let page = backend.find_page(PAGES, &id).unwrap().unwrap();
        assert_eq!(page.slots[2].timestamp, 5);
        assert_eq!(page.slots[2].value, vec![9]);
        assert!(page.padding.is_none());

        let err = backend.write_slot(PAGES, &id, 3, 6, vec![9]).unwrap_err();
        assert!(matches!(err, BackendError::InvariantViolation { .. }));
        assert!(!backend.write_slot(PAGES, &PageId::generate(), 0, 6, vec![9]).unwrap());
    }

    #[test]
    fn test_late_write_keeps_closed_boundary() {
        let backend = MemoryBackend::new();
        let page = Page::new("a".to_string(), 5, 5, 3, 0);
        let id = page.page_id;
        backend.insert_page(PAGES, page).unwrap();

        backend.close_page(PAGES, &id, 30).unwrap();
        backend.write_slot(PAGES, &id, 0, 20, vec![1]).unwrap();
        assert_eq!(backend.find_page(PAGES, &id).unwrap().unwrap().end_time, 30);
    }

    #[test]
    fn test_set_slot_value_checks_timestamp() {
        let backend = MemoryBackend::new();
        let page = Page::new("a".to_string(), 5, 5, 2, 0);
        let id = page.page_id;
        backend.insert_page(PAGES, page).unwrap();
        backend.write_slot(PAGES, &id, 1, 5, vec![1]).unwrap();

        assert!(!backend.set_slot_value(PAGES, &id, 1, 6, vec![2]).unwrap());
        assert!(!backend.set_slot_value(PAGES, &id, 7, 5, vec![2]).unwrap());
        assert!(backend.set_slot_value(PAGES, &id, 1, 5, vec![2]).unwrap());
        assert_eq!(backend.find_page(PAGES, &id).unwrap().unwrap().slots[1].value, vec![2]);
    }

    #[test]
    fn test_find_pages_filters_and_sorts() {
        let backend = MemoryBackend::new();
        for (start, end) in [(30, 40), (10, 20), (20, 30)] {
            backend
                .insert_page(PAGES, Page::new("a".to_string(), start, end, 1, 0))
                .unwrap();
        }
        backend
            .insert_page(PAGES, Page::new("b".to_string(), 10, 40, 1, 0))
            .unwrap();

        let key = "a".to_string();
        let starts: Vec<u64> = backend
            .find_pages(PAGES, &key, 0, u64::MAX)
            .unwrap()
            .iter()
            .map(|page| page.start_time)
            .collect();
        assert_eq!(starts, vec![10, 20, 30]);

        let starts: Vec<u64> = backend
            .find_pages(PAGES, &key, 21, 29)
            .unwrap()
            .iter()
            .map(|page| page.start_time)
            .collect();
        assert_eq!(starts, vec![20]);

        // boundaries are inclusive on both sides
        assert_eq!(backend.find_pages(PAGES, &key, 20, 20).unwrap().len(), 2);
        assert!(backend.find_pages(PAGES, &key, 41, 50).unwrap().is_empty());
    }

    #[test]
    fn test_equal_start_pages_sorted_by_sequence() {
        let backend = MemoryBackend::new();
        // inserted newest first so map order cannot line up by accident
        for sequence in (0..8u64).rev() {
            let page = Page::new("a".to_string(), 10, 10 + sequence, 1, 0).with_sequence(sequence);
            backend.insert_page(PAGES, page).unwrap();
        }

        let key = "a".to_string();
        let order: Vec<u64> = backend
            .find_pages(PAGES, &key, 0, u64::MAX)
            .unwrap()
            .iter()
            .map(|page| page.sequence)
            .collect();
        assert_eq!(order, (0..8).collect::<Vec<_>>());

        let snapshot: Vec<u64> = backend
            .snapshot_pages(PAGES)
            .unwrap()
            .iter()
            .map(|page| page.sequence)
            .collect();
        assert_eq!(snapshot, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_list_cursors_in_key_order() {
        let backend = MemoryBackend::new();
        for key in ["c", "a", "b"] {
            backend.insert_cursor(CURSORS, Cursor::new(key.to_string())).unwrap();
        }
        assert_eq!(backend.list_cursors(CURSORS).unwrap(), vec!["a", "b", "c"]);
        assert!(backend.list_cursors("missing").unwrap().is_empty());
    }
}
