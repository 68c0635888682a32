//! Series cursor store.
//!
//! One cursor document per series, in the `<name>_cursors` collection. The
//! cursor is the head of the series: it caches the newest entry, points at
//! the open page, and counts down the slots left in it. Its conditional
//! [`advance`](CursorStore::advance) is the single point where concurrent
//! appends to the same series are ordered.

use std::marker::PhantomData;

use tracing::trace;

use crate::backend::{Backend, CursorAdvance};
use crate::error::{BackendError, FolioError, Result, SeriesError};
use crate::model::{Cursor, PageId, SeriesKey};

/// View of the cursor collection of one time-series collection.
pub struct CursorStore<'a, K, B> {
    backend: &'a B,
    collection: &'a str,
    _key: PhantomData<fn() -> K>,
}

impl<'a, K, B> CursorStore<'a, K, B>
where
    K: SeriesKey,
    B: Backend<K>,
{
    /// Creates a view of `collection` in `backend`.
    pub fn new(backend: &'a B, collection: &'a str) -> Self {
        Self {
            backend,
            collection,
            _key: PhantomData,
        }
    }

    /// Inserts the cursor of a new, empty series.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::DuplicateSeries`] if the series exists.
    pub fn create(&self, series_id: &K) -> Result<()> {
        match self
            .backend
            .insert_cursor(self.collection, Cursor::new(series_id.clone()))
        {
            Ok(()) => Ok(()),
            Err(BackendError::DuplicateKey { .. }) => Err(SeriesError::DuplicateSeries.into()),
            Err(e) => Err(FolioError::backend("creating series cursor", e)),
        }
    }

    /// Reads the cursor of a series.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::NotFound`] if the series does not exist.
    pub fn get(&self, series_id: &K) -> Result<Cursor<K>> {
        self.backend
            .find_cursor(self.collection, series_id)
            .map_err(|e| FolioError::backend("reading series cursor", e))?
            .ok_or_else(|| SeriesError::NotFound.into())
    }

    /// Accepts `timestamp` as the newest entry of the series.
    ///
    /// Succeeds only if the stored last time is strictly older than
    /// `timestamp`; returns the cursor after the update.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::NotFoundOrStale`] if the series does not exist
    /// or `timestamp` is not newer than the last accepted entry.
    pub fn advance(&self, series_id: &K, timestamp: u64, value: Vec<u8>) -> Result<Cursor<K>> {
        let advanced = self
            .backend
            .advance_cursor(
                self.collection,
                series_id,
                CursorAdvance { timestamp, value },
            )
            .map_err(|e| FolioError::backend("updating series cursor", e))?;

        match advanced {
            Some(cursor) => Ok(cursor),
            None => {
                trace!(?series_id, timestamp, "cursor update matched nothing");
                Err(SeriesError::NotFoundOrStale.into())
            }
        }
    }

    /// Points the cursor at a freshly created page.
    ///
    /// # Errors
    ///
    /// Returns an invariant violation if the cursor vanished since it was
    /// advanced.
    pub fn attach_page(&self, series_id: &K, page_id: PageId, next_slot: i64) -> Result<()> {
        let updated = self
            .backend
            .set_cursor_page(self.collection, series_id, page_id, next_slot)
            .map_err(|e| FolioError::backend("updating series cursor", e))?;

        if !updated {
            return Err(FolioError::backend(
                "updating series cursor",
                BackendError::InvariantViolation {
                    reason: format!("cursor of series {series_id:?} disappeared during rollover"),
                },
            ));
        }
        Ok(())
    }

    /// Replaces the cached value if the cursor still caches `timestamp`.
    ///
    /// Returns `false` when a newer entry has been accepted in the meantime.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn refresh_value(&self, series_id: &K, timestamp: u64, value: Vec<u8>) -> Result<bool> {
        self.backend
            .set_cursor_value(self.collection, series_id, timestamp, value)
            .map_err(|e| FolioError::backend("updating cached value", e))
    }

    /// Lists every series id.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn list(&self) -> Result<Vec<K>> {
        self.backend
            .list_cursors(self.collection)
            .map_err(|e| FolioError::backend("listing series cursors", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    const COLLECTION: &str = "readings_cursors";

    #[test]
    fn test_create_and_get() {
        let backend = MemoryBackend::new();
        let store = CursorStore::new(&backend, COLLECTION);
        let key = "pump-1".to_string();

        store.create(&key).unwrap();
        let cursor = store.get(&key).unwrap();
        assert_eq!(cursor.series_id, key);
        assert_eq!(cursor.next_slot, 0);
        assert!(!cursor.has_data());
    }

    #[test]
    fn test_create_duplicate() {
        let backend = MemoryBackend::new();
        let store = CursorStore::new(&backend, COLLECTION);
        store.create(&1u32).unwrap();

        let err = store.create(&1u32).unwrap_err();
        assert!(err.is_duplicate());
    }

    #[test]
    fn test_get_missing() {
        let backend = MemoryBackend::<u32>::new();
        let store = CursorStore::new(&backend, COLLECTION);
        assert!(store.get(&1).unwrap_err().is_not_found());
    }

    #[test]
    fn test_advance_stale_and_missing_are_the_same_error() {
        let backend = MemoryBackend::new();
        let store = CursorStore::new(&backend, COLLECTION);
        store.create(&1u32).unwrap();
        store.advance(&1, 100, vec![1]).unwrap();

        assert!(store.advance(&1, 100, vec![2]).unwrap_err().is_stale());
        assert!(store.advance(&2, 100, vec![2]).unwrap_err().is_stale());
        assert_eq!(store.get(&1).unwrap().last_value, vec![1]);
    }

    #[test]
    fn test_attach_page_on_missing_cursor() {
        let backend = MemoryBackend::<u32>::new();
        let store = CursorStore::new(&backend, COLLECTION);
        let err = store.attach_page(&1, PageId::generate(), 3).unwrap_err();
        assert!(err.is_invariant_violation());
    }

    #[test]
    fn test_list() {
        let backend = MemoryBackend::new();
        let store = CursorStore::new(&backend, COLLECTION);
        store.create(&2u32).unwrap();
        store.create(&1u32).unwrap();
        assert_eq!(store.list().unwrap(), vec![1, 2]);
    }
}
