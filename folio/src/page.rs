//! Page store.
//!
//! Pages hold the entries of a series in fixed-capacity slot arrays. A page
//! is mutable only while it is the open page of its series; once the next
//! page exists its slots and boundaries are final.

use std::marker::PhantomData;

use crate::backend::Backend;
use crate::error::{BackendError, FolioError, Result};
use crate::model::{Page, PageId, SeriesKey};

/// View of the page collection of one time-series collection.
pub struct PageStore<'a, K, B> {
    backend: &'a B,
    collection: &'a str,
    _key: PhantomData<fn() -> K>,
}

fn missing_page(context: &str, page_id: &PageId) -> FolioError {
    FolioError::backend(
        context,
        BackendError::InvariantViolation {
            reason: format!("page {page_id} not found"),
        },
    )
}

impl<'a, K, B> PageStore<'a, K, B>
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

    /// Inserts a new page.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the insert.
    pub fn insert(&self, page: Page<K>) -> Result<()> {
        self.backend
            .insert_page(self.collection, page)
            .map_err(|e| FolioError::backend("creating new page", e))
    }

    /// Sets the end boundary of a page and returns the page as it was.
    ///
    /// Returns `None` if the page does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn close(&self, page_id: &PageId, end_time: u64) -> Result<Option<Page<K>>> {
        self.backend
            .close_page(self.collection, page_id, end_time)
            .map_err(|e| FolioError::backend("closing previous page", e))
    }

    /// Stores an entry in a slot of an open page.
    ///
    /// # Errors
    ///
    /// Returns an invariant violation if the page or slot does not exist.
    pub fn write_slot(
        &self,
        page_id: &PageId,
        slot: usize,
        timestamp: u64,
        value: Vec<u8>,
    ) -> Result<()> {
        let written = self
            .backend
            .write_slot(self.collection, page_id, slot, timestamp, value)
            .map_err(|e| FolioError::backend("writing page slot", e))?;

        if !written {
            return Err(missing_page("writing page slot", page_id));
        }
        Ok(())
    }

    /// Replaces the value of the slot holding `timestamp`.
    ///
    /// # Errors
    ///
    /// Returns an invariant violation if the page is missing or the slot
    /// does not hold `timestamp`.
    pub fn replace_value(
        &self,
        page_id: &PageId,
        slot: usize,
        timestamp: u64,
        value: Vec<u8>,
    ) -> Result<()> {
        let updated = self
            .backend
            .set_slot_value(self.collection, page_id, slot, timestamp, value)
            .map_err(|e| FolioError::backend("updating page slot", e))?;

        if !updated {
            return Err(FolioError::backend(
                "updating page slot",
                BackendError::InvariantViolation {
                    reason: format!("slot {slot} of page {page_id} does not hold timestamp {timestamp}"),
                },
            ));
        }
        Ok(())
    }

    /// Pages of a series overlapping `[min_time, max_time]`, by start time.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn overlapping(&self, series_id: &K, min_time: u64, max_time: u64) -> Result<Vec<Page<K>>> {
        self.backend
            .find_pages(self.collection, series_id, min_time, max_time)
            .map_err(|e| FolioError::backend("searching for matching pages", e))
    }
}
