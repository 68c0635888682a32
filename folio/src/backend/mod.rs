//! Backing document store.
//!
//! The engine needs very little from its store: keyed documents in named
//! collections, and single-document updates that are applied atomically
//! (find-and-modify semantics). [`Backend`] captures exactly those
//! operations. Multi-document transactions are never used; every method
//! below touches one document and is linearizable on its own.
//!
//! Implementations:
//!
//! - [`MemoryBackend`]: documents in process memory, for tests and embedding
//! - [`FileBackend`]: a memory backend persisted as one JSON file per collection

pub mod file;
pub mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

use crate::error::BackendResult;
use crate::model::{Cursor, Page, PageId, SeriesKey};

/// Changes applied to a cursor by an accepted append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorAdvance {
    /// New last-value timestamp; must be strictly newer than the stored one.
    pub timestamp: u64,
    /// New cached value.
    pub value: Vec<u8>,
}

/// A document store holding cursor and page collections.
pub trait Backend<K: SeriesKey>: Send + Sync {
    /// Inserts a new cursor.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::DuplicateKey`](crate::error::BackendError::DuplicateKey)
    /// if a cursor with the same series id exists.
    fn insert_cursor(&self, collection: &str, cursor: Cursor<K>) -> BackendResult<()>;

    /// Reads a cursor by series id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn find_cursor(&self, collection: &str, series_id: &K) -> BackendResult<Option<Cursor<K>>>;

    /// Conditionally advances a cursor.
    ///
    /// Matches the cursor of `series_id` only if its `last_value_time` is
    /// strictly less than `advance.timestamp`. On a match the cached value
    /// and time are replaced and `next_slot` is decremented by one, and the
    /// updated cursor is returned. Returns `None` if nothing matched.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    fn advance_cursor(
        &self,
        collection: &str,
        series_id: &K,
        advance: CursorAdvance,
    ) -> BackendResult<Option<Cursor<K>>>;

    /// Points a cursor at a page and resets its slot countdown.
    ///
    /// Returns `false` if the cursor does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn set_cursor_page(
        &self,
        collection: &str,
        series_id: &K,
        page_id: PageId,
        next_slot: i64,
    ) -> BackendResult<bool>;

    /// Replaces the cached value of a cursor whose last time is `timestamp`.
    ///
    /// Returns `false` if no cursor matched.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn set_cursor_value(
        &self,
        collection: &str,
        series_id: &K,
        timestamp: u64,
        value: Vec<u8>,
    ) -> BackendResult<bool>;

    /// Lists the series ids of all cursors, in key order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn list_cursors(&self, collection: &str) -> BackendResult<Vec<K>>;

    /// Inserts a new page.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::DuplicateKey`](crate::error::BackendError::DuplicateKey)
    /// if the page id is already taken.
    fn insert_page(&self, collection: &str, page: Page<K>) -> BackendResult<()>;

    /// Reads a page by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn find_page(&self, collection: &str, page_id: &PageId) -> BackendResult<Option<Page<K>>>;

    /// Sets a page's end boundary, returning the page as it was before.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn close_page(
        &self,
        collection: &str,
        page_id: &PageId,
        end_time: u64,
    ) -> BackendResult<Option<Page<K>>>;

    /// Writes one slot, moves the end boundary forward to `timestamp` (never
    /// back) and drops the page padding.
    ///
    /// Returns `false` if the page does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvariantViolation`](crate::error::BackendError::InvariantViolation)
    /// if `slot` is outside the page.
    fn write_slot(
        &self,
        collection: &str,
        page_id: &PageId,
        slot: usize,
        timestamp: u64,
        value: Vec<u8>,
    ) -> BackendResult<bool>;

    /// Replaces the value of a slot that holds `timestamp`.
    ///
    /// Returns `false` if the page does not exist, the slot is out of range,
    /// or the slot holds a different timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn set_slot_value(
        &self,
        collection: &str,
        page_id: &PageId,
        slot: usize,
        timestamp: u64,
        value: Vec<u8>,
    ) -> BackendResult<bool>;

    /// Finds the pages of a series overlapping `[min_time, max_time]`.
    ///
    /// A page matches when `start_time <= max_time` and
    /// `end_time >= min_time`. Results are sorted by `start_time`, then by
    /// chain `sequence`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn find_pages(
        &self,
        collection: &str,
        series_id: &K,
        min_time: u64,
        max_time: u64,
    ) -> BackendResult<Vec<Page<K>>>;
}
