//! The paged append engine.
//!
//! # Append protocol
//!
//! 1. **Cursor transition.** One conditional update on the series cursor:
//!    match only if the cached last time is older than the new timestamp,
//!    then store the new value/time and decrement the slot countdown. This
//!    is the only ordering point; a caller that loses a race (or presents a
//!    stale timestamp, or names an unknown series) gets
//!    [`SeriesError::NotFoundOrStale`](crate::error::SeriesError::NotFoundOrStale)
//!    and nothing is mutated.
//! 2. **Rollover.** If the countdown went negative the open page is full
//!    (or there is none yet). The previous page is closed at the new
//!    timestamp, a new page is inserted whose start boundary is the previous
//!    page's old end boundary, and the cursor is pointed at it.
//! 3. **Slot write.** The entry is stored at the countdown index, the page's
//!    end boundary moves to the new timestamp, and padding is dropped.
//!
//! # Countdown semantics
//!
//! The cursor's `next_slot` is the index of the slot the most recent append
//! wrote. A rollover resets it to `capacity - 1`, the slot the triggering
//! append fills; each later append decrements it first and then writes the
//! resulting index. Slot `0` is the last one a page receives, so pages fill
//! from the top down and a page always holds exactly `capacity` entries
//! before the next one is opened.
//!
//! ```text
//! capacity = 4     slot:  0    1    2    3
//! append t1               .    .    .   t1     next_slot = 3 (rollover)
//! append t2               .    .   t2   t1     next_slot = 2
//! append t3               .   t3   t2   t1     next_slot = 1
//! append t4              t4   t3   t2   t1     next_slot = 0
//! append t5  -> next_slot = -1 -> rollover into a new page
//! ```

use tracing::debug;

use crate::backend::Backend;
use crate::budget;
use crate::config::PageLayout;
use crate::cursor::CursorStore;
use crate::error::{BackendError, FolioError, Result};
use crate::model::{Cursor, Page, PageId, SeriesKey};
use crate::page::PageStore;

fn invariant(context: &str, reason: String) -> FolioError {
    FolioError::backend(context, BackendError::InvariantViolation { reason })
}

/// Orchestrates cursor updates, rollovers, and slot writes for a collection.
pub struct AppendEngine<'a, K, B> {
    cursors: CursorStore<'a, K, B>,
    pages: PageStore<'a, K, B>,
    page_size: usize,
    layout: PageLayout,
}

impl<'a, K, B> AppendEngine<'a, K, B>
where
    K: SeriesKey,
    B: Backend<K>,
{
    /// Creates an engine over the given stores.
    pub fn new(
        cursors: CursorStore<'a, K, B>,
        pages: PageStore<'a, K, B>,
        page_size: usize,
        layout: PageLayout,
    ) -> Self {
        Self {
            cursors,
            pages,
            page_size,
            layout,
        }
    }

    /// Appends an encoded value at `timestamp`.
    ///
    /// The page capacity for this value is computed before the cursor is
    /// touched, so an oversized value is rejected without side effects.
    ///
    /// # Errors
    ///
    /// - [`PageError::ValueTooLarge`](crate::error::PageError::ValueTooLarge)
    ///   if a page cannot hold a single slot of this value
    /// - [`SeriesError::NotFoundOrStale`](crate::error::SeriesError::NotFoundOrStale)
    ///   if the series is unknown or `timestamp` is not newer than the last entry
    /// - a backend error, wrapped with the step that failed
    pub fn append(&self, series_id: &K, timestamp: u64, value: Vec<u8>) -> Result<()> {
        let slots = budget::page_capacity(self.page_size, &self.layout, value.len())?;

        let cursor = self.cursors.advance(series_id, timestamp, value.clone())?;

        let (page_id, slot) = if cursor.next_slot < 0 {
            self.rollover(series_id, &cursor, timestamp, slots)?
        } else {
            let page_id = cursor.last_page.ok_or_else(|| {
                invariant(
                    "locating open page",
                    format!("cursor of series {series_id:?} has free slots but no page"),
                )
            })?;
            let slot = usize::try_from(cursor.next_slot).map_err(|_| {
                invariant(
                    "locating open page",
                    format!("negative slot {} outside rollover", cursor.next_slot),
                )
            })?;
            (page_id, slot)
        };

        self.pages.write_slot(&page_id, slot, timestamp, value)
    }

    /// Closes the open page (if any) and opens a new one of `slots` slots.
    ///
    /// Returns the new page and the slot the current append goes into.
    fn rollover(
        &self,
        series_id: &K,
        cursor: &Cursor<K>,
        timestamp: u64,
        slots: usize,
    ) -> Result<(PageId, usize)> {
        let (start_time, sequence) = match cursor.last_page {
            Some(previous_id) => {
                let previous = self.pages.close(&previous_id, timestamp)?.ok_or_else(|| {
                    invariant(
                        "closing previous page",
                        format!("open page {previous_id} of series {series_id:?} not found"),
                    )
                })?;
                debug!(
                    ?series_id,
                    page_id = %previous_id,
                    end_time = timestamp,
                    size = previous.estimated_size(&self.layout),
                    "closed page"
                );
                (previous.end_time, previous.sequence + 1)
            }
            None => (timestamp, 0),
        };

        let padding = budget::initial_padding(self.page_size, &self.layout, slots);
        let page = Page::new(series_id.clone(), start_time, timestamp, slots, padding)
            .with_sequence(sequence);
        let page_id = page.page_id;
        self.pages.insert(page)?;

        let slot = slots - 1;
        let next_slot = i64::try_from(slot).map_err(|_| {
            invariant("updating series cursor", format!("slot index {slot} overflows"))
        })?;
        self.cursors.attach_page(series_id, page_id, next_slot)?;

        debug!(
            ?series_id,
            page_id = %page_id,
            slots,
            padding,
            start_time,
            sequence,
            "opened page"
        );
        Ok((page_id, slot))
    }

    /// Replaces the value of the newest entry of a series.
    ///
    /// The entry keeps its timestamp and slot. The cursor cache is refreshed
    /// only if no newer entry was accepted while the slot was rewritten.
    ///
    /// # Errors
    ///
    /// - [`SeriesError::NotFound`](crate::error::SeriesError::NotFound) if
    ///   the series does not exist
    /// - an invariant violation if the series has no entries or its newest
    ///   slot cannot be found
    pub fn update(&self, series_id: &K, value: Vec<u8>) -> Result<()> {
        let cursor = self.cursors.get(series_id)?;

        let page_id = cursor.last_page.ok_or_else(|| {
            invariant(
                "updating latest value",
                format!("series {series_id:?} has no entries"),
            )
        })?;
        let slot = usize::try_from(cursor.next_slot).map_err(|_| {
            invariant(
                "updating latest value",
                format!("series {series_id:?} is in the middle of a rollover"),
            )
        })?;

        self.pages
            .replace_value(&page_id, slot, cursor.last_value_time, value.clone())?;

        if !self
            .cursors
            .refresh_value(series_id, cursor.last_value_time, value)?
        {
            debug!(?series_id, "newer entry accepted during update; cache left as is");
        }
        Ok(())
    }
}
