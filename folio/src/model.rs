//! Documents and query result types.
//!
//! Two kinds of documents are persisted per collection:
//!
//! - [`Cursor`]: one per series, keyed by series id, in `<name>_cursors`
//! - [`Page`]: a fixed-capacity block of slots, keyed by [`PageId`], in `<name>`
//!
//! Slots in a page are filled from the highest index down to `0`, so the
//! oldest entry of a page lives at `capacity - 1` and the newest at the
//! lowest written index. Unwritten slots carry [`TIME_ZERO`].

use std::fmt;
use std::hash::Hash;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codec::ValueCodec;
use crate::config::PageLayout;
use crate::error::CodecError;

/// Timestamp sentinel meaning "no data yet".
///
/// Timestamps are nanoseconds since the Unix epoch. Because appends must be
/// strictly newer than the cursor's last time, which starts here, no stored
/// entry can ever carry this value.
pub const TIME_ZERO: u64 = 0;

/// Requirements on series identifiers.
///
/// Implemented for every type with the listed capabilities, e.g. `String`,
/// `u64`, or a caller-defined struct deriving them.
pub trait SeriesKey:
    Clone + Ord + Hash + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<T> SeriesKey for T where
    T: Clone + Ord + Hash + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

/// Globally unique identifier of a page document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(Uuid);

impl PageId {
    /// Generates a fresh random page id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One (timestamp, value) position in a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    /// Timestamp in nanoseconds, [`TIME_ZERO`] while unwritten.
    pub timestamp: u64,
    /// Encoded value, empty while unwritten.
    pub value: Vec<u8>,
}

impl Slot {
    /// Returns `true` if nothing has been written to this slot.
    pub fn is_empty(&self) -> bool {
        self.timestamp == TIME_ZERO
    }
}

/// Per-series head pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor<K> {
    /// The series this cursor describes.
    pub series_id: K,
    /// The currently open page, if any entry was ever appended.
    pub last_page: Option<PageId>,
    /// Index of the most recently written slot of `last_page`.
    ///
    /// Decremented by every accepted append; a negative value after the
    /// decrement means the open page is full and a rollover is due.
    pub next_slot: i64,
    /// Encoded value of the newest entry.
    pub last_value: Vec<u8>,
    /// Timestamp of the newest entry, [`TIME_ZERO`] if there is none.
    pub last_value_time: u64,
}

impl<K> Cursor<K> {
    /// Creates the cursor of a series that has no entries.
    pub fn new(series_id: K) -> Self {
        Self {
            series_id,
            last_page: None,
            next_slot: 0,
            last_value: Vec::new(),
            last_value_time: TIME_ZERO,
        }
    }

    /// Returns `true` once at least one entry has been appended.
    pub fn has_data(&self) -> bool {
        self.last_value_time != TIME_ZERO
    }
}

/// A fixed-capacity block of consecutive entries of one series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<K> {
    /// Unique page id.
    pub page_id: PageId,
    /// Owning series.
    pub series_id: K,
    /// Newest timestamp of the previous page (own first timestamp for the
    /// first page of a series).
    pub start_time: u64,
    /// Oldest timestamp of the next page once closed, else the newest
    /// timestamp written here.
    pub end_time: u64,
    /// Slot array, fixed length for the life of the page.
    pub slots: Vec<Slot>,
    /// Reserved bytes keeping a fresh page at its full byte budget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding: Option<Vec<u8>>,
    /// Position in the page chain of the series, `0` for the first page.
    ///
    /// Breaks ties between pages with equal start boundaries, which happen
    /// when a page holds a single slot.
    #[serde(default)]
    pub sequence: u64,
}

impl<K: Clone> Page<K> {
    /// Creates an empty page with `capacity` unwritten slots.
    pub fn new(
        series_id: K,
        start_time: u64,
        end_time: u64,
        capacity: usize,
        padding: usize,
    ) -> Self {
        Self {
            page_id: PageId::generate(),
            series_id,
            start_time,
            end_time,
            slots: vec![Slot::default(); capacity],
            padding: (padding > 0).then(|| vec![0u8; padding]),
            sequence: 0,
        }
    }

    /// Sets the chain position of the page.
    #[must_use]
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Number of slots the page was created with.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of written slots.
    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|slot| !slot.is_empty()).count()
    }

    /// Oldest stored timestamp, if any slot is written.
    pub fn earliest(&self) -> Option<u64> {
        self.slots
            .iter()
            .rev()
            .find(|slot| !slot.is_empty())
            .map(|slot| slot.timestamp)
    }

    /// Newest stored timestamp, if any slot is written.
    pub fn latest(&self) -> Option<u64> {
        self.slots
            .iter()
            .find(|slot| !slot.is_empty())
            .map(|slot| slot.timestamp)
    }

    /// Estimated persisted size of the page under `layout`.
    pub fn estimated_size(&self, layout: &PageLayout) -> usize {
        let slots: usize = self
            .slots
            .iter()
            .map(|slot| layout.timestamp_overhead + slot.value.len())
            .sum();
        let padding = self.padding.as_ref().map_or(0, Vec::len);
        layout.header_overhead + slots + padding
    }

    /// Summarizes the page without its slot contents.
    pub fn info(&self) -> PageInfo {
        PageInfo {
            page_id: self.page_id,
            start_time: self.start_time,
            end_time: self.end_time,
            capacity: self.capacity(),
            filled: self.filled(),
            earliest: self.earliest(),
            latest: self.latest(),
            padding: self.padding.as_ref().map_or(0, Vec::len),
            sequence: self.sequence,
        }
    }
}

/// Summary of one page, as returned by
/// [`Collection::pages`](crate::collection::Collection::pages).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    /// Page id.
    pub page_id: PageId,
    /// Start boundary.
    pub start_time: u64,
    /// End boundary.
    pub end_time: u64,
    /// Slot capacity.
    pub capacity: usize,
    /// Written slots.
    pub filled: usize,
    /// Oldest stored timestamp.
    pub earliest: Option<u64>,
    /// Newest stored timestamp.
    pub latest: Option<u64>,
    /// Remaining padding bytes.
    pub padding: usize,
    /// Position in the page chain.
    pub sequence: u64,
}

/// A timestamped, still-encoded value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPoint {
    /// Timestamp in nanoseconds since the Unix epoch.
    pub timestamp: u64,
    /// Encoded value bytes.
    pub value: Vec<u8>,
}

impl DataPoint {
    /// Creates a data point.
    pub fn new(timestamp: u64, value: Vec<u8>) -> Self {
        Self { timestamp, value }
    }

    /// Decodes the value with `codec`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if the bytes are not a valid encoding for the codec.
    pub fn decode<C: ValueCodec>(&self, codec: &C) -> Result<C::Value, CodecError> {
        codec.decode(&self.value)
    }
}
