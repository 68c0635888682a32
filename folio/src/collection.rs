//! Time-series collections.
//!
//! A [`Collection`] is the public face of the crate. It binds a validated
//! [`CollectionConfig`], a [`ValueCodec`] and a [`Backend`] together and
//! exposes the per-series operations:
//!
//! | Operation | Result | Typed failures |
//! |---|---|---|
//! | [`create_series`](Collection::create_series) | `()` | `DuplicateSeries` |
//! | [`append`](Collection::append) | `()` | `NotFoundOrStale`, `ValueTooLarge` |
//! | [`update`](Collection::update) | `()` | `NotFound` |
//! | [`range`](Collection::range) | `Vec<DataPoint>` | |
//! | [`latest`](Collection::latest) | `Option<DataPoint>` | `NotFound` |
//!
//! All other failures surface as [`FolioError::Backend`](crate::FolioError::Backend).
//!
//! # Example
//!
//! ```rust
//! use folio::{Collection, CollectionConfig, JsonCodec, MemoryBackend};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CollectionConfig::new("boilers", 4096)?;
//! let temps = Collection::new(MemoryBackend::new(), JsonCodec::<f64>::new(), config)?;
//!
//! let boiler = "boiler-1".to_string();
//! temps.create_series(&boiler, 0)?;
//! temps.append(&boiler, 1_000, &71.5)?;
//! temps.append(&boiler, 2_000, &72.0)?;
//!
//! let points = temps.range(&boiler, 0, u64::MAX)?;
//! assert_eq!(points.len(), 2);
//! assert_eq!(points[1].decode(temps.codec())?, 72.0);
//! # Ok(())
//! # }
//! ```

use std::marker::PhantomData;

use tracing::debug;

use crate::append::AppendEngine;
use crate::backend::Backend;
use crate::codec::ValueCodec;
use crate::config::CollectionConfig;
use crate::cursor::CursorStore;
use crate::error::{FolioError, Result};
use crate::model::{DataPoint, PageInfo, SeriesKey};
use crate::page::PageStore;
use crate::range;

/// A named set of append-only series sharing one page configuration.
///
/// # Thread Safety
///
/// Every method takes `&self`; a collection can be shared across threads
/// (e.g. behind an `Arc`) as long as the backend and codec are `Sync`.
/// Appends to the same series are ordered by the backend's conditional
/// cursor update, never by a lock in this type.
#[derive(Debug)]
pub struct Collection<K, C, B> {
    config: CollectionConfig,
    cursor_collection: String,
    codec: C,
    backend: B,
    _key: PhantomData<fn() -> K>,
}

impl<K, C, B> Collection<K, C, B>
where
    K: SeriesKey,
    C: ValueCodec,
    B: Backend<K>,
{
    /// Creates a collection handle over `backend`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`](crate::error::ConfigError) if `config` does
    /// not validate, e.g. a page size below
    /// [`MIN_PAGE_SIZE`](crate::config::MIN_PAGE_SIZE).
    pub fn new(backend: B, codec: C, config: CollectionConfig) -> Result<Self> {
        config.validate()?;
        let cursor_collection = config.cursor_collection();
        debug!(
            name = %config.name,
            page_size = config.page_size,
            "opened collection"
        );
        Ok(Self {
            config,
            cursor_collection,
            codec,
            backend,
            _key: PhantomData,
        })
    }

    /// The collection configuration.
    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    /// The value codec, for decoding returned [`DataPoint`]s.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// The backing store.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn cursors(&self) -> CursorStore<'_, K, B> {
        CursorStore::new(&self.backend, &self.cursor_collection)
    }

    fn page_store(&self) -> PageStore<'_, K, B> {
        PageStore::new(&self.backend, &self.config.name)
    }

    fn engine(&self) -> AppendEngine<'_, K, B> {
        AppendEngine::new(
            self.cursors(),
            self.page_store(),
            self.config.page_size,
            self.config.layout,
        )
    }

    fn encode(&self, value: &C::Value, context: &str) -> Result<Vec<u8>> {
        self.codec
            .encode(value)
            .map_err(|e| FolioError::backend(context, e.into()))
    }

    /// Creates an empty series.
    ///
    /// `start_time` is informational and not stored.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::DuplicateSeries`](crate::error::SeriesError::DuplicateSeries)
    /// if the series already exists.
    pub fn create_series(&self, series_id: &K, start_time: u64) -> Result<()> {
        self.cursors().create(series_id)?;
        debug!(?series_id, start_time, "created series");
        Ok(())
    }

    /// Appends `value` at `timestamp` (nanoseconds since the Unix epoch).
    ///
    /// `timestamp` must be strictly newer than the newest entry of the
    /// series. The engine never retries; see [`crate::retry`] for a
    /// caller-side retry loop.
    ///
    /// # Errors
    ///
    /// - [`SeriesError::NotFoundOrStale`](crate::error::SeriesError::NotFoundOrStale)
    ///   if the series does not exist or the timestamp is not newer
    /// - [`PageError::ValueTooLarge`](crate::error::PageError::ValueTooLarge)
    ///   if the encoded value does not fit in a page
    pub fn append(&self, series_id: &K, timestamp: u64, value: &C::Value) -> Result<()> {
        let bytes = self.encode(value, "encoding value")?;
        self.engine().append(series_id, timestamp, bytes)
    }

    /// Replaces the value of the newest entry, keeping its timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::NotFound`](crate::error::SeriesError::NotFound)
    /// if the series does not exist, or an invariant violation if it has no
    /// entries yet.
    pub fn update(&self, series_id: &K, value: &C::Value) -> Result<()> {
        let bytes = self.encode(value, "encoding value")?;
        self.engine().update(series_id, bytes)
    }

    /// Returns the entries with `min_time <= timestamp <= max_time`, oldest
    /// first.
    ///
    /// An unknown series yields an empty result.
    ///
    /// # Errors
    ///
    /// Returns an error if the pages cannot be read.
    pub fn range(&self, series_id: &K, min_time: u64, max_time: u64) -> Result<Vec<DataPoint>> {
        range::range(&self.page_store(), series_id, min_time, max_time)
    }

    /// Returns the newest entry from the cursor cache, or `None` if the
    /// series has no entries.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::NotFound`](crate::error::SeriesError::NotFound)
    /// if the series does not exist.
    pub fn latest(&self, series_id: &K) -> Result<Option<DataPoint>> {
        let cursor = self.cursors().get(series_id)?;
        if !cursor.has_data() {
            return Ok(None);
        }
        Ok(Some(DataPoint::new(cursor.last_value_time, cursor.last_value)))
    }

    /// Summaries of every page of a series, ordered by start boundary.
    ///
    /// # Errors
    ///
    /// Returns an error if the pages cannot be read.
    pub fn pages(&self, series_id: &K) -> Result<Vec<PageInfo>> {
        let pages = self.page_store().overlapping(series_id, 0, u64::MAX)?;
        Ok(pages.iter().map(|page| page.info()).collect())
    }

    /// Ids of every series in the collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the cursors cannot be read.
    pub fn series(&self) -> Result<Vec<K>> {
        self.cursors().list()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::codec::{JsonCodec, RawCodec};
    use crate::config::PageLayout;
    use crate::error::{ConfigError, PageError, SeriesError};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Reading {
        sequence: u32,
        note: String,
    }

    fn raw_collection(page_size: usize) -> Collection<String, RawCodec, MemoryBackend<String>> {
        let config = CollectionConfig::new("raw", page_size).unwrap();
        Collection::new(MemoryBackend::new(), RawCodec, config).unwrap()
    }

    #[test]
    fn test_rejects_small_page_size() {
        let config = CollectionConfig {
            name: "tiny".to_string(),
            page_size: 100,
            layout: PageLayout::default(),
        };
        let err = Collection::<String, _, _>::new(MemoryBackend::new(), RawCodec, config).unwrap_err();
        assert!(matches!(
            err,
            FolioError::Config(ConfigError::PageSizeTooSmall { page_size: 100, .. })
        ));
    }

    #[test]
    fn test_create_series_twice() {
        let collection = raw_collection(4096);
        let id = "a".to_string();

        collection.create_series(&id, 0).unwrap();
        assert!(collection.range(&id, 0, u64::MAX).unwrap().is_empty());
        assert_eq!(collection.latest(&id).unwrap(), None);

        let err = collection.create_series(&id, 0).unwrap_err();
        assert!(matches!(err, FolioError::Series(SeriesError::DuplicateSeries)));
    }

    #[test]
    fn test_reference_page_split() {
        let collection = raw_collection(4096);
        let id = "a".to_string();
        collection.create_series(&id, 0).unwrap();

        for i in 1..=60u64 {
            collection.append(&id, i, &vec![b'x']).unwrap();
        }

        let pages = collection.pages(&id).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].capacity, 59);
        assert_eq!(pages[0].filled, 59);
        assert_eq!(pages[1].filled, 1);
        assert_eq!(collection.range(&id, 0, u64::MAX).unwrap().len(), 60);
    }

    #[test]
    fn test_capacity_follows_encoded_size() {
        let config = CollectionConfig::new("encoded", 1024).unwrap();
        let collection =
            Collection::new(MemoryBackend::new(), JsonCodec::<Reading>::new(), config).unwrap();
        let id = 9u64;
        collection.create_series(&id, 0).unwrap();

        let reading = Reading {
            sequence: 1,
            note: "n".repeat(40),
        };
        let encoded = collection.codec().encode(&reading).unwrap().len();
        collection.append(&id, 1, &reading).unwrap();

        let pages = collection.pages(&id).unwrap();
        assert_eq!(pages[0].capacity, (1024 - 110) / (66 + encoded));
    }

    #[test]
    fn test_latest_tracks_append_and_update() {
        let config = CollectionConfig::new("readings", 1024).unwrap();
        let collection =
            Collection::new(MemoryBackend::new(), JsonCodec::<Reading>::new(), config).unwrap();
        let id = 5u64;
        collection.create_series(&id, 0).unwrap();

        for i in 0..20u32 {
            let ts = 1_000 + u64::from(i);
            let mut reading = Reading {
                sequence: i,
                note: "raw".to_string(),
            };
            collection.append(&id, ts, &reading).unwrap();

            let latest = collection.latest(&id).unwrap().unwrap();
            assert_eq!(latest.timestamp, ts);
            assert_eq!(latest.decode(collection.codec()).unwrap(), reading);

            reading.note = "updated".to_string();
            collection.update(&id, &reading).unwrap();
            let latest = collection.latest(&id).unwrap().unwrap();
            assert_eq!(latest.timestamp, ts);
            assert_eq!(latest.decode(collection.codec()).unwrap().note, "updated");

            let stored = collection.range(&id, ts, ts).unwrap();
            assert_eq!(stored.len(), 1);
            assert_eq!(stored[0].decode(collection.codec()).unwrap(), reading);
        }
    }

    #[test]
    fn test_latest_and_update_unknown_series() {
        let collection = raw_collection(4096);
        let id = "ghost".to_string();
        assert!(collection.latest(&id).unwrap_err().is_not_found());
        assert!(collection.update(&id, &vec![1]).unwrap_err().is_not_found());
        assert!(collection.append(&id, 1, &vec![1]).unwrap_err().is_stale());
        assert!(collection.range(&id, 0, u64::MAX).unwrap().is_empty());
    }

    #[test]
    fn test_value_too_large() {
        let collection = raw_collection(256);
        let id = "a".to_string();
        collection.create_series(&id, 0).unwrap();

        let err = collection.append(&id, 1, &vec![0; 200]).unwrap_err();
        assert!(matches!(err, FolioError::Page(PageError::ValueTooLarge { .. })));
        assert_eq!(collection.latest(&id).unwrap(), None);
    }

    #[test]
    fn test_inverted_range_is_empty() {
        let collection = raw_collection(4096);
        let id = "a".to_string();
        collection.create_series(&id, 0).unwrap();
        collection.append(&id, 10, &vec![1]).unwrap();
        assert!(collection.range(&id, 20, 5).unwrap().is_empty());
    }

    #[test]
    fn test_series_listing() {
        let collection = raw_collection(4096);
        for id in ["b", "a"] {
            collection.create_series(&id.to_string(), 0).unwrap();
        }
        assert_eq!(collection.series().unwrap(), vec!["a", "b"]);
    }
}
