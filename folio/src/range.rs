//! Range queries.
//!
//! Pages are fetched in start-boundary order and each page is scanned from
//! its highest slot index down to `0`, which is oldest to newest. The
//! concatenation is therefore already in ascending timestamp order and no
//! sort is needed.

use crate::backend::Backend;
use crate::error::Result;
use crate::model::{DataPoint, Page, SeriesKey};
use crate::page::PageStore;

/// Returns every entry of a series with `min_time <= timestamp <= max_time`.
///
/// # Errors
///
/// Returns an error if the pages cannot be read.
pub fn range<K, B>(
    pages: &PageStore<'_, K, B>,
    series_id: &K,
    min_time: u64,
    max_time: u64,
) -> Result<Vec<DataPoint>>
where
    K: SeriesKey,
    B: Backend<K>,
{
    if min_time > max_time {
        return Ok(Vec::new());
    }
    let pages = pages.overlapping(series_id, min_time, max_time)?;
    Ok(collect_range(&pages, min_time, max_time))
}

/// Extracts the entries within `[min_time, max_time]` from pages sorted by
/// start boundary.
///
/// Unwritten slots are skipped; they carry
/// [`TIME_ZERO`](crate::model::TIME_ZERO), which no append can store.
pub fn collect_range<K>(pages: &[Page<K>], min_time: u64, max_time: u64) -> Vec<DataPoint> {
    // Upper bound: every page as large as the first one, plus one spare.
    let slots_per_page = pages.first().map_or(0, |page| page.slots.len());
    let estimate = (pages.len() + 1) * (slots_per_page + 1);
    let mut results = Vec::with_capacity(estimate);

    for page in pages {
        for slot in page.slots.iter().rev() {
            if slot.is_empty() {
                continue;
            }
            if slot.timestamp >= min_time && slot.timestamp <= max_time {
                results.push(DataPoint::new(slot.timestamp, slot.value.clone()));
            }
        }
    }

    results.shrink_to_fit();
    results
}
