//! Caller-side retry for appends.
//!
//! The append engine never retries: a stale timestamp or a lost race is
//! reported as [`SeriesError::NotFoundOrStale`](crate::error::SeriesError::NotFoundOrStale)
//! and the caller decides what to do. [`append_with_retry`] is that decision
//! packaged up. On each attempt it asks the caller for a fresh
//! `(timestamp, value)` pair, so a writer that stamps entries with the
//! current clock can simply re-read the clock.

use std::time::Duration;

use tracing::debug;

use crate::backend::Backend;
use crate::codec::ValueCodec;
use crate::collection::Collection;
use crate::error::{FolioError, Result};
use crate::model::SeriesKey;

/// Decides whether a failed append is attempted again.
pub trait RetryPolicy {
    /// Returns how long to wait before attempt `attempt + 1`, or `None` to
    /// give up. `attempt` counts from `0`.
    fn should_retry(&self, attempt: u32, error: &FolioError) -> Option<Duration>;
}

/// Never retries.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn should_retry(&self, _attempt: u32, _error: &FolioError) -> Option<Duration> {
        None
    }
}

/// Retries stale appends with a doubling backoff.
///
/// Any error other than a stale/unknown-series error is returned
/// immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Wait before the first retry; doubles for every later one.
    pub initial_backoff: Duration,
}

impl Default for ExponentialBackoff {
    /// Defaults: 3 retries, 1ms initial backoff.
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(1),
        }
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn should_retry(&self, attempt: u32, error: &FolioError) -> Option<Duration> {
        if !error.is_stale() || attempt >= self.max_retries {
            return None;
        }
        Some(self.initial_backoff.saturating_mul(1u32 << attempt.min(31)))
    }
}

/// Appends to a series, retrying per `policy`.
///
/// `next` is called once per attempt with the attempt number and returns the
/// `(timestamp, value)` to append.
///
/// # Errors
///
/// Returns the error of the last attempt once the policy gives up.
///
/// # Example
///
/// ```rust
/// use folio::retry::{append_with_retry, ExponentialBackoff};
/// use folio::{Collection, CollectionConfig, MemoryBackend, RawCodec};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = CollectionConfig::new("events", 4096)?;
/// let events = Collection::new(MemoryBackend::new(), RawCodec, config)?;
/// events.create_series(&1u32, 0)?;
/// events.append(&1, 100, &b"first".to_vec())?;
///
/// // 100 is stale; the second attempt moves the clock forward
/// append_with_retry(&events, &1, &ExponentialBackoff::default(), |attempt| {
///     (100 + u64::from(attempt), b"second".to_vec())
/// })?;
/// assert_eq!(events.latest(&1)?.map(|p| p.timestamp), Some(101));
/// # Ok(())
/// # }
/// ```
pub fn append_with_retry<K, C, B, P, F>(
    collection: &Collection<K, C, B>,
    series_id: &K,
    policy: &P,
    mut next: F,
) -> Result<()>
where
    K: SeriesKey,
    C: ValueCodec,
    B: Backend<K>,
    P: RetryPolicy + ?Sized,
    F: FnMut(u32) -> (u64, C::Value),
{
    let mut attempt = 0;
    loop {
        let (timestamp, value) = next(attempt);
        let err = match collection.append(series_id, timestamp, &value) {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        match policy.should_retry(attempt, &err) {
            Some(backoff) => {
                debug!(?series_id, attempt, ?backoff, error = %err, "retrying append");
                if !backoff.is_zero() {
                    std::thread::sleep(backoff);
                }
                attempt += 1;
            }
            None => return Err(err),
        }
    }
}
