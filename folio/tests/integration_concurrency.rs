//! Integration tests for concurrent appends.
//!
//! Appends to one series are ordered only by the conditional cursor update,
//! so racing writers must see exactly one winner per timestamp and never an
//! out-of-order or lost entry.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use folio::retry::{ExponentialBackoff, append_with_retry};
use folio::{Collection, CollectionConfig, MemoryBackend, RawCodec};

const THREADS: usize = 8;

fn collection(page_size: usize) -> Collection<u32, RawCodec, MemoryBackend<u32>> {
    let config = CollectionConfig::new("concurrent", page_size).unwrap();
    Collection::new(MemoryBackend::new(), RawCodec, config).unwrap()
}

#[test]
fn test_same_timestamp_has_one_winner() {
    let collection = collection(4096);
    collection.create_series(&1, 0).unwrap();
    collection.append(&1, 1, &vec![0]).unwrap();

    for round in 2..50u64 {
        let results: Vec<bool> = thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|t| {
                    let collection = &collection;
                    s.spawn(move || {
                        match collection.append(&1, round, &vec![u8::try_from(t).unwrap()]) {
                            Ok(()) => true,
                            Err(e) => {
                                assert!(e.is_stale(), "unexpected error: {e}");
                                false
                            }
                        }
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|won| **won).count(), 1, "round {round}");
    }

    let data = collection.range(&1, 0, u64::MAX).unwrap();
    assert_eq!(data.len(), 49);
}

#[test]
fn test_retrying_writers_share_a_clock() {
    const PER_THREAD: usize = 25;

    // large enough that every entry lands in the first page
    let collection = Arc::new(collection(64 * 1024));
    collection.create_series(&1, 0).unwrap();
    collection.append(&1, 1, &vec![0]).unwrap();

    let clock = Arc::new(AtomicU64::new(1));
    let policy = ExponentialBackoff {
        max_retries: 1_000,
        initial_backoff: Duration::ZERO,
    };

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let collection = Arc::clone(&collection);
            let clock = Arc::clone(&clock);
            thread::spawn(move || {
                for _ in 0..PER_THREAD {
                    append_with_retry(collection.as_ref(), &1, &policy, |_| {
                        let ts = clock.fetch_add(1, Ordering::SeqCst) + 1;
                        (ts, ts.to_le_bytes().to_vec())
                    })
                    .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let data = collection.range(&1, 0, u64::MAX).unwrap();
    assert_eq!(data.len(), 1 + THREADS * PER_THREAD);
    for pair in data.windows(2) {
        assert!(pair[0].timestamp < pair[1].timestamp);
    }
    for point in &data[1..] {
        assert_eq!(point.value, point.timestamp.to_le_bytes().to_vec());
    }
    assert_eq!(collection.pages(&1).unwrap().len(), 1);
}

#[test]
fn test_series_do_not_contend() {
    let collection = collection(1024);
    for id in 0..THREADS {
        collection.create_series(&u32::try_from(id).unwrap(), 0).unwrap();
    }

    thread::scope(|s| {
        for id in 0..THREADS {
            let collection = &collection;
            s.spawn(move || {
                let id = u32::try_from(id).unwrap();
                for ts in 1..=200u64 {
                    collection.append(&id, ts, &vec![1; 16]).unwrap();
                }
            });
        }
    });

    for id in 0..THREADS {
        let id = u32::try_from(id).unwrap();
        let data = collection.range(&id, 0, u64::MAX).unwrap();
        assert_eq!(data.len(), 200);
        assert_eq!(collection.latest(&id).unwrap().unwrap().timestamp, 200);
    }
}
