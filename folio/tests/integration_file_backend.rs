//! Integration tests for collections persisted with the file backend.

use folio::error::FolioError;
use folio::{Collection, CollectionConfig, FileBackend, JsonCodec};
use serde::{Deserialize, Serialize};
use tempfile::tempdir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Sample {
    celsius: f64,
    ok: bool,
}

type Samples = Collection<String, JsonCodec<Sample>, FileBackend<String>>;

fn open(path: &std::path::Path) -> Samples {
    let backend = FileBackend::open(path).unwrap();
    let config = CollectionConfig::new("samples", 1024).unwrap();
    Collection::new(backend, JsonCodec::new(), config).unwrap()
}

fn sample(i: u64) -> Sample {
    Sample {
        celsius: 20.0 + f64::from(u32::try_from(i % 10).unwrap()),
        ok: i % 3 != 0,
    }
}

#[test]
fn test_collection_survives_reopen() {
    let temp_dir = tempdir().unwrap();
    let store_path = temp_dir.path().join("store");
    let id = "sensor-1".to_string();

    {
        let samples = open(&store_path);
        samples.create_series(&id, 0).unwrap();
        for ts in 1..=100u64 {
            samples.append(&id, ts, &sample(ts)).unwrap();
        }
        samples.update(&id, &Sample { celsius: -1.0, ok: false }).unwrap();
    }

    assert!(store_path.join("samples.json").exists());
    assert!(store_path.join("samples_cursors.json").exists());

    let samples = open(&store_path);
    assert_eq!(samples.series().unwrap(), vec![id.clone()]);

    let data = samples.range(&id, 0, u64::MAX).unwrap();
    assert_eq!(data.len(), 100);
    for point in &data[..99] {
        assert_eq!(point.decode(samples.codec()).unwrap(), sample(point.timestamp));
    }

    let latest = samples.latest(&id).unwrap().unwrap();
    assert_eq!(latest.timestamp, 100);
    assert_eq!(latest.decode(samples.codec()).unwrap().celsius, -1.0);

    // the cursor came back too: ordering and the countdown carry on
    assert!(samples.append(&id, 100, &sample(100)).unwrap_err().is_stale());
    let pages_before = samples.pages(&id).unwrap().len();
    for ts in 101..=200u64 {
        samples.append(&id, ts, &sample(ts)).unwrap();
    }
    assert!(samples.pages(&id).unwrap().len() > pages_before);
    assert_eq!(samples.range(&id, 0, u64::MAX).unwrap().len(), 200);
}

#[test]
fn test_duplicate_series_after_reopen() {
    let temp_dir = tempdir().unwrap();
    let id = "sensor-1".to_string();

    open(temp_dir.path()).create_series(&id, 0).unwrap();

    let err = open(temp_dir.path()).create_series(&id, 0).unwrap_err();
    assert!(err.is_duplicate());
}

#[test]
fn test_collection_name_must_be_a_safe_file_name() {
    let temp_dir = tempdir().unwrap();
    let backend = FileBackend::<String>::open(temp_dir.path()).unwrap();
    let config = CollectionConfig::new("../escape", 1024).unwrap();
    let samples = Collection::new(backend, JsonCodec::<Sample>::new(), config).unwrap();

    let err = samples.create_series(&"a".to_string(), 0).unwrap_err();
    assert!(matches!(err, FolioError::Backend { .. }));
    assert!(!temp_dir.path().join("..").join("escape_cursors.json").exists());
}
