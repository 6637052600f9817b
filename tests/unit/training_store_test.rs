//! Unit tests for the resistance training store.

use spinzone::storage::training::{TrainingStore, MAX_SAMPLES_PER_BUCKET, RESISTANCE_LEVELS};
use tempfile::TempDir;

#[test]
fn test_bucket_stops_at_capacity() {
    let mut store = TrainingStore::new();

    let accepted = (0..30)
        .filter(|i| store.record(17, 80, 150.0 + f64::from(*i), 18.0))
        .count();

    assert_eq!(accepted, MAX_SAMPLES_PER_BUCKET);
    assert_eq!(store.samples(17, 80).len(), 26);
    // Oldest samples are the ones kept
    assert_eq!(store.samples(17, 80)[0].power, 150.0);
    assert_eq!(store.samples(17, 80)[25].power, 175.0);
}

#[test]
fn test_coasting_cadence_is_ignored() {
    let mut store = TrainingStore::new();

    assert!(!store.record(17, 20, 50.0, 5.0));
    assert!(!store.record(17, 0, 0.0, 0.0));
    assert!(store.record(17, 21, 60.0, 6.0));
    assert!(!store.record(RESISTANCE_LEVELS, 80, 200.0, 18.0));

    assert_eq!(store.total_samples(), 1);
}

#[test]
fn test_save_and_load_reproduce_grid() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("training.json");
    let mut store = TrainingStore::new();
    store.record(0, 130, 310.5, 24.25);
    store.record(99, 21, 40.0, 6.5);

    store.save(&path).unwrap();
    let loaded = TrainingStore::load(&path).unwrap();

    assert_eq!(loaded, store);
    assert!(loaded.samples(50, 90).is_empty());
    assert_eq!(loaded.grid().len(), 100);
    assert_eq!(loaded.grid()[&42].len(), 111);
}

#[test]
fn test_load_or_init_creates_empty_grid() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("training.json");

    let store = TrainingStore::load_or_init(&path).unwrap();

    assert!(path.exists());
    assert_eq!(store.total_samples(), 0);
    assert_eq!(TrainingStore::load(&path).unwrap(), store);
}

#[test]
fn test_corrupt_store_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("training.json");
    std::fs::write(&path, "{\"0\": [1, 2").unwrap();

    assert!(TrainingStore::load_or_init(&path).is_err());
}

#[test]
fn test_prediction_picks_closest_power_at_nearest_cadence() {
    let mut store = TrainingStore::new();
    store.record(10, 90, 120.0, 15.0);
    store.record(20, 90, 170.0, 17.0);
    store.record(30, 90, 240.0, 19.0);
    store.record(60, 110, 175.0, 17.0);

    assert_eq!(store.predict_resistance(93, 180.0, 17.0), Some(20));
    assert_eq!(store.predict_resistance(108, 180.0, 17.0), Some(60));
    assert_eq!(store.predict_resistance(40, 250.0, 20.0), Some(30));
}

#[test]
fn test_prediction_on_empty_store() {
    assert_eq!(TrainingStore::new().predict_resistance(90, 200.0, 18.0), None);
}
