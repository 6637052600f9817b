//! Resistance training data: bounded (power, speed) samples per
//! (resistance, cadence) bucket, and a nearest-match resistance predictor.
//!
//! The grid covers resistance `0..100` and cadence `20..=130`. On disk it is a
//! flat JSON document `{ "<resistance>": { "<cadence>": [[power, speed], ...] } }`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeInclusive;
use std::path::Path;

/// Resistance levels tracked (exclusive upper bound).
pub const RESISTANCE_LEVELS: u8 = 100;

/// Cadence buckets tracked, in RPM.
pub const CADENCE_RANGE: RangeInclusive<u16> = 20..=130;

/// Samples at or below this cadence are coasting or noise.
pub const MIN_RECORD_CADENCE: u16 = 20;

/// Samples kept per (resistance, cadence) bucket.
pub const MAX_SAMPLES_PER_BUCKET: usize = 26;

/// One observed (power, speed) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct TrainingSample {
    /// Power in watts
    pub power: f64,
    /// Speed in mph
    pub speed: f64,
}

impl From<(f64, f64)> for TrainingSample {
    fn from((power, speed): (f64, f64)) -> Self {
        Self { power, speed }
    }
}

impl From<TrainingSample> for (f64, f64) {
    fn from(sample: TrainingSample) -> Self {
        (sample.power, sample.speed)
    }
}

/// resistance -> cadence -> samples
pub type TrainingGrid = BTreeMap<u8, BTreeMap<u16, Vec<TrainingSample>>>;

/// Accumulated training samples.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingStore {
    grid: TrainingGrid,
}

impl Default for TrainingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainingStore {
    /// Create the full grid with every bucket empty.
    pub fn new() -> Self {
        Self::from_grid(TrainingGrid::new())
    }

    /// Wrap a loaded grid, adding any bucket it is missing.
    pub fn from_grid(mut grid: TrainingGrid) -> Self {
        for resistance in 0..RESISTANCE_LEVELS {
            let row = grid.entry(resistance).or_default();
            for cadence in CADENCE_RANGE {
                row.entry(cadence).or_default();
            }
        }
        Self { grid }
    }

    /// The underlying grid.
    pub fn grid(&self) -> &TrainingGrid {
        &self.grid
    }

    /// Add a sample unless the bucket is full or out of range.
    ///
    /// Returns whether the sample was kept. A full bucket is not an error.
    pub fn record(&mut self, resistance: u8, cadence: u16, power: f64, speed: f64) -> bool {
        if cadence <= MIN_RECORD_CADENCE || !CADENCE_RANGE.contains(&cadence) {
            return false;
        }
        if resistance >= RESISTANCE_LEVELS {
            return false;
        }

        let bucket = self
            .grid
            .entry(resistance)
            .or_default()
            .entry(cadence)
            .or_default();

        if bucket.len() >= MAX_SAMPLES_PER_BUCKET {
            return false;
        }

        bucket.push(TrainingSample { power, speed });
        true
    }

    /// Samples in one bucket.
    pub fn samples(&self, resistance: u8, cadence: u16) -> &[TrainingSample] {
        self.grid
            .get(&resistance)
            .and_then(|row| row.get(&cadence))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Sample count per cadence at one resistance, ascending cadence.
    pub fn cadence_counts(&self, resistance: u8) -> Vec<(u16, usize)> {
        CADENCE_RANGE
            .map(|cadence| (cadence, self.samples(resistance, cadence).len()))
            .collect()
    }

    /// Total samples across the grid.
    pub fn total_samples(&self) -> usize {
        self.grid
            .values()
            .flat_map(|row| row.values())
            .map(Vec::len)
            .sum()
    }

    /// Predict the resistance that produced `(power, speed)` at `cadence`.
    ///
    /// Uses the populated cadence bucket nearest to `cadence` (lower cadence on
    /// a tie), then picks the resistance owning the single sample with the
    /// smallest absolute power difference. Equal power differences fall back to
    /// the speed difference, then to the lowest resistance. Returns `None` while
    /// the store is empty.
    pub fn predict_resistance(&self, cadence: u16, power: f64, speed: f64) -> Option<u8> {
        let bucket = self.nearest_populated_cadence(cadence)?;

        let mut best: Option<(u8, f64, f64)> = None;
        for (&resistance, row) in &self.grid {
            let Some(samples) = row.get(&bucket) else {
                continue;
            };

            for sample in samples {
                let power_diff = (sample.power - power).abs();
                let speed_diff = (sample.speed - speed).abs();
                let closer = match best {
                    None => true,
                    Some((_, best_power, best_speed)) => {
                        power_diff < best_power
                            || (power_diff == best_power && speed_diff < best_speed)
                    }
                };
                if closer {
                    best = Some((resistance, power_diff, speed_diff));
                }
            }
        }

        best.map(|(resistance, _, _)| resistance)
    }

    fn nearest_populated_cadence(&self, cadence: u16) -> Option<u16> {
        let populated: BTreeSet<u16> = self
            .grid
            .values()
            .flat_map(|row| row.iter())
            .filter(|(_, samples)| !samples.is_empty())
            .map(|(cadence, _)| *cadence)
            .collect();

        // Ascending order makes min_by_key keep the lower cadence on ties
        populated
            .into_iter()
            .min_by_key(|bucket| bucket.abs_diff(cadence))
    }

    /// Load a store from a JSON file.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| StoreError::IoError(format!("{}: {}", path.display(), e)))?;

        let grid: TrainingGrid = serde_json::from_str(&content)
            .map_err(|e| StoreError::ParseError(format!("{}: {}", path.display(), e)))?;

        Ok(Self::from_grid(grid))
    }

    /// Load the store at `path`, or create and save an empty grid there.
    pub fn load_or_init(path: &Path) -> Result<Self, StoreError> {
        if path.exists() {
            let store = Self::load(path)?;
            tracing::info!(
                "Loaded training data ({} samples) from {}",
                store.total_samples(),
                path.display()
            );
            return Ok(store);
        }

        tracing::info!("No training data at {}, creating empty grid", path.display());
        let store = Self::new();
        store.save(path)?;
        Ok(store)
    }

    /// Save the store as JSON, replacing the file in one rename.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string(&self.grid)
            .map_err(|e| StoreError::SerializeError(e.to_string()))?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content).map_err(|e| StoreError::IoError(e.to_string()))?;
        std::fs::rename(&tmp, path).map_err(|e| StoreError::IoError(e.to_string()))?;

        Ok(())
    }
}

/// Training store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
