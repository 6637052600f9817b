//! Power and heart rate zone classification.
//!
//! A [`ZoneTable`] maps a ratio against a personal baseline (FTP for power,
//! age-derived maximum heart rate for heart rate) onto an ordered zone label.
//! Every zone owns the half-open interval `(previous upper, own upper]`; the
//! lowest zone starts at negative infinity and the highest ends at positive
//! infinity, so classification never fails.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use thiserror::Error;

/// RGB color representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Format as `#RRGGBB`.
    pub fn hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Errors raised while building a zone table.
#[derive(Debug, Error, PartialEq)]
pub enum ZoneError {
    /// Baseline must be a positive, finite number
    #[error("Zone baseline must be positive and finite, got {0}")]
    InvalidBaseline(f64),

    /// Age outside the range the max heart rate formula supports
    #[error("Age must be between 1 and 120, got {0}")]
    InvalidAge(u32),

    /// A table needs at least one zone
    #[error("Zone table is empty")]
    Empty,

    /// Upper bounds must strictly increase from the lowest zone upward
    #[error("Zone thresholds must be strictly increasing (index {index}: {value})")]
    NotIncreasing { index: usize, value: f64 },

    /// The highest zone must be open-ended
    #[error("Highest zone must have an unbounded upper limit, got {0}")]
    BoundedTop(f64),
}

/// An ordered zone label.
pub trait Zone: Copy + Eq + fmt::Debug + fmt::Display + 'static {
    /// Label used before any reading has been classified.
    const NO_ZONE: Self;

    /// Numeric zone value (0 = no zone, then 1..N from lowest to highest).
    fn value(self) -> u8;

    /// Display color.
    fn color(self) -> Color;
}

/// Heart rate zones expressed against maximum heart rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeartZone {
    NoZone,
    WarmUp,
    Endurance,
    Power,
    Threshold,
    MaxCapacity,
}

impl HeartZone {
    /// Every zone that classification can produce, lowest first.
    pub const ORDERED: [HeartZone; 5] = [
        HeartZone::WarmUp,
        HeartZone::Endurance,
        HeartZone::Power,
        HeartZone::Threshold,
        HeartZone::MaxCapacity,
    ];
}

impl Zone for HeartZone {
    const NO_ZONE: Self = HeartZone::NoZone;

    fn value(self) -> u8 {
        self as u8
    }

    fn color(self) -> Color {
        HR_ZONE_COLORS[self as usize]
    }
}

impl fmt::Display for HeartZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeartZone::NoZone => write!(f, "No Zone"),
            HeartZone::WarmUp => write!(f, "Warm Up"),
            HeartZone::Endurance => write!(f, "Endurance"),
            HeartZone::Power => write!(f, "Power"),
            HeartZone::Threshold => write!(f, "Threshold"),
            HeartZone::MaxCapacity => write!(f, "Max Capacity"),
        }
    }
}

/// Power zones expressed against FTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerZone {
    NoZone,
    ActiveRecovery,
    Endurance,
    Tempo,
    LactateThreshold,
    Vo2Max,
    AnaerobicCapacity,
    NeuromuscularPower,
}

impl PowerZone {
    /// Every zone that classification can produce, lowest first.
    pub const ORDERED: [PowerZone; 7] = [
        PowerZone::ActiveRecovery,
        PowerZone::Endurance,
        PowerZone::Tempo,
        PowerZone::LactateThreshold,
        PowerZone::Vo2Max,
        PowerZone::AnaerobicCapacity,
        PowerZone::NeuromuscularPower,
    ];
}

impl Zone for PowerZone {
    const NO_ZONE: Self = PowerZone::NoZone;

    fn value(self) -> u8 {
        self as u8
    }

    fn color(self) -> Color {
        POWER_ZONE_COLORS[self as usize]
    }
}

impl fmt::Display for PowerZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerZone::NoZone => write!(f, "No Zone"),
            PowerZone::ActiveRecovery => write!(f, "Active Recovery"),
            PowerZone::Endurance => write!(f, "Endurance"),
            PowerZone::Tempo => write!(f, "Tempo"),
            PowerZone::LactateThreshold => write!(f, "Lactate Threshold"),
            PowerZone::Vo2Max => write!(f, "VO2 Max"),
            PowerZone::AnaerobicCapacity => write!(f, "Anaerobic Capacity"),
            PowerZone::NeuromuscularPower => write!(f, "Neuromuscular Power"),
        }
    }
}

/// Ordered zone thresholds against a personal baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneTable<Z: Zone> {
    baseline: f64,
    /// (zone, inclusive upper bound ratio), lowest zone first
    upper_bounds: Vec<(Z, f64)>,
    top: Z,
}

impl<Z: Zone> ZoneTable<Z> {
    /// Build a table, rejecting a degenerate baseline or non-monotonic thresholds.
    pub fn new(baseline: f64, upper_bounds: Vec<(Z, f64)>) -> Result<Self, ZoneError> {
        if !baseline.is_finite() || baseline <= 0.0 {
            return Err(ZoneError::InvalidBaseline(baseline));
        }

        let (top, last) = *upper_bounds.last().ok_or(ZoneError::Empty)?;
        if last != f64::INFINITY {
            return Err(ZoneError::BoundedTop(last));
        }

        let mut previous = f64::NEG_INFINITY;
        for (index, &(_, value)) in upper_bounds.iter().enumerate() {
            // NaN fails this comparison as well
            if !(value > previous) {
                return Err(ZoneError::NotIncreasing { index, value });
            }
            previous = value;
        }

        Ok(Self {
            baseline,
            upper_bounds,
            top,
        })
    }

    /// Baseline the ratios are expressed against.
    pub fn baseline(&self) -> f64 {
        self.baseline
    }

    /// Convert a raw value into a ratio of the baseline.
    pub fn ratio(&self, value: f64) -> f64 {
        value / self.baseline
    }

    /// Classify a ratio.
    ///
    /// Returns the first zone, scanning upward, whose upper bound is at
    /// least `ratio`. `NaN` lands in the highest zone.
    pub fn classify(&self, ratio: f64) -> Z {
        self.upper_bounds
            .iter()
            .find(|(_, upper)| ratio <= *upper)
            .map(|(zone, _)| *zone)
            .unwrap_or(self.top)
    }

    /// Classify a raw value (watts, bpm) against the baseline.
    pub fn classify_value(&self, value: f64) -> Z {
        self.classify(self.ratio(value))
    }

    /// Ratio bounds `(lower exclusive, upper inclusive)` of a zone.
    pub fn bounds(&self, zone: Z) -> Option<(f64, f64)> {
        let index = self.upper_bounds.iter().position(|(z, _)| *z == zone)?;
        let lower = match index {
            0 => f64::NEG_INFINITY,
            i => self.upper_bounds[i - 1].1,
        };
        Some((lower, self.upper_bounds[index].1))
    }

    /// Bounds of a zone scaled back into raw units.
    pub fn value_bounds(&self, zone: Z) -> Option<(f64, f64)> {
        self.bounds(zone)
            .map(|(lower, upper)| (lower * self.baseline, upper * self.baseline))
    }

    /// All zones with their upper bound ratio, lowest first.
    pub fn zones(&self) -> impl Iterator<Item = (Z, f64)> + '_ {
        self.upper_bounds.iter().copied()
    }
}

/// Heart rate zones.
pub type HeartZones = ZoneTable<HeartZone>;

/// Power zones.
pub type PowerZones = ZoneTable<PowerZone>;

impl ZoneTable<HeartZone> {
    /// Build heart rate zones from age, using `maxHR = 207 - 0.7 * age`.
    pub fn from_age(age: u32) -> Result<Self, ZoneError> {
        if !AGE_RANGE.contains(&age) {
            return Err(ZoneError::InvalidAge(age));
        }

        let thresholds = HeartZone::ORDERED
            .iter()
            .copied()
            .zip(HR_ZONE_THRESHOLDS)
            .collect();

        Self::new(max_heart_rate(age), thresholds)
    }

    /// Age-derived maximum heart rate.
    pub fn max_heart_rate(&self) -> f64 {
        self.baseline
    }
}

impl ZoneTable<PowerZone> {
    /// Build power zones from FTP in watts.
    pub fn from_ftp(ftp: u32) -> Result<Self, ZoneError> {
        let thresholds = PowerZone::ORDERED
            .iter()
            .copied()
            .zip(POWER_ZONE_THRESHOLDS)
            .collect();

        Self::new(ftp as f64, thresholds)
    }

    /// Functional threshold power in watts.
    pub fn ftp(&self) -> f64 {
        self.baseline
    }
}

/// Maximum heart rate estimate for an age.
pub fn max_heart_rate(age: u32) -> f64 {
    207.0 - 0.7 * age as f64
}

/// Ages the max heart rate estimate is valid for.
pub const AGE_RANGE: RangeInclusive<u32> = 1..=120;

/// Upper bounds of the heart rate zones as a fraction of max HR.
pub const HR_ZONE_THRESHOLDS: [f64; 5] = [0.65, 0.75, 0.85, 0.95, f64::INFINITY];

/// Upper bounds of the power zones as a fraction of FTP.
pub const POWER_ZONE_THRESHOLDS: [f64; 7] = [0.55, 0.75, 0.90, 1.05, 1.20, 1.50, f64::INFINITY];

/// Heart rate zone colors, indexed by zone value
pub const HR_ZONE_COLORS: [Color; 6] = [
    Color::new(133, 170, 213), // No Zone
    Color::new(254, 221, 85),  // Warm Up
    Color::new(247, 166, 79),  // Endurance
    Color::new(251, 131, 65),  // Power
    Color::new(246, 85, 85),   // Threshold
    Color::new(238, 77, 92),   // Max Capacity
];

/// Power zone colors, indexed by zone value
pub const POWER_ZONE_COLORS: [Color; 8] = [
    Color::new(133, 170, 213), // No Zone
    Color::new(71, 186, 171),  // Active Recovery
    Color::new(182, 194, 84),  // Endurance
    Color::new(209, 164, 56),  // Tempo
    Color::new(205, 147, 51),  // Lactate Threshold
    Color::new(211, 112, 14),  // VO2 Max
    Color::new(223, 80, 84),   // Anaerobic Capacity
    Color::new(191, 33, 30),   // Neuromuscular Power
];
