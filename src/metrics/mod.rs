//! Metrics module for training zones.

pub mod zones;

pub use zones::{AGE_RANGE, HeartZone, HeartZones, PowerZone, PowerZones, Zone, ZoneError, ZoneTable};
