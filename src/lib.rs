//! SpinZone - live power and heart rate zones for BLE indoor bikes
//!
//! Connects to an indoor bike and a heart rate monitor over Bluetooth Low
//! Energy, classifies their metrics into training zones, records them to
//! InfluxDB, and learns to predict the bike's resistance from training
//! sessions.

pub mod metrics;
pub mod recording;
pub mod sensors;
pub mod session;
pub mod storage;
pub mod ui;

// Re-export commonly used types
pub use metrics::zones::{HeartZones, PowerZones};
pub use sensors::device::Device;
pub use session::orchestrator::{Session, SessionMode, SessionOutcome};
pub use session::state::SessionState;
pub use storage::config::UserProfile;
pub use storage::training::TrainingStore;
