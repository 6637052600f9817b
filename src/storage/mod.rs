//! Storage module for configuration and the training store.

pub mod config;
pub mod training;

pub use config::{AppConfig, ConfigError, DataPaths, DeviceNames, UserProfile};
pub use training::{StoreError, TrainingSample, TrainingStore};
