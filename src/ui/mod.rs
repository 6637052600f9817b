//! Terminal user interface.

pub mod ansi;
pub mod dashboard;

pub use dashboard::{
    Dashboard, DashboardSnapshot, TerminalDashboard, TrainingView, WorkoutView,
};
