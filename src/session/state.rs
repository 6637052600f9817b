//! Shared lifecycle flags for the tasks of one session.
//!
//! Each task owns one key and only ever transitions that key; [`SessionState::stop`]
//! is the single operation that touches every key. Tasks observe a stop at their
//! next recheck, so cancellation is cooperative.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Lifecycle of one session task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopStatus {
    /// Not running, or asked to stop
    #[default]
    Inactive,
    /// Resolving or opening the device link
    Connecting,
    /// Running
    Active,
}

impl fmt::Display for LoopStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopStatus::Inactive => write!(f, "Inactive"),
            LoopStatus::Connecting => write!(f, "Connecting..."),
            LoopStatus::Active => write!(f, "Active"),
        }
    }
}

/// Identifier of a session task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskId {
    /// Indoor bike polling
    Bike,
    /// Heart rate monitor polling
    HeartRate,
    /// Dashboard refresh
    Display,
    /// Workout duration timer
    Timer,
    /// Point writer draining the persistence queue
    Recorder,
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Bike => write!(f, "bike"),
            TaskId::HeartRate => write!(f, "heart_rate"),
            TaskId::Display => write!(f, "display"),
            TaskId::Timer => write!(f, "timer"),
            TaskId::Recorder => write!(f, "recorder"),
        }
    }
}

/// Cloneable handle to the task flag map.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    flags: Arc<Mutex<HashMap<TaskId, LoopStatus>>>,
}

impl SessionState {
    /// Create an empty flag map.
    pub fn new() -> Self {
        Self::default()
    }

    // Flags are plain Copy values, a panic elsewhere cannot leave them torn.
    fn lock(&self) -> MutexGuard<'_, HashMap<TaskId, LoopStatus>> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the key set. Called once per session, before any task runs.
    pub fn register(&self, tasks: &[(TaskId, LoopStatus)]) {
        let mut flags = self.lock();
        flags.clear();
        flags.extend(tasks.iter().copied());
    }

    /// Current status of a task; unregistered tasks read as inactive.
    pub fn status(&self, task: TaskId) -> LoopStatus {
        self.lock().get(&task).copied().unwrap_or_default()
    }

    /// Whether a task should keep running.
    pub fn is_active(&self, task: TaskId) -> bool {
        self.status(task) == LoopStatus::Active
    }

    /// Set a registered task's status. Unregistered keys are left alone.
    pub fn set(&self, task: TaskId, status: LoopStatus) {
        if let Some(flag) = self.lock().get_mut(&task) {
            *flag = status;
        }
    }

    /// Move a task from `from` to `to`, failing if another transition got there first.
    pub fn transition(&self, task: TaskId, from: LoopStatus, to: LoopStatus) -> bool {
        match self.lock().get_mut(&task) {
            Some(flag) if *flag == from => {
                *flag = to;
                true
            }
            _ => false,
        }
    }

    /// Ask every task to stop.
    ///
    /// Idempotent and free of I/O so it can run from a signal handler task.
    pub fn stop(&self) {
        for flag in self.lock().values_mut() {
            *flag = LoopStatus::Inactive;
        }
    }

    /// Whether every registered task is inactive.
    pub fn is_stopped(&self) -> bool {
        self.lock().values().all(|flag| *flag == LoopStatus::Inactive)
    }
}
