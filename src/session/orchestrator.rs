//! Session orchestration: resolve both devices, then run polling, display and
//! timer tasks together until the session is stopped.
//!
//! All tasks are futures joined inside one task, so they interleave only at
//! their own await points. The [`SessionState`] flag map is the only state
//! they share; metrics reach the display through `watch` channels and the
//! point writer through a bounded queue.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

use crate::metrics::zones::{HeartZones, PowerZones, ZoneError};
use crate::recording::influx::PointSink;
use crate::recording::writer::{point_queue, write_points, POINT_QUEUE_CAPACITY};
use crate::sensors::device::Device;
use crate::sensors::transport::BleTransport;
use crate::sensors::types::{SensorConfig, SensorError, SensorKind};
use crate::session::handlers::{
    BikeHandler, BikeStatus, Coverage, HeartHandler, HeartStatus, ResistanceSource,
};
use crate::session::state::{LoopStatus, SessionState, TaskId};
use crate::storage::config::{AppConfig, ConfigError, DeviceNames, UserProfile};
use crate::storage::training::{StoreError, TrainingStore, RESISTANCE_LEVELS};
use crate::ui::dashboard::{
    power_zone_limits, Dashboard, DashboardSnapshot, TrainingView, WorkoutView,
};

/// What a session does with bike data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Live workout, optionally ending after `duration`
    Workout { duration: Option<Duration> },
    /// Record training samples at a fixed resistance
    Training { resistance: u8 },
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionMode::Workout { duration: None } => write!(f, "workout"),
            SessionMode::Workout {
                duration: Some(duration),
            } => write!(f, "{}s workout", duration.as_secs()),
            SessionMode::Training { resistance } => {
                write!(f, "training (resistance {})", resistance)
            }
        }
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Tasks ran and were stopped
    Completed,
    /// Stopped before both devices were resolved
    Cancelled,
}

/// Session errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid zone configuration: {0}")]
    Zone(#[from] ZoneError),

    #[error("Device discovery failed: {0}")]
    Discovery(#[from] SensorError),

    #[error("Training store error: {0}")]
    Store(#[from] StoreError),

    #[error("Resistance must be below {max}, got {0}", max = RESISTANCE_LEVELS)]
    InvalidResistance(u8),
}

/// Tick intervals of a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionTiming {
    pub sensors: SensorConfig,
    /// Dashboard redraw interval
    pub refresh_interval: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            sensors: SensorConfig::default(),
            refresh_interval: Duration::from_millis(400),
        }
    }
}

impl From<&AppConfig> for SessionTiming {
    fn from(config: &AppConfig) -> Self {
        Self {
            sensors: SensorConfig::from(&config.sensors),
            refresh_interval: Duration::from_millis(config.display.refresh_interval_ms.max(1)),
        }
    }
}

/// Latest published metrics, read by the display task.
pub struct DisplayFeed {
    pub bike: watch::Receiver<BikeStatus>,
    pub heart: watch::Receiver<HeartStatus>,
    pub coverage: watch::Receiver<Coverage>,
}

impl DisplayFeed {
    /// Build the frame for the current mode from the latest metrics.
    pub fn snapshot(&self, mode: SessionMode, power_zones: &PowerZones) -> DashboardSnapshot {
        let bike = *self.bike.borrow();

        match mode {
            SessionMode::Training { resistance } => DashboardSnapshot::Training(TrainingView {
                resistance,
                cadence: bike.reading.cadence_rpm,
                counts: self.coverage.borrow().clone(),
            }),
            SessionMode::Workout { .. } => {
                let heart = *self.heart.borrow();
                DashboardSnapshot::Workout(WorkoutView {
                    cadence: bike.reading.cadence_rpm,
                    resistance: bike.resistance,
                    power: bike.reading.power_watts,
                    heart_rate: heart.reading.heart_rate_bpm,
                    heart_zone: heart.zone,
                    power_zone: bike.power_zone,
                    ftp: power_zones.ftp(),
                    power_bounds: power_zone_limits(power_zones, bike.power_zone),
                })
            }
        }
    }
}

/// One bike and one heart rate monitor, the rider's zones, and the
/// collaborators a session writes to.
pub struct Session<T: BleTransport, S: PointSink, D: Dashboard> {
    state: SessionState,
    bike: Device<T>,
    hrm: Device<T>,
    heart_zones: HeartZones,
    power_zones: PowerZones,
    store: TrainingStore,
    /// Where training sessions save the store; `None` keeps it in memory
    store_path: Option<PathBuf>,
    sink: S,
    dashboard: D,
    timing: SessionTiming,
}

impl<T: BleTransport, S: PointSink, D: Dashboard> Session<T, S, D> {
    /// Build a session from validated configuration.
    pub fn new(
        transport: Arc<T>,
        devices: &DeviceNames,
        user: &UserProfile,
        sink: S,
        dashboard: D,
        timing: SessionTiming,
    ) -> Result<Self, SessionError> {
        devices.validate()?;
        user.validate()?;

        let state = SessionState::new();
        let bike = Device::new(
            devices.bike.clone(),
            SensorKind::Bike,
            TaskId::Bike,
            Arc::clone(&transport),
            state.clone(),
            timing.sensors,
        );
        let hrm = Device::new(
            devices.hrm.clone(),
            SensorKind::HeartRateMonitor,
            TaskId::HeartRate,
            transport,
            state.clone(),
            timing.sensors,
        );

        Ok(Self {
            state,
            bike,
            hrm,
            heart_zones: user.heart_zones()?,
            power_zones: user.power_zones()?,
            store: TrainingStore::new(),
            store_path: None,
            sink,
            dashboard,
            timing,
        })
    }

    /// Use a loaded training store, saved back to `path` after training.
    pub fn with_training_store(mut self, store: TrainingStore, path: impl Into<PathBuf>) -> Self {
        self.store = store;
        self.store_path = Some(path.into());
        self
    }

    /// Handle for stopping the session from another task.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn store(&self) -> &TrainingStore {
        &self.store
    }

    pub fn bike(&self) -> &Device<T> {
        &self.bike
    }

    pub fn hrm(&self) -> &Device<T> {
        &self.hrm
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn dashboard(&self) -> &D {
        &self.dashboard
    }

    /// Ask every task to stop. Does no I/O.
    pub fn stop(&self) {
        self.state.stop();
    }

    /// Live workout; `None` runs until stopped.
    pub async fn start_workout(
        &mut self,
        duration: Option<Duration>,
    ) -> Result<SessionOutcome, SessionError> {
        self.run(SessionMode::Workout { duration }).await
    }

    /// Training session at a fixed resistance.
    pub async fn start_training(&mut self, resistance: u8) -> Result<SessionOutcome, SessionError> {
        self.run(SessionMode::Training { resistance }).await
    }

    /// Resolve both devices, run every task until stopped, then tear down.
    ///
    /// Failing to resolve a device is fatal; anything that goes wrong once the
    /// tasks are running is logged and the session carries on.
    pub async fn run(&mut self, mode: SessionMode) -> Result<SessionOutcome, SessionError> {
        if let SessionMode::Training { resistance } = mode {
            if resistance >= RESISTANCE_LEVELS {
                return Err(SessionError::InvalidResistance(resistance));
            }
        }

        let mut tasks = vec![
            (TaskId::Bike, LoopStatus::Connecting),
            (TaskId::HeartRate, LoopStatus::Connecting),
            (TaskId::Display, LoopStatus::Active),
        ];
        if let SessionMode::Workout { duration } = mode {
            tasks.push((TaskId::Recorder, LoopStatus::Active));
            if duration.is_some() {
                tasks.push((TaskId::Timer, LoopStatus::Active));
            }
        }
        self.state.register(&tasks);

        tracing::info!("Starting {} session", mode);

        match self.resolve_devices().await {
            Ok(()) => {}
            Err(SensorError::Cancelled(name)) => {
                tracing::info!("Session stopped while scanning for {}", name);
                self.state.stop();
                return Ok(SessionOutcome::Cancelled);
            }
            Err(e) => {
                self.state.stop();
                return Err(SessionError::Discovery(e));
            }
        }

        self.run_tasks(mode).await;

        self.state.stop();
        if let Err(e) = self.dashboard.close() {
            tracing::warn!("Failed to restore terminal: {}", e);
        }

        if let SessionMode::Training { .. } = mode {
            if let Some(path) = &self.store_path {
                self.store.save(path)?;
                tracing::info!(
                    "Saved training store ({} samples) to {}",
                    self.store.total_samples(),
                    path.display()
                );
            }
        }

        tracing::info!("Session stopped");
        Ok(SessionOutcome::Completed)
    }

    async fn resolve_devices(&mut self) -> Result<(), SensorError> {
        self.bike.scan_for_device().await?;
        self.hrm.scan_for_device().await?;
        Ok(())
    }

    async fn run_tasks(&mut self, mode: SessionMode) {
        let Session {
            state,
            bike,
            hrm,
            heart_zones,
            power_zones,
            store,
            sink,
            dashboard,
            timing,
            ..
        } = self;
        let state: &SessionState = state;
        let sink: &S = sink;
        let power_zones: &PowerZones = power_zones;

        let (bike_tx, bike_rx) = watch::channel(BikeStatus::default());
        let (heart_tx, heart_rx) = watch::channel(HeartStatus::default());
        let (coverage_tx, coverage_rx) = watch::channel(Coverage::new());
        let feed = DisplayFeed {
            bike: bike_rx,
            heart: heart_rx,
            coverage: coverage_rx,
        };

        let (source, record_heart_rate, duration) = match mode {
            SessionMode::Workout { duration } => (ResistanceSource::Predicted, true, duration),
            SessionMode::Training { resistance } => {
                (ResistanceSource::Training(resistance), false, None)
            }
        };

        // Training registers no recorder, so its writer returns at once
        let (points, queued) = point_queue(POINT_QUEUE_CAPACITY);
        let mut bike_handler =
            BikeHandler::new(power_zones, store, points.clone(), source, bike_tx, coverage_tx);
        let mut heart_handler = HeartHandler::new(heart_zones, points, record_heart_rate, heart_tx);

        let bike_task = async {
            if let Err(e) = bike.poll(&mut bike_handler).await {
                tracing::warn!("Bike polling ended: {}", e);
            }
        };
        let hrm_task = async {
            if let Err(e) = hrm.poll(&mut heart_handler).await {
                tracing::warn!("Heart rate polling ended: {}", e);
            }
        };
        let display_task = refresh_display(
            state,
            dashboard,
            &feed,
            mode,
            power_zones,
            timing.refresh_interval,
        );
        let timer_task = run_timer(state, duration, timing.sensors.poll_interval);
        let writer_task = write_points(
            state,
            TaskId::Recorder,
            sink,
            queued,
            timing.sensors.poll_interval,
        );

        tokio::join!(bike_task, hrm_task, display_task, timer_task, writer_task);
    }
}

/// Redraw the dashboard every `interval` while the display flag is active.
async fn refresh_display<D: Dashboard>(
    state: &SessionState,
    dashboard: &mut D,
    feed: &DisplayFeed,
    mode: SessionMode,
    power_zones: &PowerZones,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut render_failed = false;

    while state.is_active(TaskId::Display) {
        ticker.tick().await;

        if let Err(e) = dashboard.render(&feed.snapshot(mode, power_zones)) {
            if !render_failed {
                tracing::warn!("Dashboard render failed: {}", e);
                render_failed = true;
            }
        }
    }

    tracing::debug!("Display stopped");
}

/// Stop the session once `duration` has elapsed.
async fn run_timer(state: &SessionState, duration: Option<Duration>, tick: Duration) {
    let Some(duration) = duration else {
        return;
    };
    let deadline = Instant::now() + duration;

    while state.is_active(TaskId::Timer) {
        let now = Instant::now();
        if now >= deadline {
            tracing::info!("Workout time elapsed after {}s", duration.as_secs());
            state.stop();
            break;
        }
        tokio::time::sleep_until(deadline.min(now + tick)).await;
    }
}
