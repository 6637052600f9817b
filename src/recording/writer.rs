//! Queue between the notification handlers and the point sink.
//!
//! Handlers enqueue points without waiting. One writer task drains the queue,
//! so a slow sink holds up only the writer and never a polling task.

use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{Interval, MissedTickBehavior};

use crate::recording::influx::PointSink;
use crate::recording::point::DataPoint;
use crate::session::state::{SessionState, TaskId};

/// Points buffered for the writer before new ones are dropped.
pub const POINT_QUEUE_CAPACITY: usize = 64;

/// Create a point queue holding at most `capacity` unwritten points.
pub fn point_queue(capacity: usize) -> (PointQueue, mpsc::Receiver<DataPoint>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (PointQueue { tx, dropped: 0 }, rx)
}

/// Sending half of the point queue, held by the notification handlers.
#[derive(Debug, Clone)]
pub struct PointQueue {
    tx: mpsc::Sender<DataPoint>,
    /// Points dropped since the queue last accepted one
    dropped: usize,
}

impl PointQueue {
    /// Enqueue a point, dropping it if the writer is behind or gone.
    pub fn push(&mut self, point: DataPoint) {
        match self.tx.try_send(point) {
            Ok(()) => {
                if self.dropped > 0 {
                    tracing::info!(
                        "Point writer caught up after dropping {} points",
                        self.dropped
                    );
                    self.dropped = 0;
                }
            }
            Err(TrySendError::Full(point)) => {
                if self.dropped == 0 {
                    tracing::warn!(
                        "Point queue full, dropping {} point until the sink catches up",
                        point.measurement
                    );
                }
                self.dropped += 1;
            }
            Err(TrySendError::Closed(point)) => {
                tracing::debug!("Point writer stopped, dropping {} point", point.measurement);
            }
        }
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

/// Write queued points to `sink` while `task` is active.
///
/// The flag is rechecked every `tick`, including while a write is in flight;
/// a write still pending when the session stops is abandoned.
pub async fn write_points<S: PointSink>(
    state: &SessionState,
    task: TaskId,
    sink: &S,
    mut points: mpsc::Receiver<DataPoint>,
    tick: Duration,
) {
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    while state.is_active(task) {
        tokio::select! {
            point = points.recv() => match point {
                Some(point) => {
                    if !write_until_stopped(state, task, sink, &point, &mut ticker).await {
                        tracing::debug!("Abandoned {} point write", point.measurement);
                        break;
                    }
                }
                None => break,
            },
            _ = ticker.tick() => {}
        }
    }

    tracing::debug!("Point writer stopped");
}

/// Returns `false` if the session stopped before the write finished.
async fn write_until_stopped<S: PointSink>(
    state: &SessionState,
    task: TaskId,
    sink: &S,
    point: &DataPoint,
    ticker: &mut Interval,
) -> bool {
    let write = sink.write_point(point);
    tokio::pin!(write);

    loop {
        tokio::select! {
            result = &mut write => {
                if let Err(e) = result {
                    tracing::warn!("Dropping {} point: {}", point.measurement, e);
                }
                return true;
            }
            _ = ticker.tick() => {
                if !state.is_active(task) {
                    return false;
                }
            }
        }
    }
}
