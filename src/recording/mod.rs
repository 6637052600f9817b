//! Recording of live metrics to a time-series store.

pub mod influx;
pub mod point;
pub mod writer;

pub use influx::{DiscardSink, InfluxSink, PointSink, RecordingSink, SinkError};
pub use point::{DataPoint, FieldValue};
pub use writer::{point_queue, write_points, PointQueue, POINT_QUEUE_CAPACITY};
