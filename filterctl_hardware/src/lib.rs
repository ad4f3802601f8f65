//! filterctl_hardware: transport and motion backends behind `filterctl_traits`.
//!
//! - `transport`: ZeroMQ-backed control, data and event channels. The data
//!   sockets conflate, so a slow controller always sees the newest frame per
//!   endpoint rather than a backlog.
//! - `motion`: the motion-sink binding. Without a motion controller attached
//!   this is a logging no-op; the engine's behavior is otherwise identical.

pub mod error;
pub mod motion;
pub mod transport;

pub use error::TransportError;
pub use motion::LoggingMotionSink;
pub use transport::{ZmqControlChannel, ZmqDataChannel, ZmqEventChannel};
