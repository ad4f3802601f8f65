pub mod clock;

pub use clock::{Clock, MonotonicClock};

use std::time::Duration;

/// Number of filters in the attenuator assembly, and therefore of motion axes.
pub const FILTER_COUNT: usize = 4;

/// The two halves of an attenuation move. Insertions always run first so that
/// no filter leaves the beam before its replacement is in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovePhase {
    Insert,
    Retract,
}

impl MovePhase {
    /// Phase number as understood by the motion program (1 = insert, 2 = retract).
    pub fn number(self) -> u8 {
        match self {
            MovePhase::Insert => 1,
            MovePhase::Retract => 2,
        }
    }
}

/// Motion-controller capability. Implementations are fire-and-forget: the
/// engine never waits for a move to complete and never retries.
pub trait MotionSink {
    fn set_move_targets(
        &mut self,
        phase: MovePhase,
        positions: [i32; FILTER_COUNT],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Execute both phases back-to-back on the motion system.
    fn run_move_program(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Command emergency shutter closure.
    fn close_shutter(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Request/reply control channel. One outstanding request at a time.
pub trait ControlChannel {
    /// Wait up to `timeout` for a request; `Ok(None)` when none arrived.
    fn recv_request(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>>;

    fn send_reply(&mut self, reply: &str)
        -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Conflated subscription to one or more data endpoints.
pub trait DataChannel {
    /// Poll all endpoints for up to `timeout` and return at most one payload
    /// per endpoint that was readable.
    fn poll(
        &mut self,
        timeout: Duration,
    ) -> Result<Vec<String>, Box<dyn std::error::Error + Send + Sync>>;
}

/// Outbound event stream.
pub trait EventChannel {
    fn publish(&mut self, payload: &str)
        -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
