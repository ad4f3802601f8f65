//! Test doubles for the capability traits.
//!
//! These live in the crate proper (not behind `cfg(test)`) so integration
//! tests and downstream bench harnesses can drive the engine without real
//! sockets or a motion controller.

use std::collections::VecDeque;
use std::error::Error;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::messages::AttenuationEvent;
use filterctl_traits::{Clock, ControlChannel, DataChannel, EventChannel, MotionSink, MovePhase, FILTER_COUNT};

/// One recorded motion-sink invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    Targets(MovePhase, [i32; FILTER_COUNT]),
    Run,
    CloseShutter,
}

/// Records every motion command. Clones share the same call log, so a test
/// can keep a handle while the engine owns the sink.
#[derive(Debug, Default, Clone)]
pub struct RecordingMotionSink {
    calls: Arc<Mutex<Vec<SinkCall>>>,
    fail: bool,
}

impl RecordingMotionSink {
    /// A sink whose every call errors, for best-effort paths.
    pub fn failing() -> Self {
        Self {
            calls: Arc::default(),
            fail: true,
        }
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, call: SinkCall) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
        if self.fail {
            Err("motion sink offline".into())
        } else {
            Ok(())
        }
    }
}

impl MotionSink for RecordingMotionSink {
    fn set_move_targets(
        &mut self,
        phase: MovePhase,
        positions: [i32; FILTER_COUNT],
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.record(SinkCall::Targets(phase, positions))
    }

    fn run_move_program(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.record(SinkCall::Run)
    }

    fn close_shutter(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.record(SinkCall::CloseShutter)
    }
}

/// Serves scripted poll batches in order, then reports nothing readable.
#[derive(Debug, Default)]
pub struct ScriptedDataChannel {
    batches: VecDeque<Vec<String>>,
}

impl ScriptedDataChannel {
    pub fn new(batches: impl IntoIterator<Item = Vec<String>>) -> Self {
        Self {
            batches: batches.into_iter().collect(),
        }
    }

    pub fn push_batch(&mut self, batch: Vec<String>) {
        self.batches.push_back(batch);
    }
}

impl DataChannel for ScriptedDataChannel {
    fn poll(
        &mut self,
        _timeout: Duration,
    ) -> Result<Vec<String>, Box<dyn Error + Send + Sync>> {
        Ok(self.batches.pop_front().unwrap_or_default())
    }
}

/// Collects published payloads; clones share the same log.
#[derive(Debug, Default, Clone)]
pub struct CollectingEventChannel {
    payloads: Arc<Mutex<Vec<String>>>,
}

impl CollectingEventChannel {
    pub fn payloads(&self) -> Vec<String> {
        self.payloads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Published events, parsed back from the wire.
    pub fn events(&self) -> Vec<AttenuationEvent> {
        self.payloads()
            .iter()
            .filter_map(|payload| serde_json::from_str(payload).ok())
            .collect()
    }
}

impl EventChannel for CollectingEventChannel {
    fn publish(&mut self, payload: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.payloads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(payload.to_string());
        Ok(())
    }
}

/// Control channel that serves a scripted request sequence and records
/// replies. `recv_request` returns `Ok(None)` once the script is exhausted.
#[derive(Debug, Default)]
pub struct ScriptedControlChannel {
    requests: VecDeque<String>,
    replies: Arc<Mutex<Vec<String>>>,
}

impl ScriptedControlChannel {
    pub fn new(requests: impl IntoIterator<Item = String>) -> Self {
        Self {
            requests: requests.into_iter().collect(),
            replies: Arc::default(),
        }
    }

    pub fn reply_log(&self) -> Arc<Mutex<Vec<String>>> {
        self.replies.clone()
    }
}

impl ControlChannel for ScriptedControlChannel {
    fn recv_request(
        &mut self,
        _timeout: Duration,
    ) -> Result<Option<String>, Box<dyn Error + Send + Sync>> {
        Ok(self.requests.pop_front())
    }

    fn send_reply(&mut self, reply: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(reply.to_string());
        Ok(())
    }
}

/// Deterministic test clock whose time can be advanced manually.
///
/// now() = origin + offset; sleep(d) advances internal time by d without
/// actually sleeping.
#[derive(Debug, Clone)]
pub struct TestClock {
    origin: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TestClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Advance the clock by the given duration.
    pub fn advance(&self, d: Duration) {
        let mut off = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *off = off.saturating_add(d);
    }
}

impl Clock for TestClock {
    fn now(&self) -> Instant {
        let off = *self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        self.origin + off
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}
