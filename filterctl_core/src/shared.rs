//! State shared between the control task and the subscriber task.
//!
//! Request flags are plain atomics set by the control task and consumed by
//! the supervisor at its loop boundaries. The compound pieces (configuration
//! and the status snapshot) live behind mutexes so that a status reply always
//! observes a consistent snapshot.

use std::sync::atomic::{AtomicBool, AtomicI8, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::attenuation::Attenuation;
use crate::config::RuntimeConfig;
use crate::state::ControlState;
use crate::NO_FRAMES;

/// Snapshot of the supervisor's observable state, refreshed once per pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Telemetry {
    pub state: ControlState,
    pub current_attenuation: Attenuation,
    pub last_received_frame: i64,
    pub last_processed_frame: i64,
    pub process_duration_us: u64,
    pub process_period_us: u64,
    /// Arrival of the most recent data message, in ms since the shared epoch.
    pub last_message_ms: Option<u64>,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self {
            state: ControlState::default(),
            current_attenuation: Attenuation::MIN,
            last_received_frame: NO_FRAMES,
            last_processed_frame: NO_FRAMES,
            process_duration_us: 0,
            process_period_us: 0,
            last_message_ms: None,
        }
    }
}

/// No pending manual attenuation request.
const MANUAL_NONE: i8 = -1;

pub struct Shared {
    pub shutdown: AtomicBool,
    pub clear_error: AtomicBool,
    pub singleshot_start: AtomicBool,
    pub reset_frames: AtomicBool,
    manual_attenuation: AtomicI8,
    config: Mutex<RuntimeConfig>,
    telemetry: Mutex<Telemetry>,
    /// Process start; all telemetry timestamps are relative to this.
    pub epoch: Instant,
}

impl Shared {
    pub fn new(config: RuntimeConfig, epoch: Instant) -> Self {
        Self {
            shutdown: AtomicBool::new(false),
            clear_error: AtomicBool::new(false),
            singleshot_start: AtomicBool::new(false),
            reset_frames: AtomicBool::new(false),
            manual_attenuation: AtomicI8::new(MANUAL_NONE),
            config: Mutex::new(config),
            telemetry: Mutex::new(Telemetry::default()),
            epoch,
        }
    }

    pub fn config(&self) -> MutexGuard<'_, RuntimeConfig> {
        self.config.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a manual attenuation request; the supervisor applies it at its
    /// next pass while the mode is still MANUAL.
    pub fn request_manual_attenuation(&self, level: Attenuation) {
        self.manual_attenuation
            .store(level.level() as i8, Ordering::Release);
    }

    pub fn take_manual_attenuation(&self) -> Option<Attenuation> {
        let raw = self.manual_attenuation.swap(MANUAL_NONE, Ordering::AcqRel);
        if raw == MANUAL_NONE {
            None
        } else {
            Some(Attenuation::clamped(i64::from(raw)))
        }
    }

    pub fn publish_telemetry(&self, snapshot: Telemetry) {
        *self
            .telemetry
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    pub fn telemetry(&self) -> Telemetry {
        *self
            .telemetry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
