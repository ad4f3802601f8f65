//! The state supervisor: one pass per subscriber tick.
//!
//! Pass order is fixed: mode reconciliation (with singleshot sub-logic),
//! timeout check, error clearing, then socket drain. Per-message handling
//! publishes the frame's event before making the frame's decision, so the
//! event always describes the conditions that existed during that frame's
//! exposure.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::attenuation::{Attenuation, MAX_ATTENUATION};
use crate::config::Thresholds;
use crate::engine::FilterEngine;
use crate::messages::{AttenuationEvent, DataMessage, HistogramSummary};
use crate::shared::{Shared, Telemetry};
use crate::state::{ControlMode, ControlState, ErrorState, HealthyState};
use crate::NO_FRAMES;
use filterctl_traits::{Clock, DataChannel, EventChannel, MotionSink};

/// Poll timeout for the data sockets; also the idle tick period.
pub const DATA_POLL_TIMEOUT: Duration = Duration::from_millis(100);

pub struct Supervisor<M: MotionSink, E: EventChannel> {
    engine: FilterEngine<M>,
    events: E,
    shared: Arc<Shared>,
    clock: Arc<dyn Clock + Send + Sync>,
    state: ControlState,
    last_received_frame: i64,
    last_processed_frame: i64,
    last_adjustment: i32,
    // Arrival times in µs since the shared epoch
    last_message_us: Option<u64>,
    last_process_us: Option<u64>,
    process_duration_us: u64,
    process_period_us: u64,
}

impl<M: MotionSink, E: EventChannel> Supervisor<M, E> {
    pub fn new(
        engine: FilterEngine<M>,
        events: E,
        shared: Arc<Shared>,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        Self {
            engine,
            events,
            shared,
            clock,
            state: ControlState::default(),
            last_received_frame: NO_FRAMES,
            last_processed_frame: NO_FRAMES,
            last_adjustment: 0,
            last_message_us: None,
            last_process_us: None,
            process_duration_us: 0,
            process_period_us: 0,
        }
    }

    pub fn state(&self) -> ControlState {
        self.state
    }

    pub fn current_attenuation(&self) -> Attenuation {
        self.engine.attenuation()
    }

    /// One full supervisor pass: reconcile, drain, publish telemetry.
    pub fn run_pass<D: DataChannel>(&mut self, data: &mut D) {
        self.tick();
        match data.poll(DATA_POLL_TIMEOUT) {
            Ok(payloads) => {
                for payload in payloads {
                    if !self.state.accepts_data() {
                        // Keep the conflated sockets drained, but act on nothing.
                        tracing::trace!(state = self.state.wire(), "discarding data message");
                        continue;
                    }
                    if let Some(message) = DataMessage::parse(&payload) {
                        self.handle_message(&message);
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "data poll failed"),
        }
        self.sync_telemetry();
    }

    /// Mode reconciliation, timeout enforcement and flag consumption. Runs
    /// once per pass, before the socket drain.
    pub fn tick(&mut self) {
        use HealthyState::*;

        let (mode, timeout) = {
            let cfg = self.shared.config();
            (cfg.mode, cfg.timeout)
        };

        if self.shared.reset_frames.swap(false, Ordering::AcqRel) {
            tracing::info!("resetting frame counters");
            self.last_received_frame = NO_FRAMES;
            self.last_processed_frame = NO_FRAMES;
        }

        if let Some(level) = self.shared.take_manual_attenuation() {
            if mode == ControlMode::Manual {
                let positions = self.shared.config().positions;
                self.engine.set_attenuation(level, &positions);
            } else {
                tracing::debug!(
                    level = level.level(),
                    "discarding manual attenuation request outside MANUAL"
                );
            }
        }

        match mode {
            ControlMode::Manual => {
                if self.state != ControlState::Healthy(Idle) {
                    self.set_state(ControlState::Healthy(Idle));
                }
            }
            ControlMode::Continuous => {
                if matches!(
                    self.state,
                    ControlState::Healthy(Idle | SingleshotComplete | SingleshotWaiting)
                ) {
                    self.enter_waiting();
                }
            }
            ControlMode::Singleshot => {
                if matches!(self.state, ControlState::Healthy(Idle | Waiting)) {
                    self.set_state(ControlState::Healthy(SingleshotWaiting));
                }
                self.reconcile_singleshot();
            }
        }

        if matches!(self.state, ControlState::Healthy(Active | SingleshotComplete)) {
            if let Some(last_us) = self.last_message_us {
                let now_us = self.clock.us_since(self.shared.epoch);
                let timeout_us = timeout.as_micros().min(u128::from(u64::MAX)) as u64;
                if now_us.saturating_sub(last_us) >= timeout_us {
                    tracing::warn!(
                        timeout_s = timeout.as_secs_f64(),
                        "no data within timeout window"
                    );
                    self.enter_error(ErrorState::Timeout);
                }
            }
        }

        if self.state.is_error() && self.shared.clear_error.swap(false, Ordering::AcqRel) {
            let next = if mode == ControlMode::Singleshot {
                SingleshotWaiting
            } else {
                Waiting
            };
            tracing::info!(to = ControlState::Healthy(next).wire(), "clearing error state");
            self.set_state(ControlState::Healthy(next));
        }
    }

    fn reconcile_singleshot(&mut self) {
        use HealthyState::*;

        if self.shared.singleshot_start.load(Ordering::Acquire)
            && matches!(
                self.state,
                ControlState::Healthy(SingleshotWaiting | SingleshotComplete)
            )
        {
            tracing::debug!("singleshot run starting");
            self.enter_waiting();
        }

        if self.state == ControlState::Healthy(Active) {
            // Stabilized: a received frame caused no adjustment, or nothing
            // is left to retract.
            let frame_skipped = self.last_received_frame >= self.last_processed_frame + 2;
            if frame_skipped || self.engine.attenuation().is_min() {
                tracing::info!(
                    attenuation = self.engine.attenuation().level(),
                    "singleshot complete"
                );
                self.shared.singleshot_start.store(false, Ordering::Release);
                self.set_state(ControlState::Healthy(SingleshotComplete));
            }
        }
    }

    /// Act on a validated data message. Outside WAITING and ACTIVE the
    /// message is discarded unseen.
    pub fn handle_message(&mut self, message: &DataMessage) {
        if !self.state.accepts_data() {
            tracing::trace!(frame = message.frame_number, "discarding data message");
            return;
        }
        let arrived_us = self.clock.us_since(self.shared.epoch);
        self.last_received_frame = message.frame_number;
        self.last_message_us = Some(arrived_us);

        // Publish before deciding: the event carries the previous frame's
        // outcome, which is what was in effect during this frame's exposure.
        self.publish_event(message.frame_number);

        let thresholds = self.shared.config().thresholds.clone();

        if message.parameters.high3 > thresholds.high3 {
            tracing::warn!(
                frame = message.frame_number,
                high3 = message.parameters.high3,
                threshold = thresholds.high3,
                "high3 threshold breached; closing shutter"
            );
            self.engine.close_shutter();
            self.last_adjustment = i32::from(MAX_ATTENUATION);
            self.enter_error(ErrorState::High3Triggered);
            return;
        }

        // Dropped frames move no filters, so the next frame's exposure is
        // clean: its event must carry a zero adjustment.
        if message.frame_number <= self.last_processed_frame {
            tracing::debug!(
                frame = message.frame_number,
                last_processed = self.last_processed_frame,
                "ignoring late frame"
            );
            self.last_adjustment = 0;
            return;
        }
        if message.frame_number == self.last_processed_frame + 1 {
            // The previous adjustment cannot have taken effect yet.
            tracing::debug!(frame = message.frame_number, "ignoring subsequent frame");
            self.last_adjustment = 0;
            return;
        }

        match select_adjustment(&message.parameters, &thresholds) {
            Some(delta) => {
                let target = self.engine.attenuation().offset(delta);
                let positions = self.shared.config().positions;
                self.engine.set_attenuation(target, &positions);
                self.last_adjustment = delta;
                self.last_processed_frame = message.frame_number;
                if let Some(previous_us) = self.last_process_us {
                    self.process_period_us = arrived_us.saturating_sub(previous_us);
                }
                self.last_process_us = Some(arrived_us);
            }
            None => {
                self.last_adjustment = 0;
            }
        }

        let measured_us = self
            .clock
            .us_since(self.shared.epoch)
            .saturating_sub(arrived_us);
        self.process_duration_us = (self.process_duration_us + measured_us) / 2;

        if self.state == ControlState::Healthy(HealthyState::Waiting) {
            self.set_state(ControlState::Healthy(HealthyState::Active));
        }
    }

    /// Refresh the shared status snapshot.
    pub fn sync_telemetry(&self) {
        let snapshot = Telemetry {
            state: self.state,
            current_attenuation: self.engine.attenuation(),
            last_received_frame: self.last_received_frame,
            last_processed_frame: self.last_processed_frame,
            process_duration_us: self.process_duration_us,
            process_period_us: self.process_period_us,
            last_message_ms: self.last_message_us.map(|us| us / 1000),
        };
        self.shared.publish_telemetry(snapshot);
    }

    fn publish_event(&mut self, frame_number: i64) {
        let event = AttenuationEvent {
            frame_number,
            adjustment: self.last_adjustment,
            attenuation: self.engine.attenuation().level(),
        };
        match serde_json::to_string(&event) {
            Ok(payload) => {
                if let Err(e) = self.events.publish(&payload) {
                    tracing::warn!(error = %e, "event publish failed");
                }
            }
            Err(e) => tracing::warn!(error = %e, "event serialization failed"),
        }
    }

    /// Enter WAITING from a healthy state: attenuation goes to maximum first,
    /// the state write comes last.
    fn enter_waiting(&mut self) {
        let positions = self.shared.config().positions;
        self.engine.set_attenuation(Attenuation::MAX, &positions);
        self.set_state(ControlState::Healthy(HealthyState::Waiting));
    }

    fn enter_error(&mut self, error: ErrorState) {
        let positions = self.shared.config().positions;
        self.engine.set_attenuation(Attenuation::MAX, &positions);
        self.set_state(ControlState::Error(error));
    }

    fn set_state(&mut self, next: ControlState) {
        if next != self.state {
            tracing::debug!(from = self.state.wire(), to = next.wire(), "state transition");
            self.state = next;
        }
    }
}

/// Threshold selection with strict priority; first match wins. High bins use
/// greater-than (too many counts: attenuate more), low bins use less-than
/// (too few counts: attenuate less).
fn select_adjustment(histogram: &HistogramSummary, thresholds: &Thresholds) -> Option<i32> {
    if histogram.high2 > thresholds.high2 {
        tracing::debug!(count = histogram.high2, "high2 threshold triggered");
        Some(2)
    } else if histogram.high1 > thresholds.high1 {
        tracing::debug!(count = histogram.high1, "high1 threshold triggered");
        Some(1)
    } else if histogram.low2 < thresholds.low2 {
        tracing::debug!(count = histogram.low2, "low2 threshold triggered");
        Some(-2)
    } else if histogram.low1 < thresholds.low1 {
        tracing::debug!(count = histogram.low1, "low1 threshold triggered");
        Some(-1)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn histogram(low1: u64, low2: u64, high1: u64, high2: u64, high3: u64) -> HistogramSummary {
        HistogramSummary {
            low1,
            low2,
            high1,
            high2,
            high3,
        }
    }

    #[test]
    fn high_bins_take_priority_over_low_bins() {
        let thresholds = Thresholds::default();
        // Everything out of band at once: high2 wins.
        assert_eq!(
            select_adjustment(&histogram(0, 0, 5, 5, 0), &thresholds),
            Some(2)
        );
        assert_eq!(
            select_adjustment(&histogram(0, 0, 5, 0, 0), &thresholds),
            Some(1)
        );
        assert_eq!(
            select_adjustment(&histogram(0, 0, 0, 0, 0), &thresholds),
            Some(-2)
        );
        assert_eq!(
            select_adjustment(&histogram(0, 5, 0, 0, 0), &thresholds),
            Some(-1)
        );
        assert_eq!(
            select_adjustment(&histogram(5, 5, 0, 0, 0), &thresholds),
            None
        );
    }

    #[test]
    fn comparisons_are_strict_at_the_threshold() {
        let thresholds = Thresholds::default();
        // Counts exactly at the threshold trigger nothing: highs need `>`,
        // lows need `<`.
        assert_eq!(
            select_adjustment(&histogram(2, 2, 2, 2, 2), &thresholds),
            None
        );
    }
}
