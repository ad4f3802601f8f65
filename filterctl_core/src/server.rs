//! The JSON control protocol: request dispatch, configure, status.
//!
//! Requests are parsed once here; the supervisor never sees JSON. Malformed
//! input is never fatal: it yields `{"success": false}` and the controller
//! carries on.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};

use crate::attenuation::Attenuation;
use crate::shared::Shared;
use crate::state::ControlMode;
use filterctl_traits::{Clock, FILTER_COUNT};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const FILTER_KEYS: [&str; FILTER_COUNT] = ["filter1", "filter2", "filter3", "filter4"];

enum PositionSet {
    In,
    Out,
}

pub struct ControlServer {
    shared: Arc<Shared>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl ControlServer {
    pub fn new(shared: Arc<Shared>, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self { shared, clock }
    }

    /// Handle one raw request and produce the JSON reply string.
    pub fn handle_request(&self, raw: &str) -> String {
        self.dispatch(raw).to_string()
    }

    fn dispatch(&self, raw: &str) -> Value {
        let request: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(error = %err, "control request is not valid JSON");
                return failure();
            }
        };

        match request.get("command").and_then(Value::as_str) {
            Some("shutdown") => {
                tracing::info!("shutdown requested");
                self.shared
                    .shutdown
                    .store(true, std::sync::atomic::Ordering::Release);
                success()
            }
            Some("status") => json!({ "success": true, "status": self.status() }),
            Some("configure") => match request.get("params").and_then(Value::as_object) {
                Some(params) => json!({ "success": self.apply_config(params) }),
                None => {
                    tracing::warn!("configure request without params");
                    failure()
                }
            },
            Some("reset") => {
                self.shared
                    .reset_frames
                    .store(true, std::sync::atomic::Ordering::Release);
                success()
            }
            Some("clear_error") => {
                self.shared
                    .clear_error
                    .store(true, std::sync::atomic::Ordering::Release);
                success()
            }
            Some("singleshot") => {
                self.shared
                    .singleshot_start
                    .store(true, std::sync::atomic::Ordering::Release);
                success()
            }
            Some(other) => {
                tracing::warn!(command = other, "unknown command");
                failure()
            }
            None => {
                tracing::warn!("request missing command");
                failure()
            }
        }
    }

    fn status(&self) -> Value {
        let telemetry = self.shared.telemetry();
        let (mode, timeout, positions, thresholds) = {
            let cfg = self.shared.config();
            (
                cfg.mode,
                cfg.timeout,
                cfg.positions,
                cfg.thresholds.clone(),
            )
        };
        let now_ms = self.clock.ms_since(self.shared.epoch);
        let since_ms = match telemetry.last_message_ms {
            Some(at_ms) => now_ms.saturating_sub(at_ms),
            None => now_ms,
        };
        json!({
            "version": VERSION,
            "process_duration": telemetry.process_duration_us,
            "process_period": telemetry.process_period_us,
            "last_received_frame": telemetry.last_received_frame,
            "last_processed_frame": telemetry.last_processed_frame,
            "time_since_last_message": since_ms / 1000,
            "current_attenuation": telemetry.current_attenuation.level(),
            "timeout": timeout.as_secs_f64(),
            "state": telemetry.state.wire(),
            "mode": mode.wire(),
            "in_positions": positions_map(&positions.in_counts),
            "out_positions": positions_map(&positions.out_counts),
            "pixel_count_thresholds": {
                "low1": thresholds.low1,
                "low2": thresholds.low2,
                "high1": thresholds.high1,
                "high2": thresholds.high2,
                "high3": thresholds.high3,
            },
        })
    }

    /// Apply the recognized subset of configure keys. Each key applies
    /// atomically; a failed key leaves earlier keys applied but forces an
    /// unsuccessful reply.
    fn apply_config(&self, params: &Map<String, Value>) -> bool {
        let mut success = true;
        for (key, value) in params {
            let applied = match key.as_str() {
                "mode" => self.apply_mode(value),
                "timeout" => self.apply_timeout(value),
                "in_positions" => self.apply_positions(value, PositionSet::In),
                "out_positions" => self.apply_positions(value, PositionSet::Out),
                "pixel_count_thresholds" => self.apply_thresholds(value),
                "attenuation" => self.apply_manual_attenuation(value),
                other => {
                    tracing::debug!(key = other, "ignoring unrecognized configure key");
                    true
                }
            };
            success &= applied;
        }
        success
    }

    fn apply_mode(&self, value: &Value) -> bool {
        match value.as_i64().and_then(ControlMode::from_wire) {
            Some(mode) => {
                self.shared.config().mode = mode;
                tracing::info!(mode = mode.wire(), "mode configured");
                true
            }
            None => {
                tracing::warn!(%value, "invalid mode value");
                false
            }
        }
    }

    fn apply_timeout(&self, value: &Value) -> bool {
        match value.as_f64() {
            Some(seconds) if seconds.is_finite() && seconds >= 0.0 => {
                self.shared.config().timeout = Duration::from_secs_f64(seconds);
                tracing::info!(seconds, "timeout configured");
                true
            }
            _ => {
                tracing::warn!(%value, "invalid timeout value");
                false
            }
        }
    }

    fn apply_positions(&self, value: &Value, which: PositionSet) -> bool {
        let Some(map) = value.as_object() else {
            tracing::warn!(%value, "positions must be a mapping");
            return false;
        };
        let mut success = true;
        for (name, entry) in map {
            let Some(slot) = FILTER_KEYS.iter().position(|key| *key == name.as_str()) else {
                tracing::warn!(filter = %name, "unknown filter in positions");
                success = false;
                continue;
            };
            match entry.as_i64().and_then(|counts| i32::try_from(counts).ok()) {
                Some(counts) => {
                    let mut cfg = self.shared.config();
                    match which {
                        PositionSet::In => cfg.positions.in_counts[slot] = counts,
                        PositionSet::Out => cfg.positions.out_counts[slot] = counts,
                    }
                }
                None => {
                    tracing::warn!(filter = %name, %entry, "invalid position value");
                    success = false;
                }
            }
        }
        success
    }

    fn apply_thresholds(&self, value: &Value) -> bool {
        let Some(map) = value.as_object() else {
            tracing::warn!(%value, "pixel_count_thresholds must be a mapping");
            return false;
        };
        let mut success = true;
        for (bin, entry) in map {
            match entry.as_u64() {
                Some(count) => {
                    if !self.shared.config().thresholds.set(bin, count) {
                        tracing::warn!(bin = %bin, "unknown threshold bin");
                        success = false;
                    }
                }
                None => {
                    tracing::warn!(bin = %bin, %entry, "invalid threshold value");
                    success = false;
                }
            }
        }
        success
    }

    fn apply_manual_attenuation(&self, value: &Value) -> bool {
        if self.shared.config().mode != ControlMode::Manual {
            tracing::warn!("attenuation is only settable in MANUAL mode");
            return false;
        }
        match value.as_i64() {
            Some(level @ 0..=15) => {
                self.shared
                    .request_manual_attenuation(Attenuation::clamped(level));
                true
            }
            _ => {
                tracing::warn!(%value, "invalid attenuation value");
                false
            }
        }
    }
}

fn positions_map(counts: &[i32; FILTER_COUNT]) -> Value {
    json!({
        "filter1": counts[0],
        "filter2": counts[1],
        "filter3": counts[2],
        "filter4": counts[3],
    })
}

fn success() -> Value {
    json!({ "success": true })
}

fn failure() -> Value {
    json!({ "success": false })
}
