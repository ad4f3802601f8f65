#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core attenuation-control logic (transport- and hardware-agnostic).
//!
//! This crate provides the decision engine for the filter attenuator. All
//! external interactions go through the capability traits in
//! `filterctl_traits`: the motion controller behind `MotionSink`, the
//! detector stream behind `DataChannel`, the event stream behind
//! `EventChannel` and the command surface behind `ControlChannel`.
//!
//! ## Architecture
//!
//! - **Attenuation**: bitmask level and the two-phase move plan (`attenuation`)
//! - **State machine**: modes, healthy and error states (`state`)
//! - **Supervisor**: per-tick reconciliation and per-frame decisions (`supervisor`)
//! - **Filter engine**: demand computation and motion commands (`engine`)
//! - **Control protocol**: JSON request handling and status (`server`)
//! - **Shared record**: flags and status snapshot across the two tasks (`shared`)

pub mod attenuation;
pub mod config;
pub mod engine;
pub mod error;
pub mod messages;
pub mod mocks;
pub mod runner;
pub mod server;
pub mod shared;
pub mod state;
pub mod supervisor;

pub use attenuation::{Attenuation, FilterMask, MovePlan};
pub use config::{FilterPositions, RuntimeConfig, Thresholds};
pub use engine::FilterEngine;
pub use messages::{AttenuationEvent, DataMessage, HistogramSummary};
pub use runner::CONTROL_RECV_TIMEOUT;
pub use server::ControlServer;
pub use shared::{Shared, Telemetry};
pub use state::{ControlMode, ControlState, ErrorState, HealthyState};
pub use supervisor::{Supervisor, DATA_POLL_TIMEOUT};

/// Frame-counter sentinel that passes every "ignore" check, so that a stream
/// numbered from zero is accepted after startup or `reset`.
pub const NO_FRAMES: i64 = -2;
