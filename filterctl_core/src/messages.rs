//! Wire message types for the data and event channels.
//!
//! Payloads are validated once at the edge and handed to the supervisor as
//! typed records; the decision logic never re-parses JSON.

use serde::{Deserialize, Serialize};

/// Per-frame histogram summary produced by the detector pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct HistogramSummary {
    pub low1: u64,
    pub low2: u64,
    pub high1: u64,
    pub high2: u64,
    pub high3: u64,
}

/// A data message as received on a subscribe endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DataMessage {
    pub frame_number: i64,
    pub parameters: HistogramSummary,
}

impl DataMessage {
    /// Parse a raw payload; `None` (with a log) when required fields are
    /// missing or malformed. Malformed data never changes controller state.
    pub fn parse(payload: &str) -> Option<Self> {
        match serde_json::from_str(payload) {
            Ok(message) => Some(message),
            Err(err) => {
                tracing::warn!(error = %err, payload, "dropping malformed data message");
                None
            }
        }
    }
}

/// The per-frame event published before each frame's decision is made.
///
/// `adjustment` and `attenuation` are the outcome of processing the previous
/// frame, i.e. the conditions in effect during this frame's exposure. A
/// non-zero `adjustment` means the frame was exposed mid-move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttenuationEvent {
    pub frame_number: i64,
    pub adjustment: i32,
    pub attenuation: u8,
}
