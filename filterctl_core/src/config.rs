//! Runtime configuration: thresholds, filter positions and control settings.

use std::time::Duration;

use crate::state::ControlMode;
use filterctl_traits::FILTER_COUNT;

/// Pixel-count thresholds per histogram bin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thresholds {
    pub low1: u64,
    pub low2: u64,
    pub high1: u64,
    pub high2: u64,
    pub high3: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            low1: 2,
            low2: 2,
            high1: 2,
            high2: 2,
            high3: 2,
        }
    }
}

impl Thresholds {
    pub fn get(&self, bin: &str) -> Option<u64> {
        match bin {
            "low1" => Some(self.low1),
            "low2" => Some(self.low2),
            "high1" => Some(self.high1),
            "high2" => Some(self.high2),
            "high3" => Some(self.high3),
            _ => None,
        }
    }

    pub fn set(&mut self, bin: &str, count: u64) -> bool {
        match bin {
            "low1" => self.low1 = count,
            "low2" => self.low2 = count,
            "high1" => self.high1 = count,
            "high2" => self.high2 = count,
            "high3" => self.high3 = count,
            _ => return false,
        }
        true
    }
}

/// In/out axis targets per filter, in motion-controller counts. Counts may be
/// negative; there is no fixed travel direction per filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterPositions {
    pub in_counts: [i32; FILTER_COUNT],
    pub out_counts: [i32; FILTER_COUNT],
}

impl FilterPositions {
    /// The axis demand for `filter` given whether it should be in the beam.
    pub fn demand(&self, filter: usize, inserted: bool) -> i32 {
        if inserted {
            self.in_counts[filter]
        } else {
            self.out_counts[filter]
        }
    }
}

/// The controller's runtime configuration. Written by the control task under
/// the shared lock, read by the supervisor at loop boundaries. Every field
/// has a default and partial updates are legal.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    pub mode: ControlMode,
    pub timeout: Duration,
    pub positions: FilterPositions,
    pub thresholds: Thresholds,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            mode: ControlMode::Manual,
            timeout: Duration::from_secs(3),
            positions: FilterPositions::default(),
            thresholds: Thresholds::default(),
        }
    }
}
