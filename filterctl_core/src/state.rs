//! Control modes and the control-state machine.

/// User-settable operating mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ControlMode {
    /// No automatic control; attenuation set through `configure`.
    #[default]
    Manual,
    /// Adjust on every eligible frame until told otherwise.
    Continuous,
    /// Run until the beam is stable, then hold.
    Singleshot,
}

impl ControlMode {
    pub fn from_wire(value: i64) -> Option<Self> {
        match value {
            0 => Some(ControlMode::Manual),
            1 => Some(ControlMode::Continuous),
            2 => Some(ControlMode::Singleshot),
            _ => None,
        }
    }

    pub fn wire(self) -> i64 {
        match self {
            ControlMode::Manual => 0,
            ControlMode::Continuous => 1,
            ControlMode::Singleshot => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthyState {
    Idle,
    Waiting,
    Active,
    SingleshotWaiting,
    SingleshotComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorState {
    /// No data message within the configured window while tracking.
    Timeout,
    /// The high3 bin breached its threshold; the shutter was closed.
    High3Triggered,
}

/// The supervisor's state, split into healthy and error variants.
///
/// The wire encoding keeps the original convention: healthy states count up
/// from zero, error states are negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    Healthy(HealthyState),
    Error(ErrorState),
}

impl Default for ControlState {
    fn default() -> Self {
        ControlState::Healthy(HealthyState::Idle)
    }
}

impl ControlState {
    pub fn is_error(self) -> bool {
        matches!(self, ControlState::Error(_))
    }

    /// True while data messages are acted on rather than drained and dropped.
    pub fn accepts_data(self) -> bool {
        matches!(
            self,
            ControlState::Healthy(HealthyState::Waiting) | ControlState::Healthy(HealthyState::Active)
        )
    }

    pub fn wire(self) -> i64 {
        match self {
            ControlState::Healthy(HealthyState::Idle) => 0,
            ControlState::Healthy(HealthyState::Waiting) => 1,
            ControlState::Healthy(HealthyState::Active) => 2,
            ControlState::Healthy(HealthyState::SingleshotWaiting) => 3,
            ControlState::Healthy(HealthyState::SingleshotComplete) => 4,
            ControlState::Error(ErrorState::Timeout) => -1,
            ControlState::Error(ErrorState::High3Triggered) => -2,
        }
    }
}
