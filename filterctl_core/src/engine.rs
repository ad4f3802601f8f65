//! The filter engine: turns a target attenuation level into motion commands.

use crate::attenuation::{Attenuation, FilterMask, MovePlan};
use crate::config::FilterPositions;
use filterctl_traits::{MotionSink, MovePhase};

/// Owns the motion sink and the current demand state. Motion commands are
/// fire-and-forget: failures are logged and never retried, and the demand
/// state advances regardless so the controller keeps a consistent view.
pub struct FilterEngine<M: MotionSink> {
    sink: M,
    current: FilterMask,
    attenuation: Attenuation,
}

impl<M: MotionSink> FilterEngine<M> {
    /// Start with all filters out and no attenuation, matching the physical
    /// rest state of the assembly at process start.
    pub fn new(sink: M) -> Self {
        Self {
            sink,
            current: FilterMask::ALL_OUT,
            attenuation: Attenuation::MIN,
        }
    }

    pub fn attenuation(&self) -> Attenuation {
        self.attenuation
    }

    pub fn demand(&self) -> FilterMask {
        self.current
    }

    /// Command the filter set to `target`, as a two-phase move.
    ///
    /// Re-commanding the level already in demand is a no-op: the demand
    /// vectors would be identical, so no motion is issued.
    pub fn set_attenuation(&mut self, target: Attenuation, positions: &FilterPositions) {
        if target == self.attenuation && self.current == target.mask() {
            tracing::trace!(level = target.level(), "attenuation already in demand");
            return;
        }

        if target.is_min() {
            tracing::info!("min attenuation reached");
        } else if target.is_max() {
            tracing::info!("max attenuation reached");
        }

        let plan = MovePlan::new(self.current, target.mask(), positions);
        tracing::debug!(
            from = self.attenuation.level(),
            to = target.level(),
            phase1 = ?plan.phase1,
            phase2 = ?plan.phase2,
            "commanding filter move"
        );

        if let Err(e) = self.sink.set_move_targets(MovePhase::Insert, plan.phase1) {
            tracing::warn!(error = %e, "set_move_targets failed for insert phase");
        }
        if let Err(e) = self.sink.set_move_targets(MovePhase::Retract, plan.phase2) {
            tracing::warn!(error = %e, "set_move_targets failed for retract phase");
        }
        if let Err(e) = self.sink.run_move_program() {
            tracing::warn!(error = %e, "run_move_program failed");
        }

        self.current = target.mask();
        self.attenuation = target;
    }

    /// Command emergency shutter closure (high3 breach).
    pub fn close_shutter(&mut self) {
        if let Err(e) = self.sink.close_shutter() {
            tracing::warn!(error = %e, "close_shutter failed");
        }
    }

    #[cfg(test)]
    pub(crate) fn sink(&self) -> &M {
        &self.sink
    }
}
