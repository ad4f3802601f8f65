//! Motion-sink binding.

use std::error::Error;

use filterctl_traits::{MotionSink, MovePhase, FILTER_COUNT};

/// Logs every motion command and performs nothing. Stands in for the motion
/// controller when none is attached; the engine behaves identically either
/// way.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingMotionSink;

impl MotionSink for LoggingMotionSink {
    fn set_move_targets(
        &mut self,
        phase: MovePhase,
        positions: [i32; FILTER_COUNT],
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        tracing::info!(phase = phase.number(), ?positions, "set move targets");
        Ok(())
    }

    fn run_move_program(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        tracing::info!("run move program");
        Ok(())
    }

    fn close_shutter(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        tracing::warn!("close shutter");
        Ok(())
    }
}
