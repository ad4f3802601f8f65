//! Process orchestration: the control loop on the caller thread, the
//! supervisor loop on a spawned subscriber thread, a shared shutdown flag
//! checked at both loop heads.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::RuntimeConfig;
use crate::engine::FilterEngine;
use crate::error::{ControllerError, Report, Result};
use crate::server::ControlServer;
use crate::shared::Shared;
use crate::supervisor::Supervisor;
use filterctl_traits::{Clock, ControlChannel, DataChannel, EventChannel, MotionSink};

/// How long the control loop blocks per receive before re-checking the
/// shutdown flag.
pub const CONTROL_RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// Run the controller until a `shutdown` command arrives.
pub fn run<C, D, E, M>(
    mut control: C,
    mut data: D,
    events: E,
    sink: M,
    config: RuntimeConfig,
    clock: Arc<dyn Clock + Send + Sync>,
) -> Result<()>
where
    C: ControlChannel,
    D: DataChannel + Send + 'static,
    E: EventChannel + Send + 'static,
    M: MotionSink + Send + 'static,
{
    let shared = Arc::new(Shared::new(config, clock.now()));

    let subscriber = {
        let shared = Arc::clone(&shared);
        let clock = Arc::clone(&clock);
        thread::Builder::new()
            .name("subscriber".into())
            .spawn(move || {
                let engine = FilterEngine::new(sink);
                let mut supervisor = Supervisor::new(engine, events, Arc::clone(&shared), clock);
                supervisor.sync_telemetry();
                while !shared.shutdown.load(Ordering::Acquire) {
                    supervisor.run_pass(&mut data);
                }
                tracing::info!("subscriber task stopped");
            })
            .map_err(|e| Report::new(ControllerError::SpawnFailed(e.to_string())))?
    };

    let server = ControlServer::new(Arc::clone(&shared), Arc::clone(&clock));
    while !shared.shutdown.load(Ordering::Acquire) {
        match control.recv_request(CONTROL_RECV_TIMEOUT) {
            Ok(Some(raw)) => {
                tracing::debug!(request = %raw, "control request received");
                let reply = server.handle_request(&raw);
                if let Err(e) = control.send_reply(&reply) {
                    tracing::warn!(error = %e, "control reply failed");
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "control receive failed");
                clock.sleep(CONTROL_RECV_TIMEOUT);
            }
        }
    }

    tracing::info!("shutting down");
    subscriber
        .join()
        .map_err(|_| Report::new(ControllerError::SubscriberPanicked))?;
    Ok(())
}
