//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(
    name = "filterctl",
    version,
    about = "Soft-real-time attenuation controller for an X-ray detector beamline",
    after_help = "Example:\n  filterctl 9000 9001 127.0.0.1:10009,127.0.0.1:10019"
)]
pub struct Cli {
    /// Port to bind the control (request/reply) socket on
    pub control_port: u16,

    /// Port to bind the event publish socket on
    pub publish_port: u16,

    /// Comma-separated detector endpoints to subscribe to (host:port,host:port,...)
    pub subscribe_endpoints: String,

    /// Path to a config TOML with startup defaults
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Enable real-time mode (SCHED_FIFO and mlockall; Linux only)
    #[arg(long, action = ArgAction::SetTrue)]
    pub rt: bool,
}
