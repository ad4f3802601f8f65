mod cli;
mod rt;

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use eyre::WrapErr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::{Cli, FILE_GUARD};
use filterctl_core::{runner, ControlMode, RuntimeConfig};
use filterctl_hardware::{LoggingMotionSink, ZmqControlChannel, ZmqDataChannel, ZmqEventChannel};
use filterctl_traits::MonotonicClock;

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            use clap::error::ErrorKind;
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    let endpoints = match parse_endpoints(&cli.subscribe_endpoints) {
        Ok(endpoints) => endpoints,
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(1);
        }
    };

    if let Err(e) = real_main(cli, endpoints) {
        eprintln!("{}", humanize(&e));
        std::process::exit(2);
    }
}

fn real_main(cli: Cli, endpoints: Vec<String>) -> eyre::Result<()> {
    let file_cfg = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .wrap_err_with(|| format!("read config {}", path.display()))?;
            let cfg: filterctl_config::Config = toml::from_str(&text)
                .wrap_err_with(|| format!("parse config {}", path.display()))?;
            cfg.validate().wrap_err("invalid configuration")?;
            cfg
        }
        None => filterctl_config::Config::default(),
    };

    init_tracing(
        cli.json,
        &cli.log_level,
        file_cfg.logging.file.as_deref(),
        file_cfg.logging.rotation.as_deref(),
    );

    rt::setup_rt_once(cli.rt);

    let config = runtime_config(&file_cfg);

    let context = zmq::Context::new();
    let control =
        ZmqControlChannel::bind(&context, cli.control_port).wrap_err("bind control socket")?;
    let events =
        ZmqEventChannel::bind(&context, cli.publish_port).wrap_err("bind publish socket")?;
    let data = ZmqDataChannel::connect(&context, &endpoints).wrap_err("connect data sockets")?;

    tracing::info!(
        control_port = cli.control_port,
        publish_port = cli.publish_port,
        endpoints = ?endpoints,
        "filterctl starting"
    );

    runner::run(
        control,
        data,
        events,
        LoggingMotionSink,
        config,
        Arc::new(MonotonicClock::new()),
    )?;

    tracing::info!("finished run");
    Ok(())
}

/// Split and validate the `host:port,host:port,...` endpoint list.
fn parse_endpoints(raw: &str) -> Result<Vec<String>, String> {
    let endpoints: Vec<String> = raw.split(',').map(|e| e.trim().to_string()).collect();
    for endpoint in &endpoints {
        let valid = endpoint
            .rsplit_once(':')
            .map_or(false, |(host, port)| {
                !host.is_empty() && port.parse::<u16>().is_ok()
            });
        if !valid {
            return Err(format!(
                "invalid subscribe endpoint '{endpoint}' - expected host:port"
            ));
        }
    }
    Ok(endpoints)
}

/// Seed the runtime configuration from the optional TOML file.
fn runtime_config(cfg: &filterctl_config::Config) -> RuntimeConfig {
    let mut config = RuntimeConfig::default();
    if let Some(mode) = cfg.control.mode.and_then(|m| ControlMode::from_wire(i64::from(m))) {
        config.mode = mode;
    }
    if let Some(timeout) = cfg.control.timeout {
        // validate() already rejected negative or non-finite values
        config.timeout = Duration::from_secs_f64(timeout);
    }
    if let Some(in_counts) = cfg.positions.in_counts {
        config.positions.in_counts = in_counts;
    }
    if let Some(out_counts) = cfg.positions.out_counts {
        config.positions.out_counts = out_counts;
    }
    let t = &cfg.thresholds;
    for (bin, value) in [
        ("low1", t.low1),
        ("low2", t.low2),
        ("high1", t.high1),
        ("high2", t.high2),
        ("high3", t.high3),
    ] {
        if let Some(count) = value {
            config.thresholds.set(bin, count);
        }
    }
    config
}

/// Build a file sink writer with optional rotation, storing the non-blocking
/// guard in OnceLock.
fn file_layer(
    file: Option<&str>,
    rotation: Option<&str>,
) -> Option<tracing_appender::non_blocking::NonBlocking> {
    let path = file?;
    let p = std::path::Path::new(path);
    if let Some(parent) = p.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let file_appender = match rotation.unwrap_or("never").to_ascii_lowercase().as_str() {
        "daily" => tracing_appender::rolling::daily(".", path),
        "hourly" => tracing_appender::rolling::hourly(".", path),
        _ => tracing_appender::rolling::never(".", path),
    };
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
    let _ = FILE_GUARD.set(guard);
    Some(nb_writer)
}

/// Initialize tracing once for the whole app.
fn init_tracing(json: bool, level: &str, file: Option<&str>, rotation: Option<&str>) {
    // Prefer RUST_LOG if set; otherwise use the CLI level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);

    if json {
        let console = fmt::layer().json().with_target(false);
        if let Some(nb_writer) = file_layer(file, rotation) {
            let file_l = fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(nb_writer);
            registry.with(console).with(file_l).init();
        } else {
            registry.with(console).init();
        }
    } else {
        let console = fmt::layer().pretty().with_target(false);
        if let Some(nb_writer) = file_layer(file, rotation) {
            let file_l = fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(nb_writer);
            registry.with(console).with(file_l).init();
        } else {
            registry.with(console).init();
        }
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes
/// and fix hints.
fn humanize(err: &eyre::Report) -> String {
    use filterctl_core::error::ControllerError;

    // Typed matches first
    if let Some(ce) = err.downcast_ref::<ControllerError>() {
        return match ce {
            ControllerError::SpawnFailed(msg) => format!(
                "What happened: The subscriber task could not be started ({msg}).\nLikely causes: Thread or resource limits on this host.\nHow to fix: Check process limits (e.g. ulimit -u) and retry."
            ),
            ControllerError::SubscriberPanicked => {
                "What happened: The subscriber task panicked and the controller cannot continue.\nHow to fix: Re-run with --log-level=debug or RUST_LOG=debug and report the log.".to_string()
            }
        };
    }

    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("address in use") || lower.contains("address already in use") {
        return format!(
            "What happened: A socket port is already in use.\nLikely causes: Another filterctl instance, or a stale process still holding the port.\nHow to fix: Stop the other process or pick different ports. Original: {msg}"
        );
    }

    if lower.contains("invalid configuration") || lower.contains("parse config") {
        return format!(
            "What happened: Configuration is invalid or unreadable.\nHow to fix: Edit the TOML config, then rerun. Original: {msg}"
        );
    }

    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail. Original: {msg}"
    )
}
