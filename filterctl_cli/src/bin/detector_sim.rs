//! Publish simulated detector histogram frames for bench testing.
//!
//! Frames round-robin across the configured ports, mirroring how a
//! multi-module detector fans its summaries out over several endpoints.

use std::thread::sleep;
use std::time::Duration;

use clap::Parser;
use rand::Rng;
use serde_json::json;

#[derive(Parser, Debug)]
#[command(
    name = "detector_sim",
    about = "Publish simulated detector histogram frames"
)]
struct Cli {
    /// Ports to publish on (one PUB socket each)
    #[arg(long, value_delimiter = ',', default_value = "10009")]
    ports: Vec<u16>,

    /// Frame rate in Hz
    #[arg(long, default_value_t = 1.0)]
    rate: f64,

    /// Total frames to send before stopping (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    frame_count: u64,

    /// Send random frames for this many frames, then blanks (0 = random only)
    #[arg(long, default_value_t = 0)]
    singleshot_length: u64,
}

/// Random bin counts stay below this, straddling the default threshold of 2.
const THRESHOLD_LEVEL: u64 = 4;

fn main() -> eyre::Result<()> {
    let cli = Cli::parse();

    let context = zmq::Context::new();
    let mut sockets = Vec::with_capacity(cli.ports.len());
    for port in &cli.ports {
        let socket = context.socket(zmq::PUB)?;
        socket.bind(&format!("tcp://*:{port}"))?;
        println!("Publishing on tcp://*:{port}");
        sockets.push(socket);
    }

    let delay = Duration::from_secs_f64(1.0 / cli.rate.clamp(0.01, 100.0));
    let mut rng = rand::thread_rng();
    let mut frame_number: u64 = 0;

    loop {
        if cli.frame_count > 0 && frame_number >= cli.frame_count {
            break;
        }
        let blank = cli.singleshot_length > 0 && frame_number >= cli.singleshot_length;
        let parameters = if blank {
            // Triggers no thresholds: the controller should settle.
            json!({"low1": 10_000, "low2": 10_000, "high1": 0, "high2": 0, "high3": 0})
        } else {
            json!({
                "low1": rng.gen_range(0..THRESHOLD_LEVEL),
                "low2": rng.gen_range(0..THRESHOLD_LEVEL),
                "high1": rng.gen_range(0..THRESHOLD_LEVEL),
                "high2": rng.gen_range(0..THRESHOLD_LEVEL),
                "high3": 0,
            })
        };
        let message = json!({
            "frame_number": frame_number,
            "parameters": parameters,
        })
        .to_string();

        let socket = &sockets[(frame_number as usize) % sockets.len()];
        socket.send(message.as_str(), 0)?;
        println!("{message}");

        frame_number += 1;
        sleep(delay);
    }

    println!("Frame count reached");
    Ok(())
}
