//! Subscribe to a filterctl event stream and print every event.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "event_subscriber",
    about = "Subscribe to filterctl events and print them"
)]
struct Cli {
    /// Publish endpoint to subscribe to
    #[arg(long, default_value = "127.0.0.1:9001")]
    endpoint: String,
}

fn main() -> eyre::Result<()> {
    let cli = Cli::parse();

    let context = zmq::Context::new();
    let socket = context.socket(zmq::SUB)?;
    socket.set_subscribe(b"")?;
    socket.connect(&format!("tcp://{}", cli.endpoint))?;
    println!("Subscribed to tcp://{}", cli.endpoint);

    loop {
        match socket.recv_string(0)? {
            Ok(event) => println!("{event}"),
            Err(bytes) => eprintln!("non-utf8 event ({} bytes)", bytes.len()),
        }
    }
}
