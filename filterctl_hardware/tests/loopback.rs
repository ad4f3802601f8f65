//! Loopback tests for the ZeroMQ channels.
//!
//! ZMQ pub/sub has the "slow joiner" problem, so each pub/sub test sleeps
//! briefly after connecting before sending.

use std::thread::sleep;
use std::time::Duration;

use filterctl_hardware::{ZmqControlChannel, ZmqDataChannel, ZmqEventChannel};
use filterctl_traits::{ControlChannel, DataChannel, EventChannel};

const JOIN_DELAY: Duration = Duration::from_millis(150);

#[test]
fn control_request_reply_round_trip() {
    let ctx = zmq::Context::new();
    let mut server = ZmqControlChannel::bind(&ctx, 21731).unwrap();

    let client = ctx.socket(zmq::REQ).unwrap();
    client.connect("tcp://127.0.0.1:21731").unwrap();
    client.send("{\"command\": \"status\"}", 0).unwrap();

    let request = server
        .recv_request(Duration::from_secs(2))
        .unwrap()
        .expect("request within timeout");
    assert_eq!(request, "{\"command\": \"status\"}");
    server.send_reply("{\"success\": false}").unwrap();

    client.set_rcvtimeo(2000).unwrap();
    let reply = client.recv_string(0).unwrap().unwrap();
    assert_eq!(reply, "{\"success\": false}");
}

#[test]
fn control_recv_times_out_when_idle() {
    let ctx = zmq::Context::new();
    let mut server = ZmqControlChannel::bind(&ctx, 21732).unwrap();
    let got = server.recv_request(Duration::from_millis(50)).unwrap();
    assert!(got.is_none());
}

#[test]
fn event_channel_publishes_to_subscribers() {
    let ctx = zmq::Context::new();
    let mut publisher = ZmqEventChannel::bind(&ctx, 21733).unwrap();

    let subscriber = ctx.socket(zmq::SUB).unwrap();
    subscriber.connect("tcp://127.0.0.1:21733").unwrap();
    subscriber.set_subscribe(b"").unwrap();
    sleep(JOIN_DELAY);

    publisher
        .publish("{\"frame_number\": 0, \"adjustment\": 0, \"attenuation\": 15}")
        .unwrap();

    subscriber.set_rcvtimeo(2000).unwrap();
    let event = subscriber.recv_string(0).unwrap().unwrap();
    assert!(event.contains("\"attenuation\": 15"));
}

#[test]
fn data_channel_reads_one_message_per_ready_endpoint() {
    let ctx = zmq::Context::new();
    let pub_a = ctx.socket(zmq::PUB).unwrap();
    pub_a.bind("tcp://127.0.0.1:21734").unwrap();
    let pub_b = ctx.socket(zmq::PUB).unwrap();
    pub_b.bind("tcp://127.0.0.1:21735").unwrap();

    let mut data = ZmqDataChannel::connect(
        &ctx,
        &["127.0.0.1:21734".to_string(), "127.0.0.1:21735".to_string()],
    )
    .unwrap();
    sleep(JOIN_DELAY);

    pub_a.send("{\"frame_number\": 0}", 0).unwrap();
    pub_b.send("{\"frame_number\": 1}", 0).unwrap();
    sleep(JOIN_DELAY);

    let mut payloads = data.poll(Duration::from_secs(1)).unwrap();
    payloads.sort();
    assert_eq!(
        payloads,
        vec![
            "{\"frame_number\": 0}".to_string(),
            "{\"frame_number\": 1}".to_string()
        ]
    );
}

#[test]
fn data_channel_conflates_to_the_newest_message() {
    let ctx = zmq::Context::new();
    let publisher = ctx.socket(zmq::PUB).unwrap();
    publisher.bind("tcp://127.0.0.1:21736").unwrap();

    let mut data = ZmqDataChannel::connect(&ctx, &["127.0.0.1:21736".to_string()]).unwrap();
    sleep(JOIN_DELAY);

    for n in 0..5 {
        publisher.send(format!("{{\"frame_number\": {n}}}").as_str(), 0).unwrap();
    }
    sleep(JOIN_DELAY);

    let payloads = data.poll(Duration::from_secs(1)).unwrap();
    assert_eq!(payloads, vec!["{\"frame_number\": 4}".to_string()]);
}

#[test]
fn data_channel_rejects_empty_endpoint_lists() {
    let ctx = zmq::Context::new();
    assert!(ZmqDataChannel::connect(&ctx, &[]).is_err());
    assert!(ZmqDataChannel::connect(&ctx, &[String::new()]).is_err());
}
