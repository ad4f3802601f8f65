//! CLI argument handling and an end-to-end run against real sockets.

use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use serde_json::{json, Value};

#[rstest]
#[case::help(&["--help"], 0, "filterctl 9000 9001 127.0.0.1:10009,127.0.0.1:10019", "stdout")]
#[case::missing_args(&[], 1, "required", "stderr")]
#[case::partial_args(&["9000"], 1, "required", "stderr")]
#[case::bad_port(&["notaport", "9001", "127.0.0.1:10009"], 1, "invalid value", "stderr")]
#[case::bad_endpoint(&["21990", "21991", "bogus"], 1, "invalid subscribe endpoint", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let mut cmd = Command::cargo_bin("filterctl").unwrap();
    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

/// Kills the controller process if a test panics before shutdown.
struct ChildGuard(Option<Child>);

impl ChildGuard {
    fn wait(mut self) -> std::process::ExitStatus {
        let mut child = self.0.take().expect("child present");
        child.wait().expect("wait for controller")
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if let Some(mut child) = self.0.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn spawn_controller(args: &[&str]) -> ChildGuard {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin("filterctl"));
    cmd.args(args).stdout(Stdio::null()).stderr(Stdio::null());
    ChildGuard(Some(cmd.spawn().expect("spawn filterctl")))
}

fn request(socket: &zmq::Socket, body: &Value) -> Value {
    socket.send(body.to_string().as_str(), 0).expect("send request");
    let reply = socket
        .recv_string(0)
        .expect("reply within timeout")
        .expect("utf8 reply");
    serde_json::from_str(&reply).expect("JSON reply")
}

/// Poll status until the given subset matches, like the beamline test rig.
fn wait_for_status(socket: &zmq::Socket, expected: &Value, timeout: Duration) -> Value {
    let deadline = Instant::now() + timeout;
    loop {
        let reply = request(socket, &json!({"command": "status"}));
        assert_eq!(reply["success"], json!(true));
        let status = &reply["status"];
        let matches = expected
            .as_object()
            .expect("expected subset is an object")
            .iter()
            .all(|(key, want)| &status[key] == want);
        if matches {
            return status.clone();
        }
        if Instant::now() >= deadline {
            panic!("status never matched {expected}: last was {status}");
        }
        sleep(Duration::from_millis(100));
    }
}

fn req_socket(ctx: &zmq::Context, port: u16) -> zmq::Socket {
    let socket = ctx.socket(zmq::REQ).unwrap();
    socket.set_rcvtimeo(5_000).unwrap();
    socket.set_sndtimeo(5_000).unwrap();
    socket.connect(&format!("tcp://127.0.0.1:{port}")).unwrap();
    socket
}

#[test]
fn end_to_end_ramp_and_shutdown() {
    let ctx = zmq::Context::new();

    // Stand in for the detector: bind the endpoint the controller subscribes to.
    let detector = ctx.socket(zmq::PUB).unwrap();
    detector.bind("tcp://127.0.0.1:21853").unwrap();

    let child = spawn_controller(&["21851", "21852", "127.0.0.1:21853"]);
    let control = req_socket(&ctx, 21851);

    // Starts MANUAL / IDLE with no attenuation.
    wait_for_status(
        &control,
        &json!({"state": 0, "mode": 0, "current_attenuation": 0}),
        Duration::from_secs(5),
    );

    // Events published by the controller.
    let events = ctx.socket(zmq::SUB).unwrap();
    events.set_subscribe(b"").unwrap();
    events.set_rcvtimeo(5_000).unwrap();
    events.connect("tcp://127.0.0.1:21852").unwrap();

    // Generous timeout so the single test frame cannot trip the watchdog.
    let reply = request(
        &control,
        &json!({"command": "configure", "params": {"mode": 1, "timeout": 30.0}}),
    );
    assert_eq!(reply["success"], json!(true));
    wait_for_status(
        &control,
        &json!({"state": 1, "current_attenuation": 15}),
        Duration::from_secs(5),
    );

    // Let the subscriber connections settle, then send a dim frame.
    sleep(Duration::from_millis(300));
    detector
        .send(
            json!({
                "frame_number": 0,
                "parameters": {"low1": 0, "low2": 0, "high1": 0, "high2": 0, "high3": 0}
            })
            .to_string()
            .as_str(),
            0,
        )
        .unwrap();

    let status = wait_for_status(
        &control,
        &json!({
            "state": 2,
            "last_received_frame": 0,
            "last_processed_frame": 0,
            "current_attenuation": 13,
        }),
        Duration::from_secs(5),
    );
    assert_eq!(status["mode"], json!(1));

    // The event describes the exposure conditions of frame 0: max attenuation,
    // fixed before the frame's own decision.
    let event: Value =
        serde_json::from_str(&events.recv_string(0).unwrap().unwrap()).unwrap();
    assert_eq!(
        event,
        json!({"frame_number": 0, "adjustment": 0, "attenuation": 15})
    );

    let reply = request(&control, &json!({"command": "shutdown"}));
    assert_eq!(reply["success"], json!(true));

    let code = child.wait();
    assert_eq!(code.code(), Some(0));
}

#[test]
fn config_file_seeds_startup_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg_path = dir.path().join("filterctl.toml");
    std::fs::write(
        &cfg_path,
        "[control]\nmode = 1\ntimeout = 12.5\n\n[thresholds]\nhigh3 = 100\n",
    )
    .unwrap();

    let ctx = zmq::Context::new();
    let child = spawn_controller(&[
        "21861",
        "21862",
        "127.0.0.1:21863",
        "--config",
        cfg_path.to_str().unwrap(),
    ]);
    let control = req_socket(&ctx, 21861);

    let status = wait_for_status(
        &control,
        &json!({"mode": 1, "state": 1, "current_attenuation": 15}),
        Duration::from_secs(5),
    );
    assert_eq!(status["timeout"], json!(12.5));
    assert_eq!(status["pixel_count_thresholds"]["high3"], json!(100));
    assert_eq!(status["pixel_count_thresholds"]["low1"], json!(2));

    let reply = request(&control, &json!({"command": "shutdown"}));
    assert_eq!(reply["success"], json!(true));
    assert_eq!(child.wait().code(), Some(0));
}

#[test]
fn invalid_config_file_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    let cfg_path = dir.path().join("bad.toml");
    std::fs::write(&cfg_path, "[control]\nmode = 9\n").unwrap();

    Command::cargo_bin("filterctl")
        .unwrap()
        .args(["21871", "21872", "127.0.0.1:21873", "--config"])
        .arg(&cfg_path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Configuration is invalid"));
}
