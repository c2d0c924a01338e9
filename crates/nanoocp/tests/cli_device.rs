#![cfg(feature = "cli")]

use std::net::{TcpListener, TcpStream};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .expect("ephemeral port should be available")
        .port()
}

fn spawn_serve(port: u16, extra: &[&str]) -> Child {
    let child = Command::new(env!("CARGO_BIN_EXE_nanoocp"))
        .args(["--log-level", "error", "serve", "--port", &port.to_string()])
        .args(extra)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("serve should start");

    let deadline = Instant::now() + Duration::from_secs(5);
    while TcpStream::connect(("127.0.0.1", port)).is_err() {
        assert!(Instant::now() < deadline, "serve did not start listening");
        thread::sleep(Duration::from_millis(25));
    }
    child
}

fn nanoocp(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_nanoocp"))
        .args(["--log-level", "error", "--format", "json"])
        .args(args)
        .output()
        .expect("nanoocp should run")
}

#[test]
fn get_reads_value_from_device() {
    let port = free_port();
    let mut device = spawn_serve(port, &["--reply-float", "3.5", "--count", "1"]);

    let output = nanoocp(&[
        "get",
        "--port",
        &port.to_string(),
        "--ono",
        "0x10002001",
        "--type",
        "float32",
    ]);

    assert!(output.status.success(), "get failed: {output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let value: serde_json::Value =
        serde_json::from_str(stdout.trim()).expect("get output should be json");
    assert_eq!(value["message_type"], "Response");
    assert_eq!(value["status_name"], "OK");
    assert_eq!(value["value"], "3.5");

    let status = device.wait().expect("serve should exit after one command");
    assert!(status.success());
}

#[test]
fn set_is_acknowledged() {
    let port = free_port();
    let mut device = spawn_serve(port, &[]);

    let output = nanoocp(&[
        "set",
        "--port",
        &port.to_string(),
        "--ono",
        "4096",
        "--type",
        "float32",
        "--value",
        "-6",
    ]);

    assert!(output.status.success(), "set failed: {output:?}");
    assert!(String::from_utf8_lossy(&output.stdout).contains("\"status\":0"));

    let _ = device.kill();
    let _ = device.wait();
}

#[test]
fn get_refused_returns_transport_code() {
    let port = free_port();
    let output = nanoocp(&[
        "get",
        "--port",
        &port.to_string(),
        "--ono",
        "1",
        "--timeout",
        "500ms",
    ]);

    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn set_rejects_unconvertible_value_before_connecting() {
    let port = free_port();

    let output = nanoocp(&[
        "set",
        "--port",
        &port.to_string(),
        "--ono",
        "4096",
        "--type",
        "uint8",
        "--value",
        "not-a-number",
    ]);

    assert_eq!(output.status.code(), Some(60));
}
