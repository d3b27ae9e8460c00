//! End-to-end check over a real loopback TCP socket: a fake peer accepts the
//! connection, reads the framed single-shot command, and writes back a
//! framed reply; the processing loop must reach `Idle`.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::time::{Duration, Instant};

use frame_core::{ControllerState, Data};
use frame_host::{Driver, HostConfig};
use frame_proto::Encoder;

#[test]
fn single_shot_round_trip_over_real_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut buf = [0u8; 64];
        let n = stream.read(&mut buf).unwrap();
        assert!(buf[..n].starts_with(b"@01"), "expected command 0x01 framed on the wire");

        let reply = Encoder::new().encode(&[0x01]).unwrap();
        stream.write_all(reply.as_bytes()).unwrap();
    });

    // A fresh Driver's first SendCycle fires before this test has a chance
    // to queue anything (Driver::connect both connects and starts the
    // controller), so the actual send waits for the next periodic tick.
    // A short period keeps the test fast without changing the behavior
    // under test.
    let config = HostConfig {
        connect_addr: addr.to_string(),
        controller: frame_core::ControllerConfig { period_ms: 50, ..frame_core::ControllerConfig::default() },
        process_poll_interval: Duration::from_millis(10),
        ..HostConfig::default()
    };
    let mut driver = Driver::connect(config).unwrap();
    driver.single_queue().push(Data::new(0x01, &[]).unwrap()).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while driver.state() != ControllerState::Idle && Instant::now() < deadline {
        driver.process().unwrap();
    }

    assert_eq!(driver.state(), ControllerState::Idle, "controller never reached Idle");
    server.join().unwrap();
    driver.shutdown().unwrap();
}

#[test]
fn timeout_with_no_reply_enters_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    // Accept and hold the connection open, but never reply.
    let server = std::thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        std::thread::sleep(Duration::from_millis(500));
        drop(stream);
    });

    let config = HostConfig {
        connect_addr: addr.to_string(),
        controller: frame_core::ControllerConfig {
            default_timeout_ms: 100,
            default_retry: 1,
            period_ms: 50,
            ..frame_core::ControllerConfig::default()
        },
        process_poll_interval: Duration::from_millis(20),
        ..HostConfig::default()
    };
    let mut driver = Driver::connect(config).unwrap();
    driver.single_queue().push(Data::new(0x02, &[]).unwrap()).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while driver.state() != ControllerState::Error && Instant::now() < deadline {
        driver.process().unwrap();
    }

    assert_eq!(driver.state(), ControllerState::Error);
    driver.shutdown().unwrap();
    let _ = server.join();
}
