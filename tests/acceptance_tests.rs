//! Acceptance tests for the gateway service.
//!
//! Each test runs a live service bound to an ephemeral loopback port and
//! drives it over UDP with literal wire vectors, checking the replies byte
//! for byte.

use fieldgate_common::{CpuAffinity, ServiceConfig};
use fieldgate_daemon::service::Service;
use fieldgate_fieldbus::SimulatedTransport;
use fieldgate_protocol::{CommandFrame, ErrorCode, ResponseFrame, Status, FRAME_LEN, RESP_MAGIC};
use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.security.bind_address = "127.0.0.1".into();
    config.security.port = 0;
    config.network.cycle_time = Duration::from_millis(1);
    config.performance.rt_priority = 0;
    config.performance.cpu_affinity = CpuAffinity::None;
    config
}

/// A running service plus a client socket pointed at it.
struct Harness {
    service: Service,
    socket: UdpSocket,
    server: SocketAddr,
}

impl Harness {
    fn start(mut service: Service) -> Self {
        service.start().expect("service start");

        let deadline = Instant::now() + Duration::from_secs(2);
        let server = loop {
            if let Some(addr) = service.shared().bound_addr() {
                break addr;
            }
            assert!(Instant::now() < deadline, "network thread never bound");
            std::thread::sleep(Duration::from_millis(5));
        };

        let socket = UdpSocket::bind("127.0.0.1:0").expect("client socket");
        socket
            .set_read_timeout(Some(Duration::from_secs(2)))
            .expect("read timeout");

        Self {
            service,
            socket,
            server,
        }
    }

    fn with_stub_backend() -> Self {
        Self::start(Service::init(test_config()).expect("service init"))
    }

    fn with_simulated_backend() -> Self {
        Self::start(
            Service::with_transport(
                test_config(),
                Box::new(SimulatedTransport::with_test_slaves()),
            )
            .expect("service init"),
        )
    }

    fn roundtrip_raw(&self, frame: &[u8]) -> ResponseFrame {
        self.socket.send_to(frame, self.server).expect("send");
        let mut buf = [0u8; FRAME_LEN];
        let (len, _) = self.socket.recv_from(&mut buf).expect("receive");
        assert_eq!(len, FRAME_LEN);
        let resp = ResponseFrame::decode(&buf).expect("decode response");
        assert_eq!(resp.magic, RESP_MAGIC);
        resp
    }

    fn roundtrip(&self, cmd: &CommandFrame) -> ResponseFrame {
        self.roundtrip_raw(&cmd.encode())
    }

    fn shutdown(mut self) {
        self.service.stop();
        self.service.cleanup();
    }
}

fn raw_frame(magic: u32, category: u8, id: u8, payload: &[u8]) -> [u8; FRAME_LEN] {
    let mut frame = CommandFrame::new(category, id, payload);
    frame.magic = magic;
    frame.encode()
}

#[test]
fn fresh_service_reports_inactive_status() {
    let harness = Harness::with_stub_backend();

    // NET/STATUS on a fresh, inactive service
    let resp = harness.roundtrip_raw(&raw_frame(0xEF00_0001, 0x01, 0x04, &[]));
    assert_eq!(resp.status, Status::Success as u8);
    assert_eq!(resp.error, ErrorCode::None as u8);
    assert_eq!(resp.payload(), &[0u8; 8]);

    harness.shutdown();
}

#[test]
fn net_start_over_stub_backend_activates() {
    let harness = Harness::with_stub_backend();

    let resp = harness.roundtrip_raw(&raw_frame(0xEF00_0001, 0x01, 0x01, &[]));
    assert_eq!(resp.status, Status::Success as u8);
    assert_eq!(resp.error, ErrorCode::None as u8);
    assert!(resp.payload().is_empty());

    let resp = harness.roundtrip_raw(&raw_frame(0xEF00_0001, 0x01, 0x04, &[]));
    assert_eq!(resp.payload(), &[0, 0, 0, 0, 0, 0, 0, 1]);

    harness.shutdown();
}

#[test]
fn bad_magic_is_rejected() {
    let harness = Harness::with_stub_backend();

    let resp = harness.roundtrip_raw(&raw_frame(0xDEAD_BEEF, 0x01, 0x01, &[]));
    assert_eq!(resp.status, Status::Error as u8);
    assert_eq!(resp.error, ErrorCode::InvalidCommand as u8);

    harness.shutdown();
}

#[test]
fn pdo_read_requires_active_bus() {
    let harness = Harness::with_stub_backend();

    let payload = [
        0x00, 0x00, 0x00, 0x01, // slave 1
        0x00, 0x00, 0x00, 0x00, // offset 0
        0x00, 0x00, 0x00, 0x04, // size 4
    ];
    let resp = harness.roundtrip_raw(&raw_frame(0xEF00_0001, 0x02, 0x01, &payload));
    assert_eq!(resp.status, Status::Error as u8);
    assert_eq!(resp.error, ErrorCode::NetworkNotReady as u8);

    harness.shutdown();
}

#[test]
fn pdo_write_reaches_the_backend_within_a_cycle() {
    let harness = Harness::with_simulated_backend();

    let resp = harness.roundtrip_raw(&raw_frame(0xEF00_0001, 0x01, 0x01, &[]));
    assert_eq!(resp.status, Status::Success as u8);

    let resp = harness.roundtrip(&CommandFrame::pdo_write(1, 0, 0xAABB_CCDD));
    assert_eq!(resp.status, Status::Success as u8);
    assert_eq!(resp.error, ErrorCode::None as u8);

    // The loopback backend echoes the output image into the input image on
    // each cyclic exchange; give the 1 ms loop a few cycles
    std::thread::sleep(Duration::from_millis(50));

    let resp = harness.roundtrip(&CommandFrame::pdo_read(1, 0, 4));
    assert_eq!(resp.status, Status::Success as u8);
    assert_eq!(resp.payload(), &[0xAA, 0xBB, 0xCC, 0xDD]);

    harness.shutdown();
}

#[test]
fn diag_slave_rejects_absent_slave() {
    let harness = Harness::with_simulated_backend();

    let resp = harness.roundtrip_raw(&raw_frame(0xEF00_0001, 0x01, 0x01, &[]));
    assert_eq!(resp.status, Status::Success as u8);

    let resp = harness.roundtrip_raw(&raw_frame(
        0xEF00_0001,
        0x03,
        0x04,
        &[0x00, 0x00, 0x00, 0xFF],
    ));
    assert_eq!(resp.status, Status::Error as u8);
    assert_eq!(resp.error, ErrorCode::SlaveNotFound as u8);

    harness.shutdown();
}

#[test]
fn scan_reports_enumerated_slaves() {
    let harness = Harness::with_simulated_backend();

    harness.roundtrip_raw(&raw_frame(0xEF00_0001, 0x01, 0x01, &[]));
    let resp = harness.roundtrip_raw(&raw_frame(0xEF00_0001, 0x01, 0x03, &[]));
    assert_eq!(resp.status, Status::Success as u8);
    assert_eq!(resp.payload(), &[0, 0, 0, 2]);

    harness.shutdown();
}

#[test]
fn undersized_datagrams_are_ignored() {
    let harness = Harness::with_stub_backend();

    // A truncated datagram gets no reply; the next well-formed command does
    harness.socket.send_to(&[0u8; 10], harness.server).unwrap();

    let resp = harness.roundtrip_raw(&raw_frame(0xEF00_0001, 0x01, 0x04, &[]));
    assert_eq!(resp.status, Status::Success as u8);
    assert_eq!(resp.payload(), &[0u8; 8]);

    harness.shutdown();
}

#[test]
fn repeated_stop_commands_both_succeed() {
    let harness = Harness::with_simulated_backend();

    harness.roundtrip_raw(&raw_frame(0xEF00_0001, 0x01, 0x01, &[]));
    for _ in 0..2 {
        let resp = harness.roundtrip_raw(&raw_frame(0xEF00_0001, 0x01, 0x02, &[]));
        assert_eq!(resp.status, Status::Success as u8);
        assert_eq!(resp.error, ErrorCode::None as u8);
    }

    let resp = harness.roundtrip_raw(&raw_frame(0xEF00_0001, 0x01, 0x04, &[]));
    assert_eq!(resp.payload(), &[0u8; 8]);

    harness.shutdown();
}

#[test]
fn cyclic_loop_accumulates_timing_stats() {
    let harness = Harness::with_simulated_backend();

    harness.roundtrip_raw(&raw_frame(0xEF00_0001, 0x01, 0x01, &[]));
    std::thread::sleep(Duration::from_millis(300));

    let snap = harness.service.shared().master.timing().snapshot();
    assert!(snap.cycles_total >= 50, "only {} cycles", snap.cycles_total);

    // DIAG/TIMING reflects the live counters
    let resp = harness.roundtrip_raw(&raw_frame(0xEF00_0001, 0x03, 0x02, &[]));
    assert_eq!(resp.status, Status::Success as u8);
    let payload = resp.payload();
    let avg = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
    assert!(avg > 0);

    harness.shutdown();
}
