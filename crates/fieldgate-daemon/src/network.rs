//! Network activity: datagram receive, dispatch, and reply.
//!
//! One non-blocking UDP socket serves all operators. Each datagram must be
//! exactly one command frame; anything else is discarded with a warning.
//! Would-block gaps sleep about a millisecond, and stale clients are reaped
//! once a minute.

use crate::clients::CLIENT_TTL;
use crate::commands;
use crate::service::ServiceShared;
use fieldgate_common::ServiceConfig;
use fieldgate_protocol::{CommandFrame, FRAME_LEN};
use std::io;
use std::net::UdpSocket;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

const IDLE_SLEEP: Duration = Duration::from_millis(1);
const REAP_INTERVAL: Duration = Duration::from_secs(60);

/// Network thread entry point. The socket is bound by the kernel during
/// service start so a bind failure fails startup instead of silently
/// killing this activity.
pub fn run(shared: Arc<ServiceShared>, socket: UdpSocket) {
    info!("network thread started");

    // One extra byte so an oversize datagram is detectable rather than
    // silently truncated to the frame size
    let mut buf = [0u8; FRAME_LEN + 1];
    let mut last_reap = Instant::now();

    while shared.running() {
        match socket.recv_from(&mut buf) {
            Ok((len, peer)) => {
                if len != FRAME_LEN {
                    warn!(len, %peer, "discarding datagram of unexpected size");
                } else if let Some(cmd) = CommandFrame::decode(&buf[..FRAME_LEN]) {
                    shared.lock_clients().touch(peer);

                    let resp = commands::handle(&shared.master, &cmd, peer);
                    if let Err(e) = socket.send_to(&resp.encode(), peer) {
                        error!(%peer, error = %e, "failed to send response");
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                std::thread::sleep(IDLE_SLEEP);
            }
            Err(e) => {
                error!(error = %e, "receive failed");
                std::thread::sleep(IDLE_SLEEP);
            }
        }

        if last_reap.elapsed() >= REAP_INTERVAL {
            shared.lock_clients().reap(CLIENT_TTL);
            last_reap = Instant::now();
        }
    }

    info!("network thread stopped");
}

/// Create the non-blocking control socket.
///
/// # Errors
///
/// Fails when the configured address cannot be bound.
pub fn setup_socket(config: &ServiceConfig) -> io::Result<UdpSocket> {
    let socket = UdpSocket::bind((
        config.security.bind_address.as_str(),
        config.security.port,
    ))?;
    socket.set_nonblocking(true)?;
    Ok(socket)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_socket_nonblocking() {
        let mut config = ServiceConfig::default();
        config.security.bind_address = "127.0.0.1".into();
        config.security.port = 0;

        let socket = setup_socket(&config).unwrap();
        let mut buf = [0u8; FRAME_LEN];
        let err = socket.recv_from(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn test_setup_socket_invalid_address() {
        let mut config = ServiceConfig::default();
        config.security.bind_address = String::new();

        assert!(setup_socket(&config).is_err());
    }
}
