//! Command dispatcher: routes validated frames to the bus master and builds
//! the reply.
//!
//! Every input produces a syntactically valid response frame; dispatch never
//! blocks on the network. Protocol and precondition failures are reported to
//! the peer and logged at DEBUG/WARN only.

use fieldgate_fieldbus::SharedMaster;
use fieldgate_protocol::{
    pack_network_status, Category, CommandFrame, DiagCmd, ErrorCode, NetCmd, PdoCmd, PdoOperation,
    ResponseFrame,
};
use std::net::SocketAddr;
use tracing::{debug, error, info, warn};

/// Handle one operator command and produce the reply frame.
#[must_use]
pub fn handle(master: &SharedMaster, cmd: &CommandFrame, peer: SocketAddr) -> ResponseFrame {
    if !cmd.validate() {
        warn!(%peer, "invalid command frame");
        return ResponseFrame::error(ErrorCode::InvalidCommand);
    }

    debug!(
        %peer,
        category = cmd.category,
        id = cmd.id,
        payload_len = cmd.payload_len,
        "command received"
    );

    match Category::from_u8(cmd.category) {
        Some(Category::Network) => handle_network(master, cmd),
        Some(Category::Pdo) => handle_pdo(master, cmd),
        Some(Category::Diagnostic) => handle_diagnostic(master, cmd),
        None => ResponseFrame::error(ErrorCode::InvalidCommand),
    }
}

fn handle_network(master: &SharedMaster, cmd: &CommandFrame) -> ResponseFrame {
    match NetCmd::from_u8(cmd.id) {
        Some(NetCmd::Start) => {
            info!("network start command received");
            if master.is_active() {
                return ResponseFrame::error(ErrorCode::NetworkNotReady);
            }
            match master.start() {
                Ok(()) => ResponseFrame::success(&[]),
                Err(e) => {
                    error!(error = %e, "failed to start bus");
                    ResponseFrame::error(ErrorCode::Internal)
                }
            }
        }

        Some(NetCmd::Stop) => {
            info!("network stop command received");
            master.stop();
            ResponseFrame::success(&[])
        }

        Some(NetCmd::Scan) => {
            let count = master.scan();
            info!(slaves = count, "network scan command received");
            ResponseFrame::success(&count.to_be_bytes())
        }

        Some(NetCmd::Status) => {
            let (count, active) = master.status();
            ResponseFrame::success(&pack_network_status(count, active))
        }

        None => ResponseFrame::error(ErrorCode::InvalidCommand),
    }
}

fn handle_pdo(master: &SharedMaster, cmd: &CommandFrame) -> ResponseFrame {
    if !master.is_active() {
        return ResponseFrame::error(ErrorCode::NetworkNotReady);
    }

    let Some(op) = PdoOperation::extract(cmd) else {
        return ResponseFrame::error(ErrorCode::InvalidPayload);
    };

    match PdoCmd::from_u8(cmd.id) {
        Some(PdoCmd::Read) => {
            debug!(
                slave = op.slave_id,
                offset = op.offset,
                size = op.size,
                "pdo read"
            );
            match master.read_pdo(op.slave_id, op.offset, op.size) {
                Ok(value) => ResponseFrame::success(&value.to_be_bytes()),
                Err(e) => {
                    debug!(error = %e, "pdo read rejected");
                    ResponseFrame::error(ErrorCode::SlaveNotFound)
                }
            }
        }

        Some(PdoCmd::Write) => {
            debug!(
                slave = op.slave_id,
                offset = op.offset,
                size = op.size,
                value = op.value,
                "pdo write"
            );
            match master.write_pdo(op.slave_id, op.offset, op.size, op.value) {
                Ok(()) => ResponseFrame::success(&[]),
                Err(e) => {
                    debug!(error = %e, "pdo write rejected");
                    ResponseFrame::error(ErrorCode::SlaveNotFound)
                }
            }
        }

        Some(PdoCmd::Monitor | PdoCmd::StopMonitor) => {
            info!("pdo monitoring not implemented");
            ResponseFrame::error(ErrorCode::InvalidCommand)
        }

        None => ResponseFrame::error(ErrorCode::InvalidCommand),
    }
}

fn handle_diagnostic(master: &SharedMaster, cmd: &CommandFrame) -> ResponseFrame {
    match DiagCmd::from_u8(cmd.id) {
        Some(DiagCmd::Network) => {
            let (count, active) = master.status();
            let mut payload = [0u8; 8];
            payload[0] = u8::from(active);
            payload[1] = count.min(u32::from(u8::MAX)) as u8;
            ResponseFrame::success(&payload)
        }

        Some(DiagCmd::Timing) => {
            let snap = master.timing().snapshot();
            let mut payload = [0u8; 8];
            payload[0..4].copy_from_slice(&snap.avg_cycle_us.to_be_bytes());
            payload[4..8].copy_from_slice(&snap.jitter_us.to_be_bytes());
            ResponseFrame::success(&payload)
        }

        Some(DiagCmd::Errors) => {
            let snap = master.errors().snapshot();
            let mut payload = [0u8; 8];
            payload[0..4].copy_from_slice(&snap.frame_errors.to_be_bytes());
            payload[4..8].copy_from_slice(&snap.timeout_errors.to_be_bytes());
            ResponseFrame::success(&payload)
        }

        Some(DiagCmd::Slave) => {
            let payload = cmd.payload();
            let index = if payload.len() >= 4 {
                u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]])
            } else {
                0
            };

            if master.slave_online(index) {
                let mut reply = [0u8; 8];
                reply[0] = 1;
                ResponseFrame::success(&reply)
            } else {
                ResponseFrame::error(ErrorCode::SlaveNotFound)
            }
        }

        None => ResponseFrame::error(ErrorCode::InvalidCommand),
    }
}
