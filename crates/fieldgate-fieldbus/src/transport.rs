//! Transport layer abstraction for the bus backend.
//!
//! [`BusMaster`](crate::BusMaster) drives the bus through this trait, which
//! allows swapping between a hardware stack, the no-hardware [`StubTransport`],
//! and the test-oriented [`SimulatedTransport`].

use crate::slave::SlaveRecord;
use fieldgate_common::{GateError, GateResult};
use std::time::Duration;
use tracing::debug;

/// Slave-state milestones of the standard bring-up sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum BusPhase {
    /// Power-on / reset state.
    #[default]
    Init,
    /// Mailbox configured.
    PreOp,
    /// Process data mapped, outputs not yet driven.
    SafeOp,
    /// Full cyclic operation.
    Op,
}

impl std::fmt::Display for BusPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Init => write!(f, "INIT"),
            Self::PreOp => write!(f, "PRE_OP"),
            Self::SafeOp => write!(f, "SAFE_OP"),
            Self::Op => write!(f, "OP"),
        }
    }
}

/// Backend capability set required by the master.
pub trait Transport: Send {
    /// Open the network interface. First bring-up phase.
    fn open(&mut self, interface: &str) -> GateResult<()>;

    /// Enumerate the slaves on the bus.
    fn enumerate(&mut self) -> GateResult<Vec<SlaveRecord>>;

    /// Map the process image; returns `(input_size, output_size)` in bytes.
    fn map_image(&mut self) -> GateResult<(usize, usize)>;

    /// Request all slaves to transition to the given phase.
    fn request_state(&mut self, phase: BusPhase) -> GateResult<()>;

    /// Wait at most `timeout` for all slaves to reach `expect`; returns the
    /// phase actually observed.
    fn poll_state(&mut self, expect: BusPhase, timeout: Duration) -> GateResult<BusPhase>;

    /// Send the output image, receive the input image. Returns the working
    /// counter; non-negative means the frame made it around the ring.
    fn exchange(&mut self, outputs: &[u8], inputs: &mut [u8]) -> GateResult<i32>;

    /// Close the interface. Must be safe to call at any point.
    fn close(&mut self);
}

/// No-hardware backend.
///
/// Reports an empty bus: zero slaves and a zero-sized process image. Bring-up
/// succeeds vacuously and every PDO access fails on the slave-range check.
/// The exchange stamps a free-running counter into the first input bytes when
/// an image is mapped, so a wired-up variant is observable in tests.
#[derive(Debug, Default)]
pub struct StubTransport {
    open: bool,
    phase: BusPhase,
    counter: u32,
}

impl StubTransport {
    /// Create a closed stub transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for StubTransport {
    fn open(&mut self, interface: &str) -> GateResult<()> {
        debug!(interface, "stub transport open");
        self.open = true;
        self.phase = BusPhase::Init;
        Ok(())
    }

    fn enumerate(&mut self) -> GateResult<Vec<SlaveRecord>> {
        if !self.open {
            return Err(GateError::Fieldbus("transport not open".into()));
        }
        Ok(Vec::new())
    }

    fn map_image(&mut self) -> GateResult<(usize, usize)> {
        Ok((0, 0))
    }

    fn request_state(&mut self, phase: BusPhase) -> GateResult<()> {
        self.phase = phase;
        Ok(())
    }

    fn poll_state(&mut self, _expect: BusPhase, _timeout: Duration) -> GateResult<BusPhase> {
        Ok(self.phase)
    }

    fn exchange(&mut self, _outputs: &[u8], inputs: &mut [u8]) -> GateResult<i32> {
        self.counter = self.counter.wrapping_add(1);
        if inputs.len() >= 4 {
            inputs[..4].copy_from_slice(&self.counter.to_ne_bytes());
        }
        Ok(0)
    }

    fn close(&mut self) {
        self.open = false;
        self.phase = BusPhase::Init;
    }
}

/// Simulated backend with configurable slaves and a loopback exchange.
///
/// Outputs are echoed back into the input image each cycle, which lets tests
/// observe a PDO write through a subsequent PDO read.
#[derive(Debug)]
pub struct SimulatedTransport {
    slaves: Vec<SlaveRecord>,
    input_size: usize,
    output_size: usize,
    phase: BusPhase,
    open: bool,
    /// Remaining exchanges that report a negative working counter.
    fail_exchanges: u32,
}

impl SimulatedTransport {
    /// Create a simulated transport with the given slave set. Image sizes are
    /// the sums of the per-slave contributions.
    #[must_use]
    pub fn new(slaves: Vec<SlaveRecord>) -> Self {
        let input_size = slaves.iter().map(|s| s.input_bytes as usize).sum();
        let output_size = slaves.iter().map(|s| s.output_bytes as usize).sum();
        Self {
            slaves,
            input_size,
            output_size,
            phase: BusPhase::Init,
            open: false,
            fail_exchanges: 0,
        }
    }

    /// A typical two-slave test rig: one digital I/O block and one analog
    /// block, 8 bytes each way.
    #[must_use]
    pub fn with_test_slaves() -> Self {
        Self::new(vec![
            SlaveRecord::new(1, "DIO block")
                .with_identity(0x0000_0002, 0x03F0_3052)
                .with_io(4, 4),
            SlaveRecord::new(2, "AIO block")
                .with_identity(0x0000_0002, 0x0C1E_3052)
                .with_io(4, 4),
        ])
    }

    /// Make the next `n` exchanges report a working-counter failure.
    pub fn fail_next_exchanges(&mut self, n: u32) {
        self.fail_exchanges = n;
    }
}

impl Transport for SimulatedTransport {
    fn open(&mut self, interface: &str) -> GateResult<()> {
        debug!(interface, "simulated transport open");
        self.open = true;
        self.phase = BusPhase::Init;
        Ok(())
    }

    fn enumerate(&mut self) -> GateResult<Vec<SlaveRecord>> {
        if !self.open {
            return Err(GateError::Fieldbus("transport not open".into()));
        }
        debug!(count = self.slaves.len(), "simulated slave scan");
        Ok(self.slaves.clone())
    }

    fn map_image(&mut self) -> GateResult<(usize, usize)> {
        if !self.open {
            return Err(GateError::Fieldbus("transport not open".into()));
        }
        Ok((self.input_size, self.output_size))
    }

    fn request_state(&mut self, phase: BusPhase) -> GateResult<()> {
        if !self.open {
            return Err(GateError::Fieldbus("transport not open".into()));
        }
        debug!(%phase, "simulated state transition");
        self.phase = phase;
        Ok(())
    }

    fn poll_state(&mut self, _expect: BusPhase, _timeout: Duration) -> GateResult<BusPhase> {
        Ok(self.phase)
    }

    fn exchange(&mut self, outputs: &[u8], inputs: &mut [u8]) -> GateResult<i32> {
        if !self.open {
            return Err(GateError::Fieldbus("transport not open".into()));
        }
        if self.fail_exchanges > 0 {
            self.fail_exchanges -= 1;
            return Ok(-1);
        }

        let n = outputs.len().min(inputs.len());
        inputs[..n].copy_from_slice(&outputs[..n]);
        Ok(self.slaves.len() as i32)
    }

    fn close(&mut self) {
        self.open = false;
        self.phase = BusPhase::Init;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_reports_empty_bus() {
        let mut stub = StubTransport::new();
        stub.open("eth0").unwrap();
        assert!(stub.enumerate().unwrap().is_empty());
        assert_eq!(stub.map_image().unwrap(), (0, 0));
    }

    #[test]
    fn test_stub_requires_open() {
        let mut stub = StubTransport::new();
        assert!(stub.enumerate().is_err());
    }

    #[test]
    fn test_stub_exchange_stamps_counter() {
        let mut stub = StubTransport::new();
        stub.open("eth0").unwrap();

        let mut inputs = [0u8; 8];
        stub.exchange(&[], &mut inputs).unwrap();
        stub.exchange(&[], &mut inputs).unwrap();
        assert_eq!(u32::from_ne_bytes([inputs[0], inputs[1], inputs[2], inputs[3]]), 2);
    }

    #[test]
    fn test_simulated_loopback() {
        let mut sim = SimulatedTransport::with_test_slaves();
        sim.open("sim0").unwrap();
        assert_eq!(sim.map_image().unwrap(), (8, 8));

        let outputs = [0xAA, 0xBB, 0xCC, 0xDD, 0, 0, 0, 0];
        let mut inputs = [0u8; 8];
        let wkc = sim.exchange(&outputs, &mut inputs).unwrap();
        assert_eq!(wkc, 2);
        assert_eq!(&inputs[..4], &[0xAA, 0xBB, 0xCC, 0xDD]);
    }

    #[test]
    fn test_simulated_injected_wkc_failures() {
        let mut sim = SimulatedTransport::with_test_slaves();
        sim.open("sim0").unwrap();
        sim.fail_next_exchanges(2);

        let mut inputs = [0u8; 8];
        assert_eq!(sim.exchange(&[0u8; 8], &mut inputs).unwrap(), -1);
        assert_eq!(sim.exchange(&[0u8; 8], &mut inputs).unwrap(), -1);
        assert_eq!(sim.exchange(&[0u8; 8], &mut inputs).unwrap(), 2);
    }

    #[test]
    fn test_phase_tracking() {
        let mut sim = SimulatedTransport::new(Vec::new());
        sim.open("sim0").unwrap();
        sim.request_state(BusPhase::SafeOp).unwrap();
        assert_eq!(
            sim.poll_state(BusPhase::SafeOp, Duration::from_millis(1)).unwrap(),
            BusPhase::SafeOp
        );
    }
}
