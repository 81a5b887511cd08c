//! Bus master: lifecycle state machine, process images, and PDO access.
//!
//! The master owns the input and output process images and drives the
//! backend through the [`Transport`] trait. [`SharedMaster`] wraps it for
//! concurrent use by the cyclic thread and the request path.

use crate::stats::{ErrorStats, TimingStats};
use crate::transport::{BusPhase, Transport};
use crate::SlaveRecord;
use fieldgate_common::{GateError, GateResult, MAX_SLAVES};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Attempt limit for the OPERATIONAL poll during bring-up.
const OP_POLL_ATTEMPTS: u32 = 40;

/// Per-iteration state-check timeout during bring-up.
const OP_POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// Bus master lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusState {
    /// Not initialised; terminal after cleanup.
    #[default]
    Uninited,
    /// Initialised, bus down, no images mapped.
    Inactive,
    /// Bus up, cyclic exchange permitted.
    Active,
}

impl BusState {
    fn name(self) -> &'static str {
        match self {
            Self::Uninited => "UNINITED",
            Self::Inactive => "INACTIVE",
            Self::Active => "ACTIVE",
        }
    }
}

impl std::fmt::Display for BusState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Fieldbus master owning the bus lifecycle and the process images.
pub struct BusMaster {
    interface: String,
    state: BusState,
    slaves: Vec<SlaveRecord>,
    inputs: Vec<u8>,
    outputs: Vec<u8>,
    transport: Box<dyn Transport>,
}

impl std::fmt::Debug for BusMaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusMaster")
            .field("interface", &self.interface)
            .field("state", &self.state)
            .field("slave_count", &self.slaves.len())
            .field("input_size", &self.inputs.len())
            .field("output_size", &self.outputs.len())
            .finish_non_exhaustive()
    }
}

impl BusMaster {
    /// Initialise a master for the given interface. Never touches hardware.
    #[must_use]
    pub fn new(interface: &str, transport: Box<dyn Transport>) -> Self {
        info!(interface, "bus master initialised");
        Self {
            interface: interface.to_owned(),
            state: BusState::Inactive,
            slaves: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            transport,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> BusState {
        self.state
    }

    /// Whether the bus is up.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == BusState::Active
    }

    /// Number of slaves discovered during the last bring-up.
    #[must_use]
    pub fn slave_count(&self) -> u32 {
        self.slaves.len() as u32
    }

    /// The slave table.
    #[must_use]
    pub fn slaves(&self) -> &[SlaveRecord] {
        &self.slaves
    }

    /// The mapped input image.
    #[must_use]
    pub fn input_image(&self) -> &[u8] {
        &self.inputs
    }

    /// The mapped output image.
    #[must_use]
    pub fn output_image(&self) -> &[u8] {
        &self.outputs
    }

    /// Bring the bus up: open the interface, enumerate slaves, map the
    /// process image, and walk every slave to OPERATIONAL within a bounded
    /// number of poll attempts. Any phase failure tears the bus back down to
    /// [`BusState::Inactive`] with images freed and the slave table cleared.
    ///
    /// # Errors
    ///
    /// Fails if the master is not `Inactive` or if any bring-up phase fails.
    pub fn start(&mut self) -> GateResult<()> {
        match self.state {
            BusState::Inactive => {}
            other => {
                return Err(GateError::InvalidTransition {
                    from: other.name(),
                    to: BusState::Active.name(),
                })
            }
        }

        match self.bring_up() {
            Ok(()) => {
                self.state = BusState::Active;
                info!(
                    interface = %self.interface,
                    slaves = self.slaves.len(),
                    input_size = self.inputs.len(),
                    output_size = self.outputs.len(),
                    "bus started, all slaves OPERATIONAL"
                );
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "bus bring-up failed");
                self.tear_down();
                Err(e)
            }
        }
    }

    fn bring_up(&mut self) -> GateResult<()> {
        self.transport.open(&self.interface)?;

        let mut slaves = self.transport.enumerate()?;
        if slaves.len() > MAX_SLAVES {
            warn!(
                discovered = slaves.len(),
                kept = MAX_SLAVES,
                "slave table capacity exceeded"
            );
            slaves.truncate(MAX_SLAVES);
        }
        self.slaves = slaves;

        let (input_size, output_size) = self.transport.map_image()?;
        self.inputs = vec![0; input_size];
        self.outputs = vec![0; output_size];

        self.transport.request_state(BusPhase::SafeOp)?;
        self.transport.request_state(BusPhase::Op)?;

        for attempt in 0..OP_POLL_ATTEMPTS {
            let _ = self.transport.exchange(&self.outputs, &mut self.inputs);
            if self.transport.poll_state(BusPhase::Op, OP_POLL_TIMEOUT)? == BusPhase::Op {
                debug!(attempt, "all slaves reached OPERATIONAL");
                for slave in &mut self.slaves {
                    slave.online = true;
                }
                return Ok(());
            }
        }

        Err(GateError::Fieldbus(
            "slaves did not reach OPERATIONAL".into(),
        ))
    }

    fn tear_down(&mut self) {
        self.transport.close();
        self.slaves.clear();
        self.inputs = Vec::new();
        self.outputs = Vec::new();
        self.state = BusState::Inactive;
    }

    /// Take the bus down: SAFE-OP, INIT, close the interface, free the
    /// images, clear the slave table. A no-op when the bus is already down.
    pub fn stop(&mut self) {
        if self.state == BusState::Active {
            if let Err(e) = self.transport.request_state(BusPhase::SafeOp) {
                warn!(error = %e, "SAFE_OP request failed during stop");
            }
            if let Err(e) = self.transport.request_state(BusPhase::Init) {
                warn!(error = %e, "INIT request failed during stop");
            }
            info!(interface = %self.interface, "bus stopped");
        }
        self.tear_down();
    }

    /// Report the slave count from the last bring-up. Does not re-enumerate.
    #[must_use]
    pub fn scan(&self) -> u32 {
        self.slave_count()
    }

    /// Exchange one process-data cycle: send the output image, receive the
    /// input image. Non-negative working counter is success.
    ///
    /// # Errors
    ///
    /// Fails when the bus is down or the frame did not make it around the
    /// ring; the caller owns the error accounting.
    pub fn cyclic_exchange(&mut self) -> GateResult<()> {
        if self.state != BusState::Active {
            return Err(GateError::NetworkInactive);
        }

        let wkc = self.transport.exchange(&self.outputs, &mut self.inputs)?;
        if wkc < 0 {
            return Err(GateError::Fieldbus(format!("working counter {wkc}")));
        }
        Ok(())
    }

    /// Read `min(size, 4)` bytes of the input image at `offset` into a
    /// zero-initialised host-order value.
    ///
    /// # Errors
    ///
    /// Fails when the bus is down, the slave index is outside the table, or
    /// the access crosses the end of the image.
    pub fn read_pdo(&self, slave: u32, offset: u32, size: u32) -> GateResult<u32> {
        self.check_access(slave, offset, size, self.inputs.len())?;

        let n = size.min(4) as usize;
        let start = offset as usize;
        let mut bytes = [0u8; 4];
        bytes[..n].copy_from_slice(&self.inputs[start..start + n]);
        Ok(u32::from_ne_bytes(bytes))
    }

    /// Write `min(size, 4)` bytes of `value` (host order) into the output
    /// image at `offset`. The new bytes go out on the next cyclic exchange.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Self::read_pdo`], bounded by the output image.
    pub fn write_pdo(&mut self, slave: u32, offset: u32, size: u32, value: u32) -> GateResult<()> {
        self.check_access(slave, offset, size, self.outputs.len())?;

        let n = size.min(4) as usize;
        let start = offset as usize;
        self.outputs[start..start + n].copy_from_slice(&value.to_ne_bytes()[..n]);
        Ok(())
    }

    fn check_access(&self, slave: u32, offset: u32, size: u32, limit: usize) -> GateResult<()> {
        if self.state != BusState::Active {
            return Err(GateError::NetworkInactive);
        }
        if slave == 0 || slave > self.slave_count() {
            return Err(GateError::SlaveNotFound { slave });
        }
        let in_bounds = offset
            .checked_add(size)
            .is_some_and(|end| end as usize <= limit);
        if !in_bounds {
            return Err(GateError::PdoOutOfRange {
                offset,
                size,
                limit: limit as u32,
            });
        }
        Ok(())
    }

    /// Whether the slave at 0-based index `index` is present and online.
    #[must_use]
    pub fn slave_online(&self, index: u32) -> bool {
        self.slaves
            .get(index as usize)
            .is_some_and(|slave| slave.online)
    }

    /// Release everything; the master is unusable afterwards.
    pub fn cleanup(&mut self) {
        self.stop();
        self.state = BusState::Uninited;
    }
}

/// Concurrent wrapper bridging the cyclic thread and the request path.
///
/// The master sits behind a mutex; the `active` flag is mirrored into an
/// atomic so the cyclic thread can skip idle cycles without contending, and
/// the statistics groups live outside the lock so diagnostic commands never
/// wait on an exchange in flight.
pub struct SharedMaster {
    inner: Mutex<BusMaster>,
    active: AtomicBool,
    timing: TimingStats,
    errors: ErrorStats,
}

impl std::fmt::Debug for SharedMaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedMaster")
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

impl SharedMaster {
    /// Wrap a master for shared use.
    #[must_use]
    pub fn new(master: BusMaster) -> Self {
        let active = master.is_active();
        Self {
            inner: Mutex::new(master),
            active: AtomicBool::new(active),
            timing: TimingStats::new(),
            errors: ErrorStats::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BusMaster> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock-free view of the active flag.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Bring the bus up. See [`BusMaster::start`].
    ///
    /// # Errors
    ///
    /// Propagates bring-up failures; the active flag stays down on error.
    pub fn start(&self) -> GateResult<()> {
        let mut master = self.lock();
        master.start()?;
        self.active.store(true, Ordering::Release);
        Ok(())
    }

    /// Take the bus down. See [`BusMaster::stop`].
    pub fn stop(&self) {
        self.active.store(false, Ordering::Release);
        self.lock().stop();
    }

    /// Cached slave count.
    #[must_use]
    pub fn scan(&self) -> u32 {
        self.lock().scan()
    }

    /// Snapshot `(slave_count, active)` for status replies.
    #[must_use]
    pub fn status(&self) -> (u32, bool) {
        let master = self.lock();
        (master.slave_count(), master.is_active())
    }

    /// Whether the slave at 0-based `index` is present and online.
    #[must_use]
    pub fn slave_online(&self, index: u32) -> bool {
        self.lock().slave_online(index)
    }

    /// Read from the input image. See [`BusMaster::read_pdo`].
    ///
    /// # Errors
    ///
    /// Propagates the master's precondition failures.
    pub fn read_pdo(&self, slave: u32, offset: u32, size: u32) -> GateResult<u32> {
        self.lock().read_pdo(slave, offset, size)
    }

    /// Write to the output image. See [`BusMaster::write_pdo`].
    ///
    /// # Errors
    ///
    /// Propagates the master's precondition failures.
    pub fn write_pdo(&self, slave: u32, offset: u32, size: u32, value: u32) -> GateResult<()> {
        self.lock().write_pdo(slave, offset, size, value)
    }

    /// One cyclic exchange, with working-counter failures counted. Called
    /// only by the cyclic thread.
    ///
    /// # Errors
    ///
    /// Propagates exchange failures after accounting them.
    pub fn exchange(&self) -> GateResult<()> {
        match self.lock().cyclic_exchange() {
            Ok(()) => Ok(()),
            Err(GateError::NetworkInactive) => Err(GateError::NetworkInactive),
            Err(e) => {
                self.errors.record_wkc_error();
                Err(e)
            }
        }
    }

    /// Cycle timing counters.
    #[must_use]
    pub fn timing(&self) -> &TimingStats {
        &self.timing
    }

    /// Bus error counters.
    #[must_use]
    pub fn errors(&self) -> &ErrorStats {
        &self.errors
    }

    /// Reset both statistics groups.
    pub fn reset_stats(&self) {
        self.timing.reset();
        self.errors.reset();
    }

    /// Stop the bus and release the master. Terminal.
    pub fn cleanup(&self) {
        self.active.store(false, Ordering::Release);
        self.lock().cleanup();
    }
}
