//! Service lifecycle: shared state, thread spawn order, and teardown.

use crate::clients::ClientTable;
use crate::ring::{ProcessDataRing, DEFAULT_RING_CAPACITY};
use crate::{cyclic, management, network};
use fieldgate_common::{GateError, GateResult, ServiceConfig, MAX_CLIENTS};
use fieldgate_fieldbus::{BusMaster, SharedMaster, StubTransport, Transport};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use tracing::{error, info, warn};

/// State shared by the three service threads.
#[derive(Debug)]
pub struct ServiceShared {
    /// Effective configuration.
    pub config: ServiceConfig,
    /// The fieldbus master behind its concurrency wrapper.
    pub master: SharedMaster,
    /// Operator client table, guarded for network/management access.
    pub clients: Mutex<ClientTable>,
    /// Reserved process-data channel.
    pub ring: ProcessDataRing,
    bound_addr: Mutex<Option<SocketAddr>>,
    shutdown_requested: AtomicBool,
    threads_running: AtomicBool,
}

impl ServiceShared {
    /// Loop-head test used by every activity.
    #[must_use]
    pub fn running(&self) -> bool {
        self.threads_running.load(Ordering::Relaxed)
            && !self.shutdown_requested.load(Ordering::Relaxed)
    }

    /// Raise the cooperative shutdown flag.
    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::Relaxed);
    }

    /// Lock the client table, recovering from a poisoned lock.
    pub fn lock_clients(&self) -> std::sync::MutexGuard<'_, ClientTable> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Address the control socket actually bound to, once the network
    /// thread is up.
    #[must_use]
    pub fn bound_addr(&self) -> Option<SocketAddr> {
        *self
            .bound_addr
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_bound_addr(&self, addr: SocketAddr) {
        *self
            .bound_addr
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(addr);
    }
}

/// The gateway service: three scheduled activities over [`ServiceShared`].
#[derive(Debug)]
pub struct Service {
    shared: Arc<ServiceShared>,
    threads: Vec<(&'static str, JoinHandle<()>)>,
}

impl Service {
    /// Initialise the service with the no-hardware bus backend.
    ///
    /// # Errors
    ///
    /// Propagates master initialisation failures.
    pub fn init(config: ServiceConfig) -> GateResult<Self> {
        Self::with_transport(config, Box::new(StubTransport::new()))
    }

    /// Initialise the service over a specific bus transport.
    ///
    /// # Errors
    ///
    /// Propagates master initialisation failures.
    pub fn with_transport(
        config: ServiceConfig,
        transport: Box<dyn Transport>,
    ) -> GateResult<Self> {
        let master = BusMaster::new(&config.network.interface, transport);
        let capacity = config.security.max_clients.clamp(1, MAX_CLIENTS);

        let shared = Arc::new(ServiceShared {
            master: SharedMaster::new(master),
            clients: Mutex::new(ClientTable::with_capacity(capacity)),
            ring: ProcessDataRing::with_capacity(DEFAULT_RING_CAPACITY),
            bound_addr: Mutex::new(None),
            shutdown_requested: AtomicBool::new(false),
            threads_running: AtomicBool::new(false),
            config,
        });

        info!("service initialised");
        Ok(Self {
            shared,
            threads: Vec::new(),
        })
    }

    /// The shared state (tests and embedders).
    #[must_use]
    pub fn shared(&self) -> &Arc<ServiceShared> {
        &self.shared
    }

    /// Bind the control socket and spawn the three activities in order:
    /// network, cyclic, management. A bind or spawn failure unwinds by
    /// clearing the run flag and joining whatever already started.
    ///
    /// # Errors
    ///
    /// Fails when the socket cannot be bound or a thread cannot be spawned.
    pub fn start(&mut self) -> GateResult<()> {
        let socket = network::setup_socket(&self.shared.config).map_err(|e| {
            error!(error = %e, "failed to bind control socket");
            GateError::Io(e.to_string())
        })?;
        if let Ok(addr) = socket.local_addr() {
            info!(%addr, "control socket bound");
            self.shared.set_bound_addr(addr);
        }

        self.shared.threads_running.store(true, Ordering::Relaxed);

        {
            let shared = Arc::clone(&self.shared);
            let handle = std::thread::Builder::new()
                .name("fieldgate-net".into())
                .spawn(move || network::run(shared, socket))
                .map_err(|e| self.unwind_spawn_failure("fieldgate-net", &e))?;
            self.threads.push(("fieldgate-net", handle));
        }

        let activities: [(&'static str, fn(Arc<ServiceShared>)); 2] = [
            ("fieldgate-cyclic", cyclic::run),
            ("fieldgate-mgmt", management::run),
        ];

        for (name, entry) in activities {
            let shared = Arc::clone(&self.shared);
            match std::thread::Builder::new()
                .name(name.into())
                .spawn(move || entry(shared))
            {
                Ok(handle) => self.threads.push((name, handle)),
                Err(e) => return Err(self.unwind_spawn_failure(name, &e)),
            }
        }

        info!("service started - all threads running");
        Ok(())
    }

    fn unwind_spawn_failure(&mut self, name: &'static str, error: &std::io::Error) -> GateError {
        error!(thread = name, error = %error, "failed to spawn service thread");
        self.shared.threads_running.store(false, Ordering::Relaxed);
        self.join_all();
        GateError::Io(error.to_string())
    }

    /// Request cooperative shutdown and join all activities.
    pub fn stop(&mut self) {
        info!("stopping service");
        self.shared.request_shutdown();
        self.shared.threads_running.store(false, Ordering::Relaxed);
        self.join_all();
        info!("all threads stopped");
    }

    fn join_all(&mut self) {
        for (name, handle) in self.threads.drain(..) {
            if handle.join().is_err() {
                warn!(thread = name, "service thread panicked");
            }
        }
    }

    /// Stop the bus master and release remaining resources.
    pub fn cleanup(&self) {
        self.shared.master.cleanup();
        info!("service cleaned up");
    }
}
