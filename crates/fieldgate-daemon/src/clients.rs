//! Bounded table of operator clients seen on the control socket.
//!
//! Clients are tracked per peer address. Slots are reused after an idle
//! timeout; the table never grows past its configured capacity.

use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Idle timeout after which a client slot is reclaimed.
pub const CLIENT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct ClientSlot {
    addr: SocketAddr,
    last_seen: Instant,
    active: bool,
}

/// Bounded operator-client table.
#[derive(Debug)]
pub struct ClientTable {
    slots: Vec<ClientSlot>,
    capacity: usize,
}

impl ClientTable {
    /// Create an empty table holding at most `capacity` clients.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a datagram from `addr`: refresh the existing slot or claim a
    /// new one. Returns true when a new slot was claimed.
    pub fn touch(&mut self, addr: SocketAddr) -> bool {
        self.touch_at(addr, Instant::now())
    }

    /// [`Self::touch`] with an explicit timestamp.
    pub fn touch_at(&mut self, addr: SocketAddr, now: Instant) -> bool {
        if let Some(slot) = self
            .slots
            .iter_mut()
            .find(|slot| slot.active && slot.addr == addr)
        {
            slot.last_seen = now;
            return false;
        }

        if let Some((index, slot)) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| !slot.active)
        {
            *slot = ClientSlot {
                addr,
                last_seen: now,
                active: true,
            };
            info!(client = %addr, slot = index, "client connected");
            return true;
        }

        if self.slots.len() < self.capacity {
            self.slots.push(ClientSlot {
                addr,
                last_seen: now,
                active: true,
            });
            info!(client = %addr, slot = self.slots.len() - 1, "client connected");
            return true;
        }

        warn!(client = %addr, capacity = self.capacity, "client table full");
        false
    }

    /// Deactivate slots idle for longer than `ttl` and shrink the table past
    /// trailing inactive slots.
    pub fn reap(&mut self, ttl: Duration) {
        self.reap_at(ttl, Instant::now());
    }

    /// [`Self::reap`] with an explicit timestamp.
    pub fn reap_at(&mut self, ttl: Duration, now: Instant) {
        for slot in &mut self.slots {
            if slot.active && now.duration_since(slot.last_seen) > ttl {
                info!(client = %slot.addr, "client timed out");
                slot.active = false;
            }
        }

        while self.slots.last().is_some_and(|slot| !slot.active) {
            self.slots.pop();
        }
    }

    /// Number of currently active clients.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.active).count()
    }

    /// High-water slot count, including inactive interior slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no slot is in use.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
