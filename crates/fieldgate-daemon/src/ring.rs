//! Single-producer / single-consumer byte ring for process data.
//!
//! Power-of-two capacity with free-running u32 indices and a size-1 mask;
//! occupancy is the wrapping difference of the indices and never exceeds the
//! capacity. The producer publishes payload bytes before its Release store of
//! `write_idx`; the consumer reads behind an Acquire load, so the bytes it
//! sees are always fully written.
//!
//! The ring is reserved: the kernel constructs one per service but the data
//! path does not use it yet.

use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU32, Ordering};

/// Default ring capacity in bytes.
pub const DEFAULT_RING_CAPACITY: usize = 8192;

/// SPSC byte ring buffer.
pub struct ProcessDataRing {
    buf: Box<[UnsafeCell<u8>]>,
    mask: u32,
    write_idx: CachePadded<AtomicU32>,
    read_idx: CachePadded<AtomicU32>,
}

// SAFETY: the buffer cells are only written by the single producer and only
// read by the single consumer, in disjoint index ranges guarded by the
// Acquire/Release index handshake below.
#[allow(unsafe_code)]
unsafe impl Send for ProcessDataRing {}
#[allow(unsafe_code)]
unsafe impl Sync for ProcessDataRing {}

impl std::fmt::Debug for ProcessDataRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessDataRing")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl ProcessDataRing {
    /// Create a ring holding at least `capacity` bytes, rounded up to the
    /// next power of two.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(2).next_power_of_two();
        let buf = (0..capacity).map(|_| UnsafeCell::new(0u8)).collect();
        Self {
            buf,
            mask: (capacity - 1) as u32,
            write_idx: CachePadded::new(AtomicU32::new(0)),
            read_idx: CachePadded::new(AtomicU32::new(0)),
        }
    }

    /// Usable capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        let write = self.write_idx.load(Ordering::Acquire);
        let read = self.read_idx.load(Ordering::Acquire);
        write.wrapping_sub(read) as usize
    }

    /// Whether the ring holds no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Split into the producer and consumer halves. The exclusive borrow
    /// guarantees a single producer and a single consumer.
    pub fn split(&mut self) -> (RingProducer<'_>, RingConsumer<'_>) {
        let ring = &*self;
        (RingProducer { ring }, RingConsumer { ring })
    }
}

/// Writing half of a [`ProcessDataRing`].
#[derive(Debug)]
pub struct RingProducer<'a> {
    ring: &'a ProcessDataRing,
}

impl RingProducer<'_> {
    /// Append as much of `data` as fits; returns the number of bytes queued.
    #[allow(unsafe_code)]
    pub fn push(&mut self, data: &[u8]) -> usize {
        let ring = self.ring;
        let write = ring.write_idx.load(Ordering::Relaxed);
        let read = ring.read_idx.load(Ordering::Acquire);

        let free = ring.capacity() - write.wrapping_sub(read) as usize;
        let n = data.len().min(free);

        for (i, &byte) in data[..n].iter().enumerate() {
            let index = (write.wrapping_add(i as u32) & ring.mask) as usize;
            // SAFETY: indices in [read, read+capacity) exclusive to the
            // producer; the consumer only reads below `write`.
            unsafe { *ring.buf[index].get() = byte };
        }

        ring.write_idx
            .store(write.wrapping_add(n as u32), Ordering::Release);
        n
    }
}

/// Reading half of a [`ProcessDataRing`].
#[derive(Debug)]
pub struct RingConsumer<'a> {
    ring: &'a ProcessDataRing,
}

impl RingConsumer<'_> {
    /// Remove up to `out.len()` bytes; returns the number of bytes copied.
    #[allow(unsafe_code)]
    pub fn pop(&mut self, out: &mut [u8]) -> usize {
        let ring = self.ring;
        let write = ring.write_idx.load(Ordering::Acquire);
        let read = ring.read_idx.load(Ordering::Relaxed);

        let available = write.wrapping_sub(read) as usize;
        let n = out.len().min(available);

        for (i, slot) in out[..n].iter_mut().enumerate() {
            let index = (read.wrapping_add(i as u32) & ring.mask) as usize;
            // SAFETY: indices below `write` were published by the producer's
            // Release store and are not rewritten until `read_idx` passes them.
            *slot = unsafe { *ring.buf[index].get() };
        }

        ring.read_idx
            .store(read.wrapping_add(n as u32), Ordering::Release);
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_rounds_to_power_of_two() {
        let ring = ProcessDataRing::with_capacity(1000);
        assert_eq!(ring.capacity(), 1024);
        assert_eq!(ring.mask + 1, 1024);
        assert!(ring.capacity().is_power_of_two());
    }

    #[test]
    fn test_push_pop_roundtrip() {
        let mut ring = ProcessDataRing::with_capacity(16);
        let (mut tx, mut rx) = ring.split();

        assert_eq!(tx.push(&[1, 2, 3, 4]), 4);
        let mut out = [0u8; 4];
        assert_eq!(rx.pop(&mut out), 4);
        assert_eq!(out, [1, 2, 3, 4]);
        drop((tx, rx));
        assert!(ring.is_empty());
    }

    #[test]
    fn test_push_stops_at_capacity() {
        let mut ring = ProcessDataRing::with_capacity(8);
        let (mut tx, mut rx) = ring.split();

        assert_eq!(tx.push(&[0u8; 12]), 8);
        assert_eq!(tx.push(&[0u8; 1]), 0);

        let mut out = [0u8; 3];
        assert_eq!(rx.pop(&mut out), 3);
        assert_eq!(tx.push(&[0u8; 12]), 3);
    }

    #[test]
    fn test_index_wraparound() {
        let mut ring = ProcessDataRing::with_capacity(8);
        let (mut tx, mut rx) = ring.split();

        // Drive the indices far past one lap
        let mut out = [0u8; 8];
        for round in 0u32..100 {
            let data = [round as u8; 5];
            assert_eq!(tx.push(&data), 5);
            assert_eq!(rx.pop(&mut out[..5]), 5);
            assert_eq!(&out[..5], &data);
        }
    }

    #[test]
    fn test_occupancy_invariant_under_concurrency() {
        let mut ring = ProcessDataRing::with_capacity(64);
        let capacity = ring.capacity();
        let (mut tx, mut rx) = ring.split();

        const TOTAL: usize = 10_000;
        std::thread::scope(|scope| {
            scope.spawn(move || {
                let mut sent = 0usize;
                while sent < TOTAL {
                    let byte = (sent % 251) as u8;
                    if tx.push(&[byte]) == 1 {
                        sent += 1;
                    } else {
                        std::hint::spin_loop();
                    }
                }
            });

            scope.spawn(move || {
                let mut received = 0usize;
                let mut byte = [0u8];
                while received < TOTAL {
                    if rx.pop(&mut byte) == 1 {
                        assert_eq!(byte[0], (received % 251) as u8);
                        received += 1;
                    } else {
                        std::hint::spin_loop();
                    }
                }
            });
        });

        assert!(ring.len() <= capacity);
        assert!(ring.is_empty());
    }
}
