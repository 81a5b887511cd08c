//! Real-time helpers for the cyclic thread.
//!
//! Priority elevation and CPU pinning are best-effort: failures (typically
//! EPERM without CAP_SYS_NICE) are logged and the thread continues at normal
//! priority. The absolute-deadline sleep uses `clock_nanosleep` with
//! `TIMER_ABSTIME` on Linux so the cycle period does not drift with
//! execution-time jitter.

use fieldgate_common::CpuAffinity;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Raise the calling thread to SCHED_FIFO at `priority`. A priority of 0
/// leaves the default time-sharing policy in place.
#[cfg(target_os = "linux")]
#[allow(unsafe_code)]
pub fn set_thread_priority(priority: u8) {
    if priority == 0 {
        debug!("real-time priority disabled");
        return;
    }

    let clamped = priority.clamp(1, 99);
    if clamped != priority {
        warn!(
            original = priority,
            clamped, "scheduler priority clamped to valid range"
        );
    }

    let param = libc::sched_param {
        sched_priority: i32::from(clamped),
    };

    // SAFETY: sched_setscheduler with a valid sched_param is sound
    let rc = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if rc == -1 {
        warn!(
            priority = clamped,
            error = %std::io::Error::last_os_error(),
            "failed to set real-time priority"
        );
    } else {
        info!(priority = clamped, "cyclic thread priority set");
    }
}

#[cfg(not(target_os = "linux"))]
pub fn set_thread_priority(priority: u8) {
    if priority > 0 {
        warn!(priority, "real-time scheduling not available on this platform");
    }
}

/// Pin the calling thread to the configured processor set.
#[cfg(target_os = "linux")]
pub fn set_cpu_affinity(affinity: &CpuAffinity) {
    use nix::sched::{sched_setaffinity, CpuSet};
    use nix::unistd::Pid;

    let cpus = affinity.cpus();
    if cpus.is_empty() {
        debug!("no CPU affinity configured");
        return;
    }

    let mut cpu_set = CpuSet::new();
    for &cpu in &cpus {
        if let Err(e) = cpu_set.set(cpu) {
            warn!(cpu, error = %e, "invalid CPU index in affinity set");
            return;
        }
    }

    match sched_setaffinity(Pid::from_raw(0), &cpu_set) {
        Ok(()) => info!(?cpus, "cyclic thread pinned"),
        Err(e) => warn!(?cpus, error = %e, "failed to set CPU affinity"),
    }
}

#[cfg(not(target_os = "linux"))]
pub fn set_cpu_affinity(affinity: &CpuAffinity) {
    if !affinity.cpus().is_empty() {
        warn!("CPU affinity not available on this platform");
    }
}

/// Absolute deadline on the monotonic clock.
///
/// Advancing by the cycle period and sleeping to the result gives a
/// drift-free fixed-rate loop regardless of how long each iteration took.
#[cfg(target_os = "linux")]
#[derive(Debug, Clone, Copy)]
pub struct MonotonicDeadline {
    ts: libc::timespec,
}

#[cfg(target_os = "linux")]
#[allow(unsafe_code)]
impl MonotonicDeadline {
    /// Deadline at the current instant.
    #[must_use]
    pub fn now() -> Self {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        // SAFETY: clock_gettime writes into a valid timespec
        unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
        Self { ts }
    }

    /// Advance the deadline by exactly `period`.
    pub fn advance(&mut self, period: Duration) {
        self.ts.tv_sec += period.as_secs() as libc::time_t;
        self.ts.tv_nsec += period.subsec_nanos() as libc::c_long;
        while self.ts.tv_nsec >= 1_000_000_000 {
            self.ts.tv_sec += 1;
            self.ts.tv_nsec -= 1_000_000_000;
        }
    }

    /// Sleep until the deadline. Returns true when the deadline had already
    /// passed on entry (a missed cycle).
    pub fn sleep_until(&self) -> bool {
        let now = Self::now();
        let missed = (now.ts.tv_sec, now.ts.tv_nsec) > (self.ts.tv_sec, self.ts.tv_nsec);

        loop {
            // SAFETY: the timespec is valid; the remain pointer may be null
            // for TIMER_ABSTIME sleeps
            let rc = unsafe {
                libc::clock_nanosleep(
                    libc::CLOCK_MONOTONIC,
                    libc::TIMER_ABSTIME,
                    &self.ts,
                    std::ptr::null_mut(),
                )
            };
            if rc != libc::EINTR {
                break;
            }
        }

        missed
    }
}

/// Portable fallback using relative sleeps on `Instant`.
#[cfg(not(target_os = "linux"))]
#[derive(Debug, Clone, Copy)]
pub struct MonotonicDeadline {
    at: std::time::Instant,
}

#[cfg(not(target_os = "linux"))]
impl MonotonicDeadline {
    /// Deadline at the current instant.
    #[must_use]
    pub fn now() -> Self {
        Self {
            at: std::time::Instant::now(),
        }
    }

    /// Advance the deadline by exactly `period`.
    pub fn advance(&mut self, period: Duration) {
        self.at += period;
    }

    /// Sleep until the deadline. Returns true when the deadline had already
    /// passed on entry (a missed cycle).
    pub fn sleep_until(&self) -> bool {
        let now = std::time::Instant::now();
        if now >= self.at {
            return true;
        }
        std::thread::sleep(self.at - now);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_deadline_paces_a_loop() {
        let period = Duration::from_millis(2);
        let mut deadline = MonotonicDeadline::now();
        let start = Instant::now();

        for _ in 0..5 {
            deadline.advance(period);
            deadline.sleep_until();
        }

        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn test_past_deadline_reports_missed() {
        let mut deadline = MonotonicDeadline::now();
        deadline.advance(Duration::from_micros(100));
        std::thread::sleep(Duration::from_millis(5));
        assert!(deadline.sleep_until());
    }

    #[test]
    fn test_priority_zero_is_noop() {
        set_thread_priority(0);
    }

    #[test]
    fn test_affinity_none_is_noop() {
        set_cpu_affinity(&CpuAffinity::None);
    }
}
