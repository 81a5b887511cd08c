//! Cyclic activity: fixed-period process-data exchange.
//!
//! Runs at elevated priority on a drift-free absolute deadline. While the
//! bus is active, each cycle performs one exchange and feeds the timing
//! counters; otherwise the thread idles to the next deadline. Exchange
//! failures are counted, never propagated - the next cycle retries.

use crate::rt::{self, MonotonicDeadline};
use crate::service::ServiceShared;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Cyclic thread entry point.
pub fn run(shared: Arc<ServiceShared>) {
    info!("cyclic thread starting");

    rt::set_thread_priority(shared.config.performance.rt_priority);
    rt::set_cpu_affinity(&shared.config.performance.cpu_affinity);

    let period = shared.config.network.cycle_time;
    let mut deadline = MonotonicDeadline::now();
    let mut last_cycle: Option<Instant> = None;
    let mut cycles: u64 = 0;

    while shared.running() {
        if shared.master.is_active() {
            let now = Instant::now();
            if let Some(prev) = last_cycle {
                shared.master.timing().record_cycle(now - prev);
            }
            last_cycle = Some(now);

            if let Err(e) = shared.master.exchange() {
                debug!(error = %e, "process data exchange failed");
            }
            cycles += 1;
        } else {
            last_cycle = None;
        }

        deadline.advance(period);
        if deadline.sleep_until() {
            shared.master.timing().record_missed();
        }
    }

    info!(cycles, "cyclic thread stopped");
}
