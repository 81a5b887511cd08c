//! Management activity: housekeeping naps and periodic status emission.
//!
//! Sleeps in 10 s increments (interruptible so shutdown stays prompt) and
//! logs a status record every minute. Performs no bus I/O.

use crate::service::ServiceShared;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

const HOUSEKEEPING_NAP: Duration = Duration::from_secs(10);
const STATUS_INTERVAL: Duration = Duration::from_secs(60);

/// Management thread entry point.
pub fn run(shared: Arc<ServiceShared>) {
    info!("management thread starting");

    let mut last_status = Instant::now();

    while shared.running() {
        nap(&shared, HOUSEKEEPING_NAP);

        if last_status.elapsed() >= STATUS_INTERVAL {
            let (slaves, active) = shared.master.status();
            let clients = shared.lock_clients().active_count();
            info!(
                network = if active { "UP" } else { "DOWN" },
                slaves, clients, "service status"
            );
            last_status = Instant::now();
        }
    }

    info!("management thread stopped");
}

fn nap(shared: &ServiceShared, total: Duration) {
    let deadline = Instant::now() + total;
    while shared.running() {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        std::thread::sleep((deadline - now).min(Duration::from_millis(250)));
    }
}
