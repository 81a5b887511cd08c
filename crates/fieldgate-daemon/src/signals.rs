//! Signal handling for graceful daemon shutdown.
//!
//! SIGTERM and SIGINT request cooperative shutdown; SIGHUP and SIGPIPE are
//! ignored. Handlers only touch a static atomic flag, which is the full
//! extent of what is async-signal-safe.

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Register the process signal handlers.
#[allow(unsafe_code)]
pub fn install() {
    #[cfg(unix)]
    {
        let handler: extern "C" fn(libc::c_int) = handle_terminate;
        // SAFETY: the handler is an extern "C" fn that only stores to an atomic
        unsafe {
            libc::signal(libc::SIGTERM, handler as libc::sighandler_t);
            libc::signal(libc::SIGINT, handler as libc::sighandler_t);
            libc::signal(libc::SIGHUP, libc::SIG_IGN);
            libc::signal(libc::SIGPIPE, libc::SIG_IGN);
        }
    }

    debug!("signal handlers registered");
}

#[cfg(unix)]
extern "C" fn handle_terminate(_signum: libc::c_int) {
    SHUTDOWN.store(true, Ordering::Relaxed);
}

/// Whether a terminate or interrupt signal has been received.
#[must_use]
pub fn shutdown_requested() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}

/// Request shutdown from code (equivalent to receiving SIGTERM).
pub fn request_shutdown() {
    SHUTDOWN.store(true, Ordering::Relaxed);
}
