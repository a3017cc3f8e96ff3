//! Signal handling: SIGTERM/SIGINT graceful shutdown, SIGUSR1 immediate
//! harvest trigger.
//!
//! Uses the `signal-hook` crate for safe signal registration. Loops poll the
//! shared flags each iteration rather than blocking on signals.

#![allow(missing_docs)]

use std::sync::Arc;

use signal_hook::consts::{SIGINT, SIGTERM};

use crate::core::shutdown::{ShutdownFlag, TriggerFlag};

/// Registers OS signal hooks onto the daemon's shared flags.
///
/// On Unix: SIGTERM/SIGINT -> shutdown, SIGUSR1 -> immediate harvest.
/// Registration is best-effort; failures are logged to stderr but not fatal.
pub struct SignalHandler {
    shutdown: ShutdownFlag,
    force_harvest: TriggerFlag,
}

impl SignalHandler {
    pub fn register(shutdown: ShutdownFlag, force_harvest: TriggerFlag) -> Self {
        let handler = Self {
            shutdown,
            force_harvest,
        };

        if let Err(e) =
            signal_hook::flag::register(SIGTERM, Arc::clone(handler.shutdown.as_atomic()))
        {
            eprintln!("[JFRH-SIGNAL] failed to register SIGTERM: {e}");
        }
        if let Err(e) =
            signal_hook::flag::register(SIGINT, Arc::clone(handler.shutdown.as_atomic()))
        {
            eprintln!("[JFRH-SIGNAL] failed to register SIGINT: {e}");
        }

        #[cfg(unix)]
        {
            use signal_hook::consts::SIGUSR1;
            if let Err(e) =
                signal_hook::flag::register(SIGUSR1, Arc::clone(handler.force_harvest.as_atomic()))
            {
                eprintln!("[JFRH-SIGNAL] failed to register SIGUSR1: {e}");
            }
        }

        handler
    }

    /// Check whether a shutdown has been requested.
    pub fn should_shutdown(&self) -> bool {
        self.shutdown.is_requested()
    }

    /// Programmatically request shutdown (e.g. from a fatal pipeline error).
    pub fn request_shutdown(&self) {
        self.shutdown.request();
    }

    /// Programmatically request an immediate harvest cycle.
    pub fn request_harvest(&self) {
        self.force_harvest.raise();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn programmatic_requests_reach_the_shared_flags() {
        let shutdown = ShutdownFlag::new();
        let trigger = TriggerFlag::new();
        let handler = SignalHandler::register(shutdown.clone(), trigger.clone());

        assert!(!handler.should_shutdown());
        handler.request_shutdown();
        assert!(shutdown.is_requested());

        handler.request_harvest();
        assert!(trigger.take());
    }
}
