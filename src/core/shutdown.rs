//! Cooperative shutdown flag shared by the scheduler, delivery worker, and
//! signal handler.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cloneable shutdown request flag.
///
/// `Ordering::Relaxed` throughout: loops poll the flag every iteration and
/// need no ordering against other memory.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
    inner: Arc<AtomicBool>,
}

impl ShutdownFlag {
    /// Create an unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Idempotent.
    pub fn request(&self) {
        self.inner.store(true, Ordering::Relaxed);
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.inner.load(Ordering::Relaxed)
    }

    /// The raw atomic, for registration with OS signal hooks.
    #[must_use]
    pub fn as_atomic(&self) -> &Arc<AtomicBool> {
        &self.inner
    }
}

/// One-shot trigger flag: raised by a signal or CLI, consumed by the
/// scheduler to start a cycle ahead of the interval.
#[derive(Debug, Clone, Default)]
pub struct TriggerFlag {
    inner: Arc<AtomicBool>,
}

impl TriggerFlag {
    /// Create an unraised trigger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the trigger.
    pub fn raise(&self) {
        self.inner.store(true, Ordering::Relaxed);
    }

    /// Consume the trigger, returning whether it was raised.
    #[must_use]
    pub fn take(&self) -> bool {
        self.inner.swap(false, Ordering::Relaxed)
    }

    /// The raw atomic, for registration with OS signal hooks.
    #[must_use]
    pub fn as_atomic(&self) -> &Arc<AtomicBool> {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_is_visible_to_clones() {
        let flag = ShutdownFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_requested());
        flag.request();
        assert!(clone.is_requested());
    }

    #[test]
    fn trigger_is_consumed_on_take() {
        let trigger = TriggerFlag::new();
        assert!(!trigger.take());
        trigger.raise();
        assert!(trigger.take());
        assert!(!trigger.take());
    }
}
