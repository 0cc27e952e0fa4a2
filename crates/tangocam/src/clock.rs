//! Monotonic elapsed-time sources for capture timeouts
//!
//! The capture budget must not shrink or freeze when the wall clock is set
//! or when the host suspends. `BootClock` reads `CLOCK_BOOTTIME` on Linux and
//! Android, which keeps counting across suspend; elsewhere it falls back to
//! `std::time::Instant`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Source of monotonic nanoseconds.
///
/// Only differences between readings are meaningful.
pub trait Clock: Send + Sync {
    fn now_ns(&self) -> u64;

    /// Nanoseconds since `start_ns`, saturating at zero.
    fn elapsed_since(&self, start_ns: u64) -> u64 {
        self.now_ns().saturating_sub(start_ns)
    }
}

/// Suspend-aware monotonic clock
pub struct BootClock {
    #[cfg_attr(any(target_os = "linux", target_os = "android"), allow(dead_code))]
    origin: Instant,
}

impl BootClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for BootClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for BootClock {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    fn now_ns(&self) -> u64 {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        // SAFETY: `ts` is a valid, writable timespec for the duration of the call.
        let rc = unsafe { libc::clock_gettime(libc::CLOCK_BOOTTIME, &mut ts) };
        if rc != 0 {
            return 0;
        }
        (ts.tv_sec as u64)
            .saturating_mul(1_000_000_000)
            .saturating_add(ts.tv_nsec as u64)
    }

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    fn now_ns(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }
}

/// Hand-advanced clock for deterministic timeout tests and replay
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(ns: u64) -> Self {
        Self {
            now: AtomicU64::new(ns),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, ns: u64) {
        self.now.store(ns, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ns(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
