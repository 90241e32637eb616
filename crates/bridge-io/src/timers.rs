//! The three logical timers, re-architected onto `tokio::time` tasks.
//!
//! The original design calls for OS-delivered signals setting flags
//! that the dispatcher drains on every wakeup. A single-threaded Tokio
//! runtime has no signal-safe flag primitive worth reaching for, so
//! each periodic timer is instead a small task that sets an
//! `AtomicBool` on every tick; the dispatcher's `select!` loop still
//! drains and clears the flags first, preserving the original
//! wakeup-order contract with a readiness primitive Tokio actually
//! gives us.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bridge_core::constants::{IPADDR_PERIOD_MS, STATS_PERIOD_MS};
use tokio::task::JoinHandle;

/// A flag set by a background timer task and cleared by the reader.
#[derive(Clone, Default)]
pub struct TimerFlag(Arc<AtomicBool>);

impl TimerFlag {
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Clears and returns the previous value.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    fn set(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Owns the background tasks backing the STATS and IPADDR periodic
/// timers. Dropping this stops both tasks.
pub struct TimerService {
    pub stats: TimerFlag,
    pub ipaddr: TimerFlag,
    stats_task: JoinHandle<()>,
    ipaddr_task: JoinHandle<()>,
}

impl TimerService {
    #[must_use]
    pub fn start() -> Self {
        let stats = TimerFlag::new();
        let ipaddr = TimerFlag::new();

        let stats_task = spawn_periodic(stats.clone(), Duration::from_millis(STATS_PERIOD_MS));
        let ipaddr_task = spawn_periodic(ipaddr.clone(), Duration::from_millis(IPADDR_PERIOD_MS));

        Self {
            stats,
            ipaddr,
            stats_task,
            ipaddr_task,
        }
    }
}

impl Drop for TimerService {
    fn drop(&mut self) {
        self.stats_task.abort();
        self.ipaddr_task.abort();
    }
}

fn spawn_periodic(flag: TimerFlag, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            flag.set();
        }
    })
}
