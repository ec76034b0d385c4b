//! Refresh poller - fixed-cadence tick for the engine's refresh queue
//!
//! Sends one tick into the engine per period. The engine decides what a tick
//! means (query one unresolved slot, or nothing); the poller only provides
//! the cadence, which keeps the one-query-per-tick throttle testable without
//! timers.

use crate::engine::EngineHandle;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Default seconds between refresh ticks
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 5;

/// Spawn the refresh poller task
///
/// Ticks until the engine shuts down. The cadence is fixed; there is no
/// catch-up bursting when a tick is late, the next one just happens on
/// schedule.
pub fn spawn_poller(handle: EngineHandle, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first interval tick fires immediately; consume it so the
        // first query waits a full period
        ticker.tick().await;

        info!(interval_secs = interval.as_secs_f64(), "Refresh poller started");

        loop {
            ticker.tick().await;
            if !handle.is_alive() {
                break;
            }
            handle.poll_tick();
        }

        debug!("Refresh poller stopped");
    })
}
