use std::time::Duration;

use crate::app::AppData;
use crate::counter::{CounterCache, CounterStore};

/// When the first flush fires after boot and how long each cycle waits
/// afterwards.
#[derive(Debug, Clone, Copy)]
pub struct SyncSchedule {
    pub delay: Duration,
    pub period: Duration,
}

impl Default for SyncSchedule {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(60),
            period: Duration::from_secs(300),
        }
    }
}

/// Spawn the reconciliation task in a non-blocking loop for the lifetime of
/// the process: each cycle copies the cached counter into mysql. A failed
/// cycle is logged and retried on the next tick, never sooner.
pub fn spawn_counter_sync<C, S>(data: AppData<C, S>)
where
    C: CounterCache + 'static,
    S: CounterStore + 'static,
{
    tokio::spawn(async move {
        let SyncSchedule { delay, period } = data.sync;
        let start = tokio::time::Instant::now() + delay;
        let mut heartbeat = tokio::time::interval_at(start, period);

        loop {
            heartbeat.tick().await;
            match data.counter.flush().await {
                Ok(value) => tracing::info!(value, "counter flushed"),
                Err(err) => tracing::error!("fail to flush counter: {err:#}"),
            }
        }
    });
}
