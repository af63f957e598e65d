//! Publishing of per-cycle snapshots.
//!
//! The control loop never waits on telemetry. [`TelemetryChannel`] hands
//! snapshots to a publisher thread over a bounded channel and drops them
//! when the queue is full.
use crossbeam_channel as xch;
use polar_traits::BoxError;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::control::CycleState;

/// Receiver of cycle snapshots. Best-effort: errors are logged by the loop.
pub trait TelemetrySink {
    fn publish(&mut self, state: &CycleState) -> Result<(), BoxError>;
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for Box<T> {
    fn publish(&mut self, state: &CycleState) -> Result<(), BoxError> {
        (**self).publish(state)
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTelemetry;

impl TelemetrySink for NullTelemetry {
    fn publish(&mut self, _state: &CycleState) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Counters shared with the publisher thread.
#[derive(Debug, Default)]
struct Counters {
    published: AtomicU64,
    failed: AtomicU64,
}

/// Bounded hand-off to a publisher running on its own thread.
///
/// Dropping the channel closes the queue, lets the publisher drain what is
/// already queued and joins the thread.
pub struct TelemetryChannel {
    tx: Option<xch::Sender<CycleState>>,
    min_interval_ms: u64,
    last_sent_ms: Option<u64>,
    dropped: u64,
    throttled: u64,
    counters: Arc<Counters>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl core::fmt::Debug for TelemetryChannel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TelemetryChannel")
            .field("min_interval_ms", &self.min_interval_ms)
            .field("dropped", &self.dropped)
            .field("published", &self.published())
            .finish()
    }
}

impl TelemetryChannel {
    /// Start the publisher thread. `capacity` is clamped to at least 1.
    pub fn spawn<P>(capacity: usize, min_interval_ms: u64, mut publisher: P) -> Self
    where
        P: FnMut(&CycleState) -> Result<(), BoxError> + Send + 'static,
    {
        let (tx, rx) = xch::bounded::<CycleState>(capacity.max(1));
        let counters = Arc::new(Counters::default());
        let counters_thread = counters.clone();

        let join_handle = std::thread::spawn(move || {
            // Ends once every sender is gone and the queue is drained.
            for state in rx.iter() {
                match publisher(&state) {
                    Ok(()) => {
                        counters_thread.published.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        counters_thread.failed.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(seq = state.seq, error = %e, "telemetry publish failed");
                    }
                }
            }
            tracing::trace!("telemetry publisher exiting cleanly");
        });

        Self {
            tx: Some(tx),
            min_interval_ms,
            last_sent_ms: None,
            dropped: 0,
            throttled: 0,
            counters,
            join_handle: Some(join_handle),
        }
    }

    /// Snapshots discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Snapshots skipped by the minimum interval.
    pub fn throttled(&self) -> u64 {
        self.throttled
    }

    /// Snapshots the publisher handled successfully.
    pub fn published(&self) -> u64 {
        self.counters.published.load(Ordering::Relaxed)
    }

    /// Snapshots the publisher rejected.
    pub fn failed(&self) -> u64 {
        self.counters.failed.load(Ordering::Relaxed)
    }

    fn due(&self, now_ms: u64) -> bool {
        match self.last_sent_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.min_interval_ms,
        }
    }

    /// Close the queue and wait for the publisher to drain it.
    pub fn close(&mut self) {
        self.tx.take();
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("telemetry publisher joined"),
                Err(e) => tracing::warn!(?e, "telemetry publisher panicked"),
            }
        }
    }
}

impl TelemetrySink for TelemetryChannel {
    fn publish(&mut self, state: &CycleState) -> Result<(), BoxError> {
        if !self.due(state.uptime_ms) {
            self.throttled += 1;
            return Ok(());
        }
        let Some(tx) = self.tx.as_ref() else {
            return Err("telemetry channel closed".into());
        };
        match tx.try_send(state.clone()) {
            Ok(()) => {
                self.last_sent_ms = Some(state.uptime_ms);
                Ok(())
            }
            Err(xch::TrySendError::Full(_)) => {
                self.dropped += 1;
                tracing::debug!(seq = state.seq, dropped = self.dropped, "telemetry queue full");
                Ok(())
            }
            Err(xch::TrySendError::Disconnected(_)) => Err("telemetry publisher stopped".into()),
        }
    }
}

impl Drop for TelemetryChannel {
    fn drop(&mut self) {
        self.close();
    }
}
