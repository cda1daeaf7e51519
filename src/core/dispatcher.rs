//! Bounded hand-off between stream sessions and slow sink I/O
//!
//! Sessions enqueue `(snapshot, event)` pairs; a fixed pool of workers shares
//! the receiving end of one bounded channel and feeds the persistence and
//! alert sinks. A full queue makes producers wait, up to a configured bound,
//! instead of dropping data.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::DispatcherConfig;
use crate::error::DispatchError;
use crate::metrics::Metrics;
use crate::models::{BreakoutEvent, SeriesSnapshot};
use crate::services::sinks::{AlertSink, SnapshotStore};

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchItem {
    pub snapshot: SeriesSnapshot,
    pub event: BreakoutEvent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub enqueued: u64,
    pub delivered: u64,
    pub queue_full: u64,
    pub timeouts: u64,
    pub dropped: u64,
    pub sink_errors: u64,
    pub degraded: bool,
}

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    delivered: AtomicU64,
    queue_full: AtomicU64,
    consecutive_full: AtomicU64,
    timeouts: AtomicU64,
    dropped: AtomicU64,
    sink_errors: AtomicU64,
    degraded: AtomicBool,
    /// Items a worker has taken off the queue but not finished delivering
    in_flight: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            queue_full: self.queue_full.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            sink_errors: self.sink_errors.load(Ordering::Relaxed),
            degraded: self.degraded.load(Ordering::Relaxed),
        }
    }
}

/// Producer side of the dispatcher queue
#[derive(Clone)]
pub struct DispatchHandle {
    tx: mpsc::Sender<DispatchItem>,
    enqueue_timeout: Duration,
    degraded_threshold: u64,
    counters: Arc<Counters>,
    metrics: Option<Arc<Metrics>>,
}

impl DispatchHandle {
    /// Enqueue without blocking on I/O; waits at most `enqueue_timeout` for
    /// queue space.
    pub async fn enqueue(&self, item: DispatchItem) -> Result<(), DispatchError> {
        let item = match self.tx.try_send(item) {
            Ok(()) => {
                self.on_accepted();
                return Ok(());
            }
            Err(TrySendError::Closed(_)) => return Err(DispatchError::Closed),
            Err(TrySendError::Full(item)) => item,
        };

        self.on_full();
        let symbol = item.snapshot.symbol.clone();
        match self.tx.send_timeout(item, self.enqueue_timeout).await {
            Ok(()) => {
                self.on_accepted();
                Ok(())
            }
            Err(SendTimeoutError::Timeout(_)) => {
                self.counters.timeouts.fetch_add(1, Ordering::Relaxed);
                if let Some(m) = &self.metrics {
                    m.dispatch_timeouts_total.inc();
                }
                Err(DispatchError::QueueTimeout {
                    symbol,
                    waited_ms: self.enqueue_timeout.as_millis() as u64,
                })
            }
            Err(SendTimeoutError::Closed(_)) => Err(DispatchError::Closed),
        }
    }

    /// Enqueue only if space is available right now
    pub fn try_enqueue(&self, item: DispatchItem) -> Result<(), DispatchError> {
        match self.tx.try_send(item) {
            Ok(()) => {
                self.on_accepted();
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.on_full();
                Err(DispatchError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(DispatchError::Closed),
        }
    }

    pub fn stats(&self) -> DispatchStats {
        self.counters.snapshot()
    }

    fn on_accepted(&self) {
        self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
        self.counters.consecutive_full.store(0, Ordering::Relaxed);
        if let Some(m) = &self.metrics {
            m.dispatch_enqueued_total.inc();
        }
        if self.counters.degraded.swap(false, Ordering::Relaxed) {
            info!("Dispatcher queue recovered from degraded mode");
            if let Some(m) = &self.metrics {
                m.dispatch_degraded.set(0);
            }
        }
    }

    fn on_full(&self) {
        self.counters.queue_full.fetch_add(1, Ordering::Relaxed);
        if let Some(m) = &self.metrics {
            m.dispatch_queue_full_total.inc();
        }
        let streak = self.counters.consecutive_full.fetch_add(1, Ordering::Relaxed) + 1;
        if streak >= self.degraded_threshold.max(1)
            && !self.counters.degraded.swap(true, Ordering::Relaxed)
        {
            warn!(
                consecutive_full = streak,
                capacity = self.tx.max_capacity(),
                "Dispatcher queue persistently full, running in degraded mode"
            );
            if let Some(m) = &self.metrics {
                m.dispatch_degraded.set(1);
            }
        }
    }
}

#[derive(Clone)]
struct Sinks {
    store: Arc<dyn SnapshotStore>,
    alerts: Arc<dyn AlertSink>,
    counters: Arc<Counters>,
    metrics: Option<Arc<Metrics>>,
}

impl Sinks {
    async fn deliver(&self, item: DispatchItem) {
        self.counters.in_flight.fetch_add(1, Ordering::Relaxed);

        if let Err(e) = self.store.persist(&item.snapshot).await {
            self.sink_error("persistence");
            error!(symbol = %item.snapshot.symbol, error = %e, "Failed to persist snapshot");
        }

        if item.event.direction.is_breakout() {
            if let Err(e) = self.alerts.alert(&item.event).await {
                self.sink_error("alert");
                error!(symbol = %item.event.symbol, error = %e, "Failed to deliver breakout alert");
            }
        }

        self.counters.delivered.fetch_add(1, Ordering::Relaxed);
        self.counters.in_flight.fetch_sub(1, Ordering::Relaxed);
    }

    fn sink_error(&self, sink: &str) {
        self.counters.sink_errors.fetch_add(1, Ordering::Relaxed);
        if let Some(m) = &self.metrics {
            m.sink_errors_total.with_label_values(&[sink]).inc();
        }
    }
}

pub struct SinkDispatcher {
    handle: DispatchHandle,
    queue: Arc<Mutex<mpsc::Receiver<DispatchItem>>>,
    closing: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl SinkDispatcher {
    /// Spawn the worker pool and open the queue
    pub fn start(
        config: &DispatcherConfig,
        store: Arc<dyn SnapshotStore>,
        alerts: Arc<dyn AlertSink>,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        let capacity = config.capacity.max(1);
        let worker_count = config.workers.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let (closing, _) = watch::channel(false);
        let counters = Arc::new(Counters::default());
        let queue = Arc::new(Mutex::new(rx));

        let sinks = Sinks {
            store,
            alerts,
            counters: counters.clone(),
            metrics: metrics.clone(),
        };
        let workers = (0..worker_count)
            .map(|id| {
                tokio::spawn(run_worker(
                    id,
                    queue.clone(),
                    closing.subscribe(),
                    sinks.clone(),
                ))
            })
            .collect();

        info!(
            capacity = capacity,
            workers = worker_count,
            enqueue_timeout_ms = config.enqueue_timeout.as_millis() as u64,
            "Sink dispatcher started"
        );

        Self {
            handle: DispatchHandle {
                tx,
                enqueue_timeout: config.enqueue_timeout,
                degraded_threshold: config.degraded_threshold,
                counters,
                metrics,
            },
            queue,
            closing,
            workers,
        }
    }

    pub fn handle(&self) -> DispatchHandle {
        self.handle.clone()
    }

    pub fn stats(&self) -> DispatchStats {
        self.handle.stats()
    }

    /// Close the queue, drain buffered items for at most `grace`, then abort
    /// the workers. No sink is invoked after this returns.
    pub async fn shutdown(self, grace: Duration) -> DispatchStats {
        let SinkDispatcher {
            handle,
            queue,
            closing,
            mut workers,
        } = self;

        closing.send_replace(true);

        let drained = tokio::time::timeout(grace, join_all(workers.iter_mut())).await;
        if drained.is_ok() {
            info!("Sink dispatcher drained");
            return handle.stats();
        }

        for worker in &workers {
            worker.abort();
        }
        join_all(workers).await;

        // aborted mid-delivery, never counted as delivered
        let interrupted = handle.counters.in_flight.swap(0, Ordering::Relaxed);
        let mut rx = queue.lock().await;
        rx.close();
        let mut queued = 0u64;
        while rx.try_recv().is_ok() {
            queued += 1;
        }
        let dropped = queued + interrupted;
        handle.counters.dropped.fetch_add(dropped, Ordering::Relaxed);
        if let Some(m) = &handle.metrics {
            m.dispatch_dropped_total.inc_by(dropped);
        }
        warn!(
            dropped = dropped,
            queued = queued,
            interrupted = interrupted,
            grace_ms = grace.as_millis() as u64,
            "Dispatcher drain grace expired, dropping in-flight items"
        );

        handle.stats()
    }
}

async fn run_worker(
    id: usize,
    queue: Arc<Mutex<mpsc::Receiver<DispatchItem>>>,
    mut closing: watch::Receiver<bool>,
    sinks: Sinks,
) {
    debug!(worker = id, "Dispatcher worker started");
    let mut draining = false;

    loop {
        let next = {
            let mut rx = queue.lock().await;
            if draining {
                rx.close();
                rx.recv().await
            } else {
                tokio::select! {
                    item = rx.recv() => item,
                    _ = closing.changed() => {
                        draining = true;
                        continue;
                    }
                }
            }
        };

        match next {
            Some(item) => sinks.deliver(item).await,
            None => break,
        }
    }

    debug!(worker = id, "Dispatcher worker stopped");
}
