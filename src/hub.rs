// FanoutHub — the broadcast point every new alert passes through.
//
// dispatch() does three things, in order:
//   1. append the alert to the in-memory AlertLog (always)
//   2. wake every registered subscriber (one-slot signal, coalescing)
//   3. enqueue the rendered text for the push sink, if the category passes
//      the sink's filter
//
// Step 3 goes through a bounded queue drained by a single worker task, so
// shutdown() can drain it deterministically. Enqueueing never waits: when a
// stalled sink has let the queue fill up, the message is dropped and counted
// so ingestion keeps moving. Each delivery is one attempt with a timeout;
// failures are logged and counted, never retried.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::alerts::{Alert, AlertCategory, RenderedNotification};
use crate::notify::PushSink;
use crate::state::CategoryFilters;

/// One entry in the AlertLog. `seq` is the entry's position in the log.
#[derive(Debug, Clone, Serialize)]
pub struct LoggedAlert {
    pub seq: usize,
    pub category: AlertCategory,
    pub rendered: RenderedNotification,
    pub received_at: DateTime<Utc>,
    pub alert: Alert,
}

/// Append-only, ordered record of every alert dispatched this process lifetime.
#[derive(Debug, Default)]
pub struct AlertLog {
    entries: RwLock<Vec<Arc<LoggedAlert>>>,
}

impl AlertLog {
    fn append(
        &self,
        alert: Alert,
        category: AlertCategory,
        rendered: RenderedNotification,
    ) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let seq = entries.len();
        entries.push(Arc::new(LoggedAlert {
            seq,
            category,
            rendered,
            received_at: Utc::now(),
            alert,
        }));
        seq
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every entry from position `cursor` onwards.
    pub fn since(&self, cursor: usize) -> Vec<Arc<LoggedAlert>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(cursor..).map(<[_]>::to_vec).unwrap_or_default()
    }

    pub fn snapshot(&self) -> Vec<Arc<LoggedAlert>> {
        self.since(0)
    }
}

pub type SubscriberId = u64;

#[derive(Debug, Default)]
struct SubscriberSet {
    next_id: AtomicU64,
    slots: Mutex<HashMap<SubscriberId, mpsc::Sender<()>>>,
}

impl SubscriberSet {
    fn lock(&self) -> MutexGuard<'_, HashMap<SubscriberId, mpsc::Sender<()>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, id: SubscriberId) -> bool {
        self.lock().remove(&id).is_some()
    }

    fn wake_all(&self) {
        for tx in self.lock().values() {
            // A full slot already holds a pending wake; this one coalesces into it
            let _ = tx.try_send(());
        }
    }
}

/// A registered live subscriber. Dropping it deregisters.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    wake: mpsc::Receiver<()>,
    set: Arc<SubscriberSet>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next wake. Returns false once the subscription has been
    /// removed from the hub and no wake is pending.
    pub async fn woken(&mut self) -> bool {
        self.wake.recv().await.is_some()
    }

    /// Consume a pending wake without waiting.
    pub fn try_take_wake(&mut self) -> bool {
        self.wake.try_recv().is_ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.set.remove(self.id);
    }
}

/// Where the push queue delivers, and what it lets through.
pub struct PushConfig {
    pub sink: Arc<dyn PushSink>,
    pub filters: CategoryFilters,
    pub queue_capacity: usize,
    pub timeout: Duration,
}

#[derive(Debug, Default)]
struct Counters {
    dispatched: AtomicU64,
    pushed: AtomicU64,
    push_failures: AtomicU64,
    push_dropped: AtomicU64,
}

/// Point-in-time view of the hub's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HubStats {
    pub dispatched: u64,
    pub pushed: u64,
    pub push_failures: u64,
    /// Messages dropped because the push queue was full.
    pub push_dropped: u64,
    pub subscribers: usize,
    pub log_len: usize,
}

struct PushQueue {
    filters: CategoryFilters,
    tx: Mutex<Option<mpsc::Sender<String>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

pub struct FanoutHub {
    log: AlertLog,
    subscribers: Arc<SubscriberSet>,
    push: Option<PushQueue>,
    counters: Arc<Counters>,
}

impl FanoutHub {
    /// Build a hub. With a push config this spawns the push worker, so it
    /// must be called from inside a tokio runtime.
    pub fn new(push: Option<PushConfig>) -> Self {
        let counters = Arc::new(Counters::default());
        let push = push.map(|config| {
            let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
            let worker = tokio::spawn(push_worker(
                rx,
                config.sink,
                config.timeout,
                counters.clone(),
            ));
            PushQueue {
                filters: config.filters,
                tx: Mutex::new(Some(tx)),
                worker: Mutex::new(Some(worker)),
            }
        });

        Self {
            log: AlertLog::default(),
            subscribers: Arc::new(SubscriberSet::default()),
            push,
            counters,
        }
    }

    pub fn log(&self) -> &AlertLog {
        &self.log
    }

    pub fn subscribe(&self) -> Subscription {
        let id = self.subscribers.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(1);
        self.subscribers.lock().insert(id, tx);
        debug!(subscriber = id, "Subscriber registered");
        Subscription {
            id,
            wake: rx,
            set: self.subscribers.clone(),
        }
    }

    /// Deregister a subscriber. Unknown or already-removed ids are ignored.
    pub fn unsubscribe(&self, id: SubscriberId) {
        if self.subscribers.remove(id) {
            debug!(subscriber = id, "Subscriber removed");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Fan one new alert out to the log, the subscribers and the push sink.
    pub async fn dispatch(
        &self,
        alert: Alert,
        category: AlertCategory,
        rendered: RenderedNotification,
    ) {
        let text = rendered.text.clone();
        let seq = self.log.append(alert, category, rendered);
        self.counters.dispatched.fetch_add(1, Ordering::Relaxed);
        self.subscribers.wake_all();
        debug!(seq, %category, "Alert dispatched");

        if let Some(push) = &self.push {
            if push.filters.allows(category) {
                self.enqueue(push, text);
            }
        }
    }

    /// Push a message that isn't tied to an alert (e.g. the users report).
    /// Bypasses the category filter.
    pub async fn push_text(&self, text: String) {
        if let Some(push) = &self.push {
            self.enqueue(push, text);
        }
    }

    fn enqueue(&self, push: &PushQueue, text: String) {
        let tx = push.tx.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = tx.as_ref() else {
            debug!("Hub is shut down, push skipped");
            return;
        };
        match tx.try_send(text) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.counters.push_dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Push queue is full, message dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Push worker is gone, message dropped");
            }
        }
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            dispatched: self.counters.dispatched.load(Ordering::Relaxed),
            pushed: self.counters.pushed.load(Ordering::Relaxed),
            push_failures: self.counters.push_failures.load(Ordering::Relaxed),
            push_dropped: self.counters.push_dropped.load(Ordering::Relaxed),
            subscribers: self.subscriber_count(),
            log_len: self.log.len(),
        }
    }

    /// Close the push queue and wait for the worker to drain what's queued.
    /// Dispatch keeps working afterwards, minus the push step.
    pub async fn shutdown(&self) {
        let Some(push) = &self.push else {
            return;
        };
        push.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let worker = push
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!(error = %e, "Push worker ended abnormally");
            }
        }
    }
}

async fn push_worker(
    mut rx: mpsc::Receiver<String>,
    sink: Arc<dyn PushSink>,
    timeout: Duration,
    counters: Arc<Counters>,
) {
    while let Some(text) = rx.recv().await {
        match tokio::time::timeout(timeout, sink.send(&text)).await {
            Ok(Ok(())) => {
                counters.pushed.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(e)) => {
                counters.push_failures.fetch_add(1, Ordering::Relaxed);
                warn!(sink = sink.name(), error = %e, "Push delivery failed");
            }
            Err(_) => {
                counters.push_failures.fetch_add(1, Ordering::Relaxed);
                warn!(sink = sink.name(), ?timeout, "Push delivery timed out");
            }
        }
    }
    info!(sink = sink.name(), "Push worker stopped");
}
