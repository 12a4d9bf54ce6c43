//! In-process fan-out of freshly ingested records to live-tail subscribers.
//!
//! Each subscriber owns a bounded queue with drop-oldest overflow. Overflow
//! is a single push-or-displace operation under one lock, never a separate
//! pop followed by a push.

use crate::domain::LogRecord;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Notify;

pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 1000;

/// A bounded FIFO delivering records to one live-tail session.
pub struct SubscriberQueue {
    inner: Mutex<VecDeque<LogRecord>>,
    notify: Notify,
    capacity: usize,
    closed: AtomicBool,
    dropped: AtomicU64,
}

impl SubscriberQueue {
    fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            capacity,
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueue, displacing the oldest entry when full. The newest entry is
    /// always kept.
    fn push_or_displace(&self, record: LogRecord) {
        {
            let mut queue = self.inner.lock();
            if queue.len() >= self.capacity {
                queue.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            queue.push_back(record);
        }
        self.notify.notify_one();
    }

    /// Wait for the next record. Callers impose their own timeout
    /// (`tokio::time::timeout`) for keep-alive handling.
    pub async fn recv(&self) -> LogRecord {
        loop {
            let notified = self.notify.notified();
            if let Some(record) = self.inner.lock().pop_front() {
                return record;
            }
            notified.await;
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records displaced by overflow since subscription.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

/// Registry of live-tail subscriber queues.
#[derive(Default)]
pub struct Broadcaster {
    subscribers: Mutex<Vec<Arc<SubscriberQueue>>>,
}

impl Broadcaster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register and return a fresh bounded queue.
    #[must_use]
    pub fn subscribe(&self) -> Arc<SubscriberQueue> {
        let queue = Arc::new(SubscriberQueue::new(SUBSCRIBER_QUEUE_CAPACITY));
        self.subscribers.lock().push(queue.clone());
        queue
    }

    /// Remove a queue; silent if already absent.
    pub fn unsubscribe(&self, queue: &Arc<SubscriberQueue>) {
        queue.close();
        self.subscribers
            .lock()
            .retain(|subscriber| !Arc::ptr_eq(subscriber, queue));
    }

    /// Enqueue every record into every live subscriber queue, in publish
    /// order per subscriber. Closed queues are dropped from the registry.
    pub fn publish(&self, records: &[LogRecord]) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|subscriber| !subscriber.is_closed());
        for subscriber in subscribers.iter() {
            for record in records {
                subscriber.push_or_displace(record.clone());
            }
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
