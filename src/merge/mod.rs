//! Online k-way merge of independently paced line sources.
//!
//! Every source owns a bounded queue with exactly one writer. The engine is
//! the only reader: it keeps at most one pending line per source and hands
//! out the earliest one. When nothing is buffered anywhere it blocks on a
//! shared notification channel that carries source indices.
//!
//! A source sends its index only when its `notified` flag was clear, so each
//! source has at most one notification in flight. The engine clears the flag
//! before draining that source's queue; a line pushed after the drain then
//! always produces a fresh notification.

mod worker;

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use crossbeam_channel::{
    bounded, unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::feeds::SourceFeed;

pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

pub type SourceName = Arc<str>;

/// A line tagged with the source it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampedLine {
    pub source: SourceName,
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

/// Registers sources before the engine starts reading.
pub struct MergeBuilder {
    capacity: usize,
    slots: Vec<Slot>,
    names: HashSet<SourceName>,
    notify: Sender<usize>,
    notifications: Receiver<usize>,
}

impl MergeBuilder {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// `capacity` bounds each source's queue; a full queue blocks its writer.
    pub fn with_capacity(capacity: usize) -> Self {
        let (notify, notifications) = unbounded();
        Self {
            capacity: capacity.max(1),
            slots: Vec::new(),
            names: HashSet::new(),
            notify,
            notifications,
        }
    }

    /// Add a source. Sources are ranked by registration order when their
    /// timestamps tie.
    pub fn register(&mut self, name: impl Into<String>) -> Result<LineSender> {
        let name: SourceName = Arc::from(name.into());
        if !self.names.insert(name.clone()) {
            bail!("Duplicate source name '{}'", name);
        }

        let (queue_tx, queue_rx) = bounded(self.capacity);
        let notified = Arc::new(AtomicBool::new(false));
        let index = self.slots.len();

        self.slots.push(Slot {
            name: name.clone(),
            queue: queue_rx,
            pending: None,
            notified: notified.clone(),
            closed: false,
        });

        Ok(LineSender {
            index,
            source: name,
            queue: Some(queue_tx),
            notified,
            notify: self.notify.clone(),
        })
    }

    pub fn build(self) -> MergeEngine {
        tracing::debug!(
            sources = self.slots.len(),
            capacity = self.capacity,
            "merge engine ready"
        );
        // Only the registered senders keep the notification channel open
        drop(self.notify);
        MergeEngine {
            slots: self.slots,
            notifications: self.notifications,
        }
    }
}

impl Default for MergeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Write side of one source. Dropping it closes the source.
pub struct LineSender {
    index: usize,
    source: SourceName,
    queue: Option<Sender<TimestampedLine>>,
    notified: Arc<AtomicBool>,
    notify: Sender<usize>,
}

impl LineSender {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Queue a line, blocking while the source's queue is full. Fails only
    /// when the engine has been dropped.
    pub fn send(&self, timestamp: DateTime<Utc>, text: impl Into<String>) -> Result<()> {
        let queue = self
            .queue
            .as_ref()
            .ok_or_else(|| anyhow!("Source '{}' is closed", self.source))?;
        queue
            .send(TimestampedLine {
                source: self.source.clone(),
                timestamp,
                text: text.into(),
            })
            .map_err(|_| anyhow!("Merge engine for '{}' is gone", self.source))?;
        self.wake();
        Ok(())
    }

    fn wake(&self) {
        if !self.notified.swap(true, Ordering::SeqCst) {
            let _ = self.notify.send(self.index);
        }
    }
}

impl Drop for LineSender {
    fn drop(&mut self) {
        // Disconnect the queue first so the wake-up observes the closure
        drop(self.queue.take());
        self.wake();
    }
}

struct Slot {
    name: SourceName,
    queue: Receiver<TimestampedLine>,
    pending: Option<TimestampedLine>,
    notified: Arc<AtomicBool>,
    closed: bool,
}

impl Slot {
    /// Non-blocking refill of an empty pending slot.
    fn poll(&mut self) {
        if self.pending.is_some() || self.closed {
            return;
        }
        match self.queue.try_recv() {
            Ok(line) => self.pending = Some(line),
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                tracing::debug!(source = %self.name, "source drained");
                self.closed = true;
            }
        }
    }

    fn is_settled(&self) -> bool {
        self.pending.is_some() || self.closed
    }
}

/// Single-consumer merge over all registered sources
pub struct MergeEngine {
    slots: Vec<Slot>,
    notifications: Receiver<usize>,
}

impl MergeEngine {
    /// Start one worker thread per feed and return the engine reading them.
    pub fn spawn(feeds: Vec<(String, Box<dyn SourceFeed>)>, capacity: usize) -> Result<Self> {
        let mut builder = MergeBuilder::with_capacity(capacity);
        let mut workers = Vec::with_capacity(feeds.len());
        for (name, feed) in feeds {
            workers.push((builder.register(name)?, feed));
        }
        let engine = builder.build();
        for (sender, feed) in workers {
            worker::spawn_worker(sender, feed)?;
        }
        Ok(engine)
    }

    pub fn source_count(&self) -> usize {
        self.slots.len()
    }

    pub fn source_names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|slot| &*slot.name)
    }

    /// Return the earliest buffered line, blocking while no source has one.
    ///
    /// `None` means every source has closed and been drained.
    pub fn next_line(&mut self) -> Option<TimestampedLine> {
        loop {
            self.poll_all();

            if let Some(index) = self.earliest() {
                return self.slots[index].pending.take();
            }

            if self.slots.iter().all(|slot| slot.closed) {
                return None;
            }

            match self.notifications.recv() {
                Ok(index) => self.on_notification(index),
                // Every sender is gone; the next poll sees the closed queues
                Err(_) => continue,
            }
        }
    }

    /// Wait until every source has a line buffered or has closed, or until
    /// `timeout` runs out. Returns whether all sources settled.
    ///
    /// Calling this before the first `next_line` lets slow-starting sources
    /// contribute their earliest lines to the ordering.
    pub fn settle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.poll_all();
            if self.slots.iter().all(Slot::is_settled) {
                return true;
            }
            match self.notifications.recv_deadline(deadline) {
                Ok(index) => self.on_notification(index),
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => continue,
            }
        }
    }

    fn poll_all(&mut self) {
        for slot in &mut self.slots {
            slot.poll();
        }
    }

    fn on_notification(&mut self, index: usize) {
        let Some(slot) = self.slots.get_mut(index) else {
            return;
        };
        slot.notified.store(false, Ordering::SeqCst);
        slot.poll();
    }

    /// Index of the buffered line with the smallest timestamp; the first
    /// registered source wins ties.
    fn earliest(&self) -> Option<usize> {
        let mut best: Option<(usize, &DateTime<Utc>)> = None;
        for (index, slot) in self.slots.iter().enumerate() {
            let Some(line) = &slot.pending else {
                continue;
            };
            match best {
                Some((_, ts)) if line.timestamp >= *ts => {}
                _ => best = Some((index, &line.timestamp)),
            }
        }
        best.map(|(index, _)| index)
    }
}

impl Iterator for MergeEngine {
    type Item = TimestampedLine;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_line()
    }
}
