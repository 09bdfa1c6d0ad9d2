//! Ordering ids for queries, and the barrier `NOREPLY_WAIT` is built on.
//!
//! Ids are handed out in strictly increasing order and returned once a query retires.
//! The smallest id still held is the *watermark*: every id below it has retired. A
//! barrier asks to be told when the watermark reaches a threshold, typically the next id
//! at the time the barrier was issued.
//!
//! The generator is owned by one connection and never shared, so it takes `&mut self`
//! and holds no lock. Barrier notifications go through `crossbeam` channels and can be
//! awaited from any thread.
use std::collections::BTreeSet;

use crossbeam::channel::{Receiver, Sender, bounded};
use log::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueryId(u64);

impl QueryId {
    #[inline]
    pub const fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct QueryIdGenerator {
    next: u64,
    outstanding: BTreeSet<u64>,
    waiters: Vec<(u64, Sender<()>)>,
}

impl QueryIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&mut self) -> QueryId {
        let id = self.next;
        self.next += 1;
        self.outstanding.insert(id);
        QueryId(id)
    }

    /// Retire `id`, waking every barrier the new watermark satisfies.
    ///
    /// # Panics
    /// If `id` is not outstanding (never acquired here, or already released).
    pub fn release(&mut self, id: QueryId) {
        let before = self.lowest_outstanding();
        assert!(
            self.outstanding.remove(&id.0),
            "query id {} released but not outstanding",
            id.0
        );

        let after = self.lowest_outstanding();
        if after != before {
            trace!("Query id watermark advanced from {before} to {after}");
            self.notify(after);
        }
    }

    /// Every id below the returned value has been released.
    ///
    /// This is the smallest outstanding id, or the next id to be handed out when none is held.
    pub fn lowest_outstanding(&self) -> u64 {
        self.outstanding.first().copied().unwrap_or(self.next)
    }

    /// The id the next [`acquire`](Self::acquire) returns.
    pub fn next_id(&self) -> u64 {
        self.next
    }

    /// A receiver that gets one message once every id below `threshold` is released.
    ///
    /// Fires immediately when that already holds.
    pub fn wait_for(&mut self, threshold: u64) -> Receiver<()> {
        let (tx, rx) = bounded(1);
        if self.lowest_outstanding() >= threshold {
            // The receiver is still alive here, and the channel has room.
            let _ = tx.try_send(());
        } else {
            self.waiters.push((threshold, tx));
        }
        rx
    }

    pub fn outstanding_count(&self) -> usize {
        self.outstanding.len()
    }

    pub fn pending_waiters(&self) -> usize {
        self.waiters.len()
    }

    fn notify(&mut self, watermark: u64) {
        self.waiters.retain(|(threshold, tx)| {
            if *threshold <= watermark {
                // A waiter that gave up dropped its receiver; nothing to tell it.
                let _ = tx.try_send(());
                false
            } else {
                true
            }
        });
    }
}
