//! Two-state global epoch with per-epoch retire queues.
//!
//! # Memory ordering protocol
//!
//! Every cell keeps two slots and recorders pick one by the low bit of the
//! global epoch counter:
//!
//! **Recorder (hot path):**
//! 1. Load the epoch counter with Acquire (keeps the slot access from
//!    hoisting above the epoch selection)
//! 2. One Relaxed atomic update on `slot[epoch]`
//!
//! **Poller (flip):**
//! 1. Drain the retire queue of the quiescent epoch (Acquire swap of the
//!    queue head, synchronising with the Release pushes)
//! 2. `fetch_add(1, AcqRel)` on the counter, toggling which slot is live
//! 3. Read and reset `slot[retired]` for every reachable cell
//!
//! Two epochs suffice because a cell unlinked during window `e` is only
//! dropped at the second flip after: the flip that ends window `e` leaves its
//! queue alone, the next one drains it. Any recorder or traversal that could
//! still see the cell finished long before, helped along by the poller's
//! short straggler-grace sleep after each flip.

use crate::cell::Cell;
use std::ptr;
use std::sync::atomic::{AtomicI64, AtomicPtr, AtomicU64, Ordering};
use std::sync::Arc;

/// Selects one of the two slots inside every cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Epoch(pub(crate) usize);

impl Epoch {
    /// Slot index, always 0 or 1.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }

    /// The opposite slot.
    #[inline]
    pub(crate) fn other(self) -> Epoch {
        Epoch(self.0 ^ 1)
    }
}

/// Global epoch counter plus the two retire queues it gates.
pub(crate) struct EpochState {
    counter: AtomicU64,
    /// Timestamp of the last flip (unix seconds).
    last_ts: AtomicI64,
    retired: [RetireStack; 2],
}

impl EpochState {
    pub(crate) fn new(start_ts: i64) -> Self {
        Self {
            counter: AtomicU64::new(0),
            last_ts: AtomicI64::new(start_ts),
            retired: [RetireStack::new(), RetireStack::new()],
        }
    }

    /// Epoch recorders should write to right now.
    #[inline]
    pub(crate) fn current(&self) -> Epoch {
        Epoch((self.counter.load(Ordering::Acquire) & 1) as usize)
    }

    /// Frees the quiescent retire queue, then toggles the live slot.
    ///
    /// Returns the epoch that just became retired (safe for the caller to
    /// read once stragglers have drained) and the previous flip timestamp.
    pub(crate) fn flip(&self, now: i64) -> (Epoch, i64) {
        // The queue of the *other* epoch has been quiescent since the
        // previous flip; anything on it was unlinked two windows ago.
        let current = self.current();
        self.retired[current.other().0].drain();

        let prev = self.counter.fetch_add(1, Ordering::AcqRel);
        let prev_ts = self.last_ts.swap(now, Ordering::AcqRel);
        (Epoch((prev & 1) as usize), prev_ts)
    }

    /// Parks an unlinked cell until two flips have passed.
    pub(crate) fn retire(&self, cell: Arc<Cell>) {
        self.retired[self.current().0].push(cell);
    }

    #[cfg(test)]
    pub(crate) fn retired_len(&self, epoch: Epoch) -> usize {
        self.retired[epoch.0].len()
    }
}

/// Lock-free LIFO of cells awaiting reclamation.
struct RetireStack {
    head: AtomicPtr<RetireNode>,
}

struct RetireNode {
    cell: Arc<Cell>,
    next: *mut RetireNode,
}

impl RetireStack {
    fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
        }
    }

    fn push(&self, cell: Arc<Cell>) {
        let node = Box::into_raw(Box::new(RetireNode {
            cell,
            next: ptr::null_mut(),
        }));
        let mut head = self.head.load(Ordering::Relaxed);
        loop {
            // SAFETY: `node` came from Box::into_raw above and is not yet
            // shared; writing `next` before the CAS publishes it is the
            // standard Treiber push.
            unsafe { (*node).next = head };
            match self
                .head
                .compare_exchange_weak(head, node, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(observed) => head = observed,
            }
        }
    }

    /// Detaches the whole stack and drops every node.
    ///
    /// Called only from `flip` (single poller) and `Drop`, so the Acquire
    /// swap pairs with the Release pushes and no node is freed twice.
    fn drain(&self) {
        let mut node = self.head.swap(ptr::null_mut(), Ordering::Acquire);
        while !node.is_null() {
            // SAFETY: nodes are only reachable through the head we just took
            // sole ownership of; each is boxed exactly once in `push`.
            let boxed = unsafe { Box::from_raw(node) };
            node = boxed.next;
            drop(boxed.cell);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        let mut count = 0;
        let mut node = self.head.load(Ordering::Acquire);
        while !node.is_null() {
            count += 1;
            // SAFETY: test-only walk; nodes stay linked until drain.
            node = unsafe { (*node).next };
        }
        count
    }
}

impl Drop for RetireStack {
    fn drop(&mut self) {
        self.drain();
    }
}
