use std::cell::Cell;

use tracing::trace;

use super::{Epoch, RefreshKind};

/// Epoch allocator and in-flight gate for one refresh kind.
///
/// `next` only ever grows, so epochs are never reused for the lifetime of the
/// counters. `in_flight` is the coalescing marker (`None` means idle) and
/// `done` counts charts that reported completion of the current pass.
#[derive(Debug)]
pub struct SequenceCounters {
    kind: RefreshKind,
    next: Cell<u64>,
    in_flight: Cell<Option<Epoch>>,
    done: Cell<usize>,
}

impl SequenceCounters {
    #[must_use]
    pub fn new(kind: RefreshKind) -> Self {
        Self {
            kind,
            next: Cell::new(0),
            in_flight: Cell::new(None),
            done: Cell::new(0),
        }
    }

    #[must_use]
    pub fn kind(&self) -> RefreshKind {
        self.kind
    }

    /// Allocates the next epoch and marks it as the in-flight pass.
    pub fn increment(&self) -> Epoch {
        let value = self.next.get() + 1;
        self.next.set(value);
        let epoch = Epoch::new(value);
        self.in_flight.set(Some(epoch));
        trace!(kind = %self.kind, epoch = %epoch, "epoch allocated");
        epoch
    }

    /// Starts a pass if none is in flight.
    ///
    /// Check and set happen in one call with no suspension point in between,
    /// so two back-to-back requests can never both start a pass.
    pub fn try_begin(&self) -> Option<Epoch> {
        if self.in_flight.get().is_some() {
            return None;
        }
        Some(self.increment())
    }

    /// Clears the completion count and the in-flight marker.
    pub fn reset(&self) {
        self.done.set(0);
        if let Some(epoch) = self.in_flight.take() {
            trace!(kind = %self.kind, epoch = %epoch, "gate reset");
        }
    }

    /// `true` when no pass is in flight, or when `epoch` is the one in flight.
    #[must_use]
    pub fn is_empty(&self, epoch: Option<Epoch>) -> bool {
        match (self.in_flight.get(), epoch) {
            (None, _) => true,
            (Some(current), Some(epoch)) => current == epoch,
            (Some(_), None) => false,
        }
    }

    /// Records one completion and reports whether `expected_total` is now reached.
    pub fn is_equal_to_count(&self, expected_total: usize) -> bool {
        let done = self.done.get() + 1;
        self.done.set(done);
        done == expected_total
    }

    #[must_use]
    pub fn in_flight(&self) -> Option<Epoch> {
        self.in_flight.get()
    }

    #[must_use]
    pub fn done_count(&self) -> usize {
        self.done.get()
    }

    /// Most recently allocated epoch, in flight or not.
    #[must_use]
    pub fn last_epoch(&self) -> Option<Epoch> {
        match self.next.get() {
            0 => None,
            value => Some(Epoch::new(value)),
        }
    }
}
