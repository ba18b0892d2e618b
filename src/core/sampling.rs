use std::cell::Cell;

use tracing::warn;

/// Number of charts that currently have sampling enabled.
#[derive(Debug, Default)]
pub struct SamplingCounter {
    count: Cell<usize>,
}

impl SamplingCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.count.set(self.count.get() + 1);
    }

    pub fn decrement(&self) {
        match self.count.get().checked_sub(1) {
            Some(count) => self.count.set(count),
            None => warn!("sampling counter decremented below zero; ignoring"),
        }
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.count.get()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.count.get() > 0
    }

    pub(crate) fn clear(&self) {
        self.count.set(0);
    }
}
