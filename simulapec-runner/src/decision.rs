//! One-shot decision cell between the interactive side and the worker.
//!
//! Written at most once; the first write wins. The worker blocks on a
//! condition variable until a decision arrives.

use std::sync::{Condvar, Mutex, PoisonError};

/// The user's answer to the time estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Continue,
    Abort,
}

#[derive(Debug, Default)]
pub struct DecisionCell {
    slot: Mutex<Option<Decision>>,
    ready: Condvar,
}

impl DecisionCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `decision` unless one is already set. Returns whether this call won.
    pub fn resolve(&self, decision: Decision) -> bool {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return false;
        }
        *slot = Some(decision);
        self.ready.notify_all();
        true
    }

    /// Current decision without blocking.
    pub fn peek(&self) -> Option<Decision> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until a decision is set.
    pub fn wait(&self) -> Decision {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(decision) = *slot {
                return decision;
            }
            slot = self
                .ready
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn first_write_wins() {
        let cell = DecisionCell::new();
        assert_eq!(cell.peek(), None);
        assert!(cell.resolve(Decision::Continue));
        assert!(!cell.resolve(Decision::Abort));
        assert_eq!(cell.wait(), Decision::Continue);
    }

    #[test]
    fn wait_blocks_until_resolved() {
        let cell = Arc::new(DecisionCell::new());
        let waiter = {
            let cell = Arc::clone(&cell);
            thread::spawn(move || cell.wait())
        };
        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());
        cell.resolve(Decision::Abort);
        assert_eq!(waiter.join().unwrap(), Decision::Abort);
    }
}
