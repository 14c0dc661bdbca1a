//! Completion callbacks for item animations.
//!
//! Every callback handed to an item is eventually invoked exactly once: with
//! `false` when the operation it waited for completed, or with `true` when a
//! later operation superseded it.

use std::fmt;

use super::registry::ItemId;

pub type Completion = Box<dyn FnOnce(bool, ItemId)>;

#[derive(Default)]
pub struct CallbackQueue {
    pending: Vec<Completion>,
}

impl CallbackQueue {
    pub fn push(&mut self, callback: Completion) { self.pending.push(callback); }

    pub fn len(&self) -> usize { self.pending.len() }

    pub fn is_empty(&self) -> bool { self.pending.is_empty() }

    /// Invokes every queued callback in registration order. Callbacks queued
    /// while flushing belong to the next flush.
    pub fn flush(&mut self, interrupted: bool, item: ItemId) -> usize {
        let pending = std::mem::take(&mut self.pending);
        let count = pending.len();
        for callback in pending {
            callback(interrupted, item);
        }
        count
    }
}

impl fmt::Debug for CallbackQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackQueue").field("pending", &self.pending.len()).finish()
    }
}
