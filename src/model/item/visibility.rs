use tracing::trace;

use crate::model::callbacks::{CallbackQueue, Completion};
use crate::model::registry::ItemId;
use crate::model::tween::Tween;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityState {
    Hidden,
    Showing,
    Visible,
    Hiding,
}

/// What the caller has to do after a show or hide request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityStep {
    /// Already in the requested state. The callback has run.
    Settled,
    /// Joined the running animation in the same direction.
    Joined,
    /// A new transition started. `reveal` is set when the element was fully
    /// hidden and has to be displayed again before animating.
    Started { reveal: bool },
}

#[derive(Debug)]
pub struct Visibility {
    state: VisibilityState,
    tween: Option<Tween<f64>>,
    queue: CallbackQueue,
}

impl Visibility {
    pub fn new(visible: bool) -> Self {
        Visibility {
            state: if visible { VisibilityState::Visible } else { VisibilityState::Hidden },
            tween: None,
            queue: CallbackQueue::default(),
        }
    }

    pub fn state(&self) -> VisibilityState { self.state }

    pub fn is_visible(&self) -> bool {
        matches!(self.state, VisibilityState::Visible | VisibilityState::Showing)
    }

    pub fn is_hidden(&self) -> bool {
        matches!(self.state, VisibilityState::Hidden | VisibilityState::Hiding)
    }

    pub fn is_animating(&self) -> bool {
        matches!(self.state, VisibilityState::Showing | VisibilityState::Hiding)
    }

    pub fn pending_callbacks(&self) -> usize { self.queue.len() }

    /// Current visibility amount, 0 for hidden and 1 for visible.
    pub fn amount(&self, now: f64) -> f64 {
        match (&self.tween, self.state) {
            (Some(tween), _) => tween.value(now),
            (None, VisibilityState::Visible | VisibilityState::Hiding) => 1.0,
            (None, VisibilityState::Hidden | VisibilityState::Showing) => 0.0,
        }
    }

    pub fn show(&mut self, item: ItemId, instant: bool, callback: Option<Completion>) -> VisibilityStep {
        self.request(item, true, instant, callback)
    }

    pub fn hide(&mut self, item: ItemId, instant: bool, callback: Option<Completion>) -> VisibilityStep {
        self.request(item, false, instant, callback)
    }

    fn request(
        &mut self,
        item: ItemId,
        show: bool,
        instant: bool,
        callback: Option<Completion>,
    ) -> VisibilityStep {
        let (done, running) = if show {
            (VisibilityState::Visible, VisibilityState::Showing)
        } else {
            (VisibilityState::Hidden, VisibilityState::Hiding)
        };

        if self.state == done {
            if let Some(callback) = callback {
                callback(false, item);
            }
            return VisibilityStep::Settled;
        }

        if self.state == running && !instant {
            if let Some(callback) = callback {
                self.queue.push(callback);
            }
            return VisibilityStep::Joined;
        }

        // Reversing direction interrupts whatever the opposite animation was
        // waiting on.
        let reveal = self.state == VisibilityState::Hidden;
        if self.state != running {
            let interrupted = self.queue.flush(true, item);
            if interrupted > 0 {
                trace!(?item, interrupted, show, "Interrupted visibility callbacks");
            }
        }
        if let Some(callback) = callback {
            self.queue.push(callback);
        }
        self.state = running;
        VisibilityStep::Started { reveal: show && reveal }
    }

    pub fn animate(&mut self, tween: Tween<f64>) { self.tween = Some(tween); }

    /// Samples the running animation. `None` when nothing animates.
    pub fn sample(&self, now: f64) -> Option<(f64, bool)> {
        self.tween.as_ref().map(|tween| (tween.value(now), tween.is_finished(now)))
    }

    /// Settles a running transition and flushes its callbacks. Returns the
    /// state reached, or `None` if there was nothing to finish.
    pub fn finish(&mut self, item: ItemId) -> Option<VisibilityState> {
        let reached = match self.state {
            VisibilityState::Showing => VisibilityState::Visible,
            VisibilityState::Hiding => VisibilityState::Hidden,
            _ => return None,
        };
        self.state = reached;
        self.tween = None;
        self.queue.flush(false, item);
        Some(reached)
    }

    /// Cancels any animation without changing the logical state.
    pub fn stop(&mut self, item: ItemId, interrupted: bool) {
        self.tween = None;
        self.queue.flush(interrupted, item);
    }

    pub fn destroy(&mut self, item: ItemId) {
        self.stop(item, true);
        self.state = VisibilityState::Hidden;
    }
}
