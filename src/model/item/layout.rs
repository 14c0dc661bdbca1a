use crate::model::callbacks::{CallbackQueue, Completion};
use crate::model::registry::ItemId;
use crate::model::tween::Tween;
use crate::sys::geometry::{Point, SameAs};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionOutcome {
    /// Target equals the current translation; finished without moving.
    Skipped,
    /// Jumped straight to the target.
    Instant,
    Animating,
}

/// Moves an item's element towards its layout slot.
#[derive(Debug, Default)]
pub struct Positioning {
    active: bool,
    skip_next_animation: bool,
    target: Point,
    tween: Option<Tween<Point>>,
    queue: CallbackQueue,
}

impl Positioning {
    pub fn is_active(&self) -> bool { self.active }

    pub fn target(&self) -> Point { self.target }

    pub fn pending_callbacks(&self) -> usize { self.queue.len() }

    /// The next positioning jumps instead of animating. Set for items that
    /// were just added or shown.
    pub fn skip_next_animation(&mut self) { self.skip_next_animation = true; }

    /// Starts a new positioning towards `target`. A positioning that is still
    /// running gets its callbacks interrupted. Returns whether the move should
    /// animate, which is never the case when `animate` is false or the skip
    /// flag was set.
    pub fn begin(
        &mut self,
        item: ItemId,
        target: Point,
        animate: bool,
        callback: Option<Completion>,
    ) -> bool {
        if self.active {
            self.queue.flush(true, item);
        }
        if let Some(callback) = callback {
            self.queue.push(callback);
        }
        self.target = target;
        let animate = animate && !self.skip_next_animation;
        self.skip_next_animation = false;
        self.active = animate;
        if !animate {
            self.tween = None;
        }
        animate
    }

    /// Classifies the move from `current` once `begin` decided to animate.
    pub fn plan(&self, current: Point) -> PositionOutcome {
        if current.same_as(self.target) {
            PositionOutcome::Skipped
        } else if self.active {
            PositionOutcome::Animating
        } else {
            PositionOutcome::Instant
        }
    }

    pub fn animate(&mut self, tween: Tween<Point>) { self.tween = Some(tween); }

    pub fn sample(&self, now: f64) -> Option<(Point, bool)> {
        self.tween.as_ref().map(|tween| (tween.value(now), tween.is_finished(now)))
    }

    /// Marks the positioning done. The caller flushes the queue once the
    /// dependent release and migration steps ran.
    pub fn settle(&mut self) -> bool {
        self.tween = None;
        std::mem::replace(&mut self.active, false)
    }

    pub fn flush(&mut self, item: ItemId, interrupted: bool) { self.queue.flush(interrupted, item); }

    /// Cancels the running animation where it is.
    pub fn stop(&mut self, item: ItemId, interrupted: bool) -> bool {
        let was_active = self.settle();
        self.flush(item, interrupted);
        was_active
    }
}
