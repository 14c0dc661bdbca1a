use tracing::trace;

use crate::common::config::DragSettings;
use crate::model::registry::ItemId;
use crate::sys::geometry::Point;

/// Decides when a pointer press turns into a drag: the pointer has to travel
/// `start_distance` pixels and be held for `start_delay` milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct DragStartPredicate {
    item: ItemId,
    origin: Point,
    pointer: Point,
    pressed_at: f64,
    distance: f64,
    delay: f64,
}

impl DragStartPredicate {
    pub fn new(item: ItemId, pointer: Point, now: f64, settings: &DragSettings) -> Self {
        DragStartPredicate {
            item,
            origin: pointer,
            pointer,
            pressed_at: now,
            distance: settings.start_distance.max(0.0),
            delay: settings.start_delay.max(0.0),
        }
    }

    pub fn item(&self) -> ItemId { self.item }

    pub fn origin(&self) -> Point { self.origin }

    pub fn pointer(&self) -> Point { self.pointer }

    pub fn on_move(&mut self, pointer: Point, now: f64) -> bool {
        self.pointer = pointer;
        self.is_resolved(now)
    }

    /// Called every frame so a held, motionless pointer resolves once the
    /// delay passes.
    pub fn on_tick(&self, now: f64) -> bool { self.is_resolved(now) }

    pub fn is_resolved(&self, now: f64) -> bool {
        let delta = self.origin.delta_to(self.pointer);
        let travelled = f64::hypot(delta.x, delta.y);
        let resolved = travelled >= self.distance && now - self.pressed_at >= self.delay;
        if resolved {
            trace!(item = ?self.item, travelled, "Drag start predicate resolved");
        }
        resolved
    }
}
