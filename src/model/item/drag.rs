use crate::model::registry::{GridId, ItemId};
use crate::sys::geometry::Point;
use crate::sys::host::ElementId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragPhase {
    #[default]
    Idle,
    Dragging,
    /// Playing the return animation. `positioning_started` flips once the
    /// first layout after the drop picked the item up.
    Releasing { positioning_started: bool },
}

impl DragPhase {
    pub fn is_dragging(self) -> bool { self == DragPhase::Dragging }

    pub fn is_releasing(self) -> bool { matches!(self, DragPhase::Releasing { .. }) }

    /// Only the first positioning after a drop uses the release timing.
    pub fn is_just_released(self) -> bool {
        self == DragPhase::Releasing { positioning_started: false }
    }
}

/// State of the one pointer drag in progress.
#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    pub item: ItemId,
    /// Grid the item currently belongs to. Changes when the drag migrates.
    pub grid: GridId,
    pub origin_grid: GridId,
    pub start_pointer: Point,
    pub pointer: Point,
    pub start_translate: Point,
    /// Container the element lives in while dragged.
    pub container: ElementId,
}

impl DragSession {
    pub fn new(
        item: ItemId,
        grid: GridId,
        pointer: Point,
        translate: Point,
        container: ElementId,
    ) -> Self {
        DragSession {
            item,
            grid,
            origin_grid: grid,
            start_pointer: pointer,
            pointer,
            start_translate: translate,
            container,
        }
    }

    pub fn delta(&self) -> Point { self.start_pointer.delta_to(self.pointer) }

    /// Translation that keeps the element under the pointer.
    pub fn translate(&self) -> Point {
        let delta = self.delta();
        self.start_translate.offset(delta.x, delta.y)
    }

    pub fn has_migrated(&self) -> bool { self.grid != self.origin_grid }
}
